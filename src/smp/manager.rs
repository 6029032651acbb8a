use tracing::{debug, error, info, warn};

use super::*;

/// Maximum LE encryption key size in bytes ([Vol 3] Part H, Section 3.5.1).
pub const MAX_KEY_SIZE: u8 = 16;

/// Pairing attempt state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum State {
    Idle,
    IoCapRequested,
    ConfirmPending,
    PasskeyNotified,
    EncryptionPending,
    Paired,
    Failed,
}

/// Pairing attempt result.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Pending,
    Success,
    /// BR/EDR status or LE failure reason reported by the stack.
    Failed(u8),
}

/// IO capability reply for the stack.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IoCapReply {
    BrEdr {
        io_cap: IoCap,
        auth_req: BrEdrAuth,
        oob: bool,
    },
    Le {
        io_cap: IoCap,
        oob: bool,
        auth_req: AuthReq,
        max_key_size: u8,
        init_keys: KeyDist,
        resp_keys: KeyDist,
    },
}

impl IoCapReply {
    /// Returns the local IO capability.
    #[inline]
    #[must_use]
    pub const fn io_cap(&self) -> IoCap {
        match *self {
            Self::BrEdr { io_cap, .. } | Self::Le { io_cap, .. } => io_cap,
        }
    }
}

/// Context of one pairing attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct Pairing {
    pub peer: Addr,
    /// Transport, if the attempt started with an IO capability request.
    pub transport: Option<Transport>,
    /// Local capabilities and requirements reported to the stack.
    pub local: Option<IoCapReply>,
    /// Peer IO capability, when reported.
    pub remote_io_cap: Option<IoCap>,
    pub state: State,
    pub outcome: Outcome,
}

impl Pairing {
    #[inline]
    const fn new(peer: Addr, transport: Option<Transport>) -> Self {
        Self {
            peer,
            transport,
            local: None,
            remote_io_cap: None,
            state: State::Idle,
            outcome: Outcome::Pending,
        }
    }
}

/// Pairing policy state machine. Terminal states are recorded for diagnostics
/// and the machine returns to [`State::Idle`] for the next attempt.
#[derive(Debug)]
pub struct SecurityManager {
    dev: Device,
    fast_pair: Option<Box<dyn FastPair>>,
    auto_accept: bool,
    cur: Option<Pairing>,
    last: Option<Pairing>,
}

impl SecurityManager {
    /// Creates a security manager. `auto_accept` is the policy for numeric
    /// comparison when the device has no confirmation input.
    #[inline]
    #[must_use]
    pub fn new(dev: Device, auto_accept: bool) -> Self {
        Self {
            dev,
            fast_pair: None,
            auto_accept,
            cur: None,
            last: None,
        }
    }

    /// Replaces the local device interface.
    #[inline]
    #[must_use]
    pub fn with_device(mut self, dev: Device) -> Self {
        self.dev = dev;
        self
    }

    /// Installs a Fast Pair provider.
    #[inline]
    #[must_use]
    pub fn with_fast_pair(mut self, fp: Box<dyn FastPair>) -> Self {
        self.fast_pair = Some(fp);
        self
    }

    /// Returns the state of the current attempt.
    #[inline]
    #[must_use]
    pub fn state(&self) -> State {
        self.cur.map_or(State::Idle, |p| p.state)
    }

    /// Returns the current attempt.
    #[inline(always)]
    #[must_use]
    pub const fn current(&self) -> Option<&Pairing> {
        self.cur.as_ref()
    }

    /// Returns the last completed attempt.
    #[inline(always)]
    #[must_use]
    pub const fn last_outcome(&self) -> Option<&Pairing> {
        self.last.as_ref()
    }

    /// Handles an IO capability request, starting a new attempt.
    pub fn io_cap_request(&mut self, peer: Addr, t: Transport) -> IoCapReply {
        debug!("IO capability request from {peer} over {t}");
        if let Some(ref p) = self.cur {
            warn!("Abandoning {:?} pairing with {}", p.state, p.peer);
        }
        let io_cap = self.dev.io_cap();
        let reply = match t {
            Transport::BrEdr => {
                let io_cap = if self.fast_pair_active() {
                    IoCap::DisplayYesNo
                } else {
                    io_cap
                };
                IoCapReply::BrEdr {
                    io_cap,
                    auth_req: BrEdrAuth::GeneralBonding,
                    oob: false,
                }
            }
            Transport::Le => {
                let keys = KeyDist::ENC | KeyDist::ID | KeyDist::SIGN;
                IoCapReply::Le {
                    io_cap,
                    oob: false,
                    auth_req: AuthReq::SC | AuthReq::MITM | AuthReq::BONDING,
                    max_key_size: MAX_KEY_SIZE,
                    init_keys: keys,
                    resp_keys: keys,
                }
            }
        };
        let mut p = Pairing::new(peer, Some(t));
        p.local = Some(reply);
        p.state = State::IoCapRequested;
        self.cur = Some(p);
        reply
    }

    /// Handles the peer's BR/EDR IO capability response.
    pub fn io_cap_response(&mut self, peer: Addr, io_cap: IoCap) {
        debug!("IO capability response from {peer}: {io_cap}");
        if self.fast_pair_active() && io_cap == IoCap::NoInputNoOutput {
            // Fast Pair does not permit Just Works
            warn!("Fast Pair seeker {peer} has no IO capability; pairing should terminate");
        }
        self.attempt(peer).remote_io_cap = Some(io_cap);
    }

    /// Handles a user confirmation request, returning whether to accept.
    pub fn user_confirm(&mut self, peer: Addr, n: u32, just_works: bool) -> bool {
        self.attempt(peer).state = State::ConfirmPending;
        let accept = if just_works {
            debug!("Accepting Just Works pairing with {peer}");
            true
        } else {
            debug!("Numeric comparison with {peer}: {n:06}");
            if let Some(ref mut fp) = self.fast_pair {
                fp.set_passkey(n);
            }
            if let Some(ref mut d) = self.dev.display {
                if !d.show(peer, n) {
                    warn!("Failed to display comparison value");
                }
            }
            match self.dev.confirm {
                Some(ref mut c) => c.confirm(peer, n),
                None if self.auto_accept => {
                    warn!("Auto-accepting numeric comparison with {peer}");
                    true
                }
                None => false,
            }
        };
        let p = self.attempt(peer);
        if accept {
            p.state = State::EncryptionPending;
        } else {
            warn!("Rejected numeric comparison with {peer}");
            p.state = State::Failed;
        }
        accept
    }

    /// Handles a passkey notification.
    pub fn passkey_notification(&mut self, peer: Addr, passkey: u32) {
        info!("Passkey for {peer}: {passkey:06}");
        self.attempt(peer).state = State::PasskeyNotified;
        if let Some(ref mut d) = self.dev.display {
            if !d.show(peer, passkey) {
                warn!("Failed to display passkey");
            }
        }
    }

    /// Handles a peer security request.
    pub fn security_request(&mut self, peer: Addr, pairing_allowed: bool) -> Result<()> {
        debug!("Security request from {peer} (pairing allowed: {pairing_allowed})");
        if pairing_allowed {
            return Ok(());
        }
        warn!("Rejected security request from {peer}: pairing not allowed");
        Err(Error::AuthenticationRejected)
    }

    /// Records pairing completion and returns to idle. `status` is 0 on
    /// success.
    pub fn pairing_complete(&mut self, peer: Addr, t: Transport, status: u8) -> &Pairing {
        let mut p = match self.cur.take() {
            Some(p) if p.peer == peer => p,
            other => {
                if let Some(p) = other {
                    warn!("Pairing with {} superseded by {peer}", p.peer);
                }
                Pairing::new(peer, Some(t))
            }
        };
        p.transport = Some(t);
        if status == 0 {
            info!("{t} pairing with {peer} succeeded");
            p.state = State::Paired;
            p.outcome = Outcome::Success;
        } else {
            error!("{t} pairing with {peer} failed: {status:#04X}");
            p.state = State::Failed;
            p.outcome = Outcome::Failed(status);
        }
        self.last.insert(p)
    }

    /// Handles an encryption status change.
    pub fn encryption_status(&mut self, peer: Addr, ok: bool) {
        if ok {
            info!("Link with {peer} encrypted");
        } else {
            warn!("Link with {peer} encryption failed");
        }
        if let Some(ref mut p) = self.cur {
            if p.peer == peer && !ok {
                p.state = State::Failed;
            }
        }
    }

    /// Discards the current attempt.
    pub fn reset(&mut self) {
        self.cur = None;
    }

    /// Returns the attempt for `peer`, starting a new one if needed.
    fn attempt(&mut self, peer: Addr) -> &mut Pairing {
        match self.cur {
            Some(ref p) if p.peer == peer => {}
            _ => {
                if let Some(ref p) = self.cur {
                    warn!("Pairing with {} superseded by {peer}", p.peer);
                }
                self.cur = Some(Pairing::new(peer, None));
            }
        }
        self.cur.get_or_insert_with(|| Pairing::new(peer, None))
    }

    fn fast_pair_active(&self) -> bool {
        (self.fast_pair.as_ref()).map_or(false, |fp| fp.pairing_active())
    }
}
