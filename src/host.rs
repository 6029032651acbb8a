//! Event dispatch between the Bluetooth stack and the control core.

use std::fmt::Debug;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

pub use {config::*, event::*};

use crate::att::{Opcode, RspResult};
use crate::conn::{ConnId, Sessions};
use crate::gatt::{headset_db, Db, Extension, Pool, Req, Rsp, Server};
use crate::le::Addr;
use crate::nvram::Nvram;
use crate::smp::{
    self, Device, FastPair, IdentityKeys, LinkKeyStore, MemLinkKeys, SecurityManager,
};

mod config;
mod event;
#[cfg(test)]
mod tests;

/// Error type returned by the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Smp(#[from] smp::Error),
}

/// Common host result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Event and the channel for its result.
pub type Request = (Event, oneshot::Sender<Result<Reply>>);

/// Outbound interface to the Bluetooth stack.
pub trait Stack: Debug + Send {
    /// Answers a user confirmation request.
    fn confirm_reply(&mut self, peer: Addr, accept: bool);

    /// Grants a peer security request.
    fn security_grant(&mut self, peer: Addr);

    /// Transmits the response to an ATT request. Never called for commands
    /// or confirmations.
    fn send_att(&mut self, conn: ConnId, req: Opcode, rsp: RspResult<Rsp>);

    /// Notifies the connection layer and profiles of an encryption change.
    fn encryption_changed(&mut self, peer: Addr, ok: bool);
}

/// Control core context. All state is owned here and mutated by one event at
/// a time.
#[derive(Debug)]
pub struct Host<S> {
    cfg: Config,
    stack: S,
    enabled: bool,
    pairing_allowed: bool,
    db: Db,
    srv: Server,
    sessions: Sessions,
    sm: SecurityManager,
    nv: Box<dyn Nvram>,
    irk: IdentityKeys,
    link_keys: Box<dyn LinkKeyStore>,
}

impl<S: Stack> Host<S> {
    /// Creates a host and restores local identity keys from `nv`.
    #[must_use]
    pub fn new(cfg: Config, stack: S, nv: Box<dyn Nvram>) -> Self {
        let db = headset_db(&cfg);
        let srv = Server::new(Pool::new(cfg.buf_pool_size), cfg.max_mtu);
        let sm = SecurityManager::new(Device::new(), cfg.auto_accept_numeric_comparison);
        let irk = IdentityKeys::restore(nv.as_ref());
        Self {
            pairing_allowed: cfg.pairing_allowed,
            cfg,
            stack,
            enabled: false,
            db,
            srv,
            sessions: Sessions::new(),
            sm,
            nv,
            irk,
            link_keys: Box::<MemLinkKeys>::default(),
        }
    }

    /// Provides the local device interface used for pairing.
    #[must_use]
    pub fn with_device(mut self, dev: Device) -> Self {
        self.sm = self.sm.with_device(dev);
        self
    }

    /// Provides the Fast Pair provider. Ignored unless Fast Pair is enabled.
    #[must_use]
    pub fn with_fast_pair(mut self, fp: Box<dyn FastPair>) -> Self {
        if self.cfg.fast_pair {
            self.sm = self.sm.with_fast_pair(fp);
        } else {
            warn!("Fast Pair provider ignored: Fast Pair disabled");
        }
        self
    }

    /// Provides the server for attributes outside of the static database
    /// (Fast Pair and firmware upgrade).
    #[must_use]
    pub fn with_extension(mut self, ext: Box<dyn Extension>) -> Self {
        self.srv = self.srv.with_extension(ext);
        self
    }

    /// Provides persistent storage for paired device link keys.
    #[must_use]
    pub fn with_link_keys(mut self, s: Box<dyn LinkKeyStore>) -> Self {
        self.link_keys = s;
        self
    }

    /// Returns the configuration.
    #[inline(always)]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns whether the stack reported successful initialization.
    #[inline(always)]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns whether peer security requests are granted.
    #[inline(always)]
    #[must_use]
    pub const fn pairing_allowed(&self) -> bool {
        self.pairing_allowed
    }

    /// Sets whether peer security requests are granted.
    pub fn set_pairing_allowed(&mut self, allow: bool) {
        info!("Pairing {}", if allow { "allowed" } else { "disallowed" });
        self.pairing_allowed = allow;
    }

    /// Returns the attribute database.
    #[inline(always)]
    #[must_use]
    pub const fn db(&self) -> &Db {
        &self.db
    }

    /// Returns the GATT request dispatcher.
    #[inline(always)]
    #[must_use]
    pub const fn server(&self) -> &Server {
        &self.srv
    }

    /// Returns active connection sessions.
    #[inline(always)]
    #[must_use]
    pub const fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    /// Returns the pairing state machine.
    #[inline(always)]
    #[must_use]
    pub const fn security(&self) -> &SecurityManager {
        &self.sm
    }

    /// Returns the local identity key cache.
    #[inline(always)]
    #[must_use]
    pub const fn identity_keys(&self) -> &IdentityKeys {
        &self.irk
    }

    /// Returns the stack interface.
    #[inline(always)]
    #[must_use]
    pub const fn stack(&self) -> &S {
        &self.stack
    }

    /// Returns the stack interface.
    #[inline(always)]
    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    /// Handles one stack event to completion.
    pub fn handle(&mut self, evt: Event) -> Result<Reply> {
        trace!("{evt:?}");
        let r = self.dispatch(evt);
        if let Err(ref e) = r {
            debug!("Event failed: {e}");
        }
        r
    }

    /// Receives events until the channel is closed, sending each result back
    /// to the requester.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<Request>) {
        while let Some((evt, tx)) = rx.recv().await {
            let name = evt.name();
            if tx.send(self.handle(evt)).is_err() {
                debug!("{name} result dropped by requester");
            }
        }
        debug!("Event channel closed");
    }

    fn dispatch(&mut self, evt: Event) -> Result<Reply> {
        use Event::*;
        match evt {
            Enabled { ok } => self.stack_enabled(ok),
            Disabled { reason } => {
                info!("Stack disabled ({reason:#04X})");
                self.enabled = false;
                self.sessions.clear();
                self.sm.reset();
            }
            IoCapRequest { peer, transport } => {
                return Ok(Reply::IoCap(self.sm.io_cap_request(peer, transport)));
            }
            IoCapResponse { peer, io_cap } => self.sm.io_cap_response(peer, io_cap),
            UserConfirmRequest {
                peer,
                value,
                just_works,
            } => {
                let accept = self.sm.user_confirm(peer, value, just_works);
                self.stack.confirm_reply(peer, accept);
            }
            PasskeyNotification { peer, passkey } => self.sm.passkey_notification(peer, passkey),
            PairingComplete {
                peer,
                transport,
                status,
            } => {
                self.sm.pairing_complete(peer, transport, status);
            }
            EncryptionStatus { peer, ok } => {
                self.sm.encryption_status(peer, ok);
                if self.sessions.set_encrypted(peer, ok) == 0 {
                    debug!("No LE session with {peer}");
                }
                self.stack.encryption_changed(peer, ok);
            }
            SecurityRequest { peer } => {
                self.sm.security_request(peer, self.pairing_allowed)?;
                self.stack.security_grant(peer);
            }
            LinkKeysUpdate(keys) => {
                if !self.link_keys.update(&keys) {
                    warn!("Failed to store link keys for {}", keys.peer);
                    return Err(smp::Error::LinkKeyRejected.into());
                }
            }
            LinkKeysRequest { peer } => {
                return (self.link_keys.request(peer))
                    .map(Reply::LinkKeys)
                    .ok_or_else(|| {
                        debug!("No link keys for {peer}");
                        smp::Error::LinkKeyRejected.into()
                    });
            }
            LocalKeysUpdate(keys) => {
                // Persistence failure is not reported to the stack
                if let Err(e) = self.irk.update(self.nv.as_ref(), &keys) {
                    error!("Failed to persist local identity keys: {e}");
                }
            }
            LocalKeysRequest => {
                return (self.irk.get().cloned())
                    .map(Reply::LocalKeys)
                    .ok_or(smp::Error::NoResources.into());
            }
            ConnectionStatus {
                conn,
                peer,
                connected,
                reason,
            } => {
                if connected {
                    self.sessions.connected(conn, peer);
                } else {
                    self.sessions.disconnected(conn, reason);
                }
                self.srv.connection(conn, connected);
            }
            Att(req) => self.att(req),
        }
        Ok(Reply::Done)
    }

    fn stack_enabled(&mut self, ok: bool) {
        if !ok {
            error!("Stack initialization failed");
            return;
        }
        info!("Stack enabled");
        self.enabled = true;
        self.db.dump();
    }

    fn att(&mut self, mut req: Req) {
        let (conn, op) = (req.conn, req.op);
        if self.sessions.get(conn).is_none() {
            warn!("{op} on {conn} without a session");
        }
        let max_payload = (self.sessions.mtu(conn)).saturating_sub(op.rsp_overhead());
        req.max_len = req.max_len.min(max_payload);
        let rsp = self.srv.handle(&mut self.db, req);
        if let Ok(Rsp::Mtu(mtu)) = rsp {
            self.sessions.set_mtu(conn, mtu);
        }
        if op.rsp().is_some() {
            self.stack.send_att(conn, op, rsp);
        } else if let Err(e) = rsp {
            debug!("Suppressed error for {op}: {e}");
        }
    }
}
