use crate::conn::ConnId;
use crate::gatt::Req;
use crate::le::Addr;
use crate::smp::{IoCap, IoCapReply, LinkKeys, LocalKeys, Transport};

/// Event delivered by the stack.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Event {
    /// Stack initialization finished.
    Enabled { ok: bool },
    /// Stack was shut down.
    Disabled { reason: u8 },
    /// Local IO capabilities are needed for pairing.
    IoCapRequest { peer: Addr, transport: Transport },
    /// Peer reported its BR/EDR IO capabilities.
    IoCapResponse { peer: Addr, io_cap: IoCap },
    /// Numeric comparison or Just Works confirmation is needed.
    UserConfirmRequest {
        peer: Addr,
        value: u32,
        just_works: bool,
    },
    /// Passkey should be shown to the user.
    PasskeyNotification { peer: Addr, passkey: u32 },
    /// Pairing finished with `status` 0 on success.
    PairingComplete {
        peer: Addr,
        transport: Transport,
        status: u8,
    },
    /// Link encryption changed.
    EncryptionStatus { peer: Addr, ok: bool },
    /// Peer requested security.
    SecurityRequest { peer: Addr },
    /// Paired device link keys should be persisted.
    LinkKeysUpdate(LinkKeys),
    /// Paired device link keys are needed.
    LinkKeysRequest { peer: Addr },
    /// Local identity keys should be persisted.
    LocalKeysUpdate(LocalKeys),
    /// Local identity keys are needed. Issued once at startup.
    LocalKeysRequest,
    /// LE connection was established or terminated.
    ConnectionStatus {
        conn: ConnId,
        peer: Addr,
        connected: bool,
        reason: u8,
    },
    /// Attribute protocol request, including MTU exchange and indication
    /// confirmation.
    Att(Req),
}

impl Event {
    /// Returns the event name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match *self {
            Self::Enabled { .. } => "Enabled",
            Self::Disabled { .. } => "Disabled",
            Self::IoCapRequest { .. } => "IoCapRequest",
            Self::IoCapResponse { .. } => "IoCapResponse",
            Self::UserConfirmRequest { .. } => "UserConfirmRequest",
            Self::PasskeyNotification { .. } => "PasskeyNotification",
            Self::PairingComplete { .. } => "PairingComplete",
            Self::EncryptionStatus { .. } => "EncryptionStatus",
            Self::SecurityRequest { .. } => "SecurityRequest",
            Self::LinkKeysUpdate(_) => "LinkKeysUpdate",
            Self::LinkKeysRequest { .. } => "LinkKeysRequest",
            Self::LocalKeysUpdate(_) => "LocalKeysUpdate",
            Self::LocalKeysRequest => "LocalKeysRequest",
            Self::ConnectionStatus { .. } => "ConnectionStatus",
            Self::Att(_) => "Att",
        }
    }
}

/// Successful event result returned to the stack.
#[derive(Debug)]
#[non_exhaustive]
pub enum Reply {
    /// Event handled with nothing to return.
    Done,
    /// Local IO capabilities.
    IoCap(IoCapReply),
    /// Stored link keys.
    LinkKeys(LinkKeys),
    /// Stored local identity keys.
    LocalKeys(LocalKeys),
}
