//! Pairing and security policy ([Vol 3] Part H and [Vol 3] Part C,
//! Section 5).
//!
//! Pairing itself runs in the stack. This layer answers the stack's questions:
//! which capabilities to report, whether to accept a confirmation or security
//! request, and where keys are kept.

use std::fmt::Debug;

pub use {consts::*, keys::*, manager::*};

use crate::le::Addr;

mod consts;
mod keys;
mod manager;

/// Error type returned by the security layer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("authentication rejected by policy")]
    AuthenticationRejected,
    #[error("no resources available")]
    NoResources,
    #[error("link key operation rejected")]
    LinkKeyRejected,
}

/// Common security layer result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Security interface to the local device.
#[derive(Debug, Default)]
pub struct Device {
    display: Option<Box<dyn Display>>,
    confirm: Option<Box<dyn Confirm>>,
}

impl Device {
    /// Creates a new device with no I/O capabilities.
    #[inline(always)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provides a display device.
    #[inline(always)]
    #[must_use]
    pub fn with_display(mut self, d: Box<dyn Display>) -> Self {
        self.display = Some(d);
        self
    }

    /// Provides a yes/no input device.
    #[inline(always)]
    #[must_use]
    pub fn with_confirm(mut self, c: Box<dyn Confirm>) -> Self {
        self.confirm = Some(c);
        self
    }

    /// Returns IO capabilities based on the device configuration.
    #[must_use]
    pub const fn io_cap(&self) -> IoCap {
        let inp = match self.confirm {
            Some(_) => InputCap::YesNo,
            None => InputCap::None,
        };
        let out = match self.display {
            Some(_) => OutputCap::Numeric,
            None => OutputCap::None,
        };
        IoCap::new(inp, out)
    }
}

/// Device display capable of showing a 6-digit number to the user.
pub trait Display: Debug + Send {
    /// Shows a 6-digit number to the user, returning `true` when the number is
    /// visible or `false` on error.
    fn show(&mut self, peer: Addr, n: u32) -> bool;
}

/// Input mechanism for the user to indicate either 'yes' or 'no'.
pub trait Confirm: Debug + Send {
    /// Gets yes/no (`true`/`false`) confirmation that `n` matches the value
    /// shown on the peer.
    fn confirm(&mut self, peer: Addr, n: u32) -> bool;
}

/// Google Fast Pair provider. The seeker verifies the pairing passkey through
/// this collaborator, which acts as the local display.
pub trait FastPair: Debug + Send {
    /// Returns whether a Fast Pair seeker initiated the current pairing.
    fn pairing_active(&self) -> bool;

    /// Provides the numeric comparison value for seeker verification.
    fn set_passkey(&mut self, n: u32);
}
