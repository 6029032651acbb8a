//! Headset LE control core.
//!
//! A small GATT attribute server with request dispatch, combined with the
//! pairing and security policy that governs link authentication and local
//! identity key persistence. The radio stack, audio profiles, and NVRAM
//! primitives are external collaborators reached through [`host::Stack`],
//! [`nvram::Nvram`], and the optional traits in [`smp`] and [`gatt`].
//!
//! All state is owned by a single [`Host`] context. Events from the stack are
//! handled to completion, one at a time, in arrival order.

pub use host::{Config, Event, Host, Reply};

pub mod att;
pub mod conn;
#[cfg(feature = "fs")]
pub mod fs;
pub mod gap;
pub mod gatt;
pub mod host;
pub mod le;
pub mod nvram;
pub mod smp;

mod util;
