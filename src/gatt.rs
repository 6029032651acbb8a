//! Generic Attribute Profile ([Vol 3] Part G) server.
//!
//! The attribute table is a static [`Db`] built once at startup. Requests are
//! routed by [`Server`], which packs responses into buffers drawn from a
//! bounded [`Pool`]. Each buffer returns its budget to the pool when the
//! transmission boundary drops it.

use bitflags::bitflags;

pub use {db::*, pool::*, server::*, service::*};

mod db;
mod pool;
mod server;
mod service;

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct Prop: u8 {
        /// Permits broadcasts of the Characteristic Value.
        const BROADCAST = 0x01;
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permits writes of the Characteristic Value without response.
        const WRITE_CMD = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment.
        const NOTIFY = 0x10;
        /// Permits indications of a Characteristic Value with acknowledgment.
        const INDICATE = 0x20;
        /// Permits signed writes to the Characteristic Value.
        const SIGNED_WRITE = 0x40;
        /// Additional properties are defined in the Characteristic Extended
        /// Properties descriptor.
        const EXT_PROPS = 0x80;
    }
}
