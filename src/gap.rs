//! Generic Access Profile ([Vol 3] Part C) assigned numbers and UUIDs.

pub use {consts::*, uuid::*};

mod consts;
mod uuid;
