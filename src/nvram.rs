//! Persistent storage boundary.
//!
//! Storage is an external collaborator holding one opaque blob per record.
//! Both operations are synchronous and bounded; a backend that cannot complete
//! immediately returns [`Error::NoResources`].

use std::collections::BTreeMap;
use std::fmt::Debug;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Error type returned by storage backends.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("record not found")]
    NotFound,
    #[error("storage busy")]
    NoResources,
    #[error("short transfer ({got} of {want} bytes)")]
    Short { want: usize, got: usize },
    #[error("I/O error: {0}")]
    Io(String),
}

/// Common storage result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Record identifier.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u16)]
pub enum RecordId {
    /// Paired device link keys, owned by the link key collaborator.
    LinkKeys = 0x0200,
    /// Local identity keys.
    LocalIdentityKeys = 0x0201,
}

crate::util::impl_display_via_debug! { RecordId }

/// Interface to persistent storage.
pub trait Nvram: Debug + Send {
    /// Reads a record.
    fn read(&self, id: RecordId) -> Result<Vec<u8>>;

    /// Writes a record, returning the number of bytes written.
    fn write(&self, id: RecordId, v: &[u8]) -> Result<usize>;
}

/// Volatile storage backend.
#[derive(Debug, Default)]
pub struct MemNvram {
    rec: Mutex<BTreeMap<RecordId, Vec<u8>>>,
    fail_writes: Mutex<Option<Error>>,
}

impl MemNvram {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Causes all subsequent writes to fail with `e`, or restores normal
    /// operation if `e` is [`None`].
    pub fn fail_writes(&self, e: Option<Error>) {
        *self.fail_writes.lock() = e;
    }

    /// Removes all records.
    pub fn clear(&self) {
        self.rec.lock().clear();
    }
}

impl Nvram for MemNvram {
    fn read(&self, id: RecordId) -> Result<Vec<u8>> {
        (self.rec.lock().get(&id).cloned()).ok_or(Error::NotFound)
    }

    fn write(&self, id: RecordId, v: &[u8]) -> Result<usize> {
        if let Some(ref e) = *self.fail_writes.lock() {
            warn!("Simulated {id} write failure: {e}");
            return Err(e.clone());
        }
        self.rec.lock().insert(id, v.to_vec());
        debug!("Wrote {} bytes to {id}", v.len());
        Ok(v.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem() {
        let nv = MemNvram::new();
        assert_eq!(nv.read(RecordId::LocalIdentityKeys), Err(Error::NotFound));
        assert_eq!(nv.write(RecordId::LocalIdentityKeys, &[1, 2]), Ok(2));
        assert_eq!(nv.read(RecordId::LocalIdentityKeys), Ok(vec![1, 2]));
        nv.fail_writes(Some(Error::NoResources));
        assert_eq!(nv.write(RecordId::LocalIdentityKeys, &[3]), Err(Error::NoResources));
        assert_eq!(nv.read(RecordId::LocalIdentityKeys), Ok(vec![1, 2]));
        assert_eq!(u16::from(RecordId::LinkKeys), 0x0200);
    }
}
