use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

use tracing::{debug, error, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::le::Addr;
use crate::nvram::{self, Nvram, RecordId};

/// Local identity keys: a key type mask followed by IR, IRK, DHK, and ER.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
#[must_use]
#[repr(transparent)]
pub struct LocalKeys([u8; Self::LEN]);

impl LocalKeys {
    /// Encoded length.
    pub const LEN: usize = 1 + 4 * 16;

    /// Creates local keys from their encoded form.
    #[inline(always)]
    pub const fn new(v: [u8; Self::LEN]) -> Self {
        Self(v)
    }

    /// Creates local keys from a slice. Returns [`None`] if the length is
    /// wrong.
    #[inline]
    #[must_use]
    pub fn from_slice(v: &[u8]) -> Option<Self> {
        <[u8; Self::LEN]>::try_from(v).ok().map(Self)
    }

    /// Returns the encoded keys.
    #[inline(always)]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Returns the identity resolving key.
    #[inline]
    #[must_use]
    pub fn irk(&self) -> &[u8] {
        &self.0[17..33]
    }
}

impl Debug for LocalKeys {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LocalKeys").field(&"<secret keys>").finish()
    }
}

/// Local identity key cache backed by persistent storage.
///
/// The cache is loaded once at startup. An update is persisted only if it
/// differs from the cached keys, and the cache changes only after the write
/// is confirmed, so the persisted keys stay authoritative.
#[derive(Debug)]
pub struct IdentityKeys {
    keys: LocalKeys,
    valid: bool,
}

impl IdentityKeys {
    /// Restores keys from storage. Any failure leaves the cache invalid.
    pub fn restore(nv: &dyn Nvram) -> Self {
        let r = (nv.read(RecordId::LocalIdentityKeys)).and_then(|v| {
            LocalKeys::from_slice(&v).ok_or(nvram::Error::Short {
                want: LocalKeys::LEN,
                got: v.len(),
            })
        });
        match r {
            Ok(keys) => {
                info!("Restored local identity keys");
                Self { keys, valid: true }
            }
            Err(e) => {
                warn!("Local identity keys not restored: {e}");
                Self {
                    keys: LocalKeys::new([0; LocalKeys::LEN]),
                    valid: false,
                }
            }
        }
    }

    /// Returns the cached keys if they were restored or updated successfully.
    #[inline]
    #[must_use]
    pub const fn get(&self) -> Option<&LocalKeys> {
        if self.valid {
            Some(&self.keys)
        } else {
            None
        }
    }

    /// Returns whether the cache holds persisted keys.
    #[inline(always)]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Persists and caches new keys. Returns `Ok(false)` if the keys are
    /// unchanged. On error, the previous keys remain in effect.
    pub fn update(&mut self, nv: &dyn Nvram, new: &LocalKeys) -> nvram::Result<bool> {
        if self.valid && self.keys == *new {
            debug!("Local identity keys unchanged");
            return Ok(false);
        }
        let r = nv.write(RecordId::LocalIdentityKeys, new.as_bytes());
        match r {
            Ok(n) if n == LocalKeys::LEN => {}
            Ok(got) => {
                let e = nvram::Error::Short {
                    want: LocalKeys::LEN,
                    got,
                };
                error!("Failed to persist local identity keys: {e}");
                return Err(e);
            }
            Err(e) => {
                error!("Failed to persist local identity keys: {e}");
                return Err(e);
            }
        }
        self.keys = new.clone();
        self.valid = true;
        info!("Updated local identity keys");
        Ok(true)
    }
}

/// Paired device link keys. The contents are opaque to this crate.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct LinkKeys {
    #[zeroize(skip)]
    pub peer: Addr,
    pub data: Vec<u8>,
}

impl Debug for LinkKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        (f.debug_struct("LinkKeys").field("peer", &self.peer))
            .field("data", &"<secret keys>")
            .finish()
    }
}

/// Paired device link key persistence collaborator.
pub trait LinkKeyStore: Debug + Send {
    /// Saves keys for a peer, returning `true` on success.
    fn update(&mut self, keys: &LinkKeys) -> bool;

    /// Loads keys for a peer.
    fn request(&mut self, peer: Addr) -> Option<LinkKeys>;
}

/// Volatile link key store.
#[derive(Debug, Default)]
pub struct MemLinkKeys(BTreeMap<Addr, LinkKeys>);

impl LinkKeyStore for MemLinkKeys {
    fn update(&mut self, keys: &LinkKeys) -> bool {
        self.0.insert(keys.peer, keys.clone());
        true
    }

    fn request(&mut self, peer: Addr) -> Option<LinkKeys> {
        self.0.get(&peer).cloned()
    }
}
