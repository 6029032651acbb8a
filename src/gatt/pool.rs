use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use structbuf::{Pack, StructBuf};
use tracing::{trace, warn};

/// Response buffer pool with a fixed byte budget.
///
/// Buffers are drawn by the dispatcher and released by whoever drops them,
/// normally the transmission boundary after the PDU is sent. Clones share the
/// same budget.
#[derive(Clone, Debug)]
pub struct Pool(Arc<Mutex<Budget>>);

#[derive(Debug)]
struct Budget {
    cap: usize,
    used: usize,
}

impl Pool {
    /// Creates a pool with a budget of `cap` bytes.
    #[inline]
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self(Arc::new(Mutex::new(Budget { cap, used: 0 })))
    }

    /// Allocates an empty buffer that can hold up to `n` bytes. Returns
    /// [`None`] if the remaining budget is too small.
    #[must_use]
    pub fn alloc(&self, n: usize) -> Option<RspBuf> {
        let mut b = self.0.lock();
        if b.cap - b.used < n {
            warn!("Response buffer pool exhausted ({} of {} bytes in use)", b.used, b.cap);
            return None;
        }
        b.used += n;
        trace!("Allocated {n} byte response buffer");
        Some(RspBuf {
            buf: StructBuf::new(n),
            pool: Arc::clone(&self.0),
        })
    }

    /// Returns the pool budget in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.0.lock().cap
    }

    /// Returns the number of budget bytes held by live buffers.
    #[inline]
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.0.lock().used
    }
}

/// Response payload buffer that returns its budget to the [`Pool`] on drop.
#[must_use]
pub struct RspBuf {
    buf: StructBuf,
    pool: Arc<Mutex<Budget>>,
}

impl RspBuf {
    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.len() == 0
    }

    /// Returns the number of bytes that can still be written.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.lim() - self.buf.len()
    }

    /// Appends a `u16` in little-endian byte order.
    #[inline]
    pub(super) fn put_u16(&mut self, v: impl Into<u16>) {
        self.buf.append().u16(v);
    }

    /// Appends as much of `v` as fits, returning the number of bytes written.
    #[inline]
    pub(super) fn put_trunc(&mut self, v: &[u8]) -> usize {
        let n = v.len().min(self.remaining());
        self.buf.append().put(&v[..n]);
        n
    }
}

impl AsRef<[u8]> for RspBuf {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.buf.as_ref()
    }
}

impl Debug for RspBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RspBuf({:02X?})", self.buf.as_ref())
    }
}

impl Drop for RspBuf {
    fn drop(&mut self) {
        let n = self.buf.lim();
        let mut b = self.pool.lock();
        b.used -= n;
        trace!("Released {n} byte response buffer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget() {
        let p = Pool::new(8);
        let mut a = p.alloc(5).unwrap();
        assert_eq!(p.in_use(), 5);
        assert!(p.alloc(4).is_none());
        assert_eq!(a.put_trunc(b"Cypress"), 5);
        assert_eq!(a.as_ref(), b"Cypre");
        assert_eq!(a.remaining(), 0);
        let b = p.alloc(3).unwrap();
        assert_eq!(p.in_use(), 8);
        drop(a);
        assert_eq!(p.in_use(), 3);
        drop(b);
        assert_eq!(p.in_use(), 0);
        assert_eq!(p.capacity(), 8);
    }
}
