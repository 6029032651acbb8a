//! Connection session tracking.
//!
//! A session exists from a successful connection status event until the
//! matching disconnection. Disconnection is a hard reset: the session and any
//! negotiated state are discarded without a final reply.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use tracing::{debug, info, warn};

use crate::att::DEFAULT_MTU;
use crate::le::Addr;

/// Stack-assigned connection identifier.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct ConnId(pub u16);

impl Display for ConnId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Conn({:#06X})", self.0)
    }
}

impl From<ConnId> for u16 {
    #[inline(always)]
    fn from(c: ConnId) -> Self {
        c.0
    }
}

/// State of one LE connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct Session {
    pub id: ConnId,
    pub peer: Addr,
    pub mtu: u16,
    pub encrypted: bool,
}

impl Session {
    #[inline]
    const fn new(id: ConnId, peer: Addr) -> Self {
        Self {
            id,
            peer,
            mtu: DEFAULT_MTU,
            encrypted: false,
        }
    }

    /// Returns the maximum ATT response payload length for this session.
    #[inline]
    #[must_use]
    pub const fn max_payload(&self) -> u16 {
        self.mtu.saturating_sub(1)
    }
}

/// Connected sessions by identifier.
#[derive(Debug, Default)]
pub struct Sessions(BTreeMap<ConnId, Session>);

impl Sessions {
    /// Creates an empty session tracker.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Starts a fresh session. Any existing session with the same identifier is
    /// replaced.
    pub fn connected(&mut self, id: ConnId, peer: Addr) -> &Session {
        info!("{id} connected to {peer}");
        if let Some(old) = self.0.insert(id, Session::new(id, peer)) {
            warn!("{id} replaced stale session with {}", old.peer);
        }
        &self.0[&id]
    }

    /// Ends a session, returning its final state.
    pub fn disconnected(&mut self, id: ConnId, reason: u8) -> Option<Session> {
        let s = self.0.remove(&id);
        match s {
            Some(ref s) => info!("{id} disconnected from {} (reason {reason:#04X})", s.peer),
            None => debug!("{id} disconnected without a session (reason {reason:#04X})"),
        }
        s
    }

    /// Records the negotiated ATT_MTU.
    pub fn set_mtu(&mut self, id: ConnId, mtu: u16) {
        match self.0.get_mut(&id) {
            Some(s) => {
                debug!("{id} ATT_MTU {mtu}");
                s.mtu = mtu;
            }
            None => warn!("{id} MTU update for unknown session"),
        }
    }

    /// Records the encryption status of every session with `peer`. Returns
    /// the number of affected sessions.
    pub fn set_encrypted(&mut self, peer: Addr, on: bool) -> usize {
        let mut n = 0;
        for s in self.0.values_mut().filter(|s| s.peer == peer) {
            s.encrypted = on;
            n += 1;
        }
        n
    }

    /// Returns the session for the specified identifier.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ConnId) -> Option<&Session> {
        self.0.get(&id)
    }

    /// Returns the ATT_MTU of a session or the default if there is none.
    #[inline]
    #[must_use]
    pub fn mtu(&self, id: ConnId) -> u16 {
        self.get(id).map_or(DEFAULT_MTU, |s| s.mtu)
    }

    /// Returns the number of connected sessions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether there are no connected sessions.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drops all sessions.
    pub fn clear(&mut self) {
        if !self.0.is_empty() {
            warn!("Dropping {} session(s)", self.0.len());
        }
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::le::RawAddr;

    use super::*;

    const PEER: Addr = Addr::Public(RawAddr::from_le_bytes([1, 2, 3, 4, 5, 6]));

    #[test]
    fn lifecycle() {
        let mut s = Sessions::new();
        let id = ConnId(0x40);
        assert_eq!(s.connected(id, PEER).mtu, DEFAULT_MTU);
        s.set_mtu(id, 185);
        assert_eq!(s.mtu(id), 185);
        assert_eq!(s.get(id).unwrap().max_payload(), 184);
        assert_eq!(s.set_encrypted(PEER, true), 1);
        assert!(s.get(id).unwrap().encrypted);

        // Reconnect with the same identifier starts over
        s.connected(id, PEER);
        assert_eq!(s.mtu(id), DEFAULT_MTU);
        assert!(!s.get(id).unwrap().encrypted);

        let last = s.disconnected(id, 0x13).unwrap();
        assert_eq!(last.peer, PEER);
        assert!(s.is_empty());
        assert_eq!(s.mtu(id), DEFAULT_MTU);
        assert!(s.disconnected(id, 0x13).is_none());
        s.set_mtu(id, 100);
        assert!(s.get(id).is_none());
    }
}
