use std::borrow::Cow;
use std::fmt::Debug;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::att::{ErrorCode, ErrorRsp, Handle, HandleRange, Opcode, RspResult};
use crate::conn::ConnId;
use crate::gap::Uuid;

use super::*;

/// Maximum attribute value length in a Read By Type response, limited by the
/// one-byte pair length field ([Vol 3] Part F, Section 3.4.4.2).
const MAX_PAIR_VAL: usize = u8::MAX as usize - 2;

/// Optional handler for attributes that are served outside of the static
/// database, such as an upgrade service.
pub trait Extension: Debug + Send {
    /// Returns whether the extension serves the specified handle.
    fn owns(&self, hdl: Handle) -> bool;

    /// Returns the full attribute value.
    fn read(&mut self, conn: ConnId, hdl: Handle) -> Result<Vec<u8>, ErrorCode>;

    /// Writes an attribute value.
    fn write(&mut self, conn: ConnId, hdl: Handle, val: &[u8]) -> Result<(), ErrorCode>;

    /// Handles an indication confirmation.
    fn confirm(&mut self, conn: ConnId, hdl: Handle);

    /// Observes connection status changes.
    fn connection(&mut self, _conn: ConnId, _connected: bool) {}
}

/// Attribute protocol request received from the stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Req {
    pub conn: ConnId,
    pub op: Opcode,
    /// Maximum response payload length.
    pub max_len: u16,
    pub params: Params,
}

/// Request parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Params {
    Read { hdl: u16, off: u16 },
    ReadByType { start: u16, end: u16, typ: Uuid },
    ReadMultiple(SmallVec<[u16; 8]>),
    Write { hdl: u16, val: Vec<u8> },
    Mtu(u16),
    Confirm(u16),
}

impl Req {
    /// Creates an `ATT_READ_REQ`.
    #[inline]
    #[must_use]
    pub const fn read(conn: ConnId, hdl: u16, max_len: u16) -> Self {
        Self::new(conn, Opcode::ReadReq, max_len, Params::Read { hdl, off: 0 })
    }

    /// Creates an `ATT_READ_BLOB_REQ`.
    #[inline]
    #[must_use]
    pub const fn read_blob(conn: ConnId, hdl: u16, off: u16, max_len: u16) -> Self {
        Self::new(conn, Opcode::ReadBlobReq, max_len, Params::Read { hdl, off })
    }

    /// Creates an `ATT_READ_BY_TYPE_REQ`.
    #[inline]
    #[must_use]
    pub const fn read_by_type(conn: ConnId, start: u16, end: u16, typ: Uuid, max_len: u16) -> Self {
        let p = Params::ReadByType { start, end, typ };
        Self::new(conn, Opcode::ReadByTypeReq, max_len, p)
    }

    /// Creates an `ATT_READ_MULTIPLE_REQ`.
    #[inline]
    #[must_use]
    pub fn read_multiple(conn: ConnId, hdls: &[u16], max_len: u16) -> Self {
        let p = Params::ReadMultiple(SmallVec::from_slice(hdls));
        Self::new(conn, Opcode::ReadMultipleReq, max_len, p)
    }

    /// Creates an `ATT_READ_MULTIPLE_VARIABLE_REQ`.
    #[inline]
    #[must_use]
    pub fn read_multiple_variable(conn: ConnId, hdls: &[u16], max_len: u16) -> Self {
        let p = Params::ReadMultiple(SmallVec::from_slice(hdls));
        Self::new(conn, Opcode::ReadMultipleVariableReq, max_len, p)
    }

    /// Creates an `ATT_WRITE_REQ`.
    #[inline]
    #[must_use]
    pub fn write(conn: ConnId, hdl: u16, val: impl Into<Vec<u8>>) -> Self {
        let p = Params::Write {
            hdl,
            val: val.into(),
        };
        Self::new(conn, Opcode::WriteReq, 0, p)
    }

    /// Creates an `ATT_WRITE_CMD`.
    #[inline]
    #[must_use]
    pub fn write_cmd(conn: ConnId, hdl: u16, val: impl Into<Vec<u8>>) -> Self {
        Self {
            op: Opcode::WriteCmd,
            ..Self::write(conn, hdl, val)
        }
    }

    /// Creates an `ATT_EXCHANGE_MTU_REQ`.
    #[inline]
    #[must_use]
    pub const fn mtu(conn: ConnId, mtu: u16) -> Self {
        Self::new(conn, Opcode::ExchangeMtuReq, 0, Params::Mtu(mtu))
    }

    /// Creates an `ATT_HANDLE_VALUE_CFM`.
    #[inline]
    #[must_use]
    pub const fn confirm(conn: ConnId, hdl: u16) -> Self {
        Self::new(conn, Opcode::HandleValueCfm, 0, Params::Confirm(hdl))
    }

    #[inline(always)]
    const fn new(conn: ConnId, op: Opcode, max_len: u16, params: Params) -> Self {
        Self {
            conn,
            op,
            max_len,
            params,
        }
    }
}

/// Successful response.
#[derive(Debug)]
#[non_exhaustive]
pub enum Rsp {
    /// Read or Read Blob value.
    Read(RspBuf),
    /// Handle-value pairs of uniform length `pair_len`.
    ReadByType { pair_len: u8, buf: RspBuf },
    /// Concatenated values, length-prefixed for the variable variant.
    ReadMultiple(RspBuf),
    Write(Handle),
    Mtu(u16),
    Confirmed,
}

impl Rsp {
    /// Returns the response payload, excluding the opcode and any fixed
    /// parameters.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match *self {
            Self::Read(ref b) | Self::ReadByType { buf: ref b, .. } | Self::ReadMultiple(ref b) => {
                b.as_ref()
            }
            Self::Write(_) | Self::Mtu(_) | Self::Confirmed => &[],
        }
    }
}

/// GATT request dispatcher. Every request produces exactly one outcome, and
/// every error is addressed to the request that caused it.
#[derive(Debug)]
pub struct Server {
    pool: Pool,
    max_mtu: u16,
    ext: Option<Box<dyn Extension>>,
}

impl Server {
    /// Creates a new dispatcher.
    #[inline]
    #[must_use]
    pub fn new(pool: Pool, max_mtu: u16) -> Self {
        Self {
            pool,
            max_mtu,
            ext: None,
        }
    }

    /// Installs an extension for handles outside of the static database.
    #[inline]
    #[must_use]
    pub fn with_extension(mut self, ext: Box<dyn Extension>) -> Self {
        self.ext = Some(ext);
        self
    }

    /// Returns the response buffer pool.
    #[inline(always)]
    #[must_use]
    pub const fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Forwards a connection status change to the extension.
    pub fn connection(&mut self, conn: ConnId, connected: bool) {
        if let Some(ref mut ext) = self.ext {
            ext.connection(conn, connected);
        }
    }

    /// Returns the server's maximum ATT_MTU.
    #[inline(always)]
    #[must_use]
    pub const fn max_mtu(&self) -> u16 {
        self.max_mtu
    }

    /// Handles one request.
    pub fn handle(&mut self, db: &mut Db, req: Req) -> RspResult<Rsp> {
        let Req {
            conn,
            op,
            max_len,
            params,
        } = req;
        let max_len = usize::from(max_len);
        let r = match params {
            Params::Read { hdl, off } => self.read(db, conn, op, hdl, off, max_len),
            Params::ReadByType { start, end, typ } => {
                self.read_by_type(db, conn, op, (start, end), typ, max_len)
            }
            Params::ReadMultiple(ref hdls) => self.read_multiple(db, conn, op, hdls, max_len),
            Params::Write { hdl, ref val } => self.write(db, conn, op, hdl, val),
            Params::Mtu(mtu) => Ok(self.exchange_mtu(conn, mtu)),
            Params::Confirm(hdl) => Ok(self.confirm(conn, hdl)),
        };
        if let Err(ref e) = r {
            warn!("{e}");
        }
        r
    }

    /// Handles Read and Read Blob requests
    /// ([Vol 3] Part F, Sections 3.4.4.3 and 3.4.4.5).
    fn read(
        &mut self,
        db: &mut Db,
        conn: ConnId,
        op: Opcode,
        hdl: u16,
        off: u16,
        max_len: usize,
    ) -> RspResult<Rsp> {
        let Some(h) = Handle::new(hdl) else {
            return op.hdl_err(ErrorCode::InvalidHandle, hdl);
        };
        let ext_val;
        let v = match self.ext {
            Some(ref mut ext) if ext.owns(h) => {
                ext_val = ext.read(conn, h).map_err(|e| ErrorRsp::new(op, hdl, e))?;
                ext_val.as_slice()
            }
            _ => match db.lookup(h) {
                Some(v) => v,
                None => return op.hdl_err(ErrorCode::InvalidHandle, hdl),
            },
        };
        let off = usize::from(off);
        if v.len() < off {
            return op.hdl_err(ErrorCode::InvalidOffset, hdl);
        }
        let v = &v[off..];
        let v = &v[..v.len().min(max_len)];
        let mut buf = self.alloc(op, hdl, v.len())?;
        buf.put_trunc(v);
        trace!("{conn} read {h} at {off}: {v:02X?}");
        Ok(Rsp::Read(buf))
    }

    /// Handles Read By Type request ([Vol 3] Part F, Section 3.4.4.1). All
    /// pairs in the response have the length of the first one.
    fn read_by_type(
        &mut self,
        db: &Db,
        conn: ConnId,
        op: Opcode,
        (start, end): (u16, u16),
        typ: Uuid,
        max_len: usize,
    ) -> RspResult<Rsp> {
        let Some(hdls) = HandleRange::try_new(start, end) else {
            return op.hdl_err(ErrorCode::InvalidHandle, start);
        };
        let mut buf = self.alloc(op, start, max_len)?;
        let mut pair_len = 0;
        let mut next = Some(hdls.start());
        while let Some(h) = next.and_then(|s| db.find_in_range(s, hdls.end(), typ)) {
            let v = match self.ext {
                Some(ref mut ext) if ext.owns(h) => {
                    Cow::Owned(ext.read(conn, h).map_err(|e| ErrorRsp::new(op, h.into(), e))?)
                }
                _ => match db.get(h) {
                    Some(v) => Cow::Borrowed(v),
                    None => {
                        warn!("{h} matches {typ} but has no value");
                        return op.hdl_err(ErrorCode::UnlikelyError, start);
                    }
                },
            };
            let n = 2 + v.len().min(MAX_PAIR_VAL);
            if pair_len == 0 {
                if buf.remaining() < 2 {
                    break;
                }
                pair_len = n.min(buf.remaining());
            } else if n != pair_len || buf.remaining() < pair_len {
                break;
            }
            buf.put_u16(h);
            buf.put_trunc(&v[..pair_len - 2]);
            next = h.next();
        }
        if pair_len == 0 {
            debug!("{conn} no {typ} attributes in {start:#06X}..={end:#06X}");
            return op.hdl_err(ErrorCode::InvalidHandle, start);
        }
        #[allow(clippy::cast_possible_truncation)]
        let pair_len = pair_len as u8;
        Ok(Rsp::ReadByType { pair_len, buf })
    }

    /// Handles Read Multiple and Read Multiple Variable Length requests
    /// ([Vol 3] Part F, Sections 3.4.4.7 and 3.4.4.11). All handles are
    /// resolved before anything is written to the response.
    fn read_multiple(
        &mut self,
        db: &Db,
        conn: ConnId,
        op: Opcode,
        hdls: &[u16],
        max_len: usize,
    ) -> RspResult<Rsp> {
        let Some(&first) = hdls.first() else {
            return op.err(ErrorCode::InvalidPdu);
        };
        let mut vals: SmallVec<[Cow<[u8]>; 8]> = SmallVec::with_capacity(hdls.len());
        for &hdl in hdls {
            let v = Handle::new(hdl).and_then(|h| match self.ext {
                Some(ref mut ext) if ext.owns(h) => ext.read(conn, h).ok().map(Cow::Owned),
                _ => db.get(h).map(Cow::Borrowed),
            });
            let Some(v) = v else {
                warn!("{conn} {op} for unresolved handle {hdl:#06X}");
                return op.hdl_err(ErrorCode::UnlikelyError, first);
            };
            vals.push(v);
        }
        let mut buf = self.alloc(op, first, max_len)?;
        let var = matches!(op, Opcode::ReadMultipleVariableReq);
        for v in vals {
            if var {
                if buf.remaining() < 2 {
                    break;
                }
                buf.put_u16(u16::try_from(v.len()).unwrap_or(u16::MAX));
            }
            if buf.put_trunc(&v) < v.len() || buf.remaining() == 0 {
                break;
            }
        }
        Ok(Rsp::ReadMultiple(buf))
    }

    /// Handles Write Request and Write Command
    /// ([Vol 3] Part F, Sections 3.4.5.1 and 3.4.5.3).
    fn write(
        &mut self,
        db: &Db,
        conn: ConnId,
        op: Opcode,
        hdl: u16,
        val: &[u8],
    ) -> RspResult<Rsp> {
        let Some(h) = Handle::new(hdl) else {
            return op.hdl_err(ErrorCode::InvalidHandle, hdl);
        };
        match self.ext {
            Some(ref mut ext) if ext.owns(h) => {
                ext.write(conn, h, val).map_err(|e| ErrorRsp::new(op, hdl, e))?;
            }
            _ => match db.typ(h) {
                Some(typ) => debug!("{conn} wrote {h} <{typ}>: {val:02X?}"),
                None => debug!("{conn} wrote unknown {h}: {val:02X?}"),
            },
        }
        Ok(Rsp::Write(h))
    }

    /// Handles Exchange MTU request ([Vol 3] Part F, Section 3.4.2.1).
    fn exchange_mtu(&self, conn: ConnId, mtu: u16) -> Rsp {
        let agreed = mtu.min(self.max_mtu);
        debug!("{conn} MTU: requested {mtu}, agreed {agreed}");
        Rsp::Mtu(agreed)
    }

    /// Handles Handle Value Confirmation ([Vol 3] Part F, Section 3.4.7.3).
    fn confirm(&mut self, conn: ConnId, hdl: u16) -> Rsp {
        match (self.ext.as_mut(), Handle::new(hdl)) {
            (Some(ext), Some(h)) if ext.owns(h) => ext.confirm(conn, h),
            _ => debug!("{conn} confirmed indication for {hdl:#06X}"),
        }
        Rsp::Confirmed
    }

    /// Allocates a response buffer.
    fn alloc(&self, op: Opcode, hdl: u16, n: usize) -> RspResult<RspBuf> {
        (self.pool.alloc(n)).ok_or(ErrorRsp::new(op, hdl, ErrorCode::InsufficientResources))
    }
}

#[cfg(test)]
mod tests {
    use crate::gap::{Characteristic, Declaration, Service};

    use super::*;

    const C: ConnId = ConnId(1);
    const BATT: u16 = 0x63;
    const MFR: u16 = 0x4F;

    fn db() -> Db {
        Db::build()
            .primary_service(0x40, Service::DeviceInformation)
            .characteristic(0x4E, Characteristic::ManufacturerNameString, Prop::READ, b"Cypress\0")
            .characteristic(0x50, Characteristic::ModelNumberString, Prop::READ, b"1234\0\0\0\0")
            .characteristic(0x52, Characteristic::SystemId, Prop::READ, &[0xBB; 8])
            .primary_service(0x60, Service::Battery)
            .dynamic_characteristic(
                0x62,
                Characteristic::BatteryLevel,
                Prop::READ,
                &[0],
                ReadEffect::counter(5),
            )
            .cccd(0x64)
            .freeze()
    }

    fn srv() -> Server {
        Server::new(Pool::new(7 * 1024), 365)
    }

    fn err(r: RspResult<Rsp>) -> ErrorRsp {
        r.unwrap_err()
    }

    #[test]
    fn read() {
        let (mut s, mut db) = (srv(), db());
        let mut read = |req| s.handle(&mut db, req).unwrap().payload().to_vec();
        assert_eq!(read(Req::read(C, MFR, 22)), b"Cypress\0");
        assert_eq!(read(Req::read(C, MFR, 4)), b"Cypr");
        assert_eq!(read(Req::read_blob(C, MFR, 5, 22)), b"ss\0");
        assert!(read(Req::read_blob(C, MFR, 8, 22)).is_empty());
        assert_eq!(s.pool().in_use(), 0);
    }

    #[test]
    fn read_errors() {
        let (mut s, mut db) = (srv(), db());
        let e = err(s.handle(&mut db, Req::read_blob(C, MFR, 9, 22)));
        assert_eq!(e, ErrorRsp::new(Opcode::ReadBlobReq, MFR, ErrorCode::InvalidOffset));
        let e = err(s.handle(&mut db, Req::read(C, 0x70, 22)));
        assert_eq!(e, ErrorRsp::new(Opcode::ReadReq, 0x70, ErrorCode::InvalidHandle));
        let e = err(s.handle(&mut db, Req::read(C, 0, 22)));
        assert_eq!(e.code(), ErrorCode::InvalidHandle);
        let e = err(s.handle(&mut db, Req::read(C, 0x64, 22)));
        assert_eq!(e.code(), ErrorCode::InvalidHandle);
        assert_eq!(s.pool().in_use(), 0);
    }

    #[test]
    fn read_insufficient_resources() {
        let mut s = Server::new(Pool::new(4), 365);
        let mut db = db();
        let held = s.pool().alloc(4).unwrap();
        let e = err(s.handle(&mut db, Req::read(C, MFR, 22)));
        assert_eq!(e.code(), ErrorCode::InsufficientResources);
        assert_eq!(e.handle(), MFR);
        drop(held);
        assert!(s.handle(&mut db, Req::read(C, MFR, 4)).is_ok());
        assert_eq!(s.pool().in_use(), 0);
    }

    #[test]
    fn read_by_type_insufficient_resources() {
        let mut s = Server::new(Pool::new(24), 365);
        let mut db = db();
        let held = s.pool().alloc(10).unwrap();
        let decl = Declaration::Characteristic.uuid();
        let e = err(s.handle(&mut db, Req::read_by_type(C, 0x41, 0xFFFF, decl, 22)));
        assert_eq!(e, ErrorRsp::new(Opcode::ReadByTypeReq, 0x41, ErrorCode::InsufficientResources));
        assert_eq!(s.pool().in_use(), 10);
        drop(held);
        assert!(s.handle(&mut db, Req::read_by_type(C, 0x41, 0xFFFF, decl, 22)).is_ok());
        assert_eq!(s.pool().in_use(), 0);
    }

    #[test]
    fn read_multiple_insufficient_resources() {
        let mut s = Server::new(Pool::new(24), 365);
        let mut db = db();
        let held = s.pool().alloc(10).unwrap();
        for req in [
            Req::read_multiple(C, &[0x51, MFR], 22),
            Req::read_multiple_variable(C, &[0x51, MFR], 22),
        ] {
            let op = req.op;
            let e = err(s.handle(&mut db, req));
            assert_eq!(e, ErrorRsp::new(op, 0x51, ErrorCode::InsufficientResources));
            assert_eq!(s.pool().in_use(), 10);
        }
        drop(held);
        assert!(s.handle(&mut db, Req::read_multiple(C, &[0x51, MFR], 22)).is_ok());
        assert_eq!(s.pool().in_use(), 0);
    }

    #[test]
    fn battery_scenario() {
        let (mut s, mut db) = (srv(), db());
        let seq: Vec<u8> = (0..6)
            .map(|_| s.handle(&mut db, Req::read(C, BATT, 22)).unwrap().payload()[0])
            .collect();
        assert_eq!(seq, [0, 1, 2, 3, 4, 5]);
        let batt = Characteristic::BatteryLevel.uuid();
        let r = s.handle(&mut db, Req::read_by_type(C, 0x60, 0x65, batt, 22)).unwrap();
        let Rsp::ReadByType { pair_len, ref buf } = r else {
            panic!("unexpected response: {r:?}");
        };
        assert_eq!(pair_len, 3);
        assert_eq!(buf.as_ref(), [0x63, 0x00, 5]);
        let r = s.handle(&mut db, Req::read(C, BATT, 22)).unwrap();
        assert_eq!(r.payload(), [0]);
    }

    #[test]
    fn read_by_type_pairs() {
        let (mut s, mut db) = (srv(), db());
        let decl = Declaration::Characteristic.uuid();
        let r = s.handle(&mut db, Req::read_by_type(C, 0x01, 0xFFFF, decl, 22)).unwrap();
        let Rsp::ReadByType { pair_len, ref buf } = r else {
            panic!("unexpected response: {r:?}");
        };
        // Three 7-byte pairs fit in 22 bytes
        assert_eq!(pair_len, 7);
        let hdls: Vec<u16> = (buf.as_ref().chunks(7))
            .map(|p| u16::from_le_bytes([p[0], p[1]]))
            .collect();
        assert_eq!(hdls, [0x4E, 0x50, 0x52]);

        // Ascending, within range, matching type
        let r = s.handle(&mut db, Req::read_by_type(C, 0x51, 0x70, decl, 100)).unwrap();
        let hdls: Vec<u16> = (r.payload().chunks(7))
            .map(|p| u16::from_le_bytes([p[0], p[1]]))
            .collect();
        assert_eq!(hdls, [0x52, 0x62]);
        for h in hdls {
            assert_eq!(db.typ(Handle::new(h).unwrap()), Some(decl));
        }
    }

    #[test]
    fn read_by_type_stops_on_length_change() {
        let (mut s, mut db) = (srv(), db());
        let svc = Declaration::PrimaryService.uuid();
        let r = s.handle(&mut db, Req::read_by_type(C, 0x01, 0xFFFF, svc, 22)).unwrap();
        let Rsp::ReadByType { pair_len, ref buf } = r else {
            panic!("unexpected response: {r:?}");
        };
        assert_eq!(pair_len, 4);
        assert_eq!(buf.as_ref(), [0x40, 0x00, 0x0A, 0x18, 0x60, 0x00, 0x0F, 0x18]);

        let db2 = &mut Db::build()
            .attr(0x10, Characteristic::DeviceName, Some(b"HSPK LE\0"))
            .attr(0x11, Characteristic::DeviceName, Some(b"ab"))
            .freeze();
        let typ = Characteristic::DeviceName.uuid();
        let r = s.handle(db2, Req::read_by_type(C, 0x10, 0x11, typ, 22)).unwrap();
        assert_eq!(r.payload(), b"\x10\x00HSPK LE\0");
        // First entry is truncated to fit
        let r = s.handle(db2, Req::read_by_type(C, 0x10, 0x11, typ, 6)).unwrap();
        assert_eq!(r.payload(), b"\x10\x00HSPK");
    }

    #[test]
    fn read_by_type_errors() {
        let (mut s, mut db) = (srv(), db());
        let batt = Characteristic::BatteryLevel.uuid();
        let e = err(s.handle(&mut db, Req::read_by_type(C, 0x40, 0x50, batt, 22)));
        assert_eq!(e, ErrorRsp::new(Opcode::ReadByTypeReq, 0x40, ErrorCode::InvalidHandle));
        let e = err(s.handle(&mut db, Req::read_by_type(C, 0x65, 0x60, batt, 22)));
        assert_eq!(e.code(), ErrorCode::InvalidHandle);
        let cccd = crate::gap::Descriptor::ClientCharacteristicConfiguration.uuid();
        let e = err(s.handle(&mut db, Req::read_by_type(C, 0x60, 0x65, cccd, 22)));
        assert_eq!(e, ErrorRsp::new(Opcode::ReadByTypeReq, 0x60, ErrorCode::UnlikelyError));
        assert_eq!(s.pool().in_use(), 0);
    }

    #[test]
    fn read_multiple() {
        let (mut s, mut db) = (srv(), db());
        let r = s.handle(&mut db, Req::read_multiple(C, &[MFR, 0x51], 22)).unwrap();
        assert_eq!(r.payload(), b"Cypress\x001234\0\0\0\0");
        let r = s.handle(&mut db, Req::read_multiple(C, &[0x51, MFR], 10)).unwrap();
        assert_eq!(r.payload(), b"1234\0\0\0\0Cy");
        let r = (s.handle(&mut db, Req::read_multiple_variable(C, &[MFR, BATT], 22))).unwrap();
        assert_eq!(r.payload(), b"\x08\x00Cypress\x00\x01\x00\x00");
        let r = (s.handle(&mut db, Req::read_multiple_variable(C, &[0x51, MFR], 14))).unwrap();
        assert_eq!(r.payload(), b"\x08\x001234\0\0\0\0\x08\x00Cy");
    }

    #[test]
    fn read_multiple_all_or_nothing() {
        let (mut s, mut db) = (srv(), db());
        let e = err(s.handle(&mut db, Req::read_multiple(C, &[MFR, 0x70, 0x51], 22)));
        assert_eq!(e, ErrorRsp::new(Opcode::ReadMultipleReq, MFR, ErrorCode::UnlikelyError));
        let e = err(s.handle(&mut db, Req::read_multiple(C, &[], 22)));
        assert_eq!(e.code(), ErrorCode::InvalidPdu);
        assert_eq!(s.pool().in_use(), 0);
    }

    #[test]
    fn write_mtu_confirm() {
        let (mut s, mut db) = (srv(), db());
        let r = s.handle(&mut db, Req::write(C, 0x64, [1, 0])).unwrap();
        assert!(matches!(r, Rsp::Write(h) if u16::from(h) == 0x64));
        assert!(matches!(s.handle(&mut db, Req::mtu(C, 517)), Ok(Rsp::Mtu(365))));
        assert!(matches!(s.handle(&mut db, Req::mtu(C, 100)), Ok(Rsp::Mtu(100))));
        assert!(matches!(s.handle(&mut db, Req::confirm(C, 0x73)), Ok(Rsp::Confirmed)));
        let e = err(s.handle(&mut db, Req::write_cmd(C, 0, [1])));
        assert_eq!(e.req(), Opcode::WriteCmd);
    }

    #[derive(Debug, Default)]
    struct Ota {
        written: Vec<u8>,
        confirmed: bool,
    }

    impl Extension for Ota {
        fn owns(&self, hdl: Handle) -> bool {
            u16::from(hdl) >= 0xFF00
        }

        fn read(&mut self, _: ConnId, _: Handle) -> Result<Vec<u8>, ErrorCode> {
            Ok(self.written.clone())
        }

        fn write(&mut self, _: ConnId, _: Handle, val: &[u8]) -> Result<(), ErrorCode> {
            if val.is_empty() {
                return Err(ErrorCode::InvalidAttributeValueLength);
            }
            self.written.extend_from_slice(val);
            Ok(())
        }

        fn confirm(&mut self, _: ConnId, _: Handle) {
            self.confirmed = true;
        }
    }

    #[test]
    fn extension() {
        let mut s = srv().with_extension(Box::<Ota>::default());
        let mut db = db();
        assert!(s.handle(&mut db, Req::write(C, 0xFF01, [1, 2, 3])).is_ok());
        let e = err(s.handle(&mut db, Req::write(C, 0xFF01, Vec::new())));
        assert_eq!(e.code(), ErrorCode::InvalidAttributeValueLength);
        let r = s.handle(&mut db, Req::read_blob(C, 0xFF01, 1, 22)).unwrap();
        assert_eq!(r.payload(), [2, 3]);
        assert!(s.handle(&mut db, Req::confirm(C, 0xFF02)).is_ok());
        let r = s.handle(&mut db, Req::read(C, MFR, 22)).unwrap();
        assert_eq!(r.payload(), b"Cypress\0");
    }
}
