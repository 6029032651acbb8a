//! Attribute Protocol ([Vol 3] Part F) constants and error responses.

use std::fmt::Debug;

pub use {consts::*, handle::*};

mod consts;
mod handle;

/// Default LE ATT_MTU ([Vol 3] Part F, Section 3.2.8).
pub const DEFAULT_MTU: u16 = 23;

/// PDU response result.
pub type RspResult<T> = std::result::Result<T, ErrorRsp>;

/// `ATT_ERROR_RSP` PDU ([Vol 3] Part F, Section 3.4.1.1). The response is
/// always addressed to the request that caused it: `req` is the request opcode
/// and `hdl` is the raw attribute handle in error (`0` when not applicable).
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("ATT {req} for handle {hdl:#06X} failed with {err}")]
pub struct ErrorRsp {
    req: Opcode,
    hdl: u16,
    err: ErrorCode,
}

impl ErrorRsp {
    /// Creates a new error response.
    #[inline(always)]
    #[must_use]
    pub const fn new(req: Opcode, hdl: u16, err: ErrorCode) -> Self {
        Self { req, hdl, err }
    }

    /// Returns the opcode of the request in error.
    #[inline(always)]
    #[must_use]
    pub const fn req(&self) -> Opcode {
        self.req
    }

    /// Returns the raw attribute handle in error.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> u16 {
        self.hdl
    }

    /// Returns the error code.
    #[inline(always)]
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.err
    }
}
