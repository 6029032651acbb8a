use bitflags::bitflags;

/// User input capabilities ([Vol 3] Part H, Section 2.3.2, Table 2.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum InputCap {
    /// Device does not have the ability to indicate 'yes' or 'no'.
    None,
    /// Device has a mechanism for the user to indicate either 'yes' or 'no'.
    YesNo,
}

/// User output capabilities ([Vol 3] Part H, Section 2.3.2, Table 2.4).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum OutputCap {
    /// Device does not have the ability to display or communicate a 6 digit
    /// decimal number.
    None,
    /// Device has the ability to display or communicate a 6 digit decimal
    /// number.
    Numeric,
}

/// IO capability ([Vol 3] Part H, Section 3.5.1 and
/// [Vol 4] Part E, Section 7.1.29).
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum IoCap {
    DisplayOnly = 0x00,
    DisplayYesNo = 0x01,
    KeyboardOnly = 0x02,
    NoInputNoOutput = 0x03,
    KeyboardDisplay = 0x04,
}

impl IoCap {
    /// Creates IO capabilities from specified input/output configuration
    /// ([Vol 3] Part H, Section 2.3.2, Table 2.5).
    #[must_use]
    #[inline]
    pub const fn new(inp: InputCap, out: OutputCap) -> Self {
        #[allow(clippy::match_same_arms)]
        match (inp, out) {
            (InputCap::None, OutputCap::None) => Self::NoInputNoOutput,
            (InputCap::None, OutputCap::Numeric) => Self::DisplayOnly,
            (InputCap::YesNo, OutputCap::None) => Self::NoInputNoOutput,
            (InputCap::YesNo, OutputCap::Numeric) => Self::DisplayYesNo,
        }
    }
}

bitflags! {
    /// LE authentication requirements ([Vol 3] Part H, Section 3.5.1).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct AuthReq: u8 {
        /// Bonding requested.
        const BONDING = 0b01 << 0;
        /// MITM protection (authentication) requested.
        const MITM = 1 << 2;
        /// LE Secure Connections pairing is supported.
        const SC = 1 << 3;
        /// Enable keypress notifications in the Passkey Entry protocol.
        const KEYPRESS = 1 << 4;
        /// h7 function is supported for cross-transport key derivation.
        const CT2 = 1 << 5;
    }
}

bitflags! {
    /// LE Key Distribution parameter ([Vol 3] Part H, Section 3.6.1).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct KeyDist: u8 {
        /// Ignored in LE Secure Connections pairing.
        const ENC = 1 << 0;
        /// Distribute IRK using the Identity Information command.
        const ID = 1 << 1;
        /// Distribute CSRK using the Signing Information command.
        const SIGN = 1 << 2;
        /// Derive the BR/EDR Link Key from the LE LTK.
        const LINK = 1 << 3;
    }
}

/// BR/EDR authentication requirements ([Vol 4] Part E, Section 7.1.29).
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum BrEdrAuth {
    NoBonding = 0x00,
    NoBondingMitm = 0x01,
    DedicatedBonding = 0x02,
    DedicatedBondingMitm = 0x03,
    GeneralBonding = 0x04,
    GeneralBondingMitm = 0x05,
}

/// Pairing transport.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Transport {
    BrEdr,
    Le,
}

crate::util::impl_display_via_debug! { IoCap, BrEdrAuth, Transport }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_cap() {
        assert_eq!(IoCap::new(InputCap::None, OutputCap::None), IoCap::NoInputNoOutput);
        assert_eq!(IoCap::new(InputCap::YesNo, OutputCap::None), IoCap::NoInputNoOutput);
        assert_eq!(IoCap::new(InputCap::YesNo, OutputCap::Numeric), IoCap::DisplayYesNo);
        assert_eq!(u8::from(BrEdrAuth::GeneralBonding), 0x04);
        let a = AuthReq::SC | AuthReq::MITM | AuthReq::BONDING;
        assert_eq!(a.bits(), 0x0D);
    }
}
