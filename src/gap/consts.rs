use super::*;

/// GATT attribute types ([Assigned Numbers] Section 3.5).
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u16)]
pub enum Declaration {
    PrimaryService = 0x2800,
    SecondaryService = 0x2801,
    Include = 0x2802,
    Characteristic = 0x2803,
}

/// GATT services ([Assigned Numbers] Section 3.4).
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u16)]
pub enum Service {
    GenericAccess = 0x1800,
    GenericAttribute = 0x1801,
    DeviceInformation = 0x180A,
    Battery = 0x180F,
    /// Google Fast Pair Service (member UUID).
    FastPair = 0xFE2C,
}

/// GATT characteristics ([Assigned Numbers] Section 3.8).
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u16)]
pub enum Characteristic {
    DeviceName = 0x2A00,
    Appearance = 0x2A01,
    BatteryLevel = 0x2A19,
    SystemId = 0x2A23,
    ModelNumberString = 0x2A24,
    ManufacturerNameString = 0x2A29,
}

/// GATT characteristic descriptors ([Assigned Numbers] Section 3.7).
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u16)]
pub enum Descriptor {
    ClientCharacteristicConfiguration = 0x2902,
}

uuid16_enum! { Declaration Service Characteristic Descriptor }

/// Device appearance ([Assigned Numbers] Section 2.6).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(transparent)]
pub struct Appearance(pub u16);

impl Appearance {
    /// Generic Tag category.
    pub const GENERIC_TAG: Self = Self(0x0200);

    /// Returns the characteristic value encoding.
    #[inline(always)]
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}
