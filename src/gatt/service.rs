//! Headset attribute table.

use crate::gap::{Appearance, Characteristic, Service, Uuid, Uuid16};
use crate::host::Config;

use super::*;

/// Attribute handles of the headset table.
pub mod hdl {
    pub const GATT_SERVICE: u16 = 0x01;

    pub const GAP_SERVICE: u16 = 0x14;
    pub const DEVICE_NAME: u16 = 0x16;
    pub const APPEARANCE: u16 = 0x18;

    pub const DIS_SERVICE: u16 = 0x40;
    pub const MANUFACTURER_NAME: u16 = 0x4F;
    pub const MODEL_NUMBER: u16 = 0x51;
    pub const SYSTEM_ID: u16 = 0x53;

    pub const BATTERY_SERVICE: u16 = 0x60;
    pub const BATTERY_LEVEL: u16 = 0x63;

    pub const FAST_PAIR_SERVICE: u16 = 0x70;
    pub const FAST_PAIR_KEY_PAIRING: u16 = 0x72;
    pub const FAST_PAIR_PASSKEY: u16 = 0x75;
    pub const FAST_PAIR_ACCOUNT_KEY: u16 = 0x78;

    pub const OTA_SERVICE: u16 = 0xFF00;
    pub const OTA_CONTROL_POINT: u16 = 0xFF02;
    pub const OTA_DATA: u16 = 0xFF05;
}

/// Fast Pair characteristics.
pub mod fast_pair {
    use super::{uuid16 as uuid, Uuid};

    pub const KEY_PAIRING: Uuid = uuid(0x1234);
    pub const PASSKEY: Uuid = uuid(0x1235);
    pub const ACCOUNT_KEY: Uuid = uuid(0x1236);
}

/// Firmware upgrade service and characteristics.
pub mod ota {
    use super::{uuid128 as uuid, Uuid};

    pub const SERVICE: Uuid = uuid(0xAE5D1E47_5C13_43A0_8635_82AD38A1381F);
    pub const CONTROL_POINT: Uuid = uuid(0xA3DD50BF_F7A7_4E99_838E_570A086C661B);
    pub const DATA: Uuid = uuid(0xA2E86C7A_D961_4091_B74F_2409E72EFE26);
}

const fn uuid16(v: u16) -> Uuid {
    match Uuid16::new(v) {
        Some(u) => u.as_uuid(),
        None => panic!("zero UUID"),
    }
}

const fn uuid128(v: u128) -> Uuid {
    match Uuid::new(v) {
        Some(u) => u,
        None => panic!("zero UUID"),
    }
}

const MANUFACTURER_NAME: &[u8] = b"Cypress\0";
const MODEL_NUMBER: &[u8] = b"1234\0\0\0\0";
const SYSTEM_ID: &[u8] = &[0xBB, 0xB8, 0xA1, 0x80, 0x5F, 0x9F, 0x91, 0x71];

/// Builds the headset attribute table. Fast Pair and firmware upgrade
/// services are included when enabled in `cfg`; the values of their
/// characteristics are served by the corresponding collaborators.
#[must_use]
pub fn headset_db(cfg: &Config) -> Db {
    let mut name = cfg.device_name.as_bytes().to_vec();
    name.push(0);
    let mut b = Db::build()
        .primary_service(hdl::GATT_SERVICE, Service::GenericAttribute)
        .primary_service(hdl::GAP_SERVICE, Service::GenericAccess)
        .characteristic(hdl::DEVICE_NAME - 1, Characteristic::DeviceName, Prop::READ, &name)
        .characteristic(
            hdl::APPEARANCE - 1,
            Characteristic::Appearance,
            Prop::READ,
            &Appearance::GENERIC_TAG.to_bytes(),
        )
        .primary_service(hdl::DIS_SERVICE, Service::DeviceInformation)
        .characteristic(
            hdl::MANUFACTURER_NAME - 1,
            Characteristic::ManufacturerNameString,
            Prop::READ,
            MANUFACTURER_NAME,
        )
        .characteristic(
            hdl::MODEL_NUMBER - 1,
            Characteristic::ModelNumberString,
            Prop::READ,
            MODEL_NUMBER,
        )
        .characteristic(hdl::SYSTEM_ID - 1, Characteristic::SystemId, Prop::READ, SYSTEM_ID)
        .primary_service(hdl::BATTERY_SERVICE, Service::Battery)
        .dynamic_characteristic(
            hdl::BATTERY_LEVEL - 1,
            Characteristic::BatteryLevel,
            Prop::READ,
            &[0],
            ReadEffect::counter(cfg.battery_ceiling),
        );
    if cfg.fast_pair {
        let p = Prop::WRITE | Prop::NOTIFY;
        let chars: [(u16, Uuid); 3] = [
            (hdl::FAST_PAIR_KEY_PAIRING, fast_pair::KEY_PAIRING),
            (hdl::FAST_PAIR_PASSKEY, fast_pair::PASSKEY),
            (hdl::FAST_PAIR_ACCOUNT_KEY, fast_pair::ACCOUNT_KEY),
        ];
        b = b.primary_service(hdl::FAST_PAIR_SERVICE, Service::FastPair);
        for (vhdl, uuid) in chars {
            b = b.external_characteristic(vhdl - 1, uuid, p).cccd(vhdl + 1);
        }
    }
    if cfg.ota {
        b = b
            .primary_service(hdl::OTA_SERVICE, ota::SERVICE)
            .external_characteristic(
                hdl::OTA_CONTROL_POINT - 1,
                ota::CONTROL_POINT,
                Prop::WRITE | Prop::NOTIFY | Prop::INDICATE,
            )
            .cccd(hdl::OTA_CONTROL_POINT + 1)
            .external_characteristic(hdl::OTA_DATA - 1, ota::DATA, Prop::WRITE);
    }
    b.freeze()
}

#[cfg(test)]
mod tests {
    use crate::att::Handle;

    use super::*;

    fn h(v: u16) -> Handle {
        Handle::new(v).unwrap()
    }

    #[test]
    fn default_table() {
        let db = headset_db(&Config::default());
        assert_eq!(db.get(h(hdl::DEVICE_NAME)), Some(b"HSPK LE\0".as_ref()));
        assert_eq!(db.get(h(hdl::APPEARANCE)), Some([0x00, 0x02].as_ref()));
        assert_eq!(db.get(h(hdl::MANUFACTURER_NAME)), Some(MANUFACTURER_NAME));
        assert_eq!(db.get(h(hdl::MODEL_NUMBER)), Some(MODEL_NUMBER));
        assert_eq!(db.get(h(hdl::SYSTEM_ID)), Some(SYSTEM_ID));
        assert_eq!(db.get(h(hdl::BATTERY_LEVEL)), Some([0].as_ref()));
        assert_eq!(db.typ(h(hdl::FAST_PAIR_SERVICE)), None);
        assert_eq!(db.typ(h(hdl::OTA_SERVICE)), None);
    }

    #[test]
    fn optional_services() {
        let cfg = Config {
            fast_pair: true,
            ota: true,
            ..Config::default()
        };
        let db = headset_db(&cfg);
        assert_eq!(db.get(h(hdl::FAST_PAIR_SERVICE)), Some([0x2C, 0xFE].as_ref()));
        assert_eq!(db.typ(h(hdl::FAST_PAIR_PASSKEY)), Some(fast_pair::PASSKEY));
        assert_eq!(db.get(h(hdl::FAST_PAIR_PASSKEY)), None);
        assert!(db.typ(h(0x79)).is_some());
        assert_eq!(db.get(h(hdl::OTA_SERVICE)), Some(ota::SERVICE.to_bytes().as_ref()));
        assert_eq!(db.typ(h(hdl::OTA_DATA)), Some(ota::DATA));
        let decl = db.get(h(hdl::FAST_PAIR_KEY_PAIRING - 1)).unwrap();
        assert_eq!(decl, [0x18, 0x72, 0x00, 0x34, 0x12]);
        let decl = db.get(h(hdl::OTA_DATA - 1)).unwrap();
        assert_eq!(decl.len(), 1 + 2 + 16);
    }
}
