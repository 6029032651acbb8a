use tracing::info;

use crate::att::Handle;
use crate::gap::{Characteristic, Declaration, Descriptor, Service, Uuid};

use super::*;

/// Attribute table sorted by handle.
///
/// Every entry has a declared type. Only entries that the application serves
/// have a value; the rest (client configuration descriptors, for example) are
/// owned by the stack. A type match on an entry without a value is a table
/// inconsistency that the dispatcher reports as `UnlikelyError`.
#[derive(Clone, Debug, Default)]
pub struct Db {
    attr: Box<[Attr]>,
}

/// Attribute table entry.
#[derive(Clone, Debug)]
struct Attr {
    hdl: Handle,
    typ: Uuid,
    val: Option<Vec<u8>>,
    effect: Option<ReadEffect>,
}

/// Mutation applied to an attribute value each time it is read through
/// [`Db::lookup`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ReadEffect {
    /// The first value byte is set to `next`, which then increments by 1 and
    /// wraps to 0 once it has reached `ceil`.
    Counter { next: u8, ceil: u8 },
}

impl ReadEffect {
    /// Creates a counter starting at 0.
    #[inline(always)]
    #[must_use]
    pub const fn counter(ceil: u8) -> Self {
        Self::Counter { next: 0, ceil }
    }

    fn apply(&mut self, v: &mut [u8]) {
        match *self {
            Self::Counter {
                ref mut next,
                ceil,
            } => {
                if let Some(b) = v.first_mut() {
                    *b = *next;
                }
                *next = if *next >= ceil { 0 } else { *next + 1 };
            }
        }
    }
}

impl Db {
    /// Creates a new database builder.
    #[inline(always)]
    #[must_use]
    pub fn build() -> Builder {
        Builder::default()
    }

    /// Returns the number of attributes.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.attr.len()
    }

    /// Returns whether the database is empty.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attr.is_empty()
    }

    /// Returns the value of the specified handle after applying its read side
    /// effect, if any. Returns [`None`] if the handle does not exist or has no
    /// application value.
    pub fn lookup(&mut self, hdl: Handle) -> Option<&[u8]> {
        let i = self.index(hdl)?;
        let at = &mut self.attr[i];
        let v = at.val.as_mut()?;
        if let Some(ref mut e) = at.effect {
            e.apply(v);
        }
        Some(v.as_slice())
    }

    /// Returns the current value of the specified handle without side effects.
    #[inline]
    #[must_use]
    pub fn get(&self, hdl: Handle) -> Option<&[u8]> {
        (self.index(hdl)).and_then(|i| self.attr[i].val.as_deref())
    }

    /// Returns the declared type of the specified handle.
    #[inline]
    #[must_use]
    pub fn typ(&self, hdl: Handle) -> Option<Uuid> {
        (self.index(hdl)).map(|i| self.attr[i].typ)
    }

    /// Returns the first handle in `start..=end` with type `typ`. Callers
    /// iterate over all matches by calling again with `start` set to the next
    /// handle after the previous result.
    #[must_use]
    pub fn find_in_range(&self, start: Handle, end: Handle, typ: Uuid) -> Option<Handle> {
        let i = self.attr.partition_point(|at| at.hdl < start);
        (self.attr[i..].iter())
            .take_while(|at| at.hdl <= end)
            .find(|at| at.typ == typ)
            .map(|at| at.hdl)
    }

    /// Returns an iterator over all attributes in handle order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (Handle, Uuid, Option<&[u8]>)> {
        (self.attr.iter()).map(|at| (at.hdl, at.typ, at.val.as_deref()))
    }

    /// Logs database contents.
    pub fn dump(&self) {
        info!("GATT database:");
        for at in self.attr.iter() {
            let name = describe(at.typ);
            let hdl = u16::from(at.hdl);
            match at.val {
                None => info!("[{hdl:#06X}] {name} <{}> (stack)", at.typ),
                Some(ref v) if at.effect.is_some() => {
                    info!("[{hdl:#06X}] {name} <{}> {v:02X?} (dynamic)", at.typ);
                }
                Some(ref v) => info!("[{hdl:#06X}] {name} <{}> {v:02X?}", at.typ),
            }
        }
    }

    /// Returns the index of the specified handle.
    #[inline]
    fn index(&self, hdl: Handle) -> Option<usize> {
        self.attr.binary_search_by_key(&hdl, |at| at.hdl).ok()
    }
}

/// Returns a human-readable name for assigned attribute types.
fn describe(typ: Uuid) -> &'static str {
    let Some(u) = typ.as_uuid16() else {
        return "Attribute";
    };
    if let Ok(d) = Declaration::try_from(u) {
        return match d {
            Declaration::PrimaryService => "Primary Service",
            Declaration::SecondaryService => "Secondary Service",
            Declaration::Include => "Include",
            Declaration::Characteristic => "Characteristic",
        };
    }
    if Service::try_from(u).is_ok() {
        return "Service";
    }
    if Characteristic::try_from(u).is_ok() {
        return "Value";
    }
    if Descriptor::try_from(u).is_ok() {
        return "Descriptor";
    }
    "Attribute"
}

/// Attribute table builder. Attributes must be added in strictly ascending
/// handle order.
#[derive(Debug, Default)]
#[must_use]
pub struct Builder {
    attr: Vec<Attr>,
}

impl Builder {
    /// Adds a primary service declaration.
    pub fn primary_service(self, hdl: u16, uuid: impl Into<Uuid>) -> Self {
        let uuid = uuid.into();
        let v = match uuid.as_u16() {
            Some(u) => u.to_le_bytes().to_vec(),
            None => uuid.to_bytes().to_vec(),
        };
        self.push(hdl, Declaration::PrimaryService.uuid(), Some(v), None)
    }

    /// Adds a characteristic declaration at `hdl` and its value at `hdl + 1`
    /// ([Vol 3] Part G, Section 3.3).
    pub fn characteristic(self, hdl: u16, uuid: impl Into<Uuid>, props: Prop, val: &[u8]) -> Self {
        self.characteristic_with(hdl, uuid, props, val.to_vec(), None)
    }

    /// Adds a characteristic whose value changes when read.
    pub fn dynamic_characteristic(
        self,
        hdl: u16,
        uuid: impl Into<Uuid>,
        props: Prop,
        val: &[u8],
        effect: ReadEffect,
    ) -> Self {
        self.characteristic_with(hdl, uuid, props, val.to_vec(), Some(effect))
    }

    /// Adds a characteristic whose value is served outside of the database.
    pub fn external_characteristic(self, hdl: u16, uuid: impl Into<Uuid>, props: Prop) -> Self {
        let (decl, vhdl, uuid) = char_decl(hdl, uuid.into(), props);
        (self.push(hdl, Declaration::Characteristic.uuid(), Some(decl), None))
            .push(vhdl, uuid, None, None)
    }

    /// Adds a characteristic descriptor. Descriptors without a value are
    /// managed by the stack.
    pub fn descriptor(self, hdl: u16, uuid: impl Into<Uuid>, val: Option<&[u8]>) -> Self {
        self.push(hdl, uuid.into(), val.map(<[u8]>::to_vec), None)
    }

    /// Adds a client characteristic configuration descriptor.
    #[inline]
    pub fn cccd(self, hdl: u16) -> Self {
        self.descriptor(hdl, Descriptor::ClientCharacteristicConfiguration, None)
    }

    /// Adds a raw attribute without any declaration structure.
    #[inline]
    pub fn attr(self, hdl: u16, typ: impl Into<Uuid>, val: Option<&[u8]>) -> Self {
        self.push(hdl, typ.into(), val.map(<[u8]>::to_vec), None)
    }

    /// Adds a raw attribute with a read side effect.
    #[inline]
    pub fn dynamic_attr(self, hdl: u16, typ: impl Into<Uuid>, val: &[u8], e: ReadEffect) -> Self {
        self.push(hdl, typ.into(), Some(val.to_vec()), Some(e))
    }

    /// Returns the final database.
    #[inline]
    #[must_use]
    pub fn freeze(self) -> Db {
        Db {
            attr: self.attr.into_boxed_slice(),
        }
    }

    fn characteristic_with(
        self,
        hdl: u16,
        uuid: impl Into<Uuid>,
        props: Prop,
        val: Vec<u8>,
        effect: Option<ReadEffect>,
    ) -> Self {
        let (decl, vhdl, uuid) = char_decl(hdl, uuid.into(), props);
        (self.push(hdl, Declaration::Characteristic.uuid(), Some(decl), None))
            .push(vhdl, uuid, Some(val), effect)
    }

    /// Appends an attribute.
    ///
    /// # Panics
    ///
    /// Panics if the handle is invalid or not greater than the previous one.
    fn push(mut self, hdl: u16, typ: Uuid, val: Option<Vec<u8>>, effect: Option<ReadEffect>) -> Self {
        let hdl = Handle::new(hdl).expect("invalid attribute handle");
        if let Some(last) = self.attr.last() {
            assert!(last.hdl < hdl, "{hdl} added after {}", last.hdl);
        }
        self.attr.push(Attr {
            hdl,
            typ,
            val,
            effect,
        });
        self
    }
}

/// Encodes a characteristic declaration value ([Vol 3] Part G, Section 3.3.1),
/// returning it with the value handle.
fn char_decl(hdl: u16, uuid: Uuid, props: Prop) -> (Vec<u8>, u16, Uuid) {
    let vhdl = hdl.checked_add(1).expect("characteristic value handle overflow");
    let mut decl = vec![props.bits()];
    decl.extend_from_slice(&vhdl.to_le_bytes());
    match uuid.as_u16() {
        Some(u) => decl.extend_from_slice(&u.to_le_bytes()),
        None => decl.extend_from_slice(&uuid.to_bytes()),
    }
    (decl, vhdl, uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(v: u16) -> Handle {
        Handle::new(v).unwrap()
    }

    fn test_db() -> Db {
        Db::build()
            .primary_service(0x40, Service::DeviceInformation)
            .characteristic(0x4E, Characteristic::ManufacturerNameString, Prop::READ, b"Cypress\0")
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

    #[test]
    fn lookup() {
        let mut db = test_db();
        assert_eq!(db.lookup(h(0x4F)), Some(b"Cypress\0".as_ref()));
        assert_eq!(db.lookup(h(0x4F)), Some(b"Cypress\0".as_ref()));
        assert_eq!(db.lookup(h(0x41)), None);
        assert_eq!(db.lookup(h(0x64)), None);
        assert_eq!(db.typ(h(0x64)), Some(Descriptor::ClientCharacteristicConfiguration.uuid()));
        assert_eq!(
            db.get(h(0x4E)),
            Some([0x02, 0x4F, 0x00, 0x29, 0x2A].as_ref())
        );
        assert_eq!(db.get(h(0x40)), Some([0x0A, 0x18].as_ref()));
    }

    #[test]
    fn battery_counter() {
        let mut db = test_db();
        let seq: Vec<u8> = (0..7).map(|_| db.lookup(h(0x63)).unwrap()[0]).collect();
        assert_eq!(seq, [0, 1, 2, 3, 4, 5, 0]);
        assert_eq!(db.get(h(0x63)), Some([0].as_ref()));
        assert_eq!(db.get(h(0x63)), Some([0].as_ref()));
    }

    #[test]
    fn find_in_range() {
        let db = test_db();
        let decl = Declaration::Characteristic.uuid();
        assert_eq!(db.find_in_range(h(0x01), h(0xFFFF), decl), Some(h(0x4E)));
        assert_eq!(db.find_in_range(h(0x4F), h(0xFFFF), decl), Some(h(0x62)));
        assert_eq!(db.find_in_range(h(0x63), h(0xFFFF), decl), None);
        assert_eq!(db.find_in_range(h(0x4E), h(0x4E), decl), Some(h(0x4E)));
        assert_eq!(db.find_in_range(h(0x50), h(0x61), decl), None);
        let batt = Characteristic::BatteryLevel.uuid();
        assert_eq!(db.find_in_range(h(0x60), h(0x65), batt), Some(h(0x63)));
    }

    #[test]
    #[should_panic]
    fn unordered() {
        let _ = Db::build()
            .primary_service(0x60, Service::Battery)
            .primary_service(0x40, Service::DeviceInformation);
    }
}
