use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SwitchError;

/// Attribute identifier. Unique across the whole schema, so an attribute id
/// always resolves to exactly one object type.
pub type AttrId = u32;

/// Schema-defined kind of object (port, vlan, route, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectType(pub u16);

impl ObjectType {
    /// The reserved "no type" value. Never assigned by a schema.
    pub const NONE: Self = Self(0);

    /// Raw numeric value.
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectType({})", self.0)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of low bits holding the dense id.
const DENSE_BITS: u32 = 48;
const DENSE_MASK: u64 = (1 << DENSE_BITS) - 1;

/// 64-bit object handle.
///
/// The object type occupies the high 16 bits and the dense id the low 48
/// bits. Zero is the null handle and never names a live object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// The null handle.
    pub const NULL: Self = Self(0);

    /// Largest dense id that fits in a handle.
    pub const MAX_DENSE: u64 = DENSE_MASK;

    /// Pack an object type and dense id into a handle.
    ///
    /// Fails if the dense id does not fit in 48 bits.
    pub fn new(object_type: ObjectType, dense: u64) -> Result<Self, SwitchError> {
        if dense > DENSE_MASK {
            return Err(SwitchError::InvalidParameter(format!(
                "dense id {dense} exceeds 48 bits"
            )));
        }
        Ok(Self((u64::from(object_type.0) << DENSE_BITS) | dense))
    }

    /// Wrap a raw 64-bit handle.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit handle.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Object type encoded in the handle.
    pub const fn object_type(self) -> ObjectType {
        ObjectType((self.0 >> DENSE_BITS) as u16)
    }

    /// Dense per-type id encoded in the handle.
    pub const fn dense_id(self) -> u64 {
        self.0 & DENSE_MASK
    }

    /// Returns `true` for the null handle.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Parse `0x`-prefixed hex or plain decimal.
    pub fn parse(s: &str) -> Result<Self, SwitchError> {
        let s = s.trim();
        let raw = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(digits) => u64::from_str_radix(digits, 16),
            None => s.parse::<u64>(),
        }
        .map_err(|e| SwitchError::InvalidParameter(format!("bad object id {s:?}: {e}")))?;
        Ok(Self(raw))
    }

    /// Big-endian hex of the raw handle, without prefix.
    pub fn to_hex(self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectId({}:{})",
            self.object_type().0,
            self.dense_id()
        )
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<ObjectId> for u64 {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn packs_type_and_dense_id() {
        let id = ObjectId::new(ObjectType(7), 42).unwrap();
        assert_eq!(id.object_type(), ObjectType(7));
        assert_eq!(id.dense_id(), 42);
        assert!(!id.is_null());
    }

    #[test]
    fn null_is_zero() {
        assert!(ObjectId::NULL.is_null());
        assert_eq!(ObjectId::NULL.raw(), 0);
        assert_eq!(ObjectId::default(), ObjectId::NULL);
    }

    #[test]
    fn oversized_dense_id_is_rejected() {
        let err = ObjectId::new(ObjectType(1), ObjectId::MAX_DENSE + 1).unwrap_err();
        assert!(matches!(err, SwitchError::InvalidParameter(_)));
    }

    #[test]
    fn display_is_prefixed_hex() {
        let id = ObjectId::new(ObjectType(1), 1).unwrap();
        assert_eq!(id.to_string(), "0x0001000000000001");
    }

    #[test]
    fn parse_accepts_hex_and_decimal() {
        let id = ObjectId::new(ObjectType(3), 9).unwrap();
        assert_eq!(ObjectId::parse(&id.to_string()).unwrap(), id);
        assert_eq!(ObjectId::parse(&id.raw().to_string()).unwrap(), id);
        assert!(ObjectId::parse("0xzz").is_err());
    }

    #[test]
    fn handles_order_by_type_then_dense_id() {
        let a = ObjectId::new(ObjectType(1), 500).unwrap();
        let b = ObjectId::new(ObjectType(2), 1).unwrap();
        assert!(a < b);
    }

    #[test]
    fn serde_is_transparent() {
        let id = ObjectId::new(ObjectType(2), 5).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, id.raw().to_string());
    }

    proptest! {
        #[test]
        fn packing_is_lossless(ty in 1u16.., dense in 0u64..=ObjectId::MAX_DENSE) {
            let id = ObjectId::new(ObjectType(ty), dense).unwrap();
            prop_assert_eq!(id.object_type(), ObjectType(ty));
            prop_assert_eq!(id.dense_id(), dense);
        }
    }
}
