//! Attribute values.
//!
//! [`AttributeValue`] is a closed sum type: every consumer matches it
//! exhaustively, so adding a kind is a compile error at each call site that
//! has not been taught about it.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{SwitchError, SwitchResult};
use crate::net::{IpPrefix, MacAddr, ValueRange};
use crate::object::{AttrId, ObjectId};

/// Kind tag for an attribute value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Enum,
    String,
    Mac,
    Ip,
    Prefix,
    Range,
    ObjectId,
    List,
}

impl ValueKind {
    /// Zero value for a scalar kind. Lists need an element kind and are
    /// built with [`AttrList::empty`] instead.
    pub fn zero(self) -> SwitchResult<AttributeValue> {
        Ok(match self {
            Self::Bool => AttributeValue::Bool(false),
            Self::U8 => AttributeValue::U8(0),
            Self::U16 => AttributeValue::U16(0),
            Self::U32 => AttributeValue::U32(0),
            Self::U64 => AttributeValue::U64(0),
            Self::I8 => AttributeValue::I8(0),
            Self::I16 => AttributeValue::I16(0),
            Self::I32 => AttributeValue::I32(0),
            Self::I64 => AttributeValue::I64(0),
            Self::Enum => AttributeValue::Enum(0),
            Self::String => AttributeValue::String(String::new()),
            Self::Mac => AttributeValue::Mac(MacAddr::default()),
            Self::Ip => AttributeValue::Ip(IpAddr::from([0, 0, 0, 0])),
            Self::Prefix => AttributeValue::Prefix(IpPrefix::default()),
            Self::Range => AttributeValue::Range(ValueRange::default()),
            Self::ObjectId => AttributeValue::ObjectId(ObjectId::NULL),
            Self::List => {
                return Err(SwitchError::invalid("list kind has no scalar zero value"))
            }
        })
    }

    pub fn is_list(self) -> bool {
        matches!(self, Self::List)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Enum => "enum",
            Self::String => "string",
            Self::Mac => "mac",
            Self::Ip => "ip",
            Self::Prefix => "prefix",
            Self::Range => "range",
            Self::ObjectId => "object_id",
            Self::List => "list",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered list of scalar values of one element kind.
///
/// Lists of lists cannot be constructed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttrList {
    elem: ValueKind,
    items: Vec<AttributeValue>,
}

impl AttrList {
    /// Build a list, checking every item is a scalar of kind `elem`.
    pub fn new(elem: ValueKind, items: Vec<AttributeValue>) -> SwitchResult<Self> {
        if elem.is_list() {
            return Err(SwitchError::invalid("lists of lists are not supported"));
        }
        if let Some(bad) = items.iter().find(|v| v.kind() != elem) {
            return Err(SwitchError::invalid(format!(
                "list of {elem} contains a {} element",
                bad.kind()
            )));
        }
        Ok(Self { elem, items })
    }

    pub fn empty(elem: ValueKind) -> SwitchResult<Self> {
        Self::new(elem, Vec::new())
    }

    /// List of object handles.
    pub fn of_ids(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        Self {
            elem: ValueKind::ObjectId,
            items: ids.into_iter().map(AttributeValue::ObjectId).collect(),
        }
    }

    pub fn elem_kind(&self) -> ValueKind {
        self.elem
    }

    pub fn items(&self) -> &[AttributeValue] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<AttributeValue> {
        self.items
    }
}

/// A single attribute value of any supported kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    /// Enum stored by numeric value; the schema owns the symbolic names.
    Enum(u64),
    String(String),
    Mac(MacAddr),
    Ip(IpAddr),
    Prefix(IpPrefix),
    Range(ValueRange),
    ObjectId(ObjectId),
    List(AttrList),
}

impl AttributeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::U8(_) => ValueKind::U8,
            Self::U16(_) => ValueKind::U16,
            Self::U32(_) => ValueKind::U32,
            Self::U64(_) => ValueKind::U64,
            Self::I8(_) => ValueKind::I8,
            Self::I16(_) => ValueKind::I16,
            Self::I32(_) => ValueKind::I32,
            Self::I64(_) => ValueKind::I64,
            Self::Enum(_) => ValueKind::Enum,
            Self::String(_) => ValueKind::String,
            Self::Mac(_) => ValueKind::Mac,
            Self::Ip(_) => ValueKind::Ip,
            Self::Prefix(_) => ValueKind::Prefix,
            Self::Range(_) => ValueKind::Range,
            Self::ObjectId(_) => ValueKind::ObjectId,
            Self::List(_) => ValueKind::List,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Self::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&AttrList> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// Unsigned integer and enum values widened to `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::U8(v) => Some(u64::from(v)),
            Self::U16(v) => Some(u64::from(v)),
            Self::U32(v) => Some(u64::from(v)),
            Self::U64(v) | Self::Enum(v) => Some(v),
            _ => None,
        }
    }

    /// Every non-null object handle held by this value, one per list
    /// element for object-id lists.
    pub fn referenced_ids(&self) -> Vec<ObjectId> {
        match self {
            Self::ObjectId(id) if !id.is_null() => vec![*id],
            Self::List(list) => list
                .items()
                .iter()
                .filter_map(Self::as_object_id)
                .filter(|id| !id.is_null())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u16> for AttributeValue {
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<ObjectId> for AttributeValue {
    fn from(v: ObjectId) -> Self {
        Self::ObjectId(v)
    }
}

impl From<AttrList> for AttributeValue {
    fn from(v: AttrList) -> Self {
        Self::List(v)
    }
}

/// An attribute id paired with its value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttrId,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(id: AttrId, value: impl Into<AttributeValue>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}
