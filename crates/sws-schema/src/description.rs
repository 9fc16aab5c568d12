//! Serialized model description, as loaded from JSON.
//!
//! Types and attributes are referred to by name inside the description;
//! [`crate::ModelInfo::build`] resolves the names to ids.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sws_types::{AttrList, AttributeValue, ObjectId, ValueKind};

use crate::error::{SchemaError, SchemaResult};
use crate::metadata::{AttributeFlags, ObjectClass};

/// Root of a model description.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelDescription {
    pub objects: Vec<ObjectDescription>,
}

/// One object type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectDescription {
    pub name: String,
    pub id: u16,
    #[serde(default)]
    pub class: ObjectClass,
    #[serde(default)]
    pub attributes: Vec<AttributeDescription>,
    /// Each key group is a list of attribute names.
    #[serde(default)]
    pub key_groups: Vec<Vec<String>>,
    #[serde(default)]
    pub membership: Vec<MembershipDescription>,
}

/// One attribute of an object type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeDescription {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    #[serde(default)]
    pub list_type: Option<ValueKind>,
    #[serde(default)]
    pub flags: AttributeFlags,
    #[serde(default)]
    pub default: Option<Value>,
    /// Names of object types an object-id attribute may reference.
    #[serde(default)]
    pub allowed_types: Vec<String>,
    #[serde(default)]
    pub enum_values: BTreeMap<String, u64>,
    #[serde(default)]
    pub max_len: Option<usize>,
}

/// Group membership of an object type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MembershipDescription {
    /// Name of the group object type.
    pub group: String,
    /// Attribute on the member that references the group object.
    pub member_attr: String,
    /// List attribute on the group that collects member handles.
    pub group_list_attr: String,
}

impl AttributeDescription {
    /// Resolve the declared default, falling back to the kind's zero value.
    pub(crate) fn resolve_default(&self) -> SchemaResult<AttributeValue> {
        let bad = |reason: String| SchemaError::BadDefault {
            attr: self.name.clone(),
            reason,
        };
        if self.kind == ValueKind::List {
            let elem = self
                .list_type
                .ok_or_else(|| bad("list attribute without list_type".into()))?;
            return match &self.default {
                None => AttrList::empty(elem)
                    .map(AttributeValue::List)
                    .map_err(|e| bad(e.to_string())),
                Some(Value::Array(items)) if items.is_empty() => AttrList::empty(elem)
                    .map(AttributeValue::List)
                    .map_err(|e| bad(e.to_string())),
                Some(other) => Err(bad(format!("list default must be [], got {other}"))),
            };
        }
        match &self.default {
            None | Some(Value::Null) => self.kind.zero().map_err(|e| bad(e.to_string())),
            Some(v) => scalar_from_json(self.kind, &self.enum_values, v).map_err(bad),
        }
    }
}

fn scalar_from_json(
    kind: ValueKind,
    enum_values: &BTreeMap<String, u64>,
    v: &Value,
) -> Result<AttributeValue, String> {
    let uint = |max: u64| -> Result<u64, String> {
        let n = v.as_u64().ok_or_else(|| format!("expected unsigned integer, got {v}"))?;
        if n > max {
            return Err(format!("{n} out of range"));
        }
        Ok(n)
    };
    let int = |min: i64, max: i64| -> Result<i64, String> {
        let n = v.as_i64().ok_or_else(|| format!("expected integer, got {v}"))?;
        if n < min || n > max {
            return Err(format!("{n} out of range"));
        }
        Ok(n)
    };
    let text = || v.as_str().ok_or_else(|| format!("expected string, got {v}"));

    Ok(match kind {
        ValueKind::Bool => AttributeValue::Bool(
            v.as_bool().ok_or_else(|| format!("expected bool, got {v}"))?,
        ),
        ValueKind::U8 => AttributeValue::U8(uint(u64::from(u8::MAX))? as u8),
        ValueKind::U16 => AttributeValue::U16(uint(u64::from(u16::MAX))? as u16),
        ValueKind::U32 => AttributeValue::U32(uint(u64::from(u32::MAX))? as u32),
        ValueKind::U64 => AttributeValue::U64(uint(u64::MAX)?),
        ValueKind::I8 => AttributeValue::I8(int(i64::from(i8::MIN), i64::from(i8::MAX))? as i8),
        ValueKind::I16 => {
            AttributeValue::I16(int(i64::from(i16::MIN), i64::from(i16::MAX))? as i16)
        }
        ValueKind::I32 => {
            AttributeValue::I32(int(i64::from(i32::MIN), i64::from(i32::MAX))? as i32)
        }
        ValueKind::I64 => AttributeValue::I64(int(i64::MIN, i64::MAX)?),
        ValueKind::Enum => match v {
            Value::String(name) => AttributeValue::Enum(
                *enum_values
                    .get(name)
                    .ok_or_else(|| format!("unknown enum value {name:?}"))?,
            ),
            _ => AttributeValue::Enum(uint(u64::MAX)?),
        },
        ValueKind::String => AttributeValue::String(text()?.to_string()),
        ValueKind::Mac => AttributeValue::Mac(text()?.parse().map_err(|e| format!("{e}"))?),
        ValueKind::Ip => AttributeValue::Ip(
            text()?
                .parse::<IpAddr>()
                .map_err(|e| format!("bad ip: {e}"))?,
        ),
        ValueKind::Prefix => AttributeValue::Prefix(text()?.parse().map_err(|e| format!("{e}"))?),
        ValueKind::Range => AttributeValue::Range(text()?.parse().map_err(|e| format!("{e}"))?),
        ValueKind::ObjectId => {
            if uint(0).is_err() {
                return Err("object-id default must be 0".into());
            }
            AttributeValue::ObjectId(ObjectId::NULL)
        }
        ValueKind::List => return Err("nested list default".into()),
    })
}
