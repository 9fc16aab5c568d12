//! Metadata types handed out by [`crate::ModelInfo`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sws_types::{AttrId, AttributeValue, ObjectType, ValueKind};

/// Attribute behaviour flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeFlags {
    /// Must be supplied at create.
    pub mandatory: bool,
    /// May only be supplied at create.
    pub create_only: bool,
    /// Never changes after create.
    pub immutable: bool,
    /// System bookkeeping; never produces reference edges.
    pub internal: bool,
    /// Not writable by top-level callers.
    pub read_only: bool,
    /// Reference changes drive AUTO-object re-evaluation.
    pub re_evaluate: bool,
    /// Backed by hardware counters.
    pub is_counter: bool,
}

/// Lifecycle owner of an object type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    /// Created and destroyed by explicit API calls.
    #[default]
    User,
    /// Created and destroyed by the trigger engine.
    Auto,
}

/// Schema description of one attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeMetadata {
    pub id: AttrId,
    pub name: String,
    pub object_type: ObjectType,
    pub kind: ValueKind,
    /// Element kind, set only when `kind` is [`ValueKind::List`].
    pub list_kind: Option<ValueKind>,
    pub flags: AttributeFlags,
    /// Resolved default, including the kind's zero value when the model
    /// declares none.
    pub default: AttributeValue,
    /// Object types an object-id attribute may point at. Empty means any.
    pub allowed_object_types: Vec<ObjectType>,
    pub enum_values: BTreeMap<String, u64>,
    pub max_len: Option<usize>,
}

impl AttributeMetadata {
    /// `true` for object-id scalars and object-id lists.
    pub fn holds_references(&self) -> bool {
        self.kind == ValueKind::ObjectId || self.list_kind == Some(ValueKind::ObjectId)
    }

    /// `true` when setting this attribute produces reference edges.
    pub fn is_tracked_reference(&self) -> bool {
        self.holds_references() && !self.flags.internal && !self.flags.read_only
    }

    pub fn is_list(&self) -> bool {
        self.kind == ValueKind::List
    }

    /// Symbolic name for an enum value.
    pub fn enum_name(&self, value: u64) -> Option<&str> {
        self.enum_values
            .iter()
            .find(|(_, v)| **v == value)
            .map(|(name, _)| name.as_str())
    }
}

/// Ordered attribute list forming a unique secondary key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyGroup {
    pub attrs: Vec<AttrId>,
}

/// Declares that objects of the owning type are members of a group object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Membership {
    pub group_type: ObjectType,
    /// Attribute on the member pointing at the group object.
    pub member_attr: AttrId,
    /// Object-id list attribute on the group collecting member handles.
    pub group_list_attr: AttrId,
}

/// Schema description of one object type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    pub object_type: ObjectType,
    pub name: String,
    pub class: ObjectClass,
    /// Attribute ids in declaration order.
    pub attrs: Vec<AttrId>,
    pub key_groups: Vec<KeyGroup>,
    pub memberships: Vec<Membership>,
}

impl ObjectInfo {
    pub fn is_auto(&self) -> bool {
        self.class == ObjectClass::Auto
    }

    /// `true` if `attr` appears in any key group.
    pub fn is_key_attr(&self, attr: AttrId) -> bool {
        self.key_groups.iter().any(|g| g.attrs.contains(&attr))
    }
}
