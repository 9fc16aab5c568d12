use sws_schema::KeyGroup;
use sws_types::{Attribute, AttributeValue};

/// Ordered values of one key group.
///
/// Equality and hashing are derived from the values themselves, so two
/// tuples are the same key exactly when every value has the same kind and
/// payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyTuple(Vec<AttributeValue>);

impl KeyTuple {
    pub fn new(values: Vec<AttributeValue>) -> Self {
        Self(values)
    }

    /// Build the key for `group` from an attribute snapshot, in group order.
    ///
    /// Returns `None` when an attribute of the group is absent, meaning the
    /// object is not eligible for this group.
    pub fn from_attrs(group: &KeyGroup, attrs: &[Attribute]) -> Option<Self> {
        group
            .attrs
            .iter()
            .map(|id| attrs.iter().find(|a| a.id == *id).map(|a| a.value.clone()))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    pub fn values(&self) -> &[AttributeValue] {
        &self.0
    }
}
