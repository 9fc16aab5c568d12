//! The validated, read-only model.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use sws_types::{AttrId, AttributeValue, ObjectType, SwitchError, SwitchResult, ValueKind};
use tracing::debug;

use crate::description::{ModelDescription, ObjectDescription};
use crate::error::{SchemaError, SchemaResult};
use crate::metadata::{AttributeMetadata, KeyGroup, Membership, ObjectInfo};

/// Object-type and attribute metadata queried by the store.
///
/// Immutable after [`ModelInfo::build`]; every lookup is lock-free.
#[derive(Debug)]
pub struct ModelInfo {
    objects: BTreeMap<ObjectType, ObjectInfo>,
    attrs: HashMap<AttrId, AttributeMetadata>,
    type_names: HashMap<String, ObjectType>,
    /// For each type, the types holding tracked references that may point at it.
    inverse_refs: HashMap<ObjectType, Vec<ObjectType>>,
}

impl ModelInfo {
    /// Parse and validate a JSON model description.
    pub fn from_json_str(json: &str) -> SchemaResult<Self> {
        let desc: ModelDescription = serde_json::from_str(json)?;
        Self::build(desc)
    }

    /// Read a JSON model description from disk.
    pub fn from_json_file(path: &Path) -> SchemaResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SchemaError::Invalid(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Validate a description and resolve every name to an id.
    pub fn build(desc: ModelDescription) -> SchemaResult<Self> {
        let mut type_names = HashMap::new();
        for obj in &desc.objects {
            if obj.id == 0 {
                return Err(SchemaError::Invalid(format!(
                    "object type {} uses reserved id 0",
                    obj.name
                )));
            }
            if type_names.insert(obj.name.clone(), ObjectType(obj.id)).is_some() {
                return Err(SchemaError::Invalid(format!(
                    "duplicate object type name {}",
                    obj.name
                )));
            }
        }

        let mut objects = BTreeMap::new();
        let mut attrs = HashMap::new();
        for obj in &desc.objects {
            let ot = ObjectType(obj.id);
            let mut attr_ids = Vec::with_capacity(obj.attributes.len());
            for a in &obj.attributes {
                if a.kind == ValueKind::List
                    && !matches!(a.list_type, Some(k) if !k.is_list())
                {
                    return Err(SchemaError::Invalid(format!(
                        "list attribute {} needs a scalar list_type",
                        a.name
                    )));
                }
                let allowed_object_types = a
                    .allowed_types
                    .iter()
                    .map(|name| {
                        type_names.get(name).copied().ok_or_else(|| {
                            SchemaError::Invalid(format!(
                                "attribute {} allows unknown type {name}",
                                a.name
                            ))
                        })
                    })
                    .collect::<SchemaResult<Vec<_>>>()?;
                let meta = AttributeMetadata {
                    id: a.id,
                    name: a.name.clone(),
                    object_type: ot,
                    kind: a.kind,
                    list_kind: a.list_type.filter(|_| a.kind == ValueKind::List),
                    flags: a.flags,
                    default: a.resolve_default()?,
                    allowed_object_types,
                    enum_values: a.enum_values.clone(),
                    max_len: a.max_len,
                };
                if attrs.insert(a.id, meta).is_some() {
                    return Err(SchemaError::Invalid(format!(
                        "duplicate attribute id {}",
                        a.id
                    )));
                }
                attr_ids.push(a.id);
            }
            let info = ObjectInfo {
                object_type: ot,
                name: obj.name.clone(),
                class: obj.class,
                key_groups: resolve_key_groups(obj)?,
                memberships: Vec::new(),
                attrs: attr_ids,
            };
            if objects.insert(ot, info).is_some() {
                return Err(SchemaError::Invalid(format!("duplicate object type id {}", obj.id)));
            }
        }

        let mut model = Self {
            objects,
            attrs,
            type_names,
            inverse_refs: HashMap::new(),
        };
        for obj in &desc.objects {
            let memberships = model.resolve_memberships(obj)?;
            if let Some(info) = model.objects.get_mut(&ObjectType(obj.id)) {
                info.memberships = memberships;
            }
        }
        model.inverse_refs = model.compute_inverse_refs();
        debug!(
            object_types = model.objects.len(),
            attributes = model.attrs.len(),
            "model loaded"
        );
        Ok(model)
    }

    fn resolve_memberships(&self, obj: &ObjectDescription) -> SchemaResult<Vec<Membership>> {
        let ot = ObjectType(obj.id);
        obj.membership
            .iter()
            .map(|m| {
                let group_type = self.type_names.get(&m.group).copied().ok_or_else(|| {
                    SchemaError::Invalid(format!("{} is a member of unknown type {}", obj.name, m.group))
                })?;
                let member = self
                    .attr_by_name(ot, &m.member_attr)
                    .map_err(|e| SchemaError::Invalid(e.to_string()))?;
                let list = self
                    .attr_by_name(group_type, &m.group_list_attr)
                    .map_err(|e| SchemaError::Invalid(e.to_string()))?;
                if member.kind != ValueKind::ObjectId {
                    return Err(SchemaError::Invalid(format!(
                        "membership attribute {} must be an object id",
                        member.name
                    )));
                }
                if list.list_kind != Some(ValueKind::ObjectId) {
                    return Err(SchemaError::Invalid(format!(
                        "group list attribute {} must be an object-id list",
                        list.name
                    )));
                }
                // Member handles on the group must not count as references,
                // or no member could ever be deleted.
                if list.is_tracked_reference() {
                    return Err(SchemaError::Invalid(format!(
                        "group list attribute {} must be read_only or internal",
                        list.name
                    )));
                }
                Ok(Membership {
                    group_type,
                    member_attr: member.id,
                    group_list_attr: list.id,
                })
            })
            .collect()
    }

    fn compute_inverse_refs(&self) -> HashMap<ObjectType, Vec<ObjectType>> {
        let mut inverse: HashMap<ObjectType, BTreeSet<ObjectType>> = HashMap::new();
        for meta in self.attrs.values().filter(|m| m.is_tracked_reference()) {
            let targets: Vec<ObjectType> = if meta.allowed_object_types.is_empty() {
                self.objects.keys().copied().collect()
            } else {
                meta.allowed_object_types.clone()
            };
            for target in targets {
                inverse.entry(target).or_default().insert(meta.object_type);
            }
        }
        inverse
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect()
    }

    // ---------------------------------------------------------------
    // Object types
    // ---------------------------------------------------------------

    pub fn object(&self, ot: ObjectType) -> SwitchResult<&ObjectInfo> {
        self.objects
            .get(&ot)
            .ok_or_else(|| SwitchError::invalid(format!("unknown object type {ot}")))
    }

    pub fn object_types(&self) -> impl Iterator<Item = ObjectType> + '_ {
        self.objects.keys().copied()
    }

    pub fn object_type_by_name(&self, name: &str) -> SwitchResult<ObjectType> {
        self.type_names
            .get(name)
            .copied()
            .ok_or_else(|| SwitchError::not_found(format!("object type {name:?}")))
    }

    /// Name of an object type, or `"unknown"`.
    pub fn object_name(&self, ot: ObjectType) -> &str {
        self.objects.get(&ot).map_or("unknown", |o| o.name.as_str())
    }

    /// Types whose tracked reference attributes may point at `ot`.
    pub fn referencing_types(&self, ot: ObjectType) -> &[ObjectType] {
        self.inverse_refs.get(&ot).map_or(&[], Vec::as_slice)
    }

    // ---------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------

    pub fn attr(&self, id: AttrId) -> SwitchResult<&AttributeMetadata> {
        self.attrs
            .get(&id)
            .ok_or_else(|| SwitchError::invalid(format!("unknown attribute {id}")))
    }

    /// Attribute metadata, checking that `id` belongs to `ot`.
    pub fn attr_of(&self, ot: ObjectType, id: AttrId) -> SwitchResult<&AttributeMetadata> {
        let meta = self.attr(id)?;
        if meta.object_type != ot {
            return Err(SwitchError::invalid(format!(
                "attribute {} belongs to {}, not {}",
                meta.name,
                self.object_name(meta.object_type),
                self.object_name(ot)
            )));
        }
        Ok(meta)
    }

    pub fn attr_by_name(&self, ot: ObjectType, name: &str) -> SwitchResult<&AttributeMetadata> {
        self.object(ot)?
            .attrs
            .iter()
            .filter_map(|id| self.attrs.get(id))
            .find(|m| m.name == name)
            .ok_or_else(|| {
                SwitchError::invalid(format!(
                    "type {} has no attribute {name:?}",
                    self.object_name(ot)
                ))
            })
    }

    /// Every attribute of `ot`, in declaration order.
    pub fn attrs_of(&self, ot: ObjectType) -> SwitchResult<Vec<&AttributeMetadata>> {
        Ok(self
            .object(ot)?
            .attrs
            .iter()
            .filter_map(|id| self.attrs.get(id))
            .collect())
    }

    // ---------------------------------------------------------------
    // Key groups
    // ---------------------------------------------------------------

    /// Index of the key group of `ot` made of exactly `attrs` (any order).
    pub fn match_key_group(&self, ot: ObjectType, attrs: &[AttrId]) -> SwitchResult<usize> {
        let wanted: BTreeSet<AttrId> = attrs.iter().copied().collect();
        if wanted.len() != attrs.len() {
            return Err(SwitchError::InvalidKeyGroup(ot));
        }
        self.object(ot)?
            .key_groups
            .iter()
            .position(|g| g.attrs.len() == wanted.len() && g.attrs.iter().all(|a| wanted.contains(a)))
            .ok_or(SwitchError::InvalidKeyGroup(ot))
    }

    // ---------------------------------------------------------------
    // Value validation
    // ---------------------------------------------------------------

    /// Check `value` against the attribute's kind, enum set, length limit,
    /// and allowed reference types.
    pub fn validate_value(&self, meta: &AttributeMetadata, value: &AttributeValue) -> SwitchResult<()> {
        if value.kind() != meta.kind {
            return Err(SwitchError::invalid(format!(
                "attribute {} expects {}, got {}",
                meta.name,
                meta.kind,
                value.kind()
            )));
        }
        match value {
            AttributeValue::List(list) => {
                if Some(list.elem_kind()) != meta.list_kind {
                    return Err(SwitchError::invalid(format!(
                        "attribute {} expects a list of {:?}, got list of {}",
                        meta.name,
                        meta.list_kind,
                        list.elem_kind()
                    )));
                }
                list.items()
                    .iter()
                    .try_for_each(|item| self.validate_scalar(meta, item))
            }
            scalar => self.validate_scalar(meta, scalar),
        }
    }

    fn validate_scalar(&self, meta: &AttributeMetadata, value: &AttributeValue) -> SwitchResult<()> {
        match value {
            AttributeValue::Enum(v) => {
                if !meta.enum_values.is_empty() && meta.enum_name(*v).is_none() {
                    return Err(SwitchError::invalid(format!(
                        "{v} is not a value of enum attribute {}",
                        meta.name
                    )));
                }
            }
            AttributeValue::String(s) => {
                if let Some(max) = meta.max_len {
                    if s.len() > max {
                        return Err(SwitchError::invalid(format!(
                            "string of {} bytes exceeds {max} for {}",
                            s.len(),
                            meta.name
                        )));
                    }
                }
            }
            AttributeValue::ObjectId(id) if !id.is_null() => {
                let ot = id.object_type();
                if !self.objects.contains_key(&ot) {
                    return Err(SwitchError::invalid(format!("{id} has unknown object type")));
                }
                if !meta.allowed_object_types.is_empty() && !meta.allowed_object_types.contains(&ot) {
                    return Err(SwitchError::invalid(format!(
                        "attribute {} cannot reference a {}",
                        meta.name,
                        self.object_name(ot)
                    )));
                }
            }
            AttributeValue::List(_) => {
                return Err(SwitchError::invalid("lists of lists are not supported"));
            }
            _ => {}
        }
        Ok(())
    }
}

fn resolve_key_groups(obj: &ObjectDescription) -> SchemaResult<Vec<KeyGroup>> {
    obj.key_groups
        .iter()
        .map(|names| {
            if names.is_empty() {
                return Err(SchemaError::Invalid(format!("empty key group on {}", obj.name)));
            }
            let attrs = names
                .iter()
                .map(|n| {
                    obj.attributes
                        .iter()
                        .find(|a| &a.name == n)
                        .map(|a| a.id)
                        .ok_or_else(|| {
                            SchemaError::Invalid(format!("key group of {} names unknown attribute {n}", obj.name))
                        })
                })
                .collect::<SchemaResult<Vec<_>>>()?;
            Ok(KeyGroup { attrs })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sws_types::{AttrList, ObjectId};

    fn sample() -> ModelInfo {
        let desc = json!({
            "objects": [
                {
                    "name": "port", "id": 1,
                    "attributes": [
                        {"id": 10, "name": "lane", "type": "u32", "flags": {"mandatory": true}},
                        {"id": 11, "name": "queues", "type": "list", "list_type": "object_id",
                         "flags": {"read_only": true}},
                        {"id": 12, "name": "speed", "type": "enum",
                         "enum_values": {"10g": 1, "100g": 2}, "default": "10g"}
                    ],
                    "key_groups": [["lane"]]
                },
                {
                    "name": "queue", "id": 2,
                    "attributes": [
                        {"id": 20, "name": "port_handle", "type": "object_id", "allowed_types": ["port"]},
                        {"id": 21, "name": "qid", "type": "u8"},
                        {"id": 22, "name": "label", "type": "string", "max_len": 4}
                    ],
                    "key_groups": [["port_handle", "qid"]],
                    "membership": [{"group": "port", "member_attr": "port_handle", "group_list_attr": "queues"}]
                }
            ]
        });
        ModelInfo::build(serde_json::from_value(desc).unwrap()).unwrap()
    }

    #[test]
    fn resolves_names_and_defaults() {
        let m = sample();
        let port = m.object_type_by_name("port").unwrap();
        assert_eq!(port, ObjectType(1));
        let speed = m.attr_by_name(port, "speed").unwrap();
        assert_eq!(speed.default, AttributeValue::Enum(1));
        assert_eq!(speed.enum_name(2), Some("100g"));
    }

    #[test]
    fn membership_is_resolved_to_ids() {
        let m = sample();
        let queue = m.object(ObjectType(2)).unwrap();
        assert_eq!(
            queue.memberships,
            vec![Membership {
                group_type: ObjectType(1),
                member_attr: 20,
                group_list_attr: 11
            }]
        );
    }

    #[test]
    fn inverse_refs_only_follow_tracked_attributes() {
        let m = sample();
        // queue.port_handle is tracked; port.queues is read-only.
        assert_eq!(m.referencing_types(ObjectType(1)), &[ObjectType(2)]);
        assert!(m.referencing_types(ObjectType(2)).is_empty());
    }

    #[test]
    fn key_group_matching_ignores_order() {
        let m = sample();
        assert_eq!(m.match_key_group(ObjectType(2), &[21, 20]).unwrap(), 0);
        assert!(matches!(
            m.match_key_group(ObjectType(2), &[21]),
            Err(SwitchError::InvalidKeyGroup(_))
        ));
    }

    #[test]
    fn attr_of_rejects_foreign_attribute() {
        let m = sample();
        assert!(m.attr_of(ObjectType(1), 20).is_err());
        assert!(m.attr_of(ObjectType(2), 20).is_ok());
    }

    #[test]
    fn validate_value_checks_kind_enum_len_and_refs() {
        let m = sample();
        let speed = m.attr(12).unwrap();
        assert!(m.validate_value(speed, &AttributeValue::Enum(2)).is_ok());
        assert!(m.validate_value(speed, &AttributeValue::Enum(9)).is_err());
        assert!(m.validate_value(speed, &AttributeValue::U32(1)).is_err());

        let label = m.attr(22).unwrap();
        assert!(m.validate_value(label, &"abcd".into()).is_ok());
        assert!(m.validate_value(label, &"abcde".into()).is_err());

        let port_handle = m.attr(20).unwrap();
        let port = ObjectId::new(ObjectType(1), 1).unwrap();
        let queue = ObjectId::new(ObjectType(2), 1).unwrap();
        assert!(m.validate_value(port_handle, &port.into()).is_ok());
        assert!(m.validate_value(port_handle, &queue.into()).is_err());
        assert!(m.validate_value(port_handle, &ObjectId::NULL.into()).is_ok());
    }

    #[test]
    fn validate_value_checks_list_element_kind() {
        let m = sample();
        let queues = m.attr(11).unwrap();
        let ok = AttributeValue::List(AttrList::of_ids([ObjectId::NULL]));
        assert!(m.validate_value(queues, &ok).is_ok());
        let bad = AttributeValue::List(AttrList::empty(ValueKind::U32).unwrap());
        assert!(m.validate_value(queues, &bad).is_err());
    }

    #[test]
    fn duplicate_attribute_ids_are_rejected() {
        let desc = json!({"objects": [
            {"name": "a", "id": 1, "attributes": [{"id": 1, "name": "x", "type": "u8"}]},
            {"name": "b", "id": 2, "attributes": [{"id": 1, "name": "y", "type": "u8"}]}
        ]});
        let err = ModelInfo::build(serde_json::from_value(desc).unwrap()).unwrap_err();
        assert!(matches!(err, SchemaError::Invalid(_)));
    }

    #[test]
    fn key_group_with_unknown_attribute_is_rejected() {
        let desc = json!({"objects": [
            {"name": "a", "id": 1, "attributes": [], "key_groups": [["nope"]]}
        ]});
        assert!(ModelInfo::build(serde_json::from_value(desc).unwrap()).is_err());
    }

    #[test]
    fn reserved_type_id_is_rejected() {
        let desc = json!({"objects": [{"name": "a", "id": 0}]});
        assert!(ModelInfo::build(serde_json::from_value(desc).unwrap()).is_err());
    }
}
