use std::collections::BTreeMap;

use parking_lot::RwLock;
use sws_types::{AttrId, AttrList, Attribute, AttributeValue, ObjectId, ObjectType, ValueKind};

use crate::error::{StoreError, StoreResult};

/// One storage slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    /// A scalar value, or one list element.
    Value(AttributeValue),
    /// List header at `extra == 0`.
    ListHeader { len: u32, elem: ValueKind },
}

/// Visibility of an object's slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectStatus {
    /// Slots are being written; invisible to lookups.
    Pending,
    /// Fully created.
    Live,
}

#[derive(Debug)]
struct ObjectSlots {
    status: ObjectStatus,
    slots: BTreeMap<(AttrId, u32), Slot>,
}

impl ObjectSlots {
    fn header(&self, id: ObjectId, attr: AttrId) -> StoreResult<(u32, ValueKind)> {
        match self.slots.get(&(attr, 0)) {
            Some(Slot::ListHeader { len, elem }) => Ok((*len, *elem)),
            Some(Slot::Value(v)) => Err(StoreError::TypeMismatch {
                id,
                attr,
                stored: v.kind(),
                given: ValueKind::List,
            }),
            None => Err(StoreError::SlotNotFound { id, attr, extra: 0 }),
        }
    }

    fn push(&mut self, id: ObjectId, attr: AttrId, value: AttributeValue) -> StoreResult<u32> {
        let (len, elem) = self.header(id, attr)?;
        if value.kind() != elem {
            return Err(StoreError::TypeMismatch {
                id,
                attr,
                stored: elem,
                given: value.kind(),
            });
        }
        let len = len + 1;
        self.slots.insert((attr, len), Slot::Value(value));
        self.slots.insert((attr, 0), Slot::ListHeader { len, elem });
        Ok(len)
    }

    /// Remove the tail element. Returns `false` once the list is empty.
    fn pop(&mut self, id: ObjectId, attr: AttrId) -> StoreResult<bool> {
        let (len, elem) = self.header(id, attr)?;
        if len == 0 {
            return Ok(false);
        }
        self.slots.remove(&(attr, len));
        self.slots
            .insert((attr, 0), Slot::ListHeader { len: len - 1, elem });
        Ok(true)
    }

    fn assemble(&self, id: ObjectId, attr: AttrId) -> StoreResult<AttributeValue> {
        match self.slots.get(&(attr, 0)) {
            Some(Slot::Value(v)) => Ok(v.clone()),
            Some(Slot::ListHeader { len, elem }) => {
                let items = (1..=*len)
                    .map(|extra| match self.slots.get(&(attr, extra)) {
                        Some(Slot::Value(v)) => Ok(v.clone()),
                        _ => Err(StoreError::CorruptList {
                            id,
                            attr,
                            reason: format!("missing element {extra} of {len}"),
                        }),
                    })
                    .collect::<StoreResult<Vec<_>>>()?;
                AttrList::new(*elem, items)
                    .map(AttributeValue::List)
                    .map_err(|e| StoreError::CorruptList {
                        id,
                        attr,
                        reason: e.to_string(),
                    })
            }
            None => Err(StoreError::SlotNotFound { id, attr, extra: 0 }),
        }
    }
}

/// Per-object attribute slots for every object in the store.
///
/// Objects are kept in handle order, so iteration within one object type
/// yields ascending dense ids.
pub struct AttributeStore {
    objects: RwLock<BTreeMap<ObjectId, ObjectSlots>>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    // ---------------------------------------------------------------
    // Object lifecycle
    // ---------------------------------------------------------------

    /// Allocate an empty, pending slot map for a new object.
    pub fn create(&self, id: ObjectId) -> StoreResult<()> {
        let mut objects = self.objects.write();
        if objects.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        objects.insert(
            id,
            ObjectSlots {
                status: ObjectStatus::Pending,
                slots: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Remove every slot of an object.
    pub fn delete(&self, id: ObjectId) -> StoreResult<()> {
        self.objects
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    pub fn status(&self, id: ObjectId) -> StoreResult<ObjectStatus> {
        self.objects
            .read()
            .get(&id)
            .map(|o| o.status)
            .ok_or(StoreError::NotFound(id))
    }

    pub fn set_status(&self, id: ObjectId, status: ObjectStatus) -> StoreResult<()> {
        let mut objects = self.objects.write();
        let obj = objects.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        obj.status = status;
        Ok(())
    }

    /// `true` if the object exists and is live.
    pub fn is_live(&self, id: ObjectId) -> bool {
        matches!(self.status(id), Ok(ObjectStatus::Live))
    }

    // ---------------------------------------------------------------
    // Single slots
    // ---------------------------------------------------------------

    /// Write one slot. A scalar slot keeps its kind once written.
    pub fn set_slot(&self, id: ObjectId, attr: AttrId, extra: u32, slot: Slot) -> StoreResult<()> {
        let mut objects = self.objects.write();
        let obj = objects.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let (Some(Slot::Value(old)), Slot::Value(new)) = (obj.slots.get(&(attr, extra)), &slot) {
            if old.kind() != new.kind() {
                return Err(StoreError::TypeMismatch {
                    id,
                    attr,
                    stored: old.kind(),
                    given: new.kind(),
                });
            }
        }
        obj.slots.insert((attr, extra), slot);
        Ok(())
    }

    pub fn get_slot(&self, id: ObjectId, attr: AttrId, extra: u32) -> StoreResult<Slot> {
        let objects = self.objects.read();
        let obj = objects.get(&id).ok_or(StoreError::NotFound(id))?;
        obj.slots
            .get(&(attr, extra))
            .cloned()
            .ok_or(StoreError::SlotNotFound { id, attr, extra })
    }

    // ---------------------------------------------------------------
    // Whole attributes
    // ---------------------------------------------------------------

    /// Write a whole attribute. Lists are cleared and re-pushed.
    pub fn set(&self, id: ObjectId, attr: AttrId, value: &AttributeValue) -> StoreResult<()> {
        match value {
            AttributeValue::List(list) => {
                let existing = match self.get_slot(id, attr, 0) {
                    Ok(Slot::ListHeader { elem, .. }) => Some(elem),
                    Ok(Slot::Value(v)) => {
                        return Err(StoreError::TypeMismatch {
                            id,
                            attr,
                            stored: v.kind(),
                            given: ValueKind::List,
                        })
                    }
                    Err(StoreError::SlotNotFound { .. }) => None,
                    Err(e) => return Err(e),
                };
                match existing {
                    Some(elem) if elem != list.elem_kind() => {
                        return Err(StoreError::TypeMismatch {
                            id,
                            attr,
                            stored: elem,
                            given: list.elem_kind(),
                        })
                    }
                    Some(_) => self.list_clear(id, attr)?,
                    None => self.set_slot(
                        id,
                        attr,
                        0,
                        Slot::ListHeader {
                            len: 0,
                            elem: list.elem_kind(),
                        },
                    )?,
                }
                for item in list.items() {
                    self.list_push(id, attr, item.clone())?;
                }
                Ok(())
            }
            scalar => self.set_slot(id, attr, 0, Slot::Value(scalar.clone())),
        }
    }

    /// Read a whole attribute, assembling lists from their header.
    pub fn get(&self, id: ObjectId, attr: AttrId) -> StoreResult<AttributeValue> {
        let objects = self.objects.read();
        let obj = objects.get(&id).ok_or(StoreError::NotFound(id))?;
        obj.assemble(id, attr)
    }

    /// Every attribute of an object, ordered by attribute id.
    pub fn get_all(&self, id: ObjectId) -> StoreResult<Vec<Attribute>> {
        let objects = self.objects.read();
        let obj = objects.get(&id).ok_or(StoreError::NotFound(id))?;
        obj.slots
            .keys()
            .filter(|(_, extra)| *extra == 0)
            .map(|(attr, _)| {
                Ok(Attribute {
                    id: *attr,
                    value: obj.assemble(id, *attr)?,
                })
            })
            .collect()
    }

    /// Remove one attribute's slots entirely.
    pub fn remove_attr(&self, id: ObjectId, attr: AttrId) -> StoreResult<()> {
        let mut objects = self.objects.write();
        let obj = objects.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        obj.slots.retain(|(a, _), _| *a != attr);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Lists
    // ---------------------------------------------------------------

    /// Append one element. Returns the new length.
    pub fn list_push(&self, id: ObjectId, attr: AttrId, value: AttributeValue) -> StoreResult<u32> {
        let mut objects = self.objects.write();
        let obj = objects.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        obj.push(id, attr, value)
    }

    /// Pop elements from the tail until the header reads zero.
    pub fn list_clear(&self, id: ObjectId, attr: AttrId) -> StoreResult<()> {
        loop {
            let mut objects = self.objects.write();
            let obj = objects.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            if !obj.pop(id, attr)? {
                return Ok(());
            }
        }
    }

    pub fn list_len(&self, id: ObjectId, attr: AttrId) -> StoreResult<u32> {
        let objects = self.objects.read();
        let obj = objects.get(&id).ok_or(StoreError::NotFound(id))?;
        obj.header(id, attr).map(|(len, _)| len)
    }

    /// Remove the first element equal to `value`, keeping the rest in order.
    /// Returns `false` if no element matched.
    pub fn list_remove(&self, id: ObjectId, attr: AttrId, value: &AttributeValue) -> StoreResult<bool> {
        let mut objects = self.objects.write();
        let obj = objects.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let current = match obj.assemble(id, attr)? {
            AttributeValue::List(list) => list,
            other => {
                return Err(StoreError::TypeMismatch {
                    id,
                    attr,
                    stored: other.kind(),
                    given: ValueKind::List,
                })
            }
        };
        let Some(pos) = current.items().iter().position(|v| v == value) else {
            return Ok(false);
        };
        let tail: Vec<AttributeValue> = current.items()[pos + 1..].to_vec();
        // Pop back to the removed element, then re-push what followed it.
        let keep = pos as u32;
        while obj.header(id, attr)?.0 > keep {
            obj.pop(id, attr)?;
        }
        for item in tail {
            obj.push(id, attr, item)?;
        }
        Ok(true)
    }

    // ---------------------------------------------------------------
    // Iteration
    // ---------------------------------------------------------------

    /// Live handles of one type, in ascending dense-id order.
    pub fn ids_of_type(&self, ot: ObjectType) -> Vec<ObjectId> {
        self.live_after(ot, 0, usize::MAX)
    }

    /// Up to `limit` live handles of type `ot` with dense id above `after`.
    pub fn live_after(&self, ot: ObjectType, after: u64, limit: usize) -> Vec<ObjectId> {
        if after >= ObjectId::MAX_DENSE {
            return Vec::new();
        }
        let (Ok(lo), Ok(hi)) = (
            ObjectId::new(ot, after + 1),
            ObjectId::new(ot, ObjectId::MAX_DENSE),
        ) else {
            return Vec::new();
        };
        self.objects
            .read()
            .range(lo..=hi)
            .filter(|(_, o)| o.status == ObjectStatus::Live)
            .map(|(id, _)| *id)
            .take(limit)
            .collect()
    }

    /// Every live handle, in handle order.
    pub fn all_live(&self) -> Vec<ObjectId> {
        self.objects
            .read()
            .iter()
            .filter(|(_, o)| o.status == ObjectStatus::Live)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of objects, pending ones included.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for AttributeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AttributeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeStore")
            .field("object_count", &self.len())
            .finish()
    }
}
