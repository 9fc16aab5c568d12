//! The key tables.

use std::collections::HashMap;

use parking_lot::RwLock;
use sws_types::{ObjectId, ObjectType};
use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::key::KeyTuple;

type Table = HashMap<KeyTuple, ObjectId>;

/// Secondary index over every key group of every object type.
///
/// Tables are addressed by `(object type, key group position)`.
#[derive(Default)]
pub struct SecondaryIndex {
    tables: RwLock<HashMap<(ObjectType, usize), Table>>,
}

impl std::fmt::Debug for SecondaryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecondaryIndex")
            .field("entries", &self.len())
            .finish()
    }
}

impl SecondaryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `key` to `id` in one group.
    ///
    /// Re-inserting the same mapping is a no-op; a key owned by another
    /// object fails with [`IndexError::AlreadyExists`].
    pub fn insert(&self, ot: ObjectType, group: usize, key: KeyTuple, id: ObjectId) -> IndexResult<()> {
        let mut tables = self.tables.write();
        Self::insert_locked(&mut tables, ot, group, key, id)
    }

    fn insert_locked(
        tables: &mut HashMap<(ObjectType, usize), Table>,
        ot: ObjectType,
        group: usize,
        key: KeyTuple,
        id: ObjectId,
    ) -> IndexResult<()> {
        let table = tables.entry((ot, group)).or_default();
        match table.get(&key) {
            Some(existing) if *existing == id => Ok(()),
            Some(existing) => Err(IndexError::AlreadyExists { existing: *existing }),
            None => {
                table.insert(key, id);
                Ok(())
            }
        }
    }

    /// Remove a key. Returns the object it mapped to.
    pub fn erase(&self, ot: ObjectType, group: usize, key: &KeyTuple) -> IndexResult<ObjectId> {
        self.tables
            .write()
            .get_mut(&(ot, group))
            .and_then(|t| t.remove(key))
            .ok_or(IndexError::NotFound {
                object_type: ot,
                group,
            })
    }

    pub fn find(&self, ot: ObjectType, group: usize, key: &KeyTuple) -> IndexResult<ObjectId> {
        self.tables
            .read()
            .get(&(ot, group))
            .and_then(|t| t.get(key).copied())
            .ok_or(IndexError::NotFound {
                object_type: ot,
                group,
            })
    }

    /// Insert every `(group, key)` for one object, or none of them.
    ///
    /// On the first collision, entries added by this call are removed again
    /// and the colliding owner is returned.
    pub fn insert_all(&self, ot: ObjectType, keys: &[(usize, KeyTuple)], id: ObjectId) -> IndexResult<()> {
        let mut tables = self.tables.write();
        let mut added: Vec<&(usize, KeyTuple)> = Vec::with_capacity(keys.len());
        for entry in keys {
            let (group, key) = entry;
            let fresh = tables
                .get(&(ot, *group))
                .map_or(true, |t| !t.contains_key(key));
            if let Err(e) = Self::insert_locked(&mut tables, ot, *group, key.clone(), id) {
                for (g, k) in added {
                    if let Some(t) = tables.get_mut(&(ot, *g)) {
                        t.remove(k);
                    }
                }
                debug!(object_id = %id, group, "key insert rolled back");
                return Err(e);
            }
            if fresh {
                added.push(entry);
            }
        }
        Ok(())
    }

    /// Remove every `(group, key)` currently owned by `id`.
    ///
    /// Keys owned by another object, or absent, are left alone. Returns the
    /// number of entries removed.
    pub fn erase_all(&self, ot: ObjectType, keys: &[(usize, KeyTuple)], id: ObjectId) -> usize {
        let mut tables = self.tables.write();
        let mut removed = 0;
        for (group, key) in keys {
            if let Some(table) = tables.get_mut(&(ot, *group)) {
                if table.get(key) == Some(&id) {
                    table.remove(key);
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Number of keys across all tables.
    pub fn len(&self) -> usize {
        self.tables.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every key of one type, with its owner. Sorted by owner for stable output.
    pub fn entries_of(&self, ot: ObjectType) -> Vec<(usize, KeyTuple, ObjectId)> {
        let tables = self.tables.read();
        let mut out: Vec<_> = tables
            .iter()
            .filter(|((t, _), _)| *t == ot)
            .flat_map(|((_, g), table)| table.iter().map(move |(k, id)| (*g, k.clone(), *id)))
            .collect();
        out.sort_by_key(|(g, _, id)| (*id, *g));
        out
    }
}
