//! Dense per-type id allocation.

use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;
use sws_types::{ObjectId, ObjectType, SwitchError, SwitchResult};
use tracing::debug;

/// Allocator for the dense ids of one object type.
///
/// Ids start at 1. The lowest free id is always handed out next, so an id
/// released by a delete is reused by the following create.
#[derive(Debug)]
pub struct IdAllocator {
    max: u64,
    used: BTreeSet<u64>,
    /// No id below this is free.
    lowest_free: u64,
}

impl IdAllocator {
    pub fn new(max: u64) -> Self {
        Self {
            max: max.min(ObjectId::MAX_DENSE),
            used: BTreeSet::new(),
            lowest_free: 1,
        }
    }

    /// Hand out the lowest free id.
    pub fn allocate(&mut self) -> SwitchResult<u64> {
        let mut candidate = self.lowest_free;
        while self.used.contains(&candidate) {
            candidate += 1;
        }
        if candidate > self.max {
            return Err(SwitchError::Failure(format!(
                "id space exhausted at {}",
                self.max
            )));
        }
        self.used.insert(candidate);
        self.lowest_free = candidate + 1;
        Ok(candidate)
    }

    /// Claim a specific id.
    pub fn reserve(&mut self, id: u64) -> SwitchResult<()> {
        if id == 0 || id > self.max {
            return Err(SwitchError::invalid(format!(
                "id {id} outside 1..={}",
                self.max
            )));
        }
        if !self.used.insert(id) {
            return Err(SwitchError::Failure(format!("id {id} already allocated")));
        }
        Ok(())
    }

    /// Return an id to the pool. Releasing a free id is a no-op.
    pub fn release(&mut self, id: u64) {
        if self.used.remove(&id) && id < self.lowest_free {
            self.lowest_free = id;
        }
    }

    pub fn is_allocated(&self, id: u64) -> bool {
        self.used.contains(&id)
    }

    pub fn allocated(&self) -> usize {
        self.used.len()
    }
}

/// One [`IdAllocator`] per object type, created on first use.
#[derive(Debug)]
pub struct Allocators {
    max_per_type: u64,
    per_type: Mutex<HashMap<ObjectType, IdAllocator>>,
}

impl Allocators {
    pub fn new(max_per_type: u64) -> Self {
        Self {
            max_per_type,
            per_type: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh handle for `ot`.
    pub fn allocate(&self, ot: ObjectType) -> SwitchResult<ObjectId> {
        let mut map = self.per_type.lock();
        let dense = map
            .entry(ot)
            .or_insert_with(|| IdAllocator::new(self.max_per_type))
            .allocate()?;
        debug!(object_type = ot.raw(), dense, "id allocated");
        ObjectId::new(ot, dense)
    }

    /// Reserve the exact handle `id`.
    ///
    /// Fails with `ItemAlreadyExists` if the handle is taken.
    pub fn reserve(&self, id: ObjectId) -> SwitchResult<()> {
        let mut map = self.per_type.lock();
        let alloc = map
            .entry(id.object_type())
            .or_insert_with(|| IdAllocator::new(self.max_per_type));
        if alloc.is_allocated(id.dense_id()) {
            return Err(SwitchError::ItemAlreadyExists { existing: id });
        }
        alloc.reserve(id.dense_id())
    }

    pub fn release(&self, id: ObjectId) {
        if let Some(alloc) = self.per_type.lock().get_mut(&id.object_type()) {
            alloc.release(id.dense_id());
        }
    }

    pub fn is_allocated(&self, id: ObjectId) -> bool {
        self.per_type
            .lock()
            .get(&id.object_type())
            .is_some_and(|a| a.is_allocated(id.dense_id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_dense_ids_from_one() {
        let mut a = IdAllocator::new(100);
        assert_eq!(a.allocate().unwrap(), 1);
        assert_eq!(a.allocate().unwrap(), 2);
        assert_eq!(a.allocate().unwrap(), 3);
        assert_eq!(a.allocated(), 3);
    }

    #[test]
    fn released_id_is_reused_first() {
        let mut a = IdAllocator::new(100);
        for _ in 0..4 {
            a.allocate().unwrap();
        }
        a.release(2);
        assert!(!a.is_allocated(2));
        assert_eq!(a.allocate().unwrap(), 2);
        assert_eq!(a.allocate().unwrap(), 5);
    }

    #[test]
    fn allocate_skips_reserved_ids() {
        let mut a = IdAllocator::new(100);
        a.reserve(1).unwrap();
        a.reserve(2).unwrap();
        assert_eq!(a.allocate().unwrap(), 3);
    }

    #[test]
    fn reserve_rejects_taken_and_out_of_range() {
        let mut a = IdAllocator::new(10);
        a.reserve(5).unwrap();
        assert!(a.reserve(5).is_err());
        assert!(a.reserve(0).is_err());
        assert!(a.reserve(11).is_err());
    }

    #[test]
    fn exhaustion_is_a_failure() {
        let mut a = IdAllocator::new(2);
        a.allocate().unwrap();
        a.allocate().unwrap();
        assert!(matches!(a.allocate(), Err(SwitchError::Failure(_))));
    }

    #[test]
    fn allocators_are_independent_per_type() {
        let allocs = Allocators::new(1000);
        let a = allocs.allocate(ObjectType(1)).unwrap();
        let b = allocs.allocate(ObjectType(2)).unwrap();
        assert_eq!(a.dense_id(), 1);
        assert_eq!(b.dense_id(), 1);
        assert_ne!(a, b);
        assert!(allocs.is_allocated(a));
        allocs.release(a);
        assert!(!allocs.is_allocated(a));
    }

    #[test]
    fn duplicate_reservation_reports_existing_handle() {
        let allocs = Allocators::new(1000);
        let id = ObjectId::new(ObjectType(3), 7).unwrap();
        allocs.reserve(id).unwrap();
        assert_eq!(
            allocs.reserve(id),
            Err(SwitchError::ItemAlreadyExists { existing: id })
        );
    }
}
