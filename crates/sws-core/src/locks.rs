//! Per-type mutation locks and per-object advisory locks.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, ReentrantMutex, ReentrantMutexGuard};
use sws_types::{ObjectId, ObjectType, SwitchError, SwitchResult};

/// One re-entrant lock per object type.
///
/// A thread already holding a type's lock may take it again, which lets
/// trigger callbacks create or delete objects of the type being mutated.
pub struct TypeLocks {
    locks: HashMap<ObjectType, ReentrantMutex<()>>,
}

impl TypeLocks {
    pub fn new(types: impl IntoIterator<Item = ObjectType>) -> Self {
        Self {
            locks: types
                .into_iter()
                .map(|ot| (ot, ReentrantMutex::new(())))
                .collect(),
        }
    }

    pub fn lock(&self, ot: ObjectType) -> SwitchResult<ReentrantMutexGuard<'_, ()>> {
        self.locks
            .get(&ot)
            .map(ReentrantMutex::lock)
            .ok_or_else(|| SwitchError::invalid(format!("unknown object type {ot}")))
    }
}

/// Advisory exclusive intent on individual objects.
///
/// Ownership is per thread and re-entrant: the owner may lock again and must
/// unlock as many times.
#[derive(Default)]
pub struct ObjectLocks {
    held: Mutex<HashMap<ObjectId, (ThreadId, u32)>>,
    released: Condvar,
}

impl ObjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the calling thread owns `id`.
    pub fn lock(&self, id: ObjectId) {
        let me = thread::current().id();
        let mut held = self.held.lock();
        loop {
            let owned_by_me = held.get(&id).map(|(owner, _)| *owner == me);
            match owned_by_me {
                None => {
                    held.insert(id, (me, 1));
                    return;
                }
                Some(true) => {
                    if let Some((_, depth)) = held.get_mut(&id) {
                        *depth += 1;
                    }
                    return;
                }
                Some(false) => self.released.wait(&mut held),
            }
        }
    }

    /// Take `id` only if no other thread owns it.
    pub fn try_lock(&self, id: ObjectId) -> bool {
        let me = thread::current().id();
        let mut held = self.held.lock();
        match held.get(&id).map(|(owner, _)| *owner == me) {
            None => {
                held.insert(id, (me, 1));
                true
            }
            Some(true) => {
                if let Some((_, depth)) = held.get_mut(&id) {
                    *depth += 1;
                }
                true
            }
            Some(false) => false,
        }
    }

    pub fn unlock(&self, id: ObjectId) -> SwitchResult<()> {
        let me = thread::current().id();
        let mut held = self.held.lock();
        let (owner, depth) = held
            .get_mut(&id)
            .ok_or_else(|| SwitchError::invalid(format!("object {id} is not locked")))?;
        if *owner != me {
            return Err(SwitchError::invalid(format!(
                "object {id} is locked by another thread"
            )));
        }
        *depth -= 1;
        if *depth == 0 {
            held.remove(&id);
            self.released.notify_all();
        }
        Ok(())
    }

    pub fn is_locked(&self, id: ObjectId) -> bool {
        self.held.lock().contains_key(&id)
    }

    /// Lock `id` for the lifetime of the returned guard.
    pub(crate) fn pin(&self, id: ObjectId) -> ObjectPin<'_> {
        self.lock(id);
        ObjectPin { locks: self, id }
    }
}

/// Releases an object lock on drop.
pub(crate) struct ObjectPin<'a> {
    locks: &'a ObjectLocks,
    id: ObjectId,
}

impl Drop for ObjectPin<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.locks.unlock(self.id) {
            tracing::error!(object_id = %self.id, error = %e, "object unlock failed");
        }
    }
}
