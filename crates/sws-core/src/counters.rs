//! Hardware counter access.
//!
//! The store holds no counter values. Reads and clears are forwarded to a
//! [`CounterProvider`] registered for the object's type.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sws_types::{AttrId, ObjectId, ObjectType, SwitchResult};

pub trait CounterProvider: Send + Sync {
    /// Current values of `counters` on `id`, in the order asked.
    fn get(&self, id: ObjectId, counters: &[AttrId]) -> SwitchResult<Vec<(AttrId, u64)>>;

    fn clear(&self, id: ObjectId, counters: &[AttrId]) -> SwitchResult<()>;

    fn clear_all(&self, id: ObjectId) -> SwitchResult<()>;
}

#[derive(Default)]
pub(crate) struct CounterRegistry {
    providers: RwLock<HashMap<ObjectType, Arc<dyn CounterProvider>>>,
}

impl CounterRegistry {
    pub(crate) fn register(&self, ot: ObjectType, provider: Arc<dyn CounterProvider>) {
        self.providers.write().insert(ot, provider);
    }

    pub(crate) fn provider(&self, ot: ObjectType) -> Option<Arc<dyn CounterProvider>> {
        self.providers.read().get(&ot).cloned()
    }
}
