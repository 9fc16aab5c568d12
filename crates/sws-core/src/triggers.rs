//! Trigger registration and invocation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use sws_types::{Attribute, ObjectId, ObjectType, SwitchResult};
use tracing::trace;

use crate::context::CallContext;
use crate::store::SwitchStore;

/// Point in an object's lifecycle at which callbacks run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriggerPhase {
    BeforeCreate,
    AfterCreate,
    BeforeDelete,
    AfterDelete,
    BeforeUpdate,
    AfterUpdate,
}

impl fmt::Display for TriggerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BeforeCreate => "before-create",
            Self::AfterCreate => "after-create",
            Self::BeforeDelete => "before-delete",
            Self::AfterDelete => "after-delete",
            Self::BeforeUpdate => "before-update",
            Self::AfterUpdate => "after-update",
        };
        f.write_str(s)
    }
}

/// What a callback is told about the object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerArgs {
    pub object_id: ObjectId,
    /// Attribute snapshot. For updates this is the state before the write
    /// in before-update, and after it in after-update.
    pub attrs: Vec<Attribute>,
    /// The attribute being written, for update phases.
    pub changed: Option<Attribute>,
}

impl TriggerArgs {
    pub fn new(object_id: ObjectId, attrs: Vec<Attribute>) -> Self {
        Self {
            object_id,
            attrs,
            changed: None,
        }
    }

    pub fn attr(&self, id: sws_types::AttrId) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.id == id)
    }
}

/// A trigger callback. Returning an error aborts the enclosing operation.
pub type TriggerFn =
    Arc<dyn Fn(&SwitchStore, &mut CallContext, &TriggerArgs) -> SwitchResult<()> + Send + Sync>;

/// Ordered callback lists per `(object type, phase)`.
#[derive(Default)]
pub struct TriggerRegistry {
    lists: RwLock<HashMap<(ObjectType, TriggerPhase), Vec<TriggerFn>>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback; callbacks run in registration order.
    pub fn register(&self, ot: ObjectType, phase: TriggerPhase, f: TriggerFn) {
        self.lists.write().entry((ot, phase)).or_default().push(f);
    }

    pub fn count(&self, ot: ObjectType, phase: TriggerPhase) -> usize {
        self.lists.read().get(&(ot, phase)).map_or(0, Vec::len)
    }

    /// Run every callback for `(ot, phase)` one level deeper in `ctx`,
    /// stopping at the first error.
    ///
    /// The list is copied out first so callbacks may register triggers or
    /// recurse into the store without holding the registry lock.
    pub fn run(
        &self,
        store: &SwitchStore,
        ctx: &mut CallContext,
        ot: ObjectType,
        phase: TriggerPhase,
        args: &TriggerArgs,
    ) -> SwitchResult<()> {
        let callbacks = match self.lists.read().get(&(ot, phase)) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return Ok(()),
        };
        trace!(object_id = %args.object_id, %phase, count = callbacks.len(), "running triggers");
        ctx.enter_trigger()?;
        let result = callbacks.iter().try_for_each(|f| f(store, &mut *ctx, args));
        ctx.leave_trigger();
        result
    }
}

impl fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total: usize = self.lists.read().values().map(Vec::len).sum();
        f.debug_struct("TriggerRegistry")
            .field("callbacks", &total)
            .finish()
    }
}
