//! The store facade: construction, reads, lookups, and registration.
//!
//! Mutations live in [`crate::lifecycle`]; AUTO-object re-evaluation in
//! [`crate::reevaluate`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use sws_events::{Event, EventCallback, EventKind, EventNotifier, ObjectOp};
use sws_index::{IndexError, KeyTuple, SecondaryIndex};
use sws_record::{codec, encode_attrs, Op, RecordLine, Recorder};
use sws_refs::{RefEdge, ReferenceGraph};
use sws_schema::{AttributeMetadata, ModelInfo, ObjectClass, ObjectInfo};
use sws_store::{Allocators, AttributeStore};
use sws_types::{
    AttrId, Attribute, AttributeValue, ObjectId, ObjectType, SwitchError, SwitchResult,
};
use tracing::{debug, error};

use crate::config::StoreConfig;
use crate::context::CallContext;
use crate::counters::{CounterProvider, CounterRegistry};
use crate::locks::{ObjectLocks, ObjectPin, TypeLocks};
use crate::triggers::{TriggerArgs, TriggerPhase, TriggerRegistry};

/// In-memory, schema-driven object store.
///
/// Every operation is synchronous and may be called from any thread. A
/// re-entrant lock per object type makes each create, delete, and set
/// atomic with respect to other callers on that type, while still letting
/// trigger callbacks on the same thread call back in.
pub struct SwitchStore {
    pub(crate) model: Arc<ModelInfo>,
    pub(crate) config: StoreConfig,
    pub(crate) attrs: AttributeStore,
    pub(crate) allocators: Allocators,
    pub(crate) index: SecondaryIndex,
    pub(crate) refs: ReferenceGraph,
    pub(crate) triggers: TriggerRegistry,
    pub(crate) type_locks: TypeLocks,
    pub(crate) object_locks: ObjectLocks,
    /// Serializes iteration, key lookup, counters, and dump/restore.
    pub(crate) store_lock: ReentrantMutex<()>,
    counters: CounterRegistry,
    notifier: EventNotifier,
    recorder: Option<Recorder>,
}

impl SwitchStore {
    /// Build a store over `model`, opening the record log if configured.
    pub fn new(model: Arc<ModelInfo>, config: StoreConfig) -> SwitchResult<Self> {
        let recorder = match &config.record.path {
            Some(path) => Some(Recorder::open(path, config.record.sync_mode)?),
            None => None,
        };
        let type_locks = TypeLocks::new(model.object_types());
        debug!(
            object_types = model.object_types().count(),
            recording = recorder.is_some(),
            "switch store initialized"
        );
        Ok(Self {
            allocators: Allocators::new(config.max_objects_per_type),
            model,
            config,
            attrs: AttributeStore::new(),
            index: SecondaryIndex::new(),
            refs: ReferenceGraph::new(),
            triggers: TriggerRegistry::new(),
            type_locks,
            object_locks: ObjectLocks::new(),
            store_lock: ReentrantMutex::new(()),
            counters: CounterRegistry::default(),
            notifier: EventNotifier::new(),
            recorder,
        })
    }

    /// A store with default settings and no record log.
    pub fn with_model(model: Arc<ModelInfo>) -> Self {
        let config = StoreConfig::default();
        Self {
            allocators: Allocators::new(config.max_objects_per_type),
            type_locks: TypeLocks::new(model.object_types()),
            model,
            config,
            attrs: AttributeStore::new(),
            index: SecondaryIndex::new(),
            refs: ReferenceGraph::new(),
            triggers: TriggerRegistry::new(),
            object_locks: ObjectLocks::new(),
            store_lock: ReentrantMutex::new(()),
            counters: CounterRegistry::default(),
            notifier: EventNotifier::new(),
            recorder: None,
        }
    }

    /// The schema this store validates against.
    pub fn model(&self) -> &ModelInfo {
        &self.model
    }

    /// Settings the store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The open record log, if recording is enabled.
    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_ref()
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// `true` if `id` names a live object.
    pub fn exists(&self, id: ObjectId) -> bool {
        !id.is_null() && self.attrs.is_live(id)
    }

    /// Current value of one attribute.
    pub fn get(&self, id: ObjectId, attr: AttrId) -> SwitchResult<Attribute> {
        self.get_with(&CallContext::new(), id, attr)
    }

    /// [`get`](Self::get) on behalf of a trigger.
    pub fn get_with(&self, ctx: &CallContext, id: ObjectId, attr: AttrId) -> SwitchResult<Attribute> {
        self.ensure_live(id)?;
        let meta = self.model.attr_of(id.object_type(), attr)?;
        let value = self.attrs.get(id, meta.id)?;
        let attr = Attribute { id: meta.id, value };
        if self.config.record.record_gets {
            self.record(
                ctx.in_trigger(),
                self.record_line(Op::Get, id)
                    .with_extra(u64::from(attr.id))
                    .with_fields(encode_attrs(std::slice::from_ref(&attr))),
            );
        }
        Ok(attr)
    }

    /// Every attribute of `id`, ordered by attribute id.
    pub fn get_all(&self, id: ObjectId) -> SwitchResult<Vec<Attribute>> {
        self.ensure_live(id)?;
        Ok(self.attrs.get_all(id)?)
    }

    /// Object owning the key formed by `key`, which must name exactly the
    /// attributes of one key group of `ot`, in any order.
    pub fn find_by_key(&self, ot: ObjectType, key: &[Attribute]) -> SwitchResult<ObjectId> {
        let _store = self.store_lock.lock();
        let info = self.model.object(ot)?;
        let ids: Vec<AttrId> = key.iter().map(|a| a.id).collect();
        let group = self.model.match_key_group(ot, &ids)?;
        for a in key {
            let meta = self.model.attr_of(ot, a.id)?;
            self.model.validate_value(meta, &a.value)?;
        }
        let tuple = KeyTuple::from_attrs(&info.key_groups[group], key)
            .ok_or(SwitchError::InvalidKeyGroup(ot))?;
        let id = self.index.find(ot, group, &tuple).map_err(|e| match e {
            IndexError::NotFound { .. } => {
                SwitchError::not_found(format!("no {} with that key", info.name))
            }
            other => other.into(),
        })?;
        if !self.attrs.is_live(id) {
            return Err(SwitchError::not_found(format!("object {id} is not live")));
        }
        Ok(id)
    }

    // ---------------------------------------------------------------
    // Iteration
    // ---------------------------------------------------------------

    /// Lowest live handle of `ot`.
    pub fn get_first(&self, ot: ObjectType) -> SwitchResult<ObjectId> {
        let _store = self.store_lock.lock();
        self.model.object(ot)?;
        self.attrs
            .live_after(ot, 0, 1)
            .first()
            .copied()
            .ok_or_else(|| SwitchError::not_found(format!("no {} objects", self.model.object_name(ot))))
    }

    /// Up to `n` live handles of the same type as `after`, with higher dense
    /// ids. `after` itself need not exist any more.
    pub fn get_next_n(&self, after: ObjectId, n: usize) -> SwitchResult<Vec<ObjectId>> {
        let _store = self.store_lock.lock();
        if after.is_null() {
            return Err(SwitchError::invalid("null handle"));
        }
        self.model.object(after.object_type())?;
        Ok(self.attrs.live_after(after.object_type(), after.dense_id(), n))
    }

    /// Every live handle of `ot`, in ascending dense-id order.
    pub fn get_all_handles(&self, ot: ObjectType) -> SwitchResult<Vec<ObjectId>> {
        let _store = self.store_lock.lock();
        self.model.object(ot)?;
        Ok(self.attrs.ids_of_type(ot))
    }

    /// Number of live objects across all types.
    pub fn object_count(&self) -> usize {
        self.attrs.all_live().len()
    }

    // ---------------------------------------------------------------
    // References
    // ---------------------------------------------------------------

    /// Every `(referencing object, attribute)` edge into `id`.
    pub fn referrers(&self, id: ObjectId) -> Vec<RefEdge> {
        self.refs.referrers(id)
    }

    /// Distinct USER-class objects referencing `id`.
    pub fn user_referrer_count(&self, id: ObjectId) -> usize {
        self.user_referrers(id, ObjectId::NULL).len()
    }

    pub(crate) fn user_referrers(&self, id: ObjectId, excluding: ObjectId) -> BTreeSet<ObjectId> {
        self.refs
            .referrers(id)
            .into_iter()
            .map(|edge| edge.referencing)
            .filter(|r| *r != excluding && self.class_of(r.object_type()) == ObjectClass::User)
            .collect()
    }

    pub(crate) fn class_of(&self, ot: ObjectType) -> ObjectClass {
        self.model
            .object(ot)
            .map_or(ObjectClass::User, |info| info.class)
    }

    // ---------------------------------------------------------------
    // Triggers
    // ---------------------------------------------------------------

    /// Append `f` to the callbacks of `ot` for `phase`.
    pub fn register_trigger<F>(&self, ot: ObjectType, phase: TriggerPhase, f: F) -> SwitchResult<()>
    where
        F: Fn(&SwitchStore, &mut CallContext, &TriggerArgs) -> SwitchResult<()> + Send + Sync + 'static,
    {
        self.model.object(ot)?;
        self.triggers.register(ot, phase, Arc::new(f));
        Ok(())
    }

    /// Run `f` before each create of `ot`; an error rejects the create.
    pub fn on_create_before<F>(&self, ot: ObjectType, f: F) -> SwitchResult<()>
    where
        F: Fn(&SwitchStore, &mut CallContext, &TriggerArgs) -> SwitchResult<()> + Send + Sync + 'static,
    {
        self.register_trigger(ot, TriggerPhase::BeforeCreate, f)
    }

    /// Run `f` once each create of `ot` has taken effect.
    pub fn on_create_after<F>(&self, ot: ObjectType, f: F) -> SwitchResult<()>
    where
        F: Fn(&SwitchStore, &mut CallContext, &TriggerArgs) -> SwitchResult<()> + Send + Sync + 'static,
    {
        self.register_trigger(ot, TriggerPhase::AfterCreate, f)
    }

    /// Run `f` before each delete of `ot`; an error rejects the delete.
    pub fn on_delete_before<F>(&self, ot: ObjectType, f: F) -> SwitchResult<()>
    where
        F: Fn(&SwitchStore, &mut CallContext, &TriggerArgs) -> SwitchResult<()> + Send + Sync + 'static,
    {
        self.register_trigger(ot, TriggerPhase::BeforeDelete, f)
    }

    /// Run `f` once each delete of `ot` has taken effect.
    pub fn on_delete_after<F>(&self, ot: ObjectType, f: F) -> SwitchResult<()>
    where
        F: Fn(&SwitchStore, &mut CallContext, &TriggerArgs) -> SwitchResult<()> + Send + Sync + 'static,
    {
        self.register_trigger(ot, TriggerPhase::AfterDelete, f)
    }

    /// Run `f` before each set on `ot`; an error rejects the set.
    pub fn on_update_before<F>(&self, ot: ObjectType, f: F) -> SwitchResult<()>
    where
        F: Fn(&SwitchStore, &mut CallContext, &TriggerArgs) -> SwitchResult<()> + Send + Sync + 'static,
    {
        self.register_trigger(ot, TriggerPhase::BeforeUpdate, f)
    }

    /// Run `f` after each set on `ot`; an error rolls the set back.
    pub fn on_update_after<F>(&self, ot: ObjectType, f: F) -> SwitchResult<()>
    where
        F: Fn(&SwitchStore, &mut CallContext, &TriggerArgs) -> SwitchResult<()> + Send + Sync + 'static,
    {
        self.register_trigger(ot, TriggerPhase::AfterUpdate, f)
    }

    // ---------------------------------------------------------------
    // Counters
    // ---------------------------------------------------------------

    /// Serve counter reads and clears for `ot` from `provider`.
    pub fn register_counter_provider(
        &self,
        ot: ObjectType,
        provider: Arc<dyn CounterProvider>,
    ) -> SwitchResult<()> {
        self.model.object(ot)?;
        self.counters.register(ot, provider);
        Ok(())
    }

    fn counter_provider(&self, id: ObjectId, counters: &[AttrId]) -> SwitchResult<Arc<dyn CounterProvider>> {
        self.ensure_live(id)?;
        let ot = id.object_type();
        for c in counters {
            let meta = self.model.attr_of(ot, *c)?;
            if !meta.flags.is_counter {
                return Err(SwitchError::invalid(format!("{} is not a counter", meta.name)));
            }
        }
        self.counters.provider(ot).ok_or_else(|| {
            SwitchError::NotSupported(format!("counters of {}", self.model.object_name(ot)))
        })
    }

    /// Read the given counters of `id` from its provider.
    pub fn counters_get(&self, id: ObjectId, counters: &[AttrId]) -> SwitchResult<Vec<(AttrId, u64)>> {
        let _store = self.store_lock.lock();
        self.counter_provider(id, counters)?.get(id, counters)
    }

    /// Reset the given counters of `id`.
    pub fn counters_clear(&self, id: ObjectId, counters: &[AttrId]) -> SwitchResult<()> {
        let _store = self.store_lock.lock();
        self.counter_provider(id, counters)?.clear(id, counters)
    }

    /// Reset every counter of `id`.
    pub fn counters_clear_all(&self, id: ObjectId) -> SwitchResult<()> {
        let _store = self.store_lock.lock();
        self.counter_provider(id, &[])?.clear_all(id)
    }

    // ---------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------

    /// Install the callback for `kind`, replacing any previous one.
    pub fn register_event_callback(&self, kind: EventKind, callback: EventCallback) {
        self.notifier.register(kind, callback);
    }

    /// Record `event` as an `n` line and dispatch it. Returns `true` if a
    /// callback received it.
    pub fn notify(&self, event: &Event) -> bool {
        let subject = event.subject();
        let type_name = if subject.is_null() {
            "none"
        } else {
            self.model.object_name(subject.object_type())
        };
        let fields = event
            .fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), codec::escape(&v)))
            .collect();
        self.record(
            false,
            RecordLine::new(Op::Notify, type_name, subject.dense_id())
                .with_extra(event.kind().code())
                .with_fields(fields),
        );
        self.notifier.notify(event)
    }

    pub(crate) fn emit_object_event(&self, id: ObjectId, op: ObjectOp) {
        if self.config.emit_object_events {
            self.notifier.notify(&Event::Object { id, op });
        }
    }

    // ---------------------------------------------------------------
    // Object locks
    // ---------------------------------------------------------------

    /// Block until the calling thread holds the advisory lock on `id`.
    /// While it is held, other threads can neither delete `id` nor add
    /// references to it.
    pub fn object_lock(&self, id: ObjectId) -> SwitchResult<()> {
        if id.is_null() {
            return Err(SwitchError::invalid("null handle"));
        }
        self.object_locks.lock(id);
        Ok(())
    }

    /// Take the advisory lock on `id` if no other thread holds it.
    pub fn object_try_lock(&self, id: ObjectId) -> SwitchResult<bool> {
        if id.is_null() {
            return Err(SwitchError::invalid("null handle"));
        }
        Ok(self.object_locks.try_lock(id))
    }

    /// Release one hold of the advisory lock on `id`.
    pub fn object_unlock(&self, id: ObjectId) -> SwitchResult<()> {
        self.object_locks.unlock(id)
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    pub(crate) fn ensure_live(&self, id: ObjectId) -> SwitchResult<&ObjectInfo> {
        if id.is_null() {
            return Err(SwitchError::invalid("null handle"));
        }
        let info = self.model.object(id.object_type())?;
        if !self.attrs.is_live(id) {
            return Err(SwitchError::not_found(format!("object {id}")));
        }
        Ok(info)
    }

    /// The key of every group `attrs` is eligible for.
    pub(crate) fn keys_for(&self, info: &ObjectInfo, attrs: &[Attribute]) -> Vec<(usize, KeyTuple)> {
        info.key_groups
            .iter()
            .enumerate()
            .filter_map(|(i, g)| KeyTuple::from_attrs(g, attrs).map(|k| (i, k)))
            .collect()
    }

    /// Pin the objects `attrs` refer to through tracked attributes of `ot`,
    /// in handle order. A target cannot be deleted, and a target still being
    /// created cannot be referred to, while its pin is held elsewhere.
    pub(crate) fn pin_targets(&self, ot: ObjectType, attrs: &[Attribute]) -> Vec<ObjectPin<'_>> {
        let targets: BTreeSet<ObjectId> = attrs
            .iter()
            .filter(|a| {
                self.model
                    .attr_of(ot, a.id)
                    .is_ok_and(AttributeMetadata::is_tracked_reference)
            })
            .flat_map(|a| a.value.referenced_ids())
            .collect();
        targets
            .into_iter()
            .map(|id| self.object_locks.pin(id))
            .collect()
    }

    /// Reject references to objects that do not exist.
    pub(crate) fn check_targets(&self, meta: &AttributeMetadata, value: &AttributeValue) -> SwitchResult<()> {
        match value.referenced_ids().into_iter().find(|r| !self.attrs.is_live(*r)) {
            Some(missing) => Err(SwitchError::invalid(format!(
                "{} references missing object {missing}",
                meta.name
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn add_edges(&self, id: ObjectId, meta: &AttributeMetadata, value: &AttributeValue) {
        for referred in value.referenced_ids() {
            if let Err(e) = self.refs.add(referred, id.object_type(), id, meta.id) {
                error!(object_id = %id, attr = meta.id, error = %e, "edge insert failed");
            }
        }
    }

    pub(crate) fn remove_edges(&self, id: ObjectId, meta: &AttributeMetadata, value: &AttributeValue) {
        for referred in value.referenced_ids() {
            if let Err(e) = self.refs.remove(referred, id.object_type(), id, Some(meta.id)) {
                error!(object_id = %id, attr = meta.id, error = %e, "edge removal failed");
            }
        }
    }

    pub(crate) fn record_line(&self, op: Op, id: ObjectId) -> RecordLine {
        RecordLine::new(op, self.model.object_name(id.object_type()), id.dense_id())
    }

    /// Append to the record log, if one is open. A write failure is logged;
    /// the operation it describes has already taken effect.
    pub(crate) fn record(&self, commented: bool, line: RecordLine) {
        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.append(&line.commented(commented)) {
                error!(error = %e, path = %recorder.path().display(), "record append failed");
            }
        }
    }
}

impl fmt::Debug for SwitchStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchStore")
            .field("objects", &self.attrs.len())
            .field("keys", &self.index.len())
            .field("triggers", &self.triggers)
            .field("recorder", &self.recorder)
            .finish()
    }
}
