//! Create, delete, and set.
//!
//! Each mutation validates against the schema, takes the type lock, runs its
//! before-trigger, applies the change to the attribute store, index, and
//! reference graph, runs its after-trigger, and finally records and
//! announces the change. A failure at any step undoes the steps before it.

use std::collections::BTreeSet;

use sws_events::ObjectOp;
use sws_record::{encode_attrs, Op};
use sws_schema::{AttributeMetadata, ObjectInfo};
use sws_store::ObjectStatus;
use sws_types::{Attribute, AttributeValue, ObjectId, ObjectType, SwitchError, SwitchResult};
use tracing::{debug, error, trace, warn};

use crate::context::CallContext;
use crate::reevaluate::{Driver, Stage};
use crate::store::SwitchStore;
use crate::triggers::{TriggerArgs, TriggerPhase};

/// Where a new object's id comes from.
#[derive(Clone, Copy, Debug)]
enum IdRequest {
    Allocate,
    Exact(ObjectId),
}

impl SwitchStore {
    // ---------------------------------------------------------------
    // Create
    // ---------------------------------------------------------------

    /// Create an object of type `ot`, allocating the lowest free id.
    pub fn create(&self, ot: ObjectType, attrs: &[Attribute]) -> SwitchResult<ObjectId> {
        self.create_with(&mut CallContext::new(), ot, attrs)
    }

    /// [`create`](Self::create) on behalf of a trigger.
    pub fn create_with(
        &self,
        ctx: &mut CallContext,
        ot: ObjectType,
        attrs: &[Attribute],
    ) -> SwitchResult<ObjectId> {
        self.create_object(ctx, ot, attrs, IdRequest::Allocate)
    }

    /// Create an object with a caller-chosen dense id.
    pub fn create_by_id(&self, ot: ObjectType, attrs: &[Attribute], dense: u64) -> SwitchResult<ObjectId> {
        self.create_by_id_with(&mut CallContext::new(), ot, attrs, dense)
    }

    /// [`create_by_id`](Self::create_by_id) on behalf of a trigger.
    pub fn create_by_id_with(
        &self,
        ctx: &mut CallContext,
        ot: ObjectType,
        attrs: &[Attribute],
        dense: u64,
    ) -> SwitchResult<ObjectId> {
        let id = ObjectId::new(ot, dense)?;
        self.create_object(ctx, ot, attrs, IdRequest::Exact(id))
    }

    /// Create an object under a full handle, whose type must be `ot`.
    pub fn create_by_handle(&self, ot: ObjectType, attrs: &[Attribute], id: ObjectId) -> SwitchResult<ObjectId> {
        if id.is_null() || id.object_type() != ot {
            return Err(SwitchError::invalid(format!(
                "handle {id} is not a {}",
                self.model.object_name(ot)
            )));
        }
        self.create_object(&mut CallContext::new(), ot, attrs, IdRequest::Exact(id))
    }

    fn create_object(
        &self,
        ctx: &mut CallContext,
        ot: ObjectType,
        attrs: &[Attribute],
        request: IdRequest,
    ) -> SwitchResult<ObjectId> {
        let info = self.model.object(ot)?;
        if info.is_auto() && !ctx.in_trigger() {
            return Err(SwitchError::invalid(format!(
                "{} objects are created by the store",
                info.name
            )));
        }
        let _targets = self.pin_targets(ot, attrs);
        let merged = self.validate_create(ctx, info, attrs)?;

        let _type_guard = self.type_locks.lock(ot)?;
        let id = match request {
            IdRequest::Allocate => self.allocators.allocate(ot)?,
            IdRequest::Exact(id) => {
                self.allocators.reserve(id)?;
                id
            }
        };
        // Held until the create line is logged; referrers pin it first.
        let _pin = self.object_locks.pin(id);

        let args = TriggerArgs::new(id, merged.clone());
        if let Err(e) = self.triggers.run(self, ctx, ot, TriggerPhase::BeforeCreate, &args) {
            self.allocators.release(id);
            return Err(e);
        }

        if let Err(e) = self.materialize(id, &merged) {
            self.allocators.release(id);
            return Err(e);
        }
        let keys = self.keys_for(info, &merged);
        if let Err(e) = self.index.insert_all(ot, &keys, id) {
            self.dematerialize(id, &merged);
            self.allocators.release(id);
            return Err(e.into());
        }
        if let Err(e) = self.attrs.set_status(id, ObjectStatus::Live) {
            self.index.erase_all(ot, &keys, id);
            self.dematerialize(id, &merged);
            self.allocators.release(id);
            return Err(e.into());
        }

        if let Err(e) = self.finish_create(ctx, id, info, &args) {
            self.undo_create(ctx, id, info, &args);
            return Err(e);
        }

        if !info.is_auto() {
            self.record(
                ctx.in_trigger(),
                self.record_line(Op::Create, id).with_fields(encode_attrs(attrs)),
            );
        }
        self.emit_object_event(id, ObjectOp::Create);
        debug!(object_id = %id, object_type = %info.name, "object created");
        Ok(id)
    }

    /// Schema checks for create, returning the caller's attributes merged
    /// with defaults in declaration order.
    fn validate_create(
        &self,
        ctx: &CallContext,
        info: &ObjectInfo,
        attrs: &[Attribute],
    ) -> SwitchResult<Vec<Attribute>> {
        let mut seen = BTreeSet::new();
        for a in attrs {
            let meta = self.model.attr_of(info.object_type, a.id)?;
            if !seen.insert(a.id) {
                return Err(SwitchError::invalid(format!("{} given twice", meta.name)));
            }
            if meta.flags.read_only && !ctx.in_trigger() {
                return Err(SwitchError::invalid(format!("{} is read-only", meta.name)));
            }
            self.model.validate_value(meta, &a.value)?;
            if meta.is_tracked_reference() {
                self.check_targets(meta, &a.value)?;
            }
        }

        let mut merged = Vec::with_capacity(info.attrs.len());
        for attr_id in &info.attrs {
            let meta = self.model.attr(*attr_id)?;
            match attrs.iter().find(|a| a.id == *attr_id) {
                Some(a) => merged.push(a.clone()),
                None if meta.flags.mandatory => {
                    return Err(SwitchError::invalid(format!(
                        "mandatory attribute {} missing",
                        meta.name
                    )));
                }
                None => merged.push(Attribute {
                    id: *attr_id,
                    value: meta.default.clone(),
                }),
            }
        }
        Ok(merged)
    }

    /// Write a pending object's attributes and outgoing edges.
    fn materialize(&self, id: ObjectId, attrs: &[Attribute]) -> SwitchResult<()> {
        self.attrs.create(id)?;
        if let Err(e) = attrs.iter().try_for_each(|a| self.attrs.set(id, a.id, &a.value)) {
            if let Err(cleanup) = self.attrs.delete(id) {
                error!(object_id = %id, error = %cleanup, "pending object cleanup failed");
            }
            return Err(e.into());
        }
        for a in attrs {
            let meta = self.model.attr(a.id)?;
            if meta.is_tracked_reference() {
                self.add_edges(id, meta, &a.value);
            }
        }
        Ok(())
    }

    fn dematerialize(&self, id: ObjectId, attrs: &[Attribute]) {
        for a in attrs {
            if let Ok(meta) = self.model.attr(a.id) {
                if meta.is_tracked_reference() {
                    self.remove_edges(id, meta, &a.value);
                }
            }
        }
        if let Err(e) = self.attrs.delete(id) {
            error!(object_id = %id, error = %e, "attribute cleanup failed");
        }
    }

    fn finish_create(
        &self,
        ctx: &mut CallContext,
        id: ObjectId,
        info: &ObjectInfo,
        args: &TriggerArgs,
    ) -> SwitchResult<()> {
        self.triggers
            .run(self, ctx, info.object_type, TriggerPhase::AfterCreate, args)?;
        for referred in self.reevaluated_refs(&args.attrs) {
            self.reevaluate(ctx, Driver::Object(id), referred, Stage::Post)?;
        }
        self.attach_memberships(id, info, &args.attrs)
    }

    /// Best-effort reversal of a create whose after-phase failed. The
    /// object's delete triggers run so they can undo what its create
    /// triggers did.
    fn undo_create(&self, ctx: &mut CallContext, id: ObjectId, info: &ObjectInfo, args: &TriggerArgs) {
        warn!(object_id = %id, "rolling back create");
        self.detach_memberships(id, info, &args.attrs);
        for referred in self.reevaluated_refs(&args.attrs) {
            if let Err(e) = self.reevaluate(ctx, Driver::Object(id), referred, Stage::Pre) {
                error!(object_id = %id, %referred, error = %e, "rollback re-evaluation failed");
            }
        }
        for phase in [TriggerPhase::BeforeDelete, TriggerPhase::AfterDelete] {
            if let Err(e) = self.triggers.run(self, ctx, info.object_type, phase, args) {
                error!(object_id = %id, %phase, error = %e, "rollback trigger failed");
            }
        }
        let keys = self.keys_for(info, &args.attrs);
        self.index.erase_all(info.object_type, &keys, id);
        self.dematerialize(id, &args.attrs);
        self.allocators.release(id);
    }

    // ---------------------------------------------------------------
    // Membership
    // ---------------------------------------------------------------

    /// Append `id` to the member list of every group it names.
    pub(crate) fn attach_memberships(&self, id: ObjectId, info: &ObjectInfo, attrs: &[Attribute]) -> SwitchResult<()> {
        for m in &info.memberships {
            let Some(group) = member_group(attrs, m.member_attr) else {
                continue;
            };
            if !self.attrs.is_live(group) {
                warn!(object_id = %id, %group, "group object missing, membership skipped");
                continue;
            }
            self.attrs
                .list_push(group, m.group_list_attr, AttributeValue::ObjectId(id))?;
            trace!(object_id = %id, %group, "membership attached");
        }
        Ok(())
    }

    pub(crate) fn detach_memberships(&self, id: ObjectId, info: &ObjectInfo, attrs: &[Attribute]) {
        for m in &info.memberships {
            let Some(group) = member_group(attrs, m.member_attr) else {
                continue;
            };
            match self
                .attrs
                .list_remove(group, m.group_list_attr, &AttributeValue::ObjectId(id))
            {
                Ok(_) => trace!(object_id = %id, %group, "membership detached"),
                Err(e) => error!(object_id = %id, %group, error = %e, "membership detach failed"),
            }
        }
    }

    // ---------------------------------------------------------------
    // Delete
    // ---------------------------------------------------------------

    /// Delete a USER object. Fails with `ResourceInUse` while another USER
    /// object refers to it.
    pub fn delete(&self, id: ObjectId) -> SwitchResult<()> {
        self.delete_with(&mut CallContext::new(), id)
    }

    /// Delete the object of type `ot` with dense id `dense`.
    pub fn delete_by_id(&self, ot: ObjectType, dense: u64) -> SwitchResult<()> {
        self.delete(ObjectId::new(ot, dense)?)
    }

    /// [`delete`](Self::delete) on behalf of a trigger.
    pub fn delete_with(&self, ctx: &mut CallContext, id: ObjectId) -> SwitchResult<()> {
        if id.is_null() {
            return Err(SwitchError::invalid("null handle"));
        }
        let ot = id.object_type();
        let info = self.model.object(ot)?;
        if info.is_auto() && !ctx.in_trigger() {
            return Err(SwitchError::invalid(format!(
                "{} objects are deleted by the store",
                info.name
            )));
        }

        let _type_guard = self.type_locks.lock(ot)?;
        let _pin = self.object_locks.pin(id);
        if !self.attrs.is_live(id) {
            return Err(SwitchError::not_found(format!("object {id}")));
        }
        let snapshot = self.attrs.get_all(id)?;

        let reevaluated = self.reevaluated_refs(&snapshot);
        for (done, referred) in reevaluated.iter().enumerate() {
            if let Err(e) = self.reevaluate(ctx, Driver::Object(id), *referred, Stage::Pre) {
                self.replay_post(ctx, id, &reevaluated[..done]);
                return Err(e);
            }
        }

        if let Some(referrer) = self.user_referrers(id, id).into_iter().next() {
            self.replay_post(ctx, id, &reevaluated);
            return Err(SwitchError::ResourceInUse { object: id, referrer });
        }

        self.detach_memberships(id, info, &snapshot);
        let args = TriggerArgs::new(id, snapshot);
        if let Err(e) = self.triggers.run(self, ctx, ot, TriggerPhase::BeforeDelete, &args) {
            if let Err(reattach) = self.attach_memberships(id, info, &args.attrs) {
                error!(object_id = %id, error = %reattach, "membership restore failed");
            }
            self.replay_post(ctx, id, &reevaluated);
            return Err(e);
        }

        for a in &args.attrs {
            if let Ok(meta) = self.model.attr(a.id) {
                if meta.is_tracked_reference() {
                    self.remove_edges(id, meta, &a.value);
                }
            }
        }
        let keys = self.keys_for(info, &args.attrs);
        self.index.erase_all(ot, &keys, id);
        if let Err(e) = self.attrs.delete(id) {
            error!(object_id = %id, error = %e, "attribute removal failed");
        }
        self.allocators.release(id);

        let dangling = self.refs.ref_count(id);
        if dangling > 0 {
            warn!(object_id = %id, dangling, "deleted object still has incoming references");
        }

        let after = self.triggers.run(self, ctx, ot, TriggerPhase::AfterDelete, &args);
        if !info.is_auto() {
            self.record(ctx.in_trigger(), self.record_line(Op::Remove, id));
        }
        self.emit_object_event(id, ObjectOp::Delete);
        debug!(object_id = %id, object_type = %info.name, "object deleted");
        after
    }

    /// Undo a pre-delete re-evaluation by running the create side again.
    fn replay_post(&self, ctx: &mut CallContext, id: ObjectId, referred: &[ObjectId]) {
        for r in referred {
            if let Err(e) = self.reevaluate(ctx, Driver::Object(id), *r, Stage::Post) {
                error!(object_id = %id, referred = %r, error = %e, "re-evaluation restore failed");
            }
        }
    }

    // ---------------------------------------------------------------
    // Set
    // ---------------------------------------------------------------

    /// Change one attribute of a live object.
    pub fn set(&self, id: ObjectId, attr: &Attribute) -> SwitchResult<()> {
        self.set_with(&mut CallContext::new(), id, attr)
    }

    /// [`set`](Self::set) on behalf of a trigger.
    pub fn set_with(&self, ctx: &mut CallContext, id: ObjectId, attr: &Attribute) -> SwitchResult<()> {
        if id.is_null() {
            return Err(SwitchError::invalid("null handle"));
        }
        let ot = id.object_type();
        let info = self.model.object(ot)?;
        let meta = self.model.attr_of(ot, attr.id)?;
        if meta.flags.create_only || meta.flags.immutable {
            return Err(SwitchError::invalid(format!("{} cannot change after create", meta.name)));
        }
        if meta.flags.read_only && !ctx.in_trigger() {
            return Err(SwitchError::invalid(format!("{} is read-only", meta.name)));
        }
        self.model.validate_value(meta, &attr.value)?;
        let _targets = self.pin_targets(ot, std::slice::from_ref(attr));
        if meta.is_tracked_reference() {
            self.check_targets(meta, &attr.value)?;
        }

        let _type_guard = self.type_locks.lock(ot)?;
        if !self.attrs.is_live(id) {
            return Err(SwitchError::not_found(format!("object {id}")));
        }
        let old = self.attrs.get(id, attr.id)?;
        if old == attr.value {
            trace!(object_id = %id, attr = attr.id, "value unchanged");
            return Ok(());
        }

        let before = self.attrs.get_all(id)?;
        let mut after = before.clone();
        match after.iter_mut().find(|a| a.id == attr.id) {
            Some(slot) => slot.value = attr.value.clone(),
            None => after.push(attr.clone()),
        }

        let rekey = info.is_key_attr(attr.id);
        let old_keys = if rekey { self.keys_for(info, &before) } else { Vec::new() };
        let new_keys = if rekey { self.keys_for(info, &after) } else { Vec::new() };
        self.index.erase_all(ot, &old_keys, id);

        let pre_args = TriggerArgs {
            object_id: id,
            attrs: before,
            changed: Some(attr.clone()),
        };
        if let Err(e) = self.triggers.run(self, ctx, ot, TriggerPhase::BeforeUpdate, &pre_args) {
            self.restore_keys(ot, &old_keys, id);
            return Err(e);
        }

        if let Err(e) = self.write_value(ctx, id, meta, &old, &attr.value) {
            self.restore_keys(ot, &old_keys, id);
            return Err(e);
        }
        if let Err(e) = self.index.insert_all(ot, &new_keys, id) {
            self.rewind_value(ctx, id, meta, &attr.value, &old);
            self.restore_keys(ot, &old_keys, id);
            return Err(e.into());
        }

        let post_args = TriggerArgs {
            object_id: id,
            attrs: after,
            changed: Some(attr.clone()),
        };
        if let Err(e) = self.triggers.run(self, ctx, ot, TriggerPhase::AfterUpdate, &post_args) {
            self.index.erase_all(ot, &new_keys, id);
            self.rewind_value(ctx, id, meta, &attr.value, &old);
            self.restore_keys(ot, &old_keys, id);
            return Err(e);
        }

        self.record(
            ctx.in_trigger(),
            self.record_line(Op::Set, id)
                .with_extra(u64::from(attr.id))
                .with_fields(encode_attrs(std::slice::from_ref(attr))),
        );
        self.emit_object_event(id, ObjectOp::Update);
        debug!(object_id = %id, attr = %meta.name, "attribute set");
        Ok(())
    }

    /// Replace one stored value, moving reference edges and re-evaluating
    /// the referred objects when the attribute asks for it.
    fn write_value(
        &self,
        ctx: &mut CallContext,
        id: ObjectId,
        meta: &AttributeMetadata,
        old: &AttributeValue,
        new: &AttributeValue,
    ) -> SwitchResult<()> {
        if !meta.is_tracked_reference() {
            return Ok(self.attrs.set(id, meta.id, new)?);
        }

        let driver = Driver::Attr(id, meta.id);
        self.remove_edges(id, meta, old);
        if meta.flags.re_evaluate {
            for referred in old.referenced_ids() {
                if let Err(e) = self.reevaluate(ctx, driver, referred, Stage::Pre) {
                    self.add_edges(id, meta, old);
                    return Err(e);
                }
            }
        }
        if let Err(e) = self.attrs.set(id, meta.id, new) {
            self.add_edges(id, meta, old);
            return Err(e.into());
        }
        self.add_edges(id, meta, new);
        if meta.flags.re_evaluate {
            for referred in new.referenced_ids() {
                self.reevaluate(ctx, driver, referred, Stage::Post)?;
            }
        }
        Ok(())
    }

    fn rewind_value(
        &self,
        ctx: &mut CallContext,
        id: ObjectId,
        meta: &AttributeMetadata,
        current: &AttributeValue,
        previous: &AttributeValue,
    ) {
        if let Err(e) = self.write_value(ctx, id, meta, current, previous) {
            error!(object_id = %id, attr = %meta.name, error = %e, "value rollback failed");
        }
    }

    fn restore_keys(&self, ot: ObjectType, keys: &[(usize, sws_index::KeyTuple)], id: ObjectId) {
        if let Err(e) = self.index.insert_all(ot, keys, id) {
            error!(object_id = %id, error = %e, "key restore failed");
        }
    }
}

fn member_group(attrs: &[Attribute], member_attr: sws_types::AttrId) -> Option<ObjectId> {
    attrs
        .iter()
        .find(|a| a.id == member_attr)
        .and_then(|a| a.value.as_object_id())
        .filter(|g| !g.is_null())
}
