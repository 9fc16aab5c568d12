//! AUTO-object re-evaluation.
//!
//! When a USER object gains or loses its reference to another object through
//! a `re_evaluate` attribute, the referred object's create or delete triggers
//! run again so they can add or remove the AUTO objects that depend on it.
//! Only the first USER edge to appear and the last one to go drive this:
//! while any USER edge outside the driving change still points at the
//! target, nothing needs re-evaluating.

use std::collections::BTreeSet;

use sws_refs::RefEdge;
use sws_schema::ObjectClass;
use sws_types::{AttrId, Attribute, ObjectId, SwitchResult};
use tracing::trace;

use crate::context::CallContext;
use crate::store::SwitchStore;
use crate::triggers::{TriggerArgs, TriggerPhase};

/// Which half of the referred object's lifecycle to replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    /// The reference is going away: run the delete triggers.
    Pre,
    /// The reference was just established: run the create triggers.
    Post,
}

/// The edges whose arrival or removal triggers a re-evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Driver {
    /// Every edge of an object being created or deleted.
    Object(ObjectId),
    /// The edges of one attribute being rewritten.
    Attr(ObjectId, AttrId),
}

impl Driver {
    fn referrer(self) -> ObjectId {
        match self {
            Self::Object(id) | Self::Attr(id, _) => id,
        }
    }

    fn owns(self, edge: &RefEdge) -> bool {
        match self {
            Self::Object(id) => edge.referencing == id,
            Self::Attr(id, attr) => edge.referencing == id && edge.attr == attr,
        }
    }
}

impl SwitchStore {
    /// Distinct objects referred to through `re_evaluate` attributes in
    /// `attrs`, in handle order.
    pub(crate) fn reevaluated_refs(&self, attrs: &[Attribute]) -> Vec<ObjectId> {
        attrs
            .iter()
            .filter(|a| {
                self.model
                    .attr(a.id)
                    .is_ok_and(|m| m.flags.re_evaluate && m.is_tracked_reference())
            })
            .flat_map(|a| a.value.referenced_ids())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// `true` if a USER edge not owned by `driver` points at `referred`.
    fn held_elsewhere(&self, driver: Driver, referred: ObjectId) -> bool {
        self.refs.referrers(referred).iter().any(|edge| {
            !driver.owns(edge) && self.class_of(edge.referencing.object_type()) == ObjectClass::User
        })
    }

    pub(crate) fn reevaluate(
        &self,
        ctx: &mut CallContext,
        driver: Driver,
        referred: ObjectId,
        stage: Stage,
    ) -> SwitchResult<()> {
        if referred.is_null() || !self.attrs.is_live(referred) {
            return Ok(());
        }
        let referrer = driver.referrer();
        if self.held_elsewhere(driver, referred) {
            trace!(%referrer, %referred, "other references remain, skipping re-evaluation");
            return Ok(());
        }
        let ot = referred.object_type();
        if !ctx.begin_reevaluation(ot) {
            trace!(%referred, "re-evaluation of this type already in progress");
            return Ok(());
        }
        trace!(%referrer, %referred, ?stage, "re-evaluating");
        let result = self.run_reevaluation(ctx, referred, stage);
        ctx.end_reevaluation(ot);
        result
    }

    fn run_reevaluation(&self, ctx: &mut CallContext, referred: ObjectId, stage: Stage) -> SwitchResult<()> {
        let ot = referred.object_type();
        let args = TriggerArgs::new(referred, self.attrs.get_all(referred)?);
        let (first, second) = match stage {
            Stage::Pre => (TriggerPhase::BeforeDelete, TriggerPhase::AfterDelete),
            Stage::Post => (TriggerPhase::BeforeCreate, TriggerPhase::AfterCreate),
        };
        self.triggers.run(self, ctx, ot, first, &args)?;
        self.triggers.run(self, ctx, ot, second, &args)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use sws_types::{Attribute, AttributeValue, IpPrefix, ObjectId, SwitchError};

    /// Counts every run of the nexthop create chain, re-evaluations included.
    fn count_nexthop_creates(store: &crate::SwitchStore) -> Arc<AtomicUsize> {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        store
            .on_create_before(NEXTHOP, move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        runs
    }

    fn prefix(text: &str) -> AttributeValue {
        AttributeValue::Prefix(text.parse::<IpPrefix>().unwrap())
    }

    #[test]
    fn first_route_creates_one_auto_object() {
        let store = store();
        let nh = create_nexthop(&store, "10.0.0.1");
        assert!(auto_objects(&store).is_empty());

        let r1 = create_route(&store, "10.1.0.0/16", nh);
        let autos = auto_objects(&store);
        assert_eq!(autos.len(), 1);
        assert_eq!(store.get(autos[0], NHA_NEXTHOP).unwrap().value, AttributeValue::ObjectId(nh));

        // A second referrer changes nothing.
        let r2 = create_route(&store, "10.2.0.0/16", nh);
        assert_eq!(auto_objects(&store), autos);

        store.delete(r1).unwrap();
        assert_eq!(auto_objects(&store), autos);
        // Removing the last referrer removes the AUTO object before returning.
        store.delete(r2).unwrap();
        assert!(auto_objects(&store).is_empty());
        store.delete(nh).unwrap();
    }

    #[test]
    fn retargeting_moves_the_auto_object() {
        let store = store();
        let nh1 = create_nexthop(&store, "10.0.0.1");
        let nh2 = create_nexthop(&store, "10.0.0.2");
        let route = create_route(&store, "10.1.0.0/16", nh1);

        store.set(route, &Attribute::new(ROUTE_NEXTHOP, nh2)).unwrap();
        let autos = auto_objects(&store);
        assert_eq!(autos.len(), 1);
        assert_eq!(store.get(autos[0], NHA_NEXTHOP).unwrap().value, AttributeValue::ObjectId(nh2));
    }

    #[test]
    fn nexthop_with_auto_dependent_is_deletable_once_unreferenced() {
        let store = store();
        let nh = create_nexthop(&store, "10.0.0.1");
        let route = create_route(&store, "10.1.0.0/16", nh);
        assert!(matches!(store.delete(nh), Err(SwitchError::ResourceInUse { .. })));
        // The refused delete left the dependent in place.
        assert_eq!(auto_objects(&store).len(), 1);
        store.delete(route).unwrap();
        store.delete(nh).unwrap();
        assert_eq!(store.object_count(), 0);
    }

    #[test]
    fn two_attributes_on_one_nexthop_share_its_auto_object() {
        let store = store();
        let runs = count_nexthop_creates(&store);
        let nh = create_nexthop(&store, "10.0.0.1");
        let route = store
            .create(
                ROUTE,
                &[
                    Attribute::new(ROUTE_PREFIX, prefix("10.1.0.0/16")),
                    Attribute::new(ROUTE_NEXTHOP, nh),
                    Attribute::new(ROUTE_BACKUP_NEXTHOP, nh),
                ],
            )
            .unwrap();
        // The nexthop's own create, then one re-evaluation for the route.
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(auto_objects(&store).len(), 1);

        store.set(route, &Attribute::new(ROUTE_BACKUP_NEXTHOP, ObjectId::NULL)).unwrap();
        assert_eq!(auto_objects(&store).len(), 1);

        store.set(route, &Attribute::new(ROUTE_BACKUP_NEXTHOP, nh)).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        store.set(route, &Attribute::new(ROUTE_NEXTHOP, ObjectId::NULL)).unwrap();
        assert_eq!(auto_objects(&store).len(), 1);

        store.set(route, &Attribute::new(ROUTE_BACKUP_NEXTHOP, ObjectId::NULL)).unwrap();
        assert!(auto_objects(&store).is_empty());
    }

    #[test]
    fn nested_reevaluation_of_the_same_type_is_skipped() {
        let store = store();
        let runs = count_nexthop_creates(&store);
        let nh1 = create_nexthop(&store, "10.0.0.1");
        let nh2 = create_nexthop(&store, "10.0.0.2");
        store
            .on_create_after(NEXTHOP, move |store, ctx, args| {
                if args.object_id != nh1 || !ctx.is_reevaluating(NEXTHOP) {
                    return Ok(());
                }
                store
                    .create_with(
                        ctx,
                        ROUTE,
                        &[
                            Attribute::new(ROUTE_PREFIX, prefix("10.9.0.0/16")),
                            Attribute::new(ROUTE_NEXTHOP, nh2),
                        ],
                    )
                    .map(|_| ())
            })
            .unwrap();

        create_route(&store, "10.1.0.0/16", nh1);
        // Only the outer re-evaluation of nh1 ran; the inner route's
        // re-evaluation of nh2 was a no-op.
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(store.get_all_handles(ROUTE).unwrap().len(), 2);
        assert_eq!(store.user_referrer_count(nh2), 1);
        let autos = auto_objects(&store);
        assert_eq!(autos.len(), 1);
        assert_eq!(store.get(autos[0], NHA_NEXTHOP).unwrap().value, AttributeValue::ObjectId(nh1));

        // The guard does not outlive the call.
        let inner = store
            .find_by_key(ROUTE, &[Attribute::new(ROUTE_PREFIX, prefix("10.9.0.0/16"))])
            .unwrap();
        store.delete(inner).unwrap();
        create_route(&store, "10.2.0.0/16", nh2);
        assert_eq!(runs.load(Ordering::SeqCst), 4);
        assert_eq!(auto_objects(&store).len(), 2);
    }
}
