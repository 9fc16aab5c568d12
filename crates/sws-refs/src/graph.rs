//! Incoming-edge bookkeeping.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use sws_types::{AttrId, ObjectId, ObjectType};
use tracing::trace;

use crate::error::{RefError, RefResult};

/// One directed edge, seen from the referenced side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefEdge {
    pub referencing: ObjectId,
    pub attr: AttrId,
}

/// Edges into one object, by referencing type, with multiplicity.
type Incoming = BTreeMap<ObjectType, BTreeMap<RefEdge, u32>>;

/// Incoming reference edges for every referenced object.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    incoming: RwLock<HashMap<ObjectId, Incoming>>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `referencing.attr -> referenced`.
    pub fn add(
        &self,
        referenced: ObjectId,
        referencing_type: ObjectType,
        referencing: ObjectId,
        attr: AttrId,
    ) -> RefResult<()> {
        if referenced.is_null() || referencing.is_null() {
            return Err(RefError::NullHandle);
        }
        let mut incoming = self.incoming.write();
        *incoming
            .entry(referenced)
            .or_default()
            .entry(referencing_type)
            .or_default()
            .entry(RefEdge { referencing, attr })
            .or_insert(0) += 1;
        trace!(%referenced, %referencing, attr, "edge added");
        Ok(())
    }

    /// Remove one edge `referencing.attr -> referenced`, or with `attr ==
    /// None` every edge from `referencing` to `referenced`.
    pub fn remove(
        &self,
        referenced: ObjectId,
        referencing_type: ObjectType,
        referencing: ObjectId,
        attr: Option<AttrId>,
    ) -> RefResult<()> {
        let not_found = || RefError::EdgeNotFound {
            referenced,
            referencing,
            attr,
        };
        let mut incoming = self.incoming.write();
        let by_type = incoming.get_mut(&referenced).ok_or_else(not_found)?;
        let edges = by_type.get_mut(&referencing_type).ok_or_else(not_found)?;

        match attr {
            Some(attr) => {
                let edge = RefEdge { referencing, attr };
                let count = edges.get_mut(&edge).ok_or_else(not_found)?;
                *count -= 1;
                if *count == 0 {
                    edges.remove(&edge);
                }
            }
            None => {
                let before = edges.len();
                edges.retain(|e, _| e.referencing != referencing);
                if edges.len() == before {
                    return Err(not_found());
                }
            }
        }

        if edges.is_empty() {
            by_type.remove(&referencing_type);
        }
        if by_type.is_empty() {
            incoming.remove(&referenced);
        }
        trace!(%referenced, %referencing, ?attr, "edge removed");
        Ok(())
    }

    /// Distinct edges into `referenced` from objects of `referencing_type`.
    pub fn get_refs(&self, referenced: ObjectId, referencing_type: ObjectType) -> Vec<RefEdge> {
        self.incoming
            .read()
            .get(&referenced)
            .and_then(|by_type| by_type.get(&referencing_type))
            .map(|edges| edges.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Distinct edges into `referenced` from every type.
    pub fn referrers(&self, referenced: ObjectId) -> Vec<RefEdge> {
        self.incoming
            .read()
            .get(&referenced)
            .map(|by_type| by_type.values().flat_map(|e| e.keys().copied()).collect())
            .unwrap_or_default()
    }

    /// Types that currently hold at least one edge into `referenced`.
    pub fn referencing_types(&self, referenced: ObjectId) -> Vec<ObjectType> {
        self.incoming
            .read()
            .get(&referenced)
            .map(|by_type| by_type.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Total edges into `referenced`, counting multiplicity.
    pub fn ref_count(&self, referenced: ObjectId) -> usize {
        self.incoming
            .read()
            .get(&referenced)
            .map(|by_type| {
                by_type
                    .values()
                    .flat_map(|e| e.values())
                    .map(|c| *c as usize)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Number of referenced objects with at least one incoming edge.
    pub fn len(&self) -> usize {
        self.incoming.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.incoming.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORT: ObjectType = ObjectType(1);
    const QUEUE: ObjectType = ObjectType(2);
    const ACL: ObjectType = ObjectType(3);

    fn port(n: u64) -> ObjectId {
        ObjectId::new(PORT, n).unwrap()
    }

    fn queue(n: u64) -> ObjectId {
        ObjectId::new(QUEUE, n).unwrap()
    }

    fn acl(n: u64) -> ObjectId {
        ObjectId::new(ACL, n).unwrap()
    }

    // ---- add / get_refs ----

    #[test]
    fn add_and_list_by_type() {
        let g = ReferenceGraph::new();
        g.add(port(1), QUEUE, queue(1), 20).unwrap();
        g.add(port(1), QUEUE, queue(2), 20).unwrap();
        g.add(port(1), ACL, acl(1), 30).unwrap();

        assert_eq!(
            g.get_refs(port(1), QUEUE),
            vec![
                RefEdge { referencing: queue(1), attr: 20 },
                RefEdge { referencing: queue(2), attr: 20 },
            ]
        );
        assert_eq!(g.get_refs(port(1), ACL).len(), 1);
        assert_eq!(g.referencing_types(port(1)), vec![QUEUE, ACL]);
        assert_eq!(g.referrers(port(1)).len(), 3);
    }

    #[test]
    fn null_handles_are_rejected() {
        let g = ReferenceGraph::new();
        assert_eq!(g.add(ObjectId::NULL, QUEUE, queue(1), 20), Err(RefError::NullHandle));
        assert!(g.is_empty());
    }

    // ---- multiplicity ----

    #[test]
    fn list_elements_are_counted_per_edge() {
        let g = ReferenceGraph::new();
        // acl(1).ports = [port(1), port(1)]
        g.add(port(1), ACL, acl(1), 30).unwrap();
        g.add(port(1), ACL, acl(1), 30).unwrap();
        assert_eq!(g.ref_count(port(1)), 2);
        assert_eq!(g.get_refs(port(1), ACL).len(), 1);

        g.remove(port(1), ACL, acl(1), Some(30)).unwrap();
        assert_eq!(g.ref_count(port(1)), 1);
        g.remove(port(1), ACL, acl(1), Some(30)).unwrap();
        assert_eq!(g.ref_count(port(1)), 0);
        assert!(g.is_empty());
    }

    // ---- remove ----

    #[test]
    fn remove_without_attr_drops_every_edge_from_referrer() {
        let g = ReferenceGraph::new();
        g.add(port(1), ACL, acl(1), 30).unwrap();
        g.add(port(1), ACL, acl(1), 31).unwrap();
        g.add(port(1), ACL, acl(2), 30).unwrap();
        g.remove(port(1), ACL, acl(1), None).unwrap();
        assert_eq!(
            g.get_refs(port(1), ACL),
            vec![RefEdge { referencing: acl(2), attr: 30 }]
        );
    }

    #[test]
    fn removing_unknown_edge_is_an_error() {
        let g = ReferenceGraph::new();
        assert!(g.remove(port(1), QUEUE, queue(1), Some(20)).is_err());
        g.add(port(1), QUEUE, queue(1), 20).unwrap();
        assert!(g.remove(port(1), QUEUE, queue(1), Some(21)).is_err());
        assert!(g.remove(port(1), QUEUE, queue(2), None).is_err());
        assert_eq!(g.ref_count(port(1)), 1);
    }

    #[test]
    fn add_remove_restores_empty_graph() {
        let g = ReferenceGraph::new();
        for n in 1..=5 {
            g.add(port(1), QUEUE, queue(n), 20).unwrap();
        }
        for n in 1..=5 {
            g.remove(port(1), QUEUE, queue(n), Some(20)).unwrap();
        }
        assert!(g.is_empty());
        assert!(g.referrers(port(1)).is_empty());
    }
}
