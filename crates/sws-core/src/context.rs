//! Per-call state threaded through trigger callbacks.

use std::collections::HashSet;

use sws_types::{ObjectType, SwitchError, SwitchResult};

/// Deepest allowed nesting of trigger invocations.
pub const MAX_TRIGGER_DEPTH: u32 = 32;

/// State of one top-level store call and everything its triggers do.
///
/// Every top-level entry point starts from a fresh context, so nothing
/// carries over between calls. Trigger callbacks receive the context
/// mutably and hand it back to the store for any nested operation.
#[derive(Debug, Default)]
pub struct CallContext {
    depth: u32,
    reevaluating: HashSet<ObjectType>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nesting level of trigger callbacks. Zero for the caller's own
    /// operation.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// `true` while running inside a trigger chain. Operations performed
    /// here may touch AUTO objects and read-only attributes, and are written
    /// to the record log commented out.
    pub fn in_trigger(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn enter_trigger(&mut self) -> SwitchResult<()> {
        if self.depth >= MAX_TRIGGER_DEPTH {
            return Err(SwitchError::Failure(format!(
                "trigger nesting exceeds {MAX_TRIGGER_DEPTH}"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave_trigger(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Claim re-evaluation of `ot`. Returns `false` if an outer frame of
    /// this call is already re-evaluating that type.
    pub(crate) fn begin_reevaluation(&mut self, ot: ObjectType) -> bool {
        self.reevaluating.insert(ot)
    }

    pub(crate) fn end_reevaluation(&mut self, ot: ObjectType) {
        self.reevaluating.remove(&ot);
    }

    pub fn is_reevaluating(&self, ot: ObjectType) -> bool {
        self.reevaluating.contains(&ot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_tracks_nesting() {
        let mut ctx = CallContext::new();
        assert!(!ctx.in_trigger());
        ctx.enter_trigger().unwrap();
        ctx.enter_trigger().unwrap();
        assert_eq!(ctx.depth(), 2);
        ctx.leave_trigger();
        ctx.leave_trigger();
        assert!(!ctx.in_trigger());
    }

    #[test]
    fn runaway_nesting_fails() {
        let mut ctx = CallContext::new();
        for _ in 0..MAX_TRIGGER_DEPTH {
            ctx.enter_trigger().unwrap();
        }
        assert!(matches!(ctx.enter_trigger(), Err(SwitchError::Failure(_))));
    }

    #[test]
    fn reevaluation_guard_is_claimed_once() {
        let mut ctx = CallContext::new();
        assert!(ctx.begin_reevaluation(ObjectType(4)));
        assert!(!ctx.begin_reevaluation(ObjectType(4)));
        assert!(ctx.begin_reevaluation(ObjectType(5)));
        ctx.end_reevaluation(ObjectType(4));
        assert!(!ctx.is_reevaluating(ObjectType(4)));
        assert!(ctx.is_reevaluating(ObjectType(5)));
    }
}
