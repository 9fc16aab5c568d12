//! Orchestration layer of the switch object store.
//!
//! [`SwitchStore`] ties the schema, attribute store, secondary index,
//! reference graph, and id allocators together behind create, delete, set,
//! get, key lookup, and iteration. Around each mutation it runs the
//! registered triggers, re-evaluates AUTO objects, appends to the record
//! log, and announces the change through the event notifier.
//!
//! # Modules
//!
//! - [`store`] -- The [`SwitchStore`] facade, reads, and registration
//! - [`lifecycle`] -- Create, delete, and set with rollback
//! - [`reevaluate`] -- AUTO-object re-evaluation
//! - [`triggers`] -- Trigger phases, arguments, and the registry
//! - [`context`] -- Per-call trigger depth and re-evaluation guard
//! - [`locks`] -- Per-type and per-object locks
//! - [`counters`] -- Counter provider seam
//! - [`replay`] -- Rebuilding a store from its record log
//! - [`snapshot`] -- Dump and restore
//! - [`config`] -- Store configuration
//!
//! # Design Rules
//!
//! 1. Every create, delete, and set holds the re-entrant lock of its object
//!    type for its whole duration, triggers included.
//! 2. Operations issued from a trigger take the caller's [`CallContext`];
//!    they may touch AUTO objects and read-only attributes, and they are
//!    recorded commented out.
//! 3. A failed operation leaves the index, graph, and allocators exactly as
//!    it found them.
//! 4. AUTO objects are never recorded. Replay regenerates them by running
//!    the same triggers.

pub mod config;
pub mod context;
pub mod counters;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod reevaluate;
pub mod replay;
pub mod snapshot;
pub mod store;
pub mod triggers;

#[cfg(test)]
mod testing;

pub use config::{RecordConfig, StoreConfig};
pub use context::{CallContext, MAX_TRIGGER_DEPTH};
pub use counters::CounterProvider;
pub use error::{ReplayError, ReplayResult};
pub use locks::{ObjectLocks, TypeLocks};
pub use replay::{ReplayEngine, ReplayReport};
pub use store::SwitchStore;
pub use triggers::{TriggerArgs, TriggerFn, TriggerPhase, TriggerRegistry};
