//! Event notification for the switch object store.
//!
//! A fixed table holds at most one callback per [`EventKind`]. Registering a
//! callback replaces the previous one for that kind, and each event reaches
//! at most one callback.

pub mod event;
pub mod notifier;

pub use event::{Event, EventKind, MacEvent, MacOp, ObjectOp, PortOp};
pub use notifier::{EventCallback, EventNotifier};
