use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::event::{Event, EventKind};

/// Callback invoked with each event of its kind.
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Fixed table of one callback per [`EventKind`].
#[derive(Default)]
pub struct EventNotifier {
    table: RwLock<HashMap<EventKind, EventCallback>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback` for `kind`, returning the one it replaces.
    pub fn register(&self, kind: EventKind, callback: EventCallback) -> Option<EventCallback> {
        self.table.write().insert(kind, callback)
    }

    pub fn deregister(&self, kind: EventKind) -> Option<EventCallback> {
        self.table.write().remove(&kind)
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.table.read().contains_key(&kind)
    }

    /// Deliver `event` to the callback for its kind. Returns `false` when
    /// nothing is registered.
    ///
    /// The table lock is released before the callback runs, so a callback
    /// may itself register or notify.
    pub fn notify(&self, event: &Event) -> bool {
        let callback = self.table.read().get(&event.kind()).cloned();
        match callback {
            Some(cb) => {
                trace!(kind = %event.kind(), "event delivered");
                cb(event);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<EventKind> = self.table.read().keys().copied().collect();
        kinds.sort();
        f.debug_struct("EventNotifier")
            .field("registered", &kinds)
            .finish()
    }
}
