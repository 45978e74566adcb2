use crate::LinkId;

use std::sync::Arc;

use parking_lot::RwLock;

/// Lifecycle notifications emitted by a [`Link`](crate::Link) once the
/// underlying transition has completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    Connected { link_id: Option<LinkId> },
    Disconnected { link_id: Option<LinkId> },
    Error { link_id: Option<LinkId>, error: String },
}

impl LinkEvent {
    pub fn link_id(&self) -> Option<&LinkId> {
        match self {
            LinkEvent::Connected { link_id }
            | LinkEvent::Disconnected { link_id }
            | LinkEvent::Error { link_id, .. } => link_id.as_ref(),
        }
    }
}

pub trait LinkEventListener: Send + Sync {
    fn on_link_event(&self, event: &LinkEvent);
}

impl<F> LinkEventListener for F
where
    F: Fn(&LinkEvent) + Send + Sync,
{
    fn on_link_event(&self, event: &LinkEvent) {
        (self)(event)
    }
}

/// Listener registry. Listeners are notified synchronously, in the order
/// they were added.
#[derive(Default)]
pub struct LinkEventEmitter {
    listeners: RwLock<Vec<Arc<dyn LinkEventListener>>>,
}

impl LinkEventEmitter {
    pub fn new() -> Self {
        LinkEventEmitter::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn LinkEventListener>) {
        self.listeners.write().push(listener);
    }

    /// Removes a previously added listener (compared by identity).
    pub fn remove_listener(&self, listener: &Arc<dyn LinkEventListener>) {
        let target = Arc::as_ptr(listener) as *const ();
        self.listeners
            .write()
            .retain(|existing| Arc::as_ptr(existing) as *const () != target);
    }

    pub fn emit(&self, event: LinkEvent) {
        // Snapshot so listeners may (un)register from inside a callback
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_link_event(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
