use std::sync::Weak;

use tracing::debug;

use crate::dispatcher::{Shared, lock};
use crate::types::{EventKey, ListenerId};

/// Removable subscription handle returned by every registration.
///
/// The owner link is weak: a handle never keeps its dispatcher alive, and
/// dropping a handle does not unsubscribe. Call [`Listener::remove`] for that.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    key: EventKey,
    owner: Option<Weak<Shared>>,
}

impl Listener {
    pub(crate) fn new(id: ListenerId, key: EventKey, owner: Weak<Shared>) -> Self {
        Self {
            id,
            key,
            owner: Some(owner),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn event_key(&self) -> &EventKey {
        &self.key
    }

    /// False once [`Listener::remove`] has run.
    pub fn is_active(&self) -> bool {
        self.owner.is_some()
    }

    /// Unsubscribe. Safe to call repeatedly and after the dispatcher is gone.
    ///
    /// Removing during a delivery only affects later deliveries; the one in
    /// flight already holds its own copy of the listener list.
    pub fn remove(&mut self) {
        let Some(owner) = self.owner.take() else {
            return;
        };
        let Some(shared) = owner.upgrade() else {
            return;
        };
        if lock(&shared.registry).remove(&self.key, self.id) {
            debug!(key = %self.key, listener = %self.id, "[Dispatch] Listener removed");
        }
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}
