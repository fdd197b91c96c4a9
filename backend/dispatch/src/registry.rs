/// Event registry: ordered listener lists per event key.
///
/// Insertion order is delivery order. Ids come from one counter shared by
/// every key and are never reused.
use std::collections::HashMap;

use crate::types::{Callback, EventKey, ListenerId};

struct Entry {
    id: ListenerId,
    callback: Callback,
}

#[derive(Default)]
pub(crate) struct Registry {
    listeners: HashMap<EventKey, Vec<Entry>>,
    next_id: u64,
}

impl Registry {
    /// Append a callback under `key` and mint its id.
    pub(crate) fn add(&mut self, key: EventKey, callback: Callback) -> ListenerId {
        let id = ListenerId::new(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(key)
            .or_default()
            .push(Entry { id, callback });
        id
    }

    /// Remove by identity, keeping the relative order of the rest.
    /// Returns false when nothing under `key` has that id.
    pub(crate) fn remove(&mut self, key: &EventKey, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(key) else {
            return false;
        };
        let Some(pos) = list.iter().position(|entry| entry.id == id) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            self.listeners.remove(key);
        }
        true
    }

    /// Copy of the callbacks under `key`, so delivery runs without the lock held.
    pub(crate) fn snapshot(&self, key: &EventKey) -> Vec<(ListenerId, Callback)> {
        self.listeners
            .get(key)
            .map(|list| {
                list.iter()
                    .map(|entry| (entry.id, entry.callback.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn len(&self, key: &EventKey) -> usize {
        self.listeners.get(key).map_or(0, Vec::len)
    }
}
