//! Observer registry for session updates

use super::SessionUpdate;
use uuid::Uuid;

/// Callback invoked for every session update
pub type Observer = Box<dyn FnMut(&SessionUpdate) + Send>;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

#[derive(Default)]
pub(crate) struct Observers {
    entries: Vec<(SubscriptionId, Observer)>,
}

impl Observers {
    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.entries.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Deliver `update` to every observer in subscription order
    pub fn notify(&mut self, update: &SessionUpdate) {
        for (_, observer) in self.entries.iter_mut() {
            observer(update);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
