//! The ordered message list of the active room

use crate::protocol::ChatMessage;
use std::collections::{HashSet, VecDeque};

/// Messages of the active room, newest first
#[derive(Debug, Default)]
pub struct Feed {
    messages: VecDeque<ChatMessage>,

    /// Set between a room switch and the arrival of its history
    loading: bool,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a newly arrived message in front
    pub fn prepend(&mut self, message: ChatMessage) {
        self.messages.push_front(message);
    }

    /// Drop everything and wait for a history batch
    pub fn begin_loading(&mut self) {
        self.messages.clear();
        self.loading = true;
    }

    /// Install a history batch (newest first).
    ///
    /// Messages prepended while the batch was loading stay in front of it.
    /// When the batch repeats one of them by id, the batch copy is skipped.
    pub fn apply_history(&mut self, batch: Vec<ChatMessage>) {
        let live_ids: HashSet<String> = self
            .messages
            .iter()
            .filter_map(|m| m.id.clone())
            .collect();

        self.messages.extend(
            batch
                .into_iter()
                .filter(|m| m.id.as_ref().map_or(true, |id| !live_ids.contains(id))),
        );
        self.loading = false;
    }

    /// Stop waiting for history without installing any
    pub fn finish_loading(&mut self) {
        self.loading = false;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.loading = false;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages, newest first
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn newest(&self) -> Option<&ChatMessage> {
        self.messages.front()
    }

    pub fn to_vec(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }
}
