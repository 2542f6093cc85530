//! Event Intake
//!
//! Drives the change-log store from host notifications, one at a time in
//! delivery order. Per key the lifecycle is
//! `Untracked -> Tracked -> Deleted`; entries are never retracted, so an
//! edit delivered after a deletion is still recorded as an ordinary edit.
//!
//! Media materialization runs as fire-and-forget tokio tasks. Their
//! outcomes come back over a channel and are applied between
//! notifications, so the store keeps a single owner.

mod notification;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::diff::detect;
use crate::error::{FetchError, IntakeError};
use crate::media::MediaFetcher;
use crate::store::ChangeLogStore;
use crate::types::{
    EntityKey, EntryPayload, HistoryAction, HistoryEntry, MediaReference, MessageSnapshot,
};
use crate::utils::current_timestamp;

pub use notification::{HostNotification, RawNotification};

/// Tracking state of one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Nothing recorded yet
    Untracked,
    /// Has a log and no deletion
    Tracked,
    /// A `Deleted` entry was recorded
    Deleted,
}

/// Result of one materialization task
#[derive(Debug)]
struct MaterializationOutcome {
    media_id: String,
    result: Result<Option<String>, FetchError>,
}

/// Consumes host notifications and records them in the store
pub struct EventIntake {
    store: ChangeLogStore,
    fetcher: Option<Arc<dyn MediaFetcher>>,
    in_flight: HashSet<String>,
    outcomes_tx: mpsc::UnboundedSender<MaterializationOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<MaterializationOutcome>,
}

impl EventIntake {
    pub fn new(store: ChangeLogStore) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();

        Self {
            store,
            fetcher: None,
            in_flight: HashSet::new(),
            outcomes_tx,
            outcomes_rx,
        }
    }

    /// Materialize newly seen media with `fetcher`
    pub fn with_fetcher<F: MediaFetcher + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn store(&self) -> &ChangeLogStore {
        &self.store
    }

    /// Mutable access for host lifecycle hooks (`clear`, `force_create_history`)
    pub fn store_mut(&mut self) -> &mut ChangeLogStore {
        &mut self.store
    }

    pub fn into_store(self) -> ChangeLogStore {
        self.store
    }

    pub fn key_state(&self, key: &EntityKey) -> KeyState {
        if self.store.get_deletion(key).is_some() {
            KeyState::Deleted
        } else if self.store.has_any_history(key) {
            KeyState::Tracked
        } else {
            KeyState::Untracked
        }
    }

    /// Parse and process a raw host notification.
    ///
    /// Malformed notifications are dropped with a warning and nothing is
    /// recorded.
    pub fn handle_raw(&mut self, raw: RawNotification) -> Result<Vec<HistoryEntry>, IntakeError> {
        match HostNotification::parse(&raw) {
            Ok(Some(notification)) => Ok(self.handle(notification)),
            Ok(None) => {
                debug!(event = %raw.event, "Ignoring notification");
                Ok(Vec::new())
            }
            Err(e) => {
                warn!(error = %e, "Dropping notification");
                Err(e)
            }
        }
    }

    /// Process a typed notification, returning the recorded entries
    pub fn handle(&mut self, notification: HostNotification) -> Vec<HistoryEntry> {
        match notification {
            HostNotification::MessageSent { message } => {
                self.on_message_sent(message).into_iter().collect()
            }
            HostNotification::MessageEdited { message } => vec![self.on_message_edited(message)],
            HostNotification::MessagesDeleted {
                conversation_id,
                message_ids,
                revoked,
            } => self.on_messages_deleted(conversation_id, &message_ids, revoked),
        }
    }

    /// Record creation of a new message.
    ///
    /// A repeated creation notification for a known key records nothing.
    pub fn on_message_sent(&mut self, message: MessageSnapshot) -> Option<HistoryEntry> {
        let key = message.key();

        if self.store.has_any_history(&key) {
            info!(%key, "Message already tracked, ignoring repeated creation");
            return None;
        }

        let entry = self.store.record(key, HistoryAction::Created, EntryPayload::created(message.clone()));
        self.track_media(&message);
        Some(entry)
    }

    /// Record an edit against the most recent known snapshot.
    ///
    /// An edit always produces an entry, even when no field changed
    /// (metadata-only edits) or the key was never seen before.
    pub fn on_message_edited(&mut self, message: MessageSnapshot) -> HistoryEntry {
        let key = message.key();
        let changes = detect(self.store.latest_snapshot(&key), &message);

        if changes.is_empty() {
            debug!(%key, "Edit without detectable field changes");
        }

        let entry = self
            .store
            .record(key, HistoryAction::Edited, EntryPayload::edited(message.clone(), changes));
        self.track_media(&message);
        entry
    }

    /// Record deletion of a batch of messages in one conversation
    pub fn on_messages_deleted(
        &mut self,
        conversation_id: i64,
        message_ids: &[i64],
        revoked: bool,
    ) -> Vec<HistoryEntry> {
        message_ids
            .iter()
            .map(|&message_id| {
                let key = EntityKey::new(conversation_id, message_id);
                let last_known = self.store.latest_snapshot(&key).cloned();
                self.store
                    .record(key, HistoryAction::Deleted, EntryPayload::deleted(last_known, revoked))
            })
            .collect()
    }

    fn track_media(&mut self, message: &MessageSnapshot) {
        if let Some(reference) = self.store.register_media_from(message) {
            if !reference.materialized {
                self.schedule_materialization(reference);
            }
        }
    }

    fn schedule_materialization(&mut self, reference: MediaReference) {
        let Some(fetcher) = self.fetcher.clone() else {
            return;
        };

        if self.in_flight.contains(&reference.id) {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                debug!(media_id = %reference.id, "No async runtime, skipping materialization");
                return;
            }
        };

        self.in_flight.insert(reference.id.clone());
        let outcomes = self.outcomes_tx.clone();

        runtime.spawn(async move {
            let result = fetcher.fetch(&reference).await;
            // Receiver gone means the intake was dropped
            let _ = outcomes.send(MaterializationOutcome {
                media_id: reference.id,
                result,
            });
        });
    }

    fn apply_outcome(&mut self, outcome: MaterializationOutcome) {
        self.in_flight.remove(&outcome.media_id);

        match outcome.result {
            Ok(local_url) => {
                self.store
                    .mark_materialized(&outcome.media_id, local_url, current_timestamp());
                debug!(media_id = %outcome.media_id, "Media materialized");
            }
            Err(e) => {
                warn!(media_id = %outcome.media_id, error = %e, "Failed to materialize media");
            }
        }
    }

    /// Apply materialization outcomes that have already arrived
    pub fn drain_materializations(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            self.apply_outcome(outcome);
            applied += 1;
        }
        applied
    }

    /// Number of materialization tasks still running
    pub fn pending_materializations(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait for all running materialization tasks and apply their outcomes
    pub async fn settle_materializations(&mut self) {
        while !self.in_flight.is_empty() {
            match self.outcomes_rx.recv().await {
                Some(outcome) => self.apply_outcome(outcome),
                None => break,
            }
        }
    }

    /// Process notifications until the sender side closes.
    ///
    /// Materialization outcomes are applied as they arrive, between
    /// notifications. Returns the store once the channel is closed and
    /// pending writes are flushed.
    pub async fn run(mut self, mut notifications: mpsc::Receiver<RawNotification>) -> ChangeLogStore {
        info!("Message history intake started");

        loop {
            tokio::select! {
                biased;

                Some(outcome) = self.outcomes_rx.recv() => self.apply_outcome(outcome),

                next = notifications.recv() => match next {
                    Some(raw) => {
                        // Malformed notifications are already logged
                        let _ = self.handle_raw(raw);
                    }
                    None => break,
                },
            }
        }

        self.settle_materializations().await;
        self.store.flush();

        info!(stats = ?self.store.stats(), "Message history intake stopped");
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeSet, ContentMessage};

    fn text(message_id: i64, body: &str) -> MessageSnapshot {
        MessageSnapshot::Content(ContentMessage::new(50, message_id, 1700000000, body))
    }

    #[test]
    fn test_state_machine() {
        let mut intake = EventIntake::new(ChangeLogStore::in_memory());
        let key = EntityKey::new(50, 1);

        assert_eq!(intake.key_state(&key), KeyState::Untracked);

        intake.on_message_sent(text(1, "a"));
        assert_eq!(intake.key_state(&key), KeyState::Tracked);

        intake.on_messages_deleted(50, &[1], false);
        assert_eq!(intake.key_state(&key), KeyState::Deleted);
    }

    #[test]
    fn test_duplicate_sent_ignored() {
        let mut intake = EventIntake::new(ChangeLogStore::in_memory());

        assert!(intake.on_message_sent(text(2, "a")).is_some());
        assert!(intake.on_message_sent(text(2, "a")).is_none());
        assert_eq!(intake.store().get_log(&EntityKey::new(50, 2)).len(), 1);
    }

    #[test]
    fn test_edit_of_unknown_key_has_empty_changes() {
        let mut intake = EventIntake::new(ChangeLogStore::in_memory());

        let entry = intake.on_message_edited(text(3, "first seen as edit"));
        assert_eq!(entry.action, HistoryAction::Edited);
        assert_eq!(entry.changes, Some(ChangeSet::default()));
    }

    #[test]
    fn test_metadata_only_edit_still_recorded() {
        let mut intake = EventIntake::new(ChangeLogStore::in_memory());
        intake.on_message_sent(text(4, "same"));

        let entry = intake.on_message_edited(text(4, "same"));
        assert!(entry.changes.unwrap().is_empty());
        assert_eq!(intake.store().get_log(&EntityKey::new(50, 4)).len(), 2);
    }

    #[test]
    fn test_edit_after_delete_is_recorded() {
        let mut intake = EventIntake::new(ChangeLogStore::in_memory());
        intake.on_message_sent(text(5, "a"));
        intake.on_messages_deleted(50, &[5], true);

        let entry = intake.on_message_edited(text(5, "b"));
        assert_eq!(entry.changes, Some(ChangeSet::text("a", "b")));

        let key = EntityKey::new(50, 5);
        assert_eq!(intake.store().get_log(&key).len(), 3);
        assert_eq!(intake.key_state(&key), KeyState::Deleted);
    }

    #[test]
    fn test_malformed_raw_records_nothing() {
        let mut intake = EventIntake::new(ChangeLogStore::in_memory());
        let raw = RawNotification::new("message_sent", serde_json::json!({"tempId": 1}));

        assert!(intake.handle_raw(raw).is_err());
        assert_eq!(intake.store().stats().total_messages, 0);
    }
}
