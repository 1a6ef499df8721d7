use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use super::{CommitOutcome, VoteStore, VoteWrite};
use crate::{
    error::{AppError, Result},
    models::{ContentCounters, InteractionChange, InteractionRecord, ItemRef, interaction_id},
};

#[derive(Default)]
struct State {
    interactions: HashMap<String, InteractionRecord>,
    counters: HashMap<ItemRef, ContentCounters>,
}

/// In-process store with the same compare-and-swap contract as [`super::PgVoteStore`].
///
/// When built with [`MemoryVoteStore::with_change_feed`] every interaction
/// write is published as an [`InteractionChange`], mirroring the Postgres trigger.
#[derive(Default)]
pub struct MemoryVoteStore {
    state: Mutex<State>,
    changes: Option<mpsc::UnboundedSender<InteractionChange>>,
    unavailable: AtomicBool,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_change_feed() -> (Self, mpsc::UnboundedReceiver<InteractionChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            changes: Some(tx),
            ..Self::default()
        };
        (store, rx)
    }

    /// Creates the item with the given counters (zeroed for a fresh item).
    pub async fn insert_item(&self, item: ItemRef, counters: ContentCounters) {
        self.state.lock().await.counters.insert(item, counters);
    }

    /// Hard delete of a record, as done by account erasure or admin tooling.
    pub async fn delete_interaction(&self, item: &ItemRef, user_id: Uuid) -> Result<bool> {
        self.check_available()?;
        let removed = self
            .state
            .lock()
            .await
            .interactions
            .remove(&interaction_id(item.item_id, user_id));

        match removed {
            Some(before) => {
                self.publish(Some(before), None);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Simulates an infrastructure outage: every call fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn publish(&self, before: Option<InteractionRecord>, after: Option<InteractionRecord>) {
        if let Some(tx) = &self.changes {
            // A dropped receiver only means nobody is maintaining counters.
            let _ = tx.send(InteractionChange { before, after });
        }
    }
}

fn record_matches(current: Option<&InteractionRecord>, expected: Option<i64>) -> bool {
    match (current, expected) {
        (None, None) => true,
        (Some(record), Some(version)) => record.version == version,
        _ => false,
    }
}

fn stored_record(record: &InteractionRecord, expected: Option<i64>) -> InteractionRecord {
    let mut stored = record.clone();
    stored.version = expected.map_or(1, |v| v + 1);
    stored
}

#[async_trait]
impl VoteStore for MemoryVoteStore {
    async fn get_interaction(
        &self,
        item: &ItemRef,
        user_id: Uuid,
    ) -> Result<Option<InteractionRecord>> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .interactions
            .get(&interaction_id(item.item_id, user_id))
            .cloned())
    }

    async fn get_counters(&self, item: &ItemRef) -> Result<Option<ContentCounters>> {
        self.check_available()?;
        Ok(self.state.lock().await.counters.get(item).cloned())
    }

    async fn commit_vote(&self, write: &VoteWrite) -> Result<CommitOutcome> {
        self.check_available()?;
        let item = write.record.item();
        let mut state = self.state.lock().await;

        let counters_current = match state.counters.get(&item) {
            Some(current) => current.version == write.expected_counter_version,
            None => return Err(AppError::NotFound(format!("Item {} not found", item))),
        };
        let before = state.interactions.get(&write.record.id).cloned();
        if !counters_current || !record_matches(before.as_ref(), write.expected_record_version) {
            return Ok(CommitOutcome::Conflict);
        }

        let mut counters = write.counters.clone();
        counters.version = write.expected_counter_version + 1;
        state.counters.insert(item, counters);

        let after = stored_record(&write.record, write.expected_record_version);
        state.interactions.insert(after.id.clone(), after.clone());
        // Published under the lock so the feed preserves commit order.
        self.publish(before, Some(after));
        Ok(CommitOutcome::Committed)
    }

    async fn put_interaction(
        &self,
        record: &InteractionRecord,
        expected_version: Option<i64>,
    ) -> Result<CommitOutcome> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let before = state.interactions.get(&record.id).cloned();
        if !record_matches(before.as_ref(), expected_version) {
            return Ok(CommitOutcome::Conflict);
        }

        let after = stored_record(record, expected_version);
        state.interactions.insert(after.id.clone(), after.clone());
        self.publish(before, Some(after));
        Ok(CommitOutcome::Committed)
    }

    async fn commit_counters(
        &self,
        item: &ItemRef,
        counters: &ContentCounters,
        expected_version: i64,
    ) -> Result<CommitOutcome> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        match state.counters.get_mut(item) {
            Some(current) if current.version == expected_version => {
                *current = ContentCounters {
                    version: expected_version + 1,
                    ..counters.clone()
                };
                Ok(CommitOutcome::Committed)
            }
            Some(_) => Ok(CommitOutcome::Conflict),
            None => Err(AppError::NotFound(format!("Item {} not found", item))),
        }
    }
}
