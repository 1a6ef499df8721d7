use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::EngineSettings,
    error::{AppError, Result},
    models::{InteractionRecord, ItemRef, VoteState, WriteOrigin},
    services::retry_backoff,
    store::{CommitOutcome, VoteStore},
};

/// Record-level operations on the per-user interaction fact.
///
/// Nothing here touches counters. Vote changes written through this service
/// are marked `EXTERNAL` and picked up by the reactive maintainer.
#[derive(Clone)]
pub struct InteractionService {
    store: Arc<dyn VoteStore>,
    settings: EngineSettings,
}

impl InteractionService {
    pub fn new(store: Arc<dyn VoteStore>, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    pub async fn get(&self, item: ItemRef, user_id: Uuid) -> Result<Option<InteractionRecord>> {
        self.store.get_interaction(&item, user_id).await
    }

    /// Sets the vote state to `desired`. Writing the state the record already
    /// holds only refreshes `updated_at`.
    pub async fn upsert_vote(
        &self,
        item: ItemRef,
        user_id: Uuid,
        desired: VoteState,
    ) -> Result<InteractionRecord> {
        self.mutate(item, user_id, |record| record.vote_state = desired)
            .await
    }

    pub async fn toggle_bookmark(&self, item: ItemRef, user_id: Uuid) -> Result<InteractionRecord> {
        self.mutate(item, user_id, |record| {
            record.is_bookmarked = !record.is_bookmarked
        })
        .await
    }

    async fn mutate<F>(&self, item: ItemRef, user_id: Uuid, apply: F) -> Result<InteractionRecord>
    where
        F: Fn(&mut InteractionRecord) + Send + Sync,
    {
        if self.store.get_counters(&item).await?.is_none() {
            return Err(AppError::NotFound(format!("Item {} not found", item)));
        }

        let max_attempts = self.settings.vote_max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let now = Utc::now();
            let mut record = self
                .store
                .get_interaction(&item, user_id)
                .await?
                .unwrap_or_else(|| InteractionRecord::new(item, user_id, now));

            let expected = record.expected_version();
            apply(&mut record);
            record.origin = WriteOrigin::External;
            record.updated_at = now;

            match self.store.put_interaction(&record, expected).await? {
                CommitOutcome::Committed => {
                    record.version = expected.map_or(1, |v| v + 1);
                    return Ok(record);
                }
                CommitOutcome::Conflict => {
                    tracing::debug!(%item, %user_id, attempt, "Interaction write conflicted, retrying");
                    if attempt < max_attempts {
                        retry_backoff(self.settings.vote_retry_backoff, attempt).await;
                    }
                }
            }
        }

        Err(AppError::ConflictExhausted {
            attempts: max_attempts,
        })
    }
}
