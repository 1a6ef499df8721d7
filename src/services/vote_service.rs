use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::EngineSettings,
    delta::{VoteAction, delta, effective_state},
    error::{AppError, Result},
    models::{InteractionRecord, ItemRef, VoteOutcome, VoteState, WriteOrigin},
    services::retry_backoff,
    store::{CommitOutcome, VoteStore, VoteWrite},
};

/// Synchronous vote toggle: updates the caller's interaction record and the
/// item counters in one commit and returns the authoritative counts.
#[derive(Clone)]
pub struct VoteService {
    store: Arc<dyn VoteStore>,
    settings: EngineSettings,
}

impl VoteService {
    pub fn new(store: Arc<dyn VoteStore>, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    /// Cast `requested` for `user_id` on `item`.
    ///
    /// Repeating the current direction removes the vote. Each attempt re-reads
    /// the record and counters and commits against the versions it read; a
    /// concurrent writer makes the commit conflict and the attempt is retried,
    /// up to `vote_max_attempts` times.
    pub async fn cast_vote(
        &self,
        item: ItemRef,
        user_id: Uuid,
        requested: VoteState,
    ) -> Result<VoteOutcome> {
        let max_attempts = self.settings.vote_max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let counters = self
                .store
                .get_counters(&item)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item)))?;

            let now = Utc::now();
            let current = self
                .store
                .get_interaction(&item, user_id)
                .await?
                .unwrap_or_else(|| InteractionRecord::new(item, user_id, now));

            let old_state = current.vote_state;
            let new_state = effective_state(old_state, requested);
            let action = VoteAction::classify(old_state, new_state);
            let next_counters = counters.apply(delta(old_state, new_state), now);

            let expected_record_version = current.expected_version();
            let record = InteractionRecord {
                vote_state: new_state,
                origin: WriteOrigin::Direct,
                updated_at: now,
                ..current
            };

            let write = VoteWrite {
                record,
                expected_record_version,
                counters: next_counters,
                expected_counter_version: counters.version,
            };

            match self.store.commit_vote(&write).await? {
                CommitOutcome::Committed => {
                    tracing::debug!(
                        %item,
                        %user_id,
                        ?action,
                        upvotes = write.counters.upvotes,
                        downvotes = write.counters.downvotes,
                        attempt,
                        "Vote committed"
                    );
                    return Ok(VoteOutcome::new(action, new_state, &write.counters));
                }
                CommitOutcome::Conflict => {
                    tracing::debug!(%item, %user_id, attempt, "Vote commit conflicted, retrying");
                    if attempt < max_attempts {
                        retry_backoff(self.settings.vote_retry_backoff, attempt).await;
                    }
                }
            }
        }

        tracing::warn!(%item, %user_id, max_attempts, "Vote retries exhausted");
        Err(AppError::ConflictExhausted {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentCounters, ItemType};
    use crate::store::MemoryVoteStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store that always loses the race on commit.
    struct AlwaysConflicting {
        inner: MemoryVoteStore,
        commits: AtomicU32,
    }

    #[async_trait]
    impl VoteStore for AlwaysConflicting {
        async fn get_interaction(
            &self,
            item: &ItemRef,
            user_id: Uuid,
        ) -> Result<Option<InteractionRecord>> {
            self.inner.get_interaction(item, user_id).await
        }

        async fn get_counters(&self, item: &ItemRef) -> Result<Option<ContentCounters>> {
            self.inner.get_counters(item).await
        }

        async fn commit_vote(&self, _write: &VoteWrite) -> Result<CommitOutcome> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(CommitOutcome::Conflict)
        }

        async fn put_interaction(
            &self,
            record: &InteractionRecord,
            expected_version: Option<i64>,
        ) -> Result<CommitOutcome> {
            self.inner.put_interaction(record, expected_version).await
        }

        async fn commit_counters(
            &self,
            item: &ItemRef,
            counters: &ContentCounters,
            expected_version: i64,
        ) -> Result<CommitOutcome> {
            self.inner
                .commit_counters(item, counters, expected_version)
                .await
        }
    }

    fn fast_settings(attempts: u32) -> EngineSettings {
        EngineSettings {
            vote_max_attempts: attempts,
            vote_retry_backoff: std::time::Duration::ZERO,
            ..EngineSettings::default()
        }
    }

    #[tokio::test]
    async fn test_conflicts_exhaust_after_bounded_attempts() {
        let item = ItemRef::new(ItemType::Post, Uuid::new_v4());
        let inner = MemoryVoteStore::new();
        inner.insert_item(item, ContentCounters::zero(Utc::now())).await;
        let store = Arc::new(AlwaysConflicting {
            inner,
            commits: AtomicU32::new(0),
        });

        let service = VoteService::new(store.clone(), fast_settings(4));
        let err = service
            .cast_vote(item, Uuid::new_v4(), VoteState::Upvote)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ConflictExhausted { attempts: 4 }));
        assert!(err.is_retryable());
        assert_eq!(store.commits.load(Ordering::SeqCst), 4);

        let counters = store.get_counters(&item).await.unwrap().unwrap();
        assert_eq!((counters.upvotes, counters.downvotes), (0, 0));
    }

    #[tokio::test]
    async fn test_missing_item_is_not_found() {
        let service = VoteService::new(Arc::new(MemoryVoteStore::new()), fast_settings(3));
        let item = ItemRef::new(ItemType::Comment, Uuid::new_v4());

        let err = service
            .cast_vote(item, Uuid::new_v4(), VoteState::Downvote)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_direct_writes_are_marked_direct() {
        let store = Arc::new(MemoryVoteStore::new());
        let item = ItemRef::new(ItemType::PromoCode, Uuid::new_v4());
        store.insert_item(item, ContentCounters::zero(Utc::now())).await;
        let user_id = Uuid::new_v4();

        let service = VoteService::new(store.clone(), fast_settings(3));
        service
            .cast_vote(item, user_id, VoteState::Upvote)
            .await
            .unwrap();

        let record = store.get_interaction(&item, user_id).await.unwrap().unwrap();
        assert_eq!(record.origin, WriteOrigin::Direct);
        assert_eq!(record.vote_state, VoteState::Upvote);
        assert_eq!(record.version, 1);
    }
}
