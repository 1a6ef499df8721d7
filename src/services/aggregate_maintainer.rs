use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{
    config::EngineSettings,
    delta::{VoteDelta, delta},
    models::{InteractionChange, WriteOrigin},
    services::retry_backoff,
    store::{CommitOutcome, VoteStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The change carried neither a before nor an after image.
    Empty,
    /// The direct vote handler already applied this delta.
    OwnedByDirectHandler,
    /// Vote state did not change (bookmark toggle, idempotent upsert).
    NoVoteChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintainerOutcome {
    Applied(VoteDelta),
    Skipped(SkipReason),
    /// Best-effort path gave up; the failure was logged.
    Dropped,
}

/// Applies counter deltas for interaction writes made outside the direct vote
/// handler. Only ever writes counters, so its own effects can never re-enter it.
#[derive(Clone)]
pub struct AggregateMaintainer {
    store: Arc<dyn VoteStore>,
    settings: EngineSettings,
}

impl AggregateMaintainer {
    pub fn new(store: Arc<dyn VoteStore>, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    pub async fn handle_change(&self, change: &InteractionChange) -> MaintainerOutcome {
        let Some(item) = change.item() else {
            return MaintainerOutcome::Skipped(SkipReason::Empty);
        };

        if change
            .after
            .as_ref()
            .is_some_and(|after| after.origin == WriteOrigin::Direct)
        {
            return MaintainerOutcome::Skipped(SkipReason::OwnedByDirectHandler);
        }

        let before = change.before_state();
        let after = change.after_state();
        if before == after {
            return MaintainerOutcome::Skipped(SkipReason::NoVoteChange);
        }

        let vote_delta = delta(before, after);
        let user_id = change.user_id();
        let max_attempts = self.settings.maintainer_max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let counters = match self.store.get_counters(&item).await {
                Ok(Some(counters)) => counters,
                Ok(None) => {
                    tracing::warn!(%item, ?user_id, "Item missing, dropping counter update");
                    return MaintainerOutcome::Dropped;
                }
                Err(e) => {
                    tracing::error!(%item, ?user_id, "Failed to read counters: {}", e);
                    return MaintainerOutcome::Dropped;
                }
            };

            let next = counters.apply(vote_delta, Utc::now());
            match self
                .store
                .commit_counters(&item, &next, counters.version)
                .await
            {
                Ok(CommitOutcome::Committed) => {
                    tracing::debug!(
                        %item,
                        ?user_id,
                        %before,
                        %after,
                        upvotes = next.upvotes,
                        downvotes = next.downvotes,
                        "Counters maintained"
                    );
                    return MaintainerOutcome::Applied(vote_delta);
                }
                Ok(CommitOutcome::Conflict) => {
                    if attempt < max_attempts {
                        retry_backoff(self.settings.vote_retry_backoff, attempt).await;
                    }
                }
                Err(e) => {
                    tracing::error!(%item, ?user_id, "Failed to write counters: {}", e);
                    return MaintainerOutcome::Dropped;
                }
            }
        }

        tracing::warn!(
            %item,
            ?user_id,
            max_attempts,
            "Counter update dropped after repeated conflicts"
        );
        MaintainerOutcome::Dropped
    }

    /// Drains an in-process change feed until every sender is gone.
    pub async fn run_channel(self, mut changes: mpsc::UnboundedReceiver<InteractionChange>) {
        while let Some(change) = changes.recv().await {
            self.handle_change(&change).await;
        }
        tracing::debug!("Interaction change feed closed");
    }
}
