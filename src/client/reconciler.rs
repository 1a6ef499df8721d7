//! Optimistic vote reconciliation.
//!
//! Per (item, user) the reconciler moves through `Idle -> Voting ->
//! {Committed | RolledBack} -> Idle`. Entering `Voting` applies the
//! transition-table delta to the displayed counts at once and snapshots the
//! previous view. The server's answer then either replaces the optimistic view
//! wholesale or the snapshot is restored exactly. While a request is in flight
//! further intents for the same pair are ignored, so a slow response can never
//! race a second tap.
//!
//! Dropping a `vote` future before the answer arrives (a timeout, `select!`,
//! an unmounted view) counts as a failure: the snapshot is restored and the
//! entry returns to `Idle`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ClientError, VoteTransport};
use crate::{
    delta::{delta, effective_state},
    models::{ItemRef, VoteIntent, VoteOutcome, VoteState},
};

/// What the UI renders for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayedVote {
    pub upvotes: i64,
    pub downvotes: i64,
    pub vote_score: i64,
    pub vote_state: VoteState,
}

impl DisplayedVote {
    pub fn new(upvotes: i64, downvotes: i64, vote_state: VoteState) -> Self {
        Self {
            upvotes,
            downvotes,
            vote_score: upvotes - downvotes,
            vote_state,
        }
    }

    /// Local guess at the server's answer to `requested`.
    pub fn predict(&self, requested: VoteState) -> Self {
        let new_state = effective_state(self.vote_state, requested);
        let change = delta(self.vote_state, new_state);

        Self::new(
            (self.upvotes + change.upvotes).max(0),
            (self.downvotes + change.downvotes).max(0),
            new_state,
        )
    }
}

impl From<&VoteOutcome> for DisplayedVote {
    fn from(outcome: &VoteOutcome) -> Self {
        Self {
            upvotes: outcome.new_upvotes,
            downvotes: outcome.new_downvotes,
            vote_score: outcome.vote_score,
            vote_state: outcome.vote_state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VotePhase {
    #[default]
    Idle,
    Voting,
    Committed,
    RolledBack,
}

impl VotePhase {
    fn can_transition_to(self, next: VotePhase) -> bool {
        matches!(
            (self, next),
            (VotePhase::Idle, VotePhase::Voting)
                | (VotePhase::Voting, VotePhase::Committed)
                | (VotePhase::Voting, VotePhase::RolledBack)
                | (VotePhase::Committed, VotePhase::Idle)
                | (VotePhase::RolledBack, VotePhase::Idle)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The server's authoritative view, now displayed.
    Committed(DisplayedVote),
    /// Another request for this item was still in flight; nothing changed.
    Ignored,
}

#[derive(Debug, Default)]
struct Entry {
    displayed: DisplayedVote,
    phase: VotePhase,
    snapshot: Option<DisplayedVote>,
}

impl Entry {
    fn transition(&mut self, key: &EntryKey, next: VotePhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal vote phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::trace!(item = %key.0, user_id = %key.1, from = ?self.phase, to = ?next, "Vote phase");
        self.phase = next;
    }

    /// Restores the snapshot of a vote whose answer will never be seen.
    fn abandon(&mut self, key: &EntryKey) {
        if self.phase != VotePhase::Voting {
            return;
        }
        if let Some(snapshot) = self.snapshot.take() {
            self.displayed = snapshot;
        }
        self.transition(key, VotePhase::RolledBack);
        self.transition(key, VotePhase::Idle);
        tracing::warn!(item = %key.0, user_id = %key.1, "Vote abandoned before settling, rolled back");
    }
}

type EntryKey = (ItemRef, Uuid);
type Entries = Arc<Mutex<HashMap<EntryKey, Entry>>>;

/// Armed between `begin` and `settle`; rolls the entry back if dropped armed.
struct InFlight {
    entries: Entries,
    key: EntryKey,
    armed: bool,
}

impl InFlight {
    fn new(entries: Entries, key: EntryKey) -> Self {
        Self {
            entries,
            key,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let key = self.key;
        if let Ok(mut entries) = self.entries.try_lock() {
            if let Some(entry) = entries.get_mut(&key) {
                entry.abandon(&key);
            }
            return;
        }

        // Lock is busy; no new vote can start for this pair until the rollback lands.
        let entries = self.entries.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Some(entry) = entries.lock().await.get_mut(&key) {
                        entry.abandon(&key);
                    }
                });
            }
            Err(_) => {
                tracing::error!(item = %key.0, user_id = %key.1, "No runtime to roll back abandoned vote");
            }
        }
    }
}

pub struct VoteReconciler<T> {
    transport: T,
    entries: Entries,
}

impl<T: VoteTransport> VoteReconciler<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seeds the displayed view, e.g. from a feed load. Ignored while a vote is in flight.
    pub async fn track(&self, item: ItemRef, user_id: Uuid, displayed: DisplayedVote) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry((item, user_id)).or_default();
        if entry.phase == VotePhase::Idle {
            entry.displayed = displayed;
        }
    }

    pub async fn displayed(&self, item: ItemRef, user_id: Uuid) -> Option<DisplayedVote> {
        self.entries
            .lock()
            .await
            .get(&(item, user_id))
            .map(|entry| entry.displayed)
    }

    pub async fn phase(&self, item: ItemRef, user_id: Uuid) -> VotePhase {
        self.entries
            .lock()
            .await
            .get(&(item, user_id))
            .map(|entry| entry.phase)
            .unwrap_or_default()
    }

    /// Applies `intent` optimistically, sends it, and reconciles with the answer.
    ///
    /// On failure the pre-intent view is restored and the error returned.
    /// Cancel safe: dropping the future before it resolves also rolls back.
    pub async fn vote(&self, intent: VoteIntent) -> Result<Settlement, ClientError> {
        if !self.begin(&intent).await {
            tracing::debug!(item = %intent.item, "Vote already in flight, ignoring intent");
            return Ok(Settlement::Ignored);
        }

        let in_flight = InFlight::new(self.entries.clone(), (intent.item, intent.user_id));
        let result = self.transport.cast_vote(&intent).await;
        let settled = self.settle(&intent, result).await;
        in_flight.disarm();

        settled.map(Settlement::Committed)
    }

    async fn begin(&self, intent: &VoteIntent) -> bool {
        let key = (intent.item, intent.user_id);
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key).or_default();

        if entry.phase != VotePhase::Idle {
            return false;
        }

        entry.snapshot = Some(entry.displayed);
        entry.displayed = entry.displayed.predict(intent.direction);
        entry.transition(&key, VotePhase::Voting);
        true
    }

    async fn settle(
        &self,
        intent: &VoteIntent,
        result: Result<VoteOutcome, ClientError>,
    ) -> Result<DisplayedVote, ClientError> {
        let key = (intent.item, intent.user_id);
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key).or_default();

        let snapshot = entry.snapshot.take().unwrap_or(entry.displayed);

        let settled = match result {
            Ok(outcome) => {
                entry.transition(&key, VotePhase::Committed);
                entry.displayed = DisplayedVote::from(&outcome);
                Ok(entry.displayed)
            }
            Err(e) => {
                entry.transition(&key, VotePhase::RolledBack);
                entry.displayed = snapshot;
                tracing::warn!(item = %intent.item, retryable = e.is_retryable(), "Vote rolled back: {}", e);
                Err(e)
            }
        };

        entry.transition(&key, VotePhase::Idle);
        settled
    }
}
