//! Persistence seam for interaction records and content counters.
//!
//! All writes are compare-and-swap against a `version` column: a commit whose
//! expected versions are stale returns [`CommitOutcome::Conflict`] and writes
//! nothing, leaving the caller to re-read and retry.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{ContentCounters, InteractionRecord, ItemRef},
};

pub use memory::MemoryVoteStore;
pub use postgres::PgVoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    Conflict,
}

/// A vote and the counter update it implies, committed atomically.
#[derive(Debug, Clone)]
pub struct VoteWrite {
    pub record: InteractionRecord,
    /// `None` when the record does not exist yet.
    pub expected_record_version: Option<i64>,
    pub counters: ContentCounters,
    pub expected_counter_version: i64,
}

#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn get_interaction(
        &self,
        item: &ItemRef,
        user_id: Uuid,
    ) -> Result<Option<InteractionRecord>>;

    /// `None` when the item itself does not exist.
    async fn get_counters(&self, item: &ItemRef) -> Result<Option<ContentCounters>>;

    /// Writes the record and the item counters in one transaction.
    async fn commit_vote(&self, write: &VoteWrite) -> Result<CommitOutcome>;

    /// Writes only the record. Counter maintenance for such writes belongs to
    /// the reactive maintainer.
    async fn put_interaction(
        &self,
        record: &InteractionRecord,
        expected_version: Option<i64>,
    ) -> Result<CommitOutcome>;

    /// Writes only the counters of `item`.
    async fn commit_counters(
        &self,
        item: &ItemRef,
        counters: &ContentCounters,
        expected_version: i64,
    ) -> Result<CommitOutcome>;
}
