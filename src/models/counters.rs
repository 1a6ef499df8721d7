use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delta::VoteDelta;

/// Denormalized vote counters stored on every votable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCounters {
    pub upvotes: i64,
    pub downvotes: i64,
    pub vote_score: i64,
    #[serde(skip)]
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl ContentCounters {
    pub fn zero(now: DateTime<Utc>) -> Self {
        Self::seeded(0, 0, now)
    }

    pub fn seeded(upvotes: i64, downvotes: i64, now: DateTime<Utc>) -> Self {
        Self {
            upvotes,
            downvotes,
            vote_score: upvotes - downvotes,
            version: 1,
            updated_at: now,
        }
    }

    /// Counters after applying `delta`, clamped at zero with the score recomputed.
    /// The returned value keeps the current version so the store can use it as
    /// the compare-and-swap expectation.
    pub fn apply(&self, delta: VoteDelta, now: DateTime<Utc>) -> Self {
        let raw_up = self.upvotes + delta.upvotes;
        let raw_down = self.downvotes + delta.downvotes;

        if raw_up < 0 || raw_down < 0 {
            tracing::warn!(
                upvotes = self.upvotes,
                downvotes = self.downvotes,
                delta_up = delta.upvotes,
                delta_down = delta.downvotes,
                "Counter clamp fired; stored counters were already inconsistent"
            );
        }

        let upvotes = raw_up.max(0);
        let downvotes = raw_down.max(0);

        Self {
            upvotes,
            downvotes,
            vote_score: upvotes - downvotes,
            version: self.version,
            updated_at: now,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.upvotes >= 0 && self.downvotes >= 0 && self.vote_score == self.upvotes - self.downvotes
    }
}
