use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    delta::VoteAction,
    models::{ContentCounters, InteractionRecord, ItemRef, VoteState},
};

// Vote request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub direction: VoteState,
    /// Must match the authenticated caller when present.
    pub user_id: Option<Uuid>,
}

// Authoritative result of a direct vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub action: VoteAction,
    pub new_upvotes: i64,
    pub new_downvotes: i64,
    pub vote_score: i64,
    pub vote_state: VoteState,
}

impl VoteOutcome {
    pub fn new(action: VoteAction, vote_state: VoteState, counters: &ContentCounters) -> Self {
        Self {
            action,
            new_upvotes: counters.upvotes,
            new_downvotes: counters.downvotes,
            vote_score: counters.vote_score,
            vote_state,
        }
    }
}

// Record-store upsert (bypasses the direct handler)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertInteractionRequest {
    pub vote_state: VoteState,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkResponse {
    pub is_bookmarked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResponse {
    pub interaction: Option<InteractionRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountersResponse {
    pub upvotes: i64,
    pub downvotes: i64,
    pub vote_score: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<ContentCounters> for CountersResponse {
    fn from(counters: ContentCounters) -> Self {
        Self {
            upvotes: counters.upvotes,
            downvotes: counters.downvotes,
            vote_score: counters.vote_score,
            updated_at: counters.updated_at,
        }
    }
}

/// Client-side request to move a user's vote on an item. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteIntent {
    pub item: ItemRef,
    pub user_id: Uuid,
    pub direction: VoteState,
}

impl VoteIntent {
    pub fn new(item: ItemRef, user_id: Uuid, direction: VoteState) -> Self {
        Self {
            item,
            user_id,
            direction,
        }
    }
}
