//! Vote-state transition table.
//!
//! Every path that touches counters (the direct vote handler, the reactive
//! maintainer and the client reconciler) derives its delta from [`delta`] so
//! the three can never disagree about what a transition is worth.

use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::models::VoteState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteDelta {
    pub upvotes: i64,
    pub downvotes: i64,
}

impl VoteDelta {
    pub const ZERO: VoteDelta = VoteDelta {
        upvotes: 0,
        downvotes: 0,
    };

    pub fn new(upvotes: i64, downvotes: i64) -> Self {
        Self { upvotes, downvotes }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Add for VoteDelta {
    type Output = VoteDelta;

    fn add(self, rhs: VoteDelta) -> VoteDelta {
        VoteDelta::new(self.upvotes + rhs.upvotes, self.downvotes + rhs.downvotes)
    }
}

/// Counter change produced by moving a single user's vote from `old` to `new`.
pub fn delta(old: VoteState, new: VoteState) -> VoteDelta {
    let (upvotes, downvotes) = match (old, new) {
        (VoteState::None, VoteState::Upvote) => (1, 0),
        (VoteState::None, VoteState::Downvote) => (0, 1),
        (VoteState::Upvote, VoteState::None) => (-1, 0),
        (VoteState::Upvote, VoteState::Downvote) => (-1, 1),
        (VoteState::Downvote, VoteState::None) => (0, -1),
        (VoteState::Downvote, VoteState::Upvote) => (1, -1),
        (VoteState::None, VoteState::None)
        | (VoteState::Upvote, VoteState::Upvote)
        | (VoteState::Downvote, VoteState::Downvote) => (0, 0),
    };

    VoteDelta { upvotes, downvotes }
}

/// Repeating the current direction toggles the vote off.
pub fn effective_state(current: VoteState, requested: VoteState) -> VoteState {
    if requested == current {
        VoteState::None
    } else {
        requested
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Added,
    Removed,
    Switched,
}

impl VoteAction {
    pub fn classify(old: VoteState, new: VoteState) -> Self {
        match (old, new) {
            (_, VoteState::None) => VoteAction::Removed,
            (VoteState::None, _) => VoteAction::Added,
            _ => VoteAction::Switched,
        }
    }
}
