//! Client half of the engine: a transport to the vote endpoint and the
//! optimistic reconciler that drives displayed counts.

pub mod http;
pub mod reconciler;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    error::ErrorCode,
    models::{VoteIntent, VoteOutcome},
};

pub use http::HttpVoteClient;
pub use reconciler::{DisplayedVote, Settlement, VotePhase, VoteReconciler};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Vote rejected ({code:?}): {message}")]
    Server { code: ErrorCode, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid server response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether the UI may offer a retry affordance.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Server { code, .. } => code.is_retryable(),
            ClientError::Transport(_) => true,
            ClientError::Decode(_) => false,
        }
    }
}

#[async_trait]
pub trait VoteTransport: Send + Sync {
    async fn cast_vote(&self, intent: &VoteIntent) -> Result<VoteOutcome, ClientError>;
}

#[async_trait]
impl<T: VoteTransport + ?Sized> VoteTransport for std::sync::Arc<T> {
    async fn cast_vote(&self, intent: &VoteIntent) -> Result<VoteOutcome, ClientError> {
        (**self).cast_vote(intent).await
    }
}
