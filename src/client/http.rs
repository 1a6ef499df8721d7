use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{ClientError, VoteTransport};
use crate::{
    error::ErrorCode,
    models::{VoteIntent, VoteOutcome, VoteRequest},
};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: ErrorCode,
}

/// Calls the vote endpoint over HTTP with a bearer token.
#[derive(Clone)]
pub struct HttpVoteClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpVoteClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn vote_url(&self, intent: &VoteIntent) -> String {
        format!(
            "{}/api/items/{}/{}/vote",
            self.base_url,
            intent.item.item_type.path_segment(),
            intent.item.item_id
        )
    }
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::CONFLICT => ErrorCode::ConflictExhausted,
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthenticated,
        StatusCode::FORBIDDEN => ErrorCode::Permission,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
        StatusCode::BAD_REQUEST => ErrorCode::BadRequest,
        s if s == StatusCode::SERVICE_UNAVAILABLE || s == StatusCode::GATEWAY_TIMEOUT => {
            ErrorCode::Unavailable
        }
        _ => ErrorCode::Internal,
    }
}

#[async_trait]
impl VoteTransport for HttpVoteClient {
    async fn cast_vote(&self, intent: &VoteIntent) -> Result<VoteOutcome, ClientError> {
        let response = self
            .http
            .post(self.vote_url(intent))
            .bearer_auth(&self.token)
            .json(&VoteRequest {
                direction: intent.direction,
                user_id: Some(intent.user_id),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<VoteOutcome>()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()));
        }

        let body = response.text().await?;
        let error = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => ClientError::Server {
                code: parsed.code,
                message: parsed.error,
            },
            Err(_) => ClientError::Server {
                code: code_for_status(status),
                message: format!("HTTP {}", status.as_u16()),
            },
        };

        tracing::debug!(item = %intent.item, %status, "Vote request failed: {}", error);
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemRef, ItemType, VoteState};
    use uuid::Uuid;

    #[test]
    fn vote_url_uses_path_segment() {
        let client = HttpVoteClient::new("http://localhost:3000/", "token");
        let item_id = Uuid::new_v4();
        let intent = VoteIntent::new(
            ItemRef::new(ItemType::PromoCode, item_id),
            Uuid::new_v4(),
            VoteState::Upvote,
        );

        assert_eq!(
            client.vote_url(&intent),
            format!("http://localhost:3000/api/items/promo-code/{}/vote", item_id)
        );
    }

    #[test]
    fn status_fallback_keeps_retryability() {
        assert!(code_for_status(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(code_for_status(StatusCode::CONFLICT).is_retryable());
        assert!(!code_for_status(StatusCode::NOT_FOUND).is_retryable());
    }
}
