use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, postgres::PgListener};
use tokio::time::{Duration, sleep};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{InteractionChange, InteractionRecord, ItemType, VoteState, WriteOrigin},
    services::aggregate_maintainer::AggregateMaintainer,
};

/// Row image as emitted by `row_to_json` in the `interactions` trigger.
#[derive(Debug, Deserialize)]
struct StoredInteraction {
    id: String,
    item_id: Uuid,
    item_type: ItemType,
    user_id: Uuid,
    vote_state: VoteState,
    is_bookmarked: bool,
    origin: WriteOrigin,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoredInteraction> for InteractionRecord {
    fn from(row: StoredInteraction) -> Self {
        Self {
            id: row.id,
            item_id: row.item_id,
            item_type: row.item_type,
            user_id: row.user_id,
            vote_state: row.vote_state,
            is_bookmarked: row.is_bookmarked,
            origin: row.origin,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    before: Option<StoredInteraction>,
    after: Option<StoredInteraction>,
}

pub fn decode_change(payload: &str) -> Result<InteractionChange> {
    let raw: ChangePayload = serde_json::from_str(payload)
        .map_err(|e| AppError::BadRequest(format!("Invalid change payload: {}", e)))?;

    Ok(InteractionChange {
        before: raw.before.map(Into::into),
        after: raw.after.map(Into::into),
    })
}

/// Channel hardcoded in `notify_interaction_change()` in the migrations.
pub const TRIGGER_CHANNEL: &str = "interaction_changes";

/// Whether `channel` is the one the `interactions` trigger notifies. Warns if not,
/// since a listener on any other channel never receives a change.
pub fn is_trigger_channel(channel: &str) -> bool {
    if channel == TRIGGER_CHANNEL {
        return true;
    }
    tracing::warn!(
        channel,
        trigger_channel = TRIGGER_CHANNEL,
        "Interaction channel differs from the trigger's; counters will not be maintained"
    );
    false
}

/// Feeds Postgres `NOTIFY` events from the `interactions` trigger into the maintainer.
pub struct ChangeListener {
    db: PgPool,
    channel: String,
    maintainer: AggregateMaintainer,
}

impl ChangeListener {
    pub fn new(db: PgPool, channel: String, maintainer: AggregateMaintainer) -> Self {
        Self {
            db,
            channel,
            maintainer,
        }
    }

    /// Start listening in a background task
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        is_trigger_channel(&self.channel);

        tokio::spawn(async move {
            loop {
                if let Err(e) = self.listen().await {
                    tracing::error!("Interaction change listener failed: {}", e);
                }
                sleep(Duration::from_secs(5)).await;
            }
        })
    }

    async fn listen(&self) -> Result<()> {
        let mut listener = PgListener::connect_with(&self.db).await?;
        listener.listen(&self.channel).await?;
        tracing::info!("Listening for interaction changes on '{}'", self.channel);

        loop {
            let notification = listener.recv().await?;
            match decode_change(notification.payload()) {
                Ok(change) => {
                    self.maintainer.handle_change(&change).await;
                }
                Err(e) => {
                    tracing::warn!("Dropping undecodable interaction change: {}", e);
                }
            }
        }
    }
}
