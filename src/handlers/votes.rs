use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        BookmarkResponse, CountersResponse, InteractionRecord, InteractionResponse, ItemRef,
        ItemType, UpsertInteractionRequest, VoteOutcome, VoteRequest,
    },
    store::VoteStore,
};

fn item_ref(item_type: &str, item_id: Uuid) -> Result<ItemRef> {
    let item_type: ItemType = item_type.parse().map_err(AppError::BadRequest)?;
    Ok(ItemRef::new(item_type, item_id))
}

pub async fn cast_vote(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((item_type, item_id)): Path<(String, Uuid)>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteOutcome>> {
    let item = item_ref(&item_type, item_id)?;
    auth_user.ensure_acts_as(payload.user_id)?;

    // Rate limiting for voting
    let rate_limit_key = format!("vote:{}", auth_user.user_id);
    if !state
        .redis
        .check_rate_limit(
            &rate_limit_key,
            state.config.vote_rate_limit,
            state.config.vote_rate_window_secs,
        )
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let outcome = state
        .votes
        .cast_vote(item, auth_user.user_id, payload.direction)
        .await?;

    Ok(Json(outcome))
}

pub async fn toggle_bookmark(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((item_type, item_id)): Path<(String, Uuid)>,
) -> Result<Json<BookmarkResponse>> {
    let item = item_ref(&item_type, item_id)?;

    let record = state
        .interactions
        .toggle_bookmark(item, auth_user.user_id)
        .await?;

    Ok(Json(BookmarkResponse {
        is_bookmarked: record.is_bookmarked,
    }))
}

pub async fn get_interaction(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((item_type, item_id)): Path<(String, Uuid)>,
) -> Result<Json<InteractionResponse>> {
    let item = item_ref(&item_type, item_id)?;
    let interaction = state.interactions.get(item, auth_user.user_id).await?;

    Ok(Json(InteractionResponse { interaction }))
}

/// Record-only write; counters follow through the reactive maintainer.
pub async fn upsert_interaction(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((item_type, item_id)): Path<(String, Uuid)>,
    Json(payload): Json<UpsertInteractionRequest>,
) -> Result<Json<InteractionRecord>> {
    let item = item_ref(&item_type, item_id)?;

    let record = state
        .interactions
        .upsert_vote(item, auth_user.user_id, payload.vote_state)
        .await?;

    Ok(Json(record))
}

pub async fn get_counters(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path((item_type, item_id)): Path<(String, Uuid)>,
) -> Result<Json<CountersResponse>> {
    let item = item_ref(&item_type, item_id)?;

    let counters = state
        .store
        .get_counters(&item)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item)))?;

    Ok(Json(counters.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ref_rejects_unknown_types() {
        let id = Uuid::new_v4();
        assert_eq!(
            item_ref("promo-code", id).unwrap(),
            ItemRef::new(ItemType::PromoCode, id)
        );
        assert!(matches!(
            item_ref("story", id).unwrap_err(),
            AppError::BadRequest(_)
        ));
    }
}
