#![allow(dead_code)]

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use vote_engine::config::EngineSettings;
use vote_engine::models::{ContentCounters, ItemRef, ItemType};
use vote_engine::store::{MemoryVoteStore, VoteStore};

pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        vote_retry_backoff: Duration::from_millis(1),
        ..EngineSettings::default()
    }
}

pub async fn seeded_item(store: &MemoryVoteStore, upvotes: i64, downvotes: i64) -> ItemRef {
    let item = ItemRef::new(ItemType::PromoCode, Uuid::new_v4());
    store
        .insert_item(item, ContentCounters::seeded(upvotes, downvotes, Utc::now()))
        .await;
    item
}

pub async fn counts(store: &Arc<MemoryVoteStore>, item: &ItemRef) -> (i64, i64) {
    let counters = store
        .get_counters(item)
        .await
        .expect("store read")
        .expect("item exists");
    assert!(counters.is_consistent(), "inconsistent counters: {:?}", counters);
    (counters.upvotes, counters.downvotes)
}
