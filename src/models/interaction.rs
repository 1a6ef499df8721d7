use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    PromoCode,
    Post,
    Comment,
    Promo,
}

impl ItemType {
    /// Storage code persisted in the `item_type` column and used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::PromoCode => "PROMO_CODE",
            ItemType::Post => "POST",
            ItemType::Comment => "COMMENT",
            ItemType::Promo => "PROMO",
        }
    }

    /// Table holding the counters for this kind of item.
    pub fn table_name(&self) -> &'static str {
        match self {
            ItemType::PromoCode => "promo_codes",
            ItemType::Post => "posts",
            ItemType::Comment => "comments",
            ItemType::Promo => "promos",
        }
    }

    /// Segment used in route paths, e.g. `/api/items/promo-code/{id}/vote`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ItemType::PromoCode => "promo-code",
            ItemType::Post => "post",
            ItemType::Comment => "comment",
            ItemType::Promo => "promo",
        }
    }
}

impl FromStr for ItemType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROMO_CODE" | "promo-code" | "promo_code" => Ok(ItemType::PromoCode),
            "POST" | "post" => Ok(ItemType::Post),
            "COMMENT" | "comment" => Ok(ItemType::Comment),
            "PROMO" | "promo" => Ok(ItemType::Promo),
            _ => Err(format!("Unknown ItemType: {}", s)),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteState {
    #[default]
    None,
    Upvote,
    Downvote,
}

impl VoteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteState::None => "NONE",
            VoteState::Upvote => "UPVOTE",
            VoteState::Downvote => "DOWNVOTE",
        }
    }
}

impl FromStr for VoteState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(VoteState::None),
            "UPVOTE" => Ok(VoteState::Upvote),
            "DOWNVOTE" => Ok(VoteState::Downvote),
            _ => Err(format!("Unknown VoteState: {}", s)),
        }
    }
}

impl fmt::Display for VoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which write path produced an interaction row. The direct vote handler
/// applies its own counter delta, so the maintainer must skip `Direct` writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteOrigin {
    Direct,
    #[default]
    External,
}

impl WriteOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOrigin::Direct => "DIRECT",
            WriteOrigin::External => "EXTERNAL",
        }
    }
}

impl FromStr for WriteOrigin {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DIRECT" => Ok(WriteOrigin::Direct),
            "EXTERNAL" => Ok(WriteOrigin::External),
            _ => Err(format!("Unknown WriteOrigin: {}", s)),
        }
    }
}

/// Reference to a votable item. Components hold this, never a copy of its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    pub item_type: ItemType,
    pub item_id: Uuid,
}

impl ItemRef {
    pub fn new(item_type: ItemType, item_id: Uuid) -> Self {
        Self { item_type, item_id }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.item_type, self.item_id)
    }
}

/// Deterministic interaction key, one per (item, user).
pub fn interaction_id(item_id: Uuid, user_id: Uuid) -> String {
    format!("{}:{}", item_id, user_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub id: String,
    pub item_id: Uuid,
    pub item_type: ItemType,
    pub user_id: Uuid,
    pub vote_state: VoteState,
    pub is_bookmarked: bool,
    pub origin: WriteOrigin,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InteractionRecord {
    /// A not-yet-persisted record in its default state. Version 0 means "absent".
    pub fn new(item: ItemRef, user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: interaction_id(item.item_id, user_id),
            item_id: item.item_id,
            item_type: item.item_type,
            user_id,
            vote_state: VoteState::None,
            is_bookmarked: false,
            origin: WriteOrigin::External,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.item_type, self.item_id)
    }

    /// Version the store must currently hold for a compare-and-swap of this record.
    pub fn expected_version(&self) -> Option<i64> {
        (self.version > 0).then_some(self.version)
    }
}

/// Payload of the store's change hook. `before` is absent on create, `after` on delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionChange {
    pub before: Option<InteractionRecord>,
    pub after: Option<InteractionRecord>,
}

impl InteractionChange {
    pub fn item(&self) -> Option<ItemRef> {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .map(InteractionRecord::item)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.after.as_ref().or(self.before.as_ref()).map(|r| r.user_id)
    }

    pub fn before_state(&self) -> VoteState {
        self.before.as_ref().map(|r| r.vote_state).unwrap_or_default()
    }

    pub fn after_state(&self) -> VoteState {
        self.after.as_ref().map(|r| r.vote_state).unwrap_or_default()
    }
}
