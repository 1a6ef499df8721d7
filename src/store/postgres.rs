//! PostgreSQL implementation of [`VoteStore`].
//!
//! Each commit runs in its own `sqlx::Transaction`. Optimistic concurrency is
//! enforced with `WHERE version = $expected` guards; a guard that matches zero
//! rows rolls the transaction back and reports a conflict.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use super::{CommitOutcome, VoteStore, VoteWrite};
use crate::{
    error::{AppError, Result},
    models::{ContentCounters, InteractionRecord, ItemRef, interaction_id},
};

#[derive(Clone)]
pub struct PgVoteStore {
    pool: PgPool,
}

impl PgVoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_counters_tx(
        tx: &mut Transaction<'_, Postgres>,
        item: &ItemRef,
        counters: &ContentCounters,
        expected_version: i64,
    ) -> Result<bool> {
        // Table name comes from a closed enum, never from input.
        let query = format!(
            r#"
            UPDATE {}
            SET upvotes = $1, downvotes = $2, vote_score = $3,
                version = version + 1, updated_at = $4
            WHERE id = $5 AND version = $6
            "#,
            item.item_type.table_name()
        );

        let result = sqlx::query(&query)
            .bind(counters.upvotes)
            .bind(counters.downvotes)
            .bind(counters.vote_score)
            .bind(counters.updated_at)
            .bind(item.item_id)
            .bind(expected_version)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn write_record_tx(
        tx: &mut Transaction<'_, Postgres>,
        record: &InteractionRecord,
        expected_version: Option<i64>,
    ) -> Result<bool> {
        let result = match expected_version {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO interactions (
                        id, item_id, item_type, user_id, vote_state, is_bookmarked,
                        origin, version, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $9)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(&record.id)
                .bind(record.item_id)
                .bind(record.item_type.as_str())
                .bind(record.user_id)
                .bind(record.vote_state.as_str())
                .bind(record.is_bookmarked)
                .bind(record.origin.as_str())
                .bind(record.created_at)
                .bind(record.updated_at)
                .execute(&mut **tx)
                .await?
            }
            Some(version) => {
                sqlx::query(
                    r#"
                    UPDATE interactions
                    SET vote_state = $1, is_bookmarked = $2, origin = $3,
                        version = version + 1, updated_at = $4
                    WHERE id = $5 AND version = $6
                    "#,
                )
                .bind(record.vote_state.as_str())
                .bind(record.is_bookmarked)
                .bind(record.origin.as_str())
                .bind(record.updated_at)
                .bind(&record.id)
                .bind(version)
                .execute(&mut **tx)
                .await?
            }
        };

        Ok(result.rows_affected() == 1)
    }
}

fn record_from_row(row: &PgRow) -> Result<InteractionRecord> {
    let parse_err = |e: String| AppError::Internal(format!("Invalid interaction row: {}", e));

    Ok(InteractionRecord {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        item_type: row
            .try_get::<String, _>("item_type")?
            .parse()
            .map_err(parse_err)?,
        user_id: row.try_get("user_id")?,
        vote_state: row
            .try_get::<String, _>("vote_state")?
            .parse()
            .map_err(parse_err)?,
        is_bookmarked: row.try_get("is_bookmarked")?,
        origin: row
            .try_get::<String, _>("origin")?
            .parse()
            .map_err(parse_err)?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn finish(tx: Transaction<'_, Postgres>, applied: bool) -> Result<CommitOutcome> {
    if applied {
        tx.commit().await?;
        Ok(CommitOutcome::Committed)
    } else {
        tx.rollback().await?;
        Ok(CommitOutcome::Conflict)
    }
}

#[async_trait]
impl VoteStore for PgVoteStore {
    async fn get_interaction(
        &self,
        item: &ItemRef,
        user_id: Uuid,
    ) -> Result<Option<InteractionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, item_id, item_type, user_id, vote_state, is_bookmarked,
                   origin, version, created_at, updated_at
            FROM interactions
            WHERE id = $1
            "#,
        )
        .bind(interaction_id(item.item_id, user_id))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn get_counters(&self, item: &ItemRef) -> Result<Option<ContentCounters>> {
        let query = format!(
            "SELECT upvotes, downvotes, vote_score, version, updated_at FROM {} WHERE id = $1",
            item.item_type.table_name()
        );

        let row = sqlx::query(&query)
            .bind(item.item_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ContentCounters {
            upvotes: row.try_get("upvotes")?,
            downvotes: row.try_get("downvotes")?,
            vote_score: row.try_get("vote_score")?,
            version: row.try_get("version")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn commit_vote(&self, write: &VoteWrite) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;
        let item = write.record.item();

        let counters_written = Self::write_counters_tx(
            &mut tx,
            &item,
            &write.counters,
            write.expected_counter_version,
        )
        .await?;
        if !counters_written {
            return finish(tx, false).await;
        }

        let record_written =
            Self::write_record_tx(&mut tx, &write.record, write.expected_record_version).await?;
        finish(tx, record_written).await
    }

    async fn put_interaction(
        &self,
        record: &InteractionRecord,
        expected_version: Option<i64>,
    ) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;
        let written = Self::write_record_tx(&mut tx, record, expected_version).await?;
        finish(tx, written).await
    }

    async fn commit_counters(
        &self,
        item: &ItemRef,
        counters: &ContentCounters,
        expected_version: i64,
    ) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;
        let written = Self::write_counters_tx(&mut tx, item, counters, expected_version).await?;
        finish(tx, written).await
    }
}
