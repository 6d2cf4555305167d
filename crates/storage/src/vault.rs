//! Queries over the `vault_entries` table.
//!
//! Timestamps are unix seconds supplied by the caller; an entry is live while
//! `expires_at > now`.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct VaultRow {
    pub session_id: String,
    pub placeholder: String,
    pub original: String,
    pub entity: String,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Claims `(session_id, placeholder)` for this mapping.
///
/// An expired row with the same key is taken over; a live one is left alone
/// and `false` is returned so the caller can try another placeholder.
pub async fn insert(pool: &SqlitePool, row: &VaultRow) -> anyhow::Result<bool> {
    let res = sqlx::query(
        "INSERT INTO vault_entries
            (session_id, placeholder, original, entity, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(session_id, placeholder) DO UPDATE SET
            original = excluded.original,
            entity = excluded.entity,
            created_at = excluded.created_at,
            expires_at = excluded.expires_at
         WHERE vault_entries.expires_at <= excluded.created_at",
    )
    .bind(&row.session_id)
    .bind(&row.placeholder)
    .bind(&row.original)
    .bind(&row.entity)
    .bind(row.created_at)
    .bind(row.expires_at)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn find_by_original(
    pool: &SqlitePool,
    session_id: &str,
    original: &str,
    entity: &str,
    now: i64,
) -> anyhow::Result<Option<VaultRow>> {
    let row = sqlx::query_as::<_, VaultRow>(
        "SELECT * FROM vault_entries
         WHERE session_id = ?1 AND original = ?2 AND entity = ?3 AND expires_at > ?4
         ORDER BY created_at DESC
         LIMIT 1",
    )
    .bind(session_id)
    .bind(original)
    .bind(entity)
    .bind(now)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn session_entries(
    pool: &SqlitePool,
    session_id: &str,
    now: i64,
) -> anyhow::Result<Vec<VaultRow>> {
    let rows = sqlx::query_as::<_, VaultRow>(
        "SELECT * FROM vault_entries
         WHERE session_id = ?1 AND expires_at > ?2
         ORDER BY LENGTH(placeholder) DESC",
    )
    .bind(session_id)
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn purge_expired(pool: &SqlitePool, now: i64) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM vault_entries WHERE expires_at <= ?1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn count(pool: &SqlitePool) -> anyhow::Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vault_entries")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Evicts the oldest rows until at most `max_entries` remain.
pub async fn evict_oldest(pool: &SqlitePool, max_entries: u64) -> anyhow::Result<u64> {
    let total = count(pool).await?;
    let excess = total - max_entries as i64;
    if excess <= 0 {
        return Ok(0);
    }
    let res = sqlx::query(
        "DELETE FROM vault_entries WHERE rowid IN (
            SELECT rowid FROM vault_entries ORDER BY created_at ASC, rowid ASC LIMIT ?1
         )",
    )
    .bind(excess)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub async fn clear(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM vault_entries").execute(pool).await?;
    Ok(())
}
