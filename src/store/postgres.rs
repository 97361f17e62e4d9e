//! PostgreSQL rank store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Schema
//!
//! The store owns the `rankings` and `comparisons` tables (see the
//! `*_TABLE_SCHEMA` constants). The `books` table belongs to the catalog
//! collaborator; only `id`, `title` and `author` are read from it.
//! Star ratings are stored as integer half-steps (`half_stars`) so that
//! star-group equality is exact.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use super::{RankStore, RankTx};
use crate::types::{
    BookId, ComparisonOutcome, ComparisonRecord, RankedBook, RankingEntry, RebuildRow, Stars,
    StarsError, UserId,
};

/// Schema for the rankings table.
pub const RANKINGS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS rankings (
    user_id BIGINT NOT NULL,
    book_id BIGINT NOT NULL,
    rank_position INTEGER NOT NULL DEFAULT 0,
    half_stars SMALLINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (user_id, book_id)
)
"#;

/// Position index for range scans and shifts.
pub const RANKINGS_POSITION_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_rankings_user_position
    ON rankings (user_id, rank_position)
"#;

/// Schema for the comparisons audit table.
pub const COMPARISONS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS comparisons (
    id BIGSERIAL PRIMARY KEY,
    book_a_id BIGINT NOT NULL,
    book_b_id BIGINT NOT NULL,
    winner_id BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// Per-book lookup index for the comparison log.
pub const COMPARISONS_BOOKS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_comparisons_books
    ON comparisons (book_a_id, book_b_id)
"#;

/// One entry plus the user's placed count, shared by pool and
/// transaction reads.
const ENTRY_WITH_TOTAL_SQL: &str = r#"
SELECT user_id, book_id, rank_position, half_stars, updated_at,
       (SELECT COUNT(*) FROM rankings r2
        WHERE r2.user_id = $1 AND r2.rank_position > 0) AS total_ranked
FROM rankings
WHERE user_id = $1 AND book_id = $2
"#;

/// Configuration for PostgreSQL connection pool.
///
/// Production defaults balance concurrency with connection limits;
/// timeouts are aggressive to fail fast, and max lifetime forces
/// periodic reconnection for health.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/shelfrank".to_string()),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            max_lifetime_secs: std::env::var("DB_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Error type for the PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Row carried a star value off the half-step grid.
    #[error("Invalid star value in rankings row: {0}")]
    InvalidStars(#[from] StarsError),
}

/// PostgreSQL rank store.
///
/// Uses connection pooling with production-tuned settings. Mutations run
/// through [`PostgresTx`], one database transaction per engine operation.
pub struct PostgresRankStore {
    pool: PgPool,
}

impl PostgresRankStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, PostgresError> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, PostgresError> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Create the tables and indexes this store owns.
    pub async fn initialize_schema(&self) -> Result<(), PostgresError> {
        for statement in [
            RANKINGS_TABLE_SCHEMA,
            RANKINGS_POSITION_INDEX,
            COMPARISONS_TABLE_SCHEMA,
            COMPARISONS_BOOKS_INDEX,
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Ranking schema initialized");
        Ok(())
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Parse a ranking entry from a database row.
    fn parse_entry_row(row: &PgRow) -> Result<RankingEntry, PostgresError> {
        let user_id: i64 = row.try_get("user_id")?;
        let book_id: i64 = row.try_get("book_id")?;
        let position: i32 = row.try_get("rank_position")?;
        let half_stars: i16 = row.try_get("half_stars")?;
        let updated_at: chrono::DateTime<chrono::Utc> = row.try_get("updated_at")?;

        Ok(RankingEntry::new(
            UserId::new(user_id),
            BookId::new(book_id),
            position.max(0) as u32,
            stars_from_db(half_stars)?,
            updated_at,
        ))
    }
}

/// Convert a stored half-step column to a star value.
fn stars_from_db(half_stars: i16) -> Result<Stars, StarsError> {
    let raw = u8::try_from(half_stars)
        .map_err(|_| StarsError::OutOfRange(half_stars as f32 / 2.0))?;
    Stars::from_half_steps(raw)
}

#[async_trait]
impl RankStore for PostgresRankStore {
    type Error = PostgresError;
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<Self::Tx, Self::Error> {
        Ok(PostgresTx {
            tx: self.pool.begin().await?,
        })
    }

    async fn ranked_books(&self, user_id: UserId) -> Result<Vec<RankedBook>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT r.book_id, b.title, b.author, r.rank_position, r.half_stars
            FROM rankings r
            JOIN books b ON b.id = r.book_id
            WHERE r.user_id = $1 AND r.rank_position > 0
            ORDER BY r.rank_position
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let book_id: i64 = row.try_get("book_id")?;
                let title: String = row.try_get("title")?;
                let author: String = row.try_get("author")?;
                let position: i32 = row.try_get("rank_position")?;
                let half_stars: i16 = row.try_get("half_stars")?;
                Ok(RankedBook {
                    book_id: BookId::new(book_id),
                    title,
                    author,
                    position: position.max(0) as u32,
                    stars: stars_from_db(half_stars)?,
                })
            })
            .collect()
    }

    async fn entry_with_total(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<(RankingEntry, u32)>, Self::Error> {
        let row = sqlx::query(ENTRY_WITH_TOTAL_SQL)
            .bind(user_id.as_i64())
            .bind(book_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => {
                let entry = Self::parse_entry_row(row)?;
                let total: i64 = row.try_get("total_ranked")?;
                Ok(Some((entry, total.max(0) as u32)))
            }
            None => Ok(None),
        }
    }

    async fn comparisons_for(
        &self,
        book_id: BookId,
    ) -> Result<Vec<ComparisonRecord>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT book_a_id, book_b_id, winner_id, created_at
            FROM comparisons
            WHERE book_a_id = $1 OR book_b_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(book_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let book_a: i64 = row.try_get("book_a_id")?;
                let book_b: i64 = row.try_get("book_b_id")?;
                let winner: i64 = row.try_get("winner_id")?;
                let created_at: chrono::DateTime<chrono::Utc> = row.try_get("created_at")?;
                Ok(ComparisonRecord {
                    book_a: BookId::new(book_a),
                    book_b: BookId::new(book_b),
                    winner: BookId::new(winner),
                    created_at,
                })
            })
            .collect()
    }
}

/// Open transaction over the PostgreSQL store.
pub struct PostgresTx {
    tx: sqlx::Transaction<'static, sqlx::Postgres>,
}

#[async_trait]
impl RankTx for PostgresTx {
    type Error = PostgresError;

    async fn entry_with_total(
        &mut self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<(RankingEntry, u32)>, Self::Error> {
        let row = sqlx::query(ENTRY_WITH_TOTAL_SQL)
            .bind(user_id.as_i64())
            .bind(book_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(ref row) => {
                let entry = PostgresRankStore::parse_entry_row(row)?;
                let total: i64 = row.try_get("total_ranked")?;
                Ok(Some((entry, total.max(0) as u32)))
            }
            None => Ok(None),
        }
    }

    async fn star_group_bounds(
        &mut self,
        user_id: UserId,
        stars: Stars,
    ) -> Result<Option<(u32, u32)>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT MIN(rank_position) AS min_pos, MAX(rank_position) AS max_pos
            FROM rankings
            WHERE user_id = $1 AND half_stars = $2 AND rank_position > 0
            "#,
        )
        .bind(user_id.as_i64())
        .bind(stars.half_steps() as i16)
        .fetch_one(&mut *self.tx)
        .await?;

        let min_pos: Option<i32> = row.try_get("min_pos")?;
        let max_pos: Option<i32> = row.try_get("max_pos")?;
        Ok(match (min_pos, max_pos) {
            (Some(min), Some(max)) => Some((min.max(0) as u32, max.max(0) as u32)),
            _ => None,
        })
    }

    async fn max_position_above_stars(
        &mut self,
        user_id: UserId,
        stars: Stars,
    ) -> Result<Option<u32>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT MAX(rank_position) AS max_pos
            FROM rankings
            WHERE user_id = $1 AND half_stars > $2 AND rank_position > 0
            "#,
        )
        .bind(user_id.as_i64())
        .bind(stars.half_steps() as i16)
        .fetch_one(&mut *self.tx)
        .await?;

        let max_pos: Option<i32> = row.try_get("max_pos")?;
        Ok(max_pos.map(|p| p.max(0) as u32))
    }

    async fn entries_for_rebuild(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<RebuildRow>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT r.book_id, b.title, r.half_stars
            FROM rankings r
            JOIN books b ON b.id = r.book_id
            WHERE r.user_id = $1
            ORDER BY r.book_id
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| {
                let book_id: i64 = row.try_get("book_id")?;
                let title: String = row.try_get("title")?;
                let half_stars: i16 = row.try_get("half_stars")?;
                Ok(RebuildRow {
                    book_id: BookId::new(book_id),
                    title,
                    stars: stars_from_db(half_stars)?,
                })
            })
            .collect()
    }

    async fn shift_positions(
        &mut self,
        user_id: UserId,
        lo: u32,
        hi: Option<u32>,
        delta: i32,
        exclude: Option<BookId>,
    ) -> Result<u64, Self::Error> {
        let result = sqlx::query(
            r#"
            UPDATE rankings
            SET rank_position = rank_position + $3, updated_at = now()
            WHERE user_id = $1
              AND rank_position >= $2
              AND ($4::INTEGER IS NULL OR rank_position <= $4)
              AND ($5::BIGINT IS NULL OR book_id <> $5)
              AND rank_position > 0
            "#,
        )
        .bind(user_id.as_i64())
        .bind(lo as i32)
        .bind(delta)
        .bind(hi.map(|h| h as i32))
        .bind(exclude.map(|b| b.as_i64()))
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_entry(&mut self, entry: &RankingEntry) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO rankings (user_id, book_id, rank_position, half_stars, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.user_id.as_i64())
        .bind(entry.book_id.as_i64())
        .bind(entry.position as i32)
        .bind(entry.stars.half_steps() as i16)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_entry(
        &mut self,
        user_id: UserId,
        book_id: BookId,
        position: u32,
        stars: Stars,
    ) -> Result<bool, Self::Error> {
        let result = sqlx::query(
            r#"
            UPDATE rankings
            SET rank_position = $3, half_stars = $4, updated_at = now()
            WHERE user_id = $1 AND book_id = $2
            "#,
        )
        .bind(user_id.as_i64())
        .bind(book_id.as_i64())
        .bind(position as i32)
        .bind(stars.half_steps() as i16)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn assign_positions(
        &mut self,
        user_id: UserId,
        assignments: &[(BookId, u32)],
    ) -> Result<u64, Self::Error> {
        if assignments.is_empty() {
            return Ok(0);
        }

        let book_ids: Vec<i64> = assignments.iter().map(|(b, _)| b.as_i64()).collect();
        let positions: Vec<i32> = assignments.iter().map(|(_, p)| *p as i32).collect();

        let result = sqlx::query(
            r#"
            UPDATE rankings r
            SET rank_position = v.pos, updated_at = now()
            FROM (SELECT UNNEST($2::BIGINT[]) AS book_id, UNNEST($3::INTEGER[]) AS pos) AS v
            WHERE r.user_id = $1 AND r.book_id = v.book_id
            "#,
        )
        .bind(user_id.as_i64())
        .bind(&book_ids)
        .bind(&positions)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn append_comparison(
        &mut self,
        outcome: &ComparisonOutcome,
    ) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO comparisons (book_a_id, book_b_id, winner_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(outcome.book_a.as_i64())
        .bind(outcome.book_b.as_i64())
        .bind(outcome.winner.as_i64())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<(), Self::Error> {
        self.tx.commit().await?;
        Ok(())
    }
}
