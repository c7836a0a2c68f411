//! Database table operations and implementations.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::model::MonitorStateModel;
use crate::model::SubscriberModel;
use crate::model::SubscriberRole;
use crate::repository::error::DatabaseError;

/// Base table struct providing database pool access.
#[derive(Clone)]
pub struct BaseTable {
    pub pool: SqlitePool,
}

impl BaseTable {
    /// Creates a new base table with the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Base trait for table operations.
#[async_trait::async_trait]
pub trait TableBase {
    /// Creates the table if it doesn't exist.
    async fn create_table(&self) -> Result<(), DatabaseError>;
    /// Drops the table.
    async fn drop_table(&self) -> Result<(), DatabaseError>;
    /// Deletes all rows from the table.
    async fn delete_all(&self) -> Result<(), DatabaseError>;
}

// ============================================================================
// MonitorStateTable
// ============================================================================

/// Single-row table holding the monitor's persisted state.
#[derive(Clone)]
pub struct MonitorStateTable {
    base: BaseTable,
}

impl MonitorStateTable {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            base: BaseTable::new(pool),
        }
    }

    pub async fn load(&self) -> Result<Option<MonitorStateModel>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, MonitorStateModel>("SELECT * FROM monitor_state WHERE id = 1")
                .fetch_optional(&self.base.pool)
                .await?,
        )
    }

    pub async fn save(&self, model: &MonitorStateModel) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            REPLACE INTO monitor_state
                (id, interval_seconds, running, last_status, last_checked_at,
                 last_detail, last_evidence_path, consecutive_errors)
            VALUES (1, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(model.interval_seconds)
        .bind(model.running)
        .bind(model.last_status)
        .bind(model.last_checked_at)
        .bind(&model.last_detail)
        .bind(&model.last_evidence_path)
        .bind(model.consecutive_errors)
        .execute(&self.base.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TableBase for MonitorStateTable {
    async fn create_table(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS monitor_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                interval_seconds INTEGER NOT NULL,
                running INTEGER NOT NULL DEFAULT 0,
                last_status TEXT DEFAULT NULL,
                last_checked_at TIMESTAMP DEFAULT NULL,
                last_detail TEXT DEFAULT NULL,
                last_evidence_path TEXT DEFAULT NULL,
                consecutive_errors INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(&self.base.pool)
        .await?;
        Ok(())
    }

    async fn drop_table(&self) -> Result<(), DatabaseError> {
        sqlx::query("DROP TABLE IF EXISTS monitor_state")
            .execute(&self.base.pool)
            .await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM monitor_state")
            .execute(&self.base.pool)
            .await?;
        Ok(())
    }
}

// ============================================================================
// SubscriberTable
// ============================================================================

#[derive(Clone)]
pub struct SubscriberTable {
    base: BaseTable,
}

impl SubscriberTable {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            base: BaseTable::new(pool),
        }
    }

    /// Inserts a subscriber or reactivates an existing one.
    ///
    /// The original `subscribed_at` is kept on reactivation so notification
    /// ordering stays stable across unsubscribe/subscribe cycles.
    pub async fn upsert(
        &self,
        chat_id: i64,
        role: SubscriberRole,
    ) -> Result<SubscriberModel, DatabaseError> {
        Ok(sqlx::query_as::<_, SubscriberModel>(
            r#"
            INSERT INTO subscribers (chat_id, role, active, subscribed_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(chat_id) DO UPDATE SET role = excluded.role, active = 1
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(role)
        .bind(Utc::now())
        .fetch_one(&self.base.pool)
        .await?)
    }

    /// Marks a subscriber inactive. Returns whether a row was actually deactivated.
    pub async fn deactivate(&self, chat_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE subscribers SET active = 0 WHERE chat_id = ? AND active = 1")
            .bind(chat_id)
            .execute(&self.base.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn select(&self, chat_id: i64) -> Result<Option<SubscriberModel>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, SubscriberModel>("SELECT * FROM subscribers WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_optional(&self.base.pool)
                .await?,
        )
    }

    /// Active subscribers in notification order, oldest subscription first.
    pub async fn select_active(&self) -> Result<Vec<SubscriberModel>, DatabaseError> {
        Ok(sqlx::query_as::<_, SubscriberModel>(
            "SELECT * FROM subscribers WHERE active = 1 ORDER BY subscribed_at ASC, chat_id ASC",
        )
        .fetch_all(&self.base.pool)
        .await?)
    }
}

#[async_trait::async_trait]
impl TableBase for SubscriberTable {
    async fn create_table(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS subscribers (
                chat_id INTEGER PRIMARY KEY,
                role TEXT NOT NULL DEFAULT 'member',
                active INTEGER NOT NULL DEFAULT 1,
                subscribed_at TIMESTAMP NOT NULL
            )"#,
        )
        .execute(&self.base.pool)
        .await?;
        Ok(())
    }

    async fn drop_table(&self) -> Result<(), DatabaseError> {
        sqlx::query("DROP TABLE IF EXISTS subscribers")
            .execute(&self.base.pool)
            .await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM subscribers")
            .execute(&self.base.pool)
            .await?;
        Ok(())
    }
}
