//! Database module with SQLite storage and SQLx.

use std::str::FromStr;

use log::debug;
use log::info;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;

use crate::repository::table::MonitorStateTable;
use crate::repository::table::SubscriberTable;
use crate::repository::table::TableBase;

pub mod error;
pub mod table;

/// Main database struct containing all table handlers.
pub struct Repository {
    pub pool: SqlitePool,
    pub monitor_state: MonitorStateTable,
    pub subscriber: SubscriberTable,
}

impl Repository {
    /// Creates a new database connection and initializes table handlers.
    pub async fn new(db_url: &str, db_path: &str) -> anyhow::Result<Self> {
        let path = std::path::Path::new(db_path);
        if !path.exists() {
            debug!("Database path {db_path} does not exist. Creating...");
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, "")?;
            info!("Created {db_path}");
        }

        debug!("Connecting to db...");
        let opts = SqliteConnectOptions::from_str(db_url)?.foreign_keys(true);
        let pool = SqlitePool::connect_with(opts).await?;
        info!("Connected to db.");

        let monitor_state = MonitorStateTable::new(pool.clone());
        let subscriber = SubscriberTable::new(pool.clone());

        Ok(Self {
            pool,
            monitor_state,
            subscriber,
        })
    }

    /// Creates all tables that don't exist yet.
    pub async fn init_schema(&self) -> anyhow::Result<()> {
        self.monitor_state.create_table().await?;
        self.subscriber.create_table().await?;
        Ok(())
    }

    /// Drops all tables. Use with caution!
    pub async fn drop_all_tables(&self) -> anyhow::Result<()> {
        self.monitor_state.drop_table().await?;
        self.subscriber.drop_table().await?;
        Ok(())
    }

    /// Deletes all data from all tables. Use with caution!
    pub async fn delete_all_tables(&self) -> anyhow::Result<()> {
        self.monitor_state.delete_all().await?;
        self.subscriber.delete_all().await?;
        Ok(())
    }
}
