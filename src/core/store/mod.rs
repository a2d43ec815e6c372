//! Small persistent key-value store for application settings and the last
//! saved results. Values are stored as JSON text in SQLite.

use std::{future::Future, path::Path};

use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{
    Row,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};
use time::OffsetDateTime;
use tracing::debug;

/// Key under which the last saved batch is recorded.
pub const LAST_RESULTS_KEY: &str = "lastResults";

pub trait SettingsRepository: Send + Sync {
    fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn get_json<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> impl Future<Output = anyhow::Result<Option<T>>> + Send;
    fn remove(&self, key: &str) -> impl Future<Output = anyhow::Result<bool>> + Send;
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    /// Opens (creating if needed) the store at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(connect_opts)
            .await
            .with_context(|| format!("Failed to open settings store {:?}", path))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(?path, "settings store opened");
        Ok(Self { pool })
    }

    /// When the key was last written, if present.
    pub async fn updated_at(&self, key: &str) -> anyhow::Result<Option<OffsetDateTime>> {
        let row = sqlx::query("SELECT updated_at FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| -> anyhow::Result<OffsetDateTime> {
            let raw: String = row.try_get("updated_at")?;
            Ok(OffsetDateTime::parse(&raw, &time::format_description::well_known::Rfc3339)?)
        })
        .transpose()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

impl SettingsRepository for SettingsStore {
    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string(value)?;
        let now = OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339)?;
        sqlx::query(
            r#"INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at"#,
        )
        .bind(key)
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("value")?;
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("Stored value for {key:?} is not valid"))?;
        Ok(Some(value))
    }

    async fn remove(&self, key: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
