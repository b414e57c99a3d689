// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use flowbell_config::model::StorageConfig;
use flowbell_core::types::{
    AppFailureCount, AppPreference, CapturedNotification, DeliveryFailure, HttpAttempt,
    QueueEntry, QueueFilter, QueueStatus, RetryPolicy, StatusCounts, UserPreferences,
};
use flowbell_core::{
    AdapterType, FlowbellError, HealthStatus, PluginAdapter, PreferenceStore, QueueStore,
    StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, FlowbellError> {
        self.db.get().ok_or_else(|| FlowbellError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, FlowbellError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("storage not initialized".to_string()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FlowbellError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for SqliteStorage {
    async fn enqueue(&self, notification: &CapturedNotification) -> Result<i64, FlowbellError> {
        queries::queue::enqueue(self.db()?, notification).await
    }

    async fn dequeue_pending(&self, limit: u32) -> Result<Vec<QueueEntry>, FlowbellError> {
        queries::queue::dequeue_pending(self.db()?, limit).await
    }

    async fn mark_processing(&self, id: i64) -> Result<bool, FlowbellError> {
        queries::queue::mark_processing(self.db()?, id).await
    }

    async fn mark_sent(&self, id: i64, attempt: &HttpAttempt) -> Result<(), FlowbellError> {
        queries::queue::mark_sent(self.db()?, id, attempt).await
    }

    async fn mark_failed(
        &self,
        id: i64,
        failure: &DeliveryFailure,
        policy: &RetryPolicy,
    ) -> Result<QueueStatus, FlowbellError> {
        queries::queue::mark_failed(self.db()?, id, failure, policy).await
    }

    async fn retry(&self, id: i64) -> Result<bool, FlowbellError> {
        queries::queue::retry(self.db()?, id).await
    }

    async fn purge_older_than(&self, days: u32) -> Result<u64, FlowbellError> {
        queries::queue::purge_older_than(self.db()?, days).await
    }

    async fn recover_processing(&self) -> Result<u64, FlowbellError> {
        queries::queue::recover_processing(self.db()?).await
    }

    async fn release(&self, id: i64) -> Result<bool, FlowbellError> {
        queries::queue::release(self.db()?, id).await
    }

    async fn get_entry(&self, id: i64) -> Result<Option<QueueEntry>, FlowbellError> {
        queries::queue::get_entry(self.db()?, id).await
    }

    async fn list_entries(&self, filter: &QueueFilter) -> Result<Vec<QueueEntry>, FlowbellError> {
        queries::queue::list_entries(self.db()?, filter).await
    }

    async fn status_counts(&self) -> Result<StatusCounts, FlowbellError> {
        queries::stats::status_counts(self.db()?).await
    }

    async fn count_between(&self, from_ms: i64, to_ms: i64) -> Result<u64, FlowbellError> {
        queries::stats::count_between(self.db()?, from_ms, to_ms).await
    }

    async fn top_failing_apps(&self, limit: u32) -> Result<Vec<AppFailureCount>, FlowbellError> {
        queries::stats::top_failing_apps(self.db()?, limit).await
    }
}

#[async_trait]
impl PreferenceStore for SqliteStorage {
    async fn load_user_preferences(&self) -> Result<Option<UserPreferences>, FlowbellError> {
        queries::preferences::load_user_preferences(self.db()?).await
    }

    async fn save_user_preferences(&self, prefs: &UserPreferences) -> Result<(), FlowbellError> {
        queries::preferences::save_user_preferences(self.db()?, prefs).await
    }

    async fn load_app_preference(
        &self,
        package_name: &str,
    ) -> Result<Option<AppPreference>, FlowbellError> {
        queries::preferences::load_app_preference(self.db()?, package_name).await
    }

    async fn save_app_preference(&self, pref: &AppPreference) -> Result<(), FlowbellError> {
        queries::preferences::save_app_preference(self.db()?, pref).await
    }

    async fn list_app_preferences(&self) -> Result<Vec<AppPreference>, FlowbellError> {
        queries::preferences::list_app_preferences(self.db()?).await
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), FlowbellError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| FlowbellError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), FlowbellError> {
        self.db()?.checkpoint().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
            ..StorageConfig::default()
        }
    }

    fn notification() -> CapturedNotification {
        CapturedNotification {
            package_name: "com.chat".to_string(),
            app_name: "Chat".to_string(),
            app_version: None,
            title: "Ping".to_string(),
            text: "".to_string(),
            sub_text: None,
            category: None,
            timestamp: 1_700_000_000_000,
            icon_uri: None,
            large_icon_uri: None,
            priority: Default::default(),
            is_ongoing: false,
            is_clearable: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn double_initialize_is_an_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("twice.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(
            dir.path().join("never.db").to_str().unwrap(),
        ));

        assert!(storage.enqueue(&notification()).await.is_err());
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn delivery_round_trip_through_traits() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("trait.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let id = storage.enqueue(&notification()).await.unwrap();
        assert!(storage.mark_processing(id).await.unwrap());
        storage
            .mark_sent(
                id,
                &HttpAttempt {
                    url: "https://hooks.example.com".to_string(),
                    method: "POST".to_string(),
                    response_code: Some(201),
                    response_body: None,
                    duration_ms: 5,
                },
            )
            .await
            .unwrap();

        let counts = storage.status_counts().await.unwrap();
        assert_eq!(counts.sent, 1);
        assert_eq!(counts.total(), 1);

        storage
            .save_app_preference(&AppPreference::enabled("com.chat", "Chat"))
            .await
            .unwrap();
        assert_eq!(storage.list_app_preferences().await.unwrap().len(), 1);
        storage.shutdown().await.unwrap();
    }
}
