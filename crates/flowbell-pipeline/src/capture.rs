// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capture path: validate, filter, and enqueue incoming notifications.
//!
//! Capture never talks to the webhook; it only inserts PENDING rows, so it
//! never waits on delivery.

use std::sync::Arc;

use tracing::{debug, info, warn};

use flowbell_core::types::CapturedNotification;
use flowbell_core::{FlowbellError, PreferenceStore, QueueStore};

use crate::filter::{self, FilterVerdict};

/// What happened to a captured notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Inserted as a PENDING entry.
    Queued { id: i64 },
    /// Dropped by the filter gate.
    Filtered(FilterVerdict),
}

/// Entry point for notification events.
#[derive(Clone)]
pub struct CaptureService {
    queue: Arc<dyn QueueStore>,
    preferences: Arc<dyn PreferenceStore>,
}

impl CaptureService {
    pub fn new(queue: Arc<dyn QueueStore>, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self { queue, preferences }
    }

    /// Run one notification through validation and the filter gate, and
    /// enqueue it if accepted.
    ///
    /// Malformed notifications return [`FlowbellError::InvalidNotification`]
    /// and are never inserted.
    pub async fn capture(
        &self,
        notification: &CapturedNotification,
    ) -> Result<CaptureOutcome, FlowbellError> {
        if let Err(e) = notification.validate() {
            warn!(
                package_name = notification.package_name.as_str(),
                error = %e,
                "skipping malformed notification"
            );
            return Err(e);
        }

        let user = self
            .preferences
            .load_user_preferences()
            .await?
            .unwrap_or_default();
        let app = self
            .preferences
            .load_app_preference(&notification.package_name)
            .await?;

        let verdict = filter::evaluate(notification, app.as_ref(), &user);
        if !verdict.is_accepted() {
            debug!(
                package_name = notification.package_name.as_str(),
                reason = %verdict,
                "notification filtered"
            );
            return Ok(CaptureOutcome::Filtered(verdict));
        }

        let id = self.queue.enqueue(notification).await?;
        info!(
            id,
            package_name = notification.package_name.as_str(),
            "notification queued"
        );
        Ok(CaptureOutcome::Queued { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbell_config::model::StorageConfig;
    use flowbell_core::StorageAdapter;
    use flowbell_core::types::{AppPreference, QueueFilter, UserPreferences};
    use flowbell_storage::SqliteStorage;

    async fn storage() -> (Arc<SqliteStorage>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("capture.db").display().to_string(),
            ..StorageConfig::default()
        });
        storage.initialize().await.unwrap();
        (Arc::new(storage), dir)
    }

    fn notification(package: &str, title: &str) -> CapturedNotification {
        CapturedNotification {
            package_name: package.to_string(),
            app_name: "App".to_string(),
            app_version: None,
            title: title.to_string(),
            text: "body".to_string(),
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

    async fn queued(storage: &SqliteStorage) -> usize {
        storage
            .list_entries(&QueueFilter::default())
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn accepted_notification_is_queued() {
        let (storage, _dir) = storage().await;
        let service = CaptureService::new(storage.clone(), storage.clone());

        let outcome = service.capture(&notification("com.chat", "hi")).await.unwrap();
        let CaptureOutcome::Queued { id } = outcome else {
            panic!("expected queued, got {outcome:?}");
        };
        let entry = storage.get_entry(id).await.unwrap().unwrap();
        assert_eq!(entry.package_name, "com.chat");
    }

    #[tokio::test]
    async fn disabled_app_is_never_enqueued() {
        let (storage, _dir) = storage().await;
        let mut pref = AppPreference::enabled("com.game", "Game");
        pref.forwarding_enabled = false;
        storage.save_app_preference(&pref).await.unwrap();

        let service = CaptureService::new(storage.clone(), storage.clone());
        for _ in 0..3 {
            let outcome = service.capture(&notification("com.game", "level up")).await.unwrap();
            assert_eq!(outcome, CaptureOutcome::Filtered(FilterVerdict::AppDisabled));
        }
        assert_eq!(queued(&storage).await, 0);

        service.capture(&notification("com.chat", "hi")).await.unwrap();
        assert_eq!(queued(&storage).await, 1);
    }

    #[tokio::test]
    async fn keyword_filter_uses_stored_preferences() {
        let (storage, _dir) = storage().await;
        storage
            .save_user_preferences(&UserPreferences {
                notification_filter_enabled: true,
                filter_keywords: vec!["otp".to_string()],
                ..UserPreferences::default()
            })
            .await
            .unwrap();

        let service = CaptureService::new(storage.clone(), storage.clone());
        let outcome = service.capture(&notification("com.bank", "Your OTP")).await.unwrap();
        assert!(matches!(outcome, CaptureOutcome::Filtered(FilterVerdict::GlobalKeyword(_))));
        assert_eq!(queued(&storage).await, 0);
    }

    #[tokio::test]
    async fn malformed_notification_is_rejected() {
        let (storage, _dir) = storage().await;
        let service = CaptureService::new(storage.clone(), storage.clone());

        let mut empty = notification("com.chat", "");
        empty.text = String::new();
        assert!(matches!(
            service.capture(&empty).await,
            Err(FlowbellError::InvalidNotification(_))
        ));
        assert!(service.capture(&notification(" ", "hi")).await.is_err());
        assert_eq!(queued(&storage).await, 0);
    }
}
