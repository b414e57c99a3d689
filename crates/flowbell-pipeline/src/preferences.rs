// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-tier preference storage.
//!
//! [`TieredPreferences`] writes to a primary and a secondary store and reads
//! from the primary, falling back to the secondary when the primary has no
//! value or fails. [`JsonFilePreferenceStore`] is the file-backed secondary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use flowbell_core::types::{AppPreference, UserPreferences};
use flowbell_core::{FlowbellError, PreferenceStore};

/// Primary + secondary preference store.
pub struct TieredPreferences {
    primary: Arc<dyn PreferenceStore>,
    secondary: Arc<dyn PreferenceStore>,
}

impl TieredPreferences {
    pub fn new(primary: Arc<dyn PreferenceStore>, secondary: Arc<dyn PreferenceStore>) -> Self {
        Self { primary, secondary }
    }

    /// Succeeds when at least one tier accepted the write.
    fn combine_writes(
        what: &str,
        primary: Result<(), FlowbellError>,
        secondary: Result<(), FlowbellError>,
    ) -> Result<(), FlowbellError> {
        match (primary, secondary) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(e)) => {
                warn!(error = %e, what, "secondary preference store write failed");
                Ok(())
            }
            (Err(e), Ok(())) => {
                warn!(error = %e, what, "primary preference store write failed, kept in secondary");
                Ok(())
            }
            (Err(primary), Err(secondary)) => {
                warn!(error = %secondary, what, "secondary preference store write failed");
                Err(primary)
            }
        }
    }
}

#[async_trait]
impl PreferenceStore for TieredPreferences {
    async fn load_user_preferences(&self) -> Result<Option<UserPreferences>, FlowbellError> {
        match self.primary.load_user_preferences().await {
            Ok(Some(prefs)) => return Ok(Some(prefs)),
            Ok(None) => debug!("no user preferences in primary store"),
            Err(e) => warn!(error = %e, "primary preference read failed, using secondary"),
        }
        self.secondary.load_user_preferences().await
    }

    async fn save_user_preferences(&self, prefs: &UserPreferences) -> Result<(), FlowbellError> {
        let primary = self.primary.save_user_preferences(prefs).await;
        let secondary = self.secondary.save_user_preferences(prefs).await;
        Self::combine_writes("user preferences", primary, secondary)
    }

    async fn load_app_preference(
        &self,
        package_name: &str,
    ) -> Result<Option<AppPreference>, FlowbellError> {
        match self.primary.load_app_preference(package_name).await {
            Ok(Some(pref)) => return Ok(Some(pref)),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, package_name, "primary app preference read failed, using secondary")
            }
        }
        self.secondary.load_app_preference(package_name).await
    }

    async fn save_app_preference(&self, pref: &AppPreference) -> Result<(), FlowbellError> {
        let primary = self.primary.save_app_preference(pref).await;
        let secondary = self.secondary.save_app_preference(pref).await;
        Self::combine_writes("app preference", primary, secondary)
    }

    async fn list_app_preferences(&self) -> Result<Vec<AppPreference>, FlowbellError> {
        match self.primary.list_app_preferences().await {
            Ok(prefs) if !prefs.is_empty() => return Ok(prefs),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "primary app preference listing failed, using secondary"),
        }
        self.secondary.list_app_preferences().await
    }
}

/// On-disk layout of the JSON preference file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PreferenceDocument {
    user: Option<UserPreferences>,
    apps: BTreeMap<String, AppPreference>,
}

/// Preferences kept in a single JSON file.
///
/// Writes go through a temp file and a rename so a crash never leaves a
/// half-written document behind.
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<PreferenceDocument, FlowbellError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(FlowbellError::storage),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PreferenceDocument::default()),
            Err(e) => Err(FlowbellError::storage(e)),
        }
    }

    async fn write_document(&self, doc: &PreferenceDocument) -> Result<(), FlowbellError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(FlowbellError::storage)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(doc).map_err(FlowbellError::storage)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(FlowbellError::storage)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(FlowbellError::storage)
    }

    async fn update<F>(&self, apply: F) -> Result<(), FlowbellError>
    where
        F: FnOnce(&mut PreferenceDocument) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        apply(&mut doc);
        self.write_document(&doc).await
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn load_user_preferences(&self) -> Result<Option<UserPreferences>, FlowbellError> {
        Ok(self.read_document().await?.user)
    }

    async fn save_user_preferences(&self, prefs: &UserPreferences) -> Result<(), FlowbellError> {
        let prefs = prefs.clone();
        self.update(move |doc| doc.user = Some(prefs)).await
    }

    async fn load_app_preference(
        &self,
        package_name: &str,
    ) -> Result<Option<AppPreference>, FlowbellError> {
        Ok(self.read_document().await?.apps.remove(package_name))
    }

    async fn save_app_preference(&self, pref: &AppPreference) -> Result<(), FlowbellError> {
        let pref = pref.clone();
        self.update(move |doc| {
            doc.apps.insert(pref.package_name.clone(), pref);
        })
        .await
    }

    async fn list_app_preferences(&self) -> Result<Vec<AppPreference>, FlowbellError> {
        Ok(self.read_document().await?.apps.into_values().collect())
    }
}

/// Turn forwarding on or off for one app, creating its preference row if needed.
pub async fn set_app_forwarding(
    store: &dyn PreferenceStore,
    package_name: &str,
    enabled: bool,
) -> Result<AppPreference, FlowbellError> {
    let mut pref = store
        .load_app_preference(package_name)
        .await?
        .unwrap_or_else(|| AppPreference::enabled(package_name, package_name));
    pref.forwarding_enabled = enabled;
    store.save_app_preference(&pref).await?;
    debug!(package_name, enabled, "app forwarding updated");
    Ok(pref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A store whose every call can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        broken: AtomicBool,
        inner: tokio::sync::Mutex<PreferenceDocument>,
    }

    impl FlakyStore {
        fn broken() -> Self {
            let store = Self::default();
            store.broken.store(true, Ordering::SeqCst);
            store
        }

        fn check(&self) -> Result<(), FlowbellError> {
            if self.broken.load(Ordering::SeqCst) {
                Err(FlowbellError::storage(std::io::Error::other("disk gone")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PreferenceStore for FlakyStore {
        async fn load_user_preferences(&self) -> Result<Option<UserPreferences>, FlowbellError> {
            self.check()?;
            Ok(self.inner.lock().await.user.clone())
        }

        async fn save_user_preferences(&self, prefs: &UserPreferences) -> Result<(), FlowbellError> {
            self.check()?;
            self.inner.lock().await.user = Some(prefs.clone());
            Ok(())
        }

        async fn load_app_preference(
            &self,
            package_name: &str,
        ) -> Result<Option<AppPreference>, FlowbellError> {
            self.check()?;
            Ok(self.inner.lock().await.apps.get(package_name).cloned())
        }

        async fn save_app_preference(&self, pref: &AppPreference) -> Result<(), FlowbellError> {
            self.check()?;
            self.inner
                .lock()
                .await
                .apps
                .insert(pref.package_name.clone(), pref.clone());
            Ok(())
        }

        async fn list_app_preferences(&self) -> Result<Vec<AppPreference>, FlowbellError> {
            self.check()?;
            Ok(self.inner.lock().await.apps.values().cloned().collect())
        }
    }

    fn dark() -> UserPreferences {
        UserPreferences {
            theme: flowbell_core::types::Theme::Dark,
            ..UserPreferences::default()
        }
    }

    #[tokio::test]
    async fn writes_reach_both_tiers() {
        let primary = Arc::new(FlakyStore::default());
        let secondary = Arc::new(FlakyStore::default());
        let tiered = TieredPreferences::new(primary.clone(), secondary.clone());

        tiered.save_user_preferences(&dark()).await.unwrap();
        assert_eq!(primary.load_user_preferences().await.unwrap(), Some(dark()));
        assert_eq!(secondary.load_user_preferences().await.unwrap(), Some(dark()));
    }

    #[tokio::test]
    async fn failing_primary_falls_back_to_secondary() {
        let primary = Arc::new(FlakyStore::broken());
        let secondary = Arc::new(FlakyStore::default());
        let tiered = TieredPreferences::new(primary, secondary.clone());

        tiered.save_user_preferences(&dark()).await.unwrap();
        assert_eq!(tiered.load_user_preferences().await.unwrap(), Some(dark()));

        tiered
            .save_app_preference(&AppPreference::enabled("com.chat", "Chat"))
            .await
            .unwrap();
        assert!(tiered.load_app_preference("com.chat").await.unwrap().is_some());
        assert_eq!(tiered.list_app_preferences().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn absent_primary_value_reads_secondary() {
        let primary = Arc::new(FlakyStore::default());
        let secondary = Arc::new(FlakyStore::default());
        secondary.save_user_preferences(&dark()).await.unwrap();

        let tiered = TieredPreferences::new(primary, secondary);
        assert_eq!(tiered.load_user_preferences().await.unwrap(), Some(dark()));
    }

    #[tokio::test]
    async fn both_tiers_failing_is_an_error() {
        let tiered = TieredPreferences::new(
            Arc::new(FlakyStore::broken()),
            Arc::new(FlakyStore::broken()),
        );
        assert!(matches!(
            tiered.save_user_preferences(&dark()).await,
            Err(FlowbellError::Storage { .. })
        ));
        assert!(tiered.load_user_preferences().await.is_err());
    }

    #[tokio::test]
    async fn json_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/preferences.json");

        let store = JsonFilePreferenceStore::new(&path);
        assert!(store.load_user_preferences().await.unwrap().is_none());
        store.save_user_preferences(&dark()).await.unwrap();
        store
            .save_app_preference(&AppPreference::enabled("com.mail", "Mail"))
            .await
            .unwrap();

        let reopened = JsonFilePreferenceStore::new(&path);
        assert_eq!(reopened.load_user_preferences().await.unwrap(), Some(dark()));
        let app = reopened.load_app_preference("com.mail").await.unwrap().unwrap();
        assert_eq!(app.app_name, "Mail");
        assert!(reopened.load_app_preference("com.none").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_app_forwarding_creates_and_updates() {
        let store = FlakyStore::default();
        let pref = set_app_forwarding(&store, "com.game", false).await.unwrap();
        assert!(!pref.forwarding_enabled);
        assert_eq!(pref.app_name, "com.game");

        let mut named = pref.clone();
        named.app_name = "Game".to_string();
        store.save_app_preference(&named).await.unwrap();

        let pref = set_app_forwarding(&store, "com.game", true).await.unwrap();
        assert!(pref.forwarding_enabled);
        assert_eq!(pref.app_name, "Game");
    }
}
