// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Preference persistence contract.

use async_trait::async_trait;

use crate::error::FlowbellError;
use crate::types::{AppPreference, UserPreferences};

/// Read/write access to user and per-app preferences.
///
/// `load_*` returns `Ok(None)` when nothing has been written yet, so callers
/// can tell an absent value apart from a failing backend.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load_user_preferences(&self) -> Result<Option<UserPreferences>, FlowbellError>;

    async fn save_user_preferences(&self, prefs: &UserPreferences) -> Result<(), FlowbellError>;

    async fn load_app_preference(
        &self,
        package_name: &str,
    ) -> Result<Option<AppPreference>, FlowbellError>;

    async fn save_app_preference(&self, pref: &AppPreference) -> Result<(), FlowbellError>;

    async fn list_app_preferences(&self) -> Result<Vec<AppPreference>, FlowbellError>;
}
