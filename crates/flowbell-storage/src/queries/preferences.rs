// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User and per-app preference persistence.

use flowbell_core::FlowbellError;
use flowbell_core::types::{AppPreference, UserPreferences};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now_ms};

/// Raw app preference row before `filter_words` is decoded.
type AppRow = (String, String, bool, String);

fn decode_app_row(
    (package_name, app_name, forwarding_enabled, words): AppRow,
) -> Result<AppPreference, FlowbellError> {
    let filter_words = serde_json::from_str(&words).map_err(FlowbellError::storage)?;
    Ok(AppPreference {
        package_name,
        app_name,
        forwarding_enabled,
        filter_words,
    })
}

pub async fn load_user_preferences(db: &Database) -> Result<Option<UserPreferences>, FlowbellError> {
    let data: Option<String> = db
        .connection()
        .call(|conn| {
            let data = conn
                .query_row("SELECT data FROM user_preferences WHERE id = 1", [], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(data)
        })
        .await
        .map_err(map_tr_err)?;

    data.map(|json| serde_json::from_str(&json).map_err(FlowbellError::storage))
        .transpose()
}

/// Replace the singleton row. Last write wins.
pub async fn save_user_preferences(
    db: &Database,
    prefs: &UserPreferences,
) -> Result<(), FlowbellError> {
    let data = serde_json::to_string(prefs).map_err(FlowbellError::storage)?;
    let now = now_ms();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO user_preferences (id, data, updated_at) VALUES (1, ?1, ?2) \
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                params![data, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn load_app_preference(
    db: &Database,
    package_name: &str,
) -> Result<Option<AppPreference>, FlowbellError> {
    let package_name = package_name.to_string();
    let row: Option<AppRow> = db
        .connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT package_name, app_name, forwarding_enabled, filter_words \
                     FROM app_preferences WHERE package_name = ?1",
                    params![package_name],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)?;

    row.map(decode_app_row).transpose()
}

/// Upsert keyed by package name.
pub async fn save_app_preference(db: &Database, pref: &AppPreference) -> Result<(), FlowbellError> {
    let words = serde_json::to_string(&pref.filter_words).map_err(FlowbellError::storage)?;
    let pref = pref.clone();
    let now = now_ms();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO app_preferences \
                 (package_name, app_name, forwarding_enabled, filter_words, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(package_name) DO UPDATE SET app_name = excluded.app_name, \
                 forwarding_enabled = excluded.forwarding_enabled, \
                 filter_words = excluded.filter_words, updated_at = excluded.updated_at",
                params![pref.package_name, pref.app_name, pref.forwarding_enabled, words, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_app_preferences(db: &Database) -> Result<Vec<AppPreference>, FlowbellError> {
    let rows: Vec<AppRow> = db
        .connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT package_name, app_name, forwarding_enabled, filter_words \
                 FROM app_preferences ORDER BY package_name ASC",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)?;

    rows.into_iter().map(decode_app_row).collect()
}
