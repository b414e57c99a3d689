// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate queries backing the statistics view.

use flowbell_core::FlowbellError;
use flowbell_core::types::{AppFailureCount, StatusCounts};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Count entries per status in one pass.
pub async fn status_counts(db: &Database) -> Result<StatusCounts, FlowbellError> {
    let rows: Vec<(String, i64)> = db
        .connection()
        .call(|conn| {
            let mut stmt = conn
                .prepare("SELECT status, COUNT(*) FROM notification_queue GROUP BY status")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        let count = count.max(0) as u64;
        match status.as_str() {
            "PENDING" => counts.pending = count,
            "PROCESSING" => counts.processing = count,
            "SENT" => counts.sent = count,
            "FAILED" => counts.failed = count,
            other => tracing::warn!(status = other, "ignoring unknown queue status"),
        }
    }
    Ok(counts)
}

/// Entries whose notification timestamp falls in `[from_ms, to_ms)`.
pub async fn count_between(db: &Database, from_ms: i64, to_ms: i64) -> Result<u64, FlowbellError> {
    let count: i64 = db
        .connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM notification_queue WHERE timestamp >= ?1 AND timestamp < ?2",
                params![from_ms, to_ms],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)?;
    Ok(count.max(0) as u64)
}

/// Apps with the most FAILED entries, most failures first.
pub async fn top_failing_apps(
    db: &Database,
    limit: u32,
) -> Result<Vec<AppFailureCount>, FlowbellError> {
    let rows: Vec<(String, String, i64)> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT package_name, MAX(app_name), COUNT(*) AS failures \
                 FROM notification_queue WHERE status = 'FAILED' \
                 GROUP BY package_name \
                 ORDER BY failures DESC, package_name ASC \
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)?;

    Ok(rows
        .into_iter()
        .map(|(package_name, app_name, failures)| AppFailureCount {
            package_name,
            app_name,
            failures: failures.max(0) as u64,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::queue;
    use flowbell_core::types::{CapturedNotification, DeliveryFailure, RetryPolicy};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn notification(package: &str, timestamp: i64) -> CapturedNotification {
        CapturedNotification {
            package_name: package.to_string(),
            app_name: package.to_uppercase(),
            app_version: None,
            title: "t".to_string(),
            text: "x".to_string(),
            sub_text: None,
            category: None,
            timestamp,
            icon_uri: None,
            large_icon_uri: None,
            priority: Default::default(),
            is_ongoing: false,
            is_clearable: true,
        }
    }

    async fn fail_entry(db: &Database, package: &str) {
        let id = queue::enqueue(db, &notification(package, 1)).await.unwrap();
        queue::mark_processing(db, id).await.unwrap();
        let failure = DeliveryFailure {
            message: "HTTP 410".to_string(),
            retryable: false,
            attempt: None,
        };
        queue::mark_failed(db, id, &failure, &RetryPolicy::immediate(3))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn counts_each_status() {
        let (db, _dir) = setup_db().await;
        assert_eq!(status_counts(&db).await.unwrap(), StatusCounts::default());

        queue::enqueue(&db, &notification("a", 1)).await.unwrap();
        let claimed = queue::enqueue(&db, &notification("a", 2)).await.unwrap();
        queue::mark_processing(&db, claimed).await.unwrap();
        fail_entry(&db, "b").await;

        let counts = status_counts(&db).await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.sent, 0);
        assert_eq!(counts.total(), 3);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn count_between_is_half_open() {
        let (db, _dir) = setup_db().await;
        for ts in [100, 200, 300] {
            queue::enqueue(&db, &notification("a", ts)).await.unwrap();
        }
        assert_eq!(count_between(&db, 100, 300).await.unwrap(), 2);
        assert_eq!(count_between(&db, 301, 400).await.unwrap(), 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn top_failing_apps_ranked() {
        let (db, _dir) = setup_db().await;
        fail_entry(&db, "com.bank").await;
        fail_entry(&db, "com.chat").await;
        fail_entry(&db, "com.chat").await;
        fail_entry(&db, "com.mail").await;

        let top = top_failing_apps(&db, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].package_name, "com.chat");
        assert_eq!(top[0].app_name, "COM.CHAT");
        assert_eq!(top[0].failures, 2);
        assert_eq!(top[1].package_name, "com.bank");
        db.close().await.unwrap();
    }
}
