// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for crash-safe notification delivery.
//!
//! Every status change is a conditional `UPDATE ... WHERE status = ?` so two
//! workers can never both win the same transition.

use std::str::FromStr;

use flowbell_core::FlowbellError;
use flowbell_core::types::{
    CapturedNotification, DeliveryFailure, HttpAttempt, NotificationPriority, QueueEntry,
    QueueFilter, QueueStatus, RetryPolicy,
};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use crate::database::{Database, map_tr_err, now_ms};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub(crate) const ENTRY_COLUMNS: &str = "id, package_name, app_name, app_version, title, text, \
     sub_text, category, timestamp, icon_uri, large_icon_uri, priority, is_ongoing, \
     is_clearable, status, retry_count, last_attempt_at, next_attempt_at, error_message, \
     http_url, http_method, http_response_code, http_response_body, http_duration_ms";

/// Map a row selected with [`ENTRY_COLUMNS`] into a [`QueueEntry`].
pub(crate) fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    let status: String = row.get(14)?;
    let status = QueueStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(14, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(QueueEntry {
        id: row.get(0)?,
        package_name: row.get(1)?,
        app_name: row.get(2)?,
        app_version: row.get(3)?,
        title: row.get(4)?,
        text: row.get(5)?,
        sub_text: row.get(6)?,
        category: row.get(7)?,
        timestamp: row.get(8)?,
        icon_uri: row.get(9)?,
        large_icon_uri: row.get(10)?,
        priority: NotificationPriority::from_ordinal(row.get(11)?),
        is_ongoing: row.get(12)?,
        is_clearable: row.get(13)?,
        status,
        retry_count: row.get(15)?,
        last_attempt_at: row.get(16)?,
        next_attempt_at: row.get(17)?,
        error_message: row.get(18)?,
        http_url: row.get(19)?,
        http_method: row.get(20)?,
        http_response_code: row.get(21)?,
        http_response_body: row.get(22)?,
        http_duration_ms: row.get(23)?,
    })
}

fn current_status(
    conn: &rusqlite::Connection,
    id: i64,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT status FROM notification_queue WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
}

/// Turn a lost conditional update into the error the caller should see.
fn transition_error(id: i64, current: Option<String>, to: QueueStatus) -> FlowbellError {
    match current.as_deref().map(QueueStatus::from_str) {
        None => FlowbellError::NotFound(format!("queue entry {id}")),
        Some(Ok(from)) => FlowbellError::InvalidTransition { id, from, to },
        Some(Err(e)) => FlowbellError::storage(e),
    }
}

/// Insert a PENDING entry. Returns the auto-generated id.
pub async fn enqueue(
    db: &Database,
    notification: &CapturedNotification,
) -> Result<i64, FlowbellError> {
    let n = notification.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO notification_queue (package_name, app_name, app_version, title, \
                 text, sub_text, category, timestamp, icon_uri, large_icon_uri, priority, \
                 is_ongoing, is_clearable, status, retry_count, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 'PENDING', 0, ?14)",
                params![
                    n.package_name,
                    n.app_name,
                    n.app_version,
                    n.title,
                    n.text,
                    n.sub_text,
                    n.category,
                    n.timestamp,
                    n.icon_uri,
                    n.large_icon_uri,
                    n.priority.ordinal(),
                    n.is_ongoing,
                    n.is_clearable,
                    now_ms(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// PENDING entries whose backoff has elapsed, oldest first.
pub async fn dequeue_pending(db: &Database, limit: u32) -> Result<Vec<QueueEntry>, FlowbellError> {
    let now = now_ms();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM notification_queue \
                 WHERE status = 'PENDING' \
                 AND (next_attempt_at IS NULL OR next_attempt_at <= ?1) \
                 ORDER BY timestamp ASC, id ASC \
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![now, limit], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Claim an entry: PENDING -> PROCESSING. `false` means someone else won.
pub async fn mark_processing(db: &Database, id: i64) -> Result<bool, FlowbellError> {
    let now = now_ms();
    let updated = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE notification_queue SET status = 'PROCESSING', last_attempt_at = ?2 \
                 WHERE id = ?1 AND status = 'PENDING'",
                params![id, now],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    Ok(updated == 1)
}

/// PROCESSING -> SENT, recording the successful response.
pub async fn mark_sent(
    db: &Database,
    id: i64,
    attempt: &HttpAttempt,
) -> Result<(), FlowbellError> {
    if !attempt.is_success() {
        return Err(FlowbellError::Internal(format!(
            "queue entry {id} cannot be marked sent with response code {:?}",
            attempt.response_code
        )));
    }
    let attempt = attempt.clone();
    let now = now_ms();
    let (updated, current) = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE notification_queue SET status = 'SENT', last_attempt_at = ?2, \
                 next_attempt_at = NULL, error_message = NULL, http_url = ?3, \
                 http_method = ?4, http_response_code = ?5, http_response_body = ?6, \
                 http_duration_ms = ?7 \
                 WHERE id = ?1 AND status = 'PROCESSING'",
                params![
                    id,
                    now,
                    attempt.url,
                    attempt.method,
                    attempt.response_code,
                    attempt.response_body,
                    attempt.duration_ms,
                ],
            )?;
            let current = if n == 0 {
                current_status(conn, id)?
            } else {
                None
            };
            Ok((n, current))
        })
        .await
        .map_err(map_tr_err)?;

    if updated == 0 {
        return Err(transition_error(id, current, QueueStatus::Sent));
    }
    Ok(())
}

/// Record a failed attempt.
///
/// Increments `retry_count`; the entry goes back to PENDING with a backoff
/// deadline unless the failure is non-retryable or the policy is exhausted,
/// in which case it becomes FAILED.
pub async fn mark_failed(
    db: &Database,
    id: i64,
    failure: &DeliveryFailure,
    policy: &RetryPolicy,
) -> Result<QueueStatus, FlowbellError> {
    let failure = failure.clone();
    let policy = policy.clone();
    let now = now_ms();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let row: Option<(String, u32)> = tx
                .query_row(
                    "SELECT status, retry_count FROM notification_queue WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((status, retry_count)) = row else {
                return Ok(Err(None));
            };
            if status != QueueStatus::Processing.as_str() {
                return Ok(Err(Some(status)));
            }

            let retry_count = retry_count.saturating_add(1);
            let terminal = !failure.retryable || policy.is_exhausted(retry_count);
            let (next_status, next_attempt_at) = if terminal {
                (QueueStatus::Failed, None)
            } else {
                let delay = i64::try_from(policy.backoff_for(retry_count).as_millis())
                    .unwrap_or(i64::MAX);
                (QueueStatus::Pending, Some(now.saturating_add(delay)))
            };

            let attempt = failure.attempt.as_ref();
            tx.execute(
                "UPDATE notification_queue SET status = ?2, retry_count = ?3, \
                 last_attempt_at = ?4, next_attempt_at = ?5, error_message = ?6, \
                 http_url = COALESCE(?7, http_url), http_method = COALESCE(?8, http_method), \
                 http_response_code = ?9, http_response_body = ?10, http_duration_ms = ?11 \
                 WHERE id = ?1",
                params![
                    id,
                    next_status.as_str(),
                    retry_count,
                    now,
                    next_attempt_at,
                    failure.message,
                    attempt.map(|a| a.url.clone()),
                    attempt.map(|a| a.method.clone()),
                    attempt.and_then(|a| a.response_code),
                    attempt.and_then(|a| a.response_body.clone()),
                    attempt.map(|a| a.duration_ms),
                ],
            )?;
            tx.commit()?;
            Ok(Ok(next_status))
        })
        .await
        .map_err(map_tr_err)?;

    outcome.map_err(|current| transition_error(id, current, QueueStatus::Failed))
}

/// User-triggered FAILED -> PENDING.
///
/// The retry count is kept, so an entry that already used its retries gets
/// exactly one more attempt.
pub async fn retry(db: &Database, id: i64) -> Result<bool, FlowbellError> {
    let (updated, exists) = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE notification_queue SET status = 'PENDING', next_attempt_at = NULL \
                 WHERE id = ?1 AND status = 'FAILED'",
                params![id],
            )?;
            let exists = n == 1 || current_status(conn, id)?.is_some();
            Ok((n, exists))
        })
        .await
        .map_err(map_tr_err)?;

    if !exists {
        return Err(FlowbellError::NotFound(format!("queue entry {id}")));
    }
    Ok(updated == 1)
}

/// Delete entries whose notification is older than `days`, leaving
/// PROCESSING entries alone.
pub async fn purge_older_than(db: &Database, days: u32) -> Result<u64, FlowbellError> {
    let cutoff = now_ms().saturating_sub(i64::from(days) * DAY_MS);
    let deleted = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM notification_queue \
                 WHERE timestamp < ?1 AND status != 'PROCESSING'",
                params![cutoff],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    Ok(deleted as u64)
}

/// Revert every PROCESSING entry to PENDING.
pub async fn recover_processing(db: &Database) -> Result<u64, FlowbellError> {
    let recovered = db
        .connection()
        .call(|conn| {
            let n = conn.execute(
                "UPDATE notification_queue SET status = 'PENDING' WHERE status = 'PROCESSING'",
                [],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    Ok(recovered as u64)
}

/// Hands one claimed entry back: PROCESSING -> PENDING, retry count untouched.
pub async fn release(db: &Database, id: i64) -> Result<bool, FlowbellError> {
    let updated = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE notification_queue SET status = 'PENDING', next_attempt_at = NULL \
                 WHERE id = ?1 AND status = 'PROCESSING'",
                params![id],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    Ok(updated == 1)
}

pub async fn get_entry(db: &Database, id: i64) -> Result<Option<QueueEntry>, FlowbellError> {
    db.connection()
        .call(move |conn| {
            let entry = conn
                .query_row(
                    &format!("SELECT {ENTRY_COLUMNS} FROM notification_queue WHERE id = ?1"),
                    params![id],
                    row_to_entry,
                )
                .optional()?;
            Ok(entry)
        })
        .await
        .map_err(map_tr_err)
}

/// Page through entries, newest first.
pub async fn list_entries(
    db: &Database,
    filter: &QueueFilter,
) -> Result<Vec<QueueEntry>, FlowbellError> {
    let mut clauses = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(status) = filter.status {
        values.push(Value::Text(status.as_str().to_string()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(package) = &filter.package_name {
        values.push(Value::Text(package.clone()));
        clauses.push(format!("package_name = ?{}", values.len()));
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    values.push(Value::Integer(i64::from(filter.limit)));
    let limit_idx = values.len();
    values.push(Value::Integer(i64::from(filter.offset)));
    let offset_idx = values.len();

    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM notification_queue {where_clause} \
         ORDER BY timestamp DESC, id DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}
