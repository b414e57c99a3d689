// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `flowbell status` command implementation.
//!
//! Reads queue statistics straight from the database and probes the local
//! gateway's health endpoint to tell whether `flowbell serve` is running.

use std::io::IsTerminal;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use flowbell_config::FlowbellConfig;
use flowbell_core::{FlowbellError, StorageAdapter};
use flowbell_pipeline::{QueueHealth, StatisticsAggregator, StatisticsSnapshot};

use crate::serve::open_stores;

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    uptime_secs: u64,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub gateway_url: String,
    pub queue: StatisticsSnapshot,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Ask the running gateway for its uptime. `None` when nothing answers.
async fn probe_gateway(url: &str) -> Option<u64> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .ok()?;
    let resp = client.get(url).send().await.ok()?;
    if !resp.status().is_success() {
        return None;
    }
    resp.json::<HealthResponse>()
        .await
        .ok()
        .map(|health| health.uptime_secs)
}

/// Run the `flowbell status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(
    config: &FlowbellConfig,
    json: bool,
    plain: bool,
) -> Result<(), FlowbellError> {
    let (storage, _) = open_stores(config).await?;
    let snapshot = StatisticsAggregator::new(storage.clone(), config.health.clone())
        .snapshot()
        .await;
    storage.close().await?;
    let snapshot = snapshot?;

    let gateway_url = format!(
        "http://{}:{}/v1/health",
        config.gateway.host, config.gateway.port
    );
    let uptime = if config.gateway.enabled {
        probe_gateway(&gateway_url).await
    } else {
        None
    };

    let status = StatusResponse {
        running: uptime.is_some(),
        uptime_secs: uptime,
        uptime_human: uptime.map(format_uptime),
        gateway_url,
        queue: snapshot,
    };

    if json {
        let rendered = serde_json::to_string_pretty(&status)
            .map_err(|e| FlowbellError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status, use_color);
    }
    Ok(())
}

fn print_status(status: &StatusResponse, use_color: bool) {
    use colored::Colorize;

    println!();
    println!("  flowbell status");
    println!("  {}", "-".repeat(35));

    match (&status.uptime_human, use_color) {
        (Some(uptime), true) => {
            println!("    State:    {} running (uptime: {uptime})", "✓".green())
        }
        (Some(uptime), false) => println!("    State:    [OK] running (uptime: {uptime})"),
        (None, true) => println!("    State:    {} {}", "✗".red(), "not running".red()),
        (None, false) => println!("    State:    [FAIL] not running"),
    }

    let queue = &status.queue;
    let health = match queue.health {
        QueueHealth::Healthy => "healthy",
        QueueHealth::Warning => "warning",
        QueueHealth::Critical => "critical",
    };
    let health = match (queue.health, use_color) {
        (_, false) => health.normal(),
        (QueueHealth::Healthy, true) => health.green(),
        (QueueHealth::Warning, true) => health.yellow(),
        (QueueHealth::Critical, true) => health.red(),
    };
    println!("    Queue:    {health}");
    println!(
        "    Entries:  {} total, {} pending, {} processing, {} sent, {} failed",
        queue.total,
        queue.counts.pending,
        queue.counts.processing,
        queue.counts.sent,
        queue.counts.failed
    );
    println!(
        "    Success:  {} (failure {})",
        percent(queue.success_rate),
        percent(queue.failure_rate)
    );
    println!(
        "    Weekly:   {} this week, {} last week ({:+.1}%)",
        queue.this_week,
        queue.last_week,
        queue.weekly_trend * 100.0
    );
    for app in &queue.top_failing_apps {
        println!("    Failing:  {} ({})", app.package_name, app.failures);
    }

    if !status.running {
        println!();
        println!("  Start with: flowbell serve");
    }
    println!();
}
