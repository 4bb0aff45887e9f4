// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! List writes waiting to sync.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tt_core::PendingOperation;

use super::open_queue;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::Result;

pub fn run(config: &Config, output: OutputFormat) -> Result<()> {
    let queue = open_queue(config)?;
    let text = format_pending(queue.peek_all(), Utc::now(), output)?;
    if !text.is_empty() {
        println!("{}", text);
    }
    Ok(())
}

#[derive(Serialize)]
struct PendingJson<'a> {
    #[serde(flatten)]
    op: &'a PendingOperation,
    age_secs: i64,
}

pub(crate) fn format_pending(
    ops: &[PendingOperation],
    now: DateTime<Utc>,
    output: OutputFormat,
) -> Result<String> {
    match output {
        OutputFormat::Json => {
            let rows: Vec<PendingJson> = ops
                .iter()
                .map(|op| PendingJson {
                    op,
                    age_secs: op.age(now).num_seconds(),
                })
                .collect();
            Ok(serde_json::to_string_pretty(&rows)?)
        }
        OutputFormat::Text => {
            if ops.is_empty() {
                return Ok("No pending operations".to_string());
            }
            let lines: Vec<String> = ops
                .iter()
                .map(|op| {
                    format!(
                        "{}  {}  {}  attempts={}  age={}",
                        op.id,
                        op.kind,
                        op.target_path,
                        op.attempt_count,
                        format_age(op.age(now))
                    )
                })
                .collect();
            Ok(lines.join("\n"))
        }
    }
}

fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3_600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3_600),
        s => format!("{}d", s / 86_400),
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
