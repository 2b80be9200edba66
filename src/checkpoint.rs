//! Durable ingestion progress.
//!
//! The checkpoint is the single record that makes a multi-week run
//! resumable: partition and page cursors, counters, a bounded error log,
//! and timing data. It is persisted as one flat JSON object with a
//! temp-file-and-rename write so a reader never observes a partial file,
//! and all mutation goes through the narrow helpers here rather than ad
//! hoc field writes in the run loop.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Oldest entries are dropped past this many logged errors.
pub const ERROR_LOG_CAP: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionCheckpoint {
    /// Approximate total item count across all partitions. Feeds the ETA
    /// and percent display only — loop termination is empty-page driven.
    pub total_expected: u64,
    /// Items attempted (transformed and buffered), persisted or not.
    pub processed: u64,
    /// Loader-confirmed writes.
    pub inserted: u64,
    /// Items the sink resolved as already-present duplicates.
    pub skipped: u64,
    pub partition_index: usize,
    pub current_partition: String,
    pub current_page: u32,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl IngestionCheckpoint {
    pub fn new(first_partition: &str, total_expected: u64, now: DateTime<Utc>) -> Self {
        Self {
            total_expected,
            processed: 0,
            inserted: 0,
            skipped: 0,
            partition_index: 0,
            current_partition: first_partition.to_string(),
            current_page: 1,
            errors: Vec::new(),
            started_at: now,
            updated_at: now,
            estimated_completion: None,
        }
    }

    /// Count attempted items. Attempted is not persisted — the insert and
    /// skip counters track what the sink confirmed.
    pub fn record_processed(&mut self, count: u64) {
        self.processed += count;
        self.updated_at = Utc::now();
    }

    /// Account one batch flush: `written` rows confirmed by the sink out
    /// of `attempted`. The difference is deduplication, not failure.
    pub fn record_flush(&mut self, attempted: usize, written: usize) {
        self.inserted += written as u64;
        self.skipped += attempted.saturating_sub(written) as u64;
        self.updated_at = Utc::now();
        self.refresh_eta(self.updated_at);
    }

    /// Append to the bounded error log, dropping the oldest entry past
    /// the cap.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let now = Utc::now();
        self.errors
            .push(format!("{} {}", now.format("%Y-%m-%dT%H:%M:%SZ"), message.into()));
        if self.errors.len() > ERROR_LOG_CAP {
            let excess = self.errors.len() - ERROR_LOG_CAP;
            self.errors.drain(..excess);
        }
        self.updated_at = now;
    }

    pub fn advance_page(&mut self) {
        self.current_page += 1;
        self.updated_at = Utc::now();
    }

    /// Move to the next partition, resetting the page cursor. `next` is
    /// the partition's name, or `None` when the run is exhausted.
    pub fn advance_partition(&mut self, next: Option<&str>) {
        self.partition_index += 1;
        self.current_page = 1;
        if let Some(name) = next {
            self.current_partition = name.to_string();
        }
        self.updated_at = Utc::now();
    }

    /// Recompute the estimated completion time from elapsed-per-item.
    /// Published only when the computation is finite and non-negative;
    /// otherwise the estimate is absent, never a garbage value.
    pub fn refresh_eta(&mut self, now: DateTime<Utc>) {
        self.estimated_completion = None;
        if self.processed == 0 {
            return;
        }
        let elapsed = (now - self.started_at).num_seconds();
        if elapsed <= 0 {
            return;
        }
        let per_item = elapsed as f64 / self.processed as f64;
        let remaining_secs = per_item * self.remaining() as f64;
        if !remaining_secs.is_finite() || remaining_secs < 0.0 || remaining_secs > i32::MAX as f64 {
            return;
        }
        self.estimated_completion = Some(now + Duration::seconds(remaining_secs as i64));
    }

    pub fn remaining(&self) -> u64 {
        self.total_expected.saturating_sub(self.processed)
    }

    pub fn percent_complete(&self) -> f64 {
        if self.total_expected == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total_expected as f64 * 100.0).min(100.0)
    }
}

/// Owns the checkpoint file. Single writer — only the orchestrator saves.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted checkpoint. Absence means start fresh; a file
    /// that exists but cannot be parsed is an error, not a silent
    /// restart.
    pub fn load(&self) -> Result<Option<IngestionCheckpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read checkpoint: {}", self.path.display()))?;
        let checkpoint = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt checkpoint file: {}", self.path.display()))?;
        Ok(Some(checkpoint))
    }

    /// Persist the full checkpoint atomically: write a sibling temp file,
    /// then rename over the target.
    pub fn save(&self, checkpoint: &IngestionCheckpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(checkpoint)?;
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write checkpoint: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to persist checkpoint: {}", self.path.display()))?;
        Ok(())
    }

    /// Remove the checkpoint file. Returns whether one existed.
    pub fn reset(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove checkpoint: {}", self.path.display()))?;
        Ok(true)
    }
}

/// CLI entry point for `fdsync reset` — the operator-level restart.
pub fn run_reset(config: &Config, yes: bool) -> Result<()> {
    let store = CheckpointStore::new(&config.checkpoint.path);

    if !yes {
        eprint!(
            "Delete checkpoint {} and start the next run from scratch? [y/N] ",
            store.path().display()
        );
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("aborted");
            return Ok(());
        }
    }

    if store.reset()? {
        println!("checkpoint removed — next run starts fresh");
    } else {
        println!("no checkpoint to remove");
    }
    Ok(())
}
