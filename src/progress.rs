//! Ingestion progress reporting.
//!
//! Reports observable progress during `fdsync run` / `fdsync resume` so
//! operators see which partition and page the loop is on and how much is
//! left. Progress is emitted on **stderr** so stdout remains parseable
//! for scripts.

use std::io::Write;

/// A single progress event from the ingestion loop.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Sizing a fresh run: counting one partition (no totals yet).
    Counting { partition: String },
    /// Page processed: n items done out of the (approximate) total.
    Ingesting {
        partition: String,
        page: u32,
        processed: u64,
        total: u64,
    },
}

/// Reports ingestion progress. Implementations write to stderr (human or
/// JSON).
pub trait ProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the ingestion loop.
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr:
/// "ingest Branded p.412  31,204 / 1,200,000 items".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Counting { partition } => {
                format!("ingest {}  counting...\n", partition)
            }
            ProgressEvent::Ingesting {
                partition,
                page,
                processed,
                total,
            } => {
                format!(
                    "ingest {} p.{}  {} / {} items\n",
                    partition,
                    page,
                    format_number(*processed),
                    format_number(*total)
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Counting { partition } => serde_json::json!({
                "event": "progress",
                "partition": partition,
                "phase": "counting"
            }),
            ProgressEvent::Ingesting {
                partition,
                page,
                processed,
                total,
            } => serde_json::json!({
                "event": "progress",
                "partition": partition,
                "phase": "ingesting",
                "page": page,
                "processed": processed,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller passes it to the ingest loop.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
