//! Ingestion pipeline orchestration.
//!
//! Drives the full fetch → transform → load loop across provider
//! partitions, checkpointing after every flush so a multi-week run
//! survives interruption and resumes at the exact partition and page it
//! left off.
//!
//! Failure policy: page-level failures are logged into the checkpoint
//! and skipped — one bad page must not halt the run. Run-level failures
//! (bad credentials, a throttle wait past the ceiling, an unwritable
//! checkpoint) terminate, but only after best-effort flush and persist,
//! so `fdsync resume` is always safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;

use crate::checkpoint::{CheckpointStore, IngestionCheckpoint};
use crate::config::Config;
use crate::db;
use crate::fetch::{FetchClient, FetchError};
use crate::load::{IngredientSink, SqliteSink};
use crate::models::NormalizedIngredient;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::transform::{transform, NutrientCodes};

/// Fallback per-partition totals used when the count query fails. The
/// estimate only feeds ETA display, never loop termination.
const PARTITION_ESTIMATES: &[(&str, u64)] = &[
    ("Foundation", 800),
    ("SR Legacy", 7_800),
    ("Survey (FNDDS)", 26_000),
    ("Branded", 1_200_000),
];

const DEFAULT_PARTITION_ESTIMATE: u64 = 10_000;

pub async fn run_ingest(
    config: &Config,
    resume: bool,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    let store = CheckpointStore::new(&config.checkpoint.path);
    let fetcher = FetchClient::new(&config.api)?;
    let codes = NutrientCodes::from_name(&config.api.nutrient_codes)
        .context("invalid nutrient code table")?;

    let pool = db::connect(config).await?;
    let sink = SqliteSink::new(pool);

    let mut checkpoint = match store.load()? {
        Some(existing) => {
            if resume {
                println!(
                    "resuming at {} page {} ({} items processed)",
                    existing.current_partition, existing.current_page, existing.processed
                );
            } else {
                println!(
                    "checkpoint found — continuing existing run (use `fdsync reset` to start over)"
                );
            }
            existing
        }
        None => {
            if resume {
                bail!("no checkpoint to resume — run `fdsync run` first");
            }
            init_checkpoint(config, &fetcher, reporter).await
        }
    };

    let shutdown = shutdown_flag();
    let data_types = &config.ingest.data_types;
    let mut buffer: Vec<NormalizedIngredient> = Vec::with_capacity(config.ingest.batch_size);
    let mut since_persist: u64 = 0;

    while checkpoint.partition_index < data_types.len() {
        let partition = data_types[checkpoint.partition_index].clone();

        loop {
            // Cancellation is honored between pages, never mid-batch, so
            // the buffer can be flushed and the position persisted.
            if shutdown.load(Ordering::Relaxed) {
                if let Err(e) = flush(&sink, &mut buffer, &mut checkpoint).await {
                    checkpoint.record_error(format!("flush on shutdown: {}", e));
                }
                store.save(&checkpoint)?;
                println!("interrupted — progress saved, run `fdsync resume` to continue");
                return Ok(());
            }

            let page = match fetcher.fetch_page(&partition, checkpoint.current_page).await {
                Ok(page) => page,
                Err(FetchError::Transient(message)) => {
                    // One bad page must not halt a multi-week run: log it,
                    // move past it, keep going.
                    checkpoint.record_error(format!(
                        "{} page {}: {}",
                        partition, checkpoint.current_page, message
                    ));
                    checkpoint.advance_page();
                    store.save(&checkpoint)?;
                    continue;
                }
                Err(fatal) => {
                    if let Err(e) = flush(&sink, &mut buffer, &mut checkpoint).await {
                        checkpoint.record_error(format!("flush on halt: {}", e));
                    }
                    checkpoint.record_error(fatal.to_string());
                    store.save(&checkpoint)?;
                    return Err(fatal).context("ingestion halted — checkpoint saved, resume later");
                }
            };

            if page.foods.is_empty() {
                break;
            }

            for food in &page.foods {
                buffer.push(transform(food, codes, Utc::now()));
            }
            checkpoint.record_processed(page.foods.len() as u64);
            since_persist += page.foods.len() as u64;

            reporter.report(ProgressEvent::Ingesting {
                partition: partition.clone(),
                page: checkpoint.current_page,
                processed: checkpoint.processed,
                total: checkpoint.total_expected,
            });

            checkpoint.advance_page();

            if buffer.len() >= config.ingest.batch_size {
                flush(&sink, &mut buffer, &mut checkpoint).await?;
                store.save(&checkpoint)?;
                since_persist = 0;
            } else if since_persist >= config.ingest.checkpoint_every {
                // Mid-batch progress is recoverable too: the page cursor
                // is durable even when the buffer has not flushed yet.
                checkpoint.refresh_eta(Utc::now());
                store.save(&checkpoint)?;
                since_persist = 0;
            }
        }

        // Partition exhausted: drain, then move on with the page cursor
        // reset.
        flush(&sink, &mut buffer, &mut checkpoint).await?;
        let next = data_types
            .get(checkpoint.partition_index + 1)
            .map(String::as_str);
        checkpoint.advance_partition(next);
        store.save(&checkpoint)?;
    }

    // Final drain (a no-op unless the last partition ended mid-batch).
    flush(&sink, &mut buffer, &mut checkpoint).await?;
    store.save(&checkpoint)?;

    println!("ingest complete");
    println!("  partitions: {}", data_types.len());
    println!("  processed: {} items", checkpoint.processed);
    println!("  inserted: {}", checkpoint.inserted);
    println!("  duplicates skipped: {}", checkpoint.skipped);
    println!("  errors logged: {}", checkpoint.errors.len());
    println!("ok");

    Ok(())
}

/// Size a fresh run: count every partition up front. The count query is
/// allowed to fail — an approximate total only affects the ETA display,
/// so any failure falls back to the built-in estimate table.
async fn init_checkpoint(
    config: &Config,
    fetcher: &FetchClient,
    reporter: &dyn ProgressReporter,
) -> IngestionCheckpoint {
    let mut total: u64 = 0;

    for data_type in &config.ingest.data_types {
        reporter.report(ProgressEvent::Counting {
            partition: data_type.clone(),
        });
        let count = match fetcher.count_partition(data_type).await {
            Ok(count) => count,
            Err(e) => {
                let estimate = estimate_for(data_type);
                eprintln!(
                    "Warning: count query failed for {} ({}) — using estimate {}",
                    data_type, e, estimate
                );
                estimate
            }
        };
        total += count;
    }

    IngestionCheckpoint::new(&config.ingest.data_types[0], total, Utc::now())
}

fn estimate_for(data_type: &str) -> u64 {
    PARTITION_ESTIMATES
        .iter()
        .find(|(name, _)| *name == data_type)
        .map(|(_, estimate)| *estimate)
        .unwrap_or(DEFAULT_PARTITION_ESTIMATE)
}

/// Flush the batch buffer through the sink and account the result. The
/// buffer is cleared only after the sink call returns — a failed call
/// leaves the records with the caller.
async fn flush(
    sink: &dyn IngredientSink,
    buffer: &mut Vec<NormalizedIngredient>,
    checkpoint: &mut IngestionCheckpoint,
) -> Result<()> {
    if buffer.is_empty() {
        return Ok(());
    }
    let written = sink
        .upsert_batch(buffer)
        .await
        .context("batch upsert failed")?;
    checkpoint.record_flush(buffer.len(), written);
    buffer.clear();
    Ok(())
}

/// Cooperative shutdown: ctrl-c flips a flag the page loop checks, so
/// the process exits between pages with its buffer flushed.
fn shutdown_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handle = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.store(true, Ordering::Relaxed);
            eprintln!("\nshutdown requested — finishing current page");
        }
    });
    flag
}
