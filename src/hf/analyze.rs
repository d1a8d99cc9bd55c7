//! Parallel high-frequency analysis: the full-table scan that learns
//! which k-mers occur in too many rows to be useful for scoring.
//!
//! Workers pull block numbers from a shared atomic cursor, count each
//! row's *distinct* k-mers into a worker-local table, and hand filled
//! tables to the coordinator over a channel; the coordinator merges as
//! they arrive.  Because the merge is a commutative sum and the
//! surviving keys are sorted before persisting, the output depends only
//! on the row multiset, never on worker count, scheduling, or the
//! physical partitioning of the parent.
//!
//! Any worker error (or a tripped cancellation flag, polled between
//! blocks) aborts the whole analysis and nothing is persisted; the
//! stored set is replaced only after every threshold survivor is known.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;

use crate::cancel::CancelToken;
use crate::config::{Config, Params};
use crate::error::{Error, Result};
use crate::hf::counter::CounterTable;
use crate::kmer::extract::row_distinct_kmers;
use crate::storage::{FieldId, HfMeta, HfStore, ParentId, RowSource};

/// Operational knobs for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Worker threads; 0 selects the core count.
    pub workers: usize,
    /// Rows scanned between hand-offs to the coordinator.
    pub batch: usize,
    /// Initial distinct-k-mer capacity of each worker table.
    pub hashtable_size: usize,
}

impl AnalyzeOptions {
    pub fn from_config(config: &Config) -> Self {
        AnalyzeOptions {
            workers: config.analysis_workers,
            batch: config.hf_analysis_batch,
            hashtable_size: config.hf_analysis_hashtable_size,
        }
    }

    fn effective_workers(&self, blocks: u64) -> usize {
        let w = if self.workers > 0 {
            self.workers
        } else {
            num_cpus::get()
        };
        w.max(1).min(blocks.max(1) as usize)
    }
}

/// Summary of a completed analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub total_rows: u64,
    pub hf_count: u64,
    pub duration: Duration,
}

/// Scan every row of `(parent, field)`, count per-k-mer row occurrences,
/// and persist the keys passing either threshold together with their
/// parameter tuple.
pub fn analyze_high_frequency(
    source: &dyn RowSource,
    store: &dyn HfStore,
    parent_id: ParentId,
    field_id: FieldId,
    params: &Params,
    opts: &AnalyzeOptions,
    cancel: &CancelToken,
) -> Result<AnalysisReport> {
    let started = Instant::now();
    let total_rows = source.total_rows()?;
    let blocks = source.block_count();
    let workers = opts.effective_workers(blocks);
    let k = params.k();

    tracing::info!(
        parent_id,
        field_id,
        total_rows,
        blocks,
        workers,
        "high-frequency analysis started"
    );

    let cursor = AtomicU64::new(0);
    // Internal abort flag, distinct from the host token: a worker failure
    // must stop the run without leaving the host's token tripped.
    let abort = CancelToken::new();
    let (tx, rx) = bounded::<CounterTable>(workers * 2);
    let mut merged = CounterTable::with_capacity(opts.hashtable_size);

    let worker_results: Vec<Result<()>> = std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let tx = tx.clone();
            let cursor = &cursor;
            let abort = &abort;
            handles.push(scope.spawn(move || -> Result<()> {
                let result =
                    worker_loop(source, cursor, blocks, k, opts, cancel, abort, &tx);
                if result.is_err() {
                    abort.cancel();
                }
                result
            }));
        }
        drop(tx);
        // Merge as tables arrive.  Keep draining even after a merge
        // failure so no worker ever blocks on a full channel.
        let mut merge_err = None;
        for table in rx.iter() {
            if merge_err.is_none() {
                if let Err(e) = merged.merge(&table) {
                    abort.cancel();
                    merge_err = Some(e);
                }
            }
        }
        let mut results: Vec<Result<()>> = handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(Error::Internal("analysis worker panicked".into())))
            })
            .collect();
        if let Some(e) = merge_err {
            results.push(Err(e));
        }
        results
    });

    // Surface the root cause: an aborted run makes the other workers
    // report Cancelled, which must not mask the original error.
    let mut cancelled = false;
    for result in worker_results {
        match result {
            Ok(()) => {}
            Err(Error::Cancelled) => cancelled = true,
            Err(e) => return Err(e),
        }
    }
    if cancelled {
        return Err(Error::Cancelled);
    }
    cancel.check()?;

    // Threshold selection.  Surviving k-mers persist as keys with an
    // empty rank field, sorted so the output is canonical.
    let r = params.r();
    let rate_max = params.rate_max();
    let nrow_max = params.nrow_max();
    let mut hf_keys: Vec<u64> = merged
        .iter()
        .filter(|&(_, count)| {
            (total_rows > 0 && count as f64 / total_rows as f64 >= rate_max)
                || (nrow_max > 0 && count >= nrow_max)
        })
        .map(|(kmer, _)| kmer << r)
        .collect();
    hf_keys.sort_unstable();

    let duration = started.elapsed();
    let meta = HfMeta {
        parent_id,
        field_id,
        k,
        r,
        rate_max,
        nrow_max,
        total_rows,
        hf_count: hf_keys.len() as u64,
        duration_secs: duration.as_secs_f64(),
    };
    store.replace(&meta, &hf_keys)?;

    tracing::info!(
        parent_id,
        field_id,
        total_rows,
        hf_count = hf_keys.len(),
        ?duration,
        "high-frequency analysis complete"
    );

    Ok(AnalysisReport {
        total_rows,
        hf_count: hf_keys.len() as u64,
        duration,
    })
}

/// One worker: pull blocks from the cursor, count distinct k-mers per
/// row, hand filled tables to the coordinator every `batch` rows.
#[allow(clippy::too_many_arguments)]
fn worker_loop(
    source: &dyn RowSource,
    cursor: &AtomicU64,
    blocks: u64,
    k: u32,
    opts: &AnalyzeOptions,
    cancel: &CancelToken,
    abort: &CancelToken,
    tx: &crossbeam_channel::Sender<CounterTable>,
) -> Result<()> {
    let mut local = CounterTable::with_capacity(opts.hashtable_size);
    let mut kmers = Vec::new();
    let mut rows_since_flush = 0usize;
    loop {
        cancel.check()?;
        abort.check()?;
        let block = cursor.fetch_add(1, Ordering::Relaxed);
        if block >= blocks {
            break;
        }
        for seq in source.read_block(block)? {
            row_distinct_kmers(&seq, k, &mut kmers)?;
            for &kmer in &kmers {
                local.increment(kmer, 1)?;
            }
            rows_since_flush += 1;
            if rows_since_flush >= opts.batch {
                let table = std::mem::replace(
                    &mut local,
                    CounterTable::with_capacity(opts.hashtable_size),
                );
                tx.send(table)
                    .map_err(|_| Error::Internal("analysis coordinator hung up".into()))?;
                rows_since_flush = 0;
            }
        }
    }
    if !local.is_empty() {
        tx.send(local)
            .map_err(|_| Error::Internal("analysis coordinator hung up".into()))?;
    }
    Ok(())
}
