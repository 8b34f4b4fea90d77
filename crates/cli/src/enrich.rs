//! Row enrichment: call an LLM once per row on a worker pool and write the
//! results back in batches.
//!
//! Workers only compute. All snapshot mutation and every sheet write happen
//! on the calling thread, one `DataSheet::update` per batch. Results arrive
//! in completion order; each carries its row index, so batch order does not
//! matter for the cells written.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use serde::Serialize;

use iter8_llm::is_error_reply;
use iter8_sheet::{CellValue, DataSheet, Record, SheetError, Worksheet};

/// Per-row enrichment. Gets the row index and the row as a record, returns
/// the fields to write into that row.
pub type Enricher = Arc<dyn Fn(usize, &Record) -> Result<Record, String> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Concurrent enricher calls
    pub workers: usize,
    /// Completed rows per sheet write
    pub update_batch_size: usize,
    /// Skip rows where every one of these columns already holds a value
    pub skip_when_filled: Vec<String>,
    /// Stop submitting after this many rows
    pub max_rows: Option<usize>,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            update_batch_size: 20,
            skip_when_filled: Vec::new(),
            max_rows: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    /// Rows handed to the enricher
    pub submitted: usize,
    pub skipped: usize,
    pub succeeded: usize,
    /// Rows whose enricher call errored or returned an error reply
    pub failed: usize,
    /// Batch writes attempted
    pub flushes: usize,
    pub failed_flushes: usize,
    /// Descriptors written (headers + cells)
    pub cells_written: usize,
}

type Job = (usize, Record);
type Outcome = (usize, Result<Record, String>);

/// Enrich `rows` of `sheet` and write the results back.
///
/// Row indices outside the snapshot are ignored. Failed rows, including an
/// enricher panic, are logged and left alone; a failed batch write is logged and the run continues.
pub fn run_enrichment<W, I>(
    sheet: &mut DataSheet<W>,
    rows: I,
    enricher: Enricher,
    opts: &EnrichOptions,
) -> EnrichReport
where
    W: Worksheet,
    I: IntoIterator<Item = usize>,
{
    let mut report = EnrichReport::default();
    let mut jobs: VecDeque<Job> = VecDeque::new();

    for row in rows {
        if opts.max_rows.is_some_and(|max| jobs.len() >= max) {
            break;
        }
        let Some(record) = sheet.table().record(row) else {
            log::warn!("Row {} is past the end of the sheet; ignored", row);
            continue;
        };
        if should_skip(&record, &opts.skip_when_filled) {
            report.skipped += 1;
            continue;
        }
        jobs.push_back((row, record));
    }

    report.submitted = jobs.len();
    if jobs.is_empty() {
        log::info!("Nothing to enrich ({} rows skipped)", report.skipped);
        return report;
    }

    let workers = opts.workers.max(1).min(jobs.len());
    let batch_size = opts.update_batch_size.max(1);
    log::info!(
        "Enriching {} rows with {} workers, writing every {} results",
        report.submitted,
        workers,
        batch_size
    );

    let queue = Arc::new(Mutex::new(jobs));
    let (tx, rx) = mpsc::channel::<Outcome>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let enricher = Arc::clone(&enricher);
            let tx = tx.clone();
            scope.spawn(move || loop {
                let next = match queue.lock() {
                    Ok(mut q) => q.pop_front(),
                    Err(_) => None,
                };
                let Some((row, record)) = next else { break };
                let result = panic::catch_unwind(AssertUnwindSafe(|| enricher(row, &record)))
                    .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
                if tx.send((row, result)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        let mut pending: Vec<(usize, Record)> = Vec::with_capacity(batch_size);
        for (row, result) in rx {
            match result {
                Ok(fields) if is_error_reply(&fields) => {
                    report.failed += 1;
                    let msg = fields.get("error").and_then(|e| e.as_str()).unwrap_or_default();
                    log::warn!("Error processing row {}: {}", row, msg);
                }
                Ok(fields) => {
                    report.succeeded += 1;
                    pending.push((row, fields));
                    if pending.len() >= batch_size {
                        flush(sheet, &mut pending, &mut report);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    log::warn!("Error processing row {}: {}", row, e);
                }
            }
        }
        flush(sheet, &mut pending, &mut report);
    });

    log::info!(
        "Enrichment done: {} succeeded, {} failed, {} skipped, {} cells written",
        report.succeeded,
        report.failed,
        report.skipped,
        report.cells_written
    );
    report
}

/// True when every `columns` entry is filled in `record`. Null and blank
/// cells are unfilled. An empty list never skips.
fn should_skip(record: &Record, columns: &[String]) -> bool {
    !columns.is_empty()
        && columns
            .iter()
            .all(|c| record.get(c).is_some_and(|v| !v.is_null() && v.as_str() != Some("")))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("enricher panicked: {}", detail)
}

fn flush<W: Worksheet>(sheet: &mut DataSheet<W>, pending: &mut Vec<(usize, Record)>, report: &mut EnrichReport) {
    if pending.is_empty() {
        return;
    }
    let batch = std::mem::take(pending);
    report.flushes += 1;

    let result = sheet.update(|table| -> Result<(), SheetError> {
        for (row, fields) in &batch {
            table.set_fields(*row, fields.iter().map(|(k, v)| (k, CellValue::from_json(v))))?;
        }
        Ok(())
    });

    match result {
        Ok(outcome) => {
            report.cells_written += outcome.written();
            log::info!("Flushed {} rows ({} cells)", batch.len(), outcome.written());
        }
        Err(e) => {
            report.failed_flushes += 1;
            log::error!("Failed to write {} enriched rows: {}", batch.len(), e);
        }
    }
}
