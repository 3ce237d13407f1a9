//! Drives a [`BatchSource`] through an [`Accumulator`].

use std::path::Path;

use crate::accumulator::Accumulator;
use crate::config::AggregationConfig;
use crate::csv_reader::CsvChunkReader;
use crate::error::{AggregateError, AggregateResult};
use crate::locale::LocaleOptions;
use crate::progress::{ProgressSink, ProgressTracker};
use crate::result::AggregationResult;
use crate::source::BatchSource;

/// Sum the configured columns of every batch `source` yields.
///
/// The configuration is validated before the first batch is pulled. Batches are folded one at a
/// time and dropped afterwards, so memory use is bounded by one batch plus the accumulator.
/// `progress` receives one update per folded batch and a final update with `done = true`, which is
/// only sent when the run succeeds.
///
/// Any failure discards the partial state; no partial result is returned.
pub fn aggregate<S, P>(
    mut source: S,
    config: &AggregationConfig,
    locale: &LocaleOptions,
    mut progress: P,
) -> AggregateResult<AggregationResult>
where
    S: BatchSource,
    P: ProgressSink,
{
    let mut accumulator = Accumulator::new(config, locale)?;
    let mut tracker = ProgressTracker::new(source.total_bytes());

    while let Some(batch) = source.next_batch()? {
        accumulator.fold(&batch)?;
        progress.on_progress(tracker.batch(batch.num_rows(), batch.byte_offset()));
    }

    let result = accumulator.finish();
    progress.on_progress(tracker.finish());

    log::info!(
        "aggregated {} rows in {} batches into {} result rows",
        tracker.rows(),
        tracker.batches(),
        result.rows().len()
    );
    if result.stats().rows_without_group > 0 {
        log::info!(
            "{} rows had no value in group column {:?} and were skipped",
            result.stats().rows_without_group,
            result.group_column().unwrap_or_default()
        );
    }
    Ok(result)
}

/// Open a delimited file and aggregate it.
///
/// Only the target and group columns are materialized. Configuration errors are reported without
/// opening the file, and selected columns missing from the header before any row is read.
pub fn aggregate_path<P: ProgressSink>(
    path: &Path,
    config: &AggregationConfig,
    locale: &LocaleOptions,
    progress: P,
) -> AggregateResult<AggregationResult> {
    config.validate()?;
    locale.validate()?;

    log::debug!(
        "aggregating {} (batch size {})",
        path.display(),
        config.batch_size
    );
    let reader = CsvChunkReader::open_path(path, locale, config.selection(), config.batch_size)?;

    let header = reader.header();
    let mut wanted = config.target_columns.iter().chain(&config.group_column);
    if let Some(column) = wanted.find(|name| !header.contains(name)) {
        return Err(AggregateError::ColumnAbsent {
            column: column.clone(),
            batch: 0,
        });
    }
    aggregate(reader, config, locale, progress)
}
