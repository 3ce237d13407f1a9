//! Chunked, streaming sum and valid-count aggregation over delimited files.
//!
//! Sources are consumed one bounded [`RowBatch`] at a time, so files larger than memory can be
//! summed. Values that cannot be read as numbers are skipped and do not count as valid.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use colsum_core::{aggregate_path, AggregationConfig, LocaleOptions, NoProgress};
//!
//! let config = AggregationConfig::new(["quantita"]).with_group_column("categoria");
//! let result = aggregate_path(
//!     Path::new("vendite.csv"),
//!     &config,
//!     &LocaleOptions::european(),
//!     NoProgress,
//! )?;
//! for row in result.rows() {
//!     println!("{}\t{}\t{}\t{}", row.group, row.column, row.sum, row.valid_count);
//! }
//! # Ok::<(), colsum_core::AggregateError>(())
//! ```

#![forbid(unsafe_code)]

mod accumulator;
mod aggregate;
mod batch;
mod coerce;
mod config;
mod csv_reader;
mod error;
mod locale;
mod probe;
mod progress;
mod result;
mod source;
mod value;

pub use accumulator::{Accumulator, AccumulatorCell};
pub use aggregate::{aggregate, aggregate_path};
pub use batch::{BatchColumn, RowBatch};
pub use coerce::{coerce, coerce_str, Invalid};
pub use config::{AggregationConfig, ProbeOptions, DEFAULT_SAMPLE_ROWS};
pub use csv_reader::{ColumnSelection, CsvChunkReader, DEFAULT_BATCH_SIZE};
pub use error::{
    AggregateError, AggregateResult, ConfigError, SchemaError, SchemaErrorKind, SourceError,
};
pub use locale::{LocaleOptions, TextEncoding, DEFAULT_MISSING_TOKENS};
pub use probe::{
    probe_path, probe_schema, ColumnClassification, ProbedColumn, SchemaProbe,
    DEFAULT_TARGET_LIMIT,
};
pub use progress::{NoProgress, ProgressSink, ProgressUpdate, MAX_FRACTION_BEFORE_DONE};
pub use result::{AggregationResult, AggregationStats, ResultRow};
pub use source::{BatchSource, InMemorySource};
pub use value::{CellValue, GroupKey};
