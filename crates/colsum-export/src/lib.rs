//! Consumers of [`colsum_core::AggregationResult`]: CSV export and plain-text rendering.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

mod atomic;
mod csv_out;
mod table;

pub use atomic::export_bytes;
pub use csv_out::{
    export_results_csv, write_results_csv, CsvExportOptions, COLUMN_HEADER, GROUP_HEADER,
    SUM_HEADER, VALID_COUNT_HEADER,
};
pub use table::{render_pivot, render_table};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Creating, syncing or renaming the output file failed.
    #[error("cannot write {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid output delimiter {0:?}")]
    InvalidDelimiter(char),
}
