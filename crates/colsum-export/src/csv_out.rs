use std::io::Write;
use std::path::Path;

use colsum_core::AggregationResult;

use crate::atomic::write_atomically;
use crate::ExportError;

/// Header of the group column in exported files.
pub const GROUP_HEADER: &str = "Group";
pub const COLUMN_HEADER: &str = "Column";
pub const SUM_HEADER: &str = "Sum";
pub const VALID_COUNT_HEADER: &str = "ValidCount";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsvExportOptions {
    pub delimiter: u8,
    /// Decimal separator for sums; `.` keeps the output machine-readable.
    pub decimal_separator: char,
}

impl Default for CsvExportOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            decimal_separator: '.',
        }
    }
}

impl CsvExportOptions {
    fn validate(&self) -> Result<(), ExportError> {
        if !self.delimiter.is_ascii()
            || matches!(self.delimiter, b'\n' | b'\r' | b'"')
            || self.delimiter as char == self.decimal_separator
        {
            return Err(ExportError::InvalidDelimiter(self.delimiter as char));
        }
        Ok(())
    }
}

/// Write one line per result row: `Group,Column,Sum,ValidCount`.
///
/// The group column is left out for ungrouped results. Sums are written at full precision.
pub fn write_results_csv<W: Write>(
    writer: W,
    result: &AggregationResult,
    options: &CsvExportOptions,
) -> Result<(), ExportError> {
    options.validate()?;

    let mut out = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(writer);

    let grouped = result.is_grouped();
    if grouped {
        out.write_record([GROUP_HEADER, COLUMN_HEADER, SUM_HEADER, VALID_COUNT_HEADER])?;
    } else {
        out.write_record([COLUMN_HEADER, SUM_HEADER, VALID_COUNT_HEADER])?;
    }

    for row in result.rows() {
        let sum = format_sum(row.sum, options.decimal_separator);
        let count = row.valid_count.to_string();
        if grouped {
            let group = row.group.to_string();
            out.write_record([
                group.as_str(),
                row.column.as_str(),
                sum.as_str(),
                count.as_str(),
            ])?;
        } else {
            out.write_record([row.column.as_str(), sum.as_str(), count.as_str()])?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Write the result set to `path`, replacing any existing file only once the write succeeded.
pub fn export_results_csv(
    path: &Path,
    result: &AggregationResult,
    options: &CsvExportOptions,
) -> Result<(), ExportError> {
    options.validate()?;
    write_atomically(path, |file| write_results_csv(file, result, options))
}

fn format_sum(sum: f64, decimal_separator: char) -> String {
    let text = sum.to_string();
    if decimal_separator == '.' {
        text
    } else {
        text.replace('.', &decimal_separator.to_string())
    }
}
