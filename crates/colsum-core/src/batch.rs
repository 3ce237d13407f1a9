use std::sync::Arc;

use crate::value::CellValue;

/// One selected column of a [`RowBatch`].
#[derive(Clone, Debug, PartialEq)]
pub struct BatchColumn {
    pub name: Arc<str>,
    pub values: Vec<CellValue>,
}

impl BatchColumn {
    pub fn new(name: impl Into<Arc<str>>, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// A bounded, column-oriented slice of rows delivered by a batch source.
///
/// Only the selected columns are present; every column holds exactly `num_rows` values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowBatch {
    columns: Vec<BatchColumn>,
    num_rows: usize,
    byte_offset: Option<u64>,
}

impl RowBatch {
    /// Build a batch from equally-sized columns.
    ///
    /// Columns shorter than the longest one are padded with [`CellValue::Missing`], matching how
    /// short records are read from delimited files.
    pub fn new(mut columns: Vec<BatchColumn>) -> Self {
        let num_rows = columns.iter().map(|c| c.values.len()).max().unwrap_or(0);
        for column in &mut columns {
            if column.values.len() < num_rows {
                column.values.resize(num_rows, CellValue::Missing);
            }
        }
        Self {
            columns,
            num_rows,
            byte_offset: None,
        }
    }

    /// Convenience for tests and in-memory callers.
    pub fn from_columns<N, I>(columns: I) -> Self
    where
        N: Into<Arc<str>>,
        I: IntoIterator<Item = (N, Vec<CellValue>)>,
    {
        Self::new(
            columns
                .into_iter()
                .map(|(name, values)| BatchColumn::new(name, values))
                .collect(),
        )
    }

    /// Record how far into the source this batch ends, for progress reporting.
    pub fn with_byte_offset(mut self, offset: u64) -> Self {
        self.byte_offset = Some(offset);
        self
    }

    /// Row count for batches that carry no columns (every selected column was absent).
    pub(crate) fn with_num_rows(mut self, num_rows: usize) -> Self {
        if self.columns.is_empty() {
            self.num_rows = num_rows;
        }
        self
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn byte_offset(&self) -> Option<u64> {
        self.byte_offset
    }

    pub fn columns(&self) -> &[BatchColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_ref())
    }

    pub fn column(&self, name: &str) -> Option<&[CellValue]> {
        self.columns
            .iter()
            .find(|c| c.name.as_ref() == name)
            .map(|c| c.values.as_slice())
    }
}
