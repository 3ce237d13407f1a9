use std::collections::VecDeque;

use crate::batch::RowBatch;
use crate::error::SourceError;

/// A lazy, finite, forward-only stream of row batches.
///
/// The aggregation engine depends only on this trait:
/// - `next_batch` is a blocking pull; `Ok(None)` marks the end of the stream
/// - a source is not restartable; re-reading requires opening the underlying data again
/// - batches contain only the columns the source was opened with
pub trait BatchSource {
    fn next_batch(&mut self) -> Result<Option<RowBatch>, SourceError>;

    /// Length of the underlying data in bytes, if known up front.
    ///
    /// Used together with [`RowBatch::byte_offset`] for progress reporting.
    fn total_bytes(&self) -> Option<u64> {
        None
    }
}

impl<S: BatchSource + ?Sized> BatchSource for &mut S {
    fn next_batch(&mut self) -> Result<Option<RowBatch>, SourceError> {
        (**self).next_batch()
    }

    fn total_bytes(&self) -> Option<u64> {
        (**self).total_bytes()
    }
}

impl<S: BatchSource + ?Sized> BatchSource for Box<S> {
    fn next_batch(&mut self) -> Result<Option<RowBatch>, SourceError> {
        (**self).next_batch()
    }

    fn total_bytes(&self) -> Option<u64> {
        (**self).total_bytes()
    }
}

/// Batches that are already in memory, delivered in order.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    batches: VecDeque<RowBatch>,
}

impl InMemorySource {
    pub fn new(batches: impl IntoIterator<Item = RowBatch>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
        }
    }

    pub fn push(&mut self, batch: RowBatch) {
        self.batches.push_back(batch);
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl BatchSource for InMemorySource {
    fn next_batch(&mut self) -> Result<Option<RowBatch>, SourceError> {
        Ok(self.batches.pop_front())
    }
}
