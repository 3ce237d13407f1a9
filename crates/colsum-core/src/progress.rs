/// Highest fraction reported while batches may still arrive.
pub const MAX_FRACTION_BEFORE_DONE: f64 = 0.99;

/// Progress of an aggregation run, reported after every folded batch and once at completion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressUpdate {
    /// Monotonic; at most [`MAX_FRACTION_BEFORE_DONE`] until `done`, then exactly `1.0`.
    pub fraction: f64,
    pub batches: u64,
    pub rows: u64,
    pub done: bool,
}

pub trait ProgressSink {
    fn on_progress(&mut self, update: ProgressUpdate);
}

impl<F: FnMut(ProgressUpdate)> ProgressSink for F {
    fn on_progress(&mut self, update: ProgressUpdate) {
        self(update)
    }
}

/// Discards progress updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _update: ProgressUpdate) {}
}

/// Turns batch arrivals into progress fractions.
///
/// With a known source length the fraction follows the bytes consumed; otherwise it grows
/// asymptotically with the batch count, since the total number of batches is unknown.
#[derive(Clone, Debug)]
pub(crate) struct ProgressTracker {
    total_bytes: Option<u64>,
    batches: u64,
    rows: u64,
    last: f64,
}

impl ProgressTracker {
    pub(crate) fn new(total_bytes: Option<u64>) -> Self {
        Self {
            total_bytes: total_bytes.filter(|&t| t > 0),
            batches: 0,
            rows: 0,
            last: 0.0,
        }
    }

    pub(crate) fn batch(&mut self, rows: usize, byte_offset: Option<u64>) -> ProgressUpdate {
        self.batches += 1;
        self.rows += rows as u64;

        let raw = match (self.total_bytes, byte_offset) {
            (Some(total), Some(offset)) => offset as f64 / total as f64,
            _ => {
                let b = self.batches as f64;
                b / (b + 10.0)
            }
        };
        self.last = raw.min(MAX_FRACTION_BEFORE_DONE).max(self.last);

        ProgressUpdate {
            fraction: self.last,
            batches: self.batches,
            rows: self.rows,
            done: false,
        }
    }

    pub(crate) fn finish(&mut self) -> ProgressUpdate {
        self.last = 1.0;
        ProgressUpdate {
            fraction: 1.0,
            batches: self.batches,
            rows: self.rows,
            done: true,
        }
    }

    pub(crate) fn rows(&self) -> u64 {
        self.rows
    }

    pub(crate) fn batches(&self) -> u64 {
        self.batches
    }
}
