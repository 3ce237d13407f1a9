//! Running per-(group, column) sums and valid counts.
//!
//! State is keyed by a composite [`CellKey`] so every contribution lands in exactly one fixed-shape
//! [`AccumulatorCell`]. Observed groups are tracked separately from cells so that a group whose
//! values are all invalid for some column still shows up with a zero sum.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::batch::RowBatch;
use crate::coerce::coerce;
use crate::config::AggregationConfig;
use crate::error::{AggregateError, ConfigError};
use crate::locale::LocaleOptions;
use crate::result::{materialize, AggregationResult, AggregationStats};
use crate::value::{CellValue, GroupKey};

/// Aggregate state of one (group, column) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AccumulatorCell {
    /// Total of the values that coerced.
    pub sum: f64,
    /// Number of values that coerced and were not missing.
    pub valid_count: u64,
}

impl AccumulatorCell {
    fn add(&mut self, sum: f64, count: u64) {
        self.sum += sum;
        self.valid_count += count;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CellKey {
    pub(crate) group: GroupKey,
    pub(crate) column: Arc<str>,
}

#[derive(Clone, Copy, Debug, Default)]
struct KeyKinds {
    number: bool,
    text: bool,
    warned: bool,
}

/// Folds row batches into running sums. Batches must be folded one at a time, in source order.
#[derive(Debug)]
pub struct Accumulator {
    locale: LocaleOptions,
    targets: Vec<Arc<str>>,
    group_column: Option<Arc<str>>,
    cells: HashMap<CellKey, AccumulatorCell>,
    groups: HashSet<GroupKey>,
    stats: AggregationStats,
    key_kinds: KeyKinds,
}

impl Accumulator {
    pub fn new(config: &AggregationConfig, locale: &LocaleOptions) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut groups = HashSet::new();
        if config.group_column.is_none() {
            // Ungrouped mode has one implicit group that is always present.
            groups.insert(GroupKey::Absent);
        }

        Ok(Self {
            locale: locale.clone(),
            targets: config
                .target_columns
                .iter()
                .map(|c| Arc::<str>::from(c.as_str()))
                .collect(),
            group_column: config.group_column.as_deref().map(Arc::<str>::from),
            cells: HashMap::new(),
            groups,
            stats: AggregationStats::default(),
            key_kinds: KeyKinds::default(),
        })
    }

    pub fn is_grouped(&self) -> bool {
        self.group_column.is_some()
    }

    pub fn stats(&self) -> &AggregationStats {
        &self.stats
    }

    /// Fold one batch into the running state.
    ///
    /// Every selected column must be present in the batch; the check happens before any state
    /// changes. On error the accumulator must be discarded.
    pub fn fold(&mut self, batch: &RowBatch) -> Result<(), AggregateError> {
        let batch_no = self.stats.batches + 1;
        let absent = |column: &str| AggregateError::ColumnAbsent {
            column: column.to_string(),
            batch: batch_no,
        };

        let mut target_values: Vec<&[CellValue]> = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            target_values.push(batch.column(target).ok_or_else(|| absent(target))?);
        }
        let group_values = match &self.group_column {
            Some(column) => Some(batch.column(column).ok_or_else(|| absent(column))?),
            None => None,
        };

        let locale = &self.locale;
        let cells = &mut self.cells;

        match group_values {
            None => {
                for (target, values) in self.targets.iter().zip(&target_values) {
                    let (sum, count) = sum_valid(values.iter(), locale);
                    cells
                        .entry(CellKey {
                            group: GroupKey::Absent,
                            column: Arc::clone(target),
                        })
                        .or_default()
                        .add(sum, count);
                }
            }
            Some(keys) => {
                let mut partitions: HashMap<GroupKey, Vec<usize>> = HashMap::new();
                let mut skipped = 0u64;
                for (row, cell) in keys.iter().enumerate() {
                    match GroupKey::from_cell(cell) {
                        Some(key) => partitions.entry(key).or_default().push(row),
                        None => skipped += 1,
                    }
                }
                if skipped > 0 {
                    log::debug!("batch {batch_no}: {skipped} rows have no group value");
                    self.stats.rows_without_group += skipped;
                }

                for (key, rows) in partitions {
                    for (target, values) in self.targets.iter().zip(&target_values) {
                        let (sum, count) = sum_valid(rows.iter().map(|&r| &values[r]), locale);
                        cells
                            .entry(CellKey {
                                group: key.clone(),
                                column: Arc::clone(target),
                            })
                            .or_default()
                            .add(sum, count);
                    }
                    match key {
                        GroupKey::Number(_) => self.key_kinds.number = true,
                        GroupKey::Text(_) => self.key_kinds.text = true,
                        GroupKey::Absent => {}
                    }
                    self.groups.insert(key);
                }
                self.warn_on_mixed_keys();
            }
        }

        self.stats.batches = batch_no;
        self.stats.rows += batch.num_rows() as u64;
        log::debug!(
            "folded batch {batch_no}: {} rows, {} groups so far",
            batch.num_rows(),
            self.groups.len()
        );
        Ok(())
    }

    /// Current state of one (group, column) pair, if it received any rows.
    pub fn cell(&self, group: &GroupKey, column: &str) -> Option<AccumulatorCell> {
        self.cells
            .get(&CellKey {
                group: group.clone(),
                column: Arc::from(column),
            })
            .copied()
    }

    /// Observed groups, in no particular order.
    pub fn groups(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.iter()
    }

    /// Freeze the state into an ordered result set.
    pub fn finish(self) -> AggregationResult {
        if self.key_kinds.number && self.key_kinds.text {
            for label in look_alike_groups(&self.groups) {
                log::warn!(
                    "group {label:?} occurs both as a number and as text; \
                     the numeric group is listed first"
                );
            }
        }
        materialize(
            self.targets,
            self.group_column,
            self.groups,
            self.cells,
            self.stats,
        )
    }

    fn warn_on_mixed_keys(&mut self) {
        let kinds = &mut self.key_kinds;
        if kinds.number && kinds.text && !kinds.warned {
            kinds.warned = true;
            log::warn!(
                "group column {:?} yielded both numeric and text values; \
                 values that only differ in type are reported as separate groups",
                self.group_column.as_deref().unwrap_or_default()
            );
        }
    }
}

/// Labels shared by a numeric and a text group, sorted.
fn look_alike_groups(groups: &HashSet<GroupKey>) -> Vec<String> {
    let numeric: HashSet<String> = groups
        .iter()
        .filter(|k| matches!(k, GroupKey::Number(_)))
        .map(GroupKey::to_string)
        .collect();
    let mut labels: Vec<String> = groups
        .iter()
        .filter_map(|k| match k {
            GroupKey::Text(s) if numeric.contains(&**s) => Some(s.to_string()),
            _ => None,
        })
        .collect();
    labels.sort();
    labels
}

fn sum_valid<'a>(
    values: impl Iterator<Item = &'a CellValue>,
    locale: &LocaleOptions,
) -> (f64, u64) {
    values
        .filter_map(|v| coerce(v, locale).ok())
        .fold((0.0, 0), |(sum, count), v| (sum + v, count + 1))
}
