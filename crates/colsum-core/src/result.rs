use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::accumulator::{AccumulatorCell, CellKey};
use crate::value::GroupKey;

/// Counters collected while folding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    pub batches: u64,
    pub rows: u64,
    /// Rows dropped because their group value was missing.
    pub rows_without_group: u64,
}

/// One line of the final result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRow {
    #[serde(skip_serializing_if = "GroupKey::is_absent")]
    pub group: GroupKey,
    pub column: String,
    pub sum: f64,
    pub valid_count: u64,
}

/// Ordered output of an aggregation run.
///
/// Rows are sorted by group key; within a group, columns keep the configured target order. Every
/// observed group has one row per target column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    group_column: Option<String>,
    rows: Vec<ResultRow>,
    stats: AggregationStats,
}

impl AggregationResult {
    pub fn is_grouped(&self) -> bool {
        self.group_column.is_some()
    }

    pub fn group_column(&self) -> Option<&str> {
        self.group_column.as_deref()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }

    pub fn stats(&self) -> &AggregationStats {
        &self.stats
    }

    pub fn get(&self, group: &GroupKey, column: &str) -> Option<&ResultRow> {
        self.rows
            .iter()
            .find(|r| &r.group == group && r.column == column)
    }

    /// Distinct groups in output order.
    pub fn groups(&self) -> Vec<&GroupKey> {
        let mut groups: Vec<&GroupKey> = Vec::new();
        for row in &self.rows {
            if groups.last() != Some(&&row.group) {
                groups.push(&row.group);
            }
        }
        groups
    }
}

pub(crate) fn materialize(
    targets: Vec<Arc<str>>,
    group_column: Option<Arc<str>>,
    groups: HashSet<GroupKey>,
    mut cells: HashMap<CellKey, AccumulatorCell>,
    stats: AggregationStats,
) -> AggregationResult {
    let mut groups: Vec<GroupKey> = groups.into_iter().collect();
    groups.sort();

    let mut rows = Vec::with_capacity(groups.len() * targets.len());
    for group in groups {
        for column in &targets {
            let cell = cells
                .remove(&CellKey {
                    group: group.clone(),
                    column: Arc::clone(column),
                })
                .unwrap_or_default();
            rows.push(ResultRow {
                group: group.clone(),
                column: column.to_string(),
                sum: cell.sum,
                valid_count: cell.valid_count,
            });
        }
    }

    AggregationResult {
        group_column: group_column.map(|c| c.to_string()),
        rows,
        stats,
    }
}
