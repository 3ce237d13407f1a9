use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::csv_reader::{ColumnSelection, DEFAULT_BATCH_SIZE};
use crate::error::ConfigError;

/// Number of leading rows read to classify columns.
pub const DEFAULT_SAMPLE_ROWS: usize = 10;

/// What to sum, and how to partition it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Columns to sum, in output order. Must be non-empty.
    pub target_columns: Vec<String>,
    /// Categorical column whose distinct values partition the sums.
    pub group_column: Option<String>,
    pub batch_size: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            target_columns: Vec::new(),
            group_column: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl AggregationConfig {
    pub fn new<I, S>(target_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target_columns: target_columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_group_column(mut self, column: impl Into<String>) -> Self {
        self.group_column = Some(column.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn is_grouped(&self) -> bool {
        self.group_column.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_columns.is_empty() {
            return Err(ConfigError::EmptySelection);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        let mut seen = HashSet::with_capacity(self.target_columns.len());
        for column in &self.target_columns {
            if !seen.insert(column.as_str()) {
                return Err(ConfigError::DuplicateTarget(column.clone()));
            }
        }
        Ok(())
    }

    /// Columns the source must deliver: the targets, then the group column if it is not also a
    /// target.
    pub fn selection(&self) -> ColumnSelection {
        let mut names = self.target_columns.clone();
        if let Some(group) = &self.group_column {
            if !names.contains(group) {
                names.push(group.clone());
            }
        }
        ColumnSelection::Named(names)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeOptions {
    pub sample_rows: usize,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_is_rejected() {
        assert_eq!(
            AggregationConfig::default().validate(),
            Err(ConfigError::EmptySelection)
        );
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        assert_eq!(
            AggregationConfig::new(["a", "b", "a"]).validate(),
            Err(ConfigError::DuplicateTarget("a".to_string()))
        );
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert_eq!(
            AggregationConfig::new(["a"]).with_batch_size(0).validate(),
            Err(ConfigError::ZeroBatchSize)
        );
    }

    #[test]
    fn selection_appends_group_column_once() {
        let config = AggregationConfig::new(["qty", "price"]).with_group_column("category");
        assert_eq!(
            config.selection(),
            ColumnSelection::named(["qty", "price", "category"])
        );

        let config = AggregationConfig::new(["qty"]).with_group_column("qty");
        assert_eq!(config.selection(), ColumnSelection::named(["qty"]));
    }
}
