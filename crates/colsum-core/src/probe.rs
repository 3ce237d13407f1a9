//! Column discovery and numeric/categorical classification from a bounded prefix.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::config::ProbeOptions;
use crate::csv_reader::{ColumnSelection, CsvChunkReader};
use crate::error::{ConfigError, SchemaError};
use crate::locale::LocaleOptions;
use crate::source::BatchSource;
use crate::value::CellValue;

/// How many numeric columns are pre-selected as sum targets.
pub const DEFAULT_TARGET_LIMIT: usize = 5;

/// Advisory column type. Categorical columns may still be summed; their cells are coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnClassification {
    Numeric,
    Categorical,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProbedColumn {
    pub name: String,
    pub classification: ColumnClassification,
}

impl ProbedColumn {
    pub fn is_numeric(&self) -> bool {
        self.classification == ColumnClassification::Numeric
    }
}

/// Result of probing a source prefix.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SchemaProbe {
    columns: Vec<ProbedColumn>,
    /// Sampled rows, row-major, in column order.
    sample: Vec<Vec<CellValue>>,
}

impl SchemaProbe {
    pub fn columns(&self) -> &[ProbedColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&ProbedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn sample_rows(&self) -> &[Vec<CellValue>] {
        &self.sample
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
    }

    pub fn categorical_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| !c.is_numeric())
            .map(|c| c.name.as_str())
    }

    /// Pre-selected sum targets: the first few numeric columns.
    pub fn default_targets(&self) -> Vec<String> {
        self.numeric_columns()
            .take(DEFAULT_TARGET_LIMIT)
            .map(str::to_string)
            .collect()
    }

    /// Columns offered for grouping.
    pub fn group_candidates(&self) -> Vec<String> {
        self.categorical_columns().map(str::to_string).collect()
    }

    /// Selected targets that did not look numeric in the sample and will be coerced.
    pub fn non_numeric_selection<'a>(&self, targets: &'a [String]) -> Vec<&'a str> {
        targets
            .iter()
            .map(String::as_str)
            .filter(|t| self.column(t).is_some_and(|c| !c.is_numeric()))
            .collect()
    }
}

/// Read the header and up to `options.sample_rows` rows and classify every column.
///
/// A column is numeric when every non-missing sampled value coerces under `locale`. Columns with
/// no sampled values at all count as numeric; a header-only source yields only categorical
/// columns.
pub fn probe_schema<R: Read>(
    source: R,
    locale: &LocaleOptions,
    options: &ProbeOptions,
) -> Result<SchemaProbe, SchemaError> {
    if options.sample_rows == 0 {
        return Err(ConfigError::ZeroSampleRows.into());
    }

    let mut reader = CsvChunkReader::new(source, locale, ColumnSelection::All, options.sample_rows)?;
    let names = reader.header().to_vec();
    let Some(batch) = reader.next_batch()? else {
        log::debug!("probe found a header without data rows");
        return Ok(SchemaProbe {
            columns: names
                .into_iter()
                .map(|name| ProbedColumn {
                    name,
                    classification: ColumnClassification::Categorical,
                })
                .collect(),
            sample: Vec::new(),
        });
    };

    let columns: Vec<ProbedColumn> = batch
        .columns()
        .iter()
        .map(|column| {
            let numeric = column
                .values
                .iter()
                .all(|v| matches!(v, CellValue::Missing | CellValue::Number(_)));
            ProbedColumn {
                name: column.name.to_string(),
                classification: if numeric {
                    ColumnClassification::Numeric
                } else {
                    ColumnClassification::Categorical
                },
            }
        })
        .collect();

    let sample = (0..batch.num_rows())
        .map(|row| {
            batch
                .columns()
                .iter()
                .map(|c| c.values[row].clone())
                .collect()
        })
        .collect();

    log::debug!(
        "probed {} columns from {} rows",
        columns.len(),
        batch.num_rows()
    );
    Ok(SchemaProbe { columns, sample })
}

pub fn probe_path(
    path: &Path,
    locale: &LocaleOptions,
    options: &ProbeOptions,
) -> Result<SchemaProbe, SchemaError> {
    let file = File::open(path).map_err(SchemaError::Io)?;
    probe_schema(file, locale, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaErrorKind;
    use pretty_assertions::assert_eq;

    fn probe(data: &[u8], locale: &LocaleOptions) -> Result<SchemaProbe, SchemaError> {
        probe_schema(data, locale, &ProbeOptions::default())
    }

    #[test]
    fn classifies_columns_from_the_sample() {
        let data = b"categoria,prodotto,quantita,prezzo,totale\n\
Frutta,Mele,10,2.5,25\n\
Frutta,Pere,15,3.2,48\n\
Verdura,Carote,12,1.5,18\n";
        let probe = probe(data, &LocaleOptions::default()).unwrap();
        assert_eq!(
            probe.numeric_columns().collect::<Vec<_>>(),
            vec!["quantita", "prezzo", "totale"]
        );
        assert_eq!(
            probe.categorical_columns().collect::<Vec<_>>(),
            vec!["categoria", "prodotto"]
        );
        assert_eq!(probe.default_targets(), vec!["quantita", "prezzo", "totale"]);
        assert_eq!(probe.group_candidates(), vec!["categoria", "prodotto"]);
        assert_eq!(probe.sample_rows().len(), 3);
        assert_eq!(probe.sample_rows()[0][0], CellValue::from("Frutta"));
    }

    #[test]
    fn only_the_prefix_is_sampled() {
        let mut data = String::from("v\n");
        for i in 0..10 {
            data.push_str(&format!("{i}\n"));
        }
        data.push_str("not a number\n");
        let probe = probe(data.as_bytes(), &LocaleOptions::default()).unwrap();
        assert!(probe.column("v").unwrap().is_numeric());
        assert_eq!(probe.sample_rows().len(), 10);
    }

    #[test]
    fn classification_honours_locale() {
        let data = b"importo;nome\n1.234,56;a\n7,5;b\n";
        let probe = probe(data, &LocaleOptions::european()).unwrap();
        assert!(probe.column("importo").unwrap().is_numeric());

        let probe = probe_schema(
            &b"importo,nome\n\"1.234,56\",a\n"[..],
            &LocaleOptions::default(),
            &ProbeOptions::default(),
        )
        .unwrap();
        assert!(!probe.column("importo").unwrap().is_numeric());
    }

    #[test]
    fn missing_values_do_not_make_a_column_categorical() {
        let probe = probe(b"a,b\n1,\nNA,\n3,\n", &LocaleOptions::default()).unwrap();
        assert!(probe.column("a").unwrap().is_numeric());
        assert!(probe.column("b").unwrap().is_numeric());
    }

    #[test]
    fn non_numeric_selection_lists_coerced_targets() {
        let probe = probe(b"a,b,c\n1,x,2\n", &LocaleOptions::default()).unwrap();
        let targets = vec!["a".to_string(), "b".to_string(), "zzz".to_string()];
        assert_eq!(probe.non_numeric_selection(&targets), vec!["b"]);
    }

    #[test]
    fn header_only_source_is_all_categorical() {
        let probe = probe(b"a,b\n", &LocaleOptions::default()).unwrap();
        assert_eq!(probe.numeric_columns().count(), 0);
        assert_eq!(probe.column_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn failures_are_classified() {
        let err = probe(b"", &LocaleOptions::default()).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::EmptyInput);

        let err = probe(b"a,b\n1,2,3\n", &LocaleOptions::default()).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::ParseFailure);

        let err = probe(b"nome\ncaf\xe9\n", &LocaleOptions::default()).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::EncodingFailure);

        let err = probe_schema(
            &b"a\n1\n"[..],
            &LocaleOptions::default(),
            &ProbeOptions { sample_rows: 0 },
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Config(ConfigError::ZeroSampleRows)));
    }
}
