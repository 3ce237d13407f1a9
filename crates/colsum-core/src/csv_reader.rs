//! Delimited-file batch source.
//!
//! The reader works on raw byte records and decodes only the fields of the selected columns, so
//! unselected columns cost nothing beyond splitting. Each batch holds at most `batch_size` rows.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use csv::ByteRecord;

use crate::batch::{BatchColumn, RowBatch};
use crate::coerce::coerce_str;
use crate::error::{ConfigError, SchemaError, SourceError};
use crate::locale::LocaleOptions;
use crate::source::BatchSource;
use crate::value::CellValue;

pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Which columns a reader exposes in its batches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnSelection {
    All,
    /// Named columns, in the given order. Names absent from the header are skipped here and
    /// reported by whoever needs them.
    Named(Vec<String>),
}

impl ColumnSelection {
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSelection::Named(names.into_iter().map(Into::into).collect())
    }
}

/// Streams a delimited source as [`RowBatch`]es.
pub struct CsvChunkReader<R> {
    reader: csv::Reader<R>,
    locale: LocaleOptions,
    header: Vec<String>,
    /// (header index, column name) of every exposed column.
    projection: Vec<(usize, Arc<str>)>,
    batch_size: usize,
    record: ByteRecord,
    record_index: u64,
    total_bytes: Option<u64>,
    done: bool,
}

impl CsvChunkReader<File> {
    /// Open a file and read its header. The file length is used for progress reporting.
    pub fn open_path(
        path: &Path,
        locale: &LocaleOptions,
        selection: ColumnSelection,
        batch_size: usize,
    ) -> Result<Self, SchemaError> {
        let file = File::open(path).map_err(SchemaError::Io)?;
        let total_bytes = file.metadata().ok().map(|m| m.len());
        Ok(Self::new(file, locale, selection, batch_size)?.with_total_bytes(total_bytes))
    }
}

impl<R: Read> CsvChunkReader<R> {
    /// Wrap a reader positioned at the start of the source and read its header.
    pub fn new(
        source: R,
        locale: &LocaleOptions,
        selection: ColumnSelection,
        batch_size: usize,
    ) -> Result<Self, SchemaError> {
        locale.validate()?;
        if batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize.into());
        }

        let reader = csv::ReaderBuilder::new()
            .delimiter(locale.delimiter)
            // We'll treat headers manually so we can decode them with the configured encoding.
            .has_headers(false)
            // Short records are padded with missing cells; long ones are rejected per record.
            .flexible(true)
            .from_reader(source);

        let mut this = Self {
            reader,
            locale: locale.clone(),
            header: Vec::new(),
            projection: Vec::new(),
            batch_size,
            record: ByteRecord::new(),
            record_index: 0,
            total_bytes: None,
            done: false,
        };

        if !this.read_record()? {
            return Err(SchemaError::EmptyInput);
        }
        let mut raw_names = Vec::with_capacity(this.record.len());
        for (idx, field) in this.record.iter().enumerate() {
            // Handle a UTF-8 BOM at the start of the file. This commonly appears in Excel-exported
            // CSVs.
            let field = if idx == 0 && field.starts_with(&[0xEF, 0xBB, 0xBF]) {
                &field[3..]
            } else {
                field
            };
            let name = decode_field(field, this.record_index, idx as u64 + 1, &this.locale)?;
            raw_names.push(name.into_owned());
        }
        this.header = normalize_header(raw_names);
        this.projection = resolve_projection(&this.header, &selection);
        Ok(this)
    }

    /// Set the source length used for progress reporting.
    pub fn with_total_bytes(mut self, total_bytes: Option<u64>) -> Self {
        self.total_bytes = total_bytes;
        self
    }

    /// Every column name of the source, in file order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Names of the columns present in each batch.
    pub fn selected_columns(&self) -> impl Iterator<Item = &str> {
        self.projection.iter().map(|(_, name)| name.as_ref())
    }

    /// Read the next non-blank record into `self.record`.
    fn read_record(&mut self) -> Result<bool, SourceError> {
        loop {
            self.record.clear();
            match self.reader.read_byte_record(&mut self.record) {
                Ok(false) => return Ok(false),
                Ok(true) => {
                    self.record_index += 1;
                    let blank = self.record.len() == 0
                        || (self.record.len() == 1 && self.record[0].is_empty());
                    if !blank {
                        return Ok(true);
                    }
                }
                Err(e) => return Err(map_csv_error(e, self.record_index + 1)),
            }
        }
    }

    fn read_batch(&mut self) -> Result<Option<RowBatch>, SourceError> {
        if self.done {
            return Ok(None);
        }

        let mut raw: Vec<Vec<Option<Arc<str>>>> = self
            .projection
            .iter()
            .map(|_| Vec::with_capacity(self.batch_size.min(8192)))
            .collect();
        let mut pool = StringPool::new();
        let mut rows = 0usize;

        while rows < self.batch_size {
            if !self.read_record()? {
                self.done = true;
                break;
            }
            if self.record.len() > self.header.len() {
                return Err(SourceError::Parse {
                    row: self.record_index,
                    reason: format!(
                        "expected {} fields, found {}",
                        self.header.len(),
                        self.record.len()
                    ),
                });
            }

            for (slot, (idx, _)) in raw.iter_mut().zip(self.projection.iter()) {
                let value = match self.record.get(*idx) {
                    None => None,
                    Some(bytes) => {
                        let text =
                            decode_field(bytes, self.record_index, *idx as u64 + 1, &self.locale)?;
                        if self.locale.is_missing_token(&text) {
                            None
                        } else {
                            Some(pool.intern(&text))
                        }
                    }
                };
                slot.push(value);
            }
            rows += 1;
        }

        if rows == 0 {
            return Ok(None);
        }

        let columns = raw
            .into_iter()
            .zip(self.projection.iter())
            .map(|(values, (_, name))| {
                BatchColumn::new(Arc::clone(name), type_column(values, &self.locale))
            })
            .collect();
        let offset = self.reader.position().byte();
        Ok(Some(
            RowBatch::new(columns)
                .with_num_rows(rows)
                .with_byte_offset(offset),
        ))
    }
}

impl<R: Read> BatchSource for CsvChunkReader<R> {
    fn next_batch(&mut self) -> Result<Option<RowBatch>, SourceError> {
        self.read_batch()
    }

    fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }
}

impl<R: Read> Iterator for CsvChunkReader<R> {
    type Item = Result<RowBatch, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_batch().transpose()
    }
}

/// Give every column a unique, non-empty name.
///
/// Blank names become `Unnamed: <index>`; repeats become `name.1`, `name.2`, ...
pub(crate) fn normalize_header(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());
    for (idx, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {idx}")
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

fn resolve_projection(header: &[String], selection: &ColumnSelection) -> Vec<(usize, Arc<str>)> {
    match selection {
        ColumnSelection::All => header
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx, Arc::<str>::from(name.as_str())))
            .collect(),
        ColumnSelection::Named(names) => {
            let index: HashMap<&str, usize> = header
                .iter()
                .enumerate()
                .map(|(idx, name)| (name.as_str(), idx))
                .collect();
            let mut seen = HashSet::new();
            let mut out = Vec::with_capacity(names.len());
            for name in names {
                if !seen.insert(name.as_str()) {
                    continue;
                }
                match index.get(name.as_str()) {
                    Some(idx) => out.push((*idx, Arc::<str>::from(name.as_str()))),
                    None => log::debug!("selected column {name:?} is not in the header"),
                }
            }
            out
        }
    }
}

/// Per-batch typing: a column whose every present cell coerces is yielded as numbers, otherwise
/// as text.
fn type_column(values: Vec<Option<Arc<str>>>, locale: &LocaleOptions) -> Vec<CellValue> {
    let mut numbers: Vec<Option<f64>> = Vec::with_capacity(values.len());
    for value in &values {
        match value {
            None => numbers.push(None),
            Some(text) => match coerce_str(text, locale) {
                Ok(n) => numbers.push(Some(n)),
                Err(_) => {
                    return values
                        .into_iter()
                        .map(|v| v.map(CellValue::Text).unwrap_or(CellValue::Missing))
                        .collect();
                }
            },
        }
    }
    numbers.into_iter().map(CellValue::from).collect()
}

fn decode_field<'a>(
    field: &'a [u8],
    row: u64,
    column: u64,
    locale: &LocaleOptions,
) -> Result<std::borrow::Cow<'a, str>, SourceError> {
    locale
        .encoding
        .decode(field)
        .ok_or_else(|| SourceError::Encoding {
            row,
            column,
            encoding: locale.encoding.label(),
        })
}

fn map_csv_error(err: csv::Error, fallback_row: u64) -> SourceError {
    let reason = err.to_string();
    let pos = err.position().cloned();

    match err.into_kind() {
        csv::ErrorKind::Io(e) => SourceError::Io(e),
        _ => {
            // Positions count records from zero, header included.
            let row = pos.map(|p| p.record() + 1).unwrap_or(fallback_row);
            SourceError::Parse { row, reason }
        }
    }
}

/// Shares one allocation between equal cells of a batch (repeated group labels are the norm).
struct StringPool {
    set: HashSet<Arc<str>>,
}

impl StringPool {
    fn new() -> Self {
        Self {
            set: HashSet::new(),
        }
    }

    fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.set.get(s) {
            return Arc::clone(existing);
        }

        let arc: Arc<str> = Arc::from(s);
        self.set.insert(Arc::clone(&arc));
        arc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reader(data: &str, selection: ColumnSelection, batch_size: usize) -> CsvChunkReader<&[u8]> {
        CsvChunkReader::new(data.as_bytes(), &LocaleOptions::default(), selection, batch_size)
            .expect("open reader")
    }

    #[test]
    fn batches_are_bounded_and_cover_every_row() {
        let mut data = String::from("id,qty\n");
        for i in 0..10 {
            data.push_str(&format!("{i},{}\n", i * 2));
        }
        let batches: Vec<RowBatch> = reader(&data, ColumnSelection::All, 4)
            .collect::<Result<_, _>>()
            .expect("read batches");
        assert_eq!(
            batches.iter().map(RowBatch::num_rows).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );
        let offsets: Vec<u64> = batches.iter().filter_map(RowBatch::byte_offset).collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]), "{offsets:?}");
        assert!(*offsets.last().unwrap() <= data.len() as u64);
    }

    #[test]
    fn only_selected_columns_are_exposed_in_selection_order() {
        let mut r = reader(
            "a,b,c\n1,x,3\n",
            ColumnSelection::named(["c", "a", "missing"]),
            10,
        );
        assert_eq!(r.selected_columns().collect::<Vec<_>>(), vec!["c", "a"]);
        let batch = r.next_batch().unwrap().unwrap();
        assert_eq!(batch.column_names().collect::<Vec<_>>(), vec!["c", "a"]);
        assert!(batch.column("b").is_none());
    }

    #[test]
    fn columns_are_typed_per_batch() {
        let mut r = reader("k,v\n1,5\n2,x\n3,7\n", ColumnSelection::All, 2);
        let first = r.next_batch().unwrap().unwrap();
        assert_eq!(
            first.column("v").unwrap(),
            &[CellValue::from("5"), CellValue::from("x")]
        );
        assert_eq!(
            first.column("k").unwrap(),
            &[CellValue::Number(1.0), CellValue::Number(2.0)]
        );
        let second = r.next_batch().unwrap().unwrap();
        assert_eq!(second.column("v").unwrap(), &[CellValue::Number(7.0)]);
        assert!(r.next_batch().unwrap().is_none());
        assert!(r.next_batch().unwrap().is_none());
    }

    #[test]
    fn missing_tokens_and_short_records_become_missing() {
        let mut r = reader("a,b,c\n1,NA,\n2\n", ColumnSelection::All, 10);
        let batch = r.next_batch().unwrap().unwrap();
        assert_eq!(
            batch.column("b").unwrap(),
            &[CellValue::Missing, CellValue::Missing]
        );
        assert_eq!(
            batch.column("c").unwrap(),
            &[CellValue::Missing, CellValue::Missing]
        );
        assert_eq!(
            batch.column("a").unwrap(),
            &[CellValue::Number(1.0), CellValue::Number(2.0)]
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut r = reader("a\n1\n\n2\n", ColumnSelection::All, 10);
        let batch = r.next_batch().unwrap().unwrap();
        assert_eq!(batch.num_rows(), 2);
    }

    #[test]
    fn overlong_records_are_parse_errors() {
        let mut r = reader("a,b\n1,2\n1,2,3\n", ColumnSelection::All, 10);
        match r.next_batch() {
            Err(SourceError::Parse { row, reason }) => {
                assert_eq!(row, 3);
                assert!(reason.contains("expected 2 fields"), "{reason}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn header_names_are_made_unique() {
        assert_eq!(
            normalize_header(vec!["a".into(), "".into(), "a".into(), "a.1".into(), "a".into()]),
            vec!["a", "Unnamed: 1", "a.1", "a.1.1", "a.2"]
        );
    }

    #[test]
    fn bom_is_stripped_from_the_first_header() {
        let r = CsvChunkReader::new(
            &b"\xEF\xBB\xBFid,text\n1,hello\n"[..],
            &LocaleOptions::default(),
            ColumnSelection::All,
            10,
        )
        .unwrap();
        assert_eq!(r.header(), &["id".to_string(), "text".to_string()]);
    }

    #[test]
    fn invalid_bytes_are_encoding_errors_under_strict_utf8() {
        let mut r = CsvChunkReader::new(
            &b"name,qty\ncaf\xe9,1\n"[..],
            &LocaleOptions::default(),
            ColumnSelection::All,
            10,
        )
        .unwrap();
        match r.next_batch() {
            Err(SourceError::Encoding { row, column, .. }) => {
                assert_eq!((row, column), (2, 1));
            }
            other => panic!("expected encoding error, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_and_bad_batch_size_fail_on_open() {
        assert!(matches!(
            CsvChunkReader::new(&b""[..], &LocaleOptions::default(), ColumnSelection::All, 10),
            Err(SchemaError::EmptyInput)
        ));
        assert!(matches!(
            CsvChunkReader::new(&b"a\n1\n"[..], &LocaleOptions::default(), ColumnSelection::All, 0),
            Err(SchemaError::Config(ConfigError::ZeroBatchSize))
        ));
    }
}
