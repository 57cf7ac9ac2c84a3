//! Batch ingestion and export of delimited client tables.
//!
//! Cells keep their original text; numeric/boolean/categorical kinds are
//! inferred per column when the table is turned into records, the way a
//! typical dataframe reader would type them.

use std::io::{Read, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::classifier::Prediction;
use crate::record::{RawRecord, Value};

/// Name of the appended prediction column.
pub const LABEL_COLUMN: &str = "y";

/// Columns kept in the labeled output, in output order.
pub const OUTPUT_COLUMNS: [&str; 17] = [
    "age", "job", "marital", "education", "default", "balance", "housing", "loan", "contact", "day",
    "month", "duration", "campaign", "pdays", "previous", "poutcome", LABEL_COLUMN,
];

/// Cell spellings read as missing.
const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Error)]
pub enum BatchError {
    /// The delimited reader failed for a reason other than text decoding.
    #[error("malformed delimited input: {0}")]
    Csv(#[from] csv::Error),
    /// The file is unreadable as text or its shape is unusable; rejected as a whole.
    #[error("schema error: {0}")]
    Schema(String),
    /// Prediction count differs from the table's row count.
    #[error("{predictions} predictions for {rows} rows")]
    LengthMismatch { rows: usize, predictions: usize },
    /// Opening, writing or renaming a file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Numeric,
    Boolean,
    Categorical,
}

/// Undecodable text is a schema problem, not a reader failure.
fn reader_error(err: csv::Error) -> BatchError {
    match err.kind() {
        csv::ErrorKind::Utf8 { pos, err: utf8 } => {
            let line = pos.as_ref().map_or(0, |p| p.line());
            BatchError::Schema(format!("input is not valid UTF-8 at line {line}: {utf8}"))
        }
        _ => BatchError::Csv(err),
    }
}

fn is_na(cell: &str) -> bool {
    NA_VALUES.contains(&cell)
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok()
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut numeric = true;
    let mut boolean = true;
    let mut saw_na = false;
    let mut saw_value = false;
    for cell in cells {
        if is_na(cell) {
            saw_na = true;
            continue;
        }
        saw_value = true;
        numeric &= parse_number(cell).is_some();
        boolean &= parse_bool(cell).is_some();
    }
    if !saw_value || numeric {
        ColumnKind::Numeric
    } else if boolean && !saw_na {
        ColumnKind::Boolean
    } else {
        ColumnKind::Categorical
    }
}

/// Client table as read from a delimited file.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl BatchTable {
    /// Build a table from a header and rows. Rows must match the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, BatchError> {
        validate_headers(&headers)?;
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(BatchError::Schema(format!(
                "row {} has {} fields, header has {}",
                i + 1,
                row.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Parse a delimited table with a header row.
    ///
    /// Short rows are padded with empty cells; long rows reject the file.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self, BatchError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(reader_error)?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() {
            return Err(BatchError::Schema("input has no header row".to_string()));
        }
        validate_headers(&headers)?;

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.map_err(reader_error)?;
            if record.len() > headers.len() {
                return Err(BatchError::Schema(format!(
                    "row {} has {} fields, header has {}",
                    i + 1,
                    record.len(),
                    headers.len()
                )));
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        debug!(rows = rows.len(), columns = headers.len(), "parsed batch table");
        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path, delimiter: u8) -> Result<Self, BatchError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, delimiter)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Type each column and convert rows into raw records.
    ///
    /// Missing numeric cells become NaN; missing categorical cells leave the
    /// field absent.
    pub fn to_records(&self) -> Vec<RawRecord> {
        let kinds: Vec<ColumnKind> = (0..self.headers.len())
            .map(|j| infer_kind(self.rows.iter().map(|row| row[j].as_str())))
            .collect();
        debug!(kinds = ?kinds, "inferred column kinds");

        self.rows
            .iter()
            .map(|row| {
                let mut record = RawRecord::new();
                for ((name, cell), kind) in self.headers.iter().zip(row).zip(&kinds) {
                    let value = match kind {
                        ColumnKind::Numeric if is_na(cell) => Value::Number(f64::NAN),
                        ColumnKind::Numeric => Value::Number(parse_number(cell).unwrap_or(f64::NAN)),
                        ColumnKind::Boolean => {
                            Value::Number(if parse_bool(cell) == Some(true) { 1.0 } else { 0.0 })
                        }
                        ColumnKind::Categorical if is_na(cell) => continue,
                        ColumnKind::Categorical => Value::Category(cell.clone()),
                    };
                    record.insert(name.as_str(), value);
                }
                record
            })
            .collect()
    }

    /// Attach predictions as `y` and keep only the allow-listed columns.
    ///
    /// An input `y` column is replaced by the predictions.
    pub fn label(&self, predictions: &[Prediction]) -> Result<LabeledTable, BatchError> {
        if predictions.len() != self.rows.len() {
            return Err(BatchError::LengthMismatch {
                rows: self.rows.len(),
                predictions: predictions.len(),
            });
        }

        let kept: Vec<(usize, &str)> = OUTPUT_COLUMNS
            .iter()
            .filter(|name| **name != LABEL_COLUMN)
            .filter_map(|name| {
                self.headers
                    .iter()
                    .position(|h| h == name)
                    .map(|j| (j, *name))
            })
            .collect();

        let mut headers: Vec<String> = kept.iter().map(|(_, name)| name.to_string()).collect();
        headers.push(LABEL_COLUMN.to_string());

        let rows = self
            .rows
            .iter()
            .zip(predictions)
            .map(|(row, prediction)| {
                let mut out: Vec<String> = kept.iter().map(|(j, _)| row[*j].clone()).collect();
                out.push(prediction.to_string());
                out
            })
            .collect();

        Ok(LabeledTable {
            headers,
            rows,
            predictions: predictions.to_vec(),
        })
    }
}

fn validate_headers(headers: &[String]) -> Result<(), BatchError> {
    for (j, name) in headers.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(BatchError::Schema(format!("header column {} is empty", j + 1)));
        }
        if headers[..j].contains(name) {
            return Err(BatchError::Schema(format!("header column `{name}` is duplicated")));
        }
    }
    Ok(())
}

/// Batch table restricted to the output columns, with predictions appended.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    predictions: Vec<Prediction>,
}

impl LabeledTable {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn subscribers(&self) -> usize {
        self.predictions
            .iter()
            .filter(|p| **p == Prediction::WillSubscribe)
            .count()
    }

    pub fn write_csv<W: Write>(&self, writer: W, delimiter: u8) -> Result<(), BatchError> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write to `path` through a sibling temp file so a failed export never
    /// leaves a partial file behind.
    pub fn export(&self, path: &Path, delimiter: u8) -> Result<(), BatchError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        self.write_csv(tmp.as_file_mut(), delimiter)?;
        tmp.persist(path).map_err(|e| BatchError::Io(e.error))?;
        info!(path = %path.display(), rows = self.rows.len(), "exported predictions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
age,job,balance,housing,nickname,y
30,admin.,1200,yes,al,no
45,artist,,no,bo,yes
";

    fn table() -> BatchTable {
        BatchTable::from_reader(CSV.as_bytes(), b',').unwrap()
    }

    #[test]
    fn parses_header_and_rows() {
        let t = table();
        assert_eq!(t.headers().len(), 6);
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows()[1][1], "artist");
    }

    #[test]
    fn column_kinds_drive_values() {
        let records = table().to_records();
        assert_eq!(records[0].get("age"), Some(&Value::Number(30.0)));
        assert_eq!(records[0].get("job"), Some(&Value::from("admin.")));
        assert!(matches!(records[1].get("balance"), Some(Value::Number(n)) if n.is_nan()));
    }

    #[test]
    fn missing_category_leaves_field_absent() {
        let t = BatchTable::from_reader("age,job\n30,\n31,admin.\n".as_bytes(), b',').unwrap();
        let records = t.to_records();
        assert!(records[0].get("job").is_none());
        assert_eq!(records[1].get("job"), Some(&Value::from("admin.")));
    }

    #[test]
    fn mixed_column_is_categorical() {
        let t = BatchTable::from_reader("code\n12\nX7\n".as_bytes(), b',').unwrap();
        let records = t.to_records();
        assert_eq!(records[0].get("code"), Some(&Value::from("12")));
    }

    #[test]
    fn boolean_column_is_numeric() {
        let t = BatchTable::from_reader("vip\nTrue\nfalse\n".as_bytes(), b',').unwrap();
        let records = t.to_records();
        assert_eq!(records[0].get("vip"), Some(&Value::Number(1.0)));
        assert_eq!(records[1].get("vip"), Some(&Value::Number(0.0)));
    }

    #[test]
    fn boolean_column_with_na_is_categorical() {
        let t = BatchTable::from_reader("vip,age\nTrue,1\n,2\n".as_bytes(), b',').unwrap();
        let records = t.to_records();
        assert_eq!(records[0].get("vip"), Some(&Value::from("True")));
        assert!(records[1].get("vip").is_none());
        assert_eq!(records[1].get("age"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn all_na_column_is_numeric() {
        let t = BatchTable::from_reader("age,notes\n30,\n31,NA\n".as_bytes(), b',').unwrap();
        for record in t.to_records() {
            assert!(matches!(record.get("notes"), Some(Value::Number(n)) if n.is_nan()));
        }
    }

    #[test]
    fn short_rows_are_padded() {
        let t = BatchTable::from_reader("age,job\n30\n".as_bytes(), b',').unwrap();
        assert_eq!(t.rows()[0], vec!["30".to_string(), String::new()]);
    }

    #[test]
    fn long_rows_reject_the_file() {
        let err = BatchTable::from_reader("age,job\n30,admin.,extra\n".as_bytes(), b',').unwrap_err();
        assert!(matches!(err, BatchError::Schema(ref msg) if msg.contains("row 1")));
    }

    #[test]
    fn duplicate_headers_reject_the_file() {
        let err = BatchTable::from_reader("age,age\n1,2\n".as_bytes(), b',').unwrap_err();
        assert!(matches!(err, BatchError::Schema(ref msg) if msg.contains("duplicated")));
    }

    #[test]
    fn empty_header_rejects_the_file() {
        let err = BatchTable::from_reader("age,,job\n1,2,3\n".as_bytes(), b',').unwrap_err();
        assert!(matches!(err, BatchError::Schema(ref msg) if msg.contains("column 2 is empty")));
    }

    #[test]
    fn undecodable_row_is_schema_error() {
        let err = BatchTable::from_reader(&b"age,job\n30,\xff\n"[..], b',').unwrap_err();
        assert!(matches!(err, BatchError::Schema(ref msg) if msg.contains("UTF-8")));
    }

    #[test]
    fn undecodable_header_is_schema_error() {
        let err = BatchTable::from_reader(&b"age,j\xffb\n30,x\n"[..], b',').unwrap_err();
        assert!(matches!(err, BatchError::Schema(_)));
    }

    #[test]
    fn empty_input_has_no_header() {
        let err = BatchTable::from_reader("".as_bytes(), b',').unwrap_err();
        assert!(matches!(err, BatchError::Schema(_)));
    }

    #[test]
    fn header_only_is_an_empty_batch() {
        let t = BatchTable::from_reader("age,job\n".as_bytes(), b',').unwrap();
        assert!(t.is_empty());
        assert!(t.to_records().is_empty());
    }

    #[test]
    fn semicolon_delimiter() {
        let t = BatchTable::from_reader("age;job\n30;admin.\n".as_bytes(), b';').unwrap();
        assert_eq!(t.headers(), ["age", "job"]);
    }

    #[test]
    fn label_applies_allow_list_and_replaces_y() {
        let labeled = table()
            .label(&[Prediction::WillSubscribe, Prediction::WillNotSubscribe])
            .unwrap();
        assert_eq!(labeled.headers(), ["age", "job", "balance", "housing", "y"]);
        assert_eq!(labeled.rows()[0], ["30", "admin.", "1200", "yes", "1"]);
        assert_eq!(labeled.rows()[1], ["45", "artist", "", "no", "0"]);
        assert_eq!(labeled.subscribers(), 1);
    }

    #[test]
    fn label_follows_allow_list_order() {
        let t = BatchTable::from_reader("month,age,day\nmay,30,5\n".as_bytes(), b',').unwrap();
        let labeled = t.label(&[Prediction::WillNotSubscribe]).unwrap();
        assert_eq!(labeled.headers(), ["age", "day", "month", "y"]);
    }

    #[test]
    fn label_length_must_match() {
        let err = table().label(&[Prediction::WillSubscribe]).unwrap_err();
        assert!(matches!(
            err,
            BatchError::LengthMismatch { rows: 2, predictions: 1 }
        ));
    }

    #[test]
    fn write_csv_round_trips_text() {
        let labeled = table()
            .label(&[Prediction::WillSubscribe, Prediction::WillNotSubscribe])
            .unwrap();
        let mut out = Vec::new();
        labeled.write_csv(&mut out, b',').unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "age,job,balance,housing,y\n30,admin.,1200,yes,1\n45,artist,,no,0\n"
        );
    }

    #[test]
    fn export_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("predictions.csv");
        let labeled = table()
            .label(&[Prediction::WillSubscribe, Prediction::WillSubscribe])
            .unwrap();
        labeled.export(&path, b',').unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("age,job,balance,housing,y\n"));
    }
}
