//! Load a results document, flatten every record, write the CSV.

use std::path::{Path, PathBuf};

use csv::Writer;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::flatten::{ExtractionError, FlatRow, extract_row, json_type_name};

pub const DEFAULT_INPUT: &str = "GameResult2.json";
pub const DEFAULT_OUTPUT: &str = "GameResult2.csv";
pub const DEFAULT_KEY: &str = "results";

/// Fatal errors; any of these aborts the run with a non-zero status.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{0}' key not found in JSON")]
    MissingKey(String),

    #[error("'{key}' should be an array, found {found}")]
    NotAnArray { key: String, found: &'static str },

    #[error("no valid game results found")]
    NoValidRows,

    /// Row keys differ from the header taken from the first row.
    #[error("row {index} does not match the header columns")]
    HeaderMismatch { index: usize },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Where to read from, where to write to, and which top-level array holds
/// the records.
#[derive(Debug, Clone)]
pub struct Options {
    pub input: PathBuf,
    pub output: PathBuf,
    pub key: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            key: DEFAULT_KEY.to_string(),
        }
    }
}

/// A record that failed extraction. `index` is 1-based.
#[derive(Debug)]
pub struct Skipped {
    pub index: usize,
    pub error: ExtractionError,
}

/// Rows that survived extraction, plus the ones that were skipped.
#[derive(Debug, Default)]
pub struct Extraction {
    pub rows: Vec<FlatRow>,
    pub skipped: Vec<Skipped>,
}

/// Summary of a finished run.
#[derive(Debug)]
pub struct Report {
    pub read: usize,
    pub written: usize,
    pub skipped: Vec<Skipped>,
    pub columns: Vec<String>,
}

/// Read and parse `path`, returning the array stored under `key`.
pub fn load_records(path: &Path, key: &str) -> Result<Vec<Value>, ConvertError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConvertError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value = serde_json::from_str(&text).map_err(|source| ConvertError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let Value::Object(mut top) = document else {
        return Err(ConvertError::MissingKey(key.to_string()));
    };
    match top.remove(key) {
        Some(Value::Array(records)) => Ok(records),
        Some(other) => Err(ConvertError::NotAnArray {
            key: key.to_string(),
            found: json_type_name(&other),
        }),
        None => Err(ConvertError::MissingKey(key.to_string())),
    }
}

/// Flatten every record; failures are logged and set aside with their
/// 1-based position.
pub fn extract_rows(records: &[Value]) -> Extraction {
    let mut out = Extraction::default();
    for (i, record) in records.iter().enumerate() {
        match extract_row(record) {
            Ok(row) => out.rows.push(row),
            Err(error) => {
                let index = i + 1;
                warn!("Error processing game result {index}: {error}");
                out.skipped.push(Skipped { index, error });
            }
        }
    }
    out
}

/// Write `rows` to `path`, header first. The header is the first row's
/// keys and every other row must match it exactly. Nothing is created
/// when there are no rows or the rows disagree.
pub fn write_csv(path: &Path, rows: &[FlatRow]) -> Result<Vec<String>, ConvertError> {
    let Some(first) = rows.first() else {
        return Err(ConvertError::NoValidRows);
    };
    let header: Vec<String> = first.keys().map(str::to_string).collect();

    if let Some(i) = rows.iter().position(|row| !row.keys().eq(first.keys())) {
        return Err(ConvertError::HeaderMismatch { index: i + 1 });
    }

    let write_err = |source: csv::Error| ConvertError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = Writer::from_path(path).map_err(write_err)?;
    wtr.write_record(&header).map_err(write_err)?;
    for row in rows {
        wtr.write_record(row.to_record()).map_err(write_err)?;
    }
    wtr.flush().map_err(|e| write_err(e.into()))?;

    Ok(header)
}

/// Run the whole pipeline: load, extract, write.
pub fn convert(opts: &Options) -> Result<Report, ConvertError> {
    info!("Reading {}...", opts.input.display());
    let records = load_records(&opts.input, &opts.key)?;
    info!("Found {} game results", records.len());

    let Extraction { rows, skipped } = extract_rows(&records);
    if rows.is_empty() {
        return Err(ConvertError::NoValidRows);
    }

    info!("Writing to {}...", opts.output.display());
    let columns = write_csv(&opts.output, &rows)?;

    info!(
        "Successfully converted {} game results to {}",
        rows.len(),
        opts.output.display()
    );
    info!("   Columns: {}", columns.len());
    let sample: Vec<&str> = columns.iter().take(10).map(String::as_str).collect();
    info!("   Sample columns: {}...", sample.join(", "));

    Ok(Report {
        read: records.len(),
        written: rows.len(),
        skipped,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::Cell;
    use serde_json::json;

    #[test]
    fn test_extract_rows_keeps_index_of_skipped() {
        let records = vec![json!({"objectId": "a"}), json!("oops"), json!({"objectId": "b"})];
        let out = extract_rows(&records);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].index, 2);
    }

    #[test]
    fn test_write_csv_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        assert!(matches!(write_csv(&path, &[]), Err(ConvertError::NoValidRows)));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_csv_rejects_mismatched_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let a: FlatRow = [("a", Cell::Empty), ("b", Cell::Empty)].into_iter().collect();
        let b: FlatRow = [("b", Cell::Empty), ("a", Cell::Empty)].into_iter().collect();
        let err = write_csv(&path, &[a, b]).unwrap_err();
        assert!(matches!(err, ConvertError::HeaderMismatch { index: 2 }));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_csv_quotes_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let row: FlatRow = [
            ("spirits", Cell::from("A, B")),
            ("note", Cell::from("say \"hi\"")),
            ("plain", Cell::from("x")),
        ]
        .into_iter()
        .collect();
        let header = write_csv(&path, &[row]).unwrap();
        assert_eq!(header, vec!["spirits", "note", "plain"]);

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines, vec!["spirits,note,plain", "\"A, B\",\"say \"\"hi\"\"\",x"]);
    }

    #[test]
    fn test_write_csv_quotes_line_breaks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let row: FlatRow = [("layout", Cell::from("a\nb")), ("turn", Cell::from("3"))]
            .into_iter()
            .collect();
        write_csv(&path, &[row]).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"a\nb\""));

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][0], "a\nb");
        assert_eq!(&records[0][1], "3");
    }

    #[test]
    fn test_load_records_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("nope.json");
        assert!(matches!(load_records(&missing, "results"), Err(ConvertError::Read { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(load_records(&bad, "results"), Err(ConvertError::Parse { .. })));

        let no_key = dir.path().join("nokey.json");
        std::fs::write(&no_key, r#"{"other": []}"#).unwrap();
        let err = load_records(&no_key, "results").unwrap_err();
        assert_eq!(err.to_string(), "'results' key not found in JSON");

        let not_array = dir.path().join("obj.json");
        std::fs::write(&not_array, r#"{"results": {}}"#).unwrap();
        assert!(matches!(
            load_records(&not_array, "results"),
            Err(ConvertError::NotAnArray { found: "object", .. })
        ));
    }
}
