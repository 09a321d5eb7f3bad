//! # gameresult2csv
//!
//! Flatten a JSON document of game results into a CSV file.
//!
//! The input holds an array of loosely shaped records under a top-level
//! key (`results` by default). Every record becomes one CSV row with a
//! fixed set of columns; lists, nested objects and `{"__type": "Date"}`
//! wrappers are collapsed into single cells.
//!
//! ```rust
//! use gameresult2csv::{extract_row, flatten_value};
//! use serde_json::json;
//!
//! let cell = flatten_value(&json!({"x": 1, "y": [2, 3]}));
//! assert_eq!(cell.to_string(), "x: 1; y: 2, 3");
//!
//! let row = extract_row(&json!({"spirits": ["River", "Lightning"]})).unwrap();
//! assert_eq!(row.get("spirits").unwrap().to_string(), "River, Lightning");
//! ```

pub mod convert;
pub mod flatten;

pub use convert::{ConvertError, Options, Report, convert};
pub use flatten::{COLUMNS, Cell, ExtractionError, FlatRow, extract_row, flatten_value, header};
