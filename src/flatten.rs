//! Collapse game-result records into flat rows of CSV cells.

use std::fmt;

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Raised while flattening one record; the record is skipped.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("expected an object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("field '{field}' should be {expected}, found {found}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// Name of the JSON type held by `value`, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One CSV cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    /// Kept as the original JSON number so it is written unchanged.
    Number(Number),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Bool(b) => f.write_str(bool_text(*b)),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_owned())
    }
}

fn bool_text(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

/// Textual form of a value sitting inside a list or object: `None` for
/// null, `True`/`False` for booleans, compact JSON for containers.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(b) => bool_text(*b).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        container => container.to_string(),
    }
}

/// True for `{"__type": "Date", "iso": ...}` style objects.
pub fn is_date_wrapper(map: &Map<String, Value>) -> bool {
    matches!(map.get("__type"), Some(Value::String(t)) if t == "Date")
}

/// ISO string carried by a date wrapper, or `Empty` if it has none.
pub fn date_iso(map: &Map<String, Value>) -> Cell {
    match map.get("iso") {
        Some(Value::String(iso)) => Cell::Text(iso.clone()),
        _ => Cell::Empty,
    }
}

/// Flatten any JSON value into a cell. Never fails.
pub fn flatten_value(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Empty,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => Cell::Number(n.clone()),
        Value::String(s) => Cell::Text(s.clone()),
        Value::Array(items) => join_items(items),
        Value::Object(map) if is_date_wrapper(map) => date_iso(map),
        Value::Object(map) => flatten_object(map),
    }
}

/// Array elements joined with ", ". Nested containers keep their
/// compact JSON form.
pub fn join_items(items: &[Value]) -> Cell {
    if items.is_empty() {
        return Cell::Empty;
    }
    let parts: Vec<String> = items.iter().map(text_of).collect();
    Cell::Text(parts.join(", "))
}

/// `key: value` pairs joined with "; " in the object's own key order.
fn flatten_object(map: &Map<String, Value>) -> Cell {
    if map.is_empty() {
        return Cell::Empty;
    }
    let parts: Vec<String> = map
        .iter()
        .map(|(k, v)| match v {
            Value::Array(_) | Value::Object(_) => format!("{k}: {}", flatten_value(v)),
            scalar => format!("{k}: {}", text_of(scalar)),
        })
        .collect();
    Cell::Text(parts.join("; "))
}

/// How a column reads its value out of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Plain field, empty when absent.
    Scalar,
    /// Boolean flag, `False` when absent.
    Flag,
    /// Object carrying an `iso` string.
    Date,
    /// Array joined with ", ".
    List,
    /// Object flattened into `key: value` pairs.
    Nested,
    /// Object of category -> list, e.g. spirit -> owned power cards.
    Ownership,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: Kind,
}

const fn col(name: &'static str, kind: Kind) -> Column {
    Column { name, kind }
}

pub const COLUMNS: &[Column] = &[
    col("objectId", Kind::Scalar),
    col("adversary", Kind::Scalar),
    col("adversaryLevel", Kind::Scalar),
    col("scenario", Kind::Scalar),
    col("usingEvents", Kind::Flag),
    col("usingTokens", Kind::Flag),
    col("isMultiplayer", Kind::Flag),
    col("waveNumber", Kind::Scalar),
    col("endingResult", Kind::Scalar),
    col("blightCard", Kind::Scalar),
    col("blightCardFlipped", Kind::Flag),
    col("blightRemaining", Kind::Scalar),
    col("score", Kind::Scalar),
    col("turn", Kind::Scalar),
    col("invaderCardsInDeck", Kind::Scalar),
    col("invaderCardsNotInDeck", Kind::Scalar),
    col("blightOnIsland", Kind::Scalar),
    col("dahanOnIsland", Kind::Scalar),
    col("terrorLevel", Kind::Scalar),
    col("installationId", Kind::Scalar),
    col("endDate", Kind::Date),
    col("createdAt", Kind::Scalar),
    col("updatedAt", Kind::Scalar),
    col("spirits", Kind::List),
    col("boards", Kind::List),
    col("powerProgressionSpirits", Kind::List),
    col("practiceModes", Kind::List),
    col("powerCardsInDiscard", Kind::List),
    col("emptyPresenceTrackNodes", Kind::List),
    col("layout", Kind::Nested),
    col("powerCardsOwned", Kind::Ownership),
];

/// Column names in schema order.
pub fn header() -> Vec<&'static str> {
    COLUMNS.iter().map(|c| c.name).collect()
}

/// A record flattened into `(column, cell)` pairs, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    cells: Vec<(&'static str, Cell)>,
}

impl FlatRow {
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.cells.iter().map(|(k, _)| *k)
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.iter().find(|(k, _)| *k == column).map(|(_, c)| c)
    }

    /// Cell texts in column order, ready for a CSV writer.
    pub fn to_record(&self) -> Vec<String> {
        self.cells.iter().map(|(_, c)| c.to_string()).collect()
    }
}

impl FromIterator<(&'static str, Cell)> for FlatRow {
    fn from_iter<I: IntoIterator<Item = (&'static str, Cell)>>(iter: I) -> Self {
        FlatRow {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Flatten one record using the fixed schema.
pub fn extract_row(record: &Value) -> Result<FlatRow, ExtractionError> {
    let Value::Object(map) = record else {
        return Err(ExtractionError::NotAnObject {
            found: json_type_name(record),
        });
    };

    COLUMNS
        .iter()
        .map(|column| extract_cell(map, column).map(|cell| (column.name, cell)))
        .collect()
}

fn extract_cell(map: &Map<String, Value>, column: &Column) -> Result<Cell, ExtractionError> {
    let value = map.get(column.name);
    let cell = match column.kind {
        Kind::Scalar | Kind::List | Kind::Nested => value.map(flatten_value).unwrap_or(Cell::Empty),
        Kind::Flag => value.map(flatten_value).unwrap_or(Cell::Bool(false)),
        Kind::Date => match value {
            Some(Value::Object(date)) => date.get("iso").map(flatten_value).unwrap_or(Cell::Empty),
            _ => Cell::Empty,
        },
        Kind::Ownership => match value {
            None => Cell::Empty,
            Some(v) => ownership(column.name, v)?,
        },
    };
    Ok(cell)
}

/// `"cat1: a, b; cat2: c"`, categories in their original key order.
fn ownership(field: &'static str, value: &Value) -> Result<Cell, ExtractionError> {
    let map = match value {
        Value::Object(map) if !map.is_empty() => map,
        v if is_blank(v) => return Ok(Cell::Empty),
        other => {
            return Err(ExtractionError::InvalidField {
                field,
                expected: "an object",
                found: json_type_name(other),
            });
        }
    };

    let parts: Vec<String> = map
        .iter()
        .map(|(category, items)| match items {
            Value::Array(list) => format!("{category}: {}", join_items(list)),
            other => format!("{category}: {}", text_of(other)),
        })
        .collect();
    Ok(Cell::Text(parts.join("; ")))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(true) => false,
    }
}
