use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

// ---------------------------------------------------------------------------
// Record – one row of a parsed document
// ---------------------------------------------------------------------------

/// One row of tabular data: column name → value, in header order.
///
/// A column the source line did not reach is simply absent; [`Record::get`]
/// returns `None` for it. Keys are unique within a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column value, keeping first-insertion order.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Column names in encounter order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Parse results
// ---------------------------------------------------------------------------

/// A non-fatal problem found while aligning a line against the header.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParseWarning {
    /// 1-based line number in the source text.
    pub line: u64,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Output of the parser: header, rows, and warnings kept apart from the rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub header: Vec<String>,
    pub records: Vec<Record>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedDocument {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// NormalizedSeries – rows guaranteed to carry a time-axis value
// ---------------------------------------------------------------------------

/// Records in source order, each with a non-empty value at `time_axis_key`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSeries {
    pub(crate) time_axis_key: String,
    pub(crate) records: Vec<Record>,
}

impl NormalizedSeries {
    pub fn time_axis_key(&self) -> &str {
        &self.time_axis_key
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Time-axis values in row order (duplicates included).
    pub fn time_axis(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter_map(|r| r.get(&self.time_axis_key))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
