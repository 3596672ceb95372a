//! Tabular dataset parsed from a CSV or JSON string.

use analyst_core::DataFormat;
use serde_json::Value;
use tracing::debug;

use crate::AnalysisError;

/// Cell tokens treated as missing values in CSV input.
const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Values of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Every non-missing cell is a number.
    Numeric(Vec<Option<f64>>),
    /// At least one non-missing cell is not a number.
    Text(Vec<Option<String>>),
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    /// Create a column.
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    /// Numeric values, or `None` for a text column.
    pub fn numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(values) => Some(values),
            ColumnData::Text(_) => None,
        }
    }

    /// Number of cells, missing ones included.
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of missing cells.
    pub fn missing_count(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnData::Text(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Cell at `row` rendered as a label, `None` when missing.
    pub fn label(&self, row: usize) -> Option<String> {
        match &self.data {
            ColumnData::Numeric(values) => values.get(row).copied().flatten().map(format_number),
            ColumnData::Text(values) => values.get(row).cloned().flatten(),
        }
    }
}

/// Render a number the way it would appear in the source data.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// A parsed table: named columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Parse `data` according to `format`.
    pub fn parse(data: &str, format: DataFormat) -> Result<Self, AnalysisError> {
        let dataset = match format {
            DataFormat::Csv => Self::from_csv(data)?,
            DataFormat::Json => Self::from_json(data)?,
        };
        debug!(
            format = %format,
            rows = dataset.rows,
            columns = dataset.columns.len(),
            "Parsed dataset"
        );
        Ok(dataset)
    }

    /// Parse a CSV table with a header row. Ragged rows are rejected.
    pub fn from_csv(data: &str) -> Result<Self, AnalysisError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut cells: Vec<Vec<RawCell>> = vec![Vec::new(); headers.len()];

        for record in reader.records() {
            let record = record?;
            for (column, field) in cells.iter_mut().zip(record.iter()) {
                column.push(RawCell::from_csv_field(field));
            }
        }

        Ok(Self::from_raw(headers, cells))
    }

    /// Parse a JSON array of row objects.
    ///
    /// Columns appear in first-seen order; a key absent from a row is a
    /// missing cell.
    pub fn from_json(data: &str) -> Result<Self, AnalysisError> {
        let Value::Array(rows) = serde_json::from_str::<Value>(data)? else {
            return Err(AnalysisError::NotRecords);
        };

        let mut headers: Vec<String> = Vec::new();
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(row) = row else {
                return Err(AnalysisError::NotRecords);
            };
            for key in row.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
            records.push(row);
        }

        let cells = headers
            .iter()
            .map(|name| {
                records
                    .iter()
                    .map(|row| RawCell::from_json_value(row.get(name)))
                    .collect()
            })
            .collect();

        Ok(Self::from_raw(headers, cells))
    }

    fn from_raw(headers: Vec<String>, cells: Vec<Vec<RawCell>>) -> Self {
        let rows = cells.first().map(Vec::len).unwrap_or(0);
        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::new(name, infer_column(cells)))
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column by name, failing when it does not exist.
    pub fn require_column(&self, name: &str) -> Result<&Column, AnalysisError> {
        self.column(name)
            .ok_or_else(|| AnalysisError::ColumnNotFound(name.to_string()))
    }

    /// Columns whose every non-missing cell is a number.
    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_numeric())
    }
}

/// A cell before the column type is known.
#[derive(Debug, Clone)]
enum RawCell {
    Missing,
    Number(f64, String),
    Text(String),
}

impl RawCell {
    fn from_csv_field(field: &str) -> Self {
        let trimmed = field.trim();
        if MISSING_TOKENS.contains(&trimmed) {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_nan() => Self::Missing,
            Ok(number) => Self::Number(number, field.to_string()),
            Err(_) => Self::Text(field.to_string()),
        }
    }

    fn from_json_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Missing,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(number) => Self::Number(number, n.to_string()),
                None => Self::Text(n.to_string()),
            },
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Text(other.to_string()),
        }
    }
}

fn infer_column(cells: Vec<RawCell>) -> ColumnData {
    let numeric = cells
        .iter()
        .all(|cell| matches!(cell, RawCell::Missing | RawCell::Number(..)));

    if numeric {
        ColumnData::Numeric(
            cells
                .into_iter()
                .map(|cell| match cell {
                    RawCell::Number(number, _) => Some(number),
                    _ => None,
                })
                .collect(),
        )
    } else {
        ColumnData::Text(
            cells
                .into_iter()
                .map(|cell| match cell {
                    RawCell::Missing => None,
                    RawCell::Number(_, text) | RawCell::Text(text) => Some(text),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_numeric_and_text_columns() {
        let dataset = Dataset::from_csv("a,b,c\n1,x,2.5\n3,y,\n").unwrap();
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.columns().len(), 3);

        let a = dataset.column("a").unwrap();
        assert_eq!(a.numeric(), Some(&[Some(1.0), Some(3.0)][..]));
        assert!(!dataset.column("b").unwrap().is_numeric());

        let c = dataset.column("c").unwrap();
        assert!(c.is_numeric());
        assert_eq!(c.missing_count(), 1);
    }

    #[test]
    fn test_csv_mixed_column_is_text() {
        let dataset = Dataset::from_csv("v\n1\ntwo\n3\n").unwrap();
        let v = dataset.column("v").unwrap();
        assert!(!v.is_numeric());
        assert_eq!(v.label(0).as_deref(), Some("1"));
    }

    #[test]
    fn test_csv_missing_tokens_ignore_padding() {
        let dataset = Dataset::from_csv("v,w\n1, NA\n NA ,2\n3,NAN\n").unwrap();

        let v = dataset.column("v").unwrap();
        assert_eq!(v.numeric(), Some(&[Some(1.0), None, Some(3.0)][..]));

        let w = dataset.column("w").unwrap();
        assert!(w.is_numeric());
        assert_eq!(w.missing_count(), 2);
    }

    #[test]
    fn test_csv_ragged_rows_rejected() {
        assert!(matches!(
            Dataset::from_csv("a,b\n1,2\n3\n"),
            Err(AnalysisError::Csv(_))
        ));
    }

    #[test]
    fn test_json_records() {
        let dataset =
            Dataset::from_json(r#"[{"a": 1, "b": "x"}, {"a": 2.5, "c": null}]"#).unwrap();
        assert_eq!(dataset.row_count(), 2);

        let names: Vec<&str> = dataset.columns().iter().map(Column::name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        assert!(dataset.column("a").unwrap().is_numeric());
        assert_eq!(dataset.column("b").unwrap().missing_count(), 1);
        assert_eq!(dataset.column("c").unwrap().missing_count(), 2);
    }

    #[test]
    fn test_json_must_be_array_of_objects() {
        assert!(matches!(
            Dataset::from_json(r#"{"a": [1, 2]}"#),
            Err(AnalysisError::NotRecords)
        ));
        assert!(matches!(
            Dataset::from_json("[1, 2]"),
            Err(AnalysisError::NotRecords)
        ));
    }

    #[test]
    fn test_require_column() {
        let dataset = Dataset::from_csv("a\n1\n").unwrap();
        assert!(matches!(
            dataset.require_column("missing"),
            Err(AnalysisError::ColumnNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.5), "2.5");
    }
}
