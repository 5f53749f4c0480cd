//! In-memory tabular dataset consumed by the model builder.
//!
//! A [`Dataset`] is an ordered list of rows, each mapping a column name to a
//! [`RawValue`]. Every row carries exactly the dataset's column set; this is
//! checked on construction so downstream stages can look values up freely.
//!
//! Files are read through Polars for CSV (the same reader configuration the
//! analysis tooling uses) and through `serde_json` for arrays of JSON records.

use crate::error::{Result, TabmlError};
use polars::prelude::{DataFrame, DataType, LazyCsvReader, LazyFileListReader as _};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

/// A single cell as uploaded: text, number, or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Empty,
}

impl RawValue {
    /// Empty cells and empty strings both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Finite numeric reading of the cell, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v).filter(|v| v.is_finite()),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Self::Empty => None,
        }
    }

    /// Label used for categorical handling. Integral numbers drop the `.0`.
    pub fn as_label(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Number(v) => Cow::Owned(crate::utils::format_number_label(*v)),
            Self::Empty => Cow::Borrowed(""),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<Option<f64>> for RawValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Self::Empty, Self::Number)
    }
}

impl From<&serde_json::Value> for RawValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Empty,
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Empty, Self::Number),
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Bool(b) => Self::Text(b.to_string()),
            other => Self::Text(other.to_string()),
        }
    }
}

pub type Row = HashMap<String, RawValue>;

pub(crate) static EMPTY: RawValue = RawValue::Empty;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset, rejecting rows whose column set differs from `columns`.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TabmlError::InvalidDataset(format!(
                    "row {idx} has {} columns, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            if let Some(missing) = columns.iter().find(|c| !row.contains_key(*c)) {
                return Err(TabmlError::InvalidDataset(format!(
                    "row {idx} is missing column '{missing}'"
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Parse a JSON array of flat objects. Columns follow the key order of the
    /// first record.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let records: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(content)?;
        let columns: Vec<String> = records
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        let rows = records
            .iter()
            .map(|record| {
                record
                    .iter()
                    .map(|(k, v)| (k.clone(), RawValue::from(v)))
                    .collect::<Row>()
            })
            .collect();
        Self::new(columns, rows)
    }

    /// Convert a Polars frame. Numeric columns become numbers, everything else text.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut rows = vec![Row::with_capacity(columns.len()); df.height()];

        for column in df.get_columns() {
            let name = column.name().to_string();
            let series = column.as_materialized_series();
            if series.dtype().is_primitive_numeric() {
                let casted = series.cast(&DataType::Float64)?;
                for (row, value) in rows.iter_mut().zip(casted.f64()?.into_iter()) {
                    row.insert(name.clone(), RawValue::from(value));
                }
            } else {
                let casted = series.cast(&DataType::String)?;
                for (row, value) in rows.iter_mut().zip(casted.str()?.into_iter()) {
                    row.insert(name.clone(), value.map_or(RawValue::Empty, RawValue::from));
                }
            }
        }

        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Values of one column in row order. Absent cells read as [`RawValue::Empty`].
    pub fn column_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RawValue> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(name).unwrap_or(&EMPTY))
    }
}

/// Load a dataset from a CSV or JSON file.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let dataset = match ext.as_str() {
        "csv" => {
            let df = LazyCsvReader::new(path)
                .with_infer_schema_length(Some(10_000))
                .with_has_header(true)
                .finish()?
                .collect()?;
            Dataset::from_dataframe(&df)?
        }
        "json" => Dataset::from_json_str(&std::fs::read_to_string(path)?)?,
        _ => {
            return Err(TabmlError::InvalidDataset(format!(
                "Unsupported file extension: {ext}"
            )));
        }
    };

    tracing::info!(
        "Loaded dataset {} ({} rows, {} columns)",
        path.display(),
        dataset.len(),
        dataset.columns().len()
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_values() {
        assert!(RawValue::Empty.is_missing());
        assert!(RawValue::from("").is_missing());
        assert!(!RawValue::from(" ").is_missing());
        assert!(!RawValue::Number(0.0).is_missing());
    }

    #[test]
    fn test_number_parsing() {
        assert_eq!(RawValue::from(" 4.5 ").as_number(), Some(4.5));
        assert_eq!(RawValue::from("NaN").as_number(), None);
        assert_eq!(RawValue::from("inf").as_number(), None);
        assert_eq!(RawValue::Number(f64::NAN).as_number(), None);
        assert_eq!(RawValue::from("abc").as_number(), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(RawValue::Number(1.0).as_label(), "1");
        assert_eq!(RawValue::Number(2.5).as_label(), "2.5");
        assert_eq!(RawValue::from("yes").as_label(), "yes");
    }

    #[test]
    fn test_inconsistent_rows_rejected() {
        let mut a = Row::new();
        a.insert("x".to_owned(), RawValue::Number(1.0));
        let mut b = Row::new();
        b.insert("y".to_owned(), RawValue::Number(1.0));

        let result = Dataset::new(vec!["x".to_owned()], vec![a, b]);
        assert!(matches!(result, Err(TabmlError::InvalidDataset(_))));
    }

    #[test]
    fn test_from_json_str() -> Result<()> {
        let ds = Dataset::from_json_str(
            r#"[{"a": 1, "b": "x"}, {"a": null, "b": true}]"#,
        )?;
        assert_eq!(ds.columns(), ["a", "b"]);
        assert_eq!(ds.len(), 2);
        let a: Vec<_> = ds.column_values("a").cloned().collect();
        assert_eq!(a, vec![RawValue::Number(1.0), RawValue::Empty]);
        let b: Vec<_> = ds.column_values("b").cloned().collect();
        assert_eq!(b, vec![RawValue::from("x"), RawValue::from("true")]);
        Ok(())
    }

    #[test]
    fn test_json_columns_keep_file_order() -> Result<()> {
        let ds = Dataset::from_json_str(
            r#"[{"zeta": 1, "alpha": 2, "mid": 3}, {"zeta": 4, "alpha": 5, "mid": 6}]"#,
        )?;
        assert_eq!(ds.columns(), ["zeta", "alpha", "mid"]);
        Ok(())
    }

    #[test]
    fn test_from_dataframe() -> anyhow::Result<()> {
        use polars::prelude::{Column, NamedFrom as _, Series};

        let x = Series::new("x".into(), vec![Some(1.0), None, Some(3.0)]);
        let c = Series::new("c".into(), vec![Some("a"), Some("b"), None]);
        let n = Series::new("n".into(), vec![1i64, 2, 3]);
        let df = DataFrame::new(vec![Column::from(x), Column::from(c), Column::from(n)])?;

        let ds = Dataset::from_dataframe(&df)?;
        assert_eq!(ds.columns(), ["x", "c", "n"]);
        let ns: Vec<_> = ds.column_values("n").cloned().collect();
        assert_eq!(
            ns,
            vec![RawValue::Number(1.0), RawValue::Number(2.0), RawValue::Number(3.0)]
        );
        let xs: Vec<_> = ds.column_values("x").cloned().collect();
        assert_eq!(
            xs,
            vec![RawValue::Number(1.0), RawValue::Empty, RawValue::Number(3.0)]
        );
        let cs: Vec<_> = ds.column_values("c").cloned().collect();
        assert_eq!(cs, vec![RawValue::from("a"), RawValue::from("b"), RawValue::Empty]);
        Ok(())
    }
}
