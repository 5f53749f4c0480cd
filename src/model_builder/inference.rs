//! Column type inference from a leading sample of rows.
//!
//! There are two passes and they are allowed to disagree on the same column:
//!
//! - [`infer_type`] is the full pass run by the pipeline. It looks at up to
//!   `full_sample_rows` rows, skips missing cells, and requires *every* sampled
//!   value to agree: all dates ⇒ `Date`, all finite numbers ⇒ `Numeric`,
//!   anything else ⇒ `Categorical`.
//! - [`infer_type_quick`] is the lighter pass used while the wizard is being
//!   filled in. It looks at up to `quick_sample_rows` rows, counts missing cells
//!   as non-numeric, and calls a column numeric once the numeric share reaches
//!   `quick_numeric_ratio`. It never reports `Date`.
//!
//! A sample without any usable value is `Categorical` in both passes.

use super::types::{ColumnType, ColumnTypes};
use crate::config::PipelineSettings;
use crate::dataset::{Dataset, RawValue};
use regex::Regex;
use std::sync::LazyLock;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid ISO date regex"));
static US_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("valid US date regex"));

/// `YYYY-MM-DD` or `MM/DD/YYYY`, shape only.
pub fn looks_like_date(value: &RawValue) -> bool {
    match value {
        RawValue::Text(s) => {
            let s = s.trim();
            ISO_DATE.is_match(s) || US_DATE.is_match(s)
        }
        RawValue::Number(_) | RawValue::Empty => false,
    }
}

pub fn infer_type(dataset: &Dataset, column: &str, settings: &PipelineSettings) -> ColumnType {
    let sample: Vec<&RawValue> = dataset
        .column_values(column)
        .take(settings.full_sample_rows)
        .filter(|v| !v.is_missing())
        .collect();

    if sample.is_empty() {
        return ColumnType::Categorical;
    }
    if sample.iter().all(|v| looks_like_date(v)) {
        return ColumnType::Date;
    }
    if sample.iter().all(|v| v.as_number().is_some()) {
        return ColumnType::Numeric;
    }
    ColumnType::Categorical
}

pub fn infer_type_quick(
    dataset: &Dataset,
    column: &str,
    settings: &PipelineSettings,
) -> ColumnType {
    let sample_size = dataset.len().min(settings.quick_sample_rows);
    if sample_size == 0 {
        return ColumnType::Categorical;
    }

    let numeric_count = dataset
        .column_values(column)
        .take(sample_size)
        .filter(|v| !v.is_missing() && v.as_number().is_some())
        .count();

    if numeric_count as f64 >= sample_size as f64 * settings.quick_numeric_ratio {
        ColumnType::Numeric
    } else {
        ColumnType::Categorical
    }
}

/// Full-pass types for the given columns.
pub fn infer_types<'a>(
    dataset: &Dataset,
    columns: impl IntoIterator<Item = &'a str>,
    settings: &PipelineSettings,
) -> ColumnTypes {
    columns
        .into_iter()
        .map(|c| (c.to_owned(), infer_type(dataset, c, settings)))
        .collect()
}

/// Quick-pass types for every column of the dataset.
pub fn infer_types_quick(dataset: &Dataset, settings: &PipelineSettings) -> ColumnTypes {
    dataset
        .columns()
        .iter()
        .map(|c| (c.clone(), infer_type_quick(dataset, c, settings)))
        .collect()
}
