//! Imputation, winsorisation and one-hot encoding.
//!
//! [`fit`] computes everything that depends on the data (fill values, bounds,
//! vocabularies); [`transform`] is a pure function of a dataset and those
//! artifacts, so running it twice gives identical rows.

use super::types::{
    ColumnArtifacts, ColumnType, ColumnTypes, FeatureArtifacts, PreprocessingArtifacts,
    ProcessedRow, TargetArtifacts, one_hot_column, target_column,
};
use crate::config::PipelineSettings;
use crate::dataset::{Dataset, EMPTY, RawValue, Row};
use chrono::{Datelike as _, NaiveDate};
use std::collections::HashMap;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Days from the common era for `YYYY-MM-DD` / `MM/DD/YYYY` text.
pub fn parse_date_ordinal(value: &RawValue) -> Option<f64> {
    let RawValue::Text(s) = value else {
        return None;
    };
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| f64::from(d.num_days_from_ce()))
}

fn numeric_reading(value: &RawValue, date: bool) -> Option<f64> {
    if date {
        parse_date_ordinal(value)
    } else {
        value.as_number()
    }
}

/// Value at `floor(n * p)` of an ascending slice.
fn percentile_at(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    sorted.get(idx).copied()
}

fn fit_numeric(
    dataset: &Dataset,
    column: &str,
    date: bool,
    settings: &PipelineSettings,
) -> ColumnArtifacts {
    let mut values: Vec<f64> = dataset
        .column_values(column)
        .filter(|v| !v.is_missing())
        .filter_map(|v| numeric_reading(v, date))
        .collect();

    let fill = if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    };

    values.sort_by(f64::total_cmp);
    let lower = percentile_at(&values, settings.lower_percentile).unwrap_or(0.0);
    let upper = percentile_at(&values, settings.upper_percentile).unwrap_or(0.0);

    ColumnArtifacts::Numeric {
        fill,
        lower,
        upper,
        date,
    }
}

fn fit_categorical(dataset: &Dataset, column: &str) -> ColumnArtifacts {
    // Vocabulary keeps first-seen order; the index map only speeds up counting.
    let mut vocabulary: Vec<String> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for value in dataset.column_values(column).filter(|v| !v.is_missing()) {
        let label = value.as_label();
        if let Some(&i) = index.get(label.as_ref()) {
            if let Some(c) = counts.get_mut(i) {
                *c += 1;
            }
        } else {
            index.insert(label.to_string(), vocabulary.len());
            vocabulary.push(label.into_owned());
            counts.push(1);
        }
    }

    let fill = mode_of(&vocabulary, &counts).unwrap_or_default();
    ColumnArtifacts::Categorical { fill, vocabulary }
}

/// Most frequent entry; the earliest one wins a tie.
pub(crate) fn mode_of(labels: &[String], counts: &[usize]) -> Option<String> {
    let mut best: Option<(&String, usize)> = None;
    for (label, &count) in labels.iter().zip(counts) {
        if best.is_none_or(|(_, max)| count > max) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label.clone())
}

fn fit_column(
    dataset: &Dataset,
    column: &str,
    kind: ColumnType,
    settings: &PipelineSettings,
) -> ColumnArtifacts {
    match kind {
        ColumnType::Numeric => fit_numeric(dataset, column, false, settings),
        ColumnType::Date => fit_numeric(dataset, column, true, settings),
        ColumnType::Categorical => fit_categorical(dataset, column),
    }
}

/// Computes fill values, bounds and vocabularies for the features and target.
///
/// Columns absent from `column_types` are treated as categorical.
pub fn fit(
    dataset: &Dataset,
    column_types: &ColumnTypes,
    feature_columns: &[String],
    target: Option<&str>,
    settings: &PipelineSettings,
) -> PreprocessingArtifacts {
    let kind_of = |name: &str| {
        column_types
            .get(name)
            .copied()
            .unwrap_or(ColumnType::Categorical)
    };

    let features = feature_columns
        .iter()
        .map(|name| FeatureArtifacts {
            name: name.clone(),
            column: fit_column(dataset, name, kind_of(name), settings),
        })
        .collect();

    let target = target.map(|name| {
        let column = fit_column(dataset, name, kind_of(name), settings);
        let target_map = match &column {
            ColumnArtifacts::Categorical { vocabulary, .. } => Some(vocabulary.clone()),
            ColumnArtifacts::Numeric { .. } => None,
        };
        TargetArtifacts {
            name: name.to_owned(),
            column,
            target_map,
        }
    });

    let artifacts = PreprocessingArtifacts { features, target };
    tracing::debug!(
        "Fitted preprocessing: {} feature columns -> {} matrix columns",
        feature_columns.len(),
        artifacts.feature_matrix_columns().len()
    );
    artifacts
}

fn encode_feature(row: &Row, feature: &FeatureArtifacts, out: &mut ProcessedRow) {
    let raw = row.get(&feature.name).unwrap_or(&EMPTY);
    match &feature.column {
        ColumnArtifacts::Numeric {
            fill,
            lower,
            upper,
            date,
        } => {
            let value = if raw.is_missing() {
                *fill
            } else {
                numeric_reading(raw, *date).unwrap_or(*fill)
            };
            out.insert(feature.name.clone(), value.max(*lower).min(*upper));
        }
        ColumnArtifacts::Categorical { fill, vocabulary } => {
            let label = if raw.is_missing() {
                fill.clone()
            } else {
                raw.as_label().into_owned()
            };
            for entry in vocabulary {
                let hot = if *entry == label { 1.0 } else { 0.0 };
                out.insert(one_hot_column(&feature.name, entry), hot);
            }
        }
    }
}

fn encode_target(row: &Row, target: &TargetArtifacts, out: &mut ProcessedRow) {
    let raw = row.get(&target.name).unwrap_or(&EMPTY);
    match (&target.target_map, &target.column) {
        (Some(classes), _) => {
            let label = (!raw.is_missing()).then(|| raw.as_label());
            for class in classes {
                let hot = if label.as_deref() == Some(class.as_str()) {
                    1.0
                } else {
                    0.0
                };
                out.insert(target_column(class), hot);
            }
        }
        (None, ColumnArtifacts::Numeric { date, .. }) => {
            if let Some(value) = numeric_reading(raw, *date) {
                out.insert(target.name.clone(), value);
            }
        }
        (None, ColumnArtifacts::Categorical { .. }) => {}
    }
}

/// Encodes every row with the fitted artifacts.
pub fn transform(dataset: &Dataset, artifacts: &PreprocessingArtifacts) -> Vec<ProcessedRow> {
    dataset
        .rows()
        .iter()
        .map(|row| {
            let mut out = ProcessedRow::new();
            for feature in &artifacts.features {
                encode_feature(row, feature, &mut out);
            }
            if let Some(target) = &artifacts.target {
                encode_target(row, target, &mut out);
            }
            out
        })
        .collect()
}

/// Class label of a processed row, read back from its one-hot target columns.
pub fn decode_target_label(row: &ProcessedRow, target_map: &[String]) -> Option<String> {
    target_map
        .iter()
        .find(|class| row.get(&target_column(class)).copied() == Some(1.0))
        .cloned()
}
