//! Plain-language reading of a finished run.
//!
//! Column importances from the tree are folded back onto the features the user
//! picked, and the metrics are banded into short sentences for the results view.

use super::types::{EvaluationReport, FeatureImportance, Metrics, PreprocessingArtifacts};

pub const R2_STRONG: f64 = 0.7;
pub const R2_MODERATE: f64 = 0.3;
pub const ACCURACY_RELIABLE: f64 = 0.8;
pub const ACCURACY_NEAR_CHANCE: f64 = 0.6;
pub const TOP_DRIVERS: usize = 3;

/// Sums per-column importance back onto the original features, normalised and
/// sorted by importance (feature order breaks ties). Empty when nothing was split.
pub fn aggregate_importance(
    artifacts: &PreprocessingArtifacts,
    column_importance: &[f64],
) -> Vec<FeatureImportance> {
    let mut offset = 0;
    let mut per_feature: Vec<FeatureImportance> = Vec::with_capacity(artifacts.features.len());
    for feature in &artifacts.features {
        let width = feature.derived_columns().len();
        let importance = column_importance
            .get(offset..offset + width)
            .map(|cols| cols.iter().sum::<f64>())
            .unwrap_or(0.0);
        offset += width;
        per_feature.push(FeatureImportance {
            feature: feature.name.clone(),
            importance,
        });
    }

    let total: f64 = per_feature.iter().map(|f| f.importance).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    for f in &mut per_feature {
        f.importance /= total;
    }
    per_feature.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    per_feature
}

pub fn generate_insights(
    target: &str,
    report: &EvaluationReport,
    importance: &[FeatureImportance],
) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(reason) = &report.fallback_reason {
        insights.push(format!(
            "The decision tree could not be trained ({reason}); results come from the {} baseline over the full dataset.",
            report.algorithm
        ));
    }

    match &report.metrics {
        Metrics::Regression(m) => {
            let pct = (m.r2 * 100.0).max(0.0);
            if m.r2 > R2_STRONG {
                insights.push(format!(
                    "Strong predictive model: explains {pct:.1}% of the variation in {target}."
                ));
            } else if m.r2 > R2_MODERATE {
                insights.push(format!(
                    "Moderate predictive model: explains {pct:.1}% of the variation in {target}."
                ));
            } else {
                insights.push(format!("Weak predictive model: only explains {pct:.1}% of the variation in {target}. Other factors are likely at play."));
            }
            insights.push(format!(
                "Predictions are off by {:.2} on average (mean absolute error).",
                m.mae
            ));
        }
        Metrics::Classification(m) => {
            let pct = m.accuracy * 100.0;
            insights.push(format!(
                "The model correctly identifies the '{target}' category {pct:.1}% of the time."
            ));
            if m.accuracy > ACCURACY_RELIABLE {
                insights.push("This is considered a very reliable classification.".to_owned());
            } else if m.accuracy < ACCURACY_NEAR_CHANCE {
                insights.push("The model is not much better than a coin flip; consider adding more relevant features.".to_owned());
            }
            if let Some(majority) = &m.majority_class {
                insights.push(format!("Most common '{target}' value: '{majority}'."));
            }
        }
    }

    for driver in importance
        .iter()
        .filter(|f| f.importance > 0.0)
        .take(TOP_DRIVERS)
    {
        insights.push(format!(
            "Primary Driver: '{}' accounts for {:.1}% of the model's decisions.",
            driver.feature,
            driver.importance * 100.0
        ));
    }

    insights
}
