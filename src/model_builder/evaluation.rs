//! Metrics over aligned truth/prediction slices.
//!
//! Only positions where both the truth and the prediction are known are scored.
//! With nothing to score every metric is 0 rather than NaN.

use super::preprocessing::mode_of;
use super::types::{ClassificationMetrics, RegressionMetrics};

fn scored_pairs<'a, T>(
    truth: &'a [Option<T>],
    predicted: &'a [Option<T>],
) -> impl Iterator<Item = (&'a T, &'a T)> {
    truth
        .iter()
        .zip(predicted)
        .filter_map(|(t, p)| t.as_ref().zip(p.as_ref()))
}

/// R², MAE and MSE. R² is 0 when every scored truth is identical.
pub fn regression_metrics(truth: &[Option<f64>], predicted: &[Option<f64>]) -> RegressionMetrics {
    let pairs: Vec<(f64, f64)> = scored_pairs(truth, predicted)
        .map(|(&t, &p)| (t, p))
        .collect();
    let n = pairs.len();
    if n == 0 {
        return RegressionMetrics {
            r2: 0.0,
            mae: 0.0,
            mse: 0.0,
            evaluated_rows: 0,
        };
    }

    let mean = pairs.iter().map(|(t, _)| t).sum::<f64>() / n as f64;
    let ss_res: f64 = pairs.iter().map(|(t, p)| (t - p).powi(2)).sum();
    let abs_err: f64 = pairs.iter().map(|(t, p)| (t - p).abs()).sum();
    let constant = pairs.windows(2).all(|w| match w {
        [(a, _), (b, _)] => a == b,
        _ => true,
    });
    let ss_tot: f64 = pairs.iter().map(|(t, _)| (t - mean).powi(2)).sum();

    let r2 = if constant || ss_tot <= 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    };

    RegressionMetrics {
        r2,
        mae: abs_err / n as f64,
        mse: ss_res / n as f64,
        evaluated_rows: n,
    }
}

/// First-seen distinct labels over `truth`, then over `predicted`.
fn label_axis<'a>(truth: &[&'a String], predicted: &[&'a String]) -> Vec<&'a String> {
    let mut labels: Vec<&String> = Vec::new();
    for label in truth.iter().chain(predicted) {
        if !labels.contains(label) {
            labels.push(*label);
        }
    }
    labels
}

/// Accuracy and confusion matrix. `majority_class` is passed through as computed
/// by the caller (over every known label, not just the scored rows).
pub fn classification_metrics(
    truth: &[Option<String>],
    predicted: &[Option<String>],
    majority_class: Option<String>,
) -> ClassificationMetrics {
    let (truths, preds): (Vec<&String>, Vec<&String>) = scored_pairs(truth, predicted).unzip();
    let labels = label_axis(&truths, &preds);
    let position = |label: &String| labels.iter().position(|l| *l == label);

    let mut confusion_matrix = vec![vec![0usize; labels.len()]; labels.len()];
    let mut correct = 0usize;
    for (t, p) in truths.iter().zip(&preds) {
        if t == p {
            correct += 1;
        }
        if let (Some(i), Some(j)) = (position(*t), position(*p))
            && let Some(cell) = confusion_matrix.get_mut(i).and_then(|row| row.get_mut(j))
        {
            *cell += 1;
        }
    }

    let n = truths.len();
    ClassificationMetrics {
        accuracy: if n == 0 { 0.0 } else { correct as f64 / n as f64 },
        labels: labels.into_iter().cloned().collect(),
        confusion_matrix,
        majority_class,
        evaluated_rows: n,
    }
}

/// Most frequent label, the first one seen winning ties.
pub fn majority_label<'a>(labels: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for label in labels {
        match seen.iter().position(|s| s == label) {
            Some(i) => {
                if let Some(c) = counts.get_mut(i) {
                    *c += 1;
                }
            }
            None => {
                seen.push(label.to_owned());
                counts.push(1);
            }
        }
    }
    mode_of(&seen, &counts)
}
