//! Fitting on the processed rows: the primary learner on the training segment,
//! or a constant baseline over every row.
//!
//! Both paths produce a [`Trained`] whose predictions line up with the processed
//! rows. Choosing between them is left to the caller, which only reaches for
//! [`fit_baseline`] after [`fit_primary`] returned a [`LearnerError`].

use super::evaluation::majority_label;
use super::learner::{Learner, LearnerError};
use super::preprocessing::decode_target_label;
use super::split::train_len;
use super::types::{Algorithm, EvaluationScope, ProcessedRow};
use ndarray::Array2;

/// Dense feature matrix over the derived columns, in the given order.
///
/// A column absent from a row becomes NaN, which the learners reject.
pub fn feature_matrix(rows: &[ProcessedRow], columns: &[String]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), columns.len()), |(r, c)| {
        rows.get(r)
            .zip(columns.get(c))
            .and_then(|(row, name)| row.get(name).copied())
            .unwrap_or(f64::NAN)
    })
}

/// Numeric target per row; `None` where the target was missing.
pub fn regression_targets(rows: &[ProcessedRow], target: &str) -> Vec<Option<f64>> {
    rows.iter().map(|row| row.get(target).copied()).collect()
}

/// Class label per row, decoded from the one-hot target columns.
pub fn class_labels(rows: &[ProcessedRow], target_map: &[String]) -> Vec<Option<String>> {
    rows.iter()
        .map(|row| decode_target_label(row, target_map))
        .collect()
}

/// Output of either training path.
#[derive(Debug, Clone, PartialEq)]
pub struct Trained<T> {
    pub algorithm: Algorithm,
    pub scope: EvaluationScope,
    /// Index of the first scored row (0 for a full-dataset baseline)
    pub scored_from: usize,
    /// Aligned with the processed rows; `None` for rows that were not predicted.
    pub predictions: Vec<Option<T>>,
    /// Per matrix column; empty for baselines.
    pub feature_importance: Vec<f64>,
    pub fallback_reason: Option<String>,
}

/// Fits `learner` on the leading `train_fraction` of rows and predicts the rest.
pub fn fit_primary<T: Clone>(
    learner: &dyn Learner<T>,
    x: &Array2<f64>,
    y: &[Option<T>],
    train_fraction: f64,
) -> Result<Trained<T>, LearnerError> {
    let n = x.nrows();
    let cut = train_len(n, train_fraction);
    let (x_train, x_test) = x.view().split_at(ndarray::Axis(0), cut);
    let y_train = y.get(..cut).unwrap_or_default();

    let model = learner.fit(&x_train.to_owned(), y_train)?;
    let test_predictions = if x_test.nrows() == 0 {
        Vec::new()
    } else {
        model.predict(&x_test.to_owned())?
    };

    let mut predictions: Vec<Option<T>> = vec![None; cut];
    predictions.extend(test_predictions.into_iter().map(Some));

    Ok(Trained {
        algorithm: learner.algorithm(),
        scope: EvaluationScope::TestSegment,
        scored_from: cut,
        predictions,
        feature_importance: model.feature_importance(),
        fallback_reason: None,
    })
}

/// Constant predictor computed from every known target.
pub trait Baseline: Clone + Sized {
    const ALGORITHM: Algorithm;

    fn baseline(y: &[Option<Self>]) -> Option<Self>;
}

impl Baseline for f64 {
    const ALGORITHM: Algorithm = Algorithm::BaselineMean;

    /// Mean of the known targets, 0 when there are none.
    fn baseline(y: &[Option<Self>]) -> Option<Self> {
        let known: Vec<f64> = y.iter().flatten().copied().collect();
        if known.is_empty() {
            Some(0.0)
        } else {
            Some(known.iter().sum::<f64>() / known.len() as f64)
        }
    }
}

impl Baseline for String {
    const ALGORITHM: Algorithm = Algorithm::BaselineMajority;

    fn baseline(y: &[Option<Self>]) -> Option<Self> {
        majority_label(y.iter().flatten().map(String::as_str))
    }
}

/// Predicts the baseline value for every row, scored over the full dataset.
pub fn fit_baseline<T: Baseline>(y: &[Option<T>], reason: &LearnerError) -> Trained<T> {
    let value = T::baseline(y);
    Trained {
        algorithm: T::ALGORITHM,
        scope: EvaluationScope::FullDataset,
        scored_from: 0,
        predictions: vec![value; y.len()],
        feature_importance: Vec::new(),
        fallback_reason: Some(reason.to_string()),
    }
}
