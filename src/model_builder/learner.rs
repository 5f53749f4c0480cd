//! Learner contract and the decision-tree learners.
//!
//! A learner is `fit(X, y) -> model` and `model.predict(X) -> y`, and either step
//! may fail. Failures are ordinary values ([`LearnerError`]) so the caller can
//! pick a baseline explicitly instead of unwinding.
//!
//! Labels arrive as `Option`s: a `None` is a row whose target was missing, which
//! the tree learners refuse to train on.

use super::tree::RegressionTree;
use super::types::Algorithm;
use crate::config::TreeSettings;
use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LearnerError {
    EmptyTrainingSet,
    NoFeatures,
    TooFewRows { rows: usize },
    LabelCountMismatch { rows: usize, labels: usize },
    FeatureCountMismatch { expected: usize, actual: usize },
    NonFiniteInput { row: usize, column: usize },
    MissingTarget { row: usize },
    Backend(String),
}

impl fmt::Display for LearnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTrainingSet => write!(f, "training segment is empty"),
            Self::NoFeatures => write!(f, "feature matrix has no columns"),
            Self::TooFewRows { rows } => {
                write!(f, "need at least 2 training rows, got {rows}")
            }
            Self::LabelCountMismatch { rows, labels } => {
                write!(f, "feature matrix has {rows} rows but {labels} labels")
            }
            Self::FeatureCountMismatch { expected, actual } => {
                write!(f, "model expects {expected} features, got {actual}")
            }
            Self::NonFiniteInput { row, column } => {
                write!(f, "non-finite value at row {row}, column {column}")
            }
            Self::MissingTarget { row } => write!(f, "row {row} has no target value"),
            Self::Backend(msg) => write!(f, "learner failed: {msg}"),
        }
    }
}

impl std::error::Error for LearnerError {}

pub trait FittedModel<T> {
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<T>, LearnerError>;

    /// Importance per matrix column, summing to 1 when any split was made.
    fn feature_importance(&self) -> Vec<f64>;
}

pub trait Learner<T>: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[Option<T>],
    ) -> Result<Box<dyn FittedModel<T>>, LearnerError>;
}

/// Shape and value checks shared by the tree learners. Returns the labels.
pub fn check_training_inputs<T: Clone>(
    x: &Array2<f64>,
    y: &[Option<T>],
) -> Result<Vec<T>, LearnerError> {
    if x.nrows() == 0 {
        return Err(LearnerError::EmptyTrainingSet);
    }
    if x.ncols() == 0 {
        return Err(LearnerError::NoFeatures);
    }
    if x.nrows() != y.len() {
        return Err(LearnerError::LabelCountMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if x.nrows() < 2 {
        return Err(LearnerError::TooFewRows { rows: x.nrows() });
    }
    check_finite(x)?;

    y.iter()
        .enumerate()
        .map(|(row, label)| label.clone().ok_or(LearnerError::MissingTarget { row }))
        .collect()
}

fn check_finite(x: &Array2<f64>) -> Result<(), LearnerError> {
    match x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, column), _)) => Err(LearnerError::NonFiniteInput { row, column }),
        None => Ok(()),
    }
}

fn check_prediction_inputs(x: &Array2<f64>, expected: usize) -> Result<(), LearnerError> {
    if x.ncols() != expected {
        return Err(LearnerError::FeatureCountMismatch {
            expected,
            actual: x.ncols(),
        });
    }
    check_finite(x)
}

#[derive(Debug, Clone, Default)]
pub struct TreeRegressor {
    settings: TreeSettings,
}

impl TreeRegressor {
    pub fn new(settings: TreeSettings) -> Self {
        Self { settings }
    }
}

struct FittedRegressor {
    tree: RegressionTree,
}

impl FittedModel<f64> for FittedRegressor {
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>, LearnerError> {
        check_prediction_inputs(x, self.tree.n_features())?;
        Ok(self.tree.predict(x))
    }

    fn feature_importance(&self) -> Vec<f64> {
        self.tree.feature_importance().to_vec()
    }
}

impl Learner<f64> for TreeRegressor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::DecisionTreeRegression
    }

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[Option<f64>],
    ) -> Result<Box<dyn FittedModel<f64>>, LearnerError> {
        let targets = check_training_inputs(x, y)?;
        if let Some(row) = targets.iter().position(|v| !v.is_finite()) {
            return Err(LearnerError::MissingTarget { row });
        }
        let tree = RegressionTree::fit(x, &targets, &self.settings);
        Ok(Box::new(FittedRegressor { tree }))
    }
}

/// Depth used for the classifier when the settings leave it unbounded.
///
/// `linfa-trees` builds, prunes and walks its tree recursively, so a feature
/// that peels off one row per level would otherwise recurse once per row.
pub const CLASSIFIER_DEPTH_LIMIT: usize = 64;

/// Gini decision tree from `linfa-trees`, with string labels mapped to class
/// indices in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TreeClassifier {
    settings: TreeSettings,
}

impl TreeClassifier {
    pub fn new(settings: TreeSettings) -> Self {
        Self { settings }
    }
}

struct FittedClassifier {
    model: DecisionTree<f64, usize>,
    classes: Vec<String>,
    n_features: usize,
}

impl FittedModel<String> for FittedClassifier {
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<String>, LearnerError> {
        check_prediction_inputs(x, self.n_features)?;
        let predicted: Array1<usize> = self.model.predict(x);
        predicted
            .iter()
            .map(|&idx| {
                self.classes
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| LearnerError::Backend(format!("unknown class index {idx}")))
            })
            .collect()
    }

    fn feature_importance(&self) -> Vec<f64> {
        let importance = self.model.feature_importance();
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter().map(|v| v / total).collect()
        } else {
            importance
        }
    }
}

impl Learner<String> for TreeClassifier {
    fn algorithm(&self) -> Algorithm {
        Algorithm::DecisionTreeClassifier
    }

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[Option<String>],
    ) -> Result<Box<dyn FittedModel<String>>, LearnerError> {
        let labels = check_training_inputs(x, y)?;

        let mut classes: Vec<String> = Vec::new();
        let mut encoded = Vec::with_capacity(labels.len());
        for label in labels {
            let idx = match classes.iter().position(|c| *c == label) {
                Some(idx) => idx,
                None => {
                    classes.push(label);
                    classes.len() - 1
                }
            };
            encoded.push(idx);
        }

        let dataset = Dataset::new(x.clone(), Array1::from(encoded));
        let model = DecisionTree::params()
            .max_depth(Some(
                self.settings
                    .max_depth
                    .map_or(CLASSIFIER_DEPTH_LIMIT, |d| d.min(CLASSIFIER_DEPTH_LIMIT)),
            ))
            .min_weight_split(self.settings.min_samples_split as f32)
            .min_weight_leaf(self.settings.min_samples_leaf as f32)
            .fit(&dataset)
            .map_err(|e| LearnerError::Backend(format!("Decision Tree training failed: {e}")))?;

        Ok(Box::new(FittedClassifier {
            model,
            classes,
            n_features: x.ncols(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_input_checks() {
        let empty = Array2::<f64>::zeros((0, 2));
        assert_eq!(
            check_training_inputs::<f64>(&empty, &[]).unwrap_err(),
            LearnerError::EmptyTrainingSet
        );

        let no_cols = Array2::<f64>::zeros((3, 0));
        assert_eq!(
            check_training_inputs(&no_cols, &[Some(1.0), Some(2.0), Some(3.0)]).unwrap_err(),
            LearnerError::NoFeatures
        );

        let one_row = array![[5.0]];
        assert_eq!(
            check_training_inputs(&one_row, &[Some(1.0)]).unwrap_err(),
            LearnerError::TooFewRows { rows: 1 }
        );

        let nan = array![[1.0], [f64::NAN]];
        assert_eq!(
            check_training_inputs(&nan, &[Some(1.0), Some(2.0)]).unwrap_err(),
            LearnerError::NonFiniteInput { row: 1, column: 0 }
        );

        let ok = array![[1.0], [2.0]];
        assert_eq!(
            check_training_inputs(&ok, &[Some("a".to_owned()), None]).unwrap_err(),
            LearnerError::MissingTarget { row: 1 }
        );
        assert_eq!(
            check_training_inputs(&ok, &[Some(1.0)]).unwrap_err(),
            LearnerError::LabelCountMismatch { rows: 2, labels: 1 }
        );
    }

    #[test]
    fn test_regressor_fit_predict() -> Result<(), LearnerError> {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y: Vec<Option<f64>> = [1.0, 1.0, 1.0, 9.0, 9.0, 9.0].into_iter().map(Some).collect();
        let model = TreeRegressor::default().fit(&x, &y)?;
        assert_eq!(model.predict(&array![[0.0], [20.0]])?, vec![1.0, 9.0]);
        assert!(matches!(
            model.predict(&array![[0.0, 1.0]]),
            Err(LearnerError::FeatureCountMismatch { expected: 1, actual: 2 })
        ));
        Ok(())
    }

    #[test]
    fn test_classifier_fit_predict() -> Result<(), LearnerError> {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y: Vec<Option<String>> = ["no", "no", "no", "yes", "yes", "yes"]
            .into_iter()
            .map(|s| Some(s.to_owned()))
            .collect();
        let model = TreeClassifier::default().fit(&x, &y)?;
        assert_eq!(model.predict(&array![[0.0], [50.0]])?, vec!["no", "yes"]);

        let importance = model.feature_importance();
        assert_eq!(importance.len(), 1);
        Ok(())
    }
}
