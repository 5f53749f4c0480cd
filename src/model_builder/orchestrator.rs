//! Runs one model-builder invocation from raw dataset to [`PipelineResult`].
//!
//! The run walks a single linear path of [`PipelineStage`]s:
//!
//! ```text
//! Idle -> Validating -> Preprocessing -> Training -> Evaluating -> Done
//!   \__________\______________\_______________\___________\-----> Failed
//! ```
//!
//! A precondition failure or a cancellation ends the run in `Failed` with no
//! result; there are no retries. A run cancelled before it starts goes straight
//! from `Idle` to `Failed`. A learner failure is *not* a pipeline failure:
//! the run switches to the baseline for its task and the report says so.
//!
//! Nothing is kept between runs. Each call owns its artifacts and model.

use super::evaluation::{classification_metrics, majority_label, regression_metrics};
use super::inference::infer_types;
use super::interpretation::{aggregate_importance, generate_insights};
use super::learner::{Learner, TreeClassifier, TreeRegressor};
use super::preprocessing;
use super::trainer::{
    Baseline, Trained, class_labels, feature_matrix, fit_baseline, fit_primary, regression_targets,
};
use super::types::{
    ColumnType, EvaluationReport, FeatureSpec, Metrics, PipelineResult, Prediction, Task,
};
use crate::config::PipelineSettings;
use crate::dataset::Dataset;
use crate::error::{Result, TabmlError, ValidationError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    Idle,
    Validating,
    Preprocessing,
    Training,
    Evaluating,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Validating => "Validating",
            Self::Preprocessing => "Preprocessing",
            Self::Training => "Training",
            Self::Evaluating => "Evaluating",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// Next stage on the success path
    pub fn next_stage(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Validating),
            Self::Validating => Some(Self::Preprocessing),
            Self::Preprocessing => Some(Self::Training),
            Self::Training => Some(Self::Evaluating),
            Self::Evaluating => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Only the next stage, or `Failed` from any stage that is not terminal.
    pub fn can_transition_to(&self, target: Self) -> bool {
        match (self, target) {
            (
                Self::Idle
                | Self::Validating
                | Self::Preprocessing
                | Self::Training
                | Self::Evaluating,
                Self::Failed,
            ) => true,
            _ => self.next_stage() == Some(target),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Advisory percentage shown while the stage runs.
    pub fn progress(&self) -> Option<u64> {
        match self {
            Self::Idle => Some(0),
            Self::Validating => Some(10),
            Self::Preprocessing => Some(25),
            Self::Training => Some(50),
            Self::Evaluating => Some(80),
            Self::Done => Some(100),
            Self::Failed => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Validating => 1,
            Self::Preprocessing => 2,
            Self::Training => 3,
            Self::Evaluating => 4,
            Self::Done => 5,
            Self::Failed => 6,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Validating,
            2 => Self::Preprocessing,
            3 => Self::Training,
            4 => Self::Evaluating,
            5 => Self::Done,
            6 => Self::Failed,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared handle for watching and cancelling a run from another thread.
///
/// Progress is advisory: it moves at stage boundaries, not with the fit itself.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    progress: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
    stage: Arc<AtomicU8>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::SeqCst)
    }

    pub fn stage(&self) -> PipelineStage {
        PipelineStage::from_u8(self.stage.load(Ordering::SeqCst))
    }

    /// Requests cancellation; honoured at the next stage boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn set_stage(&self, stage: PipelineStage) {
        self.stage.store(stage.to_u8(), Ordering::SeqCst);
        if let Some(pct) = stage.progress() {
            self.progress.store(pct, Ordering::SeqCst);
        }
    }
}

struct StageTracker<'a> {
    control: &'a RunControl,
    current: PipelineStage,
}

impl<'a> StageTracker<'a> {
    fn new(control: &'a RunControl) -> Self {
        control.set_stage(PipelineStage::Idle);
        Self {
            control,
            current: PipelineStage::Idle,
        }
    }

    fn enter(&mut self, next: PipelineStage) -> Result<()> {
        if self.control.is_cancelled() {
            return Err(TabmlError::Aborted);
        }
        if !self.current.can_transition_to(next) {
            return Err(TabmlError::Other(format!(
                "invalid stage transition {} -> {next}",
                self.current
            )));
        }
        tracing::info!("Model builder: {} -> {next}", self.current);
        self.current = next;
        self.control.set_stage(next);
        Ok(())
    }

    fn fail(&mut self, err: &TabmlError) {
        debug_assert!(self.current.can_transition_to(PipelineStage::Failed));
        tracing::error!("Model builder failed during {}: {err}", self.current);
        self.current = PipelineStage::Failed;
        self.control.set_stage(PipelineStage::Failed);
    }
}

/// Checks the preconditions that stop a run before anything is computed.
/// Returns the target column on success.
pub fn validate<'a>(
    dataset: &Dataset,
    spec: &'a FeatureSpec,
    settings: &PipelineSettings,
) -> std::result::Result<&'a str, ValidationError> {
    if !spec.task.is_supervised() {
        return Err(ValidationError::UnsupportedTask(spec.task.as_str().to_owned()));
    }
    if dataset.is_empty() {
        return Err(ValidationError::NoData);
    }
    let target = match spec.target_column.as_deref() {
        Some(t) if !t.is_empty() && !spec.feature_columns.is_empty() => t,
        _ => return Err(ValidationError::MissingTargetOrFeatures),
    };
    if let Some(unknown) = std::iter::once(target)
        .chain(spec.feature_columns.iter().map(String::as_str))
        .find(|c| !dataset.has_column(c))
    {
        return Err(ValidationError::UnknownColumn(unknown.to_owned()));
    }
    if dataset.len() < settings.min_rows {
        return Err(ValidationError::NotEnoughRows {
            rows: dataset.len(),
            required: settings.min_rows,
        });
    }
    Ok(target)
}

/// The model builder: settings plus one learner per supervised task.
pub struct ModelPipeline {
    settings: PipelineSettings,
    regressor: Box<dyn Learner<f64>>,
    classifier: Box<dyn Learner<String>>,
}

impl Default for ModelPipeline {
    fn default() -> Self {
        Self::new(PipelineSettings::default())
    }
}

impl ModelPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            regressor: Box::new(TreeRegressor::new(settings.tree.clone())),
            classifier: Box::new(TreeClassifier::new(settings.tree.clone())),
            settings,
        }
    }

    #[must_use]
    pub fn with_regressor(mut self, learner: impl Learner<f64> + 'static) -> Self {
        self.regressor = Box::new(learner);
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, learner: impl Learner<String> + 'static) -> Self {
        self.classifier = Box::new(learner);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs to completion on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`TabmlError::Validation`] when a precondition fails.
    pub fn run(&self, dataset: &Dataset, spec: &FeatureSpec) -> Result<PipelineResult> {
        self.run_with(dataset, spec, &RunControl::default())
    }

    /// Like [`run`](Self::run), reporting progress through `control` and
    /// stopping with [`TabmlError::Aborted`] once it is cancelled.
    ///
    /// # Errors
    ///
    /// Returns a validation error or [`TabmlError::Aborted`]; no partial result
    /// is produced in either case.
    pub fn run_with(
        &self,
        dataset: &Dataset,
        spec: &FeatureSpec,
        control: &RunControl,
    ) -> Result<PipelineResult> {
        let start = Instant::now();
        let mut tracker = StageTracker::new(control);
        let outcome = self
            .execute(dataset, spec, &mut tracker, start)
            .and_then(|result| tracker.enter(PipelineStage::Done).map(|()| result));
        match outcome {
            Ok(result) => {
                tracing::info!(
                    "Model builder finished: {} in {}ms",
                    result.algorithm(),
                    result.duration_ms
                );
                Ok(result)
            }
            Err(err) => {
                tracker.fail(&err);
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        dataset: &Dataset,
        spec: &FeatureSpec,
        tracker: &mut StageTracker<'_>,
        start: Instant,
    ) -> Result<PipelineResult> {
        let settings = &self.settings;

        tracker.enter(PipelineStage::Validating)?;
        let target = validate(dataset, spec, settings)?;

        let used_columns =
            std::iter::once(target).chain(spec.feature_columns.iter().map(String::as_str));
        let mut column_types = infer_types(dataset, used_columns, settings);
        match spec.task {
            Task::Regression => {
                if column_types.get(target) != Some(&ColumnType::Numeric) {
                    return Err(ValidationError::NonNumericTarget(target.to_owned()).into());
                }
            }
            Task::Classification => {
                column_types.insert(target.to_owned(), ColumnType::Categorical);
            }
            Task::Clustering => {
                return Err(ValidationError::UnsupportedTask(spec.task.as_str().to_owned()).into());
            }
        }

        tracker.enter(PipelineStage::Preprocessing)?;
        let artifacts = preprocessing::fit(
            dataset,
            &column_types,
            &spec.feature_columns,
            Some(target),
            settings,
        );
        let processed = preprocessing::transform(dataset, &artifacts);
        if processed.is_empty() {
            return Err(ValidationError::NoData.into());
        }

        tracker.enter(PipelineStage::Training)?;
        let x = feature_matrix(&processed, &artifacts.feature_matrix_columns());
        tracing::debug!("Feature matrix: {} x {}", x.nrows(), x.ncols());

        let (report, predictions, column_importance) = match spec.task {
            Task::Regression => {
                let y = regression_targets(&processed, target);
                let trained = self.train(self.regressor.as_ref(), &x, &y);

                tracker.enter(PipelineStage::Evaluating)?;
                let metrics = regression_metrics(
                    y.get(trained.scored_from..).unwrap_or_default(),
                    trained.predictions.get(trained.scored_from..).unwrap_or_default(),
                );
                let predictions = trained
                    .predictions
                    .iter()
                    .map(|p| p.map(Prediction::Number))
                    .collect();
                (
                    report_for(&trained, Metrics::Regression(metrics)),
                    predictions,
                    trained.feature_importance,
                )
            }
            Task::Classification => {
                let target_map = artifacts.target_map().unwrap_or_default();
                let y = class_labels(&processed, target_map);
                let trained = self.train(self.classifier.as_ref(), &x, &y);

                tracker.enter(PipelineStage::Evaluating)?;
                let majority = majority_label(y.iter().flatten().map(String::as_str));
                let metrics = classification_metrics(
                    y.get(trained.scored_from..).unwrap_or_default(),
                    trained.predictions.get(trained.scored_from..).unwrap_or_default(),
                    majority,
                );
                let predictions = trained
                    .predictions
                    .iter()
                    .map(|p| p.clone().map(Prediction::Label))
                    .collect();
                (
                    report_for(&trained, Metrics::Classification(metrics)),
                    predictions,
                    trained.feature_importance,
                )
            }
            Task::Clustering => {
                return Err(ValidationError::UnsupportedTask(spec.task.as_str().to_owned()).into());
            }
        };

        let feature_importance = aggregate_importance(&artifacts, &column_importance);
        let insights = generate_insights(target, &report, &feature_importance);
        let target_map = artifacts.target_map().map(<[String]>::to_vec);

        Ok(PipelineResult {
            task: spec.task,
            target_column: target.to_owned(),
            feature_columns: spec.feature_columns.clone(),
            column_types: column_types.into_iter().collect::<BTreeMap<_, _>>(),
            report,
            predictions,
            processed_data: processed,
            target_map,
            feature_importance,
            insights,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Primary learner, or the task's baseline when the learner fails.
    fn train<T: Baseline>(
        &self,
        learner: &dyn Learner<T>,
        x: &Array2<f64>,
        y: &[Option<T>],
    ) -> Trained<T> {
        match fit_primary(learner, x, y, self.settings.train_fraction) {
            Ok(trained) => trained,
            Err(err) => {
                tracing::warn!(
                    "{} failed ({err}); falling back to {}",
                    learner.algorithm(),
                    T::ALGORITHM
                );
                fit_baseline(y, &err)
            }
        }
    }
}

fn report_for<T>(trained: &Trained<T>, metrics: Metrics) -> EvaluationReport {
    EvaluationReport {
        algorithm: trained.algorithm,
        scope: trained.scope,
        metrics,
        fallback_reason: trained.fallback_reason.clone(),
    }
}

/// Runs the default pipeline once.
///
/// # Errors
///
/// See [`ModelPipeline::run`].
pub fn run_pipeline(
    dataset: &Dataset,
    spec: &FeatureSpec,
    settings: &PipelineSettings,
) -> Result<PipelineResult> {
    ModelPipeline::new(settings.clone()).run(dataset, spec)
}
