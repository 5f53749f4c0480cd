//! The model builder: type inference, preprocessing, an ordered split, a
//! decision tree with a baseline fallback, and evaluation.
//!
//! ```no_run
//! use tabml::dataset::load_dataset;
//! use tabml::model_builder::{FeatureSpec, ModelPipeline, Task};
//!
//! # fn example() -> tabml::error::Result<()> {
//! let dataset = load_dataset("houses.csv".as_ref())?;
//! let spec = FeatureSpec::new(
//!     Task::Regression,
//!     Some("price".to_owned()),
//!     vec!["area".to_owned(), "district".to_owned()],
//! );
//! let result = ModelPipeline::default().run(&dataset, &spec)?;
//! println!("{} -> {:?}", result.algorithm(), result.metrics());
//! # Ok(())
//! # }
//! ```

pub mod evaluation;
pub mod inference;
pub mod interpretation;
pub mod job;
pub mod learner;
pub mod orchestrator;
pub mod preprocessing;
pub mod split;
pub mod trainer;
pub mod tree;
pub mod types;

pub use inference::{infer_type, infer_type_quick, infer_types, infer_types_quick};
pub use job::ModelJob;
pub use learner::{FittedModel, Learner, LearnerError, TreeClassifier, TreeRegressor};
pub use orchestrator::{ModelPipeline, PipelineStage, RunControl, run_pipeline, validate};
pub use types::{
    Algorithm, ClassificationMetrics, ColumnType, ColumnTypes, EvaluationReport, EvaluationScope,
    FeatureImportance, FeatureSpec, Metrics, PipelineResult, Prediction, PreprocessingArtifacts,
    ProcessedRow, RegressionMetrics, Task,
};
