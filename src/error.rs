//! Centralized error handling for tabml.
//!
//! Two families of failure exist in the model-builder pipeline:
//!
//! - [`ValidationError`]: a precondition was not met (no data, no target, too few
//!   rows). These stop the run before any computation and are the only errors a
//!   user ever sees as a message.
//! - Learner failures, which are *not* represented here. They are recovered inside
//!   the trainer by switching to a baseline and only show up in the
//!   `EvaluationReport` (see [`crate::model_builder::learner::LearnerError`]).
//!
//! Everything else (I/O, parsing, configuration, cancellation) is a [`TabmlError`].
//!
//! ```
//! use tabml::error::{TabmlError, ValidationError};
//!
//! let err = TabmlError::from(ValidationError::NotEnoughRows { rows: 3, required: 4 });
//! assert_eq!(err.to_string(), "not enough rows to build a model");
//! ```

use std::fmt;

/// Precondition violations reported to the caller before training.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The processed dataset is empty.
    NoData,

    /// Supervised task without a target, or an empty feature list.
    MissingTargetOrFeatures,

    /// Fewer rows than the minimum size gate.
    NotEnoughRows { rows: usize, required: usize },

    /// The task has no trainer (clustering).
    UnsupportedTask(String),

    /// A column named in the feature spec does not exist in the dataset.
    UnknownColumn(String),

    /// Regression was requested on a target that does not infer as numeric.
    NonNumericTarget(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "no data available"),
            Self::MissingTargetOrFeatures => write!(f, "target or features not selected"),
            Self::NotEnoughRows { .. } => write!(f, "not enough rows to build a model"),
            Self::UnsupportedTask(task) => write!(f, "model type not supported: {task}"),
            Self::UnknownColumn(name) => write!(f, "unknown column '{name}'"),
            Self::NonNumericTarget(name) => {
                write!(f, "regression target must be numeric ('{name}' is not)")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Main error type for tabml operations.
#[derive(Debug)]
pub enum TabmlError {
    /// Pipeline precondition failures
    Validation(ValidationError),

    /// Malformed dataset (inconsistent rows, unreadable file contents)
    InvalidDataset(String),

    /// I/O errors
    Io(std::io::Error),

    /// Polars ingestion errors
    DataProcessing(String),

    /// Settings and result-store (de)serialisation errors
    Config(String),

    /// Run cancelled through its control handle
    Aborted,

    /// Generic error with context
    Other(String),
}

impl TabmlError {
    /// The validation failure, if this error is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for TabmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(v) => write!(f, "{v}"),
            Self::InvalidDataset(msg) => write!(f, "Invalid dataset: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Aborted => write!(f, "operation cancelled"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for TabmlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(v) => Some(v),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for TabmlError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<std::io::Error> for TabmlError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for TabmlError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_json::Error> for TabmlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for TabmlError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

/// Result type alias for tabml operations.
pub type Result<T> = std::result::Result<T, TabmlError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<TabmlError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: TabmlError = e.into();
            TabmlError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: TabmlError = e.into();
            TabmlError::Other(format!("{}: {}", f(), err))
        })
    }
}
