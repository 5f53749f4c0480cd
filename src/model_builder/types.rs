use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Prefix of the one-hot columns that encode a categorical target.
pub const TARGET_PREFIX: &str = "__target__";

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub enum ColumnType {
    Numeric,
    Categorical,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "Numeric",
            Self::Categorical => "Categorical",
            Self::Date => "Date",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type ColumnTypes = HashMap<String, ColumnType>;

#[derive(Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    #[default]
    Regression,
    Classification,
    Clustering,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regression => "regression",
            Self::Classification => "classification",
            Self::Clustering => "clustering",
        }
    }

    pub fn parse_task(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "regression" => Some(Self::Regression),
            "classification" => Some(Self::Classification),
            "clustering" => Some(Self::Clustering),
            _ => None,
        }
    }

    pub fn is_supervised(&self) -> bool {
        !matches!(self, Self::Clustering)
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the wizard collected: the task, an optional target, and the features.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct FeatureSpec {
    pub task: Task,
    pub target_column: Option<String>,
    pub feature_columns: Vec<String>,
}

impl FeatureSpec {
    /// Builds a spec, dropping the target and duplicates from the feature list.
    pub fn new(task: Task, target_column: Option<String>, feature_columns: Vec<String>) -> Self {
        let mut features: Vec<String> = Vec::with_capacity(feature_columns.len());
        for name in feature_columns {
            if target_column.as_deref() == Some(name.as_str()) || features.contains(&name) {
                continue;
            }
            features.push(name);
        }
        Self {
            task,
            target_column: target_column.filter(|t| !t.is_empty()),
            feature_columns: features,
        }
    }
}

/// Fit-time statistics of one column.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "kind")]
pub enum ColumnArtifacts {
    /// Numeric and date columns: mean fill and winsorisation bounds.
    Numeric {
        fill: f64,
        lower: f64,
        upper: f64,
        /// True when the raw values are dates encoded as day ordinals.
        date: bool,
    },
    /// Categorical columns: mode fill and first-seen vocabulary.
    Categorical { fill: String, vocabulary: Vec<String> },
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FeatureArtifacts {
    pub name: String,
    pub column: ColumnArtifacts,
}

impl FeatureArtifacts {
    /// Names of the processed columns this feature expands into.
    pub fn derived_columns(&self) -> Vec<String> {
        match &self.column {
            ColumnArtifacts::Numeric { .. } => vec![self.name.clone()],
            ColumnArtifacts::Categorical { vocabulary, .. } => vocabulary
                .iter()
                .map(|v| one_hot_column(&self.name, v))
                .collect(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TargetArtifacts {
    pub name: String,
    pub column: ColumnArtifacts,
    /// Class vocabulary when the target is encoded categorically.
    pub target_map: Option<Vec<String>>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct PreprocessingArtifacts {
    pub features: Vec<FeatureArtifacts>,
    pub target: Option<TargetArtifacts>,
}

impl PreprocessingArtifacts {
    /// Derived feature columns in matrix order.
    pub fn feature_matrix_columns(&self) -> Vec<String> {
        self.features
            .iter()
            .flat_map(FeatureArtifacts::derived_columns)
            .collect()
    }

    pub fn target_map(&self) -> Option<&[String]> {
        self.target.as_ref().and_then(|t| t.target_map.as_deref())
    }
}

pub fn one_hot_column(feature: &str, value: &str) -> String {
    format!("{feature}_{value}")
}

pub fn target_column(label: &str) -> String {
    format!("{TARGET_PREFIX}{label}")
}

/// One transformed row: derived column name to numeric value.
pub type ProcessedRow = BTreeMap<String, f64>;

/// Which learner produced the reported metrics.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub enum Algorithm {
    DecisionTreeRegression,
    DecisionTreeClassifier,
    BaselineMean,
    BaselineMajority,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecisionTreeRegression => "DecisionTreeRegression",
            Self::DecisionTreeClassifier => "DecisionTreeClassifier",
            Self::BaselineMean => "BaselineMean",
            Self::BaselineMajority => "BaselineMajority",
        }
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self, Self::BaselineMean | Self::BaselineMajority)
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rows the metrics were computed over.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub enum EvaluationScope {
    /// Held-out rows only (primary learner)
    TestSegment,
    /// Every row (baseline after a learner failure)
    FullDataset,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mae: f64,
    pub mse: f64,
    pub evaluated_rows: usize,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// Axis labels of the confusion matrix, first-seen over truth then predictions.
    pub labels: Vec<String>,
    /// `confusion_matrix[i][j]`: rows with true label `i` predicted as `j`.
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Most frequent known label in the data.
    pub majority_class: Option<String>,
    pub evaluated_rows: usize,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "task", rename_all = "lowercase")]
pub enum Metrics {
    Regression(RegressionMetrics),
    Classification(ClassificationMetrics),
}

impl Metrics {
    pub fn task(&self) -> Task {
        match self {
            Self::Regression(_) => Task::Regression,
            Self::Classification(_) => Task::Classification,
        }
    }

    pub fn as_regression(&self) -> Option<&RegressionMetrics> {
        match self {
            Self::Regression(m) => Some(m),
            Self::Classification(_) => None,
        }
    }

    pub fn as_classification(&self) -> Option<&ClassificationMetrics> {
        match self {
            Self::Classification(m) => Some(m),
            Self::Regression(_) => None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct EvaluationReport {
    pub algorithm: Algorithm,
    pub scope: EvaluationScope,
    pub metrics: Metrics,
    /// Learner error that caused the switch to a baseline.
    pub fallback_reason: Option<String>,
}

/// Model output for one row.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum Prediction {
    Number(f64),
    Label(String),
}

impl Prediction {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Label(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v:.4}"),
            Self::Label(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Everything the results view needs from one run.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PipelineResult {
    pub task: Task,
    pub target_column: String,
    pub feature_columns: Vec<String>,
    pub column_types: BTreeMap<String, ColumnType>,
    pub report: EvaluationReport,
    /// One entry per processed row; `None` marks rows that were not predicted.
    pub predictions: Vec<Option<Prediction>>,
    pub processed_data: Vec<ProcessedRow>,
    pub target_map: Option<Vec<String>>,
    pub feature_importance: Vec<FeatureImportance>,
    pub insights: Vec<String>,
    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn algorithm(&self) -> Algorithm {
        self.report.algorithm
    }

    pub fn metrics(&self) -> &Metrics {
        &self.report.metrics
    }
}
