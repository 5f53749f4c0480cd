use super::{dataset_from_columns, numbers, regression_spec, texts};
use crate::config::PipelineSettings;
use crate::error::{TabmlError, ValidationError};
use crate::model_builder::learner::{FittedModel, Learner, LearnerError};
use crate::model_builder::{
    Algorithm, EvaluationScope, FeatureSpec, ModelJob, ModelPipeline, PipelineStage, Prediction,
    RunControl, Task,
};
use anyhow::Result;
use ndarray::Array2;

struct AlwaysFails;

impl<T> Learner<T> for AlwaysFails {
    fn algorithm(&self) -> Algorithm {
        Algorithm::DecisionTreeClassifier
    }

    fn fit(
        &self,
        _x: &Array2<f64>,
        _y: &[Option<T>],
    ) -> Result<Box<dyn FittedModel<T>>, LearnerError> {
        Err(LearnerError::Backend("forced failure".to_owned()))
    }
}

fn classification_spec(target: &str, features: &[&str]) -> FeatureSpec {
    FeatureSpec::new(
        Task::Classification,
        Some(target.to_owned()),
        features.iter().map(|f| (*f).to_owned()).collect(),
    )
}

#[test]
fn test_scenario_a_primary_regression() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("x", numbers((1..=10).map(f64::from))),
        ("y", numbers((1..=10).map(|v| 2.0 * f64::from(v) + 1.0))),
    ])?;
    let control = RunControl::new();
    let result = ModelPipeline::default().run_with(&data, &regression_spec("y", &["x"]), &control)?;

    assert_eq!(control.stage(), PipelineStage::Done);
    assert_eq!(control.progress(), 100);
    assert_eq!(result.algorithm(), Algorithm::DecisionTreeRegression);
    assert_eq!(result.report.scope, EvaluationScope::TestSegment);
    assert_eq!(result.report.fallback_reason, None);

    let metrics = result.metrics().as_regression().unwrap();
    assert!(metrics.r2.is_finite() && metrics.r2 <= 1.0);
    assert_eq!(metrics.evaluated_rows, 2);

    assert_eq!(result.predictions.len(), 10);
    assert!(result.predictions[..8].iter().all(Option::is_none));
    assert!(
        result.predictions[8..]
            .iter()
            .all(|p| p.as_ref().and_then(Prediction::as_number).is_some())
    );
    assert_eq!(result.processed_data.len(), 10);
    assert_eq!(result.target_map, None);
    assert_eq!(
        result.feature_importance.first().map(|f| f.feature.as_str()),
        Some("x")
    );
    assert!(!result.insights.is_empty());
    Ok(())
}

#[test]
fn test_scenario_b_too_few_rows() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("x", numbers([1.0, 2.0, 3.0])),
        ("y", numbers([1.0, 2.0, 3.0])),
    ])?;
    let control = RunControl::new();
    let err = ModelPipeline::default()
        .run_with(&data, &regression_spec("y", &["x"]), &control)
        .unwrap_err();

    assert_eq!(err.to_string(), "not enough rows to build a model");
    assert!(matches!(
        err.as_validation(),
        Some(ValidationError::NotEnoughRows { rows: 3, .. })
    ));
    assert_eq!(control.stage(), PipelineStage::Failed);
    Ok(())
}

#[test]
fn test_scenario_c_class_vocabulary() -> Result<()> {
    let labels: Vec<&str> = (0..20).map(|i| if i % 3 == 0 { "yes" } else { "no" }).collect();
    let colours: Vec<&str> = (0..20).map(|i| if i % 2 == 0 { "red" } else { "blue" }).collect();
    let data = dataset_from_columns(vec![
        ("x", numbers((0..20).map(f64::from))),
        ("colour", texts(&colours)),
        ("label", texts(&labels)),
    ])?;
    let result =
        ModelPipeline::default().run(&data, &classification_spec("label", &["x", "colour"]))?;

    assert_eq!(result.algorithm(), Algorithm::DecisionTreeClassifier);
    assert_eq!(
        result.target_map,
        Some(vec!["yes".to_owned(), "no".to_owned()])
    );
    for p in result.predictions.iter().flatten() {
        assert!(matches!(p.as_label(), Some("yes" | "no")), "unexpected prediction {p}");
    }
    assert_eq!(result.predictions.iter().flatten().count(), 4);

    let metrics = result.metrics().as_classification().unwrap();
    assert!((0.0..=1.0).contains(&metrics.accuracy));
    assert_eq!(metrics.evaluated_rows, 4);
    assert_eq!(metrics.majority_class.as_deref(), Some("no"));

    // confusion rows add up to the per-class counts of the held-out rows
    for (i, label) in metrics.labels.iter().enumerate() {
        let expected = labels[16..].iter().filter(|l| **l == label.as_str()).count();
        assert_eq!(metrics.confusion_matrix[i].iter().sum::<usize>(), expected);
    }
    Ok(())
}

#[test]
fn test_scenario_d_entirely_missing_feature() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("x", numbers((0..8).map(f64::from))),
        ("gone", texts(&["", "", "", "", "", "", "", ""])),
        ("y", numbers((0..8).map(|v| f64::from(v) * 3.0))),
    ])?;
    let result = ModelPipeline::default().run(&data, &regression_spec("y", &["x", "gone"]))?;

    assert_eq!(result.algorithm(), Algorithm::DecisionTreeRegression);
    assert!(result.processed_data.iter().all(|row| !row.contains_key("gone")));
    assert!(result.feature_importance.iter().all(|f| f.feature != "gone" || f.importance == 0.0));
    Ok(())
}

#[test]
fn test_scenario_e_forced_failure_uses_majority() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("x", numbers([1.0; 6])),
        ("label", texts(&["yes"; 6])),
    ])?;
    let pipeline = ModelPipeline::default().with_classifier(AlwaysFails);
    let result = pipeline.run(&data, &classification_spec("label", &["x"]))?;

    assert_eq!(result.algorithm(), Algorithm::BaselineMajority);
    assert_eq!(result.report.scope, EvaluationScope::FullDataset);
    assert_eq!(
        result.report.fallback_reason.as_deref(),
        Some("learner failed: forced failure")
    );

    let metrics = result.metrics().as_classification().unwrap();
    assert_eq!(metrics.majority_class.as_deref(), Some("yes"));
    assert_eq!(metrics.evaluated_rows, 6);
    assert_eq!(metrics.accuracy, 1.0);
    assert!(
        result
            .predictions
            .iter()
            .all(|p| p.as_ref().and_then(Prediction::as_label) == Some("yes"))
    );
    assert!(result.feature_importance.is_empty());
    Ok(())
}

#[test]
fn test_mean_baseline_scores_the_full_dataset() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("x", numbers([1.0, 2.0, 3.0, 4.0])),
        ("y", numbers([1.0, 2.0, 3.0, 4.0])),
    ])?;
    let pipeline = ModelPipeline::default().with_regressor(AlwaysFails);
    let result = pipeline.run(&data, &regression_spec("y", &["x"]))?;

    assert_eq!(result.algorithm(), Algorithm::BaselineMean);
    let metrics = result.metrics().as_regression().unwrap();
    assert_eq!(metrics.evaluated_rows, 4);
    assert_eq!(metrics.r2, 0.0);
    assert_eq!(metrics.mae, 1.0);
    assert!(result.predictions.iter().all(|p| *p == Some(Prediction::Number(2.5))));
    Ok(())
}

#[test]
fn test_missing_training_target_falls_back() -> Result<()> {
    let mut y = numbers((0..10).map(f64::from));
    y[0] = crate::dataset::RawValue::Empty;
    let data = dataset_from_columns(vec![("x", numbers((0..10).map(f64::from))), ("y", y)])?;
    let result = ModelPipeline::default().run(&data, &regression_spec("y", &["x"]))?;

    assert_eq!(result.algorithm(), Algorithm::BaselineMean);
    assert_eq!(
        result.report.fallback_reason.as_deref(),
        Some("row 0 has no target value")
    );
    assert_eq!(result.metrics().as_regression().unwrap().evaluated_rows, 9);
    Ok(())
}

#[test]
fn test_numeric_labels_are_classified_as_text() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("x", numbers((0..10).map(f64::from))),
        ("flag", numbers((0..10).map(|v| if v < 5 { 1.0 } else { 0.0 }))),
    ])?;
    let result = ModelPipeline::default().run(&data, &classification_spec("flag", &["x"]))?;
    assert_eq!(result.target_map, Some(vec!["1".to_owned(), "0".to_owned()]));
    assert_eq!(
        result.column_types.get("flag"),
        Some(&crate::model_builder::ColumnType::Categorical)
    );
    Ok(())
}

#[test]
fn test_cancelled_run_produces_no_result() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("x", numbers((0..10).map(f64::from))),
        ("y", numbers((0..10).map(f64::from))),
    ])?;
    let control = RunControl::new();
    control.cancel();

    let err = ModelPipeline::default()
        .run_with(&data, &regression_spec("y", &["x"]), &control)
        .unwrap_err();
    assert!(matches!(err, TabmlError::Aborted));
    assert_eq!(err.to_string(), "operation cancelled");
    // Cancelled before Validating: Idle goes straight to Failed
    assert_eq!(control.stage(), PipelineStage::Failed);
    assert_eq!(control.progress(), 0);
    Ok(())
}

#[test]
fn test_background_job() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("x", numbers((0..12).map(f64::from))),
        ("y", numbers((0..12).map(|v| f64::from(v % 4)))),
    ])?;
    let job = ModelJob::spawn(
        ModelPipeline::new(PipelineSettings::default()),
        data,
        regression_spec("y", &["x"]),
    );
    let control = job.control().clone();
    let result = job.wait()?;

    assert_eq!(result.predictions.len(), 12);
    assert_eq!(control.stage(), PipelineStage::Done);
    assert_eq!(control.progress(), 100);
    Ok(())
}

#[test]
fn test_cancelled_job() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("x", numbers((0..12).map(f64::from))),
        ("y", numbers((0..12).map(f64::from))),
    ])?;
    let control = RunControl::new();
    control.cancel();
    let job = ModelJob::spawn_with(
        ModelPipeline::default(),
        data,
        regression_spec("y", &["x"]),
        control,
    );
    assert!(matches!(job.wait(), Err(TabmlError::Aborted)));
    Ok(())
}

#[test]
fn test_deep_regression_tree_in_background_job() -> Result<()> {
    let n = 10_000;
    let data = dataset_from_columns(vec![
        ("row", numbers((0..n).map(f64::from))),
        ("parity", numbers((0..n).map(|i| f64::from(i % 2)))),
    ])?;
    let job = ModelJob::spawn(
        ModelPipeline::default(),
        data,
        regression_spec("parity", &["row"]),
    );
    let result = job.wait()?;

    assert_eq!(result.algorithm(), Algorithm::DecisionTreeRegression);
    assert_eq!(result.predictions.len(), 10_000);
    assert!(result.predictions[..8_000].iter().all(Option::is_none));
    Ok(())
}

#[test]
fn test_deep_classification_tree_in_background_job() -> Result<()> {
    let n = 10_000;
    let labels: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "even" } else { "odd" }).collect();
    let data = dataset_from_columns(vec![
        ("row", numbers((0..n).map(f64::from))),
        ("parity", texts(&labels)),
    ])?;
    let job = ModelJob::spawn(
        ModelPipeline::default(),
        data,
        classification_spec("parity", &["row"]),
    );
    let result = job.wait()?;

    assert_eq!(result.algorithm(), Algorithm::DecisionTreeClassifier);
    assert_eq!(result.predictions.len(), 10_000);
    for label in result.predictions.iter().flatten() {
        assert!(matches!(label.as_label(), Some("even" | "odd")));
    }
    Ok(())
}
