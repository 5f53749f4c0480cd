use super::{dataset_from_columns, numbers, texts};
use crate::config::PipelineSettings;
use crate::dataset::RawValue;
use crate::model_builder::preprocessing::{decode_target_label, fit, transform};
use crate::model_builder::types::{ColumnArtifacts, ColumnType, ColumnTypes};
use anyhow::Result;

fn types(entries: &[(&str, ColumnType)]) -> ColumnTypes {
    entries
        .iter()
        .map(|(name, kind)| ((*name).to_owned(), *kind))
        .collect()
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_owned()).collect()
}

#[test]
fn test_numeric_values_stay_within_bounds() -> Result<()> {
    let mut values: Vec<f64> = (0..200).map(f64::from).collect();
    values.push(10_000.0);
    values.push(-5_000.0);
    let mut raw = numbers(values);
    raw.push(RawValue::Empty);
    raw.push(RawValue::from("garbage"));

    let data = dataset_from_columns(vec![("x", raw)])?;
    let artifacts = fit(
        &data,
        &types(&[("x", ColumnType::Numeric)]),
        &names(&["x"]),
        None,
        &PipelineSettings::default(),
    );

    let Some(ColumnArtifacts::Numeric { lower, upper, .. }) =
        artifacts.features.first().map(|f| f.column.clone())
    else {
        anyhow::bail!("expected numeric artifacts");
    };
    assert!(lower < upper);

    let rows = transform(&data, &artifacts);
    assert_eq!(rows.len(), data.len());
    for row in &rows {
        let v = row["x"];
        assert!(v >= lower && v <= upper, "{v} outside [{lower}, {upper}]");
    }
    Ok(())
}

#[test]
fn test_fill_values() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("n", texts(&["1", "", "5", "oops"])),
        ("c", texts(&["red", "blue", "", "blue"])),
    ])?;
    let artifacts = fit(
        &data,
        &types(&[("n", ColumnType::Numeric), ("c", ColumnType::Categorical)]),
        &names(&["n", "c"]),
        None,
        &PipelineSettings::default(),
    );

    let n = &artifacts.features[0].column;
    assert!(matches!(n, ColumnArtifacts::Numeric { fill, .. } if *fill == 3.0));
    let c = &artifacts.features[1].column;
    assert_eq!(
        c,
        &ColumnArtifacts::Categorical {
            fill: "blue".to_owned(),
            vocabulary: names(&["red", "blue"]),
        }
    );

    let rows = transform(&data, &artifacts);
    // missing and unparseable numbers take the mean
    assert_eq!(rows[1]["n"], 3.0);
    assert_eq!(rows[3]["n"], 3.0);
    // missing categories take the mode
    assert_eq!(rows[2]["c_blue"], 1.0);
    assert_eq!(rows[2]["c_red"], 0.0);
    Ok(())
}

#[test]
fn test_one_hot_fields_sum_to_at_most_one() -> Result<()> {
    let colour = ["red", "", "green", "red", "blue", "", "green", "green"];
    let label = ["yes", "no", "", "yes", "no", "yes", "", "no"];
    let data = dataset_from_columns(vec![("colour", texts(&colour)), ("label", texts(&label))])?;
    let artifacts = fit(
        &data,
        &types(&[
            ("colour", ColumnType::Categorical),
            ("label", ColumnType::Categorical),
        ]),
        &names(&["colour"]),
        Some("label"),
        &PipelineSettings::default(),
    );
    assert_eq!(artifacts.target_map(), Some(names(&["yes", "no"]).as_slice()));

    let rows = transform(&data, &artifacts);
    for (i, row) in rows.iter().enumerate() {
        let feature_sum: f64 = row
            .iter()
            .filter(|(k, _)| k.starts_with("colour_"))
            .map(|(_, v)| v)
            .sum();
        let target_sum: f64 = row
            .iter()
            .filter(|(k, _)| k.starts_with("__target__"))
            .map(|(_, v)| v)
            .sum();

        assert!(feature_sum <= 1.0 && target_sum <= 1.0);
        if !colour[i].is_empty() {
            assert_eq!(feature_sum, 1.0, "row {i}");
        }
        if label[i].is_empty() {
            assert_eq!(target_sum, 0.0, "row {i}");
            assert_eq!(decode_target_label(row, &names(&["yes", "no"])), None);
        } else {
            assert_eq!(target_sum, 1.0, "row {i}");
            assert_eq!(
                decode_target_label(row, &names(&["yes", "no"])).as_deref(),
                Some(label[i])
            );
        }
    }
    Ok(())
}

#[test]
fn test_transform_is_idempotent() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("a", numbers([3.0, 1.0, 4.0, 1.0, 5.0, 9.0])),
        ("b", texts(&["x", "y", "", "x", "z", "y"])),
        ("t", numbers([2.0, 7.0, 1.0, 8.0, 2.0, 8.0])),
    ])?;
    let artifacts = fit(
        &data,
        &types(&[
            ("a", ColumnType::Numeric),
            ("b", ColumnType::Categorical),
            ("t", ColumnType::Numeric),
        ]),
        &names(&["a", "b"]),
        Some("t"),
        &PipelineSettings::default(),
    );
    assert_eq!(transform(&data, &artifacts), transform(&data, &artifacts));
    Ok(())
}

#[test]
fn test_numeric_target_is_not_winsorised() -> Result<()> {
    let mut target: Vec<f64> = (0..150).map(f64::from).collect();
    target.push(1.0e6);
    let data = dataset_from_columns(vec![
        ("x", numbers((0..151).map(f64::from))),
        ("y", numbers(target)),
    ])?;
    let artifacts = fit(
        &data,
        &types(&[("x", ColumnType::Numeric), ("y", ColumnType::Numeric)]),
        &names(&["x"]),
        Some("y"),
        &PipelineSettings::default(),
    );
    assert_eq!(artifacts.target_map(), None);

    let rows = transform(&data, &artifacts);
    assert_eq!(rows.last().map(|r| r["y"]), Some(1.0e6));
    assert!(rows.last().is_some_and(|r| r["x"] < 150.0));
    Ok(())
}

#[test]
fn test_entirely_missing_feature() -> Result<()> {
    let data = dataset_from_columns(vec![
        ("x", numbers([1.0, 2.0, 3.0, 4.0])),
        ("gone", vec![RawValue::Empty; 4]),
    ])?;
    let settings = PipelineSettings::default();

    let as_numeric = fit(
        &data,
        &types(&[("gone", ColumnType::Numeric)]),
        &names(&["gone"]),
        None,
        &settings,
    );
    assert_eq!(
        as_numeric.features[0].column,
        ColumnArtifacts::Numeric {
            fill: 0.0,
            lower: 0.0,
            upper: 0.0,
            date: false,
        }
    );
    assert!(transform(&data, &as_numeric).iter().all(|r| r["gone"] == 0.0));

    let as_categorical = fit(
        &data,
        &types(&[("gone", ColumnType::Categorical)]),
        &names(&["gone"]),
        None,
        &settings,
    );
    assert_eq!(
        as_categorical.features[0].column,
        ColumnArtifacts::Categorical {
            fill: String::new(),
            vocabulary: Vec::new(),
        }
    );
    assert!(as_categorical.feature_matrix_columns().is_empty());
    Ok(())
}

#[test]
fn test_dates_become_day_ordinals() -> Result<()> {
    let data = dataset_from_columns(vec![(
        "d",
        texts(&["2024-01-01", "2024-01-11", "", "01/21/2024"]),
    )])?;
    let artifacts = fit(
        &data,
        &types(&[("d", ColumnType::Date)]),
        &names(&["d"]),
        None,
        &PipelineSettings::default(),
    );
    let rows = transform(&data, &artifacts);
    assert_eq!(rows[1]["d"] - rows[0]["d"], 10.0);
    assert_eq!(rows[3]["d"] - rows[0]["d"], 20.0);
    assert_eq!(rows[2]["d"] - rows[0]["d"], 10.0, "missing date takes the mean");
    Ok(())
}
