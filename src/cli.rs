use anyhow::{Context as _, Result, anyhow};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tabml::config::{
    PipelineSettings, get_settings_path, load_settings, load_settings_from, save_settings_to,
};
use tabml::dataset::load_dataset;
use tabml::model_builder::{
    FeatureSpec, Metrics, ModelJob, ModelPipeline, PipelineResult, Task, infer_types,
    infer_types_quick,
};
use tabml::store::{JsonFileStore, load_results, save_results};
use tabml::utils::{fmt_opt, fmt_pct};

#[derive(Parser)]
#[command(name = "tabml", about = "Build and evaluate simple models on tabular data")]
pub struct Cli {
    /// Settings file; defaults to the one in the data directory
    #[arg(long, global = true, env = "TABML_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the inferred type of every column
    Infer {
        /// CSV or JSON file
        file: PathBuf,

        /// Use the quick 10-row pass instead of the full one
        #[arg(long)]
        quick: bool,
    },
    /// Train and evaluate a model
    Train {
        /// CSV or JSON file
        file: PathBuf,

        /// regression or classification
        #[arg(long, default_value = "regression")]
        task: String,

        /// Column to predict
        #[arg(long)]
        target: String,

        /// Comma-separated feature columns. Defaults to every other column.
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,

        /// Save the result in this store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the result saved in a store directory
    Show {
        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
    /// Print the active settings, or write them out with --init
    Settings {
        /// Write the active settings to the settings file
        #[arg(long)]
        init: bool,
    },
}

fn settings_for(path: Option<&Path>) -> PipelineSettings {
    path.map_or_else(load_settings, load_settings_from)
}

fn open_store(dir: Option<PathBuf>) -> JsonFileStore {
    dir.map_or_else(JsonFileStore::default_location, JsonFileStore::new)
}

pub fn run_command(cli: Cli) -> Result<()> {
    let settings_path = cli.settings.clone().unwrap_or_else(get_settings_path);
    let settings = settings_for(cli.settings.as_deref());
    match cli.command {
        Commands::Infer { file, quick } => handle_infer(&file, quick, &settings),
        Commands::Train {
            file,
            task,
            target,
            features,
            store,
            json,
        } => handle_train(&file, &task, target, features, store, json, settings),
        Commands::Show { store, json } => handle_show(store, json),
        Commands::Settings { init } => handle_settings(&settings, &settings_path, init),
    }
}

fn handle_infer(file: &Path, quick: bool, settings: &PipelineSettings) -> Result<()> {
    let dataset = load_dataset(file).context("Failed to load dataset")?;
    let types = if quick {
        infer_types_quick(&dataset, settings)
    } else {
        infer_types(&dataset, dataset.columns().iter().map(String::as_str), settings)
    };

    for column in dataset.columns() {
        if let Some(kind) = types.get(column) {
            println!("{column:<30} {kind}");
        }
    }
    Ok(())
}

fn handle_train(
    file: &Path,
    task: &str,
    target: String,
    features: Vec<String>,
    store: Option<PathBuf>,
    json: bool,
    settings: PipelineSettings,
) -> Result<()> {
    let task = Task::parse_task(task).ok_or_else(|| anyhow!("Unknown task: {task}"))?;
    let dataset = load_dataset(file).context("Failed to load dataset")?;

    let features = if features.is_empty() {
        dataset
            .columns()
            .iter()
            .filter(|c| **c != target)
            .cloned()
            .collect()
    } else {
        features
    };
    let spec = FeatureSpec::new(task, Some(target), features);

    let job = ModelJob::spawn(ModelPipeline::new(settings), dataset, spec);
    let result = job.wait()?;

    if let Some(dir) = store {
        let mut store = open_store(Some(dir));
        save_results(&mut store, &result)?;
        println!("Saved results to {}", store.dir().display());
    }

    print_result(&result, json)
}

fn handle_show(store: Option<PathBuf>, json: bool) -> Result<()> {
    let store = open_store(store);
    let stored = load_results(&store)?
        .ok_or_else(|| anyhow!("No saved results in {}", store.dir().display()))?;
    println!("Saved at {}", stored.saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
    print_result(&stored.result, json)
}

fn handle_settings(settings: &PipelineSettings, path: &Path, init: bool) -> Result<()> {
    if init {
        save_settings_to(settings, path)?;
        println!("Wrote settings to {}", path.display());
    } else {
        println!("Settings file: {}", path.display());
    }
    if let Ok(log) = tabml::logging::get_current_log_path() {
        println!("Log file:      {}", log.display());
    }
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}

fn print_result(result: &PipelineResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("Task:       {}", result.task);
    println!("Target:     {}", result.target_column);
    println!("Algorithm:  {}", result.algorithm());
    if let Some(reason) = &result.report.fallback_reason {
        println!("Fallback:   {reason}");
    }

    match result.metrics() {
        Metrics::Regression(m) => {
            println!("R²:         {}", fmt_opt(Some(m.r2)));
            println!("MAE:        {}", fmt_opt(Some(m.mae)));
            println!("MSE:        {}", fmt_opt(Some(m.mse)));
            println!("Rows:       {}", m.evaluated_rows);
        }
        Metrics::Classification(m) => {
            println!("Accuracy:   {}", fmt_pct(m.accuracy));
            println!("Rows:       {}", m.evaluated_rows);
            if let Some(majority) = &m.majority_class {
                println!("Majority:   {majority}");
            }
            println!("Confusion (rows = actual, columns = predicted):");
            println!("  {:>12} {}", "", m.labels.join(" | "));
            for (label, row) in m.labels.iter().zip(&m.confusion_matrix) {
                let cells: Vec<String> = row.iter().map(usize::to_string).collect();
                println!("  {label:>12} {}", cells.join(" | "));
            }
        }
    }

    let used: BTreeMap<&str, String> = result
        .column_types
        .iter()
        .map(|(k, v)| (k.as_str(), v.to_string()))
        .collect();
    println!("Columns:    {used:?}");

    for f in &result.feature_importance {
        println!("  {:<28} {}", f.feature, fmt_pct(f.importance));
    }
    for line in &result.insights {
        println!("- {line}");
    }
    Ok(())
}
