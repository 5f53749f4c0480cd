//! # tabml - a small tabular model builder
//!
//! tabml takes a parsed table, works out what each column holds, cleans and
//! encodes it, trains a decision tree on the leading 80% of rows and scores it
//! on the rest. When the tree cannot be trained the run still completes with a
//! mean or majority-class baseline, and the report names which one ran.
//!
//! ```no_run
//! use tabml::dataset::load_dataset;
//! use tabml::model_builder::{FeatureSpec, ModelPipeline, Task};
//!
//! # fn example() -> tabml::error::Result<()> {
//! let dataset = load_dataset("customers.csv".as_ref())?;
//! let spec = FeatureSpec::new(
//!     Task::Classification,
//!     Some("churned".to_owned()),
//!     vec!["age".to_owned(), "plan".to_owned()],
//! );
//! let result = ModelPipeline::default().run(&dataset, &spec)?;
//! for line in &result.insights {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`dataset`]: rows of raw cells, loaded from CSV (Polars) or JSON
//! - [`model_builder`]: inference, preprocessing, split, training, evaluation
//!   - [`model_builder::orchestrator`]: stage machine and validation
//!   - [`model_builder::job`]: background runs with progress and cancellation
//! - [`store`]: key-value hand-off of results to a viewer
//! - [`config`]: tunable pipeline settings
//! - [`error`]: error types and handling utilities
//! - [`logging`]: tracing subscriber setup
//! - [`utils`]: formatting helpers

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod model_builder;
pub mod store;
pub mod utils;
