//! Background execution of one pipeline run.
//!
//! The run happens on its own thread and owns its dataset, spec and learners;
//! the result comes back over a channel. Two jobs never share state.

use super::orchestrator::{ModelPipeline, PipelineStage, RunControl};
use super::types::{FeatureSpec, PipelineResult};
use crate::dataset::Dataset;
use crate::error::{Result, TabmlError};
use crossbeam_channel::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

pub struct ModelJob {
    control: RunControl,
    receiver: Receiver<Result<PipelineResult>>,
    start_time: Instant,
}

impl ModelJob {
    pub fn spawn(pipeline: ModelPipeline, dataset: Dataset, spec: FeatureSpec) -> Self {
        Self::spawn_with(pipeline, dataset, spec, RunControl::new())
    }

    /// Spawns with a caller-provided control handle.
    pub fn spawn_with(
        pipeline: ModelPipeline,
        dataset: Dataset,
        spec: FeatureSpec,
        control: RunControl,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker_control = control.clone();

        std::thread::spawn(move || {
            let result = pipeline.run_with(&dataset, &spec, &worker_control);
            if tx.send(result).is_err() {
                tracing::debug!("Model job result dropped: receiver gone");
            }
        });

        Self {
            control,
            receiver: rx,
            start_time: Instant::now(),
        }
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    pub fn progress(&self) -> u64 {
        self.control.progress()
    }

    pub fn stage(&self) -> PipelineStage {
        self.control.stage()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// The result if the run has finished, without blocking.
    pub fn try_result(&self) -> Option<Result<PipelineResult>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_gone())),
        }
    }

    /// Blocks until the run finishes.
    ///
    /// # Errors
    ///
    /// Returns the run's own error, or an error if the worker thread died
    /// without reporting.
    pub fn wait(self) -> Result<PipelineResult> {
        self.receiver.recv().unwrap_or_else(|_| Err(worker_gone()))
    }
}

fn worker_gone() -> TabmlError {
    TabmlError::Other("model job ended without a result".to_owned())
}
