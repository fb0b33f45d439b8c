//! The analysis task and its configuration.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::ops::RangeInclusive;
use std::path::Path;

use derivative::Derivative;
use serde::{Deserialize, Serialize};

use super::EntityId;
use crate::core::{TimeStep, MAX_PATTERN_LENGTH};
use crate::error::AnalysisError;

/// The range of time steps to analyze and the number of time steps analyzed concurrently.
/// A task does not change during a run.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct AnalysisTask {
    /// The ID of the analysis (must be non-zero).
    pub entity_id: EntityId,
    /// The first time step to analyze.
    pub first_time_step: TimeStep,
    /// The last time step to analyze (inclusive).
    pub last_time_step: TimeStep,
    /// The maximum number of workers running at the same time.
    pub thread_count: usize,
}

impl AnalysisTask {
    pub fn new(
        entity_id: EntityId,
        first_time_step: TimeStep,
        last_time_step: TimeStep,
        thread_count: usize,
    ) -> Self {
        AnalysisTask {
            entity_id,
            first_time_step,
            last_time_step,
            thread_count,
        }
    }

    /// Returns an error if the task is not runnable.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.entity_id == 0 {
            return Err(AnalysisError::InvalidTask(
                "Entity ID must be non-zero".to_string(),
            ));
        }
        if self.first_time_step > self.last_time_step {
            return Err(AnalysisError::InvalidTask(format!(
                "First time step {} is after last time step {}",
                self.first_time_step, self.last_time_step
            )));
        }
        if self.thread_count == 0 {
            return Err(AnalysisError::InvalidTask(
                "At least one thread is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The time steps of the task, in increasing order.
    pub fn time_steps(&self) -> RangeInclusive<TimeStep> {
        self.first_time_step..=self.last_time_step
    }

    /// The number of time steps of the task.
    pub fn num_time_steps(&self) -> usize {
        (self.last_time_step.saturating_sub(self.first_time_step) as usize).saturating_add(1)
    }
}

/// The parameters of the search for complexes.
#[derive(Derivative, Debug, PartialEq, Clone, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct AnalysisConfig {
    /// The generalization of the weightless neurons, in [0, 1].
    #[derivative(Default(value = "1.0"))]
    pub generalization: f64,
    /// The size of the largest neuron subsets to evaluate.
    #[derivative(Default(value = "4"))]
    pub max_subset_size: usize,
    /// The phi value a subset must exceed to qualify as a complex.
    pub min_phi: f64,
    /// The pause of a worker after each subset, per bipartition of the subset (in milliseconds).
    pub unit_pause_ms: u64,
    /// The maximum wait of the scheduler between two checks of its stop request (in milliseconds).
    #[derivative(Default(value = "10"))]
    pub poll_interval_ms: u64,
}

impl AnalysisConfig {
    /// Returns an error for out of range parameters.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(0.0..=1.0).contains(&self.generalization) {
            return Err(AnalysisError::InvalidParameter(format!(
                "Generalization must be in [0, 1], found {}",
                self.generalization
            )));
        }
        if self.max_subset_size < 2 || self.max_subset_size > MAX_PATTERN_LENGTH {
            return Err(AnalysisError::InvalidParameter(format!(
                "Maximum subset size must be in [2, {}], found {}",
                MAX_PATTERN_LENGTH, self.max_subset_size
            )));
        }
        if !self.min_phi.is_finite() || self.min_phi < 0.0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "Minimum phi must be finite and non-negative, found {}",
                self.min_phi
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(AnalysisError::InvalidParameter(
                "Poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Save the configuration to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), AnalysisError> {
        let file = File::create(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| AnalysisError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| AnalysisError::IOError(e.to_string()))
    }

    /// Load a configuration from a file. Missing parameters take their default value.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let file = File::open(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        let config: AnalysisConfig =
            serde_json::from_reader(reader).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
