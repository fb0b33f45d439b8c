//! The analysis of a single time step.
//!
//! A worker builds the weightless model of every neuron of the archive, evaluates phi for every neuron subset up
//! to the configured size and stores the complexes among them. A worker goes through the following states:
//! `Idle -> Running -> {Completed | Failed | Cancelled}`.
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::archive::NetworkArchive;
use super::event::{AnalysisEvent, EventEmitter};
use super::store::{Complex, ResultStore};
use super::task::{AnalysisConfig, AnalysisTask};
use crate::core::neuron::WeightlessNeuron;
use crate::core::pattern::Selections;
use crate::core::phi::{find_complexes, PhiCalculator, SubsetPhi};
use crate::core::{NeuronId, TimeStep};
use crate::error::AnalysisError;

/// The lifecycle of a worker.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum WorkerState {
    /// Created, possibly prepared, not started yet.
    Idle,
    /// Analyzing its time step.
    Running,
    /// Done with its time step.
    Completed,
    /// Stopped early on an error.
    Failed,
    /// Stopped early on request.
    Cancelled,
}

impl WorkerState {
    /// Returns true if the worker will not change state anymore.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerState::Completed | WorkerState::Failed | WorkerState::Cancelled
        )
    }
}

/// Searches complexes at one time step.
#[derive(Debug)]
pub struct Worker {
    config: AnalysisConfig,
    context: Option<(AnalysisTask, TimeStep)>,
    state: WorkerState,
    stop_flag: Arc<AtomicBool>,
    error_message: Option<String>,
}

impl Worker {
    /// Create an idle worker.
    pub fn new(config: AnalysisConfig) -> Self {
        Worker {
            config,
            context: None,
            state: WorkerState::Idle,
            stop_flag: Arc::new(AtomicBool::new(false)),
            error_message: None,
        }
    }

    /// Set the time step to analyze. Only valid for an idle worker.
    pub fn prepare(&mut self, task: AnalysisTask, time_step: TimeStep) -> Result<(), AnalysisError> {
        if self.state != WorkerState::Idle {
            return Err(AnalysisError::InvalidOperation(format!(
                "Cannot prepare a worker in state {:?}",
                self.state
            )));
        }
        self.context = Some((task, time_step));
        Ok(())
    }

    /// Analyze the time step and returns the final state of the worker.
    ///
    /// Errors raised during the analysis are recorded and turn the worker into the `Failed` state.
    /// The function only returns an error if the worker is not prepared or has already been run.
    pub fn run<A: NetworkArchive, S: ResultStore>(
        &mut self,
        archive: &A,
        store: &mut S,
        events: &EventEmitter,
    ) -> Result<WorkerState, AnalysisError> {
        let (task, time_step) = match (self.state, self.context) {
            (WorkerState::Idle, Some(context)) => context,
            (WorkerState::Idle, None) => {
                return Err(AnalysisError::InvalidOperation(
                    "Worker has not been prepared".to_string(),
                ))
            }
            (state, _) => {
                return Err(AnalysisError::InvalidOperation(format!(
                    "Cannot run a worker in state {:?}",
                    state
                )))
            }
        };

        self.state = WorkerState::Running;
        events.emit(AnalysisEvent::WorkerStarted { time_step });
        info!("Analyzing time step {}...", time_step);

        self.state = match self.analyze(&task, time_step, archive, store, events) {
            Ok(true) => {
                info!("Time step {} successfully analyzed", time_step);
                WorkerState::Completed
            }
            Ok(false) => {
                warn!("Analysis of time step {} cancelled", time_step);
                WorkerState::Cancelled
            }
            Err(e) => {
                error!("Analysis of time step {} failed: {}", time_step, e);
                self.error_message = Some(e.to_string());
                WorkerState::Failed
            }
        };

        events.emit(AnalysisEvent::WorkerFinished {
            time_step,
            state: self.state,
        });
        Ok(self.state)
    }

    /// Request the worker to stop after the current unit of work.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// The flag shared with the handles able to stop the worker.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// The time step of the worker, if prepared.
    pub fn time_step(&self) -> Option<TimeStep> {
        self.context.map(|(_, time_step)| time_step)
    }

    pub fn is_error(&self) -> bool {
        self.state == WorkerState::Failed
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns true if the analysis is done and false if it was cancelled.
    fn analyze<A: NetworkArchive, S: ResultStore>(
        &self,
        task: &AnalysisTask,
        time_step: TimeStep,
        archive: &A,
        store: &mut S,
        events: &EventEmitter,
    ) -> Result<bool, AnalysisError> {
        let firing_pattern = archive.firing_pattern(time_step)?;
        let neuron_ids: Vec<NeuronId> = archive.neuron_ids()?.into_iter().sorted().dedup().collect();

        let mut neurons: HashMap<NeuronId, WeightlessNeuron> = HashMap::with_capacity(neuron_ids.len());
        for &neuron_id in neuron_ids.iter() {
            let mut neuron = WeightlessNeuron::new(neuron_id, &archive.connections(neuron_id)?)?;
            neuron.set_generalization(self.config.generalization)?;
            for example in archive.training_examples(neuron_id)?.iter() {
                neuron.add_training_example(example)?;
            }
            neurons.insert(neuron_id, neuron);
        }
        debug!(
            "Time step {}: {} neurons loaded, {} firing",
            time_step,
            neurons.len(),
            firing_pattern.len()
        );

        let max_size = self.config.max_subset_size.min(neuron_ids.len());
        let subsets: Vec<Vec<NeuronId>> = (2..=max_size)
            .flat_map(|size| Selections::new(neuron_ids.len(), size))
            .map(|selection| {
                neuron_ids
                    .iter()
                    .zip(selection.iter())
                    .filter(|&(_, &selected)| selected)
                    .map(|(&neuron_id, _)| neuron_id)
                    .collect()
            })
            .collect();

        let total_units = subsets.len();
        let calculator = PhiCalculator::new(&neurons, &firing_pattern);
        let mut subset_phis: Vec<SubsetPhi> = Vec::with_capacity(total_units);
        for (i, subset) in subsets.into_iter().enumerate() {
            if self.is_stop_requested() {
                return Ok(false);
            }

            let phi = calculator.phi(&subset)?;
            let pause = unit_pause(self.config.unit_pause_ms, subset.len());
            subset_phis.push(SubsetPhi {
                neuron_ids: subset,
                phi,
            });
            events.progress(
                format!("Evaluating subsets of time step {}", time_step),
                time_step,
                i + 1,
                total_units,
            );

            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }

        for complex in find_complexes(&subset_phis, self.config.min_phi) {
            if self.is_stop_requested() {
                return Ok(false);
            }
            store.add_complex(task.entity_id, time_step, complex.phi, &complex.neuron_ids)?;
            debug!(
                "Time step {}: complex [{}] with phi {}",
                time_step,
                complex.neuron_ids.iter().join(", "),
                complex.phi
            );
            events.emit(AnalysisEvent::ResultFound {
                complex: Complex::build(time_step, complex.phi, &complex.neuron_ids)?,
            });
        }

        Ok(true)
    }
}

/// The pause after evaluating a subset, proportional to its number of bipartitions.
fn unit_pause(pause_ms: u64, subset_size: usize) -> Duration {
    let num_bipartitions = (1u64 << subset_size.saturating_sub(1).min(63)) - 1;
    Duration::from_millis(pause_ms.saturating_mul(num_bipartitions))
}

/// The outcome of a worker thread.
#[derive(Debug, PartialEq, Clone)]
pub struct WorkerReport {
    pub time_step: TimeStep,
    pub state: WorkerState,
    pub error_message: Option<String>,
}

/// A worker running in its own thread.
#[derive(Debug)]
pub struct WorkerHandle {
    time_step: TimeStep,
    stop_flag: Arc<AtomicBool>,
    join_handle: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    /// Analyze the time step in a new thread.
    /// The time step is sent to `completion` once the worker is done, whatever its final state.
    pub fn spawn<A: NetworkArchive, S: ResultStore>(
        task: AnalysisTask,
        time_step: TimeStep,
        config: AnalysisConfig,
        archive: A,
        mut store: S,
        events: EventEmitter,
        completion: Sender<TimeStep>,
    ) -> Result<Self, AnalysisError> {
        let mut worker = Worker::new(config);
        worker.prepare(task, time_step)?;
        let stop_flag = worker.stop_flag();

        let join_handle = thread::Builder::new()
            .name(format!("phi-worker-{}", time_step))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    worker.run(&archive, &mut store, &events)
                }));
                let report = match outcome {
                    Ok(Ok(state)) => WorkerReport {
                        time_step,
                        state,
                        error_message: worker.error_message().map(str::to_string),
                    },
                    Ok(Err(e)) => WorkerReport {
                        time_step,
                        state: WorkerState::Failed,
                        error_message: Some(e.to_string()),
                    },
                    Err(_) => {
                        events.emit(AnalysisEvent::WorkerFinished {
                            time_step,
                            state: WorkerState::Failed,
                        });
                        WorkerReport {
                            time_step,
                            state: WorkerState::Failed,
                            error_message: Some(format!(
                                "Worker of time step {} panicked",
                                time_step
                            )),
                        }
                    }
                };
                let _ = completion.send(time_step);
                report
            })
            .map_err(|e| AnalysisError::IOError(e.to_string()))?;

        Ok(WorkerHandle {
            time_step,
            stop_flag,
            join_handle,
        })
    }

    pub fn time_step(&self) -> TimeStep {
        self.time_step
    }

    /// Request the worker to stop. Does not wait for the thread to end.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Wait for the worker thread to end.
    pub fn join(self) -> WorkerReport {
        self.join_handle.join().unwrap_or_else(|_| WorkerReport {
            time_step: self.time_step,
            state: WorkerState::Failed,
            error_message: Some(format!("Worker of time step {} panicked", self.time_step)),
        })
    }
}
