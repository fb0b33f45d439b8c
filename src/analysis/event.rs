//! Progress and result notifications of the analysis.
use std::sync::mpsc::Sender;

use super::store::Complex;
use super::worker::WorkerState;
use crate::core::TimeStep;

/// An event emitted by a worker or by the scheduler.
/// The events of a time step are emitted before its `WorkerFinished` event.
#[derive(Debug, PartialEq, Clone)]
pub enum AnalysisEvent {
    /// Some units of work are done.
    Progress {
        message: String,
        time_step: TimeStep,
        units_completed: usize,
        total_units: usize,
    },
    /// A complex has been found and stored.
    ResultFound { complex: Complex },
    /// A worker starts analyzing a time step.
    WorkerStarted { time_step: TimeStep },
    /// A worker is done with a time step, in its final state.
    WorkerFinished {
        time_step: TimeStep,
        state: WorkerState,
    },
}

/// Sends events to an optional observer.
/// Events are dropped if there is no observer or if it is gone.
#[derive(Debug, Clone, Default)]
pub struct EventEmitter {
    sender: Option<Sender<AnalysisEvent>>,
}

impl EventEmitter {
    pub fn new(sender: Sender<AnalysisEvent>) -> Self {
        EventEmitter {
            sender: Some(sender),
        }
    }

    /// An emitter without observer.
    pub fn none() -> Self {
        EventEmitter { sender: None }
    }

    pub fn emit(&self, event: AnalysisEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn progress(&self, message: String, time_step: TimeStep, units_completed: usize, total_units: usize) {
        self.emit(AnalysisEvent::Progress {
            message,
            time_step,
            units_completed,
            total_units,
        });
    }
}
