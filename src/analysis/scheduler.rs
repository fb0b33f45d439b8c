//! The scheduler distributing the time steps of an analysis over a bounded pool of workers.
//!
//! Time steps are dispatched in increasing order, one worker thread per time step and at most `thread_count`
//! workers at the same time. When a worker is done, its slot is given to the next pending time step. The first
//! failure of a worker is fatal to the whole run: every other worker is stopped and the scheduler reports the
//! error of the failed worker.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};

use super::archive::NetworkArchive;
use super::event::{AnalysisEvent, EventEmitter};
use super::store::ResultStore;
use super::task::{AnalysisConfig, AnalysisTask};
use super::worker::{WorkerHandle, WorkerState};
use crate::core::TimeStep;
use crate::error::AnalysisError;

/// A time step in flight and the worker analyzing it.
#[derive(Debug)]
pub struct WorkerSlot {
    time_step: TimeStep,
    handle: WorkerHandle,
}

impl WorkerSlot {
    pub fn time_step(&self) -> TimeStep {
        self.time_step
    }
}

/// Requests a running scheduler to stop, from any thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Runs an analysis task over a pool of worker threads.
pub struct Scheduler<A: NetworkArchive, S: ResultStore> {
    archive: A,
    store: S,
    config: AnalysisConfig,
    events: EventEmitter,
    task: Option<AnalysisTask>,
    // One entry per thread, occupied while a time step is in flight.
    slots: Vec<Option<WorkerSlot>>,
    // The next time step to dispatch, if any.
    cursor: Option<TimeStep>,
    num_finished: usize,
    error_message: Option<String>,
    stopped: bool,
    stop_request: Arc<AtomicBool>,
    completion_tx: Sender<TimeStep>,
    completion_rx: Receiver<TimeStep>,
}

impl<A: NetworkArchive, S: ResultStore> Scheduler<A, S> {
    /// Create an idle scheduler. Each worker receives its own clone of the archive and of the store.
    pub fn new(archive: A, store: S, config: AnalysisConfig) -> Self {
        let (completion_tx, completion_rx) = channel();
        Scheduler {
            archive,
            store,
            config,
            events: EventEmitter::none(),
            task: None,
            slots: vec![],
            cursor: None,
            num_finished: 0,
            error_message: None,
            stopped: true,
            stop_request: Arc::new(AtomicBool::new(false)),
            completion_tx,
            completion_rx,
        }
    }

    /// Forward the events of the scheduler and of its workers to the provided channel.
    pub fn with_events(mut self, sender: Sender<AnalysisEvent>) -> Self {
        self.events = EventEmitter::new(sender);
        self
    }

    /// Set the task of the next run.
    /// The function returns an error if the task is invalid or if workers are still active.
    pub fn prepare(&mut self, task: AnalysisTask) -> Result<(), AnalysisError> {
        task.validate()?;
        if self.num_active() > 0 {
            return Err(AnalysisError::InvalidTask(format!(
                "{} workers are still active",
                self.num_active()
            )));
        }
        self.config.validate()?;

        // Notices of workers stopped during a previous run
        for time_step in self.completion_rx.try_iter() {
            debug!("Discarding completion notice of time step {}", time_step);
        }

        // Slots beyond the number of time steps would never be used
        let num_slots = task.thread_count.min(task.num_time_steps());
        self.slots = (0..num_slots).map(|_| None).collect();
        self.cursor = Some(task.first_time_step);
        self.num_finished = 0;
        self.error_message = None;
        self.stopped = false;
        self.stop_request.store(false, Ordering::SeqCst);
        self.task = Some(task);
        Ok(())
    }

    /// Analyze all time steps of the task and wait for the last worker to end.
    ///
    /// A failure of a worker does not make this function fail: it stops the run and is reported by `is_error`
    /// and `error_message`. The function returns an error if the scheduler is not prepared or if one of its
    /// invariants is violated, in which case every worker is stopped.
    pub fn run(&mut self) -> Result<(), AnalysisError> {
        let task = self.task.ok_or_else(|| {
            AnalysisError::InvalidTask("The scheduler has not been prepared".to_string())
        })?;
        info!(
            "Starting analysis {} of time steps {} to {} with {} threads...",
            task.entity_id, task.first_time_step, task.last_time_step, task.thread_count
        );

        let result = self.dispatch_and_wait();
        if let Err(e) = &result {
            error!("Analysis {} aborted: {}", task.entity_id, e);
            self.stop();
            return result;
        }

        match &self.error_message {
            Some(message) => error!("Analysis {} failed: {}", task.entity_id, message),
            None => info!(
                "Analysis {} done: {} time steps analyzed",
                task.entity_id, self.num_finished
            ),
        }
        Ok(())
    }

    fn dispatch_and_wait(&mut self) -> Result<(), AnalysisError> {
        while self.num_active() < self.slots.len() {
            match self.next_time_step() {
                Some(time_step) => self.dispatch(time_step)?,
                None => break,
            }
        }

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        while self.num_active() > 0 {
            if self.stop_request.load(Ordering::SeqCst) {
                info!("Stop requested, stopping {} workers", self.num_active());
                self.stop();
                break;
            }
            match self.completion_rx.recv_timeout(poll_interval) {
                Ok(time_step) => self.on_worker_finished(time_step)?,
                Err(RecvTimeoutError::Timeout) => continue,
                // The scheduler holds a sender, this cannot happen
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if self.num_active() == 0 {
            self.stopped = true;
        }
        Ok(())
    }

    /// Handle the end of the worker analyzing the time step.
    ///
    /// If the worker failed, its error becomes the error of the scheduler and all other workers are stopped.
    /// Otherwise, its slot is given to the next time step, if any.
    pub fn on_worker_finished(&mut self, time_step: TimeStep) -> Result<(), AnalysisError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(slot) if slot.time_step == time_step))
            .and_then(Option::take)
            .ok_or(AnalysisError::UnknownWorker(time_step))?;

        let report = slot.handle.join();
        self.num_finished += 1;
        debug!(
            "Worker of time step {} finished in state {:?}",
            time_step, report.state
        );

        if report.state == WorkerState::Failed {
            let message = report
                .error_message
                .unwrap_or_else(|| format!("Analysis of time step {} failed", time_step));
            error!(
                "Worker of time step {} failed, stopping all workers: {}",
                time_step, message
            );
            self.error_message = Some(message);
            self.stop();
            return Ok(());
        }

        if let Some(task) = self.task {
            self.events.progress(
                format!("Time step {} analyzed", time_step),
                time_step,
                self.num_finished,
                task.num_time_steps(),
            );
        }

        match self.next_time_step() {
            Some(next_time_step) => self.dispatch(next_time_step)?,
            None => {
                if self.num_active() == 0 {
                    self.stopped = true;
                }
            }
        }
        Ok(())
    }

    /// Start a worker for the time step in a free slot.
    fn dispatch(&mut self, time_step: TimeStep) -> Result<(), AnalysisError> {
        let task = self.task.ok_or_else(|| {
            AnalysisError::InvalidTask("The scheduler has not been prepared".to_string())
        })?;
        if self
            .slots
            .iter()
            .flatten()
            .any(|slot| slot.time_step == time_step)
        {
            return Err(AnalysisError::DuplicateTimeStep(time_step));
        }
        let num_slots = self.slots.len();
        let free_slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(AnalysisError::PoolExhausted(num_slots))?;

        let handle = WorkerHandle::spawn(
            task,
            time_step,
            self.config.clone(),
            self.archive.clone(),
            self.store.clone(),
            self.events.clone(),
            self.completion_tx.clone(),
        )?;
        *free_slot = Some(WorkerSlot { time_step, handle });
        debug!("Time step {} dispatched", time_step);
        Ok(())
    }

    /// Returns the next time step to dispatch and advances the cursor.
    fn next_time_step(&mut self) -> Option<TimeStep> {
        let time_step = self.cursor?;
        let last_time_step = self.task?.last_time_step;
        self.cursor = if time_step < last_time_step {
            Some(time_step + 1)
        } else {
            None
        };
        Some(time_step)
    }

    /// Stop every active worker and wait for them to end.
    /// The remaining time steps are not analyzed. Calling this function again has no effect.
    pub fn stop(&mut self) {
        self.cursor = None;
        let active: Vec<WorkerSlot> = self.slots.iter_mut().filter_map(Option::take).collect();
        active.iter().for_each(|slot| slot.handle.stop());
        for slot in active {
            let report = slot.handle.join();
            debug!(
                "Worker of time step {} stopped in state {:?}",
                slot.time_step, report.state
            );
        }
        self.stopped = true;
    }

    /// A handle to request this scheduler to stop while it runs.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop_request),
        }
    }

    /// Returns the number of workers in flight.
    pub fn num_active(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Returns the time steps in flight.
    pub fn active_time_steps(&self) -> Vec<TimeStep> {
        self.slots.iter().flatten().map(WorkerSlot::time_step).collect()
    }

    pub fn task(&self) -> Option<&AnalysisTask> {
        self.task.as_ref()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

impl<A: NetworkArchive, S: ResultStore> Drop for Scheduler<A, S> {
    fn drop(&mut self) {
        self.stop();
    }
}
