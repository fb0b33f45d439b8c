//! Analysis module running the search for complexes over a range of time steps.
//!
//! - [`task`]: The analysis task and its configuration
//! - [`archive`]: The network and firing history provider
//! - [`store`]: The destination of the complexes found
//! - [`event`]: The progress and result notifications
//! - [`worker`]: The analysis of a single time step
//! - [`scheduler`]: The pool of workers covering the whole range
//!
//! # Examples
//!
//! ```
//! use rusty_phi::analysis::archive::MemoryArchive;
//! use rusty_phi::analysis::scheduler::Scheduler;
//! use rusty_phi::analysis::store::MemoryResultStore;
//! use rusty_phi::analysis::task::{AnalysisConfig, AnalysisTask};
//!
//! // A random network of 5 neurons with 2 inputs each, recorded over 10 time steps
//! let archive = MemoryArchive::rand(5, 2, 10, 0.3, 42).unwrap();
//! let store = MemoryResultStore::new();
//!
//! let mut scheduler = Scheduler::new(archive, store.clone(), AnalysisConfig::default());
//! scheduler.prepare(AnalysisTask::new(1, 1, 9, 3)).unwrap();
//! scheduler.run().unwrap();
//!
//! assert!(!scheduler.is_error());
//! assert!(scheduler.is_stopped());
//! assert!(store.complexes(1).unwrap().iter().all(|complex| complex.neuron_ids.len() >= 2));
//! ```
pub mod archive;
pub mod event;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod worker;

/// The identifier of the analysis, e.g., the analyzed network or archive.
pub type EntityId = u32;
