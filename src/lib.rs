//! This crate provides tools for analyzing the activity of spiking neural networks in Rust.
//!
//! The activity of every neuron is modeled by a weightless neuron, i.e., a nearest-match classifier trained on
//! (input pattern, output) examples. The transition probabilities of these models are used to estimate the
//! integrated information (phi) of neuron subsets and to find the complexes of the network at each time step.
//!
//! # Weightless Neurons
//!
//! ```rust
//! use rusty_phi::core::neuron::WeightlessNeuron;
//!
//! // A neuron listening to neurons 1, 2 and 3, firing when neurons 1 and 2 fired
//! let mut neuron = WeightlessNeuron::new(0, &[1, 2, 3]).unwrap();
//! neuron.add_training(&[true, true, false], true).unwrap();
//! neuron.add_training(&[false, false, false], false).unwrap();
//!
//! // Tolerate one wrong input out of three
//! neuron.set_generalization(0.67).unwrap();
//! assert_eq!(neuron.generalization_threshold(), 1);
//! assert_eq!(neuron.classify(&[true, true, true], true).unwrap(), 1.0);
//!
//! // Conflicting closest examples
//! assert_eq!(neuron.classify(&[true, false, false], true).unwrap(), 0.5);
//! ```
//!
//! # Probability Tables
//!
//! ```rust
//! use rusty_phi::core::table::ProbabilityTable;
//!
//! let mut table = ProbabilityTable::new(3).unwrap();
//! assert_eq!(table.len(), 8);
//!
//! table.set("101", 0.25).unwrap();
//! assert_eq!(table.get("101").unwrap(), 0.25);
//! assert!(table.get("10").is_err());
//! ```
//!
//! # Analyzing Networks
//!
//! ```rust
//! use std::sync::mpsc::channel;
//!
//! use rusty_phi::analysis::archive::MemoryArchive;
//! use rusty_phi::analysis::event::AnalysisEvent;
//! use rusty_phi::analysis::scheduler::Scheduler;
//! use rusty_phi::analysis::store::MemoryResultStore;
//! use rusty_phi::analysis::task::{AnalysisConfig, AnalysisTask};
//!
//! let archive = MemoryArchive::rand(6, 2, 20, 0.05, 42).unwrap();
//! let store = MemoryResultStore::new();
//! let (tx, rx) = channel();
//!
//! let mut scheduler = Scheduler::new(archive, store.clone(), AnalysisConfig::default()).with_events(tx);
//! scheduler.prepare(AnalysisTask::new(1, 1, 19, 4)).unwrap();
//! scheduler.run().unwrap();
//! assert!(!scheduler.is_error());
//!
//! let num_found = rx
//!     .try_iter()
//!     .filter(|event| matches!(event, AnalysisEvent::ResultFound { .. }))
//!     .count();
//! assert_eq!(num_found, store.complexes(1).unwrap().len());
//! ```

pub mod analysis;
pub mod core;
pub mod error;
