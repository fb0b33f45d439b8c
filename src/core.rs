//! Core module defining the numeric building blocks of the Rusty Phi library.
//!
//! It consists of the following components:
//!
//! - [`pattern`]: Enumerates binary patterns by number of set bits
//! - [`table`]: Holds one probability per binary pattern of a fixed length
//! - [`neuron`]: Implements the weightless (nearest-match) neuron model
//! - [`phi`]: Estimates the integrated information of a neuron subset
//!
//! # Examples
//!
//! ```
//! use rusty_phi::core::neuron::WeightlessNeuron;
//!
//! // A neuron listening to neurons 3 and 7
//! let mut neuron = WeightlessNeuron::new(0, &[3, 7]).unwrap();
//! neuron.add_training(&[true, false], true).unwrap();
//!
//! // Exact match
//! assert_eq!(neuron.classify(&[true, false], true).unwrap(), 1.0);
//!
//! // Neuron 7 is unknown: one completion matches, the other one is too far from the training data
//! assert_eq!(neuron.transition_probability(&[3], &[true], true).unwrap(), 0.75);
//! ```
pub mod neuron;
pub mod pattern;
pub mod phi;
pub mod table;

/// The identifier of a neuron in the analyzed network.
pub type NeuronId = u32;
/// The identifier of a time step of the network archive.
pub type TimeStep = u32;

/// The maximum length of the patterns enumerated exhaustively.
pub const MAX_PATTERN_LENGTH: usize = 24;
/// Minimum number of bipartitions to consider parallel processing.
pub const MIN_PARALLEL_PARTITIONS: usize = 16;
