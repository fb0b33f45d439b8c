//! Error module for the Rusty Phi library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq, Clone)]
pub enum AnalysisError {
    /// Error for an invalid analysis task, e.g., a zero entity ID or an empty time step range.
    InvalidTask(String),
    /// Error for dispatching a time step which is already being analyzed.
    DuplicateTimeStep(u32),
    /// Error for a completion notice of a worker which is not registered by the scheduler.
    UnknownWorker(u32),
    /// Error for dispatching a worker while every slot of the pool is occupied.
    PoolExhausted(usize),
    /// Error for patterns whose length does not match the expected one.
    DimensionMismatch { expected: usize, found: usize },
    /// Error for out of range access to a probability table.
    KeyNotFound(String),
    /// Error for complexes with less than two neurons.
    InvalidComplex(usize),
    /// Error while writing results.
    PersistenceError(String),
    /// Error for invalid parameters.
    InvalidParameter(String),
    /// Error for invalid operation, e.g., running a worker twice.
    InvalidOperation(String),
    /// Error for out of bounds access, e.g., neuron or time step not found.
    OutOfBounds(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalysisError::InvalidTask(e) => write!(f, "Invalid analysis task: {}", e),
            AnalysisError::DuplicateTimeStep(t) => {
                write!(f, "Time step {} is already being analyzed", t)
            }
            AnalysisError::UnknownWorker(t) => {
                write!(f, "No active worker is registered for time step {}", t)
            }
            AnalysisError::PoolExhausted(n) => write!(f, "All {} worker slots are occupied", n),
            AnalysisError::DimensionMismatch { expected, found } => write!(
                f,
                "Dimension mismatch: expected {} values, found {}",
                expected, found
            ),
            AnalysisError::KeyNotFound(key) => {
                write!(f, "Key '{}' not found in the probability table", key)
            }
            AnalysisError::InvalidComplex(size) => write!(
                f,
                "Invalid complex: at least 2 neurons are required, found {}",
                size
            ),
            AnalysisError::PersistenceError(e) => write!(f, "Persistence error: {}", e),
            AnalysisError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            AnalysisError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
            AnalysisError::OutOfBounds(e) => write!(f, "Index out of bounds: {}", e),
            AnalysisError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for AnalysisError {}
