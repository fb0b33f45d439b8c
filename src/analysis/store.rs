//! The destination of the complexes found by the analysis.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::EntityId;
use crate::core::{NeuronId, TimeStep};
use crate::error::AnalysisError;

/// A neuron subset integrating information at a given time step.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Complex {
    /// The analyzed time step.
    pub time_step: TimeStep,
    /// The phi value of the subset.
    pub phi: f64,
    /// The sorted IDs of the neurons of the complex (at least 2).
    pub neuron_ids: Vec<NeuronId>,
}

impl Complex {
    /// Create a complex. The function returns an error if it holds less than 2 neurons.
    pub fn build(time_step: TimeStep, phi: f64, neuron_ids: &[NeuronId]) -> Result<Self, AnalysisError> {
        if neuron_ids.len() < 2 {
            return Err(AnalysisError::InvalidComplex(neuron_ids.len()));
        }
        let mut neuron_ids = neuron_ids.to_vec();
        neuron_ids.sort_unstable();
        Ok(Complex {
            time_step,
            phi,
            neuron_ids,
        })
    }
}

/// A handle to the storage of complexes.
/// Each worker owns its own handle.
pub trait ResultStore: Clone + Send + 'static {
    /// Store a complex of the analysis.
    /// Returns `InvalidComplex` if the complex has less than 2 neurons or `PersistenceError` if it cannot be written.
    fn add_complex(
        &mut self,
        entity_id: EntityId,
        time_step: TimeStep,
        phi: f64,
        neuron_ids: &[NeuronId],
    ) -> Result<(), AnalysisError>;
}

/// An in-memory result store. All clones write to the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryResultStore {
    complexes: Arc<Mutex<BTreeMap<EntityId, Vec<Complex>>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        MemoryResultStore::default()
    }

    /// Returns the complexes of the analysis, sorted by time step and decreasing phi.
    pub fn complexes(&self, entity_id: EntityId) -> Result<Vec<Complex>, AnalysisError> {
        let storage = self.lock()?;
        let mut complexes = storage.get(&entity_id).cloned().unwrap_or_default();
        complexes.sort_by(|a, b| {
            a.time_step
                .cmp(&b.time_step)
                .then_with(|| b.phi.total_cmp(&a.phi))
        });
        Ok(complexes)
    }

    /// Returns the total number of complexes, over all analyses.
    pub fn num_complexes(&self) -> Result<usize, AnalysisError> {
        Ok(self.lock()?.values().map(|complexes| complexes.len()).sum())
    }

    /// Save the complexes of all analyses to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), AnalysisError> {
        let storage = self.lock()?;
        let file = File::create(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &*storage)
            .map_err(|e| AnalysisError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| AnalysisError::IOError(e.to_string()))
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<EntityId, Vec<Complex>>>, AnalysisError> {
        self.complexes
            .lock()
            .map_err(|e| AnalysisError::PersistenceError(e.to_string()))
    }
}

impl ResultStore for MemoryResultStore {
    fn add_complex(
        &mut self,
        entity_id: EntityId,
        time_step: TimeStep,
        phi: f64,
        neuron_ids: &[NeuronId],
    ) -> Result<(), AnalysisError> {
        let complex = Complex::build(time_step, phi, neuron_ids)?;
        self.lock()?.entry(entity_id).or_default().push(complex);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complex_build() {
        let complex = Complex::build(3, 0.5, &[7, 2, 5]).unwrap();
        assert_eq!(complex.neuron_ids, vec![2, 5, 7]);
        assert_eq!(Complex::build(3, 0.5, &[7]), Err(AnalysisError::InvalidComplex(1)));
        assert_eq!(Complex::build(3, 0.5, &[]), Err(AnalysisError::InvalidComplex(0)));
    }

    #[test]
    fn test_store_add_complex() {
        let store = MemoryResultStore::new();
        let mut handle_1 = store.clone();
        let mut handle_2 = store.clone();

        handle_1.add_complex(1, 4, 0.5, &[1, 2]).unwrap();
        handle_2.add_complex(1, 2, 0.25, &[3, 1]).unwrap();
        handle_2.add_complex(1, 4, 1.5, &[1, 2, 3]).unwrap();
        handle_1.add_complex(2, 4, 1.0, &[5, 6]).unwrap();
        assert_eq!(
            handle_1.add_complex(1, 4, 1.0, &[5]),
            Err(AnalysisError::InvalidComplex(1))
        );

        assert_eq!(
            store.complexes(1).unwrap(),
            vec![
                Complex { time_step: 2, phi: 0.25, neuron_ids: vec![1, 3] },
                Complex { time_step: 4, phi: 1.5, neuron_ids: vec![1, 2, 3] },
                Complex { time_step: 4, phi: 0.5, neuron_ids: vec![1, 2] },
            ]
        );
        assert!(store.complexes(3).unwrap().is_empty());
        assert_eq!(store.num_complexes().unwrap(), 4);
    }

    #[test]
    fn test_store_save_to() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("complexes.json");

        let mut store = MemoryResultStore::new();
        store.add_complex(1, 4, 0.5, &[1, 2]).unwrap();
        store.save_to(&path).unwrap();

        let saved: BTreeMap<EntityId, Vec<Complex>> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.get(&1).unwrap().len(), 1);
    }
}
