//! The network structure and firing history consumed by the analysis.
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};

use crate::core::neuron::TrainingExample;
use crate::core::{NeuronId, TimeStep};
use crate::error::AnalysisError;

/// A handle to the network and its archived activity.
/// Each worker owns its own handle.
pub trait NetworkArchive: Clone + Send + 'static {
    /// The IDs of all neurons of the network.
    fn neuron_ids(&self) -> Result<Vec<NeuronId>, AnalysisError>;

    /// The neurons firing at the given time step.
    fn firing_pattern(&self, time_step: TimeStep) -> Result<HashSet<NeuronId>, AnalysisError>;

    /// The presynaptic neurons of a neuron, in the order of its input patterns.
    fn connections(&self, neuron_id: NeuronId) -> Result<Vec<NeuronId>, AnalysisError>;

    /// The examples the weightless model of a neuron is trained on.
    fn training_examples(&self, neuron_id: NeuronId) -> Result<Vec<TrainingExample>, AnalysisError>;
}

/// A neuron of the archive.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct ArchivedNeuron {
    /// The presynaptic neurons.
    pub connections: Vec<NeuronId>,
    /// The training examples, with one input bit per connection.
    pub training_examples: Vec<TrainingExample>,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
struct ArchiveData {
    neurons: BTreeMap<NeuronId, ArchivedNeuron>,
    firing_patterns: BTreeMap<TimeStep, Vec<NeuronId>>,
}

/// An in-memory archive. Clones share the same data until one of them is modified.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct MemoryArchive {
    data: Arc<ArchiveData>,
}

impl MemoryArchive {
    /// Create an empty archive.
    pub fn new() -> Self {
        MemoryArchive::default()
    }

    /// Add a neuron with its presynaptic neurons.
    /// The function returns an error if the neuron already exists.
    pub fn add_neuron(
        &mut self,
        neuron_id: NeuronId,
        connections: Vec<NeuronId>,
    ) -> Result<(), AnalysisError> {
        let data = Arc::make_mut(&mut self.data);
        if data.neurons.contains_key(&neuron_id) {
            return Err(AnalysisError::InvalidParameter(format!(
                "Neuron {} already exists",
                neuron_id
            )));
        }
        data.neurons.insert(
            neuron_id,
            ArchivedNeuron {
                connections,
                training_examples: vec![],
            },
        );
        Ok(())
    }

    /// Add a training example to a neuron.
    /// The function returns an error if the neuron does not exist or if the example does not fit its connections.
    pub fn add_training_example(
        &mut self,
        neuron_id: NeuronId,
        example: TrainingExample,
    ) -> Result<(), AnalysisError> {
        let data = Arc::make_mut(&mut self.data);
        let neuron = data
            .neurons
            .get_mut(&neuron_id)
            .ok_or_else(|| AnalysisError::OutOfBounds(format!("Neuron {} not found", neuron_id)))?;
        if example.input_bits.len() != neuron.connections.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: neuron.connections.len(),
                found: example.input_bits.len(),
            });
        }
        neuron.training_examples.push(example);
        Ok(())
    }

    /// Set the neurons firing at the given time step.
    pub fn set_firing_pattern<I: IntoIterator<Item = NeuronId>>(&mut self, time_step: TimeStep, neuron_ids: I) {
        let neuron_ids = neuron_ids.into_iter().sorted().dedup().collect();
        Arc::make_mut(&mut self.data)
            .firing_patterns
            .insert(time_step, neuron_ids);
    }

    /// Returns the number of neurons.
    pub fn num_neurons(&self) -> usize {
        self.data.neurons.len()
    }

    /// Returns the archived time steps, in increasing order.
    pub fn time_steps(&self) -> Vec<TimeStep> {
        self.data.firing_patterns.keys().copied().collect()
    }

    /// Returns a random archive of neurons with the same number of distinct inputs.
    ///
    /// Each neuron fires when enough of its inputs fired at the previous time step, the required number being
    /// drawn uniformly at random. With the provided probability, the neuron does the opposite. The initial state
    /// is drawn uniformly. Every transition of the history is used as a training example of the neuron.
    pub fn rand(
        num_neurons: usize,
        num_inputs: usize,
        num_time_steps: usize,
        noise: f64,
        seed: u64,
    ) -> Result<Self, AnalysisError> {
        if num_inputs > num_neurons {
            return Err(AnalysisError::InvalidParameter(format!(
                "Cannot draw {} distinct inputs among {} neurons",
                num_inputs, num_neurons
            )));
        }
        if num_time_steps == 0 {
            return Err(AnalysisError::InvalidParameter(
                "At least one time step is required".to_string(),
            ));
        }
        let flip = Bernoulli::new(noise)
            .map_err(|e| AnalysisError::InvalidParameter(format!("Invalid noise: {}", e)))?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let connections: Vec<Vec<usize>> = (0..num_neurons)
            .map(|_| sample(&mut rng, num_neurons, num_inputs).into_vec())
            .collect();
        let thresholds: Vec<usize> = (0..num_neurons)
            .map(|_| rng.gen_range(1..=num_inputs.max(1)))
            .collect();

        let mut states: Vec<Vec<bool>> = vec![(0..num_neurons).map(|_| rng.gen_bool(0.5)).collect()];
        for _ in 1..num_time_steps {
            let next: Vec<bool> = {
                let previous = &states[states.len() - 1];
                (0..num_neurons)
                    .map(|i| {
                        let num_active = connections[i].iter().filter(|&&j| previous[j]).count();
                        let driven = num_inputs > 0 && num_active >= thresholds[i];
                        driven != flip.sample(&mut rng)
                    })
                    .collect()
            };
            states.push(next);
        }

        let mut archive = MemoryArchive::new();
        for (i, sources) in connections.iter().enumerate() {
            archive.add_neuron(i as NeuronId, sources.iter().map(|&j| j as NeuronId).collect())?;
        }
        for t in 1..num_time_steps {
            for (i, sources) in connections.iter().enumerate() {
                let input_bits = sources.iter().map(|&j| states[t - 1][j]).collect();
                archive.add_training_example(i as NeuronId, TrainingExample::new(input_bits, states[t][i]))?;
            }
        }
        for (t, state) in states.iter().enumerate() {
            archive.set_firing_pattern(
                t as TimeStep,
                state
                    .iter()
                    .enumerate()
                    .filter(|&(_, &firing)| firing)
                    .map(|(i, _)| i as NeuronId),
            );
        }

        Ok(archive)
    }

    /// Save the archive to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), AnalysisError> {
        let file = File::create(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &*self.data)
            .map_err(|e| AnalysisError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| AnalysisError::IOError(e.to_string()))
    }

    /// Load an archive from a file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let file = File::open(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        let data: ArchiveData =
            serde_json::from_reader(reader).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        Ok(MemoryArchive {
            data: Arc::new(data),
        })
    }

    fn neuron(&self, neuron_id: NeuronId) -> Result<&ArchivedNeuron, AnalysisError> {
        self.data
            .neurons
            .get(&neuron_id)
            .ok_or_else(|| AnalysisError::OutOfBounds(format!("Neuron {} not found", neuron_id)))
    }
}

impl NetworkArchive for MemoryArchive {
    fn neuron_ids(&self) -> Result<Vec<NeuronId>, AnalysisError> {
        Ok(self.data.neurons.keys().copied().collect())
    }

    fn firing_pattern(&self, time_step: TimeStep) -> Result<HashSet<NeuronId>, AnalysisError> {
        self.data
            .firing_patterns
            .get(&time_step)
            .map(|neuron_ids| neuron_ids.iter().copied().collect())
            .ok_or_else(|| AnalysisError::OutOfBounds(format!("Time step {} not found", time_step)))
    }

    fn connections(&self, neuron_id: NeuronId) -> Result<Vec<NeuronId>, AnalysisError> {
        Ok(self.neuron(neuron_id)?.connections.clone())
    }

    fn training_examples(&self, neuron_id: NeuronId) -> Result<Vec<TrainingExample>, AnalysisError> {
        Ok(self.neuron(neuron_id)?.training_examples.clone())
    }
}
