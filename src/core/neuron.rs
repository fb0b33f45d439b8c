//! This module provides the `WeightlessNeuron`, a nearest-match classifier over binary input patterns.
//!
//! A weightless neuron does not integrate weighted inputs. It memorizes (input pattern, output) examples
//! and answers queries by looking up the training examples which are the closest in Hamming distance.
//! Queries where some inputs are unknown are answered by averaging over all possible values of the
//! unknown inputs, i.e., under a uniform prior.
use std::collections::HashMap;

use log::trace;
use serde::{Deserialize, Serialize};

use super::pattern::all_patterns;
use super::NeuronId;
use crate::error::AnalysisError;

/// The probability returned when the training data does not allow a confident answer.
pub const UNDECIDED: f64 = 0.5;

/// Number of set bits of every byte.
const BIT_COUNT: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut byte = 1;
    while byte < 256 {
        table[byte] = (byte & 1) as u8 + table[byte / 2];
        byte += 1;
    }
    table
};

/// An (input pattern, output) pair used to train a weightless neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    /// The state of each input, in the order of the neuron connections.
    pub input_bits: Vec<bool>,
    /// Whether the neuron fires in response to the inputs.
    pub output: bool,
}

impl TrainingExample {
    pub fn new(input_bits: Vec<bool>, output: bool) -> Self {
        TrainingExample { input_bits, output }
    }
}

/// A training example stored with its inputs packed into bytes.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
struct PackedExample {
    bytes: Vec<u8>,
    output: bool,
}

/// Represents a weightless neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct WeightlessNeuron {
    // The neuron ID.
    id: NeuronId,
    // The presynaptic neurons, in the order of the local bit positions.
    connection_ids: Vec<NeuronId>,
    // The local bit position of every presynaptic neuron.
    connection_index: HashMap<NeuronId, usize>,
    // The training examples, in order of insertion.
    training_set: Vec<PackedExample>,
    // The generalization level in [0, 1].
    generalization: f64,
    // The maximum Hamming distance for a training example to be considered a match.
    generalization_threshold: usize,
}

impl WeightlessNeuron {
    /// Create a new untrained neuron listening to the provided neurons.
    /// The neuron only generalizes to exact matches until `set_generalization` is called.
    /// The function returns an error if a presynaptic neuron appears twice.
    pub fn new(id: NeuronId, connections: &[NeuronId]) -> Result<Self, AnalysisError> {
        let mut connection_index = HashMap::with_capacity(connections.len());
        for (position, &source_id) in connections.iter().enumerate() {
            if connection_index.insert(source_id, position).is_some() {
                return Err(AnalysisError::InvalidParameter(format!(
                    "Neuron {} is connected twice to neuron {}",
                    source_id, id
                )));
            }
        }

        Ok(WeightlessNeuron {
            id,
            connection_ids: connections.to_vec(),
            connection_index,
            training_set: vec![],
            generalization: 1.0,
            generalization_threshold: 0,
        })
    }

    /// Returns the neuron ID.
    pub fn id(&self) -> NeuronId {
        self.id
    }

    /// Returns the number of presynaptic neurons.
    pub fn num_connections(&self) -> usize {
        self.connection_ids.len()
    }

    /// Returns the presynaptic neurons, in the order of the input patterns.
    pub fn connection_ids(&self) -> &[NeuronId] {
        &self.connection_ids
    }

    /// Returns the number of training examples.
    pub fn num_training_examples(&self) -> usize {
        self.training_set.len()
    }

    pub fn generalization(&self) -> f64 {
        self.generalization
    }

    pub fn generalization_threshold(&self) -> usize {
        self.generalization_threshold
    }

    /// Set the generalization level.
    /// A level of 1 only accepts exact matches while a level of 0 accepts any training example.
    /// The threshold is rounded half away from zero.
    pub fn set_generalization(&mut self, generalization: f64) -> Result<(), AnalysisError> {
        if !(0.0..=1.0).contains(&generalization) {
            return Err(AnalysisError::InvalidParameter(format!(
                "Generalization must be in [0, 1], found {}",
                generalization
            )));
        }
        self.generalization = generalization;
        self.generalization_threshold =
            (self.num_connections() as f64 * (1.0 - generalization)).round() as usize;
        Ok(())
    }

    /// Add a training example.
    /// Conflicting examples are kept as they are.
    pub fn add_training(&mut self, pattern: &[bool], output: bool) -> Result<(), AnalysisError> {
        self.check_length(pattern)?;
        self.training_set.push(PackedExample {
            bytes: pack(pattern),
            output,
        });
        Ok(())
    }

    pub fn add_training_example(&mut self, example: &TrainingExample) -> Result<(), AnalysisError> {
        self.add_training(&example.input_bits, example.output)
    }

    /// Returns the probability that the neuron is in the given firing state after receiving the pattern.
    ///
    /// The answer is based on the training examples at minimal Hamming distance from the pattern:
    /// 1. if they are too far away (see `generalization_threshold`), the answer is 0.5;
    /// 2. if they all agree, the answer is 1 if their output is the queried firing state and 0 otherwise;
    /// 3. if they disagree, the answer is 0.5.
    pub fn classify(&self, pattern: &[bool], firing_state: bool) -> Result<f64, AnalysisError> {
        self.check_length(pattern)?;
        let bytes = pack(pattern);

        let best = self.nearest_outputs(&bytes);
        let probability = match best {
            None => UNDECIDED,
            Some((distance, _)) if distance > self.generalization_threshold => UNDECIDED,
            Some((_, Agreement::Unanimous(output))) => {
                if output == firing_state {
                    1.0
                } else {
                    0.0
                }
            }
            Some((_, Agreement::Split)) => UNDECIDED,
        };
        Ok(probability)
    }

    /// Returns the probability that the neuron is in the given firing state when only some of its inputs are known.
    ///
    /// Known neurons which are not connected to this neuron are ignored. The unknown inputs are marginalized out
    /// assuming that each of their 2^m possible states is equally likely.
    pub fn transition_probability(
        &self,
        known_ids: &[NeuronId],
        known_pattern: &[bool],
        firing_state: bool,
    ) -> Result<f64, AnalysisError> {
        if known_ids.len() != known_pattern.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: known_ids.len(),
                found: known_pattern.len(),
            });
        }

        let mut pattern: Vec<Option<bool>> = vec![None; self.num_connections()];
        for (source_id, &state) in known_ids.iter().zip(known_pattern) {
            if let Some(&position) = self.connection_index.get(source_id) {
                pattern[position] = Some(state);
            }
        }

        let missing: Vec<usize> = pattern
            .iter()
            .enumerate()
            .filter(|(_, state)| state.is_none())
            .map(|(position, _)| position)
            .collect();
        let mut full_pattern: Vec<bool> = pattern.iter().map(|state| state.unwrap_or(false)).collect();

        if missing.len() > super::MAX_PATTERN_LENGTH {
            return Err(AnalysisError::InvalidParameter(format!(
                "Too many unknown inputs ({}) for neuron {}",
                missing.len(),
                self.id
            )));
        }

        trace!(
            "Neuron {}: marginalizing over {} unknown inputs",
            self.id,
            missing.len()
        );

        let mut total = 0.0;
        let mut num_completions = 0usize;
        for completion in all_patterns(missing.len()) {
            for (&position, &state) in missing.iter().zip(completion.iter()) {
                full_pattern[position] = state;
            }
            total += self.classify(&full_pattern, firing_state)?;
            num_completions += 1;
        }

        Ok(total / num_completions as f64)
    }

    /// Returns the minimal Hamming distance to the training examples and whether the closest examples agree.
    /// Returns `None` if the neuron has not been trained.
    fn nearest_outputs(&self, bytes: &[u8]) -> Option<(usize, Agreement)> {
        let mut best: Option<(usize, Agreement)> = None;
        for example in self.training_set.iter() {
            let distance = hamming_distance(bytes, &example.bytes);
            best = match best {
                Some((min_distance, agreement)) if distance > min_distance => {
                    Some((min_distance, agreement))
                }
                Some((min_distance, agreement)) if distance == min_distance => {
                    Some((min_distance, agreement.with(example.output)))
                }
                _ => Some((distance, Agreement::Unanimous(example.output))),
            };
        }
        best
    }

    fn check_length(&self, pattern: &[bool]) -> Result<(), AnalysisError> {
        if pattern.len() != self.num_connections() {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.num_connections(),
                found: pattern.len(),
            });
        }
        Ok(())
    }
}

/// The outputs of the training examples at minimal distance.
#[derive(Debug, PartialEq, Clone, Copy)]
enum Agreement {
    Unanimous(bool),
    Split,
}

impl Agreement {
    fn with(self, output: bool) -> Self {
        match self {
            Agreement::Unanimous(previous) if previous == output => self,
            _ => Agreement::Split,
        }
    }
}

/// Pack a pattern into bytes, bit `i` being stored in byte `i / 8` at position `i % 8`.
fn pack(pattern: &[bool]) -> Vec<u8> {
    pattern
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| byte | ((bit as u8) << i))
        })
        .collect()
}

/// Number of differing bits between two packed patterns of the same length.
fn hamming_distance(a: &[u8], b: &[u8]) -> usize {
    a.iter()
        .zip(b)
        .map(|(x, y)| BIT_COUNT[(x ^ y) as usize] as usize)
        .sum()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    const SEED: u64 = 42;

    fn brute_force_mean(
        neuron: &WeightlessNeuron,
        known: &[(NeuronId, bool)],
        firing_state: bool,
    ) -> f64 {
        let n = neuron.num_connections();
        let mut total = 0.0;
        let mut count = 0;
        'outer: for code in 0..(1u32 << n) {
            let pattern: Vec<bool> = (0..n).map(|i| (code >> i) & 1 == 1).collect();
            for (source_id, state) in known {
                if let Some(position) = neuron.connection_ids().iter().position(|id| id == source_id) {
                    if pattern[position] != *state {
                        continue 'outer;
                    }
                }
            }
            total += neuron.classify(&pattern, firing_state).unwrap();
            count += 1;
        }
        total / count as f64
    }

    #[test]
    fn test_bit_count() {
        for byte in 0..256usize {
            assert_eq!(BIT_COUNT[byte] as u32, (byte as u8).count_ones());
        }
    }

    #[test]
    fn test_hamming_distance() {
        let a = pack(&[true, false, true, true, false, false, false, false, true, true]);
        let b = pack(&[false, false, true, false, false, false, false, false, true, false]);
        assert_eq!(hamming_distance(&a, &b), 3);
        assert_eq!(hamming_distance(&a, &a), 0);
    }

    #[test]
    fn test_new_duplicate_connection() {
        assert!(matches!(
            WeightlessNeuron::new(0, &[1, 2, 1]),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_add_training_dimension_mismatch() {
        let mut neuron = WeightlessNeuron::new(0, &[1, 2, 3]).unwrap();
        assert_eq!(
            neuron.add_training(&[true, false], true),
            Err(AnalysisError::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(neuron.num_training_examples(), 0);
    }

    #[test]
    fn test_classify_exact_match() {
        let mut neuron = WeightlessNeuron::new(0, &[1, 2, 3, 4]).unwrap();
        neuron.set_generalization(1.0).unwrap();
        for _ in 0..3 {
            neuron.add_training(&[true, false, true, false], true).unwrap();
        }

        assert_eq!(neuron.classify(&[true, false, true, false], true).unwrap(), 1.0);
        assert_eq!(neuron.classify(&[true, false, true, false], false).unwrap(), 0.0);

        // Any pattern at positive distance is undecided
        assert_eq!(neuron.classify(&[true, true, true, false], true).unwrap(), 0.5);
        assert_eq!(neuron.classify(&[false, true, false, true], false).unwrap(), 0.5);
    }

    #[test]
    fn test_classify_untrained() {
        let neuron = WeightlessNeuron::new(0, &[1, 2]).unwrap();
        assert_eq!(neuron.classify(&[true, false], true).unwrap(), 0.5);
        assert_eq!(neuron.classify(&[true, false], false).unwrap(), 0.5);
    }

    #[test]
    fn test_classify_disagreement() {
        let mut neuron = WeightlessNeuron::new(0, &[1, 2, 3]).unwrap();
        neuron.set_generalization(0.0).unwrap();
        neuron.add_training(&[true, true, false], true).unwrap();
        neuron.add_training(&[true, true, false], false).unwrap();
        neuron.add_training(&[false, false, false], true).unwrap();

        // Conflicting examples at minimal distance
        assert_eq!(neuron.classify(&[true, true, false], true).unwrap(), 0.5);
        assert_eq!(neuron.classify(&[true, true, true], true).unwrap(), 0.5);

        // Single closest example, with maximal tolerance
        assert_eq!(neuron.classify(&[false, false, true], true).unwrap(), 1.0);
        assert_eq!(neuron.classify(&[false, false, true], false).unwrap(), 0.0);
    }

    #[test]
    fn test_set_generalization() {
        let mut neuron = WeightlessNeuron::new(0, &[1, 2, 3, 4, 5]).unwrap();
        neuron.set_generalization(1.0).unwrap();
        assert_eq!(neuron.generalization_threshold(), 0);
        neuron.set_generalization(0.0).unwrap();
        assert_eq!(neuron.generalization_threshold(), 5);
        // 5 * 0.5 = 2.5 is rounded away from zero
        neuron.set_generalization(0.5).unwrap();
        assert_eq!(neuron.generalization_threshold(), 3);
        neuron.set_generalization(0.8).unwrap();
        assert_eq!(neuron.generalization_threshold(), 1);

        assert!(matches!(
            neuron.set_generalization(1.5),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(matches!(
            neuron.set_generalization(f64::NAN),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert_eq!(neuron.generalization(), 0.8);
    }

    #[test]
    fn test_classify_within_threshold() {
        let mut neuron = WeightlessNeuron::new(0, &[1, 2, 3, 4]).unwrap();
        neuron.set_generalization(0.75).unwrap();
        neuron.add_training(&[true, true, false, false], true).unwrap();

        assert_eq!(neuron.classify(&[true, false, false, false], true).unwrap(), 1.0);
        assert_eq!(neuron.classify(&[false, false, false, false], true).unwrap(), 0.5);
    }

    #[test]
    fn test_transition_probability_dimension_mismatch() {
        let neuron = WeightlessNeuron::new(0, &[1, 2]).unwrap();
        assert_eq!(
            neuron.transition_probability(&[1, 2], &[true], true),
            Err(AnalysisError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_transition_probability_fully_known() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut neuron = WeightlessNeuron::new(0, &[10, 20, 30, 40, 50]).unwrap();
        neuron.set_generalization(0.6).unwrap();
        for _ in 0..8 {
            let pattern: Vec<bool> = (0..5).map(|_| rng.gen_bool(0.5)).collect();
            neuron.add_training(&pattern, rng.gen_bool(0.5)).unwrap();
        }

        for _ in 0..20 {
            let pattern: Vec<bool> = (0..5).map(|_| rng.gen_bool(0.5)).collect();
            // Shuffled ids with an additional unrelated neuron
            let known_ids = [50, 30, 10, 40, 20, 99];
            let known_pattern: Vec<bool> = vec![
                pattern[4], pattern[2], pattern[0], pattern[3], pattern[1], true,
            ];
            for firing_state in [true, false] {
                assert_eq!(
                    neuron
                        .transition_probability(&known_ids, &known_pattern, firing_state)
                        .unwrap(),
                    neuron.classify(&pattern, firing_state).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_transition_probability_marginalization() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let connections = [1, 2, 3, 4, 5, 6];
        let mut neuron = WeightlessNeuron::new(0, &connections).unwrap();
        neuron.set_generalization(0.7).unwrap();
        for _ in 0..12 {
            let pattern: Vec<bool> = (0..6).map(|_| rng.gen_bool(0.5)).collect();
            neuron.add_training(&pattern, rng.gen_bool(0.5)).unwrap();
        }

        // From 0 to 4 missing inputs
        for num_known in 2..=6 {
            let known: Vec<(NeuronId, bool)> = connections[..num_known]
                .iter()
                .map(|&id| (id, rng.gen_bool(0.5)))
                .collect();
            let known_ids: Vec<NeuronId> = known.iter().map(|(id, _)| *id).collect();
            let known_pattern: Vec<bool> = known.iter().map(|(_, state)| *state).collect();
            for firing_state in [true, false] {
                let probability = neuron
                    .transition_probability(&known_ids, &known_pattern, firing_state)
                    .unwrap();
                let expected = brute_force_mean(&neuron, &known, firing_state);
                assert!((probability - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_transition_probability_nothing_known() {
        let mut neuron = WeightlessNeuron::new(0, &[1, 2]).unwrap();
        neuron.add_training(&[false, false], true).unwrap();
        // 1 match out of 4 completions, the other 3 are undecided
        assert_eq!(
            neuron.transition_probability(&[], &[], true).unwrap(),
            (1.0 + 3.0 * 0.5) / 4.0
        );
    }
}
