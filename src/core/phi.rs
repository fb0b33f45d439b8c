//! Integrated information (phi) of neuron subsets, estimated from weightless neuron transition probabilities.
//!
//! For a subset S in firing state x1, the a-posteriori repertoire p(x0 | x1) over the previous states x0 of S
//! is obtained by multiplying the transition probabilities of its neurons, the inputs from outside S being
//! marginalized out. The information generated by S across a bipartition A|B is the relative entropy between
//! the repertoire of S and the product of the repertoires of A and B, computed as if the connections between
//! A and B were cut. Phi is the information across the bipartition minimizing the normalized information.
use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::trace;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::neuron::WeightlessNeuron;
use super::pattern::{all_patterns, Selections};
use super::table::ProbabilityTable;
use super::{NeuronId, MAX_PATTERN_LENGTH, MIN_PARALLEL_PARTITIONS};
use crate::error::AnalysisError;

/// A neuron subset together with its phi value.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SubsetPhi {
    /// The sorted IDs of the neurons in the subset.
    pub neuron_ids: Vec<NeuronId>,
    /// The integrated information of the subset.
    pub phi: f64,
}

/// Computes phi for subsets of a network of weightless neurons at a fixed firing state.
pub struct PhiCalculator<'a> {
    neurons: &'a HashMap<NeuronId, WeightlessNeuron>,
    firing_pattern: &'a HashSet<NeuronId>,
}

impl<'a> PhiCalculator<'a> {
    pub fn new(
        neurons: &'a HashMap<NeuronId, WeightlessNeuron>,
        firing_pattern: &'a HashSet<NeuronId>,
    ) -> Self {
        PhiCalculator {
            neurons,
            firing_pattern,
        }
    }

    /// Returns the a-posteriori repertoire over the previous states of the part, indexed in the order of `part`.
    /// Returns `None` if no previous state is compatible with the current firing state.
    pub fn repertoire(&self, part: &[NeuronId]) -> Result<Option<ProbabilityTable>, AnalysisError> {
        let mut table = ProbabilityTable::new(part.len())?;
        for previous_state in all_patterns(part.len()) {
            let mut probability = 1.0;
            for neuron_id in part.iter() {
                let neuron = self.neuron(*neuron_id)?;
                probability *= neuron.transition_probability(
                    part,
                    &previous_state,
                    self.firing_pattern.contains(neuron_id),
                )?;
                if probability == 0.0 {
                    break;
                }
            }
            table.set_pattern(&previous_state, probability)?;
        }

        if table.normalize() {
            Ok(Some(table))
        } else {
            Ok(None)
        }
    }

    /// Returns the information generated by the subset relative to the maximum entropy (uniform) repertoire.
    pub fn effective_information(&self, subset: &[NeuronId]) -> Result<f64, AnalysisError> {
        Ok(match self.repertoire(subset)? {
            Some(repertoire) => {
                let entropy: f64 = repertoire
                    .iter()
                    .filter(|(_, p)| *p > 0.0)
                    .map(|(_, p)| -p * p.log2())
                    .sum();
                subset.len() as f64 - entropy
            }
            None => 0.0,
        })
    }

    /// Returns the phi value of the subset, i.e., the information across its minimum information bipartition.
    pub fn phi(&self, subset: &[NeuronId]) -> Result<f64, AnalysisError> {
        if subset.len() < 2 {
            return Err(AnalysisError::InvalidParameter(format!(
                "Phi requires at least 2 neurons, found {}",
                subset.len()
            )));
        }
        if subset.len() > MAX_PATTERN_LENGTH {
            return Err(AnalysisError::InvalidParameter(format!(
                "Subset of {} neurons exceeds the maximum of {}",
                subset.len(),
                MAX_PATTERN_LENGTH
            )));
        }

        let whole = match self.repertoire(subset)? {
            Some(whole) => whole,
            None => {
                trace!("Subset {:?} has no compatible previous state", subset);
                return Ok(0.0);
            }
        };

        let bipartitions = bipartitions(subset);
        let informations: Vec<Option<(f64, f64)>> = if bipartitions.len() >= MIN_PARALLEL_PARTITIONS {
            bipartitions
                .par_iter()
                .map(|(part_a, part_b)| self.partition_information(subset, &whole, part_a, part_b))
                .collect::<Result<Vec<_>, AnalysisError>>()?
        } else {
            bipartitions
                .iter()
                .map(|(part_a, part_b)| self.partition_information(subset, &whole, part_a, part_b))
                .collect::<Result<Vec<_>, AnalysisError>>()?
        };

        let phi = informations
            .into_iter()
            .flatten()
            .min_by(|(ei_1, norm_1), (ei_2, norm_2)| {
                (ei_1 / norm_1).total_cmp(&(ei_2 / norm_2))
            })
            .map(|(ei, _)| ei.max(0.0))
            .unwrap_or(0.0);

        trace!("Subset {:?} has phi {}", subset, phi);
        Ok(phi)
    }

    /// Returns the information across the bipartition and its normalization factor.
    /// Returns `None` if the repertoire of a part is undefined.
    fn partition_information(
        &self,
        subset: &[NeuronId],
        whole: &ProbabilityTable,
        part_a: &[NeuronId],
        part_b: &[NeuronId],
    ) -> Result<Option<(f64, f64)>, AnalysisError> {
        let (repertoire_a, repertoire_b) = match (self.repertoire(part_a)?, self.repertoire(part_b)?) {
            (Some(repertoire_a), Some(repertoire_b)) => (repertoire_a, repertoire_b),
            _ => return Ok(None),
        };

        let in_a: Vec<bool> = subset.iter().map(|id| part_a.contains(id)).collect();
        let mut information = 0.0;
        for state in all_patterns(subset.len()) {
            let p = whole.get_pattern(&state)?;
            if p <= 0.0 {
                continue;
            }
            let (state_a, state_b): (Vec<bool>, Vec<bool>) = state
                .iter()
                .zip(in_a.iter())
                .partition_map(|(&bit, &is_a)| {
                    if is_a {
                        itertools::Either::Left(bit)
                    } else {
                        itertools::Either::Right(bit)
                    }
                });
            let q = repertoire_a.get_pattern(&state_a)? * repertoire_b.get_pattern(&state_b)?;
            information += p * (p / q.max(f64::MIN_POSITIVE)).log2();
        }

        let normalization = part_a.len().min(part_b.len()) as f64;
        Ok(Some((information, normalization)))
    }

    fn neuron(&self, neuron_id: NeuronId) -> Result<&WeightlessNeuron, AnalysisError> {
        self.neurons
            .get(&neuron_id)
            .ok_or_else(|| AnalysisError::OutOfBounds(format!("Neuron {} not found", neuron_id)))
    }
}

/// Returns every bipartition of the subset into two non-empty parts, the first part holding the first neuron.
pub fn bipartitions(subset: &[NeuronId]) -> Vec<(Vec<NeuronId>, Vec<NeuronId>)> {
    let Some((&first, rest)) = subset.split_first() else {
        return vec![];
    };

    (0..rest.len())
        .flat_map(|num_in_a| Selections::new(rest.len(), num_in_a))
        .map(|selection| {
            let mut part_a = vec![first];
            let mut part_b = vec![];
            for (&neuron_id, &is_a) in rest.iter().zip(selection.iter()) {
                if is_a {
                    part_a.push(neuron_id);
                } else {
                    part_b.push(neuron_id);
                }
            }
            (part_a, part_b)
        })
        .collect()
}

/// Returns the complexes among the subsets, i.e., the subsets whose phi exceeds `min_phi` and which are not
/// contained in a larger subset with higher phi. The complexes are sorted by decreasing phi.
pub fn find_complexes(subsets: &[SubsetPhi], min_phi: f64) -> Vec<SubsetPhi> {
    let members: Vec<HashSet<NeuronId>> = subsets
        .iter()
        .map(|subset| subset.neuron_ids.iter().copied().collect())
        .collect();

    subsets
        .iter()
        .enumerate()
        .filter(|(_, subset)| subset.phi > min_phi)
        .filter(|(i, subset)| {
            !subsets.iter().enumerate().any(|(j, other)| {
                other.phi > subset.phi
                    && members[j].len() > members[*i].len()
                    && members[*i].is_subset(&members[j])
            })
        })
        .map(|(_, subset)| subset.clone())
        .sorted_by(|a, b| b.phi.total_cmp(&a.phi))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two neurons copying each other.
    fn coupled_pair() -> HashMap<NeuronId, WeightlessNeuron> {
        let mut neuron_1 = WeightlessNeuron::new(1, &[2]).unwrap();
        neuron_1.add_training(&[false], false).unwrap();
        neuron_1.add_training(&[true], true).unwrap();
        let mut neuron_2 = WeightlessNeuron::new(2, &[1]).unwrap();
        neuron_2.add_training(&[false], false).unwrap();
        neuron_2.add_training(&[true], true).unwrap();
        HashMap::from([(1, neuron_1), (2, neuron_2)])
    }

    #[test]
    fn test_bipartitions() {
        assert!(bipartitions(&[]).is_empty());
        assert!(bipartitions(&[1]).is_empty());
        assert_eq!(bipartitions(&[1, 2]), vec![(vec![1], vec![2])]);

        let partitions = bipartitions(&[1, 2, 3, 4]);
        assert_eq!(partitions.len(), 7);
        for (part_a, part_b) in partitions.iter() {
            assert_eq!(part_a[0], 1);
            assert!(!part_b.is_empty());
            assert_eq!(part_a.len() + part_b.len(), 4);
        }
    }

    #[test]
    fn test_repertoire_coupled_pair() {
        let neurons = coupled_pair();
        let firing_pattern = HashSet::from([1, 2]);
        let calculator = PhiCalculator::new(&neurons, &firing_pattern);

        let repertoire = calculator.repertoire(&[1, 2]).unwrap().unwrap();
        assert_eq!(repertoire.get("11").unwrap(), 1.0);
        assert_eq!(repertoire.get("00").unwrap(), 0.0);
        assert_eq!(calculator.effective_information(&[1, 2]).unwrap(), 2.0);

        // The input of a neuron alone is unknown
        let repertoire = calculator.repertoire(&[1]).unwrap().unwrap();
        assert_eq!(repertoire.get("0").unwrap(), 0.5);
        assert_eq!(repertoire.get("1").unwrap(), 0.5);
    }

    #[test]
    fn test_phi_coupled_pair() {
        let neurons = coupled_pair();
        let firing_pattern = HashSet::from([1, 2]);
        let calculator = PhiCalculator::new(&neurons, &firing_pattern);
        assert!((calculator.phi(&[1, 2]).unwrap() - 2.0).abs() < 1e-12);

        let firing_pattern = HashSet::from([1]);
        let calculator = PhiCalculator::new(&neurons, &firing_pattern);
        assert!((calculator.phi(&[1, 2]).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_phi_disconnected_pair() {
        let mut neuron_1 = WeightlessNeuron::new(1, &[]).unwrap();
        neuron_1.add_training(&[], true).unwrap();
        let mut neuron_2 = WeightlessNeuron::new(2, &[]).unwrap();
        neuron_2.add_training(&[], false).unwrap();
        let neurons = HashMap::from([(1, neuron_1), (2, neuron_2)]);

        let firing_pattern = HashSet::from([1]);
        let calculator = PhiCalculator::new(&neurons, &firing_pattern);
        assert_eq!(calculator.effective_information(&[1, 2]).unwrap(), 0.0);
        assert_eq!(calculator.phi(&[1, 2]).unwrap(), 0.0);

        // Neuron 2 never fires, hence no previous state explains the current one
        let firing_pattern = HashSet::from([2]);
        let calculator = PhiCalculator::new(&neurons, &firing_pattern);
        assert_eq!(calculator.phi(&[1, 2]).unwrap(), 0.0);
    }

    #[test]
    fn test_phi_invalid_subsets() {
        let neurons = coupled_pair();
        let firing_pattern = HashSet::new();
        let calculator = PhiCalculator::new(&neurons, &firing_pattern);
        assert!(matches!(
            calculator.phi(&[1]),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(matches!(
            calculator.phi(&[1, 3]),
            Err(AnalysisError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_find_complexes() {
        let subsets = vec![
            SubsetPhi { neuron_ids: vec![1, 2], phi: 2.0 },
            SubsetPhi { neuron_ids: vec![1, 2, 3], phi: 1.0 },
            SubsetPhi { neuron_ids: vec![2, 3], phi: 0.5 },
            SubsetPhi { neuron_ids: vec![3, 4], phi: 0.0 },
        ];
        let complexes = find_complexes(&subsets, 0.0);
        assert_eq!(
            complexes,
            vec![
                SubsetPhi { neuron_ids: vec![1, 2], phi: 2.0 },
                SubsetPhi { neuron_ids: vec![1, 2, 3], phi: 1.0 },
            ]
        );

        assert_eq!(find_complexes(&subsets, 1.5).len(), 1);
        assert!(find_complexes(&[], 0.0).is_empty());
    }
}
