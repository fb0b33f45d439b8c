//! Module implementing the exhaustive probability table over binary patterns.
use std::collections::HashMap;

use super::pattern::{all_patterns, pattern_key};
use super::MAX_PATTERN_LENGTH;
use crate::error::AnalysisError;

/// A table holding one value for each of the 2^n binary patterns of length n.
/// The table is fully populated at construction and no key can be added or removed afterwards.
#[derive(Debug, PartialEq, Clone)]
pub struct ProbabilityTable {
    pattern_length: usize,
    // The keys and their values, in generation order.
    entries: Vec<(String, f64)>,
    // The position of every key in the entries.
    index: HashMap<String, usize>,
}

impl ProbabilityTable {
    /// Create a zero-initialized table for all patterns of the given length.
    /// The function returns an error if the length exceeds MAX_PATTERN_LENGTH.
    pub fn new(pattern_length: usize) -> Result<Self, AnalysisError> {
        if pattern_length > MAX_PATTERN_LENGTH {
            return Err(AnalysisError::InvalidParameter(format!(
                "Pattern length {} exceeds the maximum of {}",
                pattern_length, MAX_PATTERN_LENGTH
            )));
        }

        let entries: Vec<(String, f64)> = all_patterns(pattern_length)
            .map(|pattern| (pattern_key(&pattern), 0.0))
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, (key, _))| (key.clone(), position))
            .collect();

        Ok(ProbabilityTable {
            pattern_length,
            entries,
            index,
        })
    }

    /// Returns the length of the patterns of the table.
    pub fn pattern_length(&self) -> usize {
        self.pattern_length
    }

    /// Returns the number of entries, i.e., 2^n.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A table always holds at least the empty pattern.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value associated with the key.
    pub fn get(&self, key: &str) -> Result<f64, AnalysisError> {
        self.position(key).map(|position| self.entries[position].1)
    }

    /// Set the value associated with the key.
    pub fn set(&mut self, key: &str, value: f64) -> Result<(), AnalysisError> {
        let position = self.position(key)?;
        self.entries[position].1 = value;
        Ok(())
    }

    /// Returns the value associated with the pattern.
    pub fn get_pattern(&self, pattern: &[bool]) -> Result<f64, AnalysisError> {
        self.get(&pattern_key(pattern))
    }

    /// Set the value associated with the pattern.
    pub fn set_pattern(&mut self, pattern: &[bool], value: f64) -> Result<(), AnalysisError> {
        self.set(&pattern_key(pattern), value)
    }

    /// An iterator over the (key, value) pairs, in generation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Returns the sum of all values.
    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, value)| value).sum()
    }

    /// Scale the values so that they sum to one.
    /// Returns false, leaving the table untouched, if the values do not sum to a positive number.
    pub fn normalize(&mut self) -> bool {
        let total = self.sum();
        if total <= 0.0 || !total.is_finite() {
            return false;
        }
        self.entries
            .iter_mut()
            .for_each(|(_, value)| *value /= total);
        true
    }

    fn position(&self, key: &str) -> Result<usize, AnalysisError> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| AnalysisError::KeyNotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_table_new() {
        for n in 0..=16 {
            let table = ProbabilityTable::new(n).unwrap();
            assert_eq!(table.len(), 1 << n);
            assert_eq!(table.iter().map(|(key, _)| key).unique().count(), 1 << n);
            for (key, value) in table.iter() {
                assert_eq!(key.len(), n);
                assert!(key.chars().all(|c| c == '0' || c == '1'));
                assert_eq!(value, 0.0);
            }
        }

        assert_eq!(
            ProbabilityTable::new(MAX_PATTERN_LENGTH + 1),
            Err(AnalysisError::InvalidParameter(format!(
                "Pattern length {} exceeds the maximum of {}",
                MAX_PATTERN_LENGTH + 1,
                MAX_PATTERN_LENGTH
            )))
        );
    }

    #[test]
    fn test_table_empty_pattern() {
        let mut table = ProbabilityTable::new(0).unwrap();
        assert_eq!(table.len(), 1);
        table.set("", 0.5).unwrap();
        assert_eq!(table.get("").unwrap(), 0.5);
    }

    #[test]
    fn test_table_get_set() {
        let mut table = ProbabilityTable::new(3).unwrap();
        table.set("101", 0.25).unwrap();
        table.set_pattern(&[false, true, true], 0.5).unwrap();
        assert_eq!(table.get("101").unwrap(), 0.25);
        assert_eq!(table.get("011").unwrap(), 0.5);
        assert_eq!(table.get_pattern(&[true, false, true]).unwrap(), 0.25);
        assert_eq!(table.get("000").unwrap(), 0.0);

        // Length mismatch
        assert_eq!(
            table.get("10"),
            Err(AnalysisError::KeyNotFound("10".to_string()))
        );
        assert_eq!(
            table.set("1011", 1.0),
            Err(AnalysisError::KeyNotFound("1011".to_string()))
        );
        assert_eq!(table.len(), 8);
    }

    #[test]
    fn test_table_normalize() {
        let mut table = ProbabilityTable::new(2).unwrap();
        assert!(!table.normalize());

        table.set("00", 1.0).unwrap();
        table.set("11", 3.0).unwrap();
        assert!(table.normalize());
        assert_eq!(table.get("00").unwrap(), 0.25);
        assert_eq!(table.get("11").unwrap(), 0.75);
        assert!((table.sum() - 1.0).abs() < 1e-12);
    }
}
