//! Enumeration of binary patterns.
//!
//! Patterns are produced by increasing number of set bits. For a given number of set bits,
//! the selections are visited in lexicographic order (with `false < true`) by successive
//! permutations of a boolean selection array.
use crate::error::AnalysisError;

/// Rearranges the selection into the next lexicographic permutation.
/// Returns `false` and leaves the selection sorted (i.e., the first permutation) when it was already the last one.
pub fn next_permutation(selection: &mut [bool]) -> bool {
    if selection.len() < 2 {
        return false;
    }

    let pivot = match (0..selection.len() - 1)
        .rev()
        .find(|&i| selection[i] < selection[i + 1])
    {
        Some(i) => i,
        None => {
            selection.reverse();
            return false;
        }
    };

    // There is always such a successor since selection[pivot + 1] > selection[pivot]
    let successor = (pivot + 1..selection.len())
        .rev()
        .find(|&j| selection[j] > selection[pivot])
        .unwrap_or(pivot + 1);
    selection.swap(pivot, successor);
    selection[pivot + 1..].reverse();
    true
}

/// An iterator over every distinct selection of `num_set` elements among `len`.
#[derive(Debug, Clone)]
pub struct Selections {
    current: Option<Vec<bool>>,
}

impl Selections {
    /// Create the iterator. It starts from `[false, ..., false, true, ..., true]`.
    /// It is empty if more elements are selected than available.
    pub fn new(len: usize, num_set: usize) -> Self {
        if num_set > len {
            return Selections { current: None };
        }
        let mut selection = vec![false; len - num_set];
        selection.extend(std::iter::repeat(true).take(num_set));
        Selections {
            current: Some(selection),
        }
    }
}

impl Iterator for Selections {
    type Item = Vec<bool>;

    fn next(&mut self) -> Option<Self::Item> {
        let selection = self.current.take()?;
        let mut successor = selection.clone();
        if next_permutation(&mut successor) {
            self.current = Some(successor);
        }
        Some(selection)
    }
}

/// An iterator over the 2^len binary patterns of length `len`, ordered by number of set bits.
pub fn all_patterns(len: usize) -> impl Iterator<Item = Vec<bool>> {
    (0..=len).flat_map(move |num_set| Selections::new(len, num_set))
}

/// Returns the string representation of a pattern, e.g., `"0110"`.
pub fn pattern_key(pattern: &[bool]) -> String {
    pattern.iter().map(|&bit| if bit { '1' } else { '0' }).collect()
}

/// Parse a string of '0' and '1' into a pattern.
pub fn parse_key(key: &str) -> Result<Vec<bool>, AnalysisError> {
    key.chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            _ => Err(AnalysisError::InvalidParameter(format!(
                "Invalid character '{}' in pattern key '{}'",
                c, key
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_next_permutation() {
        let mut selection = vec![false, false, true, true];
        let mut visited = vec![pattern_key(&selection)];
        while next_permutation(&mut selection) {
            visited.push(pattern_key(&selection));
        }
        assert_eq!(
            visited,
            vec!["0011", "0101", "0110", "1001", "1010", "1100"]
        );
        // Back to the first permutation
        assert_eq!(selection, vec![false, false, true, true]);
    }

    #[test]
    fn test_next_permutation_trivial() {
        let mut selection: Vec<bool> = vec![];
        assert!(!next_permutation(&mut selection));

        let mut selection = vec![true];
        assert!(!next_permutation(&mut selection));

        let mut selection = vec![true, true, true];
        assert!(!next_permutation(&mut selection));
    }

    #[test]
    fn test_selections() {
        assert_eq!(Selections::new(5, 2).count(), 10);
        assert_eq!(Selections::new(5, 0).collect_vec(), vec![vec![false; 5]]);
        assert_eq!(Selections::new(5, 5).collect_vec(), vec![vec![true; 5]]);
        assert_eq!(Selections::new(3, 4).count(), 0);
        assert_eq!(Selections::new(0, 0).collect_vec(), vec![Vec::<bool>::new()]);

        for selection in Selections::new(6, 3) {
            assert_eq!(selection.iter().filter(|&&bit| bit).count(), 3);
        }
    }

    #[test]
    fn test_all_patterns() {
        let keys = all_patterns(3).map(|pattern| pattern_key(&pattern)).collect_vec();
        assert_eq!(
            keys,
            vec!["000", "001", "010", "100", "011", "101", "110", "111"]
        );

        for len in 0..=10 {
            let keys = all_patterns(len)
                .map(|pattern| pattern_key(&pattern))
                .collect_vec();
            assert_eq!(keys.len(), 1 << len);
            assert_eq!(keys.iter().unique().count(), 1 << len);
        }
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("0110").unwrap(), vec![false, true, true, false]);
        assert_eq!(parse_key("").unwrap(), Vec::<bool>::new());
        assert!(matches!(
            parse_key("01x"),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }
}
