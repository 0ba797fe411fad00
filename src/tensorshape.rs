use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// Static shape of a representation. The leading dimension is the batch and
/// is normally left as `None` until execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorShape {
    dims: Vec<Option<usize>>,
}

impl TensorShape {
    pub fn new(dims: Vec<Option<usize>>) -> Self {
        Self { dims }
    }

    /// Shape with an unknown batch dimension followed by `dims`.
    pub fn batched(dims: &[usize]) -> Self {
        Self {
            dims: std::iter::once(None)
                .chain(dims.iter().map(|&x| Some(x)))
                .collect(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Option<usize>] {
        &self.dims
    }

    pub fn is_fully_defined(&self) -> bool {
        self.dims.iter().all(Option::is_some)
    }

    /// Number of scalar neurons in one example, i.e. the product of every
    /// dimension after the batch axis. `None` if any of them is unknown.
    pub fn num_neurons(&self) -> Option<usize> {
        self.dims.get(1..)?.iter().copied().product()
    }

    pub fn is_compatible_with(&self, other: &Self) -> bool {
        if self.dims.len() != other.dims.len() {
            return false;
        }
        self.dims
            .iter()
            .zip(other.dims.iter())
            .all(|(x, y)| match (x, y) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            })
    }

    /// Whether a concrete array shape fits this (possibly partial) shape.
    pub fn matches(&self, shape: &[usize]) -> bool {
        self.dims.len() == shape.len()
            && self
                .dims
                .iter()
                .zip(shape)
                .all(|(x, y)| x.map_or(true, |x| x == *y))
    }
}

impl Index<usize> for TensorShape {
    type Output = Option<usize>;

    fn index(&self, idx: usize) -> &Option<usize> {
        &self.dims[idx]
    }
}

impl From<Vec<usize>> for TensorShape {
    fn from(v: Vec<usize>) -> Self {
        Self {
            dims: v.into_iter().map(Some).collect(),
        }
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dims: Vec<String> = self
            .dims
            .iter()
            .map(|d| d.map_or_else(|| "?".to_string(), |d| d.to_string()))
            .collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_neurons_skips_batch() {
        let shape = TensorShape::batched(&[28, 28, 32]);
        assert_eq!(shape.num_neurons(), Some(25088));
        assert_eq!(TensorShape::batched(&[1024]).num_neurons(), Some(1024));
    }

    #[test]
    fn test_num_neurons_unknown() {
        let shape = TensorShape::new(vec![None, Some(7), None, Some(64)]);
        assert_eq!(shape.num_neurons(), None);
        assert!(!shape.is_fully_defined());
    }

    #[test]
    fn test_matches() {
        let shape = TensorShape::batched(&[4, 4, 3]);
        assert!(shape.matches(&[10, 4, 4, 3]));
        assert!(!shape.matches(&[10, 4, 4]));
        assert!(!shape.matches(&[10, 4, 5, 3]));
        assert!(shape.is_compatible_with(&TensorShape::from(vec![2, 4, 4, 3])));
    }

    #[test]
    fn test_display() {
        assert_eq!(TensorShape::batched(&[7, 7]).to_string(), "[?, 7, 7]");
    }
}
