//! Cross-entropy loss and the weight-decay terms added to it
use crate::summary::SummaryWriter;
use crate::NetFloat;
use ndarray::{Array1, ArrayD, ArrayView2, Axis, Ix2};
use ndarray_stats::errors::MinMaxError;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named scalar loss terms, appended while a network is built and summed once
/// when the total loss is computed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LossCollection {
    terms: Vec<(String, NetFloat)>,
}

impl LossCollection {
    pub fn add(&mut self, name: String, value: NetFloat) {
        self.terms.push((name, value));
    }

    pub fn terms(&self) -> &[(String, NetFloat)] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn sum(&self) -> NetFloat {
        self.terms.iter().map(|(_, v)| v).sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LossError {
    NotAMatrix { shape: Vec<usize> },
    BatchMismatch { logits: usize, labels: usize },
    LabelOutOfRange { label: usize, num_classes: usize },
    EmptyBatch,
    EmptyLogits,
    /// A row of logits contains NaN, so it has no maximum.
    NaNLogits { row: usize },
}

impl fmt::Display for LossError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NotAMatrix { shape } => {
                write!(f, "logits must be [batch, classes], given {:?}", shape)
            }
            Self::BatchMismatch { logits, labels } => {
                write!(f, "{} rows of logits but {} labels", logits, labels)
            }
            Self::LabelOutOfRange { label, num_classes } => {
                write!(f, "label {} out of range for {} classes", label, num_classes)
            }
            Self::EmptyBatch => write!(f, "cannot compute a loss over an empty batch"),
            Self::EmptyLogits => write!(f, "logits have no classes"),
            Self::NaNLogits { row } => write!(f, "logits of example {} contain NaN", row),
        }
    }
}

impl std::error::Error for LossError {}

/// Per-example `-log softmax(logits)[label]`, computed with the log-sum-exp shift.
///
/// # Errors
/// If the batch sizes differ, a row is empty or contains NaN, or a label is not a valid class
pub fn sparse_softmax_cross_entropy(
    logits: ArrayView2<NetFloat>,
    labels: &[usize],
) -> Result<Array1<NetFloat>, LossError> {
    let (batch, num_classes) = logits.dim();
    if batch != labels.len() {
        return Err(LossError::BatchMismatch {
            logits: batch,
            labels: labels.len(),
        });
    }
    if num_classes == 0 {
        return Err(LossError::EmptyLogits);
    }
    if let Some(&label) = labels.iter().find(|&&l| l >= num_classes) {
        return Err(LossError::LabelOutOfRange { label, num_classes });
    }
    logits
        .axis_iter(Axis(0))
        .zip(labels)
        .enumerate()
        .map(|(i, (row, &label))| {
            let max = *row.max().map_err(|err| match err {
                MinMaxError::EmptyInput => LossError::EmptyLogits,
                MinMaxError::UndefinedOrder => LossError::NaNLogits { row: i },
            })?;
            let log_sum_exp = row.mapv(|x| (x - max).exp()).sum().ln() + max;
            Ok(log_sum_exp - row[label])
        })
        .collect()
}

/// # Errors
/// `NotAMatrix` if `logits` is not rank 2, `EmptyBatch` if it has no rows, and
/// any error of `sparse_softmax_cross_entropy`
pub fn cross_entropy_mean(logits: &ArrayD<NetFloat>, labels: &[usize]) -> Result<NetFloat, LossError> {
    let logits = logits
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| LossError::NotAMatrix {
            shape: logits.shape().to_vec(),
        })?;
    if logits.nrows() == 0 {
        return Err(LossError::EmptyBatch);
    }
    sparse_softmax_cross_entropy(logits, labels)?
        .mean()
        .ok_or(LossError::EmptyBatch)
}

/// Mean cross-entropy plus every weight-decay term, reported under the `loss` tag.
///
/// # Errors
/// See `cross_entropy_mean`
pub fn total_loss(
    logits: &ArrayD<NetFloat>,
    labels: &[usize],
    weight_decay: &LossCollection,
    summary: &mut dyn SummaryWriter,
) -> Result<NetFloat, LossError> {
    let loss = cross_entropy_mean(logits, labels)? + weight_decay.sum();
    summary.scalar("loss", loss);
    Ok(loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::RecordingSummaryWriter;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, Array2};
    use proptest::prelude::*;

    #[test]
    fn test_uniform_logits() {
        let logits = Array2::from_elem((3, 10), 1.5).into_dyn();
        let loss = cross_entropy_mean(&logits, &[0, 4, 9]).unwrap();
        assert_abs_diff_eq!(loss, (10. as NetFloat).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_known_values() {
        let logits = arr2(&[[0., 1000.], [2., 0.]]);
        let xent = sparse_softmax_cross_entropy(logits.view(), &[0, 0]).unwrap();
        assert_abs_diff_eq!(xent[0], 1000., epsilon = 1e-9);
        assert_abs_diff_eq!(xent[1], (1. + (-2. as NetFloat).exp()).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_total_adds_weight_decay() {
        let logits = Array2::zeros((2, 4)).into_dyn();
        let mut weight_decay = LossCollection::default();
        weight_decay.add("conv1/weight_loss".to_string(), 0.25);
        weight_decay.add("fc1/weight_loss".to_string(), 0.5);
        let mut summary = RecordingSummaryWriter::default();
        let loss = total_loss(&logits, &[1, 2], &weight_decay, &mut summary).unwrap();
        assert_abs_diff_eq!(loss, (4. as NetFloat).ln() + 0.75, epsilon = 1e-12);
        assert_eq!(summary.last("loss"), Some(loss));
    }

    #[test]
    fn test_empty_collection_is_cross_entropy() {
        let logits = arr2(&[[0.3, -1.2, 2.], [1., 1., 0.]]).into_dyn();
        let labels = [2, 0];
        let mut summary = RecordingSummaryWriter::default();
        let loss = total_loss(&logits, &labels, &LossCollection::default(), &mut summary).unwrap();
        assert_eq!(loss, cross_entropy_mean(&logits, &labels).unwrap());
    }

    #[test]
    fn test_errors() {
        let logits = Array2::<NetFloat>::zeros((2, 3));
        assert_eq!(
            cross_entropy_mean(&logits.clone().into_dyn(), &[0]),
            Err(LossError::BatchMismatch { logits: 2, labels: 1 })
        );
        assert_eq!(
            cross_entropy_mean(&logits.into_dyn(), &[0, 3]),
            Err(LossError::LabelOutOfRange { label: 3, num_classes: 3 })
        );
        assert_eq!(
            cross_entropy_mean(&Array2::<NetFloat>::zeros((0, 3)).into_dyn(), &[]),
            Err(LossError::EmptyBatch)
        );
        assert_eq!(
            cross_entropy_mean(&Array2::<NetFloat>::zeros((2, 0)).into_dyn(), &[0, 0]),
            Err(LossError::EmptyLogits)
        );
        assert!(matches!(
            cross_entropy_mean(&ndarray::Array1::<NetFloat>::zeros(3).into_dyn(), &[0]),
            Err(LossError::NotAMatrix { .. })
        ));
    }

    #[test]
    fn test_nan_logits() {
        let logits = arr2(&[[0., 1., 2.], [0., NetFloat::NAN, 1.]]);
        let err = sparse_softmax_cross_entropy(logits.view(), &[0, 1]).unwrap_err();
        assert_eq!(err, LossError::NaNLogits { row: 1 });
        assert_eq!(err.to_string(), "logits of example 1 contain NaN");
    }

    proptest! {
        #[test]
        fn test_cross_entropy_is_non_negative(
            logits in crate::test_util::array1(6),
            label in 0usize..6,
        ) {
            let logits = logits.into_shape((1, 6)).unwrap();
            let xent = sparse_softmax_cross_entropy(logits.view(), &[label]).unwrap();
            prop_assert!(xent[0] >= -1e-12);
        }
    }
}
