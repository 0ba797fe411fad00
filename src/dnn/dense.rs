use crate::graph::{single_input, single_shape, ExecuteError, ExecutionContext, GraphError, Operation};
use crate::tensorshape::TensorShape;
use crate::util::he_normal;
use crate::NetFloat;
use ndarray::{Array1, Array2, ArrayD, Ix2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Fully-connected layer computing `x . W + b` on `[batch, in]` inputs.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Dense {
    weights: Array2<NetFloat>, // (in, out)
    bias: Array1<NetFloat>,    // (out)
}

impl Dense {
    /// # Errors
    /// If `bias` does not have one entry per output
    pub fn new(weights: Array2<NetFloat>, bias: Array1<NetFloat>) -> Result<Self, GraphError> {
        if weights.ncols() != bias.len() {
            return Err(GraphError::IncompatibleShape {
                expected: TensorShape::from(vec![weights.ncols()]),
                given: TensorShape::from(vec![bias.len()]),
            });
        }
        Ok(Self { weights, bias })
    }

    /// He-normal weights, zero bias.
    pub fn he_normal<R: Rng>(input_dim: usize, output_dim: usize, rng: &mut R) -> Self {
        Self {
            weights: he_normal((input_dim, output_dim), input_dim, rng),
            bias: Array1::zeros(output_dim),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> &Array2<NetFloat> {
        &self.weights
    }

    pub fn bias(&self) -> &Array1<NetFloat> {
        &self.bias
    }

    /// `sum(weights^2) / 2`
    pub fn l2_loss(&self) -> NetFloat {
        self.weights.iter().map(|w| w * w).sum::<NetFloat>() / 2.
    }
}

#[typetag::serde]
impl Operation for Dense {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_shapes(&self, input_shapes: &[TensorShape]) -> Result<Vec<TensorShape>, GraphError> {
        let shape = single_shape(input_shapes)?;
        let expected = TensorShape::new(vec![None, Some(self.input_dim())]);
        if !shape.is_compatible_with(&expected) {
            return Err(GraphError::IncompatibleShape {
                expected,
                given: shape.clone(),
            });
        }
        Ok(vec![TensorShape::new(vec![shape[0], Some(self.output_dim())])])
    }

    fn forward(
        &self,
        inputs: &[&ArrayD<NetFloat>],
        _ctx: &mut ExecutionContext,
    ) -> Result<Vec<ArrayD<NetFloat>>, ExecuteError> {
        let input = single_input(inputs)?;
        let data = input
            .view()
            .into_dimensionality::<Ix2>()
            .ok()
            .filter(|data| data.ncols() == self.input_dim())
            .ok_or_else(|| ExecuteError::ShapeMismatch {
                expected: TensorShape::new(vec![None, Some(self.input_dim())]),
                given: input.shape().to_vec(),
            })?;
        Ok(vec![(data.dot(&self.weights) + &self.bias).into_dyn()])
    }

    fn num_params(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

impl fmt::Display for Dense {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Dense {}", self.output_dim())
    }
}
