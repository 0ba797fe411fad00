use crate::graph::{single_input, single_shape, ExecuteError, ExecutionContext, GraphError, Operation};
use crate::tensorshape::TensorShape;
use crate::NetFloat;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Collapses every non-batch dimension: `[batch, ...] -> [batch, prod(...)]`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Flatten {}

impl Flatten {
    pub const fn new() -> Self {
        Self {}
    }
}

#[typetag::serde]
impl Operation for Flatten {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_shapes(&self, input_shapes: &[TensorShape]) -> Result<Vec<TensorShape>, GraphError> {
        let shape = single_shape(input_shapes)?;
        let batch = shape.dims().first().copied().flatten();
        Ok(vec![TensorShape::new(vec![batch, shape.num_neurons()])])
    }

    fn forward(
        &self,
        inputs: &[&ArrayD<NetFloat>],
        _ctx: &mut ExecutionContext,
    ) -> Result<Vec<ArrayD<NetFloat>>, ExecuteError> {
        let input = single_input(inputs)?;
        let batch = input.shape().first().copied().unwrap_or(1);
        let features = input.shape().iter().skip(1).product::<usize>();
        let output = ArrayD::from_shape_vec(IxDyn(&[batch, features]), input.iter().copied().collect())
            .map_err(|_| ExecuteError::ShapeMismatch {
                expected: TensorShape::new(vec![None, Some(features)]),
                given: input.shape().to_vec(),
            })?;
        Ok(vec![output])
    }
}

impl fmt::Display for Flatten {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Flatten")
    }
}
