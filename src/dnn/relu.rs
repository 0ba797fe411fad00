use crate::graph::{single_input, single_shape, ExecuteError, ExecutionContext, GraphError, Operation};
use crate::tensorshape::TensorShape;
use crate::NetFloat;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReLU {}

impl ReLU {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Display for ReLU {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "ReLU")
    }
}

#[typetag::serde]
impl Operation for ReLU {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn output_shapes(
        &self,
        input_shapes: &[TensorShape],
    ) -> std::result::Result<Vec<TensorShape>, GraphError> {
        Ok(vec![single_shape(input_shapes)?.clone()])
    }

    fn forward(
        &self,
        inputs: &[&ArrayD<NetFloat>],
        _ctx: &mut ExecutionContext,
    ) -> std::result::Result<Vec<ArrayD<NetFloat>>, ExecuteError> {
        let input = single_input(inputs)?;
        Ok(vec![input.mapv(|x| if x.lt(&0.) { 0. } else { x })])
    }
}
