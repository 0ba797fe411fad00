use super::execute_engine::ExecuteError;
use super::graph::GraphError;
use crate::tensorshape::TensorShape;
use crate::NetFloat;
use dyn_clone::DynClone;
use ndarray::ArrayD;
use rand::RngCore;
use std::any::Any;
use std::fmt::{Debug, Display};

/// Per-execution state shared by every operation of a run: the fed value of
/// the mode flag (if any) and the source of randomness.
pub struct ExecutionContext<'a> {
    is_training: Option<bool>,
    rng: &'a mut dyn RngCore,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(is_training: Option<bool>, rng: &'a mut dyn RngCore) -> Self {
        Self { is_training, rng }
    }

    pub const fn is_training(&self) -> Option<bool> {
        self.is_training
    }

    pub fn rng(&mut self) -> &mut dyn RngCore {
        &mut *self.rng
    }
}

/// Operations may not hold mutable state. Randomness and the mode flag come
/// from the `ExecutionContext`.
#[typetag::serde(tag = "type")]
pub trait Operation: DynClone + Display + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// # Errors
    /// If the inputs cannot be consumed by this operation
    fn output_shapes(&self, input_shapes: &[TensorShape]) -> Result<Vec<TensorShape>, GraphError>;

    /// # Errors
    /// If the concrete inputs do not fit the operation or the run is missing state it needs
    fn forward(
        &self,
        inputs: &[&ArrayD<NetFloat>],
        ctx: &mut ExecutionContext,
    ) -> Result<Vec<ArrayD<NetFloat>>, ExecuteError>;

    fn num_params(&self) -> usize {
        0
    }

    /// Whether `forward` needs the mode flag to be fed.
    fn requires_mode(&self) -> bool {
        false
    }
}

// This implements `Clone` for the trait
dyn_clone::clone_trait_object!(Operation);

/// # Errors
/// `IncorrectInputCount` unless exactly one input is given
pub fn single_input<'a>(
    inputs: &[&'a ArrayD<NetFloat>],
) -> Result<&'a ArrayD<NetFloat>, ExecuteError> {
    match inputs {
        [input] => Ok(*input),
        _ => Err(ExecuteError::IncorrectInputCount {
            expected: 1,
            given: inputs.len(),
        }),
    }
}

/// # Errors
/// `WrongInputCount` unless exactly one shape is given
pub fn single_shape(input_shapes: &[TensorShape]) -> Result<&TensorShape, GraphError> {
    match input_shapes {
        [shape] => Ok(shape),
        _ => Err(GraphError::WrongInputCount {
            expected: 1,
            given: input_shapes.len(),
        }),
    }
}
