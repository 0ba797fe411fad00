use super::execute_engine::ExecuteError;
use super::graph::GraphError;
use super::operation::{ExecutionContext, Operation};
use crate::tensorshape::TensorShape;
use crate::NetFloat;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Two prebuilt branches rooted at the same inputs. Every execution runs
/// exactly one of them, chosen by the mode flag fed to that execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cond {
    if_training: Box<dyn Operation>,
    if_eval: Box<dyn Operation>,
}

impl Cond {
    pub fn new(if_training: Box<dyn Operation>, if_eval: Box<dyn Operation>) -> Self {
        Self {
            if_training,
            if_eval,
        }
    }

    pub fn if_training(&self) -> &dyn Operation {
        self.if_training.as_ref()
    }

    pub fn if_eval(&self) -> &dyn Operation {
        self.if_eval.as_ref()
    }

    pub fn select(&self, is_training: bool) -> &dyn Operation {
        if is_training {
            self.if_training()
        } else {
            self.if_eval()
        }
    }
}

#[typetag::serde]
impl Operation for Cond {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_shapes(&self, input_shapes: &[TensorShape]) -> Result<Vec<TensorShape>, GraphError> {
        let if_training = self.if_training.output_shapes(input_shapes)?;
        let if_eval = self.if_eval.output_shapes(input_shapes)?;
        if if_training != if_eval {
            return Err(GraphError::BranchShapeMismatch {
                if_training,
                if_eval,
            });
        }
        Ok(if_training)
    }

    fn forward(
        &self,
        inputs: &[&ArrayD<NetFloat>],
        ctx: &mut ExecutionContext,
    ) -> Result<Vec<ArrayD<NetFloat>>, ExecuteError> {
        let is_training = ctx.is_training().ok_or(ExecuteError::ModeNotFed)?;
        self.select(is_training).forward(inputs, ctx)
    }

    fn num_params(&self) -> usize {
        self.if_training.num_params() + self.if_eval.num_params()
    }

    fn requires_mode(&self) -> bool {
        true
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Cond({} | {})", self.if_training, self.if_eval)
    }
}
