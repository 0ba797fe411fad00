//! Binomial direct dropout.
//!
//! Training applies inverted dropout: every neuron is kept with probability
//! `keep_prob` and survivors are scaled by `1 / keep_prob`. Evaluation scales
//! the whole layer by `1 - P(X = n * keep_prob)` with `X ~ Binomial(n, keep_prob)`
//! and `n` the number of neurons of one example.
use crate::binomial::Binomial;
use crate::graph::{
    single_input, single_shape, Cond, ExecuteError, ExecutionContext, GraphError, Operation,
};
use crate::tensorshape::TensorShape;
use crate::NetFloat;
use log::debug;
use ndarray::ArrayD;
use rand::distributions::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Train,
    Eval,
}

/// How a dropout site decides between its training and evaluation behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropoutMode {
    /// Both branches are built and the mode flag fed to each run picks one.
    Switchable,
    /// Only the branch of the given phase is built.
    Fixed(Phase),
}

/// Inverted dropout.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DirectDropout {
    keep_prob: NetFloat,
}

impl DirectDropout {
    pub const fn new(keep_prob: NetFloat) -> Self {
        Self { keep_prob }
    }

    pub const fn keep_prob(&self) -> NetFloat {
        self.keep_prob
    }
}

#[typetag::serde]
impl Operation for DirectDropout {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_shapes(&self, input_shapes: &[TensorShape]) -> Result<Vec<TensorShape>, GraphError> {
        Ok(vec![single_shape(input_shapes)?.clone()])
    }

    fn forward(
        &self,
        inputs: &[&ArrayD<NetFloat>],
        ctx: &mut ExecutionContext,
    ) -> Result<Vec<ArrayD<NetFloat>>, ExecuteError> {
        let input = single_input(inputs)?;
        let keep = Bernoulli::new(self.keep_prob).map_err(|_| ExecuteError::InvalidProbability {
            prob: self.keep_prob,
        })?;
        let rng = ctx.rng();
        let inv_keep = 1. / self.keep_prob;
        Ok(vec![input.mapv(|x| {
            if keep.sample(&mut *rng) {
                x * inv_keep
            } else {
                0.
            }
        })])
    }
}

impl fmt::Display for DirectDropout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DirectDropout {}", self.keep_prob)
    }
}

/// Deterministic evaluation branch. The scale only depends on the neuron
/// count and the keep probability, so it is computed once here and never
/// serialized.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(from = "BinomialScaleParams", into = "BinomialScaleParams")]
pub struct BinomialScale {
    keep_prob: NetFloat,
    num_neurons: usize,
    scale: NetFloat,
}

#[derive(Clone, Copy, Deserialize, Serialize)]
struct BinomialScaleParams {
    keep_prob: NetFloat,
    num_neurons: usize,
}

impl From<BinomialScaleParams> for BinomialScale {
    fn from(params: BinomialScaleParams) -> Self {
        Self::new(params.num_neurons, params.keep_prob)
    }
}

impl From<BinomialScale> for BinomialScaleParams {
    fn from(op: BinomialScale) -> Self {
        Self {
            keep_prob: op.keep_prob,
            num_neurons: op.num_neurons,
        }
    }
}

impl BinomialScale {
    pub fn new(num_neurons: usize, keep_prob: NetFloat) -> Self {
        let dist = Binomial::new(num_neurons as NetFloat, keep_prob);
        let p_exact = dist.prob(dist.mean());
        debug!(
            "P(X = {}) = {} for X ~ Binomial({}, {})",
            dist.mean(),
            p_exact,
            num_neurons,
            keep_prob
        );
        Self {
            keep_prob,
            num_neurons,
            scale: 1. - p_exact,
        }
    }

    /// # Errors
    /// `UnknownDimension` if the neuron count of `shape` is not statically known
    pub fn from_shape(shape: &TensorShape, keep_prob: NetFloat) -> Result<Self, GraphError> {
        let num_neurons = shape
            .num_neurons()
            .ok_or_else(|| GraphError::UnknownDimension {
                shape: shape.clone(),
            })?;
        Ok(Self::new(num_neurons, keep_prob))
    }

    pub const fn keep_prob(&self) -> NetFloat {
        self.keep_prob
    }

    pub const fn num_neurons(&self) -> usize {
        self.num_neurons
    }

    pub const fn scale(&self) -> NetFloat {
        self.scale
    }
}

#[typetag::serde]
impl Operation for BinomialScale {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_shapes(&self, input_shapes: &[TensorShape]) -> Result<Vec<TensorShape>, GraphError> {
        let shape = single_shape(input_shapes)?;
        match shape.num_neurons() {
            Some(n) if n == self.num_neurons => Ok(vec![shape.clone()]),
            Some(_) => Err(GraphError::IncompatibleShape {
                expected: TensorShape::new(vec![None, Some(self.num_neurons)]),
                given: shape.clone(),
            }),
            None => Err(GraphError::UnknownDimension {
                shape: shape.clone(),
            }),
        }
    }

    fn forward(
        &self,
        inputs: &[&ArrayD<NetFloat>],
        _ctx: &mut ExecutionContext,
    ) -> Result<Vec<ArrayD<NetFloat>>, ExecuteError> {
        let input = single_input(inputs)?;
        let per_example: usize = input.shape().iter().skip(1).product();
        if input.ndim() == 0 || per_example != self.num_neurons {
            return Err(ExecuteError::ShapeMismatch {
                expected: TensorShape::new(vec![None, Some(self.num_neurons)]),
                given: input.shape().to_vec(),
            });
        }
        Ok(vec![input * self.scale])
    }
}

impl fmt::Display for BinomialScale {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "BinomialScale n={} p={} ({})",
            self.num_neurons, self.keep_prob, self.scale
        )
    }
}

/// Builds the dropout operation for a representation of `input_shape`.
///
/// The evaluation branch needs the neuron count of `input_shape`, so any mode
/// that builds it fails on shapes with unknown non-batch dimensions.
///
/// # Errors
/// `UnknownDimension` as above
pub fn binomial_direct_drop(
    input_shape: &TensorShape,
    keep_prob: NetFloat,
    mode: DropoutMode,
) -> Result<Box<dyn Operation>, GraphError> {
    Ok(match mode {
        DropoutMode::Switchable => Box::new(Cond::new(
            Box::new(DirectDropout::new(keep_prob)),
            Box::new(BinomialScale::from_shape(input_shape, keep_prob)?),
        )),
        DropoutMode::Fixed(Phase::Train) => Box::new(DirectDropout::new(keep_prob)),
        DropoutMode::Fixed(Phase::Eval) => {
            Box::new(BinomialScale::from_shape(input_shape, keep_prob)?)
        }
    })
}
