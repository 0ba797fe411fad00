//! "factory" for building sequential graphs layer by layer
use super::conv::{Conv, Padding};
use super::dense::Dense;
use super::dnn::DNN;
use super::dropout::{binomial_direct_drop, DropoutMode};
use super::flatten::Flatten;
use super::maxpool::MaxPool;
use super::relu::ReLU;
use crate::graph::{Graph, GraphError, Operation, RepresentationId};
use crate::losses::LossCollection;
use crate::tensorshape::TensorShape;
use crate::NetFloat;
use log::debug;
use rand::Rng;

/// Appends operations to the end of a single chain, tracking the static shape
/// of the current representation and the weight-decay terms of the layers it creates.
pub struct DNNBuilder {
    graph: Graph,
    input_shape: TensorShape,
    current: RepresentationId,
    shape: TensorShape,
    losses: LossCollection,
}

impl DNNBuilder {
    pub fn new(input_shape: TensorShape) -> Self {
        Self {
            graph: Graph::default(),
            shape: input_shape.clone(),
            input_shape,
            current: 0,
            losses: LossCollection::default(),
        }
    }

    /// Static shape of the last representation of the chain.
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn losses(&self) -> &LossCollection {
        &self.losses
    }

    /// # Errors
    /// If `op` cannot consume the current shape
    pub fn push(&mut self, scope: &str, op: Box<dyn Operation>) -> Result<RepresentationId, GraphError> {
        let shape = op
            .output_shapes(&[self.shape.clone()])?
            .pop()
            .ok_or(GraphError::WrongInputCount {
                expected: 1,
                given: 0,
            })?;
        debug!("{}: {} -> {}", scope, op, shape);
        let output = self.current + 1;
        self.graph
            .add_operation(scope.to_string(), op, vec![self.current], vec![output])?;
        self.current = output;
        self.shape = shape;
        Ok(output)
    }

    fn add_weight_decay(&mut self, scope: &str, l2_loss: NetFloat, weight_decay: NetFloat) {
        if weight_decay != 0. {
            self.losses
                .add(format!("{}/weight_loss", scope), weight_decay * l2_loss);
        }
    }

    /// Square `kernel x kernel` convolution with He-normal initialization.
    ///
    /// # Errors
    /// If the current shape is not `[batch, H, W, C]` with known spatial dimensions
    pub fn conv<R: Rng>(
        &mut self,
        scope: &str,
        kernel: usize,
        out_channels: usize,
        stride: usize,
        padding: Padding,
        weight_decay: NetFloat,
        rng: &mut R,
    ) -> Result<RepresentationId, GraphError> {
        let in_channels = match self.shape.dims() {
            [_, _, _, Some(c)] => *c,
            _ => {
                return Err(GraphError::IncompatibleShape {
                    expected: TensorShape::new(vec![None, None, None, None]),
                    given: self.shape.clone(),
                })
            }
        };
        let conv = Conv::he_normal(
            (kernel, kernel, in_channels, out_channels),
            self.shape.clone(),
            (stride, stride),
            padding,
            rng,
        )?;
        let l2_loss = conv.l2_loss();
        let output = self.push(&format!("{}/Conv", scope), Box::new(conv))?;
        self.add_weight_decay(scope, l2_loss, weight_decay);
        Ok(output)
    }

    /// # Errors
    /// If the current shape is not `[batch, features]` with known features or
    /// `output_dim` is zero
    pub fn dense<R: Rng>(
        &mut self,
        scope: &str,
        output_dim: usize,
        weight_decay: NetFloat,
        rng: &mut R,
    ) -> Result<RepresentationId, GraphError> {
        let input_dim = match self.shape.dims() {
            [_, Some(features)] => *features,
            _ => {
                return Err(GraphError::IncompatibleShape {
                    expected: TensorShape::new(vec![None, None]),
                    given: self.shape.clone(),
                })
            }
        };
        if output_dim == 0 {
            return Err(GraphError::ZeroSized {
                name: format!("{} output dimension", scope),
            });
        }
        let dense = Dense::he_normal(input_dim, output_dim, rng);
        let l2_loss = dense.l2_loss();
        let output = self.push(&format!("{}/Dense", scope), Box::new(dense))?;
        self.add_weight_decay(scope, l2_loss, weight_decay);
        Ok(output)
    }

    /// # Errors
    pub fn relu(&mut self, scope: &str) -> Result<RepresentationId, GraphError> {
        self.push(&format!("{}/ReLU", scope), Box::new(ReLU::new()))
    }

    /// # Errors
    /// If the spatial dimensions are smaller than the window
    pub fn max_pool(
        &mut self,
        scope: &str,
        window: usize,
        stride: usize,
    ) -> Result<RepresentationId, GraphError> {
        self.push(
            &format!("{}/MaxPool", scope),
            Box::new(MaxPool::new((window, window), (stride, stride))),
        )
    }

    /// # Errors
    pub fn flatten(&mut self, scope: &str) -> Result<RepresentationId, GraphError> {
        self.push(&format!("{}/Flatten", scope), Box::new(Flatten::new()))
    }

    /// # Errors
    /// `UnknownDimension` if the evaluation branch is built on a partially known shape
    pub fn binomial_direct_drop(
        &mut self,
        scope: &str,
        keep_prob: NetFloat,
        mode: DropoutMode,
    ) -> Result<RepresentationId, GraphError> {
        let op = binomial_direct_drop(&self.shape, keep_prob, mode)?;
        self.push(&format!("{}/BinomialDirectDrop", scope), op)
    }

    /// Returns the network and the weight-decay terms collected while building it.
    pub fn build(self) -> (DNN, LossCollection) {
        let dnn = DNN::new(self.graph, vec![0], vec![self.current], vec![self.input_shape]);
        (dnn, self.losses)
    }
}
