#![allow(clippy::module_name_repetitions)]
//! 2D convolution over NHWC batches
use crate::graph::{single_input, single_shape, ExecuteError, ExecutionContext, GraphError, Operation};
use crate::tensorshape::TensorShape;
use crate::util::he_normal;
use crate::NetFloat;
use itertools::Itertools;
use ndarray::{s, Array1, Array4, ArrayD, ArrayView4, Ix4};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Padding {
    /// Output spatial size is `ceil(in / stride)`; odd padding goes to the bottom/right.
    Same,
    /// No padding.
    Valid,
}

impl Padding {
    /// Returns `(out, pad_before, pad_after)` for one spatial axis, or `None`
    /// if any of the sizes is zero or the kernel does not fit.
    pub fn resolve(self, size_in: usize, kernel: usize, stride: usize) -> Option<(usize, usize, usize)> {
        if size_in == 0 || kernel == 0 || stride == 0 {
            return None;
        }
        match self {
            Self::Same => {
                let out = (size_in + stride - 1) / stride;
                let total = ((out - 1) * stride + kernel).saturating_sub(size_in);
                Some((out, total / 2, total - total / 2))
            }
            Self::Valid => Some((size_in.checked_sub(kernel)? / stride + 1, 0, 0)),
        }
    }
}

/// Weights are of the shape: (`kernel_h`, `kernel_w`, `channels_in`, `channels_out`)
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Conv {
    kernel: Array4<NetFloat>,       // (K_h, K_w, C_in, C_out) following tf convention
    bias: Array1<NetFloat>,         // (C_out)
    input_shape: TensorShape,       // (None, H, W, C_in)
    strides: (usize, usize),        // (y, x)
    padding: ((usize, usize), (usize, usize)), // ((top, bottom), (left, right))
}

impl Conv {
    /// # Errors
    /// If `input_shape` is not `[batch, H, W, C_in]` with known spatial dimensions matching the kernel
    pub fn new(
        kernel: Array4<NetFloat>,
        bias: Array1<NetFloat>,
        input_shape: TensorShape,
        strides: (usize, usize),
        padding: Padding,
    ) -> Result<Self, GraphError> {
        let (k_h, k_w, c_in, c_out) = kernel.dim();
        let expected = TensorShape::new(vec![None, None, None, Some(c_in)]);
        let (h_in, w_in) = match (input_shape.rank(), input_shape.dims().get(1..3)) {
            (4, Some(&[Some(h), Some(w)])) if input_shape.is_compatible_with(&expected) => (h, w),
            _ => {
                return Err(GraphError::IncompatibleShape {
                    expected,
                    given: input_shape.clone(),
                })
            }
        };
        if bias.len() != c_out {
            return Err(GraphError::IncompatibleShape {
                expected: TensorShape::from(vec![c_out]),
                given: TensorShape::from(vec![bias.len()]),
            });
        }
        if c_out == 0 {
            return Err(GraphError::ZeroSized {
                name: "output channels".to_string(),
            });
        }
        if strides.0 == 0 || strides.1 == 0 {
            return Err(GraphError::ZeroSized {
                name: "stride".to_string(),
            });
        }
        let resolved = padding
            .resolve(h_in, k_h, strides.0)
            .zip(padding.resolve(w_in, k_w, strides.1));
        let ((_, top, bottom), (_, left, right)) = match resolved {
            Some(resolved) if c_in > 0 => resolved,
            _ => {
                return Err(GraphError::IncompatibleShape {
                    expected: TensorShape::new(vec![None, Some(k_h), Some(k_w), Some(c_in)]),
                    given: input_shape,
                })
            }
        };
        Ok(Self {
            kernel,
            bias,
            input_shape,
            strides,
            padding: ((top, bottom), (left, right)),
        })
    }

    /// He-normal kernel, zero bias.
    ///
    /// # Errors
    /// See [`Conv::new`]
    pub fn he_normal<R: Rng>(
        kernel_shape: (usize, usize, usize, usize),
        input_shape: TensorShape,
        strides: (usize, usize),
        padding: Padding,
        rng: &mut R,
    ) -> Result<Self, GraphError> {
        let (k_h, k_w, c_in, c_out) = kernel_shape;
        let kernel = he_normal(kernel_shape, k_h * k_w * c_in, rng);
        Self::new(kernel, Array1::zeros(c_out), input_shape, strides, padding)
    }

    pub fn kernel(&self) -> &Array4<NetFloat> {
        &self.kernel
    }

    pub fn bias(&self) -> &Array1<NetFloat> {
        &self.bias
    }

    /// `sum(kernel^2) / 2`
    pub fn l2_loss(&self) -> NetFloat {
        self.kernel.iter().map(|w| w * w).sum::<NetFloat>() / 2.
    }

    fn spatial_in(&self) -> (usize, usize) {
        (
            self.input_shape[1].unwrap_or_default(),
            self.input_shape[2].unwrap_or_default(),
        )
    }

    fn spatial_out(&self) -> (usize, usize) {
        let (h_in, w_in) = self.spatial_in();
        let (k_h, k_w, _, _) = self.kernel.dim();
        let ((top, bottom), (left, right)) = self.padding;
        (
            (h_in + top + bottom - k_h) / self.strides.0 + 1,
            (w_in + left + right - k_w) / self.strides.1 + 1,
        )
    }

    pub fn output_shape(&self) -> TensorShape {
        let (h_out, w_out) = self.spatial_out();
        TensorShape::new(vec![
            self.input_shape[0],
            Some(h_out),
            Some(w_out),
            Some(self.kernel.dim().3),
        ])
    }

    pub fn convolve(&self, data: ArrayView4<NetFloat>) -> Array4<NetFloat> {
        let batch = data.dim().0;
        let (h_in, w_in) = self.spatial_in();
        let (h_out, w_out) = self.spatial_out();
        let (k_h, k_w, _, c_out) = self.kernel.dim();
        let ((top, _), (left, _)) = self.padding;

        let mut output = Array4::<NetFloat>::zeros((batch, h_out, w_out, c_out));
        output += &self.bias;

        for (n, y_out, x_out) in iproduct_nhw(batch, h_out, w_out) {
            let y_0 = y_out * self.strides.0;
            let x_0 = x_out * self.strides.1;
            let mut pixel = output.slice_mut(s![n, y_out, x_out, ..]);

            for k_y in 0..k_h {
                if y_0 + k_y < top || y_0 + k_y >= h_in + top {
                    // Assumption that padding value is 0, so continue;
                    continue;
                }
                let y_in = y_0 + k_y - top;
                for k_x in 0..k_w {
                    if x_0 + k_x < left || x_0 + k_x >= w_in + left {
                        continue;
                    }
                    let x_in = x_0 + k_x - left;
                    let patch = data.slice(s![n, y_in, x_in, ..]);
                    pixel += &patch.dot(&self.kernel.slice(s![k_y, k_x, .., ..]));
                }
            }
        }
        output
    }
}

fn iproduct_nhw(
    batch: usize,
    height: usize,
    width: usize,
) -> impl Iterator<Item = (usize, usize, usize)> {
    (0..batch)
        .cartesian_product(0..height)
        .cartesian_product(0..width)
        .map(|((n, y), x)| (n, y, x))
}

#[typetag::serde]
impl Operation for Conv {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_shapes(&self, input_shapes: &[TensorShape]) -> Result<Vec<TensorShape>, GraphError> {
        let shape = single_shape(input_shapes)?;
        if !shape.is_compatible_with(&self.input_shape) {
            return Err(GraphError::IncompatibleShape {
                expected: self.input_shape.clone(),
                given: shape.clone(),
            });
        }
        let mut output = self.output_shape();
        if let Some(batch) = shape[0] {
            output = TensorShape::new(
                std::iter::once(Some(batch))
                    .chain(output.dims()[1..].iter().copied())
                    .collect(),
            );
        }
        Ok(vec![output])
    }

    fn forward(
        &self,
        inputs: &[&ArrayD<NetFloat>],
        _ctx: &mut ExecutionContext,
    ) -> Result<Vec<ArrayD<NetFloat>>, ExecuteError> {
        let input = single_input(inputs)?;
        let data = input
            .view()
            .into_dimensionality::<Ix4>()
            .ok()
            .filter(|data| self.input_shape.matches(data.shape()))
            .ok_or_else(|| ExecuteError::ShapeMismatch {
                expected: self.input_shape.clone(),
                given: input.shape().to_vec(),
            })?;
        Ok(vec![self.convolve(data).into_dyn()])
    }

    fn num_params(&self) -> usize {
        self.kernel.len() + self.bias.len()
    }
}

impl fmt::Display for Conv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Conv {}x{}, {}",
            self.kernel.shape()[0],
            self.kernel.shape()[1],
            self.kernel.shape()[3]
        )
    }
}
