use crate::graph::{single_input, single_shape, ExecuteError, ExecutionContext, GraphError, Operation};
use crate::tensorshape::TensorShape;
use crate::NetFloat;
use ndarray::{s, Array4, ArrayD, ArrayView4, Ix4};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Max pooling over the spatial axes of NHWC data, without padding.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct MaxPool {
    window: (usize, usize),
    strides: (usize, usize),
}

impl MaxPool {
    pub const fn new(window: (usize, usize), strides: (usize, usize)) -> Self {
        Self { window, strides }
    }

    /// `None` if the window does not fit or a window or stride size is zero.
    fn out_size(&self, h_in: usize, w_in: usize) -> Option<(usize, usize)> {
        if self.window.0 == 0 || self.window.1 == 0 {
            return None;
        }
        Some((
            h_in.checked_sub(self.window.0)?.checked_div(self.strides.0)? + 1,
            w_in.checked_sub(self.window.1)?.checked_div(self.strides.1)? + 1,
        ))
    }

    pub fn pool(&self, data: ArrayView4<NetFloat>) -> Array4<NetFloat> {
        let (batch, h_in, w_in, channels) = data.dim();
        let (h_out, w_out) = self.out_size(h_in, w_in).unwrap_or((0, 0));
        Array4::from_shape_fn((batch, h_out, w_out, channels), |(n, y, x, c)| {
            let y_0 = y * self.strides.0;
            let x_0 = x * self.strides.1;
            data.slice(s![n, y_0..y_0 + self.window.0, x_0..x_0 + self.window.1, c])
                .fold(NetFloat::NEG_INFINITY, |acc, &v| acc.max(v))
        })
    }
}

#[typetag::serde]
impl Operation for MaxPool {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_shapes(&self, input_shapes: &[TensorShape]) -> Result<Vec<TensorShape>, GraphError> {
        let shape = single_shape(input_shapes)?;
        if self.strides.0 == 0 || self.strides.1 == 0 {
            return Err(GraphError::ZeroSized {
                name: "stride".to_string(),
            });
        }
        let spatial = match shape.dims() {
            [_, Some(h), Some(w), _] => self.out_size(*h, *w),
            _ => None,
        };
        let (h_out, w_out) = spatial.ok_or_else(|| GraphError::IncompatibleShape {
            expected: TensorShape::new(vec![None, Some(self.window.0), Some(self.window.1), None]),
            given: shape.clone(),
        })?;
        Ok(vec![TensorShape::new(vec![
            shape[0],
            Some(h_out),
            Some(w_out),
            shape[3],
        ])])
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
            .filter(|data| self.out_size(data.dim().1, data.dim().2).is_some())
            .ok_or_else(|| ExecuteError::ShapeMismatch {
                expected: TensorShape::new(vec![None, None, None, None]),
                given: input.shape().to_vec(),
            })?;
        Ok(vec![self.pool(data).into_dyn()])
    }
}

impl fmt::Display for MaxPool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "MaxPool {}x{}/{}",
            self.window.0, self.window.1, self.strides.0
        )
    }
}
