use crate::graph::{
    Engine, ExecuteError, ExecutionContext, Graph, GraphError, Operation, RepresentationId,
};
use crate::tensorshape::TensorShape;
use crate::NetFloat;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct DNN {
    graph: Graph,
    input_representation_ids: Vec<RepresentationId>,
    output_representation_ids: Vec<RepresentationId>,
    input_shapes: Vec<TensorShape>,
}

impl DNN {
    pub fn new(
        graph: Graph,
        input_representation_ids: Vec<RepresentationId>,
        output_representation_ids: Vec<RepresentationId>,
        input_shapes: Vec<TensorShape>,
    ) -> Self {
        Self {
            graph,
            input_representation_ids,
            output_representation_ids,
            input_shapes,
        }
    }

    /// Chains `layers` so that layer `i` reads representation `i` and writes `i + 1`.
    ///
    /// # Errors
    /// If a layer cannot consume the shape produced by its predecessor
    pub fn from_sequential(
        layers: &[Box<dyn Operation>],
        input_shape: TensorShape,
    ) -> Result<Self, GraphError> {
        let mut graph = Graph::default();
        let mut shape = input_shape.clone();
        for (i, layer) in layers.iter().enumerate() {
            shape = layer
                .output_shapes(&[shape])?
                .pop()
                .ok_or(GraphError::WrongInputCount {
                    expected: 1,
                    given: 0,
                })?;
            graph.add_operation(
                format!("layer{}", i),
                layer.clone(),
                vec![i],
                vec![i + 1],
            )?;
        }
        Ok(Self {
            graph,
            input_representation_ids: vec![0],
            output_representation_ids: vec![layers.len()],
            input_shapes: vec![input_shape],
        })
    }

    pub const fn get_input_representation_ids(&self) -> &Vec<RepresentationId> {
        &self.input_representation_ids
    }

    pub const fn get_output_representation_ids(&self) -> &Vec<RepresentationId> {
        &self.output_representation_ids
    }

    pub const fn get_graph(&self) -> &Graph {
        &self.graph
    }

    pub fn input_shapes(&self) -> &[TensorShape] {
        &self.input_shapes
    }

    /// # Errors
    /// If the static shapes do not propagate through the graph
    pub fn output_shapes(&self) -> Result<Vec<TensorShape>, ExecuteError> {
        let inputs = self
            .input_representation_ids
            .iter()
            .copied()
            .zip(self.input_shapes.iter().cloned())
            .collect::<Vec<_>>();
        Ok(Engine::new(&self.graph)
            .run_shapes(&self.output_representation_ids, &inputs)?
            .into_iter()
            .map(|(_, shape)| shape)
            .collect())
    }

    /// Whether any operation needs the mode flag fed to run.
    pub fn requires_mode(&self) -> bool {
        self.graph
            .get_operations()
            .iter()
            .any(|node| node.get_operation().requires_mode())
    }

    pub fn num_params(&self) -> usize {
        self.graph
            .get_operations()
            .iter()
            .map(|node| node.get_operation().num_params())
            .sum()
    }

    /// # Errors
    /// If the number of inputs is wrong, an input does not fit its static shape, or an operation fails
    pub fn forward(
        &self,
        inputs: &[ArrayD<NetFloat>],
        ctx: &mut ExecutionContext,
    ) -> Result<Vec<ArrayD<NetFloat>>, ExecuteError> {
        if inputs.len() != self.input_representation_ids.len() {
            return Err(ExecuteError::IncorrectInputCount {
                expected: self.input_representation_ids.len(),
                given: inputs.len(),
            });
        }
        if let Some((shape, input)) = self
            .input_shapes
            .iter()
            .zip(inputs)
            .find(|(shape, input)| !shape.matches(input.shape()))
        {
            return Err(ExecuteError::ShapeMismatch {
                expected: shape.clone(),
                given: input.shape().to_vec(),
            });
        }
        let inputs = self
            .input_representation_ids
            .iter()
            .copied()
            .zip(inputs.iter().cloned())
            .collect::<Vec<_>>();
        let res = Engine::new(&self.graph).run(&self.output_representation_ids, &inputs, ctx)?;
        Ok(res.into_iter().map(|(_, output)| output).collect())
    }
}

impl fmt::Display for DNN {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let layers: Vec<String> = self
            .graph
            .get_operations()
            .iter()
            .map(|node| format!("{}", node.get_operation()))
            .collect();
        let inputs: Vec<String> = self.input_shapes.iter().map(ToString::to_string).collect();
        write!(f, "Input {} => {}", inputs.join(", "), layers.join(" => "))
    }
}
