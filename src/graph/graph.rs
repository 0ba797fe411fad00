use super::operation::Operation;
use crate::tensorshape::TensorShape;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

pub type RepresentationId = usize;
pub type OperationId = usize;

#[derive(Clone, Debug, PartialEq)]
pub enum GraphError {
    AnotherOpProducesOutput {
        repr_id: RepresentationId,
    },
    NoOpCreatesRepresentation {
        repr_id: RepresentationId,
    },
    WrongInputCount {
        expected: usize,
        given: usize,
    },
    /// A neuron count was requested from a shape that is not fully known.
    UnknownDimension {
        shape: TensorShape,
    },
    IncompatibleShape {
        expected: TensorShape,
        given: TensorShape,
    },
    BranchShapeMismatch {
        if_training: Vec<TensorShape>,
        if_eval: Vec<TensorShape>,
    },
    /// A layer size, kernel, window or stride that must be positive is zero.
    ZeroSized {
        name: String,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::AnotherOpProducesOutput { repr_id } => {
                write!(f, "representation {} already has a producing operation", repr_id)
            }
            Self::NoOpCreatesRepresentation { repr_id } => {
                write!(f, "no operation creates representation {}", repr_id)
            }
            Self::WrongInputCount { expected, given } => {
                write!(f, "expected {} inputs, given {}", expected, given)
            }
            Self::UnknownDimension { shape } => {
                write!(f, "shape {} has unknown non-batch dimensions", shape)
            }
            Self::IncompatibleShape { expected, given } => {
                write!(f, "expected shape {}, given {}", expected, given)
            }
            Self::BranchShapeMismatch {
                if_training,
                if_eval,
            } => write!(
                f,
                "conditional branches disagree on output shapes: {:?} vs {:?}",
                if_training, if_eval
            ),
            Self::ZeroSized { name } => write!(f, "{} must be positive", name),
        }
    }
}

impl std::error::Error for GraphError {}

/// Each RepresentationId is created uniquely by a single OperationNode
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationNode {
    scope: String,
    operation: Box<dyn Operation>,
    inputs: Vec<RepresentationId>,
    outputs: Vec<RepresentationId>,
}

impl OperationNode {
    pub fn new(
        scope: String,
        operation: Box<dyn Operation>,
        inputs: Vec<RepresentationId>,
        outputs: Vec<RepresentationId>,
    ) -> Self {
        Self {
            scope,
            operation,
            inputs,
            outputs,
        }
    }

    /// Hierarchical name of the node, e.g. `conv1/Conv`.
    pub fn get_scope(&self) -> &str {
        &self.scope
    }

    pub fn get_operation(&self) -> &dyn Operation {
        self.operation.as_ref()
    }

    pub fn get_input_ids(&self) -> &Vec<RepresentationId> {
        &self.inputs
    }

    pub fn get_output_ids(&self) -> &Vec<RepresentationId> {
        &self.outputs
    }
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    representation_ops: HashMap<RepresentationId, OperationId>, // representation to idx of HashMap
    operation_nodes: Vec<OperationNode>,                        // topo sorted list of operations
}

impl Graph {
    /// Get the specific id of the operation that produces a specific representation
    ///
    /// # Arguments
    ///
    /// * `id` - Representation whose producing operation we are trying to retrieve
    pub fn get_representation_op_id(&self, id: RepresentationId) -> Option<OperationId> {
        self.representation_ops.get(&id).copied()
    }

    pub fn get_operation_node(&self, id: OperationId) -> Option<&OperationNode> {
        self.operation_nodes.get(id)
    }

    pub fn get_operations(&self) -> &[OperationNode] {
        &self.operation_nodes
    }

    /// # Errors
    /// If another operation already produces one of `outputs`
    pub fn add_operation(
        &mut self,
        scope: String,
        op: Box<dyn Operation>,
        inputs: Vec<RepresentationId>,
        outputs: Vec<RepresentationId>,
    ) -> Result<OperationId, GraphError> {
        let node = OperationNode::new(scope, op, inputs, outputs);
        self.add_operation_node(node)
    }

    /// Add an operation node to the graph. Nodes should be added in a topological order
    ///
    /// # Arguments
    ///
    /// * `node`: The node to add
    ///
    /// # Errors
    /// If another operation already produces one of the node's outputs
    pub fn add_operation_node(&mut self, node: OperationNode) -> Result<OperationId, GraphError> {
        let node_id = self.operation_nodes.len();

        if let Some(&repr_id) = node
            .get_output_ids()
            .iter()
            .find(|&id| self.representation_ops.contains_key(id))
        {
            return Err(GraphError::AnotherOpProducesOutput { repr_id });
        }
        for &id in node.get_output_ids() {
            self.representation_ops.insert(id, node_id);
        }

        self.operation_nodes.push(node);

        Ok(node_id)
    }

    /// Walks back from `output_ids` until `input_ids` are reached and returns every operation on the way.
    ///
    /// # Errors
    /// If a representation is neither given as input nor produced by an operation
    pub fn get_operation_set(
        &self,
        output_ids: &[RepresentationId],
        input_ids: &[RepresentationId],
    ) -> Result<HashSet<OperationId>, GraphError> {
        let mut op_set = HashSet::new();
        let mut visited: HashSet<RepresentationId> = input_ids.iter().copied().collect();
        let mut queue: VecDeque<RepresentationId> = output_ids.iter().copied().collect();

        while let Some(repr_id) = queue.pop_front() {
            if !visited.insert(repr_id) {
                continue;
            }
            let op_id = self
                .get_representation_op_id(repr_id)
                .ok_or(GraphError::NoOpCreatesRepresentation { repr_id })?;
            if op_set.insert(op_id) {
                queue.extend(self.operation_nodes[op_id].get_input_ids().iter().copied());
            }
        }
        Ok(op_set)
    }
}
