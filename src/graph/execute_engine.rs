//! ## Engine lifecycle
//! 1. Create the `Engine` by passing it a `Graph`
//! 2. Call `run` or a variant to transform input representations to output representations
//! 3. GOTO 2
//!
//! `run` executes the operations themselves. `run_nodal` takes a closure instead, which makes it
//! possible to push other kinds of representations (e.g. shapes) through the same graph.
use super::graph::{Graph, GraphError, OperationId, OperationNode, RepresentationId};
use super::operation::ExecutionContext;
use crate::tensorshape::TensorShape;
use crate::NetFloat;
use log::trace;
use ndarray::ArrayD;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;

pub struct Engine<'a> {
    graph: &'a Graph,
}

impl<'a> Engine<'a> {
    pub const fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    /// Executes the operations between `inputs` and `output_ids`.
    ///
    /// # Errors
    /// Any error raised by the graph walk or by an operation
    pub fn run(
        &self,
        output_ids: &[RepresentationId],
        inputs: &[(RepresentationId, ArrayD<NetFloat>)],
        ctx: &mut ExecutionContext,
    ) -> Result<Vec<(RepresentationId, ArrayD<NetFloat>)>, ExecuteError> {
        self.run_nodal(output_ids, inputs, |op_id, op_node, reprs| {
            trace!("executing op {} ({})", op_id, op_node.get_scope());
            op_node.get_operation().forward(reprs, ctx)
        })
    }

    /// Propagates static shapes between `inputs` and `output_ids`.
    ///
    /// # Errors
    /// Any error raised by the graph walk or by an operation's shape function
    pub fn run_shapes(
        &self,
        output_ids: &[RepresentationId],
        inputs: &[(RepresentationId, TensorShape)],
    ) -> Result<Vec<(RepresentationId, TensorShape)>, ExecuteError> {
        self.run_nodal(output_ids, inputs, |_, op_node, shapes| {
            let shapes = shapes.iter().map(|&s| s.clone()).collect::<Vec<_>>();
            Ok(op_node.get_operation().output_shapes(&shapes)?)
        })
    }

    /// Calculates output representations of a sub-graph, given the input representations and a visitor.
    ///
    /// # Arguments
    ///
    /// * `output_ids` - Ids of the representations to calculate.
    /// * `inputs` - Set of starting inputs required to calculate outputs
    /// * `visit` - Performs the intermediate calculations at each node.
    ///     * Arguments:
    ///         * `op_id` - The id of the visited node
    ///         * `op_node` - The visited node
    ///         * `inputs` - The input representations
    ///     * Returns:
    ///         * `repr` - One representation per output of the node.
    ///
    /// # Returns
    ///
    /// * `outputs` - The outputs for each id in `output_ids`
    ///
    /// # Errors
    /// If the graph walk fails, a representation is missing or produced twice, or `visit` fails
    pub fn run_nodal<T: Clone + Debug>(
        &self,
        output_ids: &[RepresentationId],
        inputs: &[(RepresentationId, T)],
        mut visit: impl FnMut(OperationId, &OperationNode, &[&T]) -> Result<Vec<T>, ExecuteError>,
    ) -> Result<Vec<(RepresentationId, T)>, ExecuteError> {
        let mut state = ExecutionState::<T>::default();

        // 1. Walk back through operations BFS
        let input_ids = inputs.iter().map(|(id, _)| *id).collect::<Vec<_>>();
        let operation_set = self.graph.get_operation_set(output_ids, &input_ids)?;

        // 2. Order set via the graph's topological ordering, which is the ascending ordering of ids
        let mut op_node_vec: Vec<OperationId> = operation_set.into_iter().collect();
        op_node_vec.sort_unstable();

        for (id, v) in inputs {
            state.set_representation(*id, v.clone())?;
        }

        // 3. Apply the visitor to every operation in order
        for op_id in op_node_vec {
            let op_node = self
                .graph
                .get_operation_node(op_id)
                .ok_or(ExecuteError::OperationNotExist { op_id })?;

            let outputs = {
                let reprs = op_node
                    .get_input_ids()
                    .iter()
                    .map(|&id| state.get_representation(id))
                    .collect::<Option<Vec<&T>>>()
                    .ok_or_else(|| ExecuteError::OneOfRepresentationsNotExist {
                        repr_ids: op_node.get_input_ids().clone(),
                    })?;
                visit(op_id, op_node, &reprs)?
            };

            if outputs.len() != op_node.get_output_ids().len() {
                return Err(ExecuteError::IncorrectOutputsFromVisitor {
                    expected: op_node.get_output_ids().len(),
                    given: outputs.len(),
                });
            }

            for (&repr_id, repr) in op_node.get_output_ids().iter().zip(outputs.into_iter()) {
                state.set_representation(repr_id, repr)?;
            }
        }

        // Collect and return output representations
        output_ids
            .iter()
            .map(|&id| state.get_representation(id).cloned().map(|r| (id, r)))
            .collect::<Option<Vec<(RepresentationId, T)>>>()
            .ok_or_else(|| ExecuteError::OneOfRepresentationsNotExist {
                repr_ids: output_ids.to_vec(),
            })
    }
}

#[derive(Debug)]
pub enum ExecuteError {
    GraphError {
        err: GraphError,
    },
    IncorrectOutputsFromVisitor {
        expected: usize,
        given: usize,
    },
    IncorrectInputCount {
        expected: usize,
        given: usize,
    },
    OperationNotExist {
        op_id: OperationId,
    },
    OneOfRepresentationsNotExist {
        repr_ids: Vec<RepresentationId>,
    },
    StateAlreadyHasRepresentation {
        rep_id: RepresentationId,
    },
    /// A conditional operation ran without the mode flag being fed.
    ModeNotFed,
    InvalidProbability {
        prob: NetFloat,
    },
    ShapeMismatch {
        expected: TensorShape,
        given: Vec<usize>,
    },
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::GraphError { err } => write!(f, "graph error: {}", err),
            Self::IncorrectOutputsFromVisitor { expected, given } => {
                write!(f, "expected {} outputs from visitor, given {}", expected, given)
            }
            Self::IncorrectInputCount { expected, given } => {
                write!(f, "expected {} inputs, given {}", expected, given)
            }
            Self::OperationNotExist { op_id } => write!(f, "operation {} does not exist", op_id),
            Self::OneOfRepresentationsNotExist { repr_ids } => {
                write!(f, "one of representations {:?} does not exist", repr_ids)
            }
            Self::StateAlreadyHasRepresentation { rep_id } => {
                write!(f, "representation {} was already computed", rep_id)
            }
            Self::ModeNotFed => write!(f, "the mode flag must be fed to run a conditional"),
            Self::InvalidProbability { prob } => write!(f, "invalid keep probability {}", prob),
            Self::ShapeMismatch { expected, given } => {
                write!(f, "expected shape {}, given {:?}", expected, given)
            }
        }
    }
}

impl std::error::Error for ExecuteError {}

impl From<GraphError> for ExecuteError {
    fn from(err: GraphError) -> Self {
        Self::GraphError { err }
    }
}

pub struct ExecutionState<T: Clone> {
    /// Keeps track of all representations currently in memory
    representations: HashMap<RepresentationId, T>,
}

impl<T: Clone> Default for ExecutionState<T> {
    fn default() -> Self {
        Self {
            representations: HashMap::new(),
        }
    }
}

impl<T: Clone> ExecutionState<T> {
    pub fn get_representation(&self, representation_id: RepresentationId) -> Option<&T> {
        self.representations.get(&representation_id)
    }

    /// # Errors
    /// If the representation was already set
    pub fn set_representation(
        &mut self,
        representation_id: RepresentationId,
        representation: T,
    ) -> Result<(), ExecuteError> {
        if let std::collections::hash_map::Entry::Vacant(e) =
            self.representations.entry(representation_id)
        {
            e.insert(representation);
            Ok(())
        } else {
            Err(ExecuteError::StateAlreadyHasRepresentation {
                rep_id: representation_id,
            })
        }
    }
}
