mod cond;
mod execute_engine;
mod graph;
mod operation;

pub use cond::Cond;
pub use execute_engine::{Engine, ExecuteError, ExecutionState};
pub use graph::{Graph, GraphError, OperationId, OperationNode, RepresentationId};
pub use operation::{single_input, single_shape, ExecutionContext, Operation};
