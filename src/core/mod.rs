mod factor_graph;
mod factor_node;
mod message;
mod node;
pub mod tensor;
mod variable_node;

pub use factor_graph::{
    FGError, FGResult, FactorGraph, FactorId, MessagePassingConfig, MessagePassingInfo, VariableId,
};
pub use factor_node::FactorNode;
pub use message::Message;
pub use node::{Node, Ports};
pub use variable_node::VariableNode;
