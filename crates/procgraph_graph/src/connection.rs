// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// Incoming edge stored on an input port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source node ID
    pub from_node: NodeId,
    /// Index into the source node's outputs
    pub from_output: usize,
}

impl Edge {
    /// Create a new edge
    pub fn new(from_node: NodeId, from_output: usize) -> Self {
        Self {
            from_node,
            from_output,
        }
    }
}

/// Reference to an input port of some node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Node owning the input
    pub node: NodeId,
    /// Input index on that node
    pub input: usize,
}

impl PortRef {
    /// Create a new port reference
    pub fn new(node: NodeId, input: usize) -> Self {
        Self { node, input }
    }

    /// Check if this reference points into a specific node
    pub fn involves_node(&self, node_id: &str) -> bool {
        self.node.as_str() == node_id
    }
}
