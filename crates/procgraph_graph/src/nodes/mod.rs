// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node variants.
//!
//! - I/O: graph inputs, outputs and the execute gate source
//! - Constants
//! - Math: unary and binary elementwise functions
//! - Shader sources: texture coordinate and texture sampling
//! - Composites: pixel processors and embedded graph instances

mod constant;
mod graph_instance;
mod io;
mod math;
mod pixel_processor;
mod shader_sources;

pub use constant::ConstantNode;
pub use graph_instance::GraphInstanceNode;
pub use io::{ExecuteNode, InputNode, OutputNode};
pub use math::{BinaryMathNode, BinaryOp, UnaryMathNode, UnaryOp};
pub use pixel_processor::PixelProcessorNode;
pub use shader_sources::{SamplerNode, UvNode};

use crate::port::{InputPort, NodeType};

/// Shape the wider of two connected inputs carries
pub(crate) fn widest(inputs: &[InputPort]) -> Option<NodeType> {
    inputs
        .iter()
        .filter(|port| port.accepted != NodeType::EXECUTE)
        .filter(|port| port.has_input() && port.resolved.is_resolved())
        .map(|port| port.resolved)
        .max_by_key(|ty| ty.arity().unwrap_or(0))
}
