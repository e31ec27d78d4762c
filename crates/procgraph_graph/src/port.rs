// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::connection::{Edge, PortRef};
use crate::value::Value;
use bitflags::bitflags;

bitflags! {
    /// Set of value shapes a port accepts, or the single shape it currently carries.
    ///
    /// The numeric codes are part of the document format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeType: u32 {
        /// RGBA image or color
        const COLOR = 2;
        /// Single channel image
        const GRAY = 4;
        /// Scalar float
        const FLOAT = 8;
        /// 2 component vector
        const FLOAT2 = 16;
        /// 3 component vector
        const FLOAT3 = 32;
        /// 4 component vector
        const FLOAT4 = 64;
        /// Boolean
        const BOOL = 128;
        /// Execution gate signal
        const EXECUTE = 256;

        /// Any scalar or vector float shape
        const ANY_FLOAT = Self::FLOAT.bits()
            | Self::FLOAT2.bits()
            | Self::FLOAT3.bits()
            | Self::FLOAT4.bits();
        /// Any image shape
        const IMAGE = Self::COLOR.bits() | Self::GRAY.bits();
        /// Everything that can carry data (excludes the gate signal)
        const ANY_DATA = Self::ANY_FLOAT.bits()
            | Self::IMAGE.bits()
            | Self::BOOL.bits();
    }
}

impl NodeType {
    /// Whether exactly one shape is set
    pub fn is_resolved(self) -> bool {
        self.bits().count_ones() == 1
    }

    /// Number of float components for a resolved shape
    pub fn arity(self) -> Option<usize> {
        match self {
            t if t == Self::FLOAT || t == Self::GRAY || t == Self::BOOL => Some(1),
            t if t == Self::FLOAT2 => Some(2),
            t if t == Self::FLOAT3 => Some(3),
            t if t == Self::FLOAT4 || t == Self::COLOR => Some(4),
            _ => None,
        }
    }

    /// GLSL type name for a resolved shape
    pub fn glsl_name(self) -> Option<&'static str> {
        match self {
            t if t == Self::FLOAT || t == Self::GRAY => Some("float"),
            t if t == Self::FLOAT2 => Some("vec2"),
            t if t == Self::FLOAT3 => Some("vec3"),
            t if t == Self::FLOAT4 || t == Self::COLOR => Some("vec4"),
            t if t == Self::BOOL => Some("bool"),
            _ => None,
        }
    }

    /// Vector shape with the given component count
    pub fn from_arity(arity: usize) -> Self {
        match arity {
            0 | 1 => Self::FLOAT,
            2 => Self::FLOAT2,
            3 => Self::FLOAT3,
            _ => Self::FLOAT4,
        }
    }

    /// Check if a value of this shape may flow into a port accepting `accepted`
    pub fn can_connect_to(self, accepted: NodeType) -> bool {
        self.intersects(accepted)
    }

    /// Document code for this type set
    pub fn code(self) -> u32 {
        self.bits()
    }

    /// Parse a document code, dropping unknown bits
    pub fn from_code(code: u32) -> Self {
        Self::from_bits_truncate(code)
    }
}

/// An input slot on a node
#[derive(Debug, Clone)]
pub struct InputPort {
    /// Port name
    pub name: String,
    /// Shapes this port accepts
    pub accepted: NodeType,
    /// Shape of the connected output, or `accepted` while unset
    pub resolved: NodeType,
    /// Whether evaluation needs this input connected
    pub required: bool,
    /// Incoming edge, `None` while the input is unset
    pub(crate) edge: Option<Edge>,
}

impl InputPort {
    /// Create a required input
    pub fn required(name: impl Into<String>, accepted: NodeType) -> Self {
        Self {
            name: name.into(),
            accepted,
            resolved: accepted,
            required: true,
            edge: None,
        }
    }

    /// Create an input that may stay unset
    pub fn optional(name: impl Into<String>, accepted: NodeType) -> Self {
        Self {
            required: false,
            ..Self::required(name, accepted)
        }
    }

    /// The execute gate input
    pub fn gate() -> Self {
        Self::required("Execute", NodeType::EXECUTE)
    }

    /// Incoming edge, if connected
    pub fn edge(&self) -> Option<&Edge> {
        self.edge.as_ref()
    }

    /// Whether an edge is attached
    pub fn has_input(&self) -> bool {
        self.edge.is_some()
    }

    pub(crate) fn reset(&mut self) -> Option<Edge> {
        self.resolved = self.accepted;
        self.edge.take()
    }
}

/// An output slot on a node
#[derive(Debug, Clone)]
pub struct OutputPort {
    /// Port name
    pub name: String,
    /// Shapes this port can produce
    pub accepted: NodeType,
    /// Shape currently produced
    pub resolved: NodeType,
    /// Last computed value
    pub data: Value,
    /// Downstream inputs notified on change, in subscription order
    pub(crate) listeners: Vec<PortRef>,
}

impl OutputPort {
    /// Create an output whose shape is resolved later
    pub fn new(name: impl Into<String>, accepted: NodeType) -> Self {
        Self {
            name: name.into(),
            accepted,
            resolved: accepted,
            data: Value::Empty,
            listeners: Vec::new(),
        }
    }

    /// Downstream inputs fed by this output
    pub fn listeners(&self) -> &[PortRef] {
        &self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glsl_names() {
        assert_eq!(NodeType::FLOAT.glsl_name(), Some("float"));
        assert_eq!(NodeType::FLOAT3.glsl_name(), Some("vec3"));
        assert_eq!(NodeType::COLOR.glsl_name(), Some("vec4"));
        assert_eq!(NodeType::ANY_FLOAT.glsl_name(), None);
    }

    #[test]
    fn test_connectivity() {
        assert!(NodeType::FLOAT3.can_connect_to(NodeType::ANY_FLOAT));
        assert!(!NodeType::EXECUTE.can_connect_to(NodeType::ANY_DATA));
        assert!(!NodeType::BOOL.can_connect_to(NodeType::ANY_FLOAT));
    }

    #[test]
    fn test_codes() {
        assert_eq!(NodeType::FLOAT4.code(), 64);
        assert_eq!(NodeType::from_code(8 | 16 | 1024), NodeType::FLOAT | NodeType::FLOAT2);
        assert!(NodeType::FLOAT2.is_resolved());
        assert!(!NodeType::IMAGE.is_resolved());
    }
}
