// SPDX-License-Identifier: MIT OR Apache-2.0
//! Literal value nodes.

use crate::graph::GraphContext;
use crate::node::{NodeBehavior, ProcessContext, ShaderContext};
use crate::port::{InputPort, NodeType, OutputPort};
use crate::shader::glsl_literal;
use crate::value::Value;
use serde_json::{Map, Value as JsonValue};

/// Parameter name that overrides the stored literal
pub const VALUE_PARAMETER: &str = "Value";

/// Constant of a fixed shape
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantNode {
    ty: NodeType,
    /// Stored literal
    pub value: Value,
}

impl ConstantNode {
    /// Zero constant of shape `ty`
    pub fn new(ty: NodeType) -> Self {
        Self {
            ty,
            value: Value::zero_for(ty),
        }
    }

    /// Shape of this constant
    pub fn value_type(&self) -> NodeType {
        self.ty
    }

    /// Registry tag for the shape
    pub fn tag(&self) -> &'static str {
        match self.ty {
            t if t == NodeType::FLOAT2 => "Float2Constant",
            t if t == NodeType::FLOAT3 => "Float3Constant",
            t if t == NodeType::FLOAT4 => "Float4Constant",
            t if t == NodeType::BOOL => "BoolConstant",
            _ => "FloatConstant",
        }
    }

    /// Replace the literal, coercing it to this constant's shape
    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into().coerce(self.ty);
    }
}

impl NodeBehavior for ConstantNode {
    fn type_tag(&self) -> &'static str {
        self.tag()
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        (Vec::new(), vec![OutputPort::new("Output", self.ty)])
    }

    fn supports_gate(&self) -> bool {
        true
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        let value = ctx
            .parameter(VALUE_PARAMETER)
            .map_or(self.value, |v| v.coerce(self.ty));
        ctx.set_output(0, value);
        true
    }

    fn shader_fragment(&self, ctx: &ShaderContext<'_>) -> String {
        let value = ctx
            .parameter(VALUE_PARAMETER)
            .map_or(self.value, |v| v.coerce(self.ty));
        glsl_literal(value, self.ty)
            .map(|literal| ctx.declare(&literal))
            .unwrap_or_default()
    }

    fn write_data(&self, data: &mut Map<String, JsonValue>) {
        data.insert("value".to_string(), self.value.to_json());
    }

    fn read_data(&mut self, data: &Map<String, JsonValue>, _ctx: &GraphContext) {
        if let Some(value) = data.get("value") {
            self.set_value(Value::from_json(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(ConstantNode::new(NodeType::FLOAT).tag(), "FloatConstant");
        assert_eq!(ConstantNode::new(NodeType::FLOAT3).tag(), "Float3Constant");
        assert_eq!(ConstantNode::new(NodeType::BOOL).tag(), "BoolConstant");
    }

    #[test]
    fn test_set_value_coerces() {
        let mut node = ConstantNode::new(NodeType::FLOAT2);
        node.set_value(3.0_f32);
        assert_eq!(node.value, Value::Vector([0.0; 4]));
        node.set_value([1.0_f32, 2.0, 0.0, 0.0]);
        assert_eq!(node.value, Value::Vector([1.0, 2.0, 0.0, 0.0]));
    }
}
