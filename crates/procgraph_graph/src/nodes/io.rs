// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph boundary nodes.

use crate::graph::GraphContext;
use crate::node::{NodeBehavior, NodeRole, ProcessContext, ShaderContext};
use crate::port::{InputPort, NodeType, OutputPort};
use crate::shader::glsl_literal;
use crate::value::Value;
use serde_json::{json, Map, Value as JsonValue};

/// External source seeded by the host
#[derive(Debug, Clone, PartialEq)]
pub struct InputNode {
    /// Shape produced on the output
    pub value_type: NodeType,
    /// Seeded value, [`Value::Empty`] until set
    pub value: Value,
}

impl Default for InputNode {
    fn default() -> Self {
        Self {
            value_type: NodeType::FLOAT,
            value: Value::Empty,
        }
    }
}

impl InputNode {
    /// Seed the node, adopting the value's shape
    pub fn seed(&mut self, value: Value) {
        match value {
            Value::Empty => {}
            Value::Vector(_) if self.value_type.arity().is_some_and(|n| n > 1) => {}
            _ => self.value_type = value.shape(),
        }
        self.value = value;
    }
}

impl NodeBehavior for InputNode {
    fn type_tag(&self) -> &'static str {
        "Input"
    }

    fn role(&self) -> NodeRole {
        NodeRole::Input
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        (Vec::new(), vec![OutputPort::new("Output", NodeType::ANY_DATA)])
    }

    fn update_output_type(&self, _inputs: &[InputPort], outputs: &mut [OutputPort]) {
        if let Some(output) = outputs.first_mut() {
            output.resolved = self.value_type;
        }
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        if self.value.is_empty() {
            return false;
        }
        ctx.set_output(0, self.value);
        true
    }

    fn shader_fragment(&self, ctx: &ShaderContext<'_>) -> String {
        glsl_literal(self.value, ctx.output_type(0))
            .map(|literal| ctx.declare(&literal))
            .unwrap_or_default()
    }

    fn write_data(&self, data: &mut Map<String, JsonValue>) {
        data.insert("valueType".to_string(), json!(self.value_type.code()));
        data.insert("value".to_string(), self.value.to_json());
    }

    fn read_data(&mut self, data: &Map<String, JsonValue>, _ctx: &GraphContext) {
        if let Some(code) = data.get("valueType").and_then(JsonValue::as_u64) {
            let ty = NodeType::from_code(u32::try_from(code).unwrap_or_default());
            if ty.is_resolved() {
                self.value_type = ty;
            }
        }
        if let Some(value) = data.get("value") {
            self.value = Value::from_json(value).coerce(self.value_type);
        }
    }
}

/// Graph sink; only reacts to upstream changes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputNode {
    /// Last value received
    pub value: Value,
}

impl NodeBehavior for OutputNode {
    fn type_tag(&self) -> &'static str {
        "Output"
    }

    fn role(&self) -> NodeRole {
        NodeRole::Output
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        (
            vec![InputPort::required("Input", NodeType::ANY_DATA)],
            vec![OutputPort::new("Output", NodeType::ANY_DATA)],
        )
    }

    fn update_output_type(&self, inputs: &[InputPort], outputs: &mut [OutputPort]) {
        if let (Some(input), Some(output)) = (inputs.first(), outputs.first_mut()) {
            if input.has_input() {
                output.resolved = input.resolved;
            }
        }
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        let Some(input) = ctx.input(0).copied() else {
            return false;
        };
        self.value = input.value;
        ctx.set_output(0, input.value);
        true
    }

    fn shader_fragment(&self, ctx: &ShaderContext<'_>) -> String {
        match ctx.input(0) {
            Some(input) => ctx.declare(&input.cast_to(ctx.output_type(0))),
            None => String::new(),
        }
    }
}

/// Source of the execute gate signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteNode;

impl NodeBehavior for ExecuteNode {
    fn type_tag(&self) -> &'static str {
        "Execute"
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        (Vec::new(), vec![OutputPort::new("Execute", NodeType::EXECUTE)])
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        ctx.set_output(0, Value::Bool(true));
        true
    }
}
