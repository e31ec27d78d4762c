// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nodes that only have meaning inside a fragment program.
//!
//! On the CPU they produce zero values so downstream plumbing still resolves.

use crate::graph::GraphContext;
use crate::node::{NodeBehavior, ProcessContext, ShaderContext};
use crate::port::{InputPort, NodeType, OutputPort};
use crate::value::Value;
use serde_json::{json, Map, Value as JsonValue};

/// Number of texture units a program can bind
pub const SAMPLER_UNITS: usize = 2;

/// Fragment texture coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UvNode;

impl NodeBehavior for UvNode {
    fn type_tag(&self) -> &'static str {
        "UV"
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        (Vec::new(), vec![OutputPort::new("UV", NodeType::FLOAT2)])
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        ctx.set_output(0, Value::Vector([0.0; 4]));
        true
    }

    fn shader_fragment(&self, ctx: &ShaderContext<'_>) -> String {
        ctx.declare("UV")
    }
}

/// Sample of a bound input texture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerNode {
    /// Texture unit, `Input0` or `Input1`
    pub unit: usize,
}

impl NodeBehavior for SamplerNode {
    fn type_tag(&self) -> &'static str {
        "Sampler"
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        (
            vec![InputPort::optional("UV", NodeType::FLOAT2)],
            vec![OutputPort::new("Output", NodeType::FLOAT4)],
        )
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        ctx.set_output(0, Value::Vector([0.0; 4]));
        true
    }

    fn shader_fragment(&self, ctx: &ShaderContext<'_>) -> String {
        let uv = ctx
            .input(0)
            .map_or_else(|| "UV".to_string(), |input| input.cast_to(NodeType::FLOAT2));
        ctx.declare(&format!("texture(Input{}, {uv})", self.unit))
    }

    fn write_data(&self, data: &mut Map<String, JsonValue>) {
        data.insert("sampler".to_string(), json!(self.unit));
    }

    fn read_data(&mut self, data: &Map<String, JsonValue>, _ctx: &GraphContext) {
        if let Some(unit) = data.get("sampler").and_then(JsonValue::as_u64) {
            self.unit = usize::try_from(unit)
                .unwrap_or_default()
                .min(SAMPLER_UNITS - 1);
        }
    }
}
