// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function graph compiled to a fragment program and run by the renderer.

use crate::document::GraphDocument;
use crate::function::FunctionGraph;
use crate::graph::GraphContext;
use crate::node::{NodeBehavior, ProcessContext};
use crate::nodes::shader_sources::SAMPLER_UNITS;
use crate::port::{InputPort, NodeType, OutputPort};
use crate::renderer::{RenderRequest, Renderer, TextureHandle};
use crate::value::Value;
use serde_json::{Map, Value as JsonValue};

/// Runs its function graph once per pixel on the GPU
#[derive(Debug)]
pub struct PixelProcessorNode {
    function: Box<FunctionGraph>,
    texture: Option<TextureHandle>,
}

impl Default for PixelProcessorNode {
    fn default() -> Self {
        Self::new(FunctionGraph::new("Pixel Function"))
    }
}

impl PixelProcessorNode {
    /// Wrap an existing function graph
    pub fn new(function: FunctionGraph) -> Self {
        Self {
            function: Box::new(function),
            texture: None,
        }
    }

    /// Per-pixel function
    pub fn function(&self) -> &FunctionGraph {
        &self.function
    }

    /// Mutable per-pixel function
    pub fn function_mut(&mut self) -> &mut FunctionGraph {
        &mut self.function
    }

    /// Texture produced by the last successful run
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    /// Full program for the current function, if its output can be emitted
    pub fn program(&self) -> Option<String> {
        let root = self.function.output_node()?;
        self.function.compile_program(root)
    }
}

impl NodeBehavior for PixelProcessorNode {
    fn type_tag(&self) -> &'static str {
        "PixelProcessor"
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        let inputs = (0..SAMPLER_UNITS)
            .map(|unit| InputPort::optional(format!("Input{unit}"), NodeType::IMAGE))
            .collect();
        (inputs, vec![OutputPort::new("Output", NodeType::COLOR)])
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        let Some(renderer) = ctx.renderer() else {
            tracing::trace!("no renderer, pixel processor idle");
            return false;
        };
        let Some(shader) = self.program() else {
            tracing::trace!("pixel function has no emittable output");
            return false;
        };

        let request = RenderRequest {
            shader: &shader,
            textures: (0..SAMPLER_UNITS)
                .map(|unit| ctx.input(unit).and_then(|i| i.value.as_texture()))
                .collect(),
            uniforms: vec![(
                "size",
                Value::Vector([ctx.width as f32, ctx.height as f32, 0.0, 0.0]),
            )],
            width: ctx.width,
            height: ctx.height,
            format: ctx.pixel_format,
        };

        match renderer.execute(&request) {
            Ok(texture) => {
                if let Some(old) = self.texture.replace(texture) {
                    renderer.release(old);
                }
                ctx.set_output(0, Value::Texture(texture));
                true
            }
            Err(err) => {
                tracing::warn!(%err, "pixel processor render failed");
                false
            }
        }
    }

    fn write_data(&self, data: &mut Map<String, JsonValue>) {
        if let Ok(function) = serde_json::to_value(self.function.to_document()) {
            data.insert("function".to_string(), function);
        }
    }

    fn read_data(&mut self, data: &Map<String, JsonValue>, ctx: &GraphContext) {
        let Some(function) = data.get("function") else {
            return;
        };
        match serde_json::from_value::<GraphDocument>(function.clone()) {
            Ok(doc) => {
                self.function = Box::new(FunctionGraph::from_document(&doc, ctx.clone()));
            }
            Err(err) => tracing::warn!(%err, "malformed pixel function"),
        }
    }

    fn release(&mut self, renderer: Option<&dyn Renderer>) {
        if let (Some(texture), Some(renderer)) = (self.texture.take(), renderer) {
            renderer.release(texture);
        }
    }
}
