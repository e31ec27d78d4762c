// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.
//!
//! A [`Node`] owns its ports and a [`NodeKind`] carrying the variant's data.
//! Every variant implements [`NodeBehavior`], the uniform capability
//! interface the graph dispatches through.

use crate::connection::{Edge, PortRef};
use crate::graph::GraphContext;
use crate::nodes::{
    BinaryMathNode, BinaryOp, ConstantNode, ExecuteNode, GraphInstanceNode, InputNode,
    OutputNode, PixelProcessorNode, SamplerNode, UnaryMathNode, UnaryOp, UvNode,
};
use crate::port::{InputPort, NodeType, OutputPort};
use crate::renderer::Renderer;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shader identifier derived from the first segment of the ID
    pub fn shader_id(&self) -> String {
        let head = self.0.split('-').next().unwrap_or_default();
        let mut id = String::with_capacity(head.len() + 1);
        id.push('S');
        id.extend(head.chars().filter(char::is_ascii_alphanumeric));
        id
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for NodeId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Texture storage format requested from the renderer
///
/// Document codes are the matching GL internal format enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8 bit RGBA
    #[default]
    Rgba,
    /// Half float RGBA
    Rgba16F,
    /// Float RGBA
    Rgba32F,
    /// 8 bit RGB
    Rgb,
    /// Half float RGB
    Rgb16F,
    /// Float RGB
    Rgb32F,
    /// Half float single channel
    Luminance16F,
    /// Float single channel
    Luminance32F,
}

impl PixelFormat {
    /// Document code
    pub fn code(self) -> i64 {
        match self {
            Self::Rgba => 32856,
            Self::Rgba16F => 34842,
            Self::Rgba32F => 34836,
            Self::Rgb => 32849,
            Self::Rgb16F => 34843,
            Self::Rgb32F => 34837,
            Self::Luminance16F => 33325,
            Self::Luminance32F => 33326,
        }
    }

    /// Parse a document code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            32856 => Some(Self::Rgba),
            34842 => Some(Self::Rgba16F),
            34836 => Some(Self::Rgba32F),
            32849 => Some(Self::Rgb),
            34843 => Some(Self::Rgb16F),
            34837 => Some(Self::Rgb32F),
            33325 => Some(Self::Luminance16F),
            33326 => Some(Self::Luminance32F),
            _ => None,
        }
    }
}

/// Resolution context a node is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSettings {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Texture format
    pub pixel_format: PixelFormat,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            pixel_format: PixelFormat::Rgba,
        }
    }
}

/// How the graph schedules a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Ordinary processing node
    Interior,
    /// External source, evaluated after interior nodes
    Input,
    /// Sink, only reacts to upstream changes
    Output,
}

/// Upstream value seen by an input port during processing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputValue {
    /// Resolved type of the upstream output
    pub ty: NodeType,
    /// Upstream output data
    pub value: Value,
}

/// Upstream shader variable seen by an input port during emission
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderInput {
    /// Upstream variable name
    pub var: String,
    /// Resolved type of the upstream output
    pub ty: NodeType,
}

impl ShaderInput {
    /// Expression converting this input to `ty`
    pub fn cast_to(&self, ty: NodeType) -> String {
        let (Some(from), Some(to), Some(name)) = (self.ty.arity(), ty.arity(), ty.glsl_name())
        else {
            return self.var.clone();
        };
        if from == to {
            self.var.clone()
        } else if from == 1 {
            format!("{name}({})", self.var)
        } else if from < to {
            let padding = ", 0.0".repeat(to - from);
            format!("{name}({}{padding})", self.var)
        } else {
            let swizzle = &"xyzw"[..to];
            format!("{}.{swizzle}", self.var)
        }
    }
}

/// Everything a node sees while recomputing
pub struct ProcessContext<'a> {
    inputs: &'a [Option<InputValue>],
    outputs: &'a mut [OutputPort],
    parameters: &'a HashMap<String, Value>,
    renderer: Option<&'a Rc<dyn Renderer>>,
    /// Node width
    pub width: u32,
    /// Node height
    pub height: u32,
    /// Node texture format
    pub pixel_format: PixelFormat,
}

impl<'a> ProcessContext<'a> {
    /// Value arriving at input `index`, if connected
    pub fn input(&self, index: usize) -> Option<&InputValue> {
        self.inputs.get(index).and_then(Option::as_ref)
    }

    /// Bound graph parameter for this node
    pub fn parameter(&self, name: &str) -> Option<Value> {
        self.parameters.get(name).copied()
    }

    /// Resolved type of output `index`
    pub fn output_type(&self, index: usize) -> NodeType {
        self.outputs
            .get(index)
            .map_or(NodeType::empty(), |o| o.resolved)
    }

    /// Store a computed value on output `index`
    pub fn set_output(&mut self, index: usize, value: Value) {
        if let Some(output) = self.outputs.get_mut(index) {
            output.data = value;
        }
    }

    /// Last value stored on output `index`
    pub fn output(&self, index: usize) -> Value {
        self.outputs.get(index).map_or(Value::Empty, |o| o.data)
    }

    /// Renderer collaborator, when the graph has one
    pub fn renderer(&self) -> Option<&'a Rc<dyn Renderer>> {
        self.renderer
    }
}

/// Everything a node sees while emitting its shader statement
pub struct ShaderContext<'a> {
    inputs: &'a [Option<ShaderInput>],
    outputs: &'a [OutputPort],
    parameters: &'a HashMap<String, Value>,
    var: String,
}

impl<'a> ShaderContext<'a> {
    /// Upstream variable feeding input `index`
    pub fn input(&self, index: usize) -> Option<&ShaderInput> {
        self.inputs.get(index).and_then(Option::as_ref)
    }

    /// Bound graph parameter for this node, functions at their last result
    pub fn parameter(&self, name: &str) -> Option<Value> {
        self.parameters.get(name).copied()
    }

    /// Resolved type of output `index`
    pub fn output_type(&self, index: usize) -> NodeType {
        self.outputs
            .get(index)
            .map_or(NodeType::empty(), |o| o.resolved)
    }

    /// Variable declared by this node
    pub fn var(&self) -> &str {
        &self.var
    }

    /// Declare this node's variable with the type of its first output
    pub fn declare(&self, expr: &str) -> String {
        match self.output_type(0).glsl_name() {
            Some(ty) => format!("{ty} {} = {expr};\n", self.var),
            None => String::new(),
        }
    }
}

/// Capability interface every node variant implements
pub trait NodeBehavior {
    /// Registry tag of this variant
    fn type_tag(&self) -> &'static str;

    /// Scheduling role
    fn role(&self) -> NodeRole {
        NodeRole::Interior
    }

    /// Data ports declared by the variant
    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>);

    /// Whether the execute gate may be attached
    fn supports_gate(&self) -> bool {
        false
    }

    /// Derive output types from connected inputs
    fn update_output_type(&self, _inputs: &[InputPort], _outputs: &mut [OutputPort]) {}

    /// Recompute outputs; returns whether outputs changed
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool;

    /// Shader statement for this node, empty when nothing is emitted
    fn shader_fragment(&self, _ctx: &ShaderContext<'_>) -> String {
        String::new()
    }

    /// Write variant payload into the node document
    fn write_data(&self, _data: &mut Map<String, JsonValue>) {}

    /// Read variant payload from the node document
    fn read_data(&mut self, _data: &Map<String, JsonValue>, _ctx: &GraphContext) {}

    /// Release renderer resources held by the variant
    fn release(&mut self, _renderer: Option<&dyn Renderer>) {}
}

/// Closed set of node variants
#[derive(Debug)]
pub enum NodeKind {
    /// External source
    Input(InputNode),
    /// Graph sink
    Output(OutputNode),
    /// Execute gate source
    Execute(ExecuteNode),
    /// Literal value
    Constant(ConstantNode),
    /// One-argument math
    UnaryMath(UnaryMathNode),
    /// Two-argument math
    BinaryMath(BinaryMathNode),
    /// Texture coordinate
    Uv(UvNode),
    /// Texture sample
    Sampler(SamplerNode),
    /// Function graph run on the GPU
    PixelProcessor(PixelProcessorNode),
    /// Embedded child graph
    GraphInstance(GraphInstanceNode),
}

impl NodeKind {
    /// Shared view through the capability interface
    pub fn behavior(&self) -> &dyn NodeBehavior {
        match self {
            Self::Input(n) => n,
            Self::Output(n) => n,
            Self::Execute(n) => n,
            Self::Constant(n) => n,
            Self::UnaryMath(n) => n,
            Self::BinaryMath(n) => n,
            Self::Uv(n) => n,
            Self::Sampler(n) => n,
            Self::PixelProcessor(n) => n,
            Self::GraphInstance(n) => n,
        }
    }

    /// Mutable view through the capability interface
    pub fn behavior_mut(&mut self) -> &mut dyn NodeBehavior {
        match self {
            Self::Input(n) => n,
            Self::Output(n) => n,
            Self::Execute(n) => n,
            Self::Constant(n) => n,
            Self::UnaryMath(n) => n,
            Self::BinaryMath(n) => n,
            Self::Uv(n) => n,
            Self::Sampler(n) => n,
            Self::PixelProcessor(n) => n,
            Self::GraphInstance(n) => n,
        }
    }
}

/// A node instance in the graph
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    shader_id: String,
    /// Display name
    pub name: String,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    pub(crate) inputs: Vec<InputPort>,
    pub(crate) outputs: Vec<OutputPort>,
    gate: Option<usize>,
    kind: NodeKind,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Node {
    /// Create a node of `kind` with a fresh ID
    pub fn new(kind: NodeKind, settings: &NodeSettings) -> Self {
        let (inputs, outputs) = kind.behavior().ports();
        let id = NodeId::new();
        let mut node = Self {
            shader_id: id.shader_id(),
            id,
            name: kind.behavior().type_tag().to_string(),
            width: settings.width,
            height: settings.height,
            pixel_format: settings.pixel_format,
            inputs,
            outputs,
            gate: None,
            kind,
        };
        node.update_output_type();
        node
    }

    /// Replace the generated ID
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = id.into();
        self.shader_id = self.id.shader_id();
        self
    }

    /// Node ID
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Registry tag
    pub fn type_tag(&self) -> &'static str {
        self.kind.behavior().type_tag()
    }

    /// Scheduling role
    pub fn role(&self) -> NodeRole {
        self.kind.behavior().role()
    }

    /// Shader identifier derived from the ID
    pub fn shader_id(&self) -> &str {
        &self.shader_id
    }

    /// Shader variable holding output `index`
    pub fn shader_var(&self, index: usize) -> String {
        format!("{}{index}", self.shader_id)
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Texture format
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Set the resolution
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Set the texture format
    pub fn set_pixel_format(&mut self, format: PixelFormat) {
        self.pixel_format = format;
    }

    /// Input ports, gate last when present
    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    /// Output ports
    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&InputPort> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&OutputPort> {
        self.outputs.get(index)
    }

    /// Variant data
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Mutable variant data
    pub fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// Index of the execute gate input, if attached
    pub fn gate_index(&self) -> Option<usize> {
        self.gate
    }

    /// Attach the execute gate; returns false if the variant has none
    pub fn enable_gate(&mut self) -> bool {
        if self.gate.is_some() {
            return true;
        }
        if !self.kind.behavior().supports_gate() {
            return false;
        }
        self.inputs.push(InputPort::gate());
        self.gate = Some(self.inputs.len() - 1);
        true
    }

    /// Whether every required input and the gate are connected
    pub fn is_ready(&self) -> bool {
        self.inputs
            .iter()
            .all(|port| !port.required || port.has_input())
    }

    /// Distinct downstream nodes in subscription order
    pub(crate) fn listeners(&self) -> Vec<NodeId> {
        let mut seen = Vec::new();
        for port in &self.outputs {
            for PortRef { node, .. } in &port.listeners {
                if !seen.contains(node) {
                    seen.push(node.clone());
                }
            }
        }
        seen
    }

    /// Incoming edges with their input index
    pub(crate) fn edges(&self) -> impl Iterator<Item = (usize, &Edge)> {
        self.inputs
            .iter()
            .enumerate()
            .filter_map(|(i, port)| port.edge.as_ref().map(|e| (i, e)))
    }

    pub(crate) fn update_output_type(&mut self) {
        self.kind
            .behavior()
            .update_output_type(&self.inputs, &mut self.outputs);
    }

    pub(crate) fn process(
        &mut self,
        inputs: &[Option<InputValue>],
        parameters: &HashMap<String, Value>,
        renderer: Option<&Rc<dyn Renderer>>,
    ) -> bool {
        let mut ctx = ProcessContext {
            inputs,
            outputs: &mut self.outputs,
            parameters,
            renderer,
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
        };
        self.kind.behavior_mut().process(&mut ctx)
    }

    pub(crate) fn shader_fragment(
        &self,
        inputs: &[Option<ShaderInput>],
        parameters: &HashMap<String, Value>,
    ) -> String {
        if !self.is_ready() {
            return String::new();
        }
        let ctx = ShaderContext {
            inputs,
            outputs: &self.outputs,
            parameters,
            var: self.shader_var(0),
        };
        self.kind.behavior().shader_fragment(&ctx)
    }

    pub(crate) fn release(&mut self, renderer: Option<&dyn Renderer>) {
        self.kind.behavior_mut().release(renderer);
        for output in &mut self.outputs {
            if let Value::Texture(_) = output.data {
                output.data = Value::Empty;
            }
        }
    }

    /// Rebuild ports from the variant; callers remove edges first
    pub(crate) fn sync_ports(&mut self) {
        let (inputs, outputs) = self.kind.behavior().ports();
        let gated = self.gate.is_some();
        self.inputs = inputs;
        self.outputs = outputs;
        self.gate = None;
        if gated {
            self.enable_gate();
        }
        self.update_output_type();
    }

    /// Variant payload plus node-level flags
    pub(crate) fn write_data(&self) -> Map<String, JsonValue> {
        let mut data = Map::new();
        self.kind.behavior().write_data(&mut data);
        if self.gate.is_some() {
            data.insert("gated".to_string(), JsonValue::Bool(true));
        }
        data
    }

    /// Apply variant payload from a document, before connections are wired
    pub(crate) fn read_data(&mut self, data: &Map<String, JsonValue>, ctx: &GraphContext) {
        self.kind.behavior_mut().read_data(data, ctx);
        self.sync_ports();
        if data.get("gated").and_then(JsonValue::as_bool).unwrap_or(false) {
            self.enable_gate();
        }
        self.update_output_type();
    }
}

/// Factory producing a fresh variant
pub type NodeFactory = Box<dyn Fn() -> NodeKind>;

/// Registry of constructible node variants by tag
pub struct NodeRegistry {
    factories: IndexMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Registry with every built-in variant
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register("Input", || NodeKind::Input(InputNode::default()));
        registry.register("Output", || NodeKind::Output(OutputNode::default()));
        registry.register("Execute", || NodeKind::Execute(ExecuteNode));

        for ty in [
            NodeType::FLOAT,
            NodeType::FLOAT2,
            NodeType::FLOAT3,
            NodeType::FLOAT4,
            NodeType::BOOL,
        ] {
            let tag = ConstantNode::new(ty).tag();
            registry.register(tag, move || NodeKind::Constant(ConstantNode::new(ty)));
        }

        for op in UnaryOp::ALL {
            registry.register(op.tag(), move || NodeKind::UnaryMath(UnaryMathNode::new(op)));
        }
        for op in BinaryOp::ALL {
            registry.register(op.tag(), move || NodeKind::BinaryMath(BinaryMathNode::new(op)));
        }

        registry.register("UV", || NodeKind::Uv(UvNode));
        registry.register("Sampler", || NodeKind::Sampler(SamplerNode::default()));
        registry.register("PixelProcessor", || {
            NodeKind::PixelProcessor(PixelProcessorNode::default())
        });
        registry.register("GraphInstance", || {
            NodeKind::GraphInstance(GraphInstanceNode::default())
        });

        registry
    }

    /// Register a variant factory under `tag`
    pub fn register(&mut self, tag: impl Into<String>, factory: impl Fn() -> NodeKind + 'static) {
        self.factories.insert(tag.into(), Box::new(factory));
    }

    /// Look up the factory for a tag
    pub fn resolve(&self, tag: &str) -> Option<&NodeFactory> {
        self.factories.get(tag)
    }

    /// Whether a tag is registered
    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Registered tags in registration order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Create a node from a tag
    pub fn create_node(&self, tag: &str, settings: &NodeSettings) -> Option<Node> {
        self.resolve(tag).map(|factory| Node::new(factory(), settings))
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
