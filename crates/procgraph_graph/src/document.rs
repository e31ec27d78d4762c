// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph documents.
//!
//! Loading is two-phase because connections name nodes that may appear
//! later in the document: every node shell is created and indexed first,
//! then parameters, per-node data and connections are applied.

use crate::function::FunctionGraph;
use crate::graph::{Graph, GraphContext, Viewport, DEFAULT_SIZE};
use crate::node::{Node, NodeId, NodeSettings, PixelFormat};
use crate::parameter::{Parameter, ParameterValue};
use crate::port::NodeType;
use crate::value::{widen, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;

/// Serialized graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphDocument {
    /// Graph name
    pub name: String,
    /// Nodes in graph order
    pub nodes: Vec<NodeDocument>,
    /// Output node IDs
    pub outputs: Vec<String>,
    /// Input node IDs
    pub inputs: Vec<String>,
    /// Pixel format code for new nodes
    pub default_texture_type: i64,
    /// Viewport pan
    pub shift_x: f64,
    /// Viewport pan
    pub shift_y: f64,
    /// Viewport zoom
    pub zoom: f64,
    /// Graph width
    pub width: i64,
    /// Graph height
    pub height: i64,
    /// Environment map key
    pub hdri_index: String,
    /// Node parameters keyed `"<node id>.<name>"`
    pub parameters: IndexMap<String, ParameterDocument>,
    /// Graph-level parameters
    pub custom_parameters: Vec<ParameterDocument>,
    /// Named function graphs
    pub custom_functions: Vec<GraphDocument>,
    /// Designated output of a function graph
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_node: Option<String>,
}

impl Default for GraphDocument {
    fn default() -> Self {
        Self {
            name: String::new(),
            nodes: Vec::new(),
            outputs: Vec::new(),
            inputs: Vec::new(),
            default_texture_type: PixelFormat::Rgba.code(),
            shift_x: 0.0,
            shift_y: 0.0,
            zoom: 1.0,
            width: i64::from(DEFAULT_SIZE),
            height: i64::from(DEFAULT_SIZE),
            hdri_index: String::new(),
            parameters: IndexMap::new(),
            custom_parameters: Vec::new(),
            custom_functions: Vec::new(),
            output_node: None,
        }
    }
}

/// Serialized node; variant payload is flattened alongside the common fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDocument {
    /// Node ID
    pub id: String,
    /// Registry tag
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Width in pixels
    #[serde(default)]
    pub width: i64,
    /// Height in pixels
    #[serde(default)]
    pub height: i64,
    /// Outgoing connections
    #[serde(default)]
    pub outputs: Vec<ConnectionDocument>,
    /// Variant payload
    #[serde(flatten)]
    pub data: Map<String, JsonValue>,
}

/// Serialized edge, stored on its source node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDocument {
    /// Target node ID
    pub to_node_id: String,
    /// Target input index
    pub to_input_index: usize,
    /// Source output index
    pub from_output_index: usize,
}

/// Serialized parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDocument {
    /// Parameter name
    pub name: String,
    /// Literal value, or an inline graph document when `is_function`
    #[serde(default)]
    pub value: JsonValue,
    /// Whether `value` is a function graph
    #[serde(default)]
    pub is_function: bool,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Type code
    #[serde(rename = "type", default = "float_code")]
    pub type_code: u32,
    /// Lower clamp bound
    #[serde(default)]
    pub min: f64,
    /// Upper clamp bound
    #[serde(default = "one")]
    pub max: f64,
}

fn float_code() -> u32 {
    NodeType::FLOAT.code()
}

fn one() -> f64 {
    1.0
}

/// Error reading or writing a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Malformed JSON or unexpected shape
    #[error("Invalid graph document: {0}")]
    Json(#[from] serde_json::Error),

    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sizes of zero or the unset sentinel fall back to the default
fn sanitize_size(size: i64) -> u32 {
    match u32::try_from(size) {
        Ok(0) | Err(_) => DEFAULT_SIZE,
        Ok(s) if i64::from(s) >= i64::from(i32::MAX) => DEFAULT_SIZE,
        Ok(s) => s,
    }
}

fn pixel_format(code: i64) -> PixelFormat {
    PixelFormat::from_code(code).unwrap_or_else(|| {
        tracing::warn!(code, "unknown pixel format code, using RGBA");
        PixelFormat::Rgba
    })
}

impl Parameter {
    /// Document form
    pub fn to_document(&self) -> ParameterDocument {
        let value = match self.value() {
            ParameterValue::Literal(v) => v.to_json(),
            ParameterValue::Function(f) => {
                serde_json::to_value(f.to_document()).unwrap_or(JsonValue::Null)
            }
        };
        ParameterDocument {
            name: self.name.clone(),
            value,
            is_function: self.is_function(),
            description: self.description.clone(),
            type_code: self.value_type().code(),
            min: widen(self.min),
            max: widen(self.max),
        }
    }

    /// Rebuild from a document; a malformed function becomes an empty literal
    pub fn from_document(doc: &ParameterDocument, context: &GraphContext) -> Self {
        let mut ty = NodeType::from_code(doc.type_code);
        if !ty.is_resolved() {
            ty = NodeType::FLOAT;
        }
        let value = if doc.is_function {
            match serde_json::from_value::<GraphDocument>(doc.value.clone()) {
                Ok(graph) => {
                    ParameterValue::from(FunctionGraph::from_document(&graph, context.clone()))
                }
                Err(err) => {
                    tracing::warn!(parameter = %doc.name, %err, "malformed function parameter");
                    ParameterValue::Literal(Value::Empty)
                }
            }
        } else {
            ParameterValue::Literal(Value::from_json(&doc.value))
        };

        let mut parameter = Self::typed(doc.name.clone(), value, ty);
        parameter.description.clone_from(&doc.description);
        parameter.min = doc.min as f32;
        parameter.max = doc.max as f32;
        parameter
    }
}

impl Node {
    /// Document form, outgoing connections included
    pub fn to_document(&self) -> NodeDocument {
        let outputs = self
            .outputs()
            .iter()
            .enumerate()
            .flat_map(|(index, port)| {
                port.listeners().iter().map(move |r| ConnectionDocument {
                    to_node_id: r.node.to_string(),
                    to_input_index: r.input,
                    from_output_index: index,
                })
            })
            .collect();
        NodeDocument {
            id: self.id().to_string(),
            type_tag: self.type_tag().to_string(),
            name: self.name.clone(),
            width: i64::from(self.width()),
            height: i64::from(self.height()),
            outputs,
            data: self.write_data(),
        }
    }
}

impl Graph {
    /// Document form
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            name: self.name.clone(),
            nodes: self.nodes().map(Node::to_document).collect(),
            outputs: self.output_node_ids().iter().map(NodeId::to_string).collect(),
            inputs: self.input_node_ids().iter().map(NodeId::to_string).collect(),
            default_texture_type: self.default_pixel_format().code(),
            shift_x: self.viewport.shift_x,
            shift_y: self.viewport.shift_y,
            zoom: self.viewport.zoom,
            width: i64::from(self.width()),
            height: i64::from(self.height()),
            hdri_index: self.hdri_index().to_string(),
            parameters: self
                .parameters
                .iter()
                .map(|(key, p)| (key.clone(), p.to_document()))
                .collect(),
            custom_parameters: self
                .custom_parameters
                .iter()
                .map(Parameter::to_document)
                .collect(),
            custom_functions: self
                .custom_functions
                .iter()
                .map(|f| f.to_document())
                .collect(),
            output_node: self.function_output.as_ref().map(NodeId::to_string),
        }
    }

    /// Build and recompute a graph from a document
    pub fn from_document(doc: &GraphDocument, context: GraphContext) -> Self {
        let mut graph = Self::with_context(doc.name.clone(), context);
        graph.load_document(doc);
        graph.try_and_process();
        graph
    }

    /// Parse JSON text into a graph
    pub fn from_json(text: &str, context: GraphContext) -> Result<Self, DocumentError> {
        let doc: GraphDocument = serde_json::from_str(text)?;
        Ok(Self::from_document(&doc, context))
    }

    /// Pretty JSON text of this graph
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Load a graph file
    pub fn load(path: impl AsRef<Path>, context: GraphContext) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text, context)
    }

    /// Write this graph to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Populate an empty graph; leaves recomputation to the caller
    fn load_document(&mut self, doc: &GraphDocument) {
        self.viewport = Viewport {
            shift_x: doc.shift_x,
            shift_y: doc.shift_y,
            zoom: doc.zoom,
        };
        self.set_width(sanitize_size(doc.width));
        self.set_height(sanitize_size(doc.height));
        self.set_default_pixel_format(pixel_format(doc.default_texture_type));
        if !doc.hdri_index.is_empty() {
            self.set_hdri_index(doc.hdri_index.clone());
        }

        // Phase 1: node shells
        let registry = self.context.registry.clone();
        let mut loaded = Vec::with_capacity(doc.nodes.len());
        for nd in &doc.nodes {
            let Some(factory) = registry.resolve(&nd.type_tag) else {
                tracing::warn!(node = %nd.id, tag = %nd.type_tag, "unknown node type, skipping");
                continue;
            };
            let settings = NodeSettings {
                width: sanitize_size(nd.width),
                height: sanitize_size(nd.height),
                pixel_format: self.default_pixel_format(),
            };
            let mut node = Node::new(factory(), &settings).with_id(nd.id.as_str());
            if !nd.name.is_empty() {
                node.name.clone_from(&nd.name);
            }
            match self.add(node) {
                Ok(_) => loaded.push(nd),
                Err(err) => tracing::warn!(node = %nd.id, %err, "skipping node"),
            }
        }
        for id in doc.outputs.iter().chain(&doc.inputs) {
            if self.node(id).is_none() {
                tracing::debug!(node = %id, "listed boundary node is missing");
            }
        }

        // Phase 2: parameters, node data, connections
        let context = self.context.clone();
        let pending = self.pending.clone();
        for (key, pd) in &doc.parameters {
            let owner = key
                .strip_suffix(&format!(".{}", pd.name))
                .or_else(|| key.split_once('.').map(|(id, _)| id))
                .and_then(|id| self.node(id))
                .map(|n| n.id().clone());
            let Some(owner) = owner else {
                tracing::warn!(parameter = %key, "parameter owner missing, skipping");
                continue;
            };
            let mut parameter = Parameter::from_document(pd, &context);
            parameter.attach(&owner, &pending);
            self.parameters.insert(key.clone(), parameter);
        }
        self.custom_parameters = doc
            .custom_parameters
            .iter()
            .map(|pd| Parameter::from_document(pd, &context))
            .collect();
        self.custom_functions = doc
            .custom_functions
            .iter()
            .map(|gd| FunctionGraph::from_document(gd, context.clone()))
            .collect();

        for nd in &loaded {
            if let Some(node) = self.node_mut(&nd.id) {
                node.read_data(&nd.data, &context);
                let size = (node.width(), node.height());
                self.origin_sizes.insert(nd.id.as_str().into(), size);
            }
        }

        for nd in &loaded {
            for conn in &nd.outputs {
                if let Err(err) = self.link(
                    &nd.id,
                    conn.from_output_index,
                    &conn.to_node_id,
                    conn.to_input_index,
                ) {
                    tracing::warn!(from = %nd.id, to = %conn.to_node_id, %err, "skipping connection");
                }
            }
        }

        if let Some(output) = &doc.output_node {
            if self.node(output).is_some() {
                self.function_output = Some(output.as_str().into());
            }
        }
        self.pending.borrow_mut().clear();
    }
}

impl FunctionGraph {
    /// Document form, output node included
    pub fn to_document(&self) -> GraphDocument {
        self.graph().to_document()
    }

    /// Build a function graph from a document, resolving types only
    pub fn from_document(doc: &GraphDocument, context: GraphContext) -> Self {
        let mut graph = Graph::with_context(doc.name.clone(), context);
        graph.load_document(doc);
        graph.update_output_types();
        Self::from_graph(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_size() {
        assert_eq!(sanitize_size(0), DEFAULT_SIZE);
        assert_eq!(sanitize_size(i64::from(i32::MAX)), DEFAULT_SIZE);
        assert_eq!(sanitize_size(-4), DEFAULT_SIZE);
        assert_eq!(sanitize_size(512), 512);
    }

    #[test]
    fn test_node_payload_is_flattened() {
        let mut graph = Graph::new("test");
        let node = graph.create_node("FloatConstant").unwrap();
        graph
            .update_node(&node, |n| {
                if let crate::node::NodeKind::Constant(c) = n.kind_mut() {
                    c.set_value(0.5_f32);
                }
            })
            .unwrap();
        let doc = serde_json::to_value(graph.node(&node).unwrap().to_document()).unwrap();
        assert_eq!(doc["type"], json!("FloatConstant"));
        assert_eq!(doc["value"], json!(0.5));
        assert!(doc.get("data").is_none());
    }

    #[test]
    fn test_unknown_tags_are_skipped() {
        let text = json!({
            "name": "partial",
            "nodes": [
                { "id": "a", "type": "FloatConstant", "width": 0, "height": 64,
                  "outputs": [{ "toNodeId": "c", "toInputIndex": 0, "fromOutputIndex": 0 }] },
                { "id": "b", "type": "Teapot" },
                { "id": "c", "type": "Exponential", "width": 64, "height": 64,
                  "outputs": [{ "toNodeId": "b", "toInputIndex": 0, "fromOutputIndex": 0 }] }
            ]
        })
        .to_string();
        let graph = Graph::from_json(&text, GraphContext::default()).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node("a").unwrap().width(), DEFAULT_SIZE);
        assert_eq!(graph.output_value("c"), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_cyclic_links_are_skipped() {
        let link = |to: &str| json!([{ "toNodeId": to, "toInputIndex": 0, "fromOutputIndex": 0 }]);
        let text = json!({
            "name": "cyclic",
            "nodes": [
                { "id": "a", "type": "Sine", "outputs": link("b") },
                { "id": "b", "type": "Cosine", "outputs": link("a") },
                { "id": "c", "type": "FloatConstant", "outputs": link("e") },
                { "id": "d", "type": "Negate", "outputs": link("d") },
                { "id": "e", "type": "Exponential" }
            ]
        })
        .to_string();
        let graph = Graph::from_json(&text, GraphContext::default()).unwrap();
        assert_eq!(graph.node_count(), 5);
        assert!(graph.topological_order().is_ok());
        assert!(graph.node("b").unwrap().inputs()[0].has_input());
        assert!(!graph.node("a").unwrap().inputs()[0].has_input());
        assert!(!graph.node("d").unwrap().inputs()[0].has_input());
        assert_eq!(graph.output_value("e"), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_malformed_json() {
        let err = Graph::from_json("{ nodes: ", GraphContext::default()).unwrap_err();
        assert!(matches!(err, DocumentError::Json(_)));
    }

    #[test]
    fn test_unknown_pixel_format() {
        let text = json!({ "defaultTextureType": 7 }).to_string();
        let graph = Graph::from_json(&text, GraphContext::default()).unwrap();
        assert_eq!(graph.default_pixel_format(), PixelFormat::Rgba);
    }
}
