// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.
//!
//! Nodes live in an ordered arena keyed by [`NodeId`]. Edges are stored on
//! the input side and mirrored as listener lists on the source outputs, so
//! both directions are a lookup away. All back-references are ids.

use crate::connection::{Edge, PortRef};
use crate::events::{GraphEvent, SubscriptionId, Subscribers};
use crate::function::FunctionGraph;
use crate::node::{Node, NodeId, NodeKind, NodeRegistry, NodeRole, NodeSettings, PixelFormat};
use crate::parameter::Parameter;
use crate::port::NodeType;
use crate::renderer::Renderer;
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Smallest node resolution
pub const MIN_SIZE: u32 = 8;
/// Largest node resolution
pub const MAX_SIZE: u32 = 4096;
/// Resolution used when none is given
pub const DEFAULT_SIZE: u32 = 256;

/// Environment map selection shared with the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HdriSelection {
    /// Currently selected key
    pub selected: String,
    /// Keys the host can provide
    pub available: Vec<String>,
}

/// Collaborators handed to every graph at construction
#[derive(Clone)]
pub struct GraphContext {
    /// Node factories by tag
    pub registry: Rc<NodeRegistry>,
    /// Environment map selection
    pub hdri: HdriSelection,
    /// GPU backend, absent when running headless
    pub renderer: Option<Rc<dyn Renderer>>,
}

impl GraphContext {
    /// Context over a registry, without renderer
    pub fn new(registry: Rc<NodeRegistry>) -> Self {
        Self {
            registry,
            hdri: HdriSelection::default(),
            renderer: None,
        }
    }

    /// Attach a renderer
    pub fn with_renderer(mut self, renderer: Rc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Attach an environment map selection
    pub fn with_hdri(mut self, hdri: HdriSelection) -> Self {
        self.hdri = hdri;
        self
    }
}

impl Default for GraphContext {
    fn default() -> Self {
        Self::new(Rc::new(NodeRegistry::with_defaults()))
    }
}

impl fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphContext")
            .field("registry", &self.registry)
            .field("hdri", &self.hdri)
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

/// Editor pan and zoom, carried through documents untouched
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Horizontal pan
    pub shift_x: f64,
    /// Vertical pan
    pub shift_y: f64,
    /// Zoom factor
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            shift_x: 0.0,
            shift_y: 0.0,
            zoom: 1.0,
        }
    }
}

/// A node graph
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Editor viewport
    pub viewport: Viewport,
    nodes: IndexMap<NodeId, Node>,
    output_nodes: Vec<NodeId>,
    input_nodes: Vec<NodeId>,
    pub(crate) parameters: IndexMap<String, Parameter>,
    pub(crate) custom_parameters: Vec<Parameter>,
    pub(crate) custom_functions: Vec<FunctionGraph>,
    width: u32,
    height: u32,
    default_pixel_format: PixelFormat,
    hdri_index: String,
    read_only: bool,
    pub(crate) origin_sizes: HashMap<NodeId, (u32, u32)>,
    pub(crate) context: GraphContext,
    events: Subscribers<GraphEvent>,
    pub(crate) pending: Rc<RefCell<Vec<NodeId>>>,
    pub(crate) function_output: Option<NodeId>,
    pub(crate) result: Value,
}

impl Graph {
    /// Create a new empty graph with the default registry
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_context(name, GraphContext::default())
    }

    /// Create a new empty graph over explicit collaborators
    pub fn with_context(name: impl Into<String>, context: GraphContext) -> Self {
        Self {
            name: name.into(),
            viewport: Viewport::default(),
            nodes: IndexMap::new(),
            output_nodes: Vec::new(),
            input_nodes: Vec::new(),
            parameters: IndexMap::new(),
            custom_parameters: Vec::new(),
            custom_functions: Vec::new(),
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            default_pixel_format: PixelFormat::Rgba,
            hdri_index: context.hdri.selected.clone(),
            read_only: false,
            origin_sizes: HashMap::new(),
            context,
            events: Subscribers::new(),
            pending: Rc::new(RefCell::new(Vec::new())),
            function_output: None,
            result: Value::Empty,
        }
    }

    /// Collaborators this graph was built with
    pub fn context(&self) -> &GraphContext {
        &self.context
    }

    /// Swap the renderer collaborator
    pub fn set_renderer(&mut self, renderer: Option<Rc<dyn Renderer>>) {
        self.context.renderer = renderer;
    }

    /// Whether structural mutation is blocked
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Block or allow structural mutation
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Graph width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Graph height
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format for new nodes
    pub fn default_pixel_format(&self) -> PixelFormat {
        self.default_pixel_format
    }

    /// Settings new nodes are created with
    pub fn settings(&self) -> NodeSettings {
        NodeSettings {
            width: self.width,
            height: self.height,
            pixel_format: self.default_pixel_format,
        }
    }

    /// Set the graph width; ignored when read-only
    pub fn set_width(&mut self, width: u32) {
        if self.blocked("set_width") {
            return;
        }
        self.width = width;
        self.updated();
    }

    /// Set the graph height; ignored when read-only
    pub fn set_height(&mut self, height: u32) {
        if self.blocked("set_height") {
            return;
        }
        self.height = height;
        self.updated();
    }

    /// Set the pixel format for new nodes; ignored when read-only
    pub fn set_default_pixel_format(&mut self, format: PixelFormat) {
        if self.blocked("set_default_pixel_format") {
            return;
        }
        self.default_pixel_format = format;
        self.updated();
    }

    /// Selected environment map key
    pub fn hdri_index(&self) -> &str {
        &self.hdri_index
    }

    /// Select an environment map for this graph
    ///
    /// The graph's own copy of the context records the key. Other graphs and
    /// the host keep their selection.
    pub fn set_hdri_index(&mut self, key: impl Into<String>) {
        self.hdri_index = key.into();
        self.context.hdri.selected.clone_from(&self.hdri_index);
    }

    fn blocked(&self, operation: &str) -> bool {
        if self.read_only {
            tracing::debug!(graph = %self.name, operation, "graph is read-only");
        }
        self.read_only
    }

    /// Add a node to the graph
    pub fn add(&mut self, node: Node) -> Result<NodeId> {
        if self.read_only {
            return Err(GraphError::ReadOnly);
        }
        if self.nodes.contains_key(node.id()) {
            return Err(GraphError::DuplicateNode(node.id().clone()));
        }

        let id = node.id().clone();
        match node.role() {
            NodeRole::Output => self.output_nodes.push(id.clone()),
            NodeRole::Input => self.input_nodes.push(id.clone()),
            NodeRole::Interior => {}
        }
        self.origin_sizes
            .insert(id.clone(), (node.width(), node.height()));
        self.nodes.insert(id.clone(), node);
        self.updated();
        Ok(id)
    }

    /// Create a node from a registry tag and add it
    ///
    /// Returns `None` when the graph is read-only or the tag is unknown.
    pub fn create_node(&mut self, tag: &str) -> Option<NodeId> {
        if self.blocked("create_node") {
            return None;
        }
        let Some(node) = self.context.registry.create_node(tag, &self.settings()) else {
            tracing::warn!(graph = %self.name, tag, "unknown node type");
            return None;
        };
        self.add(node).ok()
    }

    /// Remove a node, its connections and its parameters, then release it
    pub fn remove(&mut self, node_id: &str) -> Result<Node> {
        if self.read_only {
            return Err(GraphError::ReadOnly);
        }
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.into()))?;

        let incoming: Vec<usize> = node.edges().map(|(i, _)| i).collect();
        let outgoing: Vec<PortRef> = node
            .outputs
            .iter()
            .flat_map(|o| o.listeners.iter().cloned())
            .collect();

        for input in incoming {
            self.unlink(node_id, input);
        }
        for PortRef { node, input } in outgoing {
            self.unlink(node.as_str(), input);
        }

        self.output_nodes.retain(|id| id.as_str() != node_id);
        self.input_nodes.retain(|id| id.as_str() != node_id);
        self.origin_sizes.remove(node_id);
        if self.function_output.as_deref() == Some(node_id) {
            self.function_output = None;
        }

        let prefix = format!("{node_id}.");
        let keys: Vec<String> = self
            .parameters
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in keys {
            if let Some(mut parameter) = self.parameters.shift_remove(&key) {
                parameter.detach();
            }
        }

        let mut node = self
            .nodes
            .shift_remove(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.into()))?;
        node.release(self.context.renderer.as_deref());
        self.updated();
        Ok(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub(crate) fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    /// Mutate a node in place, then refresh its types and raise the updated event
    pub fn update_node<R>(&mut self, node_id: &str, f: impl FnOnce(&mut Node) -> R) -> Option<R> {
        let node = self.nodes.get_mut(node_id)?;
        let result = f(node);
        node.update_output_type();
        self.propagate_types(node_id);
        self.updated();
        Some(result)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes classified as outputs
    pub fn output_node_ids(&self) -> &[NodeId] {
        &self.output_nodes
    }

    /// Nodes classified as inputs
    pub fn input_node_ids(&self) -> &[NodeId] {
        &self.input_nodes
    }

    /// Exposed graph-level parameters
    pub fn custom_parameters(&self) -> &[Parameter] {
        &self.custom_parameters
    }

    /// Expose a graph-level parameter
    pub fn add_custom_parameter(&mut self, parameter: Parameter) {
        self.custom_parameters.push(parameter);
        self.updated();
    }

    /// Named function graphs owned by this graph
    pub fn custom_functions(&self) -> &[FunctionGraph] {
        &self.custom_functions
    }

    /// Add a named function graph
    pub fn add_custom_function(&mut self, function: FunctionGraph) {
        self.custom_functions.push(function);
        self.updated();
    }

    /// Connect an output to an input, then recompute the target
    pub fn connect(
        &mut self,
        from_node: &str,
        from_output: usize,
        to_node: &str,
        to_input: usize,
    ) -> Result<()> {
        self.link(from_node, from_output, to_node, to_input)?;
        self.updated();
        self.try_and_process_node(to_node);
        Ok(())
    }

    /// Wire an edge and resolve types without recomputing
    pub(crate) fn link(
        &mut self,
        from_node: &str,
        from_output: usize,
        to_node: &str,
        to_input: usize,
    ) -> Result<()> {
        if self.read_only {
            return Err(GraphError::ReadOnly);
        }

        // Validate nodes exist
        let source = self
            .nodes
            .get(from_node)
            .ok_or_else(|| GraphError::NodeNotFound(from_node.into()))?;
        let target = self
            .nodes
            .get(to_node)
            .ok_or_else(|| GraphError::NodeNotFound(to_node.into()))?;

        // Validate ports exist
        let source_type = source
            .output(from_output)
            .ok_or_else(|| GraphError::OutputOutOfRange {
                node: source.id().clone(),
                index: from_output,
            })?
            .resolved;
        let accepted = target
            .input(to_input)
            .ok_or_else(|| GraphError::InputOutOfRange {
                node: target.id().clone(),
                index: to_input,
            })?
            .accepted;

        if !source_type.can_connect_to(accepted) {
            return Err(GraphError::IncompatibleTypes {
                from: source_type,
                to: accepted,
            });
        }
        if from_node == to_node {
            return Err(GraphError::SelfLoop);
        }
        if self.is_upstream(to_node, from_node) {
            return Err(GraphError::Cycle);
        }

        let from_id = source.id().clone();
        let to_id = target.id().clone();
        self.unlink(to_node, to_input);

        if let Some(output) = self
            .nodes
            .get_mut(from_node)
            .and_then(|n| n.outputs.get_mut(from_output))
        {
            output.listeners.push(PortRef::new(to_id, to_input));
        }
        if let Some(node) = self.nodes.get_mut(to_node) {
            if let Some(input) = node.inputs.get_mut(to_input) {
                input.edge = Some(Edge::new(from_id, from_output));
                input.resolved = if source_type.is_resolved() {
                    source_type
                } else {
                    accepted
                };
            }
            node.update_output_type();
        }
        self.propagate_types(to_node);
        Ok(())
    }

    /// Remove the edge feeding an input
    pub fn disconnect(&mut self, to_node: &str, to_input: usize) -> Result<()> {
        if self.read_only {
            return Err(GraphError::ReadOnly);
        }
        let node = self
            .nodes
            .get(to_node)
            .ok_or_else(|| GraphError::NodeNotFound(to_node.into()))?;
        if node.input(to_input).is_none() {
            return Err(GraphError::InputOutOfRange {
                node: node.id().clone(),
                index: to_input,
            });
        }
        if self.unlink(to_node, to_input).is_some() {
            self.updated();
        }
        Ok(())
    }

    /// Detach an input from its source, keeping the target's output types
    pub(crate) fn unlink(&mut self, to_node: &str, to_input: usize) -> Option<Edge> {
        let edge = self
            .nodes
            .get_mut(to_node)?
            .inputs
            .get_mut(to_input)?
            .reset()?;
        if let Some(output) = self
            .nodes
            .get_mut(edge.from_node.as_str())
            .and_then(|n| n.outputs.get_mut(edge.from_output))
        {
            output
                .listeners
                .retain(|r| !(r.involves_node(to_node) && r.input == to_input));
        }
        Some(edge)
    }

    /// Whether `candidate` feeds `node_id`, directly or transitively
    pub fn is_upstream(&self, candidate: &str, node_id: &str) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![node_id];
        while let Some(current) = stack.pop() {
            if current == candidate {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.edges().map(|(_, e)| e.from_node.as_str()));
            }
        }
        false
    }

    /// Copy resolved source types onto a node's inputs; returns whether outputs changed
    fn refresh_input_types(&mut self, node_id: &str) -> bool {
        let Some(node) = self.nodes.get(node_id) else {
            return false;
        };
        let sources: Vec<(usize, NodeType)> = node
            .edges()
            .filter_map(|(i, edge)| {
                let ty = self
                    .nodes
                    .get(edge.from_node.as_str())?
                    .output(edge.from_output)?
                    .resolved;
                ty.is_resolved().then_some((i, ty))
            })
            .collect();

        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        let before: Vec<NodeType> = node.outputs.iter().map(|o| o.resolved).collect();
        for (i, ty) in sources {
            if let Some(input) = node.inputs.get_mut(i) {
                if ty.intersects(input.accepted) {
                    input.resolved = ty;
                } else {
                    tracing::warn!(
                        node = node_id,
                        input = %input.name,
                        source = ?ty,
                        accepted = ?input.accepted,
                        "upstream type no longer accepted, input left unresolved"
                    );
                    input.resolved = input.accepted;
                }
            }
        }
        node.update_output_type();
        node.outputs
            .iter()
            .map(|o| o.resolved)
            .ne(before.into_iter())
    }

    /// Push output types downstream from a node until nothing changes
    pub(crate) fn propagate_types(&mut self, node_id: &str) {
        let mut queue: Vec<NodeId> = match self.nodes.get(node_id) {
            Some(node) => node.listeners(),
            None => return,
        };
        while let Some(id) = queue.pop() {
            if self.refresh_input_types(id.as_str()) {
                if let Some(node) = self.nodes.get(id.as_str()) {
                    queue.extend(node.listeners());
                }
            }
        }
    }

    /// Resolve every node's types in dependency order
    pub fn update_output_types(&mut self) {
        let order = match self.topological_order() {
            Ok(order) => order,
            Err(_) => self.nodes.keys().cloned().collect(),
        };
        for id in order {
            self.refresh_input_types(id.as_str());
        }
    }

    /// Get nodes in dependency order, sources first
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut visited = HashSet::new();
        let mut temp_mark = HashSet::new();
        let mut order = Vec::new();

        for node_id in self.nodes.keys() {
            if !visited.contains(node_id) {
                self.visit(node_id, &mut visited, &mut temp_mark, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node_id: &NodeId,
        visited: &mut HashSet<NodeId>,
        temp_mark: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<()> {
        if temp_mark.contains(node_id) {
            return Err(GraphError::Cycle);
        }
        if visited.contains(node_id) {
            return Ok(());
        }

        temp_mark.insert(node_id.clone());

        // Visit all nodes that this node depends on
        if let Some(node) = self.nodes.get(node_id) {
            for (_, edge) in node.edges() {
                self.visit(&edge.from_node, visited, temp_mark, order)?;
            }
        }

        temp_mark.remove(node_id);
        visited.insert(node_id.clone());
        order.push(node_id.clone());

        Ok(())
    }

    /// Seed an input node and recompute everything downstream of it
    pub fn set_input_value(&mut self, node_id: &str, value: impl Into<Value>) -> Result<()> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.into()))?;
        let NodeKind::Input(input) = node.kind_mut() else {
            return Err(GraphError::NotAnInput(node_id.into()));
        };
        input.seed(value.into());
        node.update_output_type();
        self.propagate_types(node_id);
        self.updated();
        self.try_and_process_node(node_id);
        Ok(())
    }

    /// Last value on a node's first output
    pub fn output_value(&self, node_id: &str) -> Option<Value> {
        self.output_value_at(node_id, 0)
    }

    /// Last value on a node output
    pub fn output_value_at(&self, node_id: &str, index: usize) -> Option<Value> {
        Some(self.nodes.get(node_id)?.output(index)?.data)
    }

    /// Listen for [`GraphEvent::Updated`]
    pub fn subscribe(&mut self, listener: impl FnMut(&GraphEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    /// Stop listening
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(crate) fn updated(&mut self) {
        self.events.emit(&GraphEvent::Updated);
    }

    /// Release renderer textures held by every node except outputs
    pub fn release_intermediate_buffers(&mut self) {
        let renderer = self.context.renderer.clone();
        for node in self.nodes.values_mut() {
            if node.role() != NodeRole::Output {
                node.release(renderer.as_deref());
            }
        }
    }

    /// Find a node here or inside any nested function or instance graph
    pub fn find_sub_node_by_id(&self, node_id: &str) -> Option<&Node> {
        if let Some(node) = self.nodes.get(node_id) {
            return Some(node);
        }
        let nested = self.nodes.values().filter_map(|node| match node.kind() {
            NodeKind::PixelProcessor(pp) => Some(&**pp.function()),
            NodeKind::GraphInstance(gi) => gi.graph(),
            _ => None,
        });
        let functions = self
            .parameters
            .values()
            .chain(&self.custom_parameters)
            .filter_map(|p| p.function().map(|f| &**f))
            .chain(self.custom_functions.iter().map(|f| &**f));

        nested
            .chain(functions)
            .find_map(|graph| graph.find_sub_node_by_id(node_id))
    }

    /// Release every node and function and empty the graph
    pub fn dispose(&mut self) {
        let renderer = self.context.renderer.clone();
        for node in self.nodes.values_mut() {
            node.release(renderer.as_deref());
        }
        for parameter in self.parameters.values_mut() {
            parameter.detach();
        }
        for parameter in &mut self.custom_parameters {
            parameter.detach();
        }
        for function in &mut self.custom_functions {
            function.dispose();
        }
        self.nodes.clear();
        self.output_nodes.clear();
        self.input_nodes.clear();
        self.parameters.clear();
        self.custom_parameters.clear();
        self.custom_functions.clear();
        self.origin_sizes.clear();
        self.pending.borrow_mut().clear();
        self.function_output = None;
        self.result = Value::Empty;
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("parameters", &self.parameters.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error from a structural graph operation
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A node with this ID is already present
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node is not an input node
    #[error("Not an input node: {0}")]
    NotAnInput(NodeId),

    /// Node is not a graph instance
    #[error("Not a graph instance node: {0}")]
    NotAnInstance(NodeId),

    /// Input index out of range
    #[error("Input {index} out of range on node {node}")]
    InputOutOfRange {
        /// Node addressed
        node: NodeId,
        /// Requested index
        index: usize,
    },

    /// Output index out of range
    #[error("Output {index} out of range on node {node}")]
    OutputOutOfRange {
        /// Node addressed
        node: NodeId,
        /// Requested index
        index: usize,
    },

    /// Incompatible port types
    #[error("Incompatible port types: {from:?} -> {to:?}")]
    IncompatibleTypes {
        /// Source output type
        from: NodeType,
        /// Types the target input accepts
        to: NodeType,
    },

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// Connection would close a cycle
    #[error("Connection would create a cycle")]
    Cycle,

    /// Graph is read-only
    #[error("Graph is read-only")]
    ReadOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(tags: &[&str]) -> (Graph, Vec<NodeId>) {
        let mut graph = Graph::new("test");
        let ids = tags
            .iter()
            .map(|tag| graph.create_node(tag).unwrap())
            .collect();
        (graph, ids)
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut graph = Graph::new("test");
        let registry = NodeRegistry::with_defaults();
        let node = registry
            .create_node("Exponential", &NodeSettings::default())
            .unwrap()
            .with_id("a");
        graph.add(node).unwrap();
        let again = registry
            .create_node("Log", &NodeSettings::default())
            .unwrap()
            .with_id("a");
        assert!(matches!(graph.add(again), Err(GraphError::DuplicateNode(_))));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_classification() {
        let (graph, ids) = graph_with(&["Input", "Exponential", "Output"]);
        assert_eq!(graph.input_node_ids(), &ids[0..1]);
        assert_eq!(graph.output_node_ids(), &ids[2..3]);
    }

    #[test]
    fn test_unknown_tag() {
        let mut graph = Graph::new("test");
        assert!(graph.create_node("Teapot").is_none());
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_read_only() {
        let mut graph = Graph::new("test");
        graph.set_read_only(true);
        assert!(graph.create_node("Exponential").is_none());
        graph.set_width(1024);
        graph.set_default_pixel_format(PixelFormat::Rgba32F);
        assert_eq!(graph.width(), DEFAULT_SIZE);
        assert_eq!(graph.default_pixel_format(), PixelFormat::Rgba);
    }

    #[test]
    fn test_connect_validation() {
        let (mut graph, ids) = graph_with(&["BoolConstant", "Exponential", "Log"]);
        assert!(matches!(
            graph.connect(&ids[0], 0, &ids[1], 0),
            Err(GraphError::IncompatibleTypes { .. })
        ));
        assert!(matches!(
            graph.connect(&ids[1], 0, &ids[1], 0),
            Err(GraphError::SelfLoop)
        ));
        assert!(matches!(
            graph.connect(&ids[1], 3, &ids[2], 0),
            Err(GraphError::OutputOutOfRange { .. })
        ));

        graph.connect(&ids[1], 0, &ids[2], 0).unwrap();
        assert!(matches!(
            graph.connect(&ids[2], 0, &ids[1], 0),
            Err(GraphError::Cycle)
        ));
    }

    #[test]
    fn test_reconnect_replaces_edge() {
        let (mut graph, ids) = graph_with(&["FloatConstant", "Float3Constant", "Exponential"]);
        graph.connect(&ids[0], 0, &ids[2], 0).unwrap();
        graph.connect(&ids[1], 0, &ids[2], 0).unwrap();

        assert!(graph.node(&ids[0]).unwrap().outputs()[0].listeners().is_empty());
        assert_eq!(graph.node(&ids[1]).unwrap().outputs()[0].listeners().len(), 1);
        assert_eq!(graph.node(&ids[2]).unwrap().outputs()[0].resolved, NodeType::FLOAT3);
    }

    #[test]
    fn test_remove_cleans_up() {
        let (mut graph, ids) = graph_with(&["FloatConstant", "Exponential", "Output"]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap();
        graph.connect(&ids[1], 0, &ids[2], 0).unwrap();
        graph
            .set_parameter_value(&ids[1], "Strength", 0.5_f32)
            .unwrap();

        graph.remove(&ids[1]).unwrap();
        assert!(graph.node(&ids[1]).is_none());
        assert!(graph.node(&ids[0]).unwrap().outputs()[0].listeners().is_empty());
        assert!(!graph.node(&ids[2]).unwrap().inputs()[0].has_input());
        assert!(!graph.has_parameter_value(&ids[1], "Strength"));
    }

    #[test]
    fn test_types_propagate_downstream() {
        let (mut graph, ids) = graph_with(&["Exponential", "Sine", "Float2Constant"]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap();
        graph.connect(&ids[2], 0, &ids[0], 0).unwrap();
        assert_eq!(graph.node(&ids[1]).unwrap().outputs()[0].resolved, NodeType::FLOAT2);
    }

    #[test]
    fn test_unaccepted_upstream_type_is_dropped() {
        let (mut graph, ids) = graph_with(&["Input", "Exponential"]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap();
        graph.set_input_value(&ids[0], true).unwrap();

        let exp = graph.node(&ids[1]).unwrap();
        assert_eq!(exp.inputs()[0].resolved, NodeType::ANY_FLOAT);
        assert_eq!(exp.outputs()[0].resolved, NodeType::FLOAT);
        assert_eq!(graph.output_value(&ids[1]), Some(Value::Float(0.0)));
    }

    #[test]
    fn test_hdri_selection_is_per_graph() {
        let context = GraphContext::default().with_hdri(HdriSelection {
            selected: "studio".to_string(),
            available: vec!["studio".to_string(), "sunset".to_string()],
        });
        let mut graph = Graph::with_context("test", context.clone());
        assert_eq!(graph.hdri_index(), "studio");

        graph.set_hdri_index("sunset");
        assert_eq!(graph.hdri_index(), "sunset");
        assert_eq!(graph.context().hdri.selected, "sunset");
        assert_eq!(context.hdri.selected, "studio");
    }

    #[test]
    fn test_updated_event() {
        let hits = Rc::new(RefCell::new(0));
        let mut graph = Graph::new("test");
        let counter = Rc::clone(&hits);
        let sub = graph.subscribe(move |_| *counter.borrow_mut() += 1);
        graph.create_node("Exponential");
        graph.set_width(512);
        assert_eq!(*hits.borrow(), 2);
        graph.unsubscribe(sub);
        graph.set_width(128);
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn test_topological_order() {
        let (mut graph, ids) = graph_with(&["Output", "Exponential", "FloatConstant"]);
        graph.connect(&ids[2], 0, &ids[1], 0).unwrap();
        graph.connect(&ids[1], 0, &ids[0], 0).unwrap();
        assert_eq!(graph.topological_order().unwrap(), vec![
            ids[2].clone(),
            ids[1].clone(),
            ids[0].clone()
        ]);
    }
}
