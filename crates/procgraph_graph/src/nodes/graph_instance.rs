// SPDX-License-Identifier: MIT OR Apache-2.0
//! A child graph embedded as a single node.
//!
//! Ports mirror the child's input and output nodes in their graph order.

use crate::connection::PortRef;
use crate::document::GraphDocument;
use crate::graph::{Graph, GraphContext, GraphError, Result};
use crate::node::{NodeBehavior, NodeId, NodeKind, ProcessContext};
use crate::port::{InputPort, NodeType, OutputPort};
use crate::renderer::Renderer;
use serde_json::{Map, Value as JsonValue};

/// Embedded child graph
#[derive(Debug, Default)]
pub struct GraphInstanceNode {
    graph: Option<Box<Graph>>,
    input_ids: Vec<NodeId>,
    output_ids: Vec<NodeId>,
    /// Size the child was last resized to
    applied: Option<(u32, u32)>,
}

impl GraphInstanceNode {
    /// Instance of `graph`
    pub fn new(graph: Graph) -> Self {
        let mut node = Self::default();
        node.set_graph(graph);
        node
    }

    /// Child graph, if loaded
    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_deref()
    }

    /// Size the child graph currently runs at
    pub fn applied_size(&self) -> Option<(u32, u32)> {
        self.applied
    }

    fn set_graph(&mut self, graph: Graph) {
        self.input_ids = graph.input_node_ids().to_vec();
        self.output_ids = graph.output_node_ids().to_vec();
        self.applied = Some((graph.width(), graph.height()));
        self.graph = Some(Box::new(graph));
    }

    fn port_name(&self, id: &NodeId) -> String {
        self.graph
            .as_ref()
            .and_then(|g| g.node(id))
            .map_or_else(|| id.to_string(), |n| n.name.clone())
    }
}

impl NodeBehavior for GraphInstanceNode {
    fn type_tag(&self) -> &'static str {
        "GraphInstance"
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        let inputs = self
            .input_ids
            .iter()
            .map(|id| InputPort::required(self.port_name(id), NodeType::ANY_DATA))
            .collect();
        let outputs = self
            .output_ids
            .iter()
            .map(|id| OutputPort::new(self.port_name(id), NodeType::ANY_DATA))
            .collect();
        (inputs, outputs)
    }

    fn update_output_type(&self, _inputs: &[InputPort], outputs: &mut [OutputPort]) {
        let Some(graph) = &self.graph else {
            return;
        };
        for (output, id) in outputs.iter_mut().zip(&self.output_ids) {
            if let Some(port) = graph.node(id).and_then(|n| n.output(0)) {
                output.resolved = port.resolved;
            }
        }
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        let Some(graph) = self.graph.as_deref_mut() else {
            return false;
        };

        let target = (ctx.width, ctx.height);
        if self.applied != Some(target) {
            graph.resize_with(target.0, target.1);
            self.applied = Some(target);
        }
        for (index, id) in self.input_ids.iter().enumerate() {
            if let Some(input) = ctx.input(index) {
                if let Err(err) = graph.set_input_value(id, input.value) {
                    tracing::warn!(node = %id, %err, "could not seed instance input");
                }
            }
        }
        graph.try_and_process();

        for (index, id) in self.output_ids.iter().enumerate() {
            ctx.set_output(index, graph.output_value(id).unwrap_or_default());
        }
        true
    }

    fn write_data(&self, data: &mut Map<String, JsonValue>) {
        let Some(graph) = &self.graph else {
            return;
        };
        if let Ok(doc) = serde_json::to_value(graph.to_document()) {
            data.insert("graph".to_string(), doc);
        }
    }

    fn read_data(&mut self, data: &Map<String, JsonValue>, ctx: &GraphContext) {
        let Some(doc) = data.get("graph") else {
            return;
        };
        match serde_json::from_value::<GraphDocument>(doc.clone()) {
            Ok(doc) => self.set_graph(Graph::from_document(&doc, ctx.clone())),
            Err(err) => tracing::warn!(%err, "malformed instance graph"),
        }
    }

    fn release(&mut self, _renderer: Option<&dyn Renderer>) {
        if let Some(graph) = self.graph.as_deref_mut() {
            graph.release_intermediate_buffers();
        }
    }
}

impl Graph {
    /// Replace the child of a graph instance node
    ///
    /// The node's ports are rebuilt from the new child, so every edge on the
    /// node is removed first.
    pub fn set_instance_graph(&mut self, node_id: &str, child: Graph) -> Result<()> {
        if self.is_read_only() {
            return Err(GraphError::ReadOnly);
        }
        let node = self
            .node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.into()))?;
        if !matches!(node.kind(), NodeKind::GraphInstance(_)) {
            return Err(GraphError::NotAnInstance(node_id.into()));
        }

        let incoming: Vec<usize> = node.edges().map(|(i, _)| i).collect();
        let outgoing: Vec<PortRef> = node
            .outputs()
            .iter()
            .flat_map(|o| o.listeners().iter().cloned())
            .collect();
        for input in incoming {
            self.unlink(node_id, input);
        }
        for PortRef { node, input } in outgoing {
            self.unlink(&node, input);
        }

        if let Some(node) = self.node_mut(node_id) {
            if let NodeKind::GraphInstance(instance) = node.kind_mut() {
                instance.set_graph(child);
            }
            node.sync_ports();
        }
        self.updated();
        self.try_and_process_node(node_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn constant_child() -> (Graph, NodeId) {
        let mut child = Graph::new("child");
        let constant = child.create_node("FloatConstant").unwrap();
        let output = child.create_node("Output").unwrap();
        child.connect(&constant, 0, &output, 0).unwrap();
        (child, constant)
    }

    fn instance(graph: &Graph, node_id: &str) -> Option<(u32, u32)> {
        match graph.node(node_id)?.kind() {
            NodeKind::GraphInstance(gi) => gi.applied_size(),
            _ => None,
        }
    }

    #[test]
    fn test_child_resized_to_instance() {
        let (child, constant) = constant_child();
        let mut graph = Graph::new("parent");
        graph.set_width(128);
        graph.set_height(128);
        let node = graph.create_node("GraphInstance").unwrap();
        graph.set_instance_graph(&node, child).unwrap();

        assert_eq!(instance(&graph, &node), Some((128, 128)));
        let inner = graph.find_sub_node_by_id(&constant).unwrap();
        assert_eq!((inner.width(), inner.height()), (128, 128));
        assert_eq!(graph.output_value(&node), Some(Value::Float(0.0)));
    }

    #[test]
    fn test_matching_size_skips_resize() {
        let (child, constant) = constant_child();
        let mut graph = Graph::new("parent");
        let node = graph.create_node("GraphInstance").unwrap();
        graph.set_instance_graph(&node, child).unwrap();
        assert_eq!(instance(&graph, &node), Some((256, 256)));

        graph.try_and_process_node(&node);
        assert_eq!(instance(&graph, &node), Some((256, 256)));
        let inner = graph.find_sub_node_by_id(&constant).unwrap();
        assert_eq!(inner.width(), 256);
    }
}
