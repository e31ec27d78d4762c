// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function graphs: pure expressions evaluated on demand.
//!
//! A [`FunctionGraph`] is a [`Graph`] with one designated output node whose
//! first output is copied into [`FunctionGraph::result`] every time it
//! recomputes.

use crate::graph::{Graph, GraphContext, GraphError, Result};
use crate::node::{Node, NodeId};
use crate::value::Value;
use std::ops::{Deref, DerefMut};

/// Graph backing a parameter or a pixel processor
#[derive(Debug)]
pub struct FunctionGraph {
    graph: Graph,
    parent_node: Option<NodeId>,
}

impl FunctionGraph {
    /// Create an empty function graph with the default registry
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_graph(Graph::new(name))
    }

    /// Create an empty function graph over explicit collaborators
    pub fn with_context(name: impl Into<String>, context: GraphContext) -> Self {
        Self::from_graph(Graph::with_context(name, context))
    }

    pub(crate) fn from_graph(graph: Graph) -> Self {
        Self {
            graph,
            parent_node: None,
        }
    }

    /// Node owning the parameter this function is bound to
    pub fn parent_node(&self) -> Option<&NodeId> {
        self.parent_node.as_ref()
    }

    pub(crate) fn set_parent_node(&mut self, parent: Option<NodeId>) {
        self.parent_node = parent;
    }

    /// Designated output node
    pub fn output_node(&self) -> Option<&NodeId> {
        self.graph.function_output.as_ref()
    }

    /// Designate the node whose first output becomes the result
    pub fn set_output_node(&mut self, node_id: &str) -> Result<()> {
        let node = self
            .graph
            .node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.into()))?;
        let id = node.id().clone();
        self.graph.result = node.output(0).map_or(Value::Empty, |o| o.data);
        self.graph.function_output = Some(id);
        self.graph.updated();
        Ok(())
    }

    /// Designated output node, if set and present
    pub fn output(&self) -> Option<&Node> {
        self.output_node().and_then(|id| self.graph.node(id))
    }

    /// Last computed value of the output node
    pub fn result(&self) -> Value {
        self.graph.result
    }

    /// Underlying graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Release everything, including the output designation
    pub fn dispose(&mut self) {
        self.graph.dispose();
        self.parent_node = None;
    }
}

impl Deref for FunctionGraph {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &self.graph
    }
}

impl DerefMut for FunctionGraph {
    fn deref_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::GraphEvent;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn exp_of_constant() -> (FunctionGraph, NodeId, NodeId) {
        let mut function = FunctionGraph::new("f");
        let constant = function.create_node("FloatConstant").unwrap();
        let exp = function.create_node("Exponential").unwrap();
        function.connect(&constant, 0, &exp, 0).unwrap();
        function.set_output_node(&exp).unwrap();
        (function, constant, exp)
    }

    #[test]
    fn test_result_tracks_output_node() {
        let (mut function, constant, _) = exp_of_constant();
        function.try_and_process();
        assert_eq!(function.result(), Value::Float(1.0));

        function.set_parameter_value(&constant, "Value", 1.0_f32).unwrap();
        let Value::Float(e) = function.result() else {
            panic!("expected a float result");
        };
        assert!((e - std::f32::consts::E).abs() < 1e-6);
    }

    #[test]
    fn test_output_node_must_exist() {
        let mut function = FunctionGraph::new("f");
        assert!(function.set_output_node("nope").is_err());
        assert!(function.output().is_none());
    }

    #[test]
    fn test_edits_raise_updated() {
        let (mut function, constant, _) = exp_of_constant();
        let events = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&events);
        function.subscribe(move |e: &GraphEvent| log.borrow_mut().push(e.clone()));
        function.set_parameter_value(&constant, "Value", 2.0_f32).unwrap();
        assert_eq!(*events.borrow(), vec![GraphEvent::Updated]);
    }

    #[test]
    fn test_dispose_clears() {
        let (mut function, _, _) = exp_of_constant();
        function.dispose();
        assert_eq!(function.node_count(), 0);
        assert!(function.output_node().is_none());
        assert_eq!(function.result(), Value::Empty);
    }
}
