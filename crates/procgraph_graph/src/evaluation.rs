// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation and execution.
//!
//! Recomputation is push based: a node that recomputes schedules everything
//! downstream of it, and each downstream node runs once, after all of its
//! sources. Nodes whose required inputs are unset stay inert and halt
//! propagation.

use crate::graph::{Graph, MAX_SIZE, MIN_SIZE};
use crate::node::{InputValue, NodeId, NodeRole};
use crate::value::Value;
use std::collections::{HashMap, HashSet};

impl Graph {
    /// Recompute every interior node, then every input node
    pub fn try_and_process(&mut self) {
        self.process_pending();
        for id in self.ids_with_role(NodeRole::Interior) {
            self.try_and_process_node(&id);
        }
        for id in self.ids_with_role(NodeRole::Input) {
            self.try_and_process_node(&id);
        }
    }

    /// Recompute one node if ready, then everything downstream of it
    ///
    /// Downstream nodes run once each, in dependency order, and only when an
    /// upstream node recomputed during this pass.
    pub fn try_and_process_node(&mut self, node_id: &str) {
        if !self.process_single(node_id) {
            return;
        }

        let mut changed: HashSet<NodeId> = HashSet::new();
        changed.insert(NodeId::from(node_id));
        for id in self.downstream_order(node_id) {
            let fed = self.node(&id).is_some_and(|node| {
                node.edges()
                    .any(|(_, edge)| changed.contains(edge.from_node.as_str()))
            });
            if fed && self.process_single(&id) {
                changed.insert(id);
            }
        }
    }

    /// Process a single node; returns whether it produced new outputs
    fn process_single(&mut self, node_id: &str) -> bool {
        let Some(node) = self.node(node_id) else {
            return false;
        };
        if !node.is_ready() {
            tracing::trace!(node = node_id, tag = node.type_tag(), "inputs unset, node inert");
            return false;
        }

        let inputs = self.gather_inputs(node_id);
        let parameters = self.bound_parameter_values(node_id);
        let renderer = self.context.renderer.clone();

        let Some(node) = self.node_mut(node_id) else {
            return false;
        };
        if !node.process(&inputs, &parameters, renderer.as_ref()) {
            return false;
        }
        let first_output = node.output(0).map_or(Value::Empty, |o| o.data);

        if self.function_output.as_deref() == Some(node_id) {
            self.result = first_output;
        }
        true
    }

    /// Nodes reachable from `node_id` through listeners, sources first, excluding it
    fn downstream_order(&self, node_id: &str) -> Vec<NodeId> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<(NodeId, bool)> = vec![(NodeId::from(node_id), false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id.clone()) {
                continue;
            }
            let listeners = self.node(&id).map(|node| node.listeners()).unwrap_or_default();
            stack.push((id, true));
            stack.extend(
                listeners
                    .into_iter()
                    .filter(|listener| !visited.contains(listener))
                    .map(|listener| (listener, false)),
            );
        }
        order.pop();
        order.reverse();
        order
    }

    /// Reprocess nodes whose bound functions changed since the last pass
    pub fn process_pending(&mut self) {
        let pending: Vec<NodeId> = self.pending.borrow_mut().drain(..).collect();
        let mut seen = Vec::new();
        for id in pending {
            if !seen.contains(&id) {
                self.try_and_process_node(&id);
                seen.push(id);
            }
        }
    }

    /// Rescale interior nodes relative to the graph size, then recompute
    ///
    /// Each node keeps its proportion to the size recorded when it was
    /// added or loaded, clamped to `[MIN_SIZE, MAX_SIZE]`.
    pub fn resize_with(&mut self, width: u32, height: u32) {
        let ratio_x = f64::from(width) / f64::from(self.width().max(1));
        let ratio_y = f64::from(height) / f64::from(self.height().max(1));

        for id in self.ids_with_role(NodeRole::Interior) {
            let Some(&(origin_w, origin_h)) = self.origin_sizes.get(&id) else {
                continue;
            };
            let w = scale(origin_w, ratio_x);
            let h = scale(origin_h, ratio_y);
            if let Some(node) = self.node_mut(&id) {
                node.set_size(w, h);
            }
        }

        self.try_and_process();
    }

    fn ids_with_role(&self, role: NodeRole) -> Vec<NodeId> {
        self.nodes()
            .filter(|node| node.role() == role)
            .map(|node| node.id().clone())
            .collect()
    }

    fn gather_inputs(&self, node_id: &str) -> Vec<Option<InputValue>> {
        let Some(node) = self.node(node_id) else {
            return Vec::new();
        };
        node.inputs()
            .iter()
            .map(|port| {
                let edge = port.edge()?;
                let output = self.node(&edge.from_node)?.output(edge.from_output)?;
                Some(InputValue {
                    ty: output.resolved,
                    value: output.data,
                })
            })
            .collect()
    }

    /// Current values of every parameter bound to a node, functions evaluated
    fn bound_parameter_values(&mut self, node_id: &str) -> HashMap<String, Value> {
        let prefix = format!("{node_id}.");
        self.parameters
            .iter_mut()
            .filter_map(|(key, parameter)| {
                let name = key.strip_prefix(&prefix)?;
                Some((name.to_string(), parameter.evaluate()))
            })
            .collect()
    }
}

fn scale(origin: u32, ratio: f64) -> u32 {
    let scaled = (f64::from(origin) * ratio).round();
    scaled.clamp(f64::from(MIN_SIZE), f64::from(MAX_SIZE)) as u32
}
