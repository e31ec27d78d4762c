// SPDX-License-Identifier: MIT OR Apache-2.0
//! Named, typed values bound to nodes.
//!
//! A parameter is keyed by `"<node id>.<name>"` on its graph and holds
//! either a literal or a [`FunctionGraph`]. Function bindings are live: when
//! the function graph is edited the owning node is queued for reprocessing.

use crate::events::SubscriptionId;
use crate::function::FunctionGraph;
use crate::graph::{Graph, GraphError, Result};
use crate::node::NodeId;
use crate::port::NodeType;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Literal or function backing a parameter
#[derive(Debug)]
pub enum ParameterValue {
    /// Stored value
    Literal(Value),
    /// Expression evaluated on read
    Function(Box<FunctionGraph>),
}

impl From<Value> for ParameterValue {
    fn from(v: Value) -> Self {
        Self::Literal(v)
    }
}

impl From<f32> for ParameterValue {
    fn from(v: f32) -> Self {
        Self::Literal(Value::Float(v))
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        Self::Literal(Value::Int(v))
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Literal(Value::Bool(v))
    }
}

impl From<[f32; 4]> for ParameterValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Literal(Value::Vector(v))
    }
}

impl From<FunctionGraph> for ParameterValue {
    fn from(f: FunctionGraph) -> Self {
        Self::Function(Box::new(f))
    }
}

/// A named, typed value with a clamp range
#[derive(Debug)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Free text shown to users
    pub description: String,
    ty: NodeType,
    value: ParameterValue,
    /// Lower clamp bound for numeric reads
    pub min: f32,
    /// Upper clamp bound for numeric reads
    pub max: f32,
    pub(crate) subscription: Option<SubscriptionId>,
}

impl Parameter {
    /// Create a float parameter in `[0, 1]`
    pub fn new(name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        Self::typed(name, value, NodeType::FLOAT)
    }

    /// Create a parameter of an explicit type, coercing the value to it
    pub fn typed(name: impl Into<String>, value: impl Into<ParameterValue>, ty: NodeType) -> Self {
        let value = match value.into() {
            ParameterValue::Literal(v) => ParameterValue::Literal(v.coerce(ty)),
            function => function,
        };
        Self {
            name: name.into(),
            description: String::new(),
            ty,
            value,
            min: 0.0,
            max: 1.0,
            subscription: None,
        }
    }

    /// Declared type
    pub fn value_type(&self) -> NodeType {
        self.ty
    }

    /// Retype, replacing a literal that does not fit with the type's default
    pub fn set_type(&mut self, ty: NodeType) {
        self.ty = ty;
        if let ParameterValue::Literal(v) = self.value {
            self.value = ParameterValue::Literal(v.coerce(ty));
        }
    }

    /// Stored literal or function
    pub fn value(&self) -> &ParameterValue {
        &self.value
    }

    /// Stored literal, if this is not a function
    pub fn literal(&self) -> Option<Value> {
        match self.value {
            ParameterValue::Literal(v) => Some(v),
            ParameterValue::Function(_) => None,
        }
    }

    /// Bound function, if any
    pub fn function(&self) -> Option<&FunctionGraph> {
        match &self.value {
            ParameterValue::Function(f) => Some(&**f),
            ParameterValue::Literal(_) => None,
        }
    }

    /// Mutable bound function, if any
    pub fn function_mut(&mut self) -> Option<&mut FunctionGraph> {
        match &mut self.value {
            ParameterValue::Function(f) => Some(&mut **f),
            ParameterValue::Literal(_) => None,
        }
    }

    /// Whether a function is bound
    pub fn is_function(&self) -> bool {
        matches!(self.value, ParameterValue::Function(_))
    }

    /// Literal, or the last result of the bound function
    pub fn current(&self) -> Value {
        match &self.value {
            ParameterValue::Literal(v) => *v,
            ParameterValue::Function(f) => f.result(),
        }
    }

    /// Literal, or the bound function recomputed
    pub fn evaluate(&mut self) -> Value {
        match &mut self.value {
            ParameterValue::Literal(v) => *v,
            ParameterValue::Function(f) => {
                f.try_and_process();
                f.result()
            }
        }
    }

    fn clamp(&self, v: f32) -> f32 {
        v.max(self.min).min(self.max)
    }

    /// Scalar read clamped to `[min, max]`
    pub fn float_value(&self) -> f32 {
        let v = self.current();
        let raw = v
            .as_f32()
            .or_else(|| v.as_vector().map(|c| c[0]))
            .unwrap_or_default();
        self.clamp(raw)
    }

    /// Vector read with every component clamped to `[min, max]`
    pub fn vector_value(&self) -> [f32; 4] {
        let v = self.current();
        let raw = v
            .as_vector()
            .or_else(|| v.as_f32().map(|x| [x; 4]))
            .unwrap_or_default();
        raw.map(|c| self.clamp(c))
    }

    /// Clamped scalar read truncated to an integer
    pub fn int_value(&self) -> i32 {
        self.float_value() as i32
    }

    /// Boolean read; non-boolean values read as `false`
    pub fn bool_value(&self) -> bool {
        match self.current() {
            Value::Bool(b) => b,
            _ => false,
        }
    }

    /// Replace the value without touching the type
    pub(crate) fn replace(&mut self, value: ParameterValue) -> ParameterValue {
        std::mem::replace(&mut self.value, value)
    }

    /// Point a bound function at its owner and queue the owner on edits
    pub(crate) fn attach(&mut self, owner: &NodeId, pending: &Rc<RefCell<Vec<NodeId>>>) {
        if let ParameterValue::Function(f) = &mut self.value {
            f.set_parent_node(Some(owner.clone()));
            let pending = Rc::clone(pending);
            let owner = owner.clone();
            self.subscription = Some(f.subscribe(move |_| pending.borrow_mut().push(owner.clone())));
        }
    }

    /// Drop a bound function's subscription and release it
    pub(crate) fn detach(&mut self) {
        if let ParameterValue::Function(f) = &mut self.value {
            if let Some(id) = self.subscription.take() {
                f.unsubscribe(id);
            }
            f.dispose();
        }
    }
}

/// Type a new value implies, `None` when the current type already fits it
fn inferred_type(current: Option<NodeType>, value: &ParameterValue) -> Option<NodeType> {
    let ParameterValue::Literal(v) = value else {
        return None;
    };
    let shape = match v {
        Value::Float(_) | Value::Int(_) => NodeType::FLOAT,
        Value::Bool(_) => NodeType::BOOL,
        Value::Vector(_) => NodeType::FLOAT4,
        Value::Empty | Value::Texture(_) => return None,
    };
    match current {
        Some(ty) if shape == NodeType::FLOAT4 && ty.arity().is_some_and(|n| n > 1) => None,
        Some(ty) if ty == shape => None,
        _ => Some(shape),
    }
}

fn key(node_id: &str, name: &str) -> String {
    format!("{node_id}.{name}")
}

impl Graph {
    /// Value bound to `(node, name)`; functions are recomputed first
    pub fn get_parameter_value(&mut self, node_id: &str, name: &str) -> Option<Value> {
        self.parameters
            .get_mut(&key(node_id, name))
            .map(Parameter::evaluate)
    }

    /// Bind a literal or function to `(node, name)`
    ///
    /// A previously bound function is unsubscribed and disposed. Literal
    /// types are inferred from the value's shape. The owning node is
    /// recomputed afterwards.
    pub fn set_parameter_value(
        &mut self,
        node_id: &str,
        name: &str,
        value: impl Into<ParameterValue>,
    ) -> Result<()> {
        let value = value.into();
        let owner = self
            .node(node_id)
            .map(|n| n.id().clone())
            .ok_or_else(|| GraphError::NodeNotFound(node_id.into()))?;
        let pending = Rc::clone(&self.pending);

        let key = key(node_id, name);
        let current = self.parameters.get(&key).map(Parameter::value_type);
        let ty = inferred_type(current, &value);
        match self.parameters.get_mut(&key) {
            Some(parameter) => {
                parameter.detach();
                parameter.replace(value);
                if let Some(ty) = ty {
                    parameter.set_type(ty);
                }
                parameter.attach(&owner, &pending);
            }
            None => {
                let mut parameter =
                    Parameter::typed(name, value, ty.unwrap_or(NodeType::FLOAT));
                parameter.attach(&owner, &pending);
                self.parameters.insert(key, parameter);
            }
        }

        self.updated();
        self.try_and_process_node(&owner);
        Ok(())
    }

    /// Unbind `(node, name)`, disposing a bound function
    pub fn remove_parameter_value(&mut self, node_id: &str, name: &str) -> Option<Parameter> {
        let mut parameter = self.parameters.shift_remove(&key(node_id, name))?;
        parameter.detach();
        self.updated();
        Some(parameter)
    }

    /// Whether `(node, name)` is bound
    pub fn has_parameter_value(&self, node_id: &str, name: &str) -> bool {
        self.parameters.contains_key(&key(node_id, name))
    }

    /// Whether `(node, name)` is bound to a function
    pub fn is_parameter_value_function(&self, node_id: &str, name: &str) -> bool {
        self.parameter_raw(node_id, name)
            .is_some_and(Parameter::is_function)
    }

    /// The parameter bound to `(node, name)` without evaluating it
    pub fn parameter_raw(&self, node_id: &str, name: &str) -> Option<&Parameter> {
        self.parameters.get(&key(node_id, name))
    }

    /// Mutable access to a bound parameter, for range and description edits
    pub fn parameter_mut(&mut self, node_id: &str, name: &str) -> Option<&mut Parameter> {
        self.parameters.get_mut(&key(node_id, name))
    }

    /// All bound parameters by key
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.parameters.iter().map(|(k, p)| (k.as_str(), p))
    }

    /// Edit a bound function graph, then reprocess affected nodes
    pub fn edit_parameter_function<R>(
        &mut self,
        node_id: &str,
        name: &str,
        f: impl FnOnce(&mut FunctionGraph) -> R,
    ) -> Option<R> {
        let function = self
            .parameters
            .get_mut(&key(node_id, name))?
            .function_mut()?;
        let result = f(function);
        self.process_pending();
        Some(result)
    }
}
