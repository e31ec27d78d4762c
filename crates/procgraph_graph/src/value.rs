// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime values carried by ports and parameters.

use crate::port::NodeType;
use crate::renderer::TextureHandle;
use serde_json::{json, Number, Value as JsonValue};

/// Value flowing through a port or stored in a parameter
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    /// Nothing computed yet
    #[default]
    Empty,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// Four component vector; narrower vectors leave trailing components unused
    Vector([f32; 4]),
    /// Renderer-owned texture
    Texture(TextureHandle),
}

impl Value {
    /// Zero value for a port shape
    pub fn zero_for(ty: NodeType) -> Self {
        if ty == NodeType::BOOL {
            Self::Bool(false)
        } else if ty.arity().is_some_and(|n| n > 1) {
            Self::Vector([0.0; 4])
        } else {
            Self::Float(0.0)
        }
    }

    /// Coarse shape classification of this value
    pub fn shape(&self) -> NodeType {
        match self {
            Self::Float(_) | Self::Int(_) => NodeType::FLOAT,
            Self::Bool(_) => NodeType::BOOL,
            Self::Vector(_) => NodeType::FLOAT4,
            Self::Texture(_) => NodeType::COLOR,
            Self::Empty => NodeType::empty(),
        }
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Numeric view of a scalar value
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::Float(v) => Some(v),
            Self::Int(v) => Some(v as f32),
            Self::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Vector view, if this is a vector
    pub fn as_vector(&self) -> Option<[f32; 4]> {
        match *self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean view of a scalar value
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            Self::Int(v) => Some(v != 0),
            Self::Float(v) => Some(v != 0.0),
            _ => None,
        }
    }

    /// Texture handle, if this is a texture
    pub fn as_texture(&self) -> Option<TextureHandle> {
        match *self {
            Self::Texture(t) => Some(t),
            _ => None,
        }
    }

    /// Replace values that do not fit `ty` with the type's default
    pub fn coerce(self, ty: NodeType) -> Self {
        let vector_types = NodeType::FLOAT2 | NodeType::FLOAT3 | NodeType::FLOAT4 | NodeType::IMAGE;
        if ty == NodeType::FLOAT {
            match self {
                Self::Float(_) | Self::Int(_) => self,
                _ => Self::Float(0.0),
            }
        } else if ty == NodeType::BOOL {
            match self {
                Self::Bool(_) => self,
                _ => Self::Bool(false),
            }
        } else if ty.is_resolved() && vector_types.contains(ty) {
            match self {
                Self::Vector(_) => self,
                _ => Self::Vector([0.0; 4]),
            }
        } else {
            self
        }
    }

    /// Document form of this value
    pub fn to_json(&self) -> JsonValue {
        match *self {
            Self::Empty | Self::Texture(_) => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(v),
            Self::Int(v) => json!(v),
            Self::Float(v) => float_json(v),
            Self::Vector([x, y, z, w]) => json!({
                "x": float_json(x),
                "y": float_json(y),
                "z": float_json(z),
                "w": float_json(w),
            }),
        }
    }

    /// Parse the document form; unknown shapes become [`Value::Empty`]
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Bool(v) => Self::Bool(*v),
            JsonValue::Number(n) => match n.as_i64().and_then(|v| i32::try_from(v).ok()) {
                Some(v) => Self::Int(v),
                None => Self::Float(n.as_f64().unwrap_or_default() as f32),
            },
            JsonValue::Object(map) => {
                let component = |key: &str| {
                    map.get(key)
                        .or_else(|| map.get(&key.to_uppercase()))
                        .and_then(JsonValue::as_f64)
                        .unwrap_or_default() as f32
                };
                Self::Vector([component("x"), component("y"), component("z"), component("w")])
            }
            _ => Self::Empty,
        }
    }
}

/// Widen an `f32` to the `f64` with the same shortest decimal form
pub(crate) fn widen(v: f32) -> f64 {
    v.to_string().parse::<f64>().unwrap_or_else(|_| f64::from(v))
}

/// Shortest decimal form of an `f32`, so documents read back bit-identical
fn float_json(v: f32) -> JsonValue {
    Number::from_f64(widen(v)).map_or(JsonValue::Null, JsonValue::Number)
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<[f32; 4]> for Value {
    fn from(v: [f32; 4]) -> Self {
        Self::Vector(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shapes() {
        assert_eq!(Value::from_json(&json!(true)), Value::Bool(true));
        assert_eq!(Value::from_json(&json!(3)), Value::Int(3));
        assert_eq!(Value::from_json(&json!(0.5)), Value::Float(0.5));
        assert_eq!(
            Value::from_json(&json!({ "X": 1.0, "y": 2.0 })),
            Value::Vector([1.0, 2.0, 0.0, 0.0])
        );
        assert_eq!(Value::from_json(&json!("text")), Value::Empty);
    }

    #[test]
    fn test_float_survives_json() {
        let v = Value::Float(0.1);
        assert_eq!(Value::from_json(&v.to_json()), v);
    }

    #[test]
    fn test_coerce() {
        assert_eq!(Value::Bool(true).coerce(NodeType::FLOAT), Value::Float(0.0));
        assert_eq!(Value::Float(2.0).coerce(NodeType::BOOL), Value::Bool(false));
        assert_eq!(Value::Float(2.0).coerce(NodeType::COLOR), Value::Vector([0.0; 4]));
        assert_eq!(Value::Int(4).coerce(NodeType::FLOAT), Value::Int(4));
    }

    #[test]
    fn test_zero_for() {
        assert_eq!(Value::zero_for(NodeType::FLOAT3), Value::Vector([0.0; 4]));
        assert_eq!(Value::zero_for(NodeType::ANY_FLOAT), Value::Float(0.0));
    }
}
