// SPDX-License-Identifier: MIT OR Apache-2.0
//! Elementwise math nodes.
//!
//! Inputs accept any float shape and the output inherits the connected
//! shape. Values are computed in double precision per component and rounded
//! to `f32`. A value whose shape disagrees with the resolved output type
//! produces the zero value of that type.

use crate::node::{NodeBehavior, ProcessContext, ShaderContext};
use crate::nodes::widest;
use crate::port::{InputPort, NodeType, OutputPort};
use crate::value::Value;

/// One-argument functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `e^x`
    Exp,
    /// Natural logarithm
    Log,
    /// Sine
    Sin,
    /// Cosine
    Cos,
    /// Absolute value
    Abs,
    /// Round down
    Floor,
    /// Round up
    Ceil,
    /// Fractional part, `x - floor(x)`
    Fract,
    /// Square root
    Sqrt,
    /// `-x`
    Negate,
}

impl UnaryOp {
    /// Every unary function
    pub const ALL: [Self; 10] = [
        Self::Exp,
        Self::Log,
        Self::Sin,
        Self::Cos,
        Self::Abs,
        Self::Floor,
        Self::Ceil,
        Self::Fract,
        Self::Sqrt,
        Self::Negate,
    ];

    /// Registry tag
    pub fn tag(self) -> &'static str {
        match self {
            Self::Exp => "Exponential",
            Self::Log => "Log",
            Self::Sin => "Sine",
            Self::Cos => "Cosine",
            Self::Abs => "Absolute",
            Self::Floor => "Floor",
            Self::Ceil => "Ceil",
            Self::Fract => "Fract",
            Self::Sqrt => "SquareRoot",
            Self::Negate => "Negate",
        }
    }

    /// Apply to one component
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Abs => x.abs(),
            Self::Floor => x.floor(),
            Self::Ceil => x.ceil(),
            Self::Fract => x - x.floor(),
            Self::Sqrt => x.sqrt(),
            Self::Negate => -x,
        }
    }

    /// GLSL expression applying this function to `x`
    pub fn glsl(self, x: &str) -> String {
        match self {
            Self::Exp => format!("exp({x})"),
            Self::Log => format!("log({x})"),
            Self::Sin => format!("sin({x})"),
            Self::Cos => format!("cos({x})"),
            Self::Abs => format!("abs({x})"),
            Self::Floor => format!("floor({x})"),
            Self::Ceil => format!("ceil({x})"),
            Self::Fract => format!("fract({x})"),
            Self::Sqrt => format!("sqrt({x})"),
            Self::Negate => format!("(-{x})"),
        }
    }
}

/// Two-argument functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`
    Divide,
    /// `a^b`
    Pow,
    /// Smaller operand
    Min,
    /// Larger operand
    Max,
    /// `a - b * floor(a / b)`
    Modulo,
}

impl BinaryOp {
    /// Every binary function
    pub const ALL: [Self; 8] = [
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Pow,
        Self::Min,
        Self::Max,
        Self::Modulo,
    ];

    /// Registry tag
    pub fn tag(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Multiply => "Multiply",
            Self::Divide => "Divide",
            Self::Pow => "Pow",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Modulo => "Modulo",
        }
    }

    /// Apply to one pair of components
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => a / b,
            Self::Pow => a.powf(b),
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Modulo => a - b * (a / b).floor(),
        }
    }

    /// GLSL expression applying this function to `a` and `b`
    pub fn glsl(self, a: &str, b: &str) -> String {
        match self {
            Self::Add => format!("({a} + {b})"),
            Self::Subtract => format!("({a} - {b})"),
            Self::Multiply => format!("({a} * {b})"),
            Self::Divide => format!("({a} / {b})"),
            Self::Pow => format!("pow({a}, {b})"),
            Self::Min => format!("min({a}, {b})"),
            Self::Max => format!("max({a}, {b})"),
            Self::Modulo => format!("mod({a}, {b})"),
        }
    }
}

fn round(x: f64) -> f32 {
    x as f32
}

/// Node applying a [`UnaryOp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnaryMathNode {
    /// Function applied
    pub op: UnaryOp,
}

impl UnaryMathNode {
    /// Create a node for `op`
    pub fn new(op: UnaryOp) -> Self {
        Self { op }
    }

    /// Evaluate against a value, `None` when the shape does not fit `ty`
    pub fn evaluate(&self, value: Value, ty: NodeType) -> Option<Value> {
        let arity = ty.arity()?;
        let f = |x: f32| round(self.op.apply(f64::from(x)));
        match value {
            Value::Float(x) if arity == 1 => Some(Value::Float(f(x))),
            Value::Int(x) if arity == 1 => Some(Value::Float(round(self.op.apply(f64::from(x))))),
            Value::Vector(v) if arity > 1 => Some(Value::Vector(v.map(f))),
            _ => None,
        }
    }
}

impl NodeBehavior for UnaryMathNode {
    fn type_tag(&self) -> &'static str {
        self.op.tag()
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        (
            vec![InputPort::required("Input", NodeType::ANY_FLOAT)],
            vec![OutputPort::new("Output", NodeType::ANY_FLOAT)],
        )
    }

    fn supports_gate(&self) -> bool {
        true
    }

    fn update_output_type(&self, inputs: &[InputPort], outputs: &mut [OutputPort]) {
        if let (Some(ty), Some(output)) = (widest(inputs), outputs.first_mut()) {
            output.resolved = ty;
        }
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        let ty = ctx.output_type(0);
        let value = ctx
            .input(0)
            .and_then(|input| self.evaluate(input.value, ty))
            .unwrap_or_else(|| Value::zero_for(ty));
        ctx.set_output(0, value);
        true
    }

    fn shader_fragment(&self, ctx: &ShaderContext<'_>) -> String {
        match ctx.input(0) {
            Some(input) => ctx.declare(&self.op.glsl(&input.cast_to(ctx.output_type(0)))),
            None => String::new(),
        }
    }
}

/// Node applying a [`BinaryOp`]; scalar operands broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryMathNode {
    /// Function applied
    pub op: BinaryOp,
}

impl BinaryMathNode {
    /// Create a node for `op`
    pub fn new(op: BinaryOp) -> Self {
        Self { op }
    }

    /// Evaluate against two values, `None` when a shape does not fit `ty`
    pub fn evaluate(&self, a: Value, b: Value, ty: NodeType) -> Option<Value> {
        let arity = ty.arity()?;
        let lhs = operand(a, arity)?;
        let rhs = operand(b, arity)?;
        let mut out = [0.0; 4];
        for (o, (x, y)) in out.iter_mut().zip(lhs.into_iter().zip(rhs)) {
            *o = round(self.op.apply(f64::from(x), f64::from(y)));
        }
        if arity == 1 {
            Some(Value::Float(out[0]))
        } else {
            Some(Value::Vector(out))
        }
    }
}

/// Components of an operand; scalars broadcast, vectors need a vector result
fn operand(value: Value, arity: usize) -> Option<[f32; 4]> {
    match value {
        Value::Float(x) => Some([x; 4]),
        Value::Int(x) => Some([x as f32; 4]),
        Value::Vector(v) if arity > 1 => Some(v),
        _ => None,
    }
}

impl NodeBehavior for BinaryMathNode {
    fn type_tag(&self) -> &'static str {
        self.op.tag()
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        (
            vec![
                InputPort::required("A", NodeType::ANY_FLOAT),
                InputPort::required("B", NodeType::ANY_FLOAT),
            ],
            vec![OutputPort::new("Output", NodeType::ANY_FLOAT)],
        )
    }

    fn supports_gate(&self) -> bool {
        true
    }

    fn update_output_type(&self, inputs: &[InputPort], outputs: &mut [OutputPort]) {
        if let (Some(ty), Some(output)) = (widest(inputs), outputs.first_mut()) {
            output.resolved = ty;
        }
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        let ty = ctx.output_type(0);
        let value = match (ctx.input(0), ctx.input(1)) {
            (Some(a), Some(b)) => self.evaluate(a.value, b.value, ty),
            _ => None,
        };
        ctx.set_output(0, value.unwrap_or_else(|| Value::zero_for(ty)));
        true
    }

    fn shader_fragment(&self, ctx: &ShaderContext<'_>) -> String {
        let ty = ctx.output_type(0);
        match (ctx.input(0), ctx.input(1)) {
            (Some(a), Some(b)) => ctx.declare(&self.op.glsl(&a.cast_to(ty), &b.cast_to(ty))),
            _ => String::new(),
        }
    }
}
