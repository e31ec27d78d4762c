// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fragment shader generation.
//!
//! Each node emits at most one statement declaring its output variable.
//! A subgraph compiles to the concatenation of those statements in
//! dependency order. A node whose inputs cannot all be emitted contributes
//! nothing, which also prunes everything that depends on it.

use crate::graph::Graph;
use crate::node::{NodeId, ShaderInput};
use crate::port::NodeType;
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

/// Header shared by every generated program
const PRELUDE: &str = "#version 330 core
out vec4 FragColor;
in vec2 UV;
uniform sampler2D Input0;
uniform sampler2D Input1;
uniform vec2 size;
";

/// GLSL float literal; non-finite values become `0.0`
pub fn glsl_float(v: f32) -> String {
    if !v.is_finite() {
        return "0.0".to_string();
    }
    let text = v.to_string();
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{text}.0")
    }
}

/// GLSL literal for a value viewed as `ty`
pub fn glsl_literal(value: Value, ty: NodeType) -> Option<String> {
    if ty == NodeType::BOOL {
        return value.as_bool().map(|b| b.to_string());
    }
    let arity = ty.arity()?;
    let components = match value {
        Value::Vector(v) => v,
        other => [other.as_f32()?; 4],
    };
    if arity == 1 {
        return Some(glsl_float(components[0]));
    }
    let name = ty.glsl_name()?;
    let args: Vec<String> = components[..arity].iter().map(|&c| glsl_float(c)).collect();
    Some(format!("{name}({})", args.join(", ")))
}

/// Expression widening `var` of shape `ty` to an opaque `vec4`
fn to_vec4(var: &str, ty: NodeType) -> String {
    match ty.arity() {
        _ if ty == NodeType::BOOL => format!("vec4(vec3(float({var})), 1.0)"),
        Some(1) => format!("vec4(vec3({var}), 1.0)"),
        Some(2) => format!("vec4({var}, 0.0, 1.0)"),
        Some(3) => format!("vec4({var}, 1.0)"),
        _ => var.to_string(),
    }
}

impl Graph {
    /// Statement emitted by one node, empty when its inputs are unset
    pub fn shader_fragment(&self, node_id: &str) -> String {
        let Some(node) = self.node(node_id) else {
            return String::new();
        };
        let inputs: Vec<Option<ShaderInput>> = node
            .inputs()
            .iter()
            .map(|port| {
                let edge = port.edge()?;
                let source = self.node(&edge.from_node)?;
                let ty = source.output(edge.from_output)?.resolved;
                // A source retyped outside the accepted set leaves the input unset
                ty.intersects(port.accepted).then(|| ShaderInput {
                    var: source.shader_var(edge.from_output),
                    ty,
                })
            })
            .collect();
        let prefix = format!("{node_id}.");
        let parameters: HashMap<String, Value> = self
            .parameters
            .iter()
            .filter_map(|(key, parameter)| {
                let name = key.strip_prefix(&prefix)?;
                Some((name.to_string(), parameter.current()))
            })
            .collect();
        node.shader_fragment(&inputs, &parameters)
    }

    /// Shader body for the subgraph feeding `root`, dependencies first
    pub fn compile_shader(&self, root: &str) -> String {
        let mut emitted = HashSet::new();
        let mut body = String::new();
        self.emit(root, &mut emitted, &mut body);
        body
    }

    fn emit(&self, node_id: &str, emitted: &mut HashSet<NodeId>, body: &mut String) -> bool {
        let Some(node) = self.node(node_id) else {
            return false;
        };
        if emitted.contains(node.id()) {
            return true;
        }
        if !node.is_ready() {
            return false;
        }

        // The gate source carries no data into the program
        for (index, edge) in node.edges() {
            if Some(index) == node.gate_index() {
                continue;
            }
            if !self.emit(&edge.from_node, emitted, body) {
                return false;
            }
        }

        let statement = self.shader_fragment(node_id);
        if statement.is_empty() {
            return false;
        }
        body.push_str(&statement);
        emitted.insert(node.id().clone());
        true
    }

    /// Complete fragment program writing `root` to `FragColor`
    ///
    /// Returns `None` when nothing upstream of `root` can be emitted.
    pub fn compile_program(&self, root: &str) -> Option<String> {
        let node = self.node(root)?;
        let body = self.compile_shader(root);
        if body.is_empty() {
            return None;
        }
        let ty = node.output(0)?.resolved;

        let mut program = String::from(PRELUDE);
        program.push_str("\nvoid main() {\n");
        for line in body.lines() {
            let _ = writeln!(program, "    {line}");
        }
        let _ = writeln!(
            program,
            "    FragColor = {};",
            to_vec4(&node.shader_var(0), ty)
        );
        program.push_str("}\n");
        Some(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glsl_float() {
        assert_eq!(glsl_float(1.0), "1.0");
        assert_eq!(glsl_float(0.25), "0.25");
        assert_eq!(glsl_float(-3.0), "-3.0");
        assert_eq!(glsl_float(f32::NAN), "0.0");
    }

    #[test]
    fn test_glsl_literal() {
        assert_eq!(
            glsl_literal(Value::Vector([1.0, 0.5, 0.0, 1.0]), NodeType::FLOAT3),
            Some("vec3(1.0, 0.5, 0.0)".to_string())
        );
        assert_eq!(
            glsl_literal(Value::Float(2.0), NodeType::FLOAT2),
            Some("vec2(2.0, 2.0)".to_string())
        );
        assert_eq!(glsl_literal(Value::Bool(true), NodeType::BOOL), Some("true".to_string()));
        assert_eq!(glsl_literal(Value::Empty, NodeType::FLOAT), None);
    }

    #[test]
    fn test_emission_order() {
        let mut graph = Graph::new("test");
        let uv = graph.create_node("UV").unwrap();
        let sin = graph.create_node("Sine").unwrap();
        let exp = graph.create_node("Exponential").unwrap();
        graph.connect(&sin, 0, &exp, 0).unwrap();
        graph.connect(&uv, 0, &sin, 0).unwrap();

        let uv_var = graph.node(&uv).unwrap().shader_var(0);
        let sin_var = graph.node(&sin).unwrap().shader_var(0);
        let exp_var = graph.node(&exp).unwrap().shader_var(0);
        assert_eq!(
            graph.compile_shader(&exp),
            format!(
                "vec2 {uv_var} = UV;\nvec2 {sin_var} = sin({uv_var});\nvec2 {exp_var} = exp({sin_var});\n"
            )
        );
    }

    #[test]
    fn test_missing_input_prunes_downstream() {
        let mut graph = Graph::new("test");
        let sin = graph.create_node("Sine").unwrap();
        let exp = graph.create_node("Exponential").unwrap();
        graph.connect(&sin, 0, &exp, 0).unwrap();
        assert_eq!(graph.compile_shader(&exp), "");
        assert!(graph.compile_program(&exp).is_none());
    }

    #[test]
    fn test_program_wraps_body() {
        let mut graph = Graph::new("test");
        let constant = graph.create_node("FloatConstant").unwrap();
        let var = graph.node(&constant).unwrap().shader_var(0);
        let program = graph.compile_program(&constant).unwrap();
        assert!(program.starts_with("#version 330 core\n"));
        assert!(program.contains(&format!("    float {var} = 0.0;\n")));
        assert!(program.contains(&format!("    FragColor = vec4(vec3({var}), 1.0);\n")));
    }

    #[test]
    fn test_constant_emits_bound_value() {
        let mut graph = Graph::new("test");
        let constant = graph.create_node("FloatConstant").unwrap();
        graph
            .set_parameter_value(&constant, "Value", 0.25_f32)
            .unwrap();
        let var = graph.node(&constant).unwrap().shader_var(0);

        assert_eq!(graph.output_value(&constant), Some(Value::Float(0.25)));
        assert_eq!(graph.compile_shader(&constant), format!("float {var} = 0.25;\n"));

        graph.remove_parameter_value(&constant, "Value");
        assert_eq!(graph.compile_shader(&constant), format!("float {var} = 0.0;\n"));
    }

    #[test]
    fn test_retyped_source_is_not_emitted() {
        let mut graph = Graph::new("test");
        let input = graph.create_node("Input").unwrap();
        let exp = graph.create_node("Exponential").unwrap();
        graph.connect(&input, 0, &exp, 0).unwrap();
        graph.set_input_value(&input, true).unwrap();

        assert_eq!(graph.shader_fragment(&exp), "");
        assert_eq!(graph.compile_shader(&exp), "");
    }
}
