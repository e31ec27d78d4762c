// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end behavior of graphs built through the public API.

use procgraph_graph::{
    FunctionGraph, Graph, GraphContext, NodeKind, NodeRegistry, NodeSettings, NodeType,
    RenderError, RenderRequest, Renderer, TextureHandle, Value,
};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::f32::consts::E;
use std::rc::Rc;

fn assert_close(value: Option<Value>, expected: f32) {
    match value {
        Some(Value::Float(v)) => assert!((v - expected).abs() < 1e-5, "{v} != {expected}"),
        other => panic!("expected a float, got {other:?}"),
    }
}

/// Input -> Exponential -> Output
fn exp_chain() -> (Graph, String, String, String) {
    let mut graph = Graph::new("exp");
    let input = graph.create_node("Input").unwrap();
    let exp = graph.create_node("Exponential").unwrap();
    let output = graph.create_node("Output").unwrap();
    graph.connect(&input, 0, &exp, 0).unwrap();
    graph.connect(&exp, 0, &output, 0).unwrap();
    (graph, input.to_string(), exp.to_string(), output.to_string())
}

fn sample_document() -> String {
    json!({
        "name": "sample",
        "width": 256,
        "height": 256,
        "nodes": [
            { "id": "c", "type": "Float3Constant", "width": 64, "height": 64,
              "value": { "x": 0.0, "y": 1.0, "z": 2.0, "w": 0.0 },
              "outputs": [{ "toNodeId": "e", "toInputIndex": 0, "fromOutputIndex": 0 }] },
            { "id": "e", "type": "Exponential", "width": 64, "height": 64,
              "outputs": [{ "toNodeId": "o", "toInputIndex": 0, "fromOutputIndex": 0 }] },
            { "id": "o", "type": "Output" }
        ],
        "outputs": ["o"],
        "parameters": {
            "e.Strength": { "name": "Strength", "value": 5.0, "min": 0.0, "max": 1.0 }
        }
    })
    .to_string()
}

#[test]
fn test_exponential_scalar() {
    let (mut graph, input, exp, output) = exp_chain();
    graph.set_input_value(&input, 1.0_f32).unwrap();
    assert_close(graph.output_value(&exp), E);
    assert_close(graph.output_value(&output), E);

    graph.set_input_value(&input, 0.0_f32).unwrap();
    assert_close(graph.output_value(&output), 1.0);
}

#[test]
fn test_exponential_vector() {
    let (mut graph, input, _, output) = exp_chain();
    graph
        .set_input_value(&input, [0.0_f32, 1.0, 2.0, 0.0])
        .unwrap();
    let Some(Value::Vector(v)) = graph.output_value(&output) else {
        panic!("expected a vector output");
    };
    assert!((v[0] - 1.0).abs() < 1e-5);
    assert!((v[1] - E).abs() < 1e-5);
    assert!((v[2] - E * E).abs() < 1e-4);
}

#[test]
fn test_type_inheritance() {
    let mut graph = Graph::new("types");
    let constant = graph.create_node("Float3Constant").unwrap();
    let exp = graph.create_node("Exponential").unwrap();
    let sine = graph.create_node("Sine").unwrap();
    graph.connect(&exp, 0, &sine, 0).unwrap();
    graph.connect(&constant, 0, &exp, 0).unwrap();

    assert_eq!(graph.node(&exp).unwrap().outputs()[0].resolved, NodeType::FLOAT3);
    assert_eq!(graph.node(&sine).unwrap().outputs()[0].resolved, NodeType::FLOAT3);

    // Output types survive the disconnect
    graph.disconnect(&exp, 0).unwrap();
    assert_eq!(graph.node(&exp).unwrap().outputs()[0].resolved, NodeType::FLOAT3);
}

#[test]
fn test_shader_emission() {
    let mut graph = Graph::new("shader");
    let constant = graph.create_node("Float4Constant").unwrap();
    let exp = graph.create_node("Exponential").unwrap();
    assert_eq!(graph.shader_fragment(&exp), "");

    graph.connect(&constant, 0, &exp, 0).unwrap();
    let var = graph.node(&exp).unwrap().shader_var(0);
    let source = graph.node(&constant).unwrap().shader_var(0);
    assert_eq!(
        graph.shader_fragment(&exp),
        format!("vec4 {var} = exp({source});\n")
    );

    let program = graph.compile_program(&exp).unwrap();
    assert!(program.contains(&format!("    FragColor = {var};\n")));
}

#[test]
fn test_parameter_clamp() {
    let (mut graph, _, exp, _) = exp_chain();
    graph.set_parameter_value(&exp, "Strength", 5.0_f32).unwrap();
    let parameter = graph.parameter_raw(&exp, "Strength").unwrap();
    assert_eq!(parameter.float_value(), 1.0);
    assert_eq!(parameter.literal(), Some(Value::Float(5.0)));
}

#[test]
fn test_resize_is_proportional() {
    let mut graph = Graph::new("resize");
    let registry = NodeRegistry::with_defaults();
    let settings = NodeSettings {
        width: 64,
        height: 64,
        ..NodeSettings::default()
    };
    let node = graph
        .add(registry.create_node("Exponential", &settings).unwrap())
        .unwrap();
    let output = graph.create_node("Output").unwrap();

    graph.resize_with(512, 512);
    assert_eq!(graph.node(&node).unwrap().width(), 128);
    assert_eq!(graph.node(&node).unwrap().height(), 128);
    assert_eq!(graph.node(&output).unwrap().width(), 256);

    graph.resize_with(1, 1);
    assert_eq!(graph.node(&node).unwrap().width(), 8);
}

#[test]
fn test_loaded_resize_uses_recorded_size() {
    let mut graph = Graph::from_json(&sample_document(), GraphContext::default()).unwrap();
    graph.resize_with(512, 512);
    assert_eq!(graph.node("e").unwrap().width(), 128);
    graph.resize_with(256, 256);
    assert_eq!(graph.node("e").unwrap().width(), 64);
}

#[test]
fn test_determinism() {
    let a = Graph::from_json(&sample_document(), GraphContext::default()).unwrap();
    let mut b = Graph::from_json(&sample_document(), GraphContext::default()).unwrap();
    assert_eq!(a.output_value("o"), b.output_value("o"));

    b.try_and_process();
    assert_eq!(a.output_value("o"), b.output_value("o"));
    assert!(matches!(a.output_value("o"), Some(Value::Vector(_))));
}

#[test]
fn test_round_trip() {
    let graph = Graph::from_json(&sample_document(), GraphContext::default()).unwrap();
    let text = graph.to_json().unwrap();
    let reloaded = Graph::from_json(&text, GraphContext::default()).unwrap();

    assert_eq!(reloaded.to_document(), graph.to_document());
    assert_eq!(reloaded.output_node_ids(), graph.output_node_ids());
    assert_eq!(
        reloaded.parameter_raw("e", "Strength").unwrap().literal(),
        Some(Value::Float(5.0))
    );
}

#[test]
fn test_round_trip_function_parameter() {
    let mut graph = Graph::new("functions");
    let constant = graph.create_node("FloatConstant").unwrap();
    let mut function = FunctionGraph::new("f");
    let inner = function.create_node("FloatConstant").unwrap();
    function.set_output_node(&inner).unwrap();
    graph.set_parameter_value(&constant, "Value", function).unwrap();

    let text = graph.to_json().unwrap();
    let reloaded = Graph::from_json(&text, GraphContext::default()).unwrap();
    assert!(reloaded.is_parameter_value_function(&constant, "Value"));
    assert_eq!(reloaded.to_document(), graph.to_document());
}

#[test]
fn test_function_parameter_stays_live() {
    let mut graph = Graph::new("live");
    let constant = graph.create_node("FloatConstant").unwrap();
    let output = graph.create_node("Output").unwrap();
    graph.connect(&constant, 0, &output, 0).unwrap();

    let mut function = FunctionGraph::new("f");
    let seed = function.create_node("FloatConstant").unwrap();
    let exp = function.create_node("Exponential").unwrap();
    function.connect(&seed, 0, &exp, 0).unwrap();
    function.set_output_node(&exp).unwrap();

    graph.set_parameter_value(&constant, "Value", function).unwrap();
    assert_close(graph.output_value(&output), 1.0);

    graph
        .edit_parameter_function(&constant, "Value", |f| {
            f.set_parameter_value(&seed, "Value", 1.0_f32).unwrap();
        })
        .unwrap();
    assert_close(graph.output_value(&output), E);
}

#[derive(Default)]
struct RecordingRenderer {
    shaders: RefCell<Vec<String>>,
    released: RefCell<Vec<TextureHandle>>,
    next: Cell<u64>,
}

impl Renderer for RecordingRenderer {
    fn execute(&self, request: &RenderRequest<'_>) -> Result<TextureHandle, RenderError> {
        self.shaders.borrow_mut().push(request.shader.to_string());
        self.next.set(self.next.get() + 1);
        Ok(TextureHandle(self.next.get()))
    }

    fn release(&self, texture: TextureHandle) {
        self.released.borrow_mut().push(texture);
    }
}

#[test]
fn test_pixel_processor_renders() {
    let renderer = Rc::new(RecordingRenderer::default());
    let context = GraphContext::default().with_renderer(Rc::clone(&renderer) as Rc<dyn Renderer>);
    let mut graph = Graph::with_context("pixels", context);
    let node = graph.create_node("PixelProcessor").unwrap();

    graph
        .update_node(&node, |n| {
            if let NodeKind::PixelProcessor(pp) = n.kind_mut() {
                let function = pp.function_mut();
                let uv = function.create_node("UV").unwrap();
                function.set_output_node(&uv).unwrap();
            }
        })
        .unwrap();

    graph.try_and_process_node(&node);
    assert_eq!(graph.output_value(&node), Some(Value::Texture(TextureHandle(1))));
    assert_eq!(renderer.shaders.borrow().len(), 1);
    assert!(renderer.shaders.borrow()[0].contains("FragColor = vec4("));

    graph.try_and_process_node(&node);
    assert_eq!(graph.output_value(&node), Some(Value::Texture(TextureHandle(2))));
    assert_eq!(*renderer.released.borrow(), vec![TextureHandle(1)]);

    graph.release_intermediate_buffers();
    assert_eq!(graph.output_value(&node), Some(Value::Empty));
    assert_eq!(*renderer.released.borrow(), vec![TextureHandle(1), TextureHandle(2)]);
}

#[test]
fn test_pixel_processor_without_renderer_is_idle() {
    let mut graph = Graph::new("pixels");
    let node = graph.create_node("PixelProcessor").unwrap();
    graph.try_and_process_node(&node);
    assert_eq!(graph.output_value(&node), Some(Value::Empty));
}

fn uv_processor(graph: &mut Graph) -> String {
    let node = graph.create_node("PixelProcessor").unwrap();
    graph
        .update_node(&node, |n| {
            if let NodeKind::PixelProcessor(pp) = n.kind_mut() {
                let function = pp.function_mut();
                let uv = function.create_node("UV").unwrap();
                function.set_output_node(&uv).unwrap();
            }
        })
        .unwrap();
    node.to_string()
}

/// Stack `depth` diamonds of pixel processors; returns the top and bottom ids
fn diamond_stack(graph: &mut Graph, depth: usize) -> (String, String) {
    let top = uv_processor(graph);
    let mut tip = top.clone();
    for _ in 0..depth {
        let left = uv_processor(graph);
        let right = uv_processor(graph);
        let join = uv_processor(graph);
        graph.connect(&tip, 0, &left, 0).unwrap();
        graph.connect(&tip, 0, &right, 0).unwrap();
        graph.connect(&left, 0, &join, 0).unwrap();
        graph.connect(&right, 0, &join, 1).unwrap();
        tip = join;
    }
    (top, tip)
}

#[test]
fn test_diamond_recomputes_each_node_once() {
    let renderer = Rc::new(RecordingRenderer::default());
    let context = GraphContext::default().with_renderer(Rc::clone(&renderer) as Rc<dyn Renderer>);
    let mut graph = Graph::with_context("diamond", context);
    let (top, join) = diamond_stack(&mut graph, 1);

    let before = renderer.shaders.borrow().len();
    graph.try_and_process_node(&top);
    assert_eq!(renderer.shaders.borrow().len() - before, 4);
    assert!(matches!(graph.output_value(&join), Some(Value::Texture(_))));
}

#[test]
fn test_stacked_diamonds_recompute_linearly() {
    let renderer = Rc::new(RecordingRenderer::default());
    let context = GraphContext::default().with_renderer(Rc::clone(&renderer) as Rc<dyn Renderer>);
    let mut graph = Graph::with_context("diamonds", context);
    let depth = 6;
    let (top, bottom) = diamond_stack(&mut graph, depth);

    let before = renderer.shaders.borrow().len();
    graph.try_and_process_node(&top);
    assert_eq!(renderer.shaders.borrow().len() - before, 1 + 3 * depth);

    // The bottom join rendered last, so it holds the newest texture
    let newest = TextureHandle(renderer.next.get());
    assert_eq!(graph.output_value(&bottom), Some(Value::Texture(newest)));
}

#[test]
fn test_instance_resizes_child_once() {
    let renderer = Rc::new(RecordingRenderer::default());
    let context = GraphContext::default().with_renderer(Rc::clone(&renderer) as Rc<dyn Renderer>);
    let mut child = Graph::with_context("child", context.clone());
    let pixels = uv_processor(&mut child);
    let output = child.create_node("Output").unwrap();
    child.connect(&pixels, 0, &output, 0).unwrap();

    let mut graph = Graph::with_context("parent", context);
    graph.set_width(128);
    graph.set_height(128);
    let node = graph.create_node("GraphInstance").unwrap();

    // Resizing recomputes the child once, then the instance runs it again
    let before = renderer.shaders.borrow().len();
    graph.set_instance_graph(&node, child).unwrap();
    assert_eq!(renderer.shaders.borrow().len() - before, 2);
    assert_eq!(graph.find_sub_node_by_id(&pixels).unwrap().width(), 128);

    let before = renderer.shaders.borrow().len();
    graph.try_and_process_node(&node);
    assert_eq!(renderer.shaders.borrow().len() - before, 1);
    assert!(matches!(graph.output_value(&node), Some(Value::Texture(_))));
}
