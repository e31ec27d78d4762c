// SPDX-License-Identifier: MIT OR Apache-2.0
//! Procedural computation graph.
//!
//! This crate provides a directed graph of typed nodes that:
//! - Recomputes values incrementally on the CPU as edges and inputs change
//! - Compiles connected subgraphs into fragment shader source
//! - Binds node parameters to literals or live function graphs
//! - Round-trips through a JSON document format
//!
//! ## Architecture
//!
//! The framework is built on a generic graph model with:
//! - Typed input/output ports whose types resolve on connection
//! - A closed set of node variants behind one capability trait
//! - Synchronous change propagation in subscription order
//! - A narrow renderer contract for GPU execution

pub mod connection;
pub mod document;
pub mod evaluation;
pub mod events;
pub mod function;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod parameter;
pub mod port;
pub mod renderer;
pub mod shader;
pub mod value;

pub use connection::{Edge, PortRef};
pub use document::{DocumentError, GraphDocument, NodeDocument, ParameterDocument};
pub use events::{GraphEvent, SubscriptionId};
pub use function::FunctionGraph;
pub use graph::{Graph, GraphContext, GraphError, HdriSelection};
pub use node::{Node, NodeId, NodeKind, NodeRegistry, NodeSettings, PixelFormat};
pub use parameter::{Parameter, ParameterValue};
pub use port::{InputPort, NodeType, OutputPort};
pub use renderer::{RenderError, RenderRequest, Renderer, TextureHandle};
pub use value::Value;
