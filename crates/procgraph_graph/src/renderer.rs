// SPDX-License-Identifier: MIT OR Apache-2.0
//! Contract with the external GPU renderer.
//!
//! The graph produces shader source and uniform values; the renderer runs
//! them on its own thread/context and hands back an opaque texture handle.
//! Nothing in this crate touches GPU state directly.

use crate::node::PixelFormat;
use crate::value::Value;

/// Opaque handle to a renderer-owned texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// One fragment program execution
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    /// Complete fragment shader source
    pub shader: &'a str,
    /// Textures bound to `Input0`, `Input1`, ...; `None` leaves the unit empty
    pub textures: Vec<Option<TextureHandle>>,
    /// Uniform values by name
    pub uniforms: Vec<(&'static str, Value)>,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Output texture format
    pub format: PixelFormat,
}

/// Renderer failures
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Shader did not compile or link
    #[error("Shader compilation failed: {0}")]
    Compile(String),

    /// No device or context to run on
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),
}

/// GPU backend consumed by pixel-processing nodes
pub trait Renderer {
    /// Run a fragment program and return the resulting texture
    fn execute(&self, request: &RenderRequest<'_>) -> Result<TextureHandle, RenderError>;

    /// Release a texture previously returned by [`Renderer::execute`]
    fn release(&self, texture: TextureHandle);
}
