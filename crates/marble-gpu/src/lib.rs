//! Shader program construction and the one-shot marble draw.
//!
//! [`RenderPipeline`] is written against the [`RenderBackend`] capability
//! trait; [`WgpuBackend`] implements it on a window surface.

pub mod backend;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod program;
pub mod reflect;
pub mod source;
pub mod wgpu_backend;

#[cfg(test)]
mod mock;

pub use backend::{
    BufferHandle, BufferTarget, ProgramHandle, RenderBackend, ShaderHandle, ShaderKind, Topology,
    UniformLocation, VertexAttribute,
};
pub use error::{RenderError, RenderResult};
pub use pipeline::{PipelineOptions, RenderPipeline, Stage};
pub use program::{BuildState, ShaderProgramBuilder};
pub use source::{ShaderPaths, ShaderSource, DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};
pub use wgpu_backend::WgpuBackend;
