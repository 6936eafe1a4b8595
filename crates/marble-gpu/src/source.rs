use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::RenderResult;

pub const DEFAULT_VERTEX_SHADER: &str = "basic.vert.wgsl";
pub const DEFAULT_FRAGMENT_SHADER: &str = "marble.frag.wgsl";

/// Fetches shader source text by path. Any failure is reported as
/// [`RenderError::Fetch`](crate::RenderError::Fetch).
pub trait ShaderSource {
    fn load(&self, path: &Path) -> impl Future<Output = RenderResult<String>>;
}

/// Locations of the vertex and fragment shader sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl ShaderPaths {
    pub fn new(vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self::new(DEFAULT_VERTEX_SHADER, DEFAULT_FRAGMENT_SHADER)
    }
}
