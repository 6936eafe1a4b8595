//! Error taxonomy for pipeline setup.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::ShaderKind;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Error, Debug)]
pub enum RenderError {
    /// The platform cannot provide a rendering context. Setup is abandoned
    /// without treating it as a crash.
    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("failed to fetch shader source {}: {source}", path.display())]
    Fetch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} shader failed to compile:\n{log}")]
    Compile { kind: ShaderKind, log: String },

    #[error("program failed to link:\n{0}")]
    Link(String),

    #[error("program failed validation:\n{0}")]
    Validation(String),

    #[error("vertex attribute `{0}` is not declared by the program")]
    MissingAttribute(String),

    #[error("uniform `{name}` is a {expected} but a {got} was supplied")]
    UniformShape {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("backend error: {0}")]
    Backend(String),
}

impl RenderError {
    /// Everything except an unsupported context aborts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RenderError::ContextUnavailable(_))
    }
}
