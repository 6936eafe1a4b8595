use std::future::Future;
use std::path::{Path, PathBuf};

use marble_gpu::{RenderError, RenderResult, ShaderSource};

/// Reads shader sources from a directory on disk. Relative paths are
/// resolved against `base`; absolute paths are used as given.
#[derive(Debug, Clone)]
pub struct FileShaderSource {
    base: PathBuf,
}

impl FileShaderSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.base.join(path)
    }
}

impl ShaderSource for FileShaderSource {
    fn load(&self, path: &Path) -> impl Future<Output = RenderResult<String>> {
        let full = self.resolve(path);
        async move {
            log::debug!("loading shader {}", full.display());
            std::fs::read_to_string(&full).map_err(|source| RenderError::Fetch { path: full, source })
        }
    }
}
