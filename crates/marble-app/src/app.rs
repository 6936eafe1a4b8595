use std::sync::Arc;

use marble_core::SeededRandom;
use marble_gpu::{PipelineOptions, RenderPipeline, RenderResult, ShaderPaths, Stage, WgpuBackend};
use winit::window::Window;

use crate::config::AppConfig;
use crate::source::FileShaderSource;

// ---------------------------------------------------------------------------
// App — the window's single drawn frame
// ---------------------------------------------------------------------------

/// Holds the pipeline after a successful draw so its GPU resources stay
/// alive until the window closes.
pub struct App {
    pipeline: RenderPipeline<WgpuBackend>,
}

impl App {
    /// Set up wgpu for `window`, then build, bind and draw the marble once.
    pub fn render(
        window: Arc<Window>,
        config: &AppConfig,
        rng: &mut SeededRandom,
    ) -> RenderResult<Self> {
        let size = window.inner_size();
        let sources = FileShaderSource::new(&config.shader_dir);
        let paths = ShaderPaths::new(&config.vertex_shader, &config.fragment_shader);
        let options = PipelineOptions {
            validate: config.validate,
        };

        let pipeline = pollster::block_on(async {
            let backend = WgpuBackend::new(window, size.width, size.height).await?;
            RenderPipeline::run(backend, &sources, &paths, rng, options).await
        })?;

        log::info!(
            "Marble for seed {} drawn in {} call(s)",
            rng.seed(),
            pipeline.draw_calls()
        );
        Ok(Self { pipeline })
    }

    pub fn stage(&self) -> Stage {
        self.pipeline.stage()
    }
}
