use glam::DVec2;
use marble_core::{
    uniform_name, ParamValue, ParameterGenerator, ParameterSet, SeededRandom, RESOLUTION_UNIFORM,
};

use crate::backend::{ProgramHandle, RenderBackend, Topology};
use crate::error::{RenderError, RenderResult};
use crate::geometry::{self, GeometryBuffer};
use crate::program::ShaderProgramBuilder;
use crate::source::{ShaderPaths, ShaderSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    SourcesLoaded,
    ProgramReady,
    GeometryReady,
    ParametersBound,
    Drawn,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Run the diagnostic program validation step.
    pub validate: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            validate: cfg!(debug_assertions),
        }
    }
}

/// Owns the backend and every GPU resource needed to draw one marble frame.
///
/// Resources are released exactly once: by [`release`](Self::release) after
/// a failed setup, or when the pipeline is dropped.
pub struct RenderPipeline<B: RenderBackend> {
    backend: B,
    program: Option<ProgramHandle>,
    geometry: Option<GeometryBuffer>,
    parameters: Option<ParameterSet>,
    stage: Stage,
    draw_calls: u32,
}

impl<B: RenderBackend> RenderPipeline<B> {
    /// Load sources, build the program, upload the quad, bind a freshly
    /// generated parameter set and draw once.
    ///
    /// Steps run strictly in order and none are retried. On failure every
    /// resource created so far is released before the error is returned.
    pub async fn run<S: ShaderSource>(
        backend: B,
        sources: &S,
        paths: &ShaderPaths,
        rng: &mut SeededRandom,
        options: PipelineOptions,
    ) -> RenderResult<Self> {
        let mut pipeline = Self {
            backend,
            program: None,
            geometry: None,
            parameters: None,
            stage: Stage::Idle,
            draw_calls: 0,
        };

        let outcome = pipeline.execute(sources, paths, rng, options).await;
        match outcome {
            Ok(()) => Ok(pipeline),
            Err(e) => {
                log::error!("Render setup failed after {:?}: {e}", pipeline.stage);
                pipeline.stage = Stage::Failed;
                pipeline.release();
                Err(e)
            }
        }
    }

    async fn execute<S: ShaderSource>(
        &mut self,
        sources: &S,
        paths: &ShaderPaths,
        rng: &mut SeededRandom,
        options: PipelineOptions,
    ) -> RenderResult<()> {
        let vertex_source = sources.load(&paths.vertex).await?;
        let fragment_source = sources.load(&paths.fragment).await?;
        self.advance(Stage::SourcesLoaded);

        let program = ShaderProgramBuilder::build(
            &mut self.backend,
            &vertex_source,
            &fragment_source,
            options.validate,
        )?;
        self.program = Some(program);
        self.advance(Stage::ProgramReady);

        self.geometry = Some(geometry::upload_quad(&mut self.backend, program)?);
        self.advance(Stage::GeometryReady);

        let parameters = ParameterGenerator::generate(rng);
        self.bind_uniforms(program, &parameters)?;
        self.parameters = Some(parameters);
        self.advance(Stage::ParametersBound);

        self.draw()
    }

    fn advance(&mut self, stage: Stage) {
        log::debug!("pipeline: {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    /// Resolution first, then every parameter in schema order. Uniforms the
    /// shader does not declare are skipped.
    fn bind_uniforms(
        &mut self,
        program: ProgramHandle,
        parameters: &ParameterSet,
    ) -> RenderResult<()> {
        let (width, height) = self.backend.viewport();
        let resolution = ParamValue::Vec2(DVec2::new(width as f64, height as f64));
        self.set_uniform(program, RESOLUTION_UNIFORM, resolution)?;

        for (name, value) in parameters.iter() {
            self.set_uniform(program, &uniform_name(name), value)?;
        }
        Ok(())
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        name: &str,
        value: ParamValue,
    ) -> RenderResult<()> {
        match self.backend.uniform_location(program, name) {
            Some(location) => self.backend.set_uniform(location, value),
            None => {
                log::warn!("Shader does not declare uniform `{name}`, skipping");
                Ok(())
            }
        }
    }

    fn draw(&mut self) -> RenderResult<()> {
        let geometry = self
            .geometry
            .ok_or_else(|| RenderError::Backend("draw requested before geometry upload".into()))?;

        self.backend
            .draw_indexed(Topology::TriangleList, geometry.index_buffer, geometry.index_count)?;
        self.draw_calls += 1;
        self.advance(Stage::Drawn);

        let (width, height) = self.backend.viewport();
        log::info!("Frame drawn ({width}×{height})");
        Ok(())
    }

    /// Deactivate and delete the program and buffers. Safe to call more than
    /// once; each handle is taken before it is deleted.
    pub fn release(&mut self) {
        let program = self.program.take();
        let geometry = self.geometry.take();
        if program.is_none() && geometry.is_none() {
            return;
        }

        self.backend.use_program(None);
        if let Some(geometry) = geometry {
            geometry.release(&mut self.backend);
        }
        if let Some(program) = program {
            self.backend.delete_program(program);
        }
        log::debug!("pipeline resources released");
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn parameters(&self) -> Option<&ParameterSet> {
        self.parameters.as_ref()
    }

    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: RenderBackend> Drop for RenderPipeline<B> {
    fn drop(&mut self) {
        self.release();
    }
}
