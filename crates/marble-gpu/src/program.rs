use crate::backend::{ProgramHandle, RenderBackend, ShaderHandle, ShaderKind};
use crate::error::{RenderError, RenderResult};

/// Where a [`ShaderProgramBuilder`] is in the compile → link → validate
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Uncompiled,
    Compiled(ShaderKind),
    CompiledBoth,
    Linked,
    Validated,
    Failed,
}

/// Compiles a vertex/fragment pair into one program.
///
/// Every handle the builder creates is released by the builder unless it is
/// handed out by [`finish`](Self::finish): failed shaders immediately,
/// compiled shaders once linking has been attempted, and the program on any
/// link or validation failure. Dropping an unfinished builder releases
/// whatever it still holds.
pub struct ShaderProgramBuilder<'a, B: RenderBackend> {
    backend: &'a mut B,
    shaders: Vec<(ShaderKind, ShaderHandle)>,
    program: Option<ProgramHandle>,
    state: BuildState,
}

impl<'a, B: RenderBackend> ShaderProgramBuilder<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        Self {
            backend,
            shaders: Vec::new(),
            program: None,
            state: BuildState::Uncompiled,
        }
    }

    /// Compile, link, optionally validate, and make the program active.
    pub fn build(
        backend: &'a mut B,
        vertex_source: &str,
        fragment_source: &str,
        validate: bool,
    ) -> RenderResult<ProgramHandle> {
        let mut builder = Self::new(backend);
        builder.compile(ShaderKind::Vertex, vertex_source)?;
        builder.compile(ShaderKind::Fragment, fragment_source)?;
        builder.link()?;
        if validate {
            builder.validate()?;
        }
        builder.finish()
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Compile one shader stage. A non-empty info log is a failure, warnings
    /// included.
    pub fn compile(&mut self, kind: ShaderKind, source: &str) -> RenderResult<ShaderHandle> {
        let next = match (self.state, kind) {
            (BuildState::Uncompiled, kind) => BuildState::Compiled(kind),
            (BuildState::Compiled(done), kind) if done != kind => BuildState::CompiledBoth,
            (state, kind) => {
                return Err(self.out_of_order(format!("compile {kind} shader"), state));
            }
        };

        let shader = self.backend.compile_shader(kind, source);
        let log = self.backend.shader_info_log(shader);
        if !log.is_empty() {
            self.backend.delete_shader(shader);
            self.fail();
            return Err(RenderError::Compile { kind, log });
        }

        log::debug!("{kind} shader compiled");
        self.shaders.push((kind, shader));
        self.state = next;
        Ok(shader)
    }

    /// Link the compiled stages. The shader objects are detached and deleted
    /// whether or not linking succeeds.
    pub fn link(&mut self) -> RenderResult<ProgramHandle> {
        if self.state != BuildState::CompiledBoth {
            return Err(self.out_of_order("link".into(), self.state));
        }

        let program = self.backend.create_program();
        self.program = Some(program);

        for &(_, shader) in &self.shaders {
            self.backend.attach_shader(program, shader);
        }
        self.backend.link_program(program);
        for &(_, shader) in &self.shaders {
            self.backend.detach_shader(program, shader);
        }
        for (_, shader) in self.shaders.drain(..) {
            self.backend.delete_shader(shader);
        }

        if !self.backend.link_status(program) {
            let log = self.backend.program_info_log(program);
            self.fail();
            return Err(RenderError::Link(log));
        }

        log::debug!("program linked");
        self.state = BuildState::Linked;
        Ok(program)
    }

    /// Diagnostic check that the linked program can run in the current
    /// context. Release builds may skip it.
    pub fn validate(&mut self) -> RenderResult<()> {
        let program = match (self.state, self.program) {
            (BuildState::Linked, Some(program)) => program,
            (state, _) => return Err(self.out_of_order("validate".into(), state)),
        };

        self.backend.validate_program(program);
        if !self.backend.validate_status(program) {
            let log = self.backend.program_info_log(program);
            self.fail();
            return Err(RenderError::Validation(log));
        }

        log::debug!("program validated");
        self.state = BuildState::Validated;
        Ok(())
    }

    /// Activate the program and hand ownership of it to the caller.
    pub fn finish(mut self) -> RenderResult<ProgramHandle> {
        let program = match (self.state, self.program.take()) {
            (BuildState::Linked | BuildState::Validated, Some(program)) => program,
            (state, program) => {
                self.program = program;
                return Err(self.out_of_order("finish".into(), state));
            }
        };
        self.backend.use_program(Some(program));
        Ok(program)
    }

    fn out_of_order(&mut self, action: String, state: BuildState) -> RenderError {
        self.fail();
        RenderError::Backend(format!("cannot {action} while program build is {state:?}"))
    }

    /// Release everything still held and enter the terminal state.
    fn fail(&mut self) {
        for (_, shader) in self.shaders.drain(..) {
            self.backend.delete_shader(shader);
        }
        if let Some(program) = self.program.take() {
            self.backend.delete_program(program);
        }
        self.state = BuildState::Failed;
    }
}

impl<B: RenderBackend> Drop for ShaderProgramBuilder<'_, B> {
    fn drop(&mut self) {
        if !self.shaders.is_empty() || self.program.is_some() {
            self.fail();
        }
    }
}
