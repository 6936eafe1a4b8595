//! Recording backend for unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use marble_core::ParamValue;

use crate::backend::{
    BufferHandle, BufferTarget, ProgramHandle, RenderBackend, ShaderHandle, ShaderKind, Topology,
    UniformLocation, VertexAttribute,
};
use crate::error::{RenderError, RenderResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CompileShader(ShaderKind, ShaderHandle),
    DeleteShader(ShaderHandle),
    CreateProgram(ProgramHandle),
    AttachShader(ProgramHandle, ShaderHandle),
    DetachShader(ProgramHandle, ShaderHandle),
    LinkProgram(ProgramHandle),
    ValidateProgram(ProgramHandle),
    UseProgram(Option<ProgramHandle>),
    DeleteProgram(ProgramHandle),
    CreateBuffer(BufferTarget, BufferHandle, usize),
    DeleteBuffer(BufferHandle),
    VertexAttribPointer(u32, BufferHandle, VertexAttribute),
    SetUniform(String, ParamValue),
    DrawIndexed(Topology, BufferHandle, u32),
}

pub struct MockBackend {
    pub size: (u32, u32),
    pub calls: Vec<Call>,
    /// Compile log returned for shaders of this kind.
    pub compile_errors: HashMap<ShaderKind, String>,
    pub link_error: Option<String>,
    pub validate_error: Option<String>,
    pub fail_buffer: Option<BufferTarget>,
    /// Error returned by `draw_indexed`.
    pub fail_draw: Option<String>,
    /// Attributes the "shader" declares, by name.
    pub attributes: Vec<&'static str>,
    /// Uniforms the "shader" declares; `None` accepts any name.
    pub uniforms: Option<Vec<String>>,
    /// Scalar-only uniforms, for shape-mismatch tests.
    pub scalar_uniforms: HashSet<String>,

    pub live_shaders: HashSet<ShaderHandle>,
    pub live_programs: HashSet<ProgramHandle>,
    pub live_buffers: HashSet<BufferHandle>,
    pub active: Option<ProgramHandle>,

    next_id: u32,
    shader_kinds: HashMap<ShaderHandle, ShaderKind>,
    uniform_names: RefCell<Vec<String>>,
    linked: HashSet<ProgramHandle>,
    validated: HashSet<ProgramHandle>,
}

impl MockBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            calls: Vec::new(),
            compile_errors: HashMap::new(),
            link_error: None,
            validate_error: None,
            fail_buffer: None,
            fail_draw: None,
            attributes: vec!["vertPosition"],
            uniforms: None,
            scalar_uniforms: HashSet::new(),
            live_shaders: HashSet::new(),
            live_programs: HashSet::new(),
            live_buffers: HashSet::new(),
            active: None,
            next_id: 1,
            shader_kinds: HashMap::new(),
            uniform_names: RefCell::new(Vec::new()),
            linked: HashSet::new(),
            validated: HashSet::new(),
        }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn uniforms_set(&self) -> Vec<(String, ParamValue)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SetUniform(name, value) => Some((name.clone(), *value)),
                _ => None,
            })
            .collect()
    }

    pub fn nothing_live(&self) -> bool {
        self.live_shaders.is_empty() && self.live_programs.is_empty() && self.live_buffers.is_empty()
    }
}

impl RenderBackend for MockBackend {
    fn viewport(&self) -> (u32, u32) {
        self.size
    }

    fn compile_shader(&mut self, kind: ShaderKind, _source: &str) -> ShaderHandle {
        let handle = ShaderHandle(self.next());
        self.shader_kinds.insert(handle, kind);
        self.live_shaders.insert(handle);
        self.calls.push(Call::CompileShader(kind, handle));
        handle
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        self.shader_kinds
            .get(&shader)
            .and_then(|kind| self.compile_errors.get(kind))
            .cloned()
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        assert!(self.live_shaders.remove(&shader), "double delete of {shader:?}");
        self.calls.push(Call::DeleteShader(shader));
    }

    fn create_program(&mut self) -> ProgramHandle {
        let handle = ProgramHandle(self.next());
        self.live_programs.insert(handle);
        self.calls.push(Call::CreateProgram(handle));
        handle
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        self.calls.push(Call::AttachShader(program, shader));
    }

    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        self.calls.push(Call::DetachShader(program, shader));
    }

    fn link_program(&mut self, program: ProgramHandle) {
        if self.link_error.is_none() {
            self.linked.insert(program);
        }
        self.calls.push(Call::LinkProgram(program));
    }

    fn link_status(&self, program: ProgramHandle) -> bool {
        self.linked.contains(&program)
    }

    fn validate_program(&mut self, program: ProgramHandle) {
        if self.validate_error.is_none() && self.linked.contains(&program) {
            self.validated.insert(program);
        }
        self.calls.push(Call::ValidateProgram(program));
    }

    fn validate_status(&self, program: ProgramHandle) -> bool {
        self.validated.contains(&program)
    }

    fn program_info_log(&self, _program: ProgramHandle) -> String {
        self.link_error
            .clone()
            .or_else(|| self.validate_error.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.active = program;
        self.calls.push(Call::UseProgram(program));
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        assert!(self.live_programs.remove(&program), "double delete of {program:?}");
        self.calls.push(Call::DeleteProgram(program));
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        contents: &[u8],
    ) -> RenderResult<BufferHandle> {
        if self.fail_buffer == Some(target) {
            return Err(RenderError::Backend(format!("out of memory for {target:?} buffer")));
        }
        let handle = BufferHandle(self.next());
        self.live_buffers.insert(handle);
        self.calls.push(Call::CreateBuffer(target, handle, contents.len()));
        Ok(handle)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        assert!(self.live_buffers.remove(&buffer), "double delete of {buffer:?}");
        self.calls.push(Call::DeleteBuffer(buffer));
    }

    fn attrib_location(&self, _program: ProgramHandle, name: &str) -> Option<u32> {
        self.attributes.iter().position(|a| *a == name).map(|i| i as u32)
    }

    fn vertex_attrib_pointer(
        &mut self,
        _program: ProgramHandle,
        location: u32,
        buffer: BufferHandle,
        layout: VertexAttribute,
    ) -> RenderResult<()> {
        self.calls.push(Call::VertexAttribPointer(location, buffer, layout));
        Ok(())
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        if let Some(declared) = &self.uniforms {
            if !declared.iter().any(|u| u == name) {
                return None;
            }
        }
        let mut names = self.uniform_names.borrow_mut();
        let index = match names.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                names.push(name.to_owned());
                names.len() - 1
            }
        };
        Some(UniformLocation {
            program,
            index: index as u32,
        })
    }

    fn set_uniform(&mut self, location: UniformLocation, value: ParamValue) -> RenderResult<()> {
        let name = self
            .uniform_names
            .borrow()
            .get(location.index as usize)
            .cloned()
            .ok_or_else(|| RenderError::Backend(format!("unknown uniform {location:?}")))?;
        if self.scalar_uniforms.contains(&name) && !matches!(value, ParamValue::Scalar(_)) {
            return Err(RenderError::UniformShape {
                name,
                expected: "scalar",
                got: value.shape().name(),
            });
        }
        self.calls.push(Call::SetUniform(name, value));
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        topology: Topology,
        index_buffer: BufferHandle,
        count: u32,
    ) -> RenderResult<()> {
        assert!(self.active.is_some(), "draw without an active program");
        assert!(self.live_buffers.contains(&index_buffer), "draw from a deleted buffer");
        if let Some(message) = &self.fail_draw {
            return Err(RenderError::Backend(message.clone()));
        }
        self.calls.push(Call::DrawIndexed(topology, index_buffer, count));
        Ok(())
    }
}
