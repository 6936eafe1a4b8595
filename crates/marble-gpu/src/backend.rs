use std::fmt;

use marble_core::ParamValue;

use crate::error::RenderResult;

// ---------------------------------------------------------------------------
// Handles — opaque ids owned by whoever created them
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// A named uniform resolved against one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramHandle,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderKind::Vertex => "vertex",
            ShaderKind::Fragment => "fragment",
        })
    }
}

/// What a buffer holds. Stated on every upload; backends keep no
/// "currently bound buffer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data.
    Vertex,
    /// 16-bit triangle indices.
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
}

/// Layout of one float vertex attribute inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Floats per vertex (1..=4).
    pub components: u8,
    pub normalized: bool,
    /// Bytes between consecutive vertices; 0 means tightly packed.
    pub stride: u32,
    /// Byte offset of the first component.
    pub offset: u32,
}

impl VertexAttribute {
    pub const fn packed_f32(components: u8) -> Self {
        Self {
            components,
            normalized: false,
            stride: components as u32 * std::mem::size_of::<f32>() as u32,
            offset: 0,
        }
    }

    /// Stride with the "0 = tightly packed" convention resolved.
    pub fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.components as u32 * std::mem::size_of::<f32>() as u32
        } else {
            self.stride
        }
    }
}

// ---------------------------------------------------------------------------
// RenderBackend — the capability interface the pipeline is written against
// ---------------------------------------------------------------------------

/// A GPU context that can build one shader program and draw with it.
///
/// Status queries (`shader_info_log`, `link_status`, ...) are separate from
/// the operations that produce them, so callers decide what counts as
/// failure and when resources are released.
pub trait RenderBackend {
    /// Drawable size in pixels.
    fn viewport(&self) -> (u32, u32);

    /// Compile `source`; check [`shader_info_log`](Self::shader_info_log)
    /// for diagnostics. A handle is returned even when compilation fails.
    fn compile_shader(&mut self, kind: ShaderKind, source: &str) -> ShaderHandle;
    fn shader_info_log(&self, shader: ShaderHandle) -> String;
    fn delete_shader(&mut self, shader: ShaderHandle);

    fn create_program(&mut self) -> ProgramHandle;
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);
    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);
    fn link_program(&mut self, program: ProgramHandle);
    fn link_status(&self, program: ProgramHandle) -> bool;
    fn validate_program(&mut self, program: ProgramHandle);
    fn validate_status(&self, program: ProgramHandle) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn use_program(&mut self, program: Option<ProgramHandle>);
    fn delete_program(&mut self, program: ProgramHandle);

    fn create_buffer(&mut self, target: BufferTarget, contents: &[u8])
        -> RenderResult<BufferHandle>;
    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;
    /// Source attribute `location` from `buffer` and enable it.
    fn vertex_attrib_pointer(
        &mut self,
        program: ProgramHandle,
        location: u32,
        buffer: BufferHandle,
        layout: VertexAttribute,
    ) -> RenderResult<()>;

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn set_uniform(&mut self, location: UniformLocation, value: ParamValue) -> RenderResult<()>;

    /// Draw `count` indices from `index_buffer` with the active program.
    fn draw_indexed(
        &mut self,
        topology: Topology,
        index_buffer: BufferHandle,
        count: u32,
    ) -> RenderResult<()>;
}

/// Lets a caller keep ownership of its backend while a pipeline drives it.
impl<B: RenderBackend + ?Sized> RenderBackend for &mut B {
    fn viewport(&self) -> (u32, u32) {
        (**self).viewport()
    }
    fn compile_shader(&mut self, kind: ShaderKind, source: &str) -> ShaderHandle {
        (**self).compile_shader(kind, source)
    }
    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        (**self).shader_info_log(shader)
    }
    fn delete_shader(&mut self, shader: ShaderHandle) {
        (**self).delete_shader(shader)
    }
    fn create_program(&mut self) -> ProgramHandle {
        (**self).create_program()
    }
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        (**self).attach_shader(program, shader)
    }
    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        (**self).detach_shader(program, shader)
    }
    fn link_program(&mut self, program: ProgramHandle) {
        (**self).link_program(program)
    }
    fn link_status(&self, program: ProgramHandle) -> bool {
        (**self).link_status(program)
    }
    fn validate_program(&mut self, program: ProgramHandle) {
        (**self).validate_program(program)
    }
    fn validate_status(&self, program: ProgramHandle) -> bool {
        (**self).validate_status(program)
    }
    fn program_info_log(&self, program: ProgramHandle) -> String {
        (**self).program_info_log(program)
    }
    fn use_program(&mut self, program: Option<ProgramHandle>) {
        (**self).use_program(program)
    }
    fn delete_program(&mut self, program: ProgramHandle) {
        (**self).delete_program(program)
    }
    fn create_buffer(
        &mut self,
        target: BufferTarget,
        contents: &[u8],
    ) -> RenderResult<BufferHandle> {
        (**self).create_buffer(target, contents)
    }
    fn delete_buffer(&mut self, buffer: BufferHandle) {
        (**self).delete_buffer(buffer)
    }
    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        (**self).attrib_location(program, name)
    }
    fn vertex_attrib_pointer(
        &mut self,
        program: ProgramHandle,
        location: u32,
        buffer: BufferHandle,
        layout: VertexAttribute,
    ) -> RenderResult<()> {
        (**self).vertex_attrib_pointer(program, location, buffer, layout)
    }
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        (**self).uniform_location(program, name)
    }
    fn set_uniform(&mut self, location: UniformLocation, value: ParamValue) -> RenderResult<()> {
        (**self).set_uniform(location, value)
    }
    fn draw_indexed(
        &mut self,
        topology: Topology,
        index_buffer: BufferHandle,
        count: u32,
    ) -> RenderResult<()> {
        (**self).draw_indexed(topology, index_buffer, count)
    }
}
