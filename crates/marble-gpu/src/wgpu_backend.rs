use std::collections::HashMap;

use marble_core::ParamValue;
use naga::ShaderStage;
use wgpu::util::DeviceExt;

use crate::backend::{
    BufferHandle, BufferTarget, ProgramHandle, RenderBackend, ShaderHandle, ShaderKind, Topology,
    UniformLocation, VertexAttribute,
};
use crate::error::{RenderError, RenderResult};
use crate::reflect::{self, UniformBlock, VertexInput};

// ---------------------------------------------------------------------------
// Backend objects
// ---------------------------------------------------------------------------

struct ShaderObject {
    kind: ShaderKind,
    compiled: Option<CompiledShader>,
    info_log: String,
}

struct CompiledShader {
    module: naga::Module,
    gpu_module: wgpu::ShaderModule,
    entry_point: String,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<u32>,
    linked: Option<LinkedProgram>,
    validated: bool,
    info_log: String,
}

struct LinkedProgram {
    pipeline: wgpu::RenderPipeline,
    uniforms: Option<UniformState>,
    inputs: Vec<VertexInput>,
    /// Buffer id feeding each entry of `inputs`, one vertex buffer slot each.
    vertex_buffers: Vec<Option<u32>>,
}

/// CPU copy of the uniform block, written by name and uploaded at draw time.
struct UniformState {
    block: UniformBlock,
    layout: wgpu::BindGroupLayout,
    buffer: wgpu::Buffer,
    staging: Vec<u8>,
}

// ---------------------------------------------------------------------------
// WgpuBackend
// ---------------------------------------------------------------------------

/// [`RenderBackend`] drawing into a window surface through wgpu.
///
/// Shaders are WGSL. Program objects map to one render pipeline each;
/// uniform names and vertex inputs are resolved by reflecting the WGSL.
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    next_id: u32,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    buffers: HashMap<u32, wgpu::Buffer>,
    active: Option<ProgramHandle>,
}

impl WgpuBackend {
    /// Acquire a device for `target` and configure its surface to
    /// `width`×`height`. Any missing piece is [`RenderError::ContextUnavailable`].
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(target)
            .map_err(|e| RenderError::ContextUnavailable(format!("cannot create surface: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::ContextUnavailable("no suitable GPU adapter".into()))?;

        log::info!("GPU adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("marble device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::ContextUnavailable(format!("cannot create device: {e}")))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| {
                RenderError::ContextUnavailable("surface is incompatible with the adapter".into())
            })?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "Surface configured: {}×{} {:?} Fifo",
            config.width,
            config.height,
            format
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            active: None,
        })
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Run `f` inside a validation error scope and report what it raised.
    fn scoped<T>(&self, filter: wgpu::ErrorFilter, f: impl FnOnce() -> T) -> Result<T, String> {
        self.device.push_error_scope(filter);
        let value = f();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }

    fn compile(&self, kind: ShaderKind, source: &str) -> Result<CompiledShader, String> {
        let module = reflect::parse_wgsl(source)?;
        let stage = match kind {
            ShaderKind::Vertex => ShaderStage::Vertex,
            ShaderKind::Fragment => ShaderStage::Fragment,
        };
        let entry_point = reflect::entry_point(&module, stage)
            .ok_or_else(|| format!("no @{kind} entry point"))?
            .to_owned();

        let label = format!("{kind} shader");
        let gpu_module = self.scoped(wgpu::ErrorFilter::Validation, || {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;

        Ok(CompiledShader {
            module,
            gpu_module,
            entry_point,
        })
    }

    fn link(&self, program: ProgramHandle) -> Result<LinkedProgram, String> {
        let object = self
            .programs
            .get(&program.0)
            .ok_or_else(|| format!("unknown program {}", program.0))?;

        let mut vertex = None;
        let mut fragment = None;
        for id in &object.attached {
            let shader = self
                .shaders
                .get(id)
                .ok_or_else(|| format!("shader {id} was deleted before linking"))?;
            let compiled = shader
                .compiled
                .as_ref()
                .ok_or_else(|| format!("attached {} shader did not compile", shader.kind))?;
            match shader.kind {
                ShaderKind::Vertex => vertex = Some(compiled),
                ShaderKind::Fragment => fragment = Some(compiled),
            }
        }
        let vertex = vertex.ok_or("no vertex shader attached")?;
        let fragment = fragment.ok_or("no fragment shader attached")?;

        let inputs = reflect::vertex_inputs(&vertex.module, &vertex.entry_point)?;
        let block = match (
            reflect::uniform_block(&vertex.module)?,
            reflect::uniform_block(&fragment.module)?,
        ) {
            (Some(v), Some(f)) if v != f => {
                return Err("vertex and fragment stages declare different uniform blocks".into())
            }
            (v, f) => f.or(v),
        };
        if let Some(block) = &block {
            if block.group != 0 {
                return Err(format!("uniform block must be in @group(0), found {}", block.group));
            }
        }

        let bind_group_layout = block.as_ref().map(|block| {
            self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("marble_bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: block.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            })
        });
        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = bind_group_layout.iter().collect();
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("marble_pl"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        // One tightly packed buffer slot per input.
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = inputs
            .iter()
            .map(|input| {
                [wgpu::VertexAttribute {
                    format: float_format(input.components),
                    offset: 0,
                    shader_location: input.location,
                }]
            })
            .collect();
        let buffer_layouts: Vec<wgpu::VertexBufferLayout> = inputs
            .iter()
            .zip(&attributes)
            .map(|(input, attributes)| wgpu::VertexBufferLayout {
                array_stride: packed_stride(input.components) as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let pipeline = self.scoped(wgpu::ErrorFilter::Validation, || {
            self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("marble_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex.gpu_module,
                    entry_point: vertex.entry_point.as_str(),
                    compilation_options: Default::default(),
                    buffers: &buffer_layouts,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment.gpu_module,
                    entry_point: fragment.entry_point.as_str(),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    // The quad's triangles are clockwise in NDC.
                    front_face: wgpu::FrontFace::Cw,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;

        let uniforms = match (block, bind_group_layout) {
            (Some(block), Some(layout)) => {
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("marble_uniforms"),
                    size: block.size as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                Some(UniformState {
                    staging: vec![0; block.size as usize],
                    block,
                    layout,
                    buffer,
                })
            }
            _ => None,
        };

        Ok(LinkedProgram {
            pipeline,
            uniforms,
            vertex_buffers: vec![None; inputs.len()],
            inputs,
        })
    }

    fn linked(&self, program: ProgramHandle) -> RenderResult<&LinkedProgram> {
        self.programs
            .get(&program.0)
            .and_then(|p| p.linked.as_ref())
            .ok_or_else(|| RenderError::Backend(format!("program {} is not linked", program.0)))
    }

    fn linked_mut(&mut self, program: ProgramHandle) -> RenderResult<&mut LinkedProgram> {
        self.programs
            .get_mut(&program.0)
            .and_then(|p| p.linked.as_mut())
            .ok_or_else(|| RenderError::Backend(format!("program {} is not linked", program.0)))
    }
}

fn float_format(components: u8) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn packed_stride(components: u8) -> u32 {
    components as u32 * std::mem::size_of::<f32>() as u32
}

fn check_limits(linked: &LinkedProgram, limits: &wgpu::Limits) -> Result<(), String> {
    if let Some(uniforms) = &linked.uniforms {
        if uniforms.block.size > limits.max_uniform_buffer_binding_size {
            return Err(format!(
                "uniform block is {} bytes, device allows {}",
                uniforms.block.size, limits.max_uniform_buffer_binding_size
            ));
        }
    }
    if linked.inputs.len() as u32 > limits.max_vertex_buffers {
        return Err(format!(
            "{} vertex inputs, device allows {} vertex buffers",
            linked.inputs.len(),
            limits.max_vertex_buffers
        ));
    }
    Ok(())
}

impl RenderBackend for WgpuBackend {
    fn viewport(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn compile_shader(&mut self, kind: ShaderKind, source: &str) -> ShaderHandle {
        let object = match self.compile(kind, source) {
            Ok(compiled) => ShaderObject {
                kind,
                compiled: Some(compiled),
                info_log: String::new(),
            },
            Err(log) => ShaderObject {
                kind,
                compiled: None,
                info_log: log,
            },
        };
        let id = self.next_id();
        self.shaders.insert(id, object);
        ShaderHandle(id)
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        self.shaders
            .get(&shader.0)
            .map(|s| s.info_log.clone())
            .unwrap_or_else(|| format!("unknown shader {}", shader.0))
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader.0);
    }

    fn create_program(&mut self) -> ProgramHandle {
        let id = self.next_id();
        self.programs.insert(id, ProgramObject::default());
        ProgramHandle(id)
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        if let Some(object) = self.programs.get_mut(&program.0) {
            if !object.attached.contains(&shader.0) {
                object.attached.push(shader.0);
            }
        }
    }

    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        if let Some(object) = self.programs.get_mut(&program.0) {
            object.attached.retain(|&id| id != shader.0);
        }
    }

    fn link_program(&mut self, program: ProgramHandle) {
        let result = self.link(program);
        if let Some(object) = self.programs.get_mut(&program.0) {
            object.validated = false;
            match result {
                Ok(linked) => {
                    object.linked = Some(linked);
                    object.info_log.clear();
                }
                Err(log) => {
                    object.linked = None;
                    object.info_log = log;
                }
            }
        }
    }

    fn link_status(&self, program: ProgramHandle) -> bool {
        self.programs
            .get(&program.0)
            .is_some_and(|p| p.linked.is_some())
    }

    fn validate_program(&mut self, program: ProgramHandle) {
        let limits = self.device.limits();
        if let Some(object) = self.programs.get_mut(&program.0) {
            let verdict = match &object.linked {
                Some(linked) => check_limits(linked, &limits),
                None => Err("program is not linked".into()),
            };
            match verdict {
                Ok(()) => object.validated = true,
                Err(log) => {
                    object.validated = false;
                    object.info_log = log;
                }
            }
        }
    }

    fn validate_status(&self, program: ProgramHandle) -> bool {
        self.programs.get(&program.0).is_some_and(|p| p.validated)
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.programs
            .get(&program.0)
            .map(|p| p.info_log.clone())
            .unwrap_or_else(|| format!("unknown program {}", program.0))
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.active = program;
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program.0);
        if self.active == Some(program) {
            self.active = None;
        }
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        contents: &[u8],
    ) -> RenderResult<BufferHandle> {
        if contents.is_empty() {
            return Err(RenderError::Backend(format!("empty {target:?} buffer")));
        }
        let (label, usage) = match target {
            BufferTarget::Vertex => ("marble_vertices", wgpu::BufferUsages::VERTEX),
            BufferTarget::Index => ("marble_indices", wgpu::BufferUsages::INDEX),
        };
        let buffer = self
            .scoped(wgpu::ErrorFilter::OutOfMemory, || {
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(label),
                        contents,
                        usage,
                    })
            })
            .map_err(RenderError::Backend)?;

        let id = self.next_id();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if let Some(gpu_buffer) = self.buffers.remove(&buffer.0) {
            gpu_buffer.destroy();
        }
        for linked in self.programs.values_mut().filter_map(|p| p.linked.as_mut()) {
            for slot in &mut linked.vertex_buffers {
                if *slot == Some(buffer.0) {
                    *slot = None;
                }
            }
        }
    }

    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.linked(program)
            .ok()?
            .inputs
            .iter()
            .find(|input| input.name == name)
            .map(|input| input.location)
    }

    fn vertex_attrib_pointer(
        &mut self,
        program: ProgramHandle,
        location: u32,
        buffer: BufferHandle,
        layout: VertexAttribute,
    ) -> RenderResult<()> {
        if !self.buffers.contains_key(&buffer.0) {
            return Err(RenderError::Backend(format!("unknown buffer {}", buffer.0)));
        }
        let linked = self.linked_mut(program)?;
        let slot = linked
            .inputs
            .iter()
            .position(|input| input.location == location)
            .ok_or_else(|| RenderError::MissingAttribute(format!("@location({location})")))?;

        let input = &linked.inputs[slot];
        let packed = packed_stride(input.components);
        if layout.components != input.components
            || layout.normalized
            || layout.offset != 0
            || layout.effective_stride() != packed
        {
            return Err(RenderError::Backend(format!(
                "attribute `{}` needs {} tightly packed f32 components, got {layout:?}",
                input.name, input.components
            )));
        }

        linked.vertex_buffers[slot] = Some(buffer.0);
        Ok(())
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let uniforms = self.linked(program).ok()?.uniforms.as_ref()?;
        uniforms
            .block
            .members
            .iter()
            .position(|m| m.name == name)
            .map(|index| UniformLocation {
                program,
                index: index as u32,
            })
    }

    fn set_uniform(&mut self, location: UniformLocation, value: ParamValue) -> RenderResult<()> {
        let uniforms = self
            .linked_mut(location.program)?
            .uniforms
            .as_mut()
            .ok_or_else(|| RenderError::Backend("program declares no uniforms".into()))?;
        let member = uniforms
            .block
            .members
            .get(location.index as usize)
            .ok_or_else(|| RenderError::Backend(format!("invalid uniform location {location:?}")))?;

        if member.shape != value.shape() {
            return Err(RenderError::UniformShape {
                name: member.name.clone(),
                expected: member.shape.name(),
                got: value.shape().name(),
            });
        }

        let floats = value.to_f32s();
        let bytes: &[u8] = bytemuck::cast_slice(&floats[..]);
        let start = member.offset as usize;
        uniforms.staging[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        topology: Topology,
        index_buffer: BufferHandle,
        count: u32,
    ) -> RenderResult<()> {
        let program = self
            .active
            .ok_or_else(|| RenderError::Backend("no active program".into()))?;
        let linked = self.linked(program)?;
        let indices = self
            .buffers
            .get(&index_buffer.0)
            .ok_or_else(|| RenderError::Backend(format!("unknown buffer {}", index_buffer.0)))?;
        let vertex_buffers = linked
            .vertex_buffers
            .iter()
            .zip(&linked.inputs)
            .map(|(slot, input)| {
                slot.and_then(|id| self.buffers.get(&id)).ok_or_else(|| {
                    RenderError::Backend(format!("attribute `{}` has no buffer", input.name))
                })
            })
            .collect::<RenderResult<Vec<_>>>()?;

        let bind_group = linked.uniforms.as_ref().map(|uniforms| {
            self.queue.write_buffer(&uniforms.buffer, 0, &uniforms.staging);
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("marble_bg"),
                layout: &uniforms.layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: uniforms.block.binding,
                    resource: uniforms.buffer.as_entire_binding(),
                }],
            })
        });

        let frame = self
            .surface
            .get_current_texture()
            .map_err(|e| RenderError::Backend(format!("cannot acquire surface texture: {e}")))?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("marble-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("marble-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&linked.pipeline);
            if let Some(bind_group) = &bind_group {
                pass.set_bind_group(0, bind_group, &[]);
            }
            for (slot, buffer) in vertex_buffers.iter().enumerate() {
                pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
            match topology {
                Topology::TriangleList => pass.draw_indexed(0..count, 0, 0..1),
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
