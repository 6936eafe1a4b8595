//! WGSL diagnostics and reflection via naga.
//!
//! wgpu binds uniforms as one buffer laid out by the shader, so named
//! uniform access needs the byte offset of every member. Vertex inputs are
//! reflected the same way to build the pipeline's buffer layouts.

use marble_core::Shape;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Module, ScalarKind, ShaderStage, TypeInner, VectorSize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    pub name: String,
    pub location: u32,
    /// Number of `f32` components (1..=4).
    pub components: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub shape: Shape,
}

/// A `var<uniform>` struct: where it is bound and where each member lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    /// Buffer size in bytes, rounded up to 16.
    pub size: u32,
    pub members: Vec<UniformMember>,
}

#[cfg(test)]
impl UniformBlock {
    fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Parse and validate WGSL. The error is the rendered diagnostic.
pub fn parse_wgsl(source: &str) -> Result<Module, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;
    Ok(module)
}

pub fn entry_point(module: &Module, stage: ShaderStage) -> Option<&str> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage)
        .map(|ep| ep.name.as_str())
}

/// `@location` inputs of the named vertex entry point, sorted by location.
/// Inputs may be plain arguments or members of a struct argument.
pub fn vertex_inputs(module: &Module, entry: &str) -> Result<Vec<VertexInput>, String> {
    let ep = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == ShaderStage::Vertex && ep.name == entry)
        .ok_or_else(|| format!("no vertex entry point `{entry}`"))?;

    let mut inputs = Vec::new();
    for arg in &ep.function.arguments {
        let name = arg.name.clone().unwrap_or_default();
        match &arg.binding {
            Some(Binding::Location { location, .. }) => {
                inputs.push(VertexInput {
                    components: float_components(module, arg.ty, &name)?,
                    name,
                    location: *location,
                });
            }
            Some(Binding::BuiltIn(_)) => {}
            None => {
                if let TypeInner::Struct { members, .. } = &module.types[arg.ty].inner {
                    for member in members {
                        if let Some(Binding::Location { location, .. }) = member.binding {
                            let name = member.name.clone().unwrap_or_default();
                            inputs.push(VertexInput {
                                components: float_components(module, member.ty, &name)?,
                                name,
                                location,
                            });
                        }
                    }
                }
            }
        }
    }
    inputs.sort_by_key(|i| i.location);
    Ok(inputs)
}

fn float_components(module: &Module, ty: naga::Handle<naga::Type>, name: &str) -> Result<u8, String> {
    match module.types[ty].inner {
        TypeInner::Scalar(s) if s.kind == ScalarKind::Float && s.width == 4 => Ok(1),
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float && scalar.width == 4 => {
            Ok(size as u8)
        }
        _ => Err(format!("vertex input `{name}` must be f32 or vecN<f32>")),
    }
}

/// The module's uniform block, if it declares one. Members that are not
/// `f32`, `vec2<f32>` or `vec3<f32>` cannot be set by name and are left out.
pub fn uniform_block(module: &Module) -> Result<Option<UniformBlock>, String> {
    let mut blocks = module
        .global_variables
        .iter()
        .filter(|(_, var)| var.space == AddressSpace::Uniform);

    let Some((_, var)) = blocks.next() else {
        return Ok(None);
    };
    if blocks.next().is_some() {
        return Err("only one var<uniform> block is supported".into());
    }

    let binding = var
        .binding
        .as_ref()
        .ok_or_else(|| "uniform block has no @group/@binding".to_string())?;
    let TypeInner::Struct { members, span } = &module.types[var.ty].inner else {
        return Err("uniform block must be a struct".into());
    };

    let members = members
        .iter()
        .filter_map(|m| {
            let shape = match module.types[m.ty].inner {
                TypeInner::Scalar(s) if s.kind == ScalarKind::Float && s.width == 4 => Shape::Scalar,
                TypeInner::Vector { size: VectorSize::Bi, scalar }
                    if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
                {
                    Shape::Vec2
                }
                TypeInner::Vector { size: VectorSize::Tri, scalar }
                    if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
                {
                    Shape::Vec3
                }
                _ => return None,
            };
            Some(UniformMember {
                name: m.name.clone()?,
                offset: m.offset,
                shape,
            })
        })
        .collect();

    Ok(Some(UniformBlock {
        group: binding.group,
        binding: binding.binding,
        size: span.next_multiple_of(16),
        members,
    }))
}
