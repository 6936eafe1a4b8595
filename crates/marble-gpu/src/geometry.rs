use crate::backend::{BufferHandle, BufferTarget, ProgramHandle, RenderBackend, VertexAttribute};
use crate::error::{RenderError, RenderResult};

/// Corners of the viewport in normalized device coordinates.
pub const QUAD_VERTICES: [[f32; 3]; 4] = [
    [-1.0, 1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
];

/// Two triangles sharing the 3–1 diagonal, both wound the same way.
pub const QUAD_INDICES: [u16; 6] = [3, 2, 1, 3, 1, 0];

/// Vertex shader input the quad positions are bound to.
pub const POSITION_ATTRIBUTE: &str = "vertPosition";

/// The uploaded full-screen quad. Plain handles; the owner deletes them via
/// [`GeometryBuffer::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryBuffer {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
}

impl GeometryBuffer {
    pub fn release<B: RenderBackend>(self, backend: &mut B) {
        backend.delete_buffer(self.vertex_buffer);
        backend.delete_buffer(self.index_buffer);
    }
}

/// Upload the quad and point `program`'s position attribute at it.
///
/// Any buffer created before a failure is deleted before returning.
pub fn upload_quad<B: RenderBackend>(
    backend: &mut B,
    program: ProgramHandle,
) -> RenderResult<GeometryBuffer> {
    let vertex_buffer =
        backend.create_buffer(BufferTarget::Vertex, bytemuck::cast_slice(&QUAD_VERTICES[..]))?;

    let index_buffer =
        match backend.create_buffer(BufferTarget::Index, bytemuck::cast_slice(&QUAD_INDICES[..])) {
            Ok(buffer) => buffer,
            Err(e) => {
                backend.delete_buffer(vertex_buffer);
                return Err(e);
            }
        };

    let geometry = GeometryBuffer {
        vertex_buffer,
        index_buffer,
        index_count: QUAD_INDICES.len() as u32,
    };

    let bound = backend
        .attrib_location(program, POSITION_ATTRIBUTE)
        .ok_or_else(|| RenderError::MissingAttribute(POSITION_ATTRIBUTE.into()))
        .and_then(|location| {
            backend.vertex_attrib_pointer(
                program,
                location,
                vertex_buffer,
                VertexAttribute::packed_f32(3),
            )
        });
    if let Err(e) = bound {
        geometry.release(backend);
        return Err(e);
    }

    log::debug!(
        "quad uploaded: {} vertices, {} indices",
        QUAD_VERTICES.len(),
        QUAD_INDICES.len()
    );
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockBackend};

    fn signed_area(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> f32 {
        0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]))
    }

    fn triangles() -> Vec<[[f32; 3]; 3]> {
        QUAD_INDICES
            .chunks(3)
            .map(|t| {
                [
                    QUAD_VERTICES[t[0] as usize],
                    QUAD_VERTICES[t[1] as usize],
                    QUAD_VERTICES[t[2] as usize],
                ]
            })
            .collect()
    }

    #[test]
    fn quad_is_four_vertices_and_six_indices() {
        assert_eq!(QUAD_VERTICES.len(), 4);
        assert_eq!(QUAD_INDICES.len(), 6);
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < QUAD_VERTICES.len()));
    }

    #[test]
    fn both_triangles_share_winding_and_cover_clip_space() {
        let areas: Vec<f32> = triangles()
            .iter()
            .map(|t| signed_area(t[0], t[1], t[2]))
            .collect();
        assert_eq!(areas.len(), 2);
        assert!(areas[0].signum() == areas[1].signum(), "areas {areas:?}");
        // Clip space is [-1, 1]² → area 4.
        let total: f32 = areas.iter().map(|a| a.abs()).sum();
        assert!((total - 4.0).abs() < 1e-6, "total {total}");
    }

    #[test]
    fn corners_are_at_unit_distance_on_both_axes() {
        for v in QUAD_VERTICES {
            assert_eq!(v[0].abs(), 1.0);
            assert_eq!(v[1].abs(), 1.0);
            assert_eq!(v[2], 0.0);
        }
    }

    #[test]
    fn upload_is_independent_of_viewport_size() {
        for (w, h) in [(1, 1), (800, 600), (3840, 2160)] {
            let mut gl = MockBackend::new(w, h);
            let geometry = upload_quad(&mut gl, ProgramHandle(1)).unwrap();
            assert_eq!(geometry.index_count, 6);
            assert!(gl.calls.contains(&Call::CreateBuffer(
                BufferTarget::Vertex,
                geometry.vertex_buffer,
                4 * 3 * 4
            )));
            assert!(gl.calls.contains(&Call::CreateBuffer(
                BufferTarget::Index,
                geometry.index_buffer,
                6 * 2
            )));
        }
    }

    #[test]
    fn attribute_is_three_packed_floats_from_the_vertex_buffer() {
        let mut gl = MockBackend::new(8, 8);
        let geometry = upload_quad(&mut gl, ProgramHandle(1)).unwrap();
        let attr = gl
            .calls
            .iter()
            .find_map(|c| match c {
                Call::VertexAttribPointer(0, buffer, layout) => Some((*buffer, *layout)),
                _ => None,
            })
            .expect("attribute configured");
        assert_eq!(attr.0, geometry.vertex_buffer);
        assert_eq!(attr.1, VertexAttribute::packed_f32(3));
    }

    #[test]
    fn index_buffer_failure_releases_vertex_buffer() {
        let mut gl = MockBackend::new(8, 8);
        gl.fail_buffer = Some(BufferTarget::Index);
        assert!(upload_quad(&mut gl, ProgramHandle(1)).is_err());
        assert!(gl.live_buffers.is_empty());
    }

    #[test]
    fn missing_position_attribute_releases_both_buffers() {
        let mut gl = MockBackend::new(8, 8);
        gl.attributes.clear();
        let err = upload_quad(&mut gl, ProgramHandle(1)).unwrap_err();
        assert!(matches!(err, RenderError::MissingAttribute(ref name) if name == "vertPosition"));
        assert!(gl.live_buffers.is_empty());
    }
}
