use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const fn new(pos: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position: pos, normal }
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12, // [f32; 3] is 12 bytes
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Unit cube centered at origin, one normal per face.
pub fn create_cube_geometry() -> (Vec<Vertex>, Vec<u16>) {
    const FRONT: [f32; 3] = [0.0, 0.0, 1.0];
    const BACK: [f32; 3] = [0.0, 0.0, -1.0];
    const TOP: [f32; 3] = [0.0, 1.0, 0.0];
    const BOTTOM: [f32; 3] = [0.0, -1.0, 0.0];
    const RIGHT: [f32; 3] = [1.0, 0.0, 0.0];
    const LEFT: [f32; 3] = [-1.0, 0.0, 0.0];

    let vertices = vec![
        // Front face (Z+)
        Vertex::new([-0.5, -0.5, 0.5], FRONT),
        Vertex::new([0.5, -0.5, 0.5], FRONT),
        Vertex::new([0.5, 0.5, 0.5], FRONT),
        Vertex::new([-0.5, 0.5, 0.5], FRONT),
        // Back face (Z-)
        Vertex::new([-0.5, -0.5, -0.5], BACK),
        Vertex::new([-0.5, 0.5, -0.5], BACK),
        Vertex::new([0.5, 0.5, -0.5], BACK),
        Vertex::new([0.5, -0.5, -0.5], BACK),
        // Top face (Y+)
        Vertex::new([-0.5, 0.5, -0.5], TOP),
        Vertex::new([-0.5, 0.5, 0.5], TOP),
        Vertex::new([0.5, 0.5, 0.5], TOP),
        Vertex::new([0.5, 0.5, -0.5], TOP),
        // Bottom face (Y-)
        Vertex::new([-0.5, -0.5, -0.5], BOTTOM),
        Vertex::new([0.5, -0.5, -0.5], BOTTOM),
        Vertex::new([0.5, -0.5, 0.5], BOTTOM),
        Vertex::new([-0.5, -0.5, 0.5], BOTTOM),
        // Right face (X+)
        Vertex::new([0.5, -0.5, -0.5], RIGHT),
        Vertex::new([0.5, 0.5, -0.5], RIGHT),
        Vertex::new([0.5, 0.5, 0.5], RIGHT),
        Vertex::new([0.5, -0.5, 0.5], RIGHT),
        // Left face (X-)
        Vertex::new([-0.5, -0.5, -0.5], LEFT),
        Vertex::new([-0.5, -0.5, 0.5], LEFT),
        Vertex::new([-0.5, 0.5, 0.5], LEFT),
        Vertex::new([-0.5, 0.5, -0.5], LEFT),
    ];

    let indices = vec![
        0, 1, 2, 2, 3, 0, // Front
        4, 5, 6, 6, 7, 4, // Back
        8, 9, 10, 10, 11, 8, // Top
        12, 13, 14, 14, 15, 12, // Bottom
        16, 17, 18, 18, 19, 16, // Right
        20, 21, 22, 22, 23, 20, // Left
    ];

    (vertices, indices)
}

/// Create a UV sphere centered at origin with radius 0.5.
/// Uses 16 latitude rings and 32 longitude segments.
pub fn create_sphere_geometry() -> (Vec<Vertex>, Vec<u16>) {
    let lat_segments = 16;
    let lon_segments = 32;
    let radius = 0.5;

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for lat in 0..=lat_segments {
        let theta = PI * (lat as f32) / (lat_segments as f32);
        let (sin_theta, cos_theta) = theta.sin_cos();

        for lon in 0..=lon_segments {
            let phi = TAU * (lon as f32) / (lon_segments as f32);
            let (sin_phi, cos_phi) = phi.sin_cos();

            let normal = [cos_phi * sin_theta, cos_theta, sin_phi * sin_theta];
            let position = [normal[0] * radius, normal[1] * radius, normal[2] * radius];
            vertices.push(Vertex::new(position, normal));
        }
    }

    for lat in 0..lat_segments {
        for lon in 0..lon_segments {
            let first = (lat * (lon_segments + 1) + lon) as u16;
            let second = first + lon_segments as u16 + 1;

            // Two triangles per quad, counter-clockwise seen from outside
            indices.push(first);
            indices.push(first + 1);
            indices.push(second);

            indices.push(second);
            indices.push(first + 1);
            indices.push(second + 1);
        }
    }

    (vertices, indices)
}

/// Extruded five-pointed star in the XY plane, pointing up +Y, centered at origin.
pub fn create_star_geometry(outer_radius: f32, inner_radius: f32, depth: f32) -> (Vec<Vertex>, Vec<u16>) {
    const POINTS: usize = 5;
    let half = depth * 0.5;

    let outline: Vec<[f32; 2]> = (0..POINTS * 2)
        .map(|i| {
            let angle = PI / 2.0 + i as f32 * PI / POINTS as f32;
            let r = if i % 2 == 0 { outer_radius } else { inner_radius };
            [angle.cos() * r, angle.sin() * r]
        })
        .collect();
    let n = outline.len();

    let mut vertices = Vec::with_capacity(2 * (n + 1) + 4 * n);
    let mut indices = Vec::with_capacity(6 * n + 6 * n);

    // Caps are fans around their centers.
    for (z, facing) in [(half, 1.0f32), (-half, -1.0f32)] {
        let center = vertices.len() as u16;
        vertices.push(Vertex::new([0.0, 0.0, z], [0.0, 0.0, facing]));
        for p in &outline {
            vertices.push(Vertex::new([p[0], p[1], z], [0.0, 0.0, facing]));
        }
        for i in 0..n {
            let a = center + 1 + i as u16;
            let b = center + 1 + ((i + 1) % n) as u16;
            if facing > 0.0 {
                indices.extend_from_slice(&[center, a, b]);
            } else {
                indices.extend_from_slice(&[center, b, a]);
            }
        }
    }

    // Side walls, flat shaded.
    for i in 0..n {
        let a = outline[i];
        let b = outline[(i + 1) % n];
        let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
        let len = (dx * dx + dy * dy).sqrt().max(f32::EPSILON);
        let normal = [dy / len, -dx / len, 0.0];

        let base = vertices.len() as u16;
        vertices.push(Vertex::new([a[0], a[1], -half], normal));
        vertices.push(Vertex::new([b[0], b[1], -half], normal));
        vertices.push(Vertex::new([b[0], b[1], half], normal));
        vertices.push(Vertex::new([a[0], a[1], half], normal));
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}
