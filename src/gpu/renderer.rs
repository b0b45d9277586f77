//! GPU renderer for the tree scene.
//!
//! Ornament groups and the star are drawn as instanced meshes, the foliage as
//! instanced billboards over them. The foliage layout is uploaded once; an
//! ornament buffer is re-uploaded only when its group published a new pass.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::foliage::GpuFoliageInstance;
use crate::gpu::mesh::{self, Vertex};
use crate::gpu::pipeline::{self, DEPTH_FORMAT};
use crate::ornament::{GpuOrnamentInstance, OrnamentShape};
use crate::palette;
use crate::visualiser::VisualiserState;

/// Direction towards the key light, before normalisation.
const LIGHT_DIRECTION: [f32; 3] = [0.4, 1.0, 0.6];
const AMBIENT: f32 = 0.35;

const STAR_OUTER_RADIUS: f32 = 0.8;
const STAR_INNER_RADIUS: f32 = 0.4;
const STAR_DEPTH: f32 = 0.2;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct SceneUniforms {
    view_proj: [[f32; 4]; 4],
    scene: [[f32; 4]; 4],
    light: [f32; 4],
}

struct MeshGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl MeshGeometry {
    fn new(device: &wgpu::Device, label: &str, (vertices, indices): (Vec<Vertex>, Vec<u16>)) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", label)),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", label)),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }
}

/// GPU side of one ornament group.
struct OrnamentBuffer {
    shape: OrnamentShape,
    buffer: wgpu::Buffer,
    count: u32,
}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: wgpu::Extent3d,
    clear_color: wgpu::Color,
    depth_view: wgpu::TextureView,

    // Foliage
    foliage_pipeline: wgpu::RenderPipeline,
    foliage_uniform_buffer: wgpu::Buffer,
    foliage_bind_group: wgpu::BindGroup,
    foliage_instance_buffer: wgpu::Buffer,
    foliage_count: u32,
    quad_vertex_buffer: wgpu::Buffer,
    quad_index_buffer: wgpu::Buffer,

    // Ornaments and star
    ornament_pipeline: wgpu::RenderPipeline,
    scene_uniform_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    cube_geometry: MeshGeometry,
    sphere_geometry: MeshGeometry,
    star_geometry: MeshGeometry,
    ornament_buffers: Vec<OrnamentBuffer>,
    star_instance_buffer: wgpu::Buffer,
}

fn create_depth_view(device: &wgpu::Device, size: wgpu::Extent3d) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn uniform_bind_group(
    device: &wgpu::Device,
    label: &str,
    buffer: &wgpu::Buffer,
    visibility: wgpu::ShaderStages,
) -> (wgpu::BindGroupLayout, wgpu::BindGroup) {
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some(&format!("{}_bind_group_layout", label)),
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some(&format!("{}_bind_group", label)),
    });
    (layout, bind_group)
}

fn instance_buffer(device: &wgpu::Device, label: &str, stride: usize, count: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (stride * count.max(1)) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl Renderer {
    /// Build all GPU resources for `state`. Group sizes are fixed from here on.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        state: &VisualiserState,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let depth_view = create_depth_view(&device, size);

        let [r, g, b] = palette::parse_hex_color(palette::BACKGROUND).unwrap_or_default();
        let clear_color = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        };

        // === Foliage Pipeline Setup ===

        let foliage_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Foliage Uniform Buffer"),
            size: std::mem::size_of::<crate::foliage::FoliageUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let (foliage_bind_group_layout, foliage_bind_group) = uniform_bind_group(
            &device,
            "foliage",
            &foliage_uniform_buffer,
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let foliage_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Foliage Pipeline Layout"),
            bind_group_layouts: &[&foliage_bind_group_layout],
            push_constant_ranges: &[],
        });
        let foliage_pipeline = pipeline::create_foliage_pipeline(&device, &foliage_pipeline_layout, format);

        // The layout never changes, so the instance data goes up once.
        let foliage_instances = state.foliage().instance_data();
        let foliage_instance_buffer = instance_buffer(
            &device,
            "Foliage Instance Buffer",
            std::mem::size_of::<GpuFoliageInstance>(),
            foliage_instances.len(),
        );
        if !foliage_instances.is_empty() {
            queue.write_buffer(&foliage_instance_buffer, 0, bytemuck::cast_slice(&foliage_instances));
        }

        // Positions: (-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)
        let quad_vertices: [f32; 8] = [
            -0.5, -0.5, // bottom-left
            0.5, -0.5, // bottom-right
            0.5, 0.5, // top-right
            -0.5, 0.5, // top-left
        ];
        let quad_indices: [u16; 6] = [0, 1, 2, 0, 2, 3];
        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Billboard Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&quad_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Billboard Quad Index Buffer"),
            contents: bytemuck::cast_slice(&quad_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        // === Ornament Pipeline Setup ===

        let scene_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniform Buffer"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let (scene_bind_group_layout, scene_bind_group) = uniform_bind_group(
            &device,
            "scene",
            &scene_uniform_buffer,
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let ornament_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Ornament Pipeline Layout"),
            bind_group_layouts: &[&scene_bind_group_layout],
            push_constant_ranges: &[],
        });
        let ornament_pipeline = pipeline::create_ornament_pipeline(&device, &ornament_pipeline_layout, format);

        let cube_geometry = MeshGeometry::new(&device, "Cube", mesh::create_cube_geometry());
        let sphere_geometry = MeshGeometry::new(&device, "Sphere", mesh::create_sphere_geometry());
        let star_geometry = MeshGeometry::new(
            &device,
            "Star",
            mesh::create_star_geometry(STAR_OUTER_RADIUS, STAR_INNER_RADIUS, STAR_DEPTH),
        );

        let ornament_buffers = state
            .ornaments()
            .iter()
            .map(|group| OrnamentBuffer {
                shape: group.shape(),
                buffer: instance_buffer(
                    &device,
                    &format!("Ornament Instance Buffer ({})", group.label()),
                    std::mem::size_of::<GpuOrnamentInstance>(),
                    group.len(),
                ),
                count: group.len() as u32,
            })
            .collect();
        let star_instance_buffer = instance_buffer(
            &device,
            "Star Instance Buffer",
            std::mem::size_of::<GpuOrnamentInstance>(),
            1,
        );

        log::info!(
            "Renderer created: {}x{}, {} foliage particles, {} ornament groups",
            size.width,
            size.height,
            foliage_instances.len(),
            state.ornaments().len()
        );

        Self {
            device,
            queue,
            size,
            clear_color,
            depth_view,
            foliage_pipeline,
            foliage_uniform_buffer,
            foliage_bind_group,
            foliage_instance_buffer,
            foliage_count: foliage_instances.len() as u32,
            quad_vertex_buffer,
            quad_index_buffer,
            ornament_pipeline,
            scene_uniform_buffer,
            scene_bind_group,
            cube_geometry,
            sphere_geometry,
            star_geometry,
            ornament_buffers,
            star_instance_buffer,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            };
            self.depth_view = create_depth_view(&self.device, self.size);
        }
    }

    fn geometry(&self, shape: OrnamentShape) -> &MeshGeometry {
        match shape {
            OrnamentShape::Box => &self.cube_geometry,
            OrnamentShape::Sphere => &self.sphere_geometry,
        }
    }

    /// Upload whatever changed this frame and draw the scene into `view`.
    pub fn render(&mut self, view: &wgpu::TextureView, state: &mut VisualiserState) {
        let aspect = self.size.width as f32 / self.size.height as f32;
        let view_matrix = state.camera().view_matrix();
        let projection = state.camera().projection_matrix(aspect);
        let scene_matrix = state.scene_matrix();

        let scene_uniforms = SceneUniforms {
            view_proj: (projection * view_matrix).to_cols_array_2d(),
            scene: scene_matrix.to_cols_array_2d(),
            light: Vec3::from(LIGHT_DIRECTION).normalize().extend(AMBIENT).to_array(),
        };
        self.queue
            .write_buffer(&self.scene_uniform_buffer, 0, bytemuck::bytes_of(&scene_uniforms));

        let foliage_uniforms = state.foliage().uniforms(
            view_matrix,
            projection,
            scene_matrix,
            [self.size.width as f32, self.size.height as f32],
        );
        self.queue
            .write_buffer(&self.foliage_uniform_buffer, 0, bytemuck::bytes_of(&foliage_uniforms));

        for (group, gpu) in state.ornaments_mut().iter_mut().zip(self.ornament_buffers.iter()) {
            if let Some(instances) = group.take_upload() {
                if !instances.is_empty() {
                    self.queue.write_buffer(&gpu.buffer, 0, bytemuck::cast_slice(instances));
                }
            }
        }

        let star = state.star().filter(|s| s.is_visible()).map(|s| s.instance());
        if let Some(instance) = star.as_ref() {
            self.queue
                .write_buffer(&self.star_instance_buffer, 0, bytemuck::bytes_of(instance));
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Opaque meshes first so the additive foliage is depth tested against them
            render_pass.set_pipeline(&self.ornament_pipeline);
            render_pass.set_bind_group(0, &self.scene_bind_group, &[]);

            for gpu in &self.ornament_buffers {
                if gpu.count == 0 {
                    continue;
                }
                let geometry = self.geometry(gpu.shape);
                render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, gpu.buffer.slice(..));
                render_pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..geometry.index_count, 0, 0..gpu.count);
            }

            if star.is_some() {
                render_pass.set_vertex_buffer(0, self.star_geometry.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, self.star_instance_buffer.slice(..));
                render_pass.set_index_buffer(self.star_geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..self.star_geometry.index_count, 0, 0..1);
            }

            if self.foliage_count > 0 {
                render_pass.set_pipeline(&self.foliage_pipeline);
                render_pass.set_bind_group(0, &self.foliage_bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, self.foliage_instance_buffer.slice(..));
                render_pass.set_index_buffer(self.quad_index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..6, 0, 0..self.foliage_count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
