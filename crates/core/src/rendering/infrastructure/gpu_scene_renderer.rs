use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::rendering::domain::camera::PerspectiveCamera;
use crate::rendering::domain::geometry::tessellate;
use crate::rendering::domain::scene::{Geometry, Scene};
use crate::rendering::domain::scene_renderer::SceneRenderer;
use crate::shared::frame::Frame;

use super::gpu_context::GpuContext;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-draw uniform block matching `flat_color.wgsl` (80 bytes).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniforms {
    mvp: [[f32; 4]; 4],
    color: [f32; 4],
}

struct GpuMesh {
    geometry: Geometry,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
}

/// Offscreen wgpu renderer: draws into an RGBA texture with a depth
/// buffer, then copies the texture back into an RGB [`Frame`].
pub struct GpuSceneRenderer {
    ctx: Arc<GpuContext>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    readback: wgpu::Buffer,
    padded_bytes_per_row: u32,
    meshes: Vec<GpuMesh>,
    width: u32,
    height: u32,
    frame_index: usize,
}

impl GpuSceneRenderer {
    pub fn new(ctx: Arc<GpuContext>, width: u32, height: u32) -> Self {
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("flat-color-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/flat_color.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw-bind-group-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let attributes = wgpu::vertex_attr_array![0 => Float32x3];
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene-color"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene-depth"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color_texture.create_view(&Default::default());
        let depth_view = depth_texture.create_view(&Default::default());

        // Texture-to-buffer copies need 256-byte aligned rows
        let padded_bytes_per_row = (width * 4).div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene-readback"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            ctx,
            pipeline,
            bind_group_layout,
            color_texture,
            color_view,
            depth_view,
            readback,
            padded_bytes_per_row,
            meshes: Vec::new(),
            width,
            height,
            frame_index: 0,
        }
    }

    /// Keep one vertex/index buffer pair per scene slot, rebuilt when the
    /// geometry in that slot changes.
    fn sync_meshes(&mut self, scene: &Scene) {
        self.meshes.truncate(scene.objects().len());
        for (slot, object) in scene.objects().iter().enumerate() {
            if self
                .meshes
                .get(slot)
                .is_some_and(|m| m.geometry == object.geometry)
            {
                continue;
            }
            let mesh = tessellate(&object.geometry);
            let gpu_mesh = GpuMesh {
                geometry: object.geometry,
                vertex_buffer: self.ctx.device.create_buffer_init(
                    &wgpu::util::BufferInitDescriptor {
                        label: Some("mesh-vertices"),
                        contents: bytemuck::cast_slice(&mesh.positions),
                        usage: wgpu::BufferUsages::VERTEX,
                    },
                ),
                index_buffer: self.ctx.device.create_buffer_init(
                    &wgpu::util::BufferInitDescriptor {
                        label: Some("mesh-indices"),
                        contents: bytemuck::cast_slice(&mesh.indices),
                        usage: wgpu::BufferUsages::INDEX,
                    },
                ),
                num_indices: mesh.indices.len() as u32,
            };
            if slot < self.meshes.len() {
                self.meshes[slot] = gpu_mesh;
            } else {
                self.meshes.push(gpu_mesh);
            }
        }
    }

    fn read_back(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let slice = self.readback.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.ctx.device.poll(wgpu::Maintain::Wait);
        rx.recv()??;

        let row_bytes = self.width as usize * 4;
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(self.padded_bytes_per_row as usize) {
                for px in row[..row_bytes].chunks_exact(4) {
                    rgb.extend_from_slice(&px[..3]);
                }
            }
        }
        self.readback.unmap();
        Ok(rgb)
    }
}

impl SceneRenderer for GpuSceneRenderer {
    fn render(
        &mut self,
        scene: &Scene,
        camera: &PerspectiveCamera,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        self.sync_meshes(scene);

        let view_projection = camera.view_projection();
        let bind_groups: Vec<wgpu::BindGroup> = scene
            .objects()
            .iter()
            .map(|object| {
                let [r, g, b] = object.color;
                let uniforms = DrawUniforms {
                    mvp: (view_projection * object.model_matrix()).to_cols_array_2d(),
                    color: [
                        r as f32 / 255.0,
                        g as f32 / 255.0,
                        b as f32 / 255.0,
                        1.0,
                    ],
                };
                let buffer =
                    self.ctx
                        .device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some("draw-uniforms"),
                            contents: bytemuck::bytes_of(&uniforms),
                            usage: wgpu::BufferUsages::UNIFORM,
                        });
                self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("draw-bind-group"),
                    layout: &self.bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })
            .collect();

        let [br, bg, bb] = scene.background();
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: br as f64 / 255.0,
                            g: bg as f64 / 255.0,
                            b: bb as f64 / 255.0,
                            a: 1.0,
                        }),
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
                ..Default::default()
            });

            pass.set_pipeline(&self.pipeline);
            for (mesh, bind_group) in self.meshes.iter().zip(&bind_groups) {
                pass.set_bind_group(0, bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.num_indices, 0, 0..1);
            }
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(Some(encoder.finish()));

        let pixels = self.read_back()?;
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(frame)
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::domain::scene::create_scene;

    fn try_gpu_context() -> Option<Arc<GpuContext>> {
        GpuContext::new().map(Arc::new)
    }

    #[test]
    fn test_demo_scene_tank_at_center() {
        let ctx = match try_gpu_context() {
            Some(c) => c,
            None => return,
        };
        let mut renderer = GpuSceneRenderer::new(ctx, 320, 240);
        let frame = renderer
            .render(&create_scene(), &PerspectiveCamera::for_viewport(320, 240))
            .unwrap();

        assert_eq!((frame.width(), frame.height()), (320, 240));
        assert_eq!(frame.pixel(160, 120), Some([0, 255, 0]));
        assert_eq!(frame.pixel(5, 5), Some([0, 0, 0]));
    }

    #[test]
    fn test_unaligned_width_reads_back_cleanly() {
        let ctx = match try_gpu_context() {
            Some(c) => c,
            None => return,
        };
        // 100 * 4 bytes is not a multiple of 256
        let mut scene = Scene::new();
        scene.set_background([0, 0, 255]);
        let mut renderer = GpuSceneRenderer::new(ctx, 100, 10);
        let frame = renderer
            .render(&scene, &PerspectiveCamera::for_viewport(100, 10))
            .unwrap();
        assert_eq!(frame.data().len(), 100 * 10 * 3);
        assert!(frame.data().chunks_exact(3).all(|p| p == [0, 0, 255]));
    }

    #[test]
    fn test_frame_indices_increase() {
        let ctx = match try_gpu_context() {
            Some(c) => c,
            None => return,
        };
        let scene = create_scene();
        let camera = PerspectiveCamera::for_viewport(64, 48);
        let mut renderer = GpuSceneRenderer::new(ctx, 64, 48);
        assert_eq!(renderer.render(&scene, &camera).unwrap().index(), 0);
        assert_eq!(renderer.render(&scene, &camera).unwrap().index(), 1);
    }
}
