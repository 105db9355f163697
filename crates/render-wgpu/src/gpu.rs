use std::mem::size_of;

use lumen_render::{FrameBackend, PassError, PassKind};
use lumen_sync::{
    DeviceArrays, GpuFrame, GpuLight, GpuObject, GpuSceneParams, MAX_LIGHTS, MAX_OBJECTS,
    ProgramId,
};
use wgpu::util::DeviceExt;

use crate::error::StartupError;
use crate::program::{Program, ProgramSource};
use crate::skybox::SkyImage;
use crate::targets::{self, ACCUM_FORMAT, OffscreenTargets};

/// Full-screen quad in clip space.
const QUAD_VERTICES: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// wgpu backend for the progressive tracer.
///
/// Owns the uniform buffers behind the device arrays, the compiled program,
/// and the offscreen targets. Per frame, [`WgpuRenderer::frame`] lends it to
/// the frame driver together with the device, queue, and surface view.
pub struct WgpuRenderer {
    surface_format: wgpu::TextureFormat,
    frame_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    objects_buffer: wgpu::Buffer,
    lights_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    program: Program,
    program_source: ProgramSource,
    targets: OffscreenTargets,
    skybox: wgpu::TextureView,
    sky_sampler: wgpu::Sampler,
    placeholder: wgpu::TextureView,
    direct_bind_group: wgpu::BindGroup,
    /// Indexed by the current history texture.
    composite_bind_groups: [wgpu::BindGroup; 2],
    quad_vertex_buffer: wgpu::Buffer,
    quad_index_buffer: wgpu::Buffer,
}

impl WgpuRenderer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        program_source: ProgramSource,
        sky: &SkyImage,
    ) -> Result<Self, StartupError> {
        targets::check_completeness(adapter)?;

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame_buffer"),
            contents: bytemuck::bytes_of(&GpuFrame::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let params_buffer = uniform_array(device, "params_buffer", size_of::<GpuSceneParams>());
        let objects_buffer =
            uniform_array(device, "objects_buffer", MAX_OBJECTS * size_of::<GpuObject>());
        let lights_buffer =
            uniform_array(device, "lights_buffer", MAX_LIGHTS * size_of::<GpuLight>());

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                uniform_entry(2),
                uniform_entry(3),
            ],
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: objects_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: lights_buffer.as_entire_binding(),
                },
            ],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_bind_group_layout"),
            entries: &[
                texture_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                texture_entry(2),
                texture_entry(3),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let program = Program::compile(device, &pipeline_layout, surface_format, &program_source)?;

        let sky_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sky_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let skybox = sky.upload(device, queue);
        let placeholder = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("placeholder"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: ACCUM_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&Default::default());
        let targets = OffscreenTargets::new(device, width, height);

        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_vertex_buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_index_buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let (direct_bind_group, composite_bind_groups) = texture_bind_groups(
            device,
            &texture_layout,
            &skybox,
            &sky_sampler,
            &placeholder,
            &targets,
        );

        Ok(Self {
            surface_format,
            frame_buffer,
            params_buffer,
            objects_buffer,
            lights_buffer,
            uniform_bind_group,
            texture_layout,
            pipeline_layout,
            program,
            program_source,
            targets,
            skybox,
            sky_sampler,
            placeholder,
            direct_bind_group,
            composite_bind_groups,
            quad_vertex_buffer,
            quad_index_buffer,
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    pub fn program_id(&self) -> ProgramId {
        self.program.id
    }

    pub fn program_label(&self) -> &str {
        &self.program.label
    }

    /// Recompile the program from its source. On failure the running
    /// program stays in place and `None` is returned.
    pub fn reload_program(&mut self, device: &wgpu::Device) -> Option<ProgramId> {
        match Program::compile(
            device,
            &self.pipeline_layout,
            self.surface_format,
            &self.program_source,
        ) {
            Ok(program) => {
                self.program = program;
                Some(self.program.id)
            }
            Err(e) => {
                tracing::error!("shader reload failed, keeping program {}: {e}", self.program.id.0);
                None
            }
        }
    }

    pub fn set_skybox(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, sky: &SkyImage) {
        self.skybox = sky.upload(device, queue);
        self.rebuild_texture_bind_groups(device);
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.targets = OffscreenTargets::new(device, width, height);
        self.rebuild_texture_bind_groups(device);
        tracing::debug!("offscreen targets resized to {width}x{height}");
    }

    /// Lend the renderer to one frame's worth of passes.
    pub fn frame<'a>(
        &'a mut self,
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        surface_view: &'a wgpu::TextureView,
    ) -> FrameContext<'a> {
        FrameContext {
            renderer: self,
            device,
            queue,
            surface_view,
        }
    }

    fn rebuild_texture_bind_groups(&mut self, device: &wgpu::Device) {
        let (direct, composite) = texture_bind_groups(
            device,
            &self.texture_layout,
            &self.skybox,
            &self.sky_sampler,
            &self.placeholder,
            &self.targets,
        );
        self.direct_bind_group = direct;
        self.composite_bind_groups = composite;
    }

    fn draw_quad(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
        pass.set_index_buffer(self.quad_index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
    }
}

/// The renderer plus what it needs to record and submit this frame's passes.
pub struct FrameContext<'a> {
    renderer: &'a mut WgpuRenderer,
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    surface_view: &'a wgpu::TextureView,
}

impl FrameContext<'_> {
    fn submit(
        &self,
        kind: PassKind,
        record: impl FnOnce(&mut wgpu::CommandEncoder),
    ) -> Result<(), PassError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pass_encoder"),
            });
        record(&mut encoder);
        self.queue.submit(std::iter::once(encoder.finish()));
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(PassError {
                pass: kind,
                message: err.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl DeviceArrays for FrameContext<'_> {
    fn object_capacity(&self) -> usize {
        MAX_OBJECTS
    }

    fn light_capacity(&self) -> usize {
        MAX_LIGHTS
    }

    fn write_object(&mut self, slot: usize, value: &GpuObject) {
        let offset = (slot * size_of::<GpuObject>()) as u64;
        self.queue
            .write_buffer(&self.renderer.objects_buffer, offset, bytemuck::bytes_of(value));
    }

    fn write_light(&mut self, slot: usize, value: &GpuLight) {
        let offset = (slot * size_of::<GpuLight>()) as u64;
        self.queue
            .write_buffer(&self.renderer.lights_buffer, offset, bytemuck::bytes_of(value));
    }

    fn write_params(&mut self, value: &GpuSceneParams) {
        self.queue
            .write_buffer(&self.renderer.params_buffer, 0, bytemuck::bytes_of(value));
    }
}

impl FrameBackend for FrameContext<'_> {
    fn write_frame_uniforms(&mut self, frame: &GpuFrame) {
        self.queue
            .write_buffer(&self.renderer.frame_buffer, 0, bytemuck::bytes_of(frame));
    }

    fn direct_pass(&mut self) -> Result<(), PassError> {
        let r = &*self.renderer;
        self.submit(PassKind::Direct, |encoder| {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("direct_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &r.targets.sample,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&r.program.direct);
            pass.set_bind_group(0, &r.uniform_bind_group, &[]);
            pass.set_bind_group(1, &r.direct_bind_group, &[]);
            r.draw_quad(&mut pass);
        })
    }

    fn composite_pass(&mut self) -> Result<(), PassError> {
        let r = &*self.renderer;
        let result = self.submit(PassKind::Composite, |encoder| {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite_pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: self.surface_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: r.targets.next_history(),
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                ],
                ..Default::default()
            });
            pass.set_pipeline(&r.program.composite);
            pass.set_bind_group(0, &r.uniform_bind_group, &[]);
            pass.set_bind_group(1, &r.composite_bind_groups[r.targets.current()], &[]);
            r.draw_quad(&mut pass);
        });
        if result.is_ok() {
            self.renderer.targets.swap();
        }
        result
    }
}

fn uniform_array(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Bind groups for the direct pass and for each composite direction.
///
/// The direct pass renders into the sample texture, so it binds the
/// placeholder in both accumulation slots.
fn texture_bind_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    skybox: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    placeholder: &wgpu::TextureView,
    targets: &OffscreenTargets,
) -> (wgpu::BindGroup, [wgpu::BindGroup; 2]) {
    let make = |label: &str, sample: &wgpu::TextureView, history: &wgpu::TextureView| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(skybox),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(sample),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(history),
                },
            ],
        })
    };
    let direct = make("direct_textures", placeholder, placeholder);
    let composite = [
        make("composite_textures_a", &targets.sample, targets.history(0)),
        make("composite_textures_b", &targets.sample, targets.history(1)),
    ];
    (direct, composite)
}
