//! wgpu implementation of [`GpuBackend`].
//!
//! - `context` owns instance, device, and swapchain wiring and rebuilds the
//!   swapchain when the window resizes.
//! - `shaders` assembles the WGSL module for each fragment program.
//! - `pipeline` turns a program into a render pipeline and its bind group
//!   layout.
//! - `surface` allocates plane textures and writes texels into them.
//!
//! wgpu has no way to wrap host memory as a texture, so `alias_plane`
//! always declines and every plane takes the copy path.

mod context;
mod pipeline;
mod shaders;
mod surface;

use anyhow::{bail, Result};
use wgpu::util::DeviceExt;

use crate::backend::{DrawCall, GpuBackend};
use crate::format::{FragmentProgram, TexelFormat};
use crate::plane::PlaneView;
use crate::upload::{system_page_size, AliasRegion};

pub(crate) use context::GpuContext;
pub use pipeline::ProgramPipeline;
pub use surface::PlaneTexture;

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    sampler: wgpu::Sampler,
}

impl WgpuBackend {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("plane sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self {
            device,
            queue,
            surface_format,
            sampler,
        }
    }

    /// Fills `target` with black; used when a frame is skipped so the
    /// swapchain image never shows stale contents.
    pub fn clear(&self, target: &wgpu::TextureView) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear encoder"),
            });
        {
            let _pass = begin_pass(&mut encoder, target, "clear pass");
        }
        self.queue.submit(Some(encoder.finish()));
    }
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    target: &wgpu::TextureView,
    label: &'static str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    })
}

impl GpuBackend for WgpuBackend {
    type Surface = PlaneTexture;
    type Pipeline = ProgramPipeline;
    type Target = wgpu::TextureView;

    fn page_size(&self) -> usize {
        system_page_size()
    }

    unsafe fn alias_plane(
        &self,
        region: &AliasRegion,
        _plane: &PlaneView<'_>,
        texel: TexelFormat,
    ) -> Result<Option<Self::Surface>> {
        tracing::trace!(
            page_start = region.page_start,
            length = region.length,
            ?texel,
            "host memory aliasing unavailable; copying"
        );
        Ok(None)
    }

    fn copy_plane(&self, plane: &PlaneView<'_>, texel: TexelFormat) -> Result<Self::Surface> {
        PlaneTexture::upload(&self.device, &self.queue, plane, texel)
    }

    fn replace_texels(&self, plane: &PlaneView<'_>, texel: TexelFormat) -> Result<Self::Surface> {
        PlaneTexture::upload(&self.device, &self.queue, plane, texel)
    }

    fn refresh(
        &self,
        surface: &Self::Surface,
        plane: &PlaneView<'_>,
        _texel: TexelFormat,
    ) -> Result<()> {
        surface.write(&self.queue, plane)
    }

    fn build_pipeline(&self, program: FragmentProgram) -> Result<Self::Pipeline> {
        ProgramPipeline::new(&self.device, self.surface_format, program)
    }

    fn draw(&self, target: &wgpu::TextureView, call: &DrawCall<'_, Self>) -> Result<()> {
        let expected = call.pipeline.program.texture_count();
        if call.surfaces.len() != expected {
            bail!(
                "{:?} draws {} planes, got {}",
                call.pipeline.program,
                expected,
                call.surfaces.len()
            );
        }

        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("fragment uniforms"),
                contents: bytemuck::bytes_of(call.uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quad vertices"),
                contents: bytemuck::cast_slice(&call.quad.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for (index, surface) in call.surfaces.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + index as u32,
                resource: wgpu::BindingResource::TextureView(&surface.view),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("plane bind group"),
            layout: &call.pipeline.layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        {
            let mut pass = begin_pass(&mut encoder, target, "frame pass");
            pass.set_pipeline(&call.pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.draw(0..4, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
