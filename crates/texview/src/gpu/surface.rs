use anyhow::{anyhow, bail, Result};
use wgpu::util::DeviceExt;

use crate::format::TexelFormat;
use crate::plane::PlaneView;

/// GPU-private texture holding one plane.
pub struct PlaneTexture {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    texel: TexelFormat,
    width: u32,
    height: u32,
}

impl PlaneTexture {
    /// Allocates a texture sized for `plane` and fills it.
    ///
    /// Rows laid out on the copy alignment go through a staging buffer and a
    /// buffer-to-texture copy; anything else is written through the queue.
    pub(crate) fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        plane: &PlaneView<'_>,
        texel: TexelFormat,
    ) -> Result<Self> {
        if plane.width() == 0 || plane.height() == 0 {
            bail!("cannot allocate an empty {:?} plane", texel);
        }

        let size = extent(plane, texel);
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("plane texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(texel),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = out_of_memory.or(validation) {
            return Err(anyhow!(
                "failed to allocate {}x{} {:?} texture: {err}",
                size.width,
                size.height,
                texel
            ));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let surface = Self {
            texture,
            view,
            texel,
            width: plane.width(),
            height: plane.height(),
        };

        if texel.buffer_backable() && plane.stride() % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize == 0
        {
            surface.copy_from_buffer(device, queue, plane)?;
        } else {
            surface.write(queue, plane)?;
        }
        Ok(surface)
    }

    /// Overwrites the texels in place. The plane must have the geometry the
    /// texture was created with.
    pub(crate) fn write(&self, queue: &wgpu::Queue, plane: &PlaneView<'_>) -> Result<()> {
        self.check_geometry(plane)?;
        queue.write_texture(
            self.texture.as_image_copy(),
            used_bytes(plane, self.texel),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(plane.stride() as u32),
                rows_per_image: Some(plane.height()),
            },
            extent(plane, self.texel),
        );
        Ok(())
    }

    fn copy_from_buffer(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        plane: &PlaneView<'_>,
    ) -> Result<()> {
        self.check_geometry(plane)?;
        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("plane staging buffer"),
            contents: used_bytes(plane, self.texel),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("plane upload encoder"),
        });
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(plane.stride() as u32),
                    rows_per_image: Some(plane.height()),
                },
            },
            self.texture.as_image_copy(),
            extent(plane, self.texel),
        );
        queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn check_geometry(&self, plane: &PlaneView<'_>) -> Result<()> {
        if plane.width() != self.width || plane.height() != self.height {
            bail!(
                "plane is {}x{} but the texture holds {}x{}",
                plane.width(),
                plane.height(),
                self.width,
                self.height
            );
        }
        Ok(())
    }
}

fn texture_format(texel: TexelFormat) -> wgpu::TextureFormat {
    match texel {
        TexelFormat::R8 | TexelFormat::R8Triplet => wgpu::TextureFormat::R8Unorm,
        TexelFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
        TexelFormat::Rgba8 | TexelFormat::Packed422 => wgpu::TextureFormat::Rgba8Unorm,
        TexelFormat::Packed16(_) => wgpu::TextureFormat::R16Uint,
    }
}

fn extent(plane: &PlaneView<'_>, texel: TexelFormat) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: texel.texture_width(plane.width()),
        height: plane.height(),
        depth_or_array_layers: 1,
    }
}

// Trailing stride padding after the last row is not part of the copy.
fn used_bytes<'a>(plane: &PlaneView<'a>, texel: TexelFormat) -> &'a [u8] {
    let rows = plane.height().saturating_sub(1) as usize;
    let len = plane.stride() * rows + texel.row_bytes(plane.width()) as usize;
    &plane.bytes()[..len.min(plane.bytes().len())]
}
