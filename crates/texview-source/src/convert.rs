//! RGBA8 to every supported pixel format, BT.601 for the YCbCr family.
//!
//! Used to feed still images and the synthetic camera. Chroma for 4:2:0 is
//! the average of each 2x2 block and for 4:2:2 the average of each pixel
//! pair; blocks that run off the right or bottom edge reuse the edge pixel.

use anyhow::{bail, Result};
use texview::{ColorRange, PixelFormat, PlaneView};

use crate::buffer::PlaneBuffer;

/// One frame in a specific pixel format, one buffer per plane.
pub struct FrameImage {
    format: PixelFormat,
    width: u32,
    height: u32,
    planes: Vec<PlaneBuffer>,
}

impl FrameImage {
    /// Zeroed planes laid out for `format` at the given size.
    pub fn allocate(format: PixelFormat, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("frame size must be non-zero, got {width}x{height}");
        }
        let descriptor = format.descriptor();
        let planes = descriptor
            .planes
            .iter()
            .map(|layout| {
                let (plane_width, plane_height) = layout.plane_size(width, height);
                PlaneBuffer::new(layout.texel, plane_width, plane_height)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            format,
            width,
            height,
            planes,
        })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[cfg(test)]
    pub(crate) fn planes(&self) -> &[PlaneBuffer] {
        &self.planes
    }

    pub fn views(&self) -> Vec<PlaneView<'_>> {
        self.planes.iter().map(PlaneBuffer::view).collect()
    }

    /// True when every plane can be aliased by a zero-copy bind.
    pub fn is_aligned(&self) -> bool {
        self.planes.iter().all(PlaneBuffer::is_aligned)
    }

    /// Overwrites the frame from tightly packed RGBA8 pixels.
    pub fn convert_into(&mut self, rgba: &[u8]) -> Result<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if rgba.len() != expected {
            bail!(
                "expected {expected} bytes of RGBA for {}x{}, got {}",
                self.width,
                self.height,
                rgba.len()
            );
        }

        let source = Rgba {
            bytes: rgba,
            width: self.width,
            height: self.height,
        };
        let range = self.format.descriptor().color_range;
        match self.format {
            PixelFormat::Rgb24 => pack(&mut self.planes[0], &source, |[r, g, b, _]| [r, g, b]),
            PixelFormat::Bgr24 => pack(&mut self.planes[0], &source, |[r, g, b, _]| [b, g, r]),
            PixelFormat::Argb32 => pack(&mut self.planes[0], &source, |[r, g, b, a]| [a, r, g, b]),
            PixelFormat::Bgra32 => pack(&mut self.planes[0], &source, |[r, g, b, a]| [b, g, r, a]),
            PixelFormat::Abgr32 => pack(&mut self.planes[0], &source, |[r, g, b, a]| [a, b, g, r]),
            PixelFormat::Rgba32 => pack(&mut self.planes[0], &source, |pixel| pixel),
            PixelFormat::Rgb555 => pack(&mut self.planes[0], &source, |[r, g, b, _]| {
                let value = (u16::from(r >> 3) << 10) | (u16::from(g >> 3) << 5) | u16::from(b >> 3);
                value.to_le_bytes()
            }),
            PixelFormat::Rgb5551 => pack(&mut self.planes[0], &source, |[r, g, b, a]| {
                let value = (u16::from(r >> 3) << 11)
                    | (u16::from(g >> 3) << 6)
                    | (u16::from(b >> 3) << 1)
                    | u16::from(a >= 128);
                value.to_le_bytes()
            }),
            PixelFormat::Rgb565 => pack(&mut self.planes[0], &source, |[r, g, b, _]| {
                let value = (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3);
                value.to_le_bytes()
            }),
            PixelFormat::YCbCrA4444 => pack(&mut self.planes[0], &source, |[r, g, b, a]| {
                let [y, cb, cr] = to_ycbcr(r, g, b, range);
                [cb, y, cr, a]
            }),
            PixelFormat::AYCbCr4444 => pack(&mut self.planes[0], &source, |[r, g, b, a]| {
                let [y, cb, cr] = to_ycbcr(r, g, b, range);
                [a, y, cb, cr]
            }),
            PixelFormat::YCbCr444 => pack(&mut self.planes[0], &source, |[r, g, b, _]| {
                let [y, cb, cr] = to_ycbcr(r, g, b, range);
                [cr, y, cb]
            }),
            PixelFormat::YCbCr422 => pack_422(&mut self.planes[0], &source, range),
            PixelFormat::BiPlanar420Video | PixelFormat::BiPlanar420Full => {
                write_luma(&mut self.planes[0], &source, range);
                write_chroma_420(&mut self.planes[1], &source, range, |row, x, [cb, cr]| {
                    row[x * 2] = cb;
                    row[x * 2 + 1] = cr;
                });
            }
            PixelFormat::Planar420Video | PixelFormat::Planar420Full => {
                write_luma(&mut self.planes[0], &source, range);
                write_chroma_420(&mut self.planes[1], &source, range, |row, x, [cb, _]| {
                    row[x] = cb;
                });
                write_chroma_420(&mut self.planes[2], &source, range, |row, x, [_, cr]| {
                    row[x] = cr;
                });
            }
        }
        Ok(())
    }
}

/// Converts tightly packed RGBA8 pixels into a new frame.
pub fn convert(format: PixelFormat, width: u32, height: u32, rgba: &[u8]) -> Result<FrameImage> {
    let mut frame = FrameImage::allocate(format, width, height)?;
    frame.convert_into(rgba)?;
    Ok(frame)
}

struct Rgba<'a> {
    bytes: &'a [u8],
    width: u32,
    height: u32,
}

impl Rgba<'_> {
    /// Pixel at (x, y), clamped to the image.
    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let at = (y * self.width as usize + x) * 4;
        [
            self.bytes[at],
            self.bytes[at + 1],
            self.bytes[at + 2],
            self.bytes[at + 3],
        ]
    }
}

/// Writes one packed pixel per source pixel.
fn pack<const N: usize>(
    plane: &mut PlaneBuffer,
    source: &Rgba<'_>,
    encode: impl Fn([u8; 4]) -> [u8; N],
) {
    for y in 0..source.height {
        let row = plane.row_mut(y);
        for (x, out) in row.chunks_exact_mut(N).enumerate() {
            out.copy_from_slice(&encode(source.pixel(x as u32, y)));
        }
    }
}

fn pack_422(plane: &mut PlaneBuffer, source: &Rgba<'_>, range: ColorRange) {
    for y in 0..source.height {
        let row = plane.row_mut(y);
        for (pair, out) in row.chunks_exact_mut(4).enumerate() {
            let x = pair as u32 * 2;
            let [r0, g0, b0, _] = source.pixel(x, y);
            let [r1, g1, b1, _] = source.pixel(x + 1, y);
            let [y0, cb0, cr0] = to_ycbcr(r0, g0, b0, range);
            let [y1, cb1, cr1] = to_ycbcr(r1, g1, b1, range);
            out.copy_from_slice(&[average(&[cb0, cb1]), y0, average(&[cr0, cr1]), y1]);
        }
    }
}

fn write_luma(plane: &mut PlaneBuffer, source: &Rgba<'_>, range: ColorRange) {
    for y in 0..source.height {
        let row = plane.row_mut(y);
        for (x, out) in row.iter_mut().enumerate() {
            let [r, g, b, _] = source.pixel(x as u32, y);
            *out = to_ycbcr(r, g, b, range)[0];
        }
    }
}

fn write_chroma_420(
    plane: &mut PlaneBuffer,
    source: &Rgba<'_>,
    range: ColorRange,
    store: impl Fn(&mut [u8], usize, [u8; 2]),
) {
    for cy in 0..plane.height() {
        for cx in 0..plane.width() {
            let mut cb = [0u8; 4];
            let mut cr = [0u8; 4];
            for (index, (dx, dy)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
                let [r, g, b, _] = source.pixel(cx * 2 + dx, cy * 2 + dy);
                let [_, pixel_cb, pixel_cr] = to_ycbcr(r, g, b, range);
                cb[index] = pixel_cb;
                cr[index] = pixel_cr;
            }
            store(plane.row_mut(cy), cx as usize, [average(&cb), average(&cr)]);
        }
    }
}

fn average(values: &[u8]) -> u8 {
    let sum: u32 = values.iter().map(|value| u32::from(*value)).sum();
    let count = values.len() as u32;
    ((sum + count / 2) / count) as u8
}

/// BT.601 forward transform. Video range squeezes luma into 16-235 and
/// chroma into 16-240.
pub fn to_ycbcr(r: u8, g: u8, b: u8, range: ColorRange) -> [u8; 3] {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let luma = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = -0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 0.5 * r - 0.418_688 * g - 0.081_312 * b;

    let (luma, cb, cr) = match range {
        ColorRange::Video => (
            16.0 + luma * 219.0 / 255.0,
            128.0 + cb * 224.0 / 255.0,
            128.0 + cr * 224.0 / 255.0,
        ),
        ColorRange::Full | ColorRange::None => (luma, 128.0 + cb, 128.0 + cr),
    };
    [to_byte(luma), to_byte(cb), to_byte(cr)]
}

fn to_byte(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
