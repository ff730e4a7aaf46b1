use bytemuck::{Pod, Zeroable};

use crate::format::{ColorRange, FormatDescriptor, TexelFormat};

/// BT.601 full range. Each column produces one output channel from
/// `(Y, Cb, Cr, A)` after the range offsets are subtracted.
pub const FULL_RANGE_MATRIX: [[f32; 4]; 4] = [
    [1.0, 0.0, 1.402, 0.0],
    [1.0, -0.34414, -0.71414, 0.0],
    [1.0, 1.772, 0.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// BT.601 video range, luma scaled out of the 16-235 band.
pub const VIDEO_RANGE_MATRIX: [[f32; 4]; 4] = [
    [1.1643, 0.0, 1.5958, 0.0],
    [1.1643, -0.39173, -0.81290, 0.0],
    [1.1643, 2.017, 0.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub const IDENTITY_MATRIX: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub const FULL_RANGE_OFFSETS: [f32; 4] = [0.0, 0.5, 0.5, 0.0];
pub const VIDEO_RANGE_OFFSETS: [f32; 4] = [0.0625, 0.5, 0.5, 0.0];

pub fn color_transform(range: ColorRange) -> ([[f32; 4]; 4], [f32; 4]) {
    match range {
        ColorRange::None => (IDENTITY_MATRIX, [0.0; 4]),
        ColorRange::Video => (VIDEO_RANGE_MATRIX, VIDEO_RANGE_OFFSETS),
        ColorRange::Full => (FULL_RANGE_MATRIX, FULL_RANGE_OFFSETS),
    }
}

/// Uniform block shared by every fragment program.
///
/// `texel_info` carries the 16-bit layout selector followed by the source
/// image width and height, which the programs that address texels directly
/// need to map UVs back to pixels.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FragmentUniforms {
    pub permute: [u32; 4],
    pub color_matrix: [[f32; 4]; 4],
    pub offsets: [f32; 4],
    pub texel_info: [u32; 4],
}

unsafe impl Zeroable for FragmentUniforms {}
unsafe impl Pod for FragmentUniforms {}

impl FragmentUniforms {
    pub fn for_descriptor(descriptor: &FormatDescriptor, image_size: (u32, u32)) -> Self {
        let (color_matrix, offsets) = color_transform(descriptor.color_range);
        let layout_id = match descriptor.planes.first().map(|plane| plane.texel) {
            Some(TexelFormat::Packed16(layout)) => layout.id(),
            _ => 0,
        };
        Self {
            permute: descriptor.channel_permutation,
            color_matrix,
            offsets,
            texel_info: [layout_id, image_size.0, image_size.1, 0],
        }
    }
}

impl Default for FragmentUniforms {
    fn default() -> Self {
        Self {
            permute: [0, 1, 2, 3],
            color_matrix: IDENTITY_MATRIX,
            offsets: [0.0; 4],
            texel_info: [0; 4],
        }
    }
}
