//! WGSL sources for each fragment program.
//!
//! Every program shares the uniform block, the vertex stage, and the YCbCr
//! helpers in [`COMMON`]; only the plane bindings and `fs_main` differ.
//! Bindings in group 0: 0 = uniforms, 1 = sampler, 2.. = one texture per
//! plane.

use crate::format::FragmentProgram;

pub(crate) const VERTEX_ENTRY: &str = "vs_main";
pub(crate) const FRAGMENT_ENTRY: &str = "fs_main";

const COMMON: &str = r#"
struct FragmentUniforms {
    permute: vec4<u32>,
    color_matrix: mat4x4<f32>,
    offsets: vec4<f32>,
    texel_info: vec4<u32>,
};

@group(0) @binding(0) var<uniform> uniforms: FragmentUniforms;
@group(0) @binding(1) var plane_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec4<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = position;
    out.uv = uv;
    return out;
}

fn permute(color: vec4<f32>) -> vec4<f32> {
    var source = color;
    let p = uniforms.permute;
    return vec4<f32>(source[p.x], source[p.y], source[p.z], source[p.w]);
}

fn ycbcr_to_rgba(ycbcra: vec4<f32>) -> vec4<f32> {
    let rgba = (ycbcra - uniforms.offsets) * uniforms.color_matrix;
    return clamp(rgba, vec4<f32>(0.0), vec4<f32>(1.0));
}

fn pixel_coord(uv: vec2<f32>) -> vec2<i32> {
    let size = max(uniforms.texel_info.yz, vec2<u32>(1u));
    let limit = vec2<i32>(size) - vec2<i32>(1);
    return clamp(vec2<i32>(uv * vec2<f32>(size)), vec2<i32>(0), limit);
}
"#;

const RGBA32: &str = r#"
@group(0) @binding(2) var plane0: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return permute(textureSample(plane0, plane_sampler, in.uv));
}
"#;

const TRIPLET_LOAD: &str = r#"
@group(0) @binding(2) var plane0: texture_2d<f32>;

fn load_triplet(pixel: vec2<i32>) -> vec4<f32> {
    let x = pixel.x * 3;
    let c0 = textureLoad(plane0, vec2<i32>(x, pixel.y), 0).r;
    let c1 = textureLoad(plane0, vec2<i32>(x + 1, pixel.y), 0).r;
    let c2 = textureLoad(plane0, vec2<i32>(x + 2, pixel.y), 0).r;
    return vec4<f32>(c0, c1, c2, 1.0);
}
"#;

const RGB24: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return permute(load_triplet(pixel_coord(in.uv)));
}
"#;

const YCBCR24: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return ycbcr_to_rgba(permute(load_triplet(pixel_coord(in.uv))));
}
"#;

const RGB16: &str = r#"
@group(0) @binding(2) var plane0: texture_2d<u32>;

fn channel(value: u32, shift: u32, bits: u32) -> f32 {
    let mask = (1u << bits) - 1u;
    return f32((value >> shift) & mask) / f32(mask);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let value = textureLoad(plane0, pixel_coord(in.uv), 0).r;
    var color: vec4<f32>;
    switch uniforms.texel_info.x {
        case 0u: {
            color = vec4<f32>(channel(value, 10u, 5u), channel(value, 5u, 5u), channel(value, 0u, 5u), 1.0);
        }
        case 1u: {
            color = vec4<f32>(channel(value, 11u, 5u), channel(value, 6u, 5u), channel(value, 1u, 5u), f32(value & 1u));
        }
        default: {
            color = vec4<f32>(channel(value, 11u, 5u), channel(value, 5u, 6u), channel(value, 0u, 5u), 1.0);
        }
    }
    return permute(color);
}
"#;

const YCBCRA32: &str = r#"
@group(0) @binding(2) var plane0: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return ycbcr_to_rgba(permute(textureSample(plane0, plane_sampler, in.uv)));
}
"#;

// Each RGBA8 texel holds Cb, Y0, Cr, Y1 for two horizontally adjacent pixels.
const YCBCR422: &str = r#"
@group(0) @binding(2) var plane0: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let pixel = pixel_coord(in.uv);
    let pair = textureLoad(plane0, vec2<i32>(pixel.x / 2, pixel.y), 0);
    let luma = select(pair.g, pair.a, (pixel.x & 1) == 1);
    return ycbcr_to_rgba(permute(vec4<f32>(luma, pair.r, pair.b, 1.0)));
}
"#;

const YCBCR_BIPLANAR: &str = r#"
@group(0) @binding(2) var luma_plane: texture_2d<f32>;
@group(0) @binding(3) var chroma_plane: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let luma = textureSample(luma_plane, plane_sampler, in.uv).r;
    let chroma = textureSample(chroma_plane, plane_sampler, in.uv).rg;
    return ycbcr_to_rgba(permute(vec4<f32>(luma, chroma, 1.0)));
}
"#;

const YCBCR_PLANAR: &str = r#"
@group(0) @binding(2) var luma_plane: texture_2d<f32>;
@group(0) @binding(3) var cb_plane: texture_2d<f32>;
@group(0) @binding(4) var cr_plane: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let luma = textureSample(luma_plane, plane_sampler, in.uv).r;
    let cb = textureSample(cb_plane, plane_sampler, in.uv).r;
    let cr = textureSample(cr_plane, plane_sampler, in.uv).r;
    return ycbcr_to_rgba(permute(vec4<f32>(luma, cb, cr, 1.0)));
}
"#;

/// Complete WGSL module for `program`.
pub(crate) fn source(program: FragmentProgram) -> String {
    let body: &[&str] = match program {
        FragmentProgram::Rgba32 => &[RGBA32],
        FragmentProgram::Rgb24 => &[TRIPLET_LOAD, RGB24],
        FragmentProgram::Rgb16 => &[RGB16],
        FragmentProgram::YCbCrA32 => &[YCBCRA32],
        FragmentProgram::YCbCr24 => &[TRIPLET_LOAD, YCBCR24],
        FragmentProgram::YCbCr422 => &[YCBCR422],
        FragmentProgram::YCbCrBiPlanar => &[YCBCR_BIPLANAR],
        FragmentProgram::YCbCrPlanar => &[YCBCR_PLANAR],
    };
    let mut source = String::from(COMMON);
    for part in body {
        source.push_str(part);
    }
    source
}
