//! Format registry: maps four-character pixel format codes to the texture
//! layout, colour transform, and fragment program needed to display them.
//!
//! The table is flat on purpose. Plane layout and colour range are
//! independent axes, but the program choice is not a cross product of them
//! (packed RGB uses a permutation table, 4:2:2 needs its own program), so each
//! format spells out its full descriptor.

use std::fmt;
use std::str::FromStr;

use crate::error::ViewerError;

/// Packs four ASCII bytes into a big-endian format code.
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

const IDENTITY: [u32; 4] = [0, 1, 2, 3];

/// Raw pixel format code rendered as `'BGRA'` when printable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub u32);

impl FourCc {
    fn printable(self) -> Option<[u8; 4]> {
        let bytes = self.0.to_be_bytes();
        bytes
            .iter()
            .all(|byte| (0x20..0x7f).contains(byte))
            .then_some(bytes)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.printable() {
            Some(bytes) => {
                let text: String = bytes.iter().map(|&byte| byte as char).collect();
                write!(f, "'{text}'")
            }
            None => write!(f, "{}", self.0),
        }
    }
}

/// Every pixel format the viewer can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Argb32,
    Bgra32,
    Abgr32,
    Rgba32,
    Rgb555,
    Rgb5551,
    Rgb565,
    /// 4:2:2 packed as Cb Y0 Cr Y1.
    YCbCr422,
    /// 4:4:4:4 packed as Cb Y Cr A.
    YCbCrA4444,
    /// 4:4:4:4 packed as A Y Cb Cr.
    AYCbCr4444,
    /// 4:4:4 packed as Cr Y Cb.
    YCbCr444,
    BiPlanar420Video,
    BiPlanar420Full,
    Planar420Video,
    Planar420Full,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 17] = [
        PixelFormat::Rgb24,
        PixelFormat::Bgr24,
        PixelFormat::Argb32,
        PixelFormat::Bgra32,
        PixelFormat::Abgr32,
        PixelFormat::Rgba32,
        PixelFormat::Rgb555,
        PixelFormat::Rgb5551,
        PixelFormat::Rgb565,
        PixelFormat::YCbCr422,
        PixelFormat::YCbCrA4444,
        PixelFormat::AYCbCr4444,
        PixelFormat::YCbCr444,
        PixelFormat::BiPlanar420Video,
        PixelFormat::BiPlanar420Full,
        PixelFormat::Planar420Video,
        PixelFormat::Planar420Full,
    ];

    pub const fn code(self) -> u32 {
        match self {
            PixelFormat::Rgb24 => 24,
            PixelFormat::Bgr24 => fourcc(b"24BG"),
            PixelFormat::Argb32 => 32,
            PixelFormat::Bgra32 => fourcc(b"BGRA"),
            PixelFormat::Abgr32 => fourcc(b"ABGR"),
            PixelFormat::Rgba32 => fourcc(b"RGBA"),
            PixelFormat::Rgb555 => fourcc(b"L555"),
            PixelFormat::Rgb5551 => fourcc(b"5551"),
            PixelFormat::Rgb565 => fourcc(b"L565"),
            PixelFormat::YCbCr422 => fourcc(b"2vuy"),
            PixelFormat::YCbCrA4444 => fourcc(b"v408"),
            PixelFormat::AYCbCr4444 => fourcc(b"y408"),
            PixelFormat::YCbCr444 => fourcc(b"v308"),
            PixelFormat::BiPlanar420Video => fourcc(b"420v"),
            PixelFormat::BiPlanar420Full => fourcc(b"420f"),
            PixelFormat::Planar420Video => fourcc(b"y420"),
            PixelFormat::Planar420Full => fourcc(b"f420"),
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.code() == code)
    }

    pub fn fourcc(self) -> FourCc {
        FourCc(self.code())
    }

    /// Name shown in the diagnostics status line.
    pub const fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "24RGB",
            PixelFormat::Bgr24 => "24BGR",
            PixelFormat::Argb32 => "32ARGB",
            PixelFormat::Bgra32 => "32BGRA",
            PixelFormat::Abgr32 => "32ABGR",
            PixelFormat::Rgba32 => "32RGBA",
            PixelFormat::Rgb555 => "16LE555",
            PixelFormat::Rgb5551 => "16LE5551",
            PixelFormat::Rgb565 => "16LE565",
            PixelFormat::YCbCr422 => "422YpCbCr8",
            PixelFormat::YCbCrA4444 => "4444YpCbCrA8",
            PixelFormat::AYCbCr4444 => "4444AYpCbCr8",
            PixelFormat::YCbCr444 => "444YpCbCr8",
            PixelFormat::BiPlanar420Video => "420YpCbCr8BiPlanarVideoRange",
            PixelFormat::BiPlanar420Full => "420YpCbCr8BiPlanarFullRange",
            PixelFormat::Planar420Video => "420YpCbCr8Planar",
            PixelFormat::Planar420Full => "420YpCbCr8PlanarFullRange",
        }
    }

    pub fn descriptor(self) -> FormatDescriptor {
        use FragmentProgram as P;

        let (planes, color_range, program, channel_permutation) = match self {
            PixelFormat::Rgb24 => (TRIPLET, ColorRange::None, P::Rgb24, IDENTITY),
            PixelFormat::Bgr24 => (TRIPLET, ColorRange::None, P::Rgb24, [2, 1, 0, 3]),
            PixelFormat::Argb32 => (QUAD, ColorRange::None, P::Rgba32, [1, 2, 3, 0]),
            PixelFormat::Bgra32 => (QUAD, ColorRange::None, P::Rgba32, [2, 1, 0, 3]),
            PixelFormat::Abgr32 => (QUAD, ColorRange::None, P::Rgba32, [3, 2, 1, 0]),
            PixelFormat::Rgba32 => (QUAD, ColorRange::None, P::Rgba32, IDENTITY),
            PixelFormat::Rgb555 => (RGB555, ColorRange::None, P::Rgb16, IDENTITY),
            PixelFormat::Rgb5551 => (RGB5551, ColorRange::None, P::Rgb16, IDENTITY),
            PixelFormat::Rgb565 => (RGB565, ColorRange::None, P::Rgb16, IDENTITY),
            PixelFormat::YCbCr422 => (PACKED_422, ColorRange::Video, P::YCbCr422, IDENTITY),
            PixelFormat::YCbCrA4444 => (QUAD, ColorRange::Full, P::YCbCrA32, [1, 0, 2, 3]),
            PixelFormat::AYCbCr4444 => (QUAD, ColorRange::Video, P::YCbCrA32, [1, 2, 3, 0]),
            PixelFormat::YCbCr444 => (TRIPLET, ColorRange::Video, P::YCbCr24, [1, 2, 0, 3]),
            PixelFormat::BiPlanar420Video => {
                (BIPLANAR_420, ColorRange::Video, P::YCbCrBiPlanar, IDENTITY)
            }
            PixelFormat::BiPlanar420Full => {
                (BIPLANAR_420, ColorRange::Full, P::YCbCrBiPlanar, IDENTITY)
            }
            PixelFormat::Planar420Video => {
                (PLANAR_420, ColorRange::Video, P::YCbCrPlanar, IDENTITY)
            }
            PixelFormat::Planar420Full => (PLANAR_420, ColorRange::Full, P::YCbCrPlanar, IDENTITY),
        };

        FormatDescriptor {
            format: self,
            planes,
            color_range,
            program,
            channel_permutation,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts a format name (`420YpCbCr8BiPlanarVideoRange`), a four-character
/// code (`420v`), or a decimal code (`875704438`).
impl FromStr for PixelFormat {
    type Err = ViewerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Some(format) = Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(trimmed))
        {
            return Ok(format);
        }

        let numeric = trimmed.parse::<u32>().ok();
        if let Some(format) = numeric.and_then(Self::from_code) {
            return Ok(format);
        }
        if let &[a, b, c, d] = trimmed.as_bytes() {
            let code = fourcc(&[a, b, c, d]);
            return Self::from_code(code).ok_or(ViewerError::UnsupportedFormat(FourCc(code)));
        }
        Err(ViewerError::UnsupportedFormat(FourCc(numeric.unwrap_or(0))))
    }
}

/// Resolves a raw code into its descriptor.
pub fn resolve(code: u32) -> Result<FormatDescriptor, ViewerError> {
    PixelFormat::from_code(code)
        .map(PixelFormat::descriptor)
        .ok_or(ViewerError::UnsupportedFormat(FourCc(code)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRange {
    None,
    Video,
    Full,
}

/// Bit layout of a single 16-bit little-endian RGB texel.
///
/// * `Rgb555`: bit 15 unused, then 5 bits each of R, G, B.
/// * `Rgb5551`: 5 bits each of R, G, B from the top, alpha in bit 0.
/// * `Rgb565`: R in bits 11-15, G in 5-10, B in 0-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Packed16Layout {
    Rgb555,
    Rgb5551,
    Rgb565,
}

impl Packed16Layout {
    /// Selector passed to the 16-bit fragment program.
    pub const fn id(self) -> u32 {
        match self {
            Packed16Layout::Rgb555 => 0,
            Packed16Layout::Rgb5551 => 1,
            Packed16Layout::Rgb565 => 2,
        }
    }
}

/// Native texel layout of one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    R8,
    Rg8,
    Rgba8,
    /// 24-bit packed pixels sampled as single bytes at three times the width.
    R8Triplet,
    Packed16(Packed16Layout),
    /// Luma-chroma pairs, two pixels per four-byte texel.
    Packed422,
}

impl TexelFormat {
    /// Bytes in one GPU texel.
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            TexelFormat::R8 | TexelFormat::R8Triplet => 1,
            TexelFormat::Rg8 | TexelFormat::Packed16(_) => 2,
            TexelFormat::Rgba8 | TexelFormat::Packed422 => 4,
        }
    }

    /// Width of the texture that holds a plane `width` pixels wide.
    pub const fn texture_width(self, width: u32) -> u32 {
        match self {
            TexelFormat::R8Triplet => width * 3,
            TexelFormat::Packed422 => width.div_ceil(2),
            _ => width,
        }
    }

    /// Bytes of real pixel data in one row. Only for widths already accepted
    /// by [`TexelFormat::checked_row_bytes`].
    pub const fn row_bytes(self, width: u32) -> u32 {
        self.texture_width(width) * self.bytes_per_texel()
    }

    /// `row_bytes`, or `None` when the row does not fit in a `u32`.
    pub const fn checked_row_bytes(self, width: u32) -> Option<u32> {
        let texels = match self {
            TexelFormat::R8Triplet => match width.checked_mul(3) {
                Some(texels) => texels,
                None => return None,
            },
            _ => self.texture_width(width),
        };
        texels.checked_mul(self.bytes_per_texel())
    }

    /// Packed 4:2:2 cannot be sampled from a linear buffer-backed texture and
    /// must be replaced wholesale on every upload.
    pub const fn buffer_backable(self) -> bool {
        !matches!(self, TexelFormat::Packed422)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsampling {
    Full,
    /// Half width and half height, rounded up.
    Half,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub texel: TexelFormat,
    pub subsampling: Subsampling,
}

impl PlaneLayout {
    const fn full(texel: TexelFormat) -> Self {
        Self {
            texel,
            subsampling: Subsampling::Full,
        }
    }

    const fn half(texel: TexelFormat) -> Self {
        Self {
            texel,
            subsampling: Subsampling::Half,
        }
    }

    /// Pixel dimensions of this plane for an image of the given size.
    pub const fn plane_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self.subsampling {
            Subsampling::Full => (width, height),
            Subsampling::Half => (width.div_ceil(2), height.div_ceil(2)),
        }
    }
}

const TRIPLET: &[PlaneLayout] = &[PlaneLayout::full(TexelFormat::R8Triplet)];
const QUAD: &[PlaneLayout] = &[PlaneLayout::full(TexelFormat::Rgba8)];
const RGB555: &[PlaneLayout] = &[PlaneLayout::full(TexelFormat::Packed16(
    Packed16Layout::Rgb555,
))];
const RGB5551: &[PlaneLayout] = &[PlaneLayout::full(TexelFormat::Packed16(
    Packed16Layout::Rgb5551,
))];
const RGB565: &[PlaneLayout] = &[PlaneLayout::full(TexelFormat::Packed16(
    Packed16Layout::Rgb565,
))];
const PACKED_422: &[PlaneLayout] = &[PlaneLayout::full(TexelFormat::Packed422)];
const BIPLANAR_420: &[PlaneLayout] = &[
    PlaneLayout::full(TexelFormat::R8),
    PlaneLayout::half(TexelFormat::Rg8),
];
const PLANAR_420: &[PlaneLayout] = &[
    PlaneLayout::full(TexelFormat::R8),
    PlaneLayout::half(TexelFormat::R8),
    PlaneLayout::half(TexelFormat::R8),
];

/// Fragment program variants, one per family of formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentProgram {
    Rgba32,
    Rgb24,
    Rgb16,
    YCbCrA32,
    YCbCr24,
    YCbCr422,
    YCbCrBiPlanar,
    YCbCrPlanar,
}

impl FragmentProgram {
    pub const fn texture_count(self) -> usize {
        match self {
            FragmentProgram::YCbCrBiPlanar => 2,
            FragmentProgram::YCbCrPlanar => 3,
            _ => 1,
        }
    }

    pub const fn is_ycbcr(self) -> bool {
        matches!(
            self,
            FragmentProgram::YCbCrA32
                | FragmentProgram::YCbCr24
                | FragmentProgram::YCbCr422
                | FragmentProgram::YCbCrBiPlanar
                | FragmentProgram::YCbCrPlanar
        )
    }
}

/// Immutable description of how a pixel format maps onto GPU resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub format: PixelFormat,
    pub planes: &'static [PlaneLayout],
    pub color_range: ColorRange,
    pub program: FragmentProgram,
    /// Output channel `i` reads source channel `channel_permutation[i]`.
    pub channel_permutation: [u32; 4],
}

impl FormatDescriptor {
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn name(&self) -> &'static str {
        self.format.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_core_video_constants() {
        let expected = [
            (PixelFormat::Rgb24, 24),
            (PixelFormat::Bgr24, 842285639),
            (PixelFormat::Argb32, 32),
            (PixelFormat::Bgra32, 1111970369),
            (PixelFormat::Abgr32, 1094862674),
            (PixelFormat::Rgba32, 1380401729),
            (PixelFormat::YCbCrA4444, 1983131704),
            (PixelFormat::AYCbCr4444, 2033463352),
            (PixelFormat::YCbCr444, 1983066168),
            (PixelFormat::Planar420Video, 2033463856),
            (PixelFormat::Planar420Full, 1714696752),
            (PixelFormat::Rgb555, 1278555445),
            (PixelFormat::Rgb5551, 892679473),
            (PixelFormat::Rgb565, 1278555701),
            (PixelFormat::BiPlanar420Video, 875704438),
            (PixelFormat::BiPlanar420Full, 875704422),
            (PixelFormat::YCbCr422, 846624121),
        ];
        for (format, code) in expected {
            assert_eq!(format.code(), code, "{format}");
            assert_eq!(PixelFormat::from_code(code), Some(format));
        }
    }

    #[test]
    fn plane_counts_follow_layout_family() {
        for format in PixelFormat::ALL {
            let descriptor = resolve(format.code()).unwrap();
            let expected = match format {
                PixelFormat::BiPlanar420Video | PixelFormat::BiPlanar420Full => 2,
                PixelFormat::Planar420Video | PixelFormat::Planar420Full => 3,
                _ => 1,
            };
            assert_eq!(descriptor.plane_count(), expected, "{format}");
            assert_eq!(descriptor.program.texture_count(), expected, "{format}");
        }
    }

    #[test]
    fn rgb_formats_carry_no_color_range() {
        for format in PixelFormat::ALL {
            let descriptor = format.descriptor();
            assert_eq!(
                descriptor.program.is_ycbcr(),
                descriptor.color_range != ColorRange::None,
                "{format}"
            );
        }
    }

    #[test]
    fn unknown_code_is_unsupported() {
        let err = resolve(fourcc(b"xxxx")).unwrap_err();
        assert_eq!(err, ViewerError::UnsupportedFormat(FourCc(fourcc(b"xxxx"))));
        assert_eq!(err.to_string(), "unsupported pixel format 'xxxx'");
    }

    #[test]
    fn fourcc_display_falls_back_to_decimal() {
        assert_eq!(FourCc(fourcc(b"BGRA")).to_string(), "'BGRA'");
        assert_eq!(FourCc(32).to_string(), "32");
    }

    #[test]
    fn parses_names_codes_and_numbers() {
        assert_eq!("420v".parse::<PixelFormat>().unwrap(), PixelFormat::BiPlanar420Video);
        assert_eq!("5551".parse::<PixelFormat>().unwrap(), PixelFormat::Rgb5551);
        assert_eq!("24".parse::<PixelFormat>().unwrap(), PixelFormat::Rgb24);
        assert_eq!(
            "420YpCbCr8PlanarFullRange".parse::<PixelFormat>().unwrap(),
            PixelFormat::Planar420Full
        );
        assert_eq!("875704422".parse::<PixelFormat>().unwrap(), PixelFormat::BiPlanar420Full);
        assert!("nope".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn texture_geometry_per_texel_format() {
        assert_eq!(TexelFormat::R8Triplet.texture_width(10), 30);
        assert_eq!(TexelFormat::R8Triplet.row_bytes(10), 30);
        assert_eq!(TexelFormat::Packed422.texture_width(9), 5);
        assert_eq!(TexelFormat::Packed422.row_bytes(8), 16);
        assert_eq!(TexelFormat::Rg8.row_bytes(8), 16);
        assert_eq!(TexelFormat::Rgba8.checked_row_bytes(8), Some(32));
        assert_eq!(TexelFormat::Rgba8.checked_row_bytes(u32::MAX / 2), None);
        assert_eq!(TexelFormat::R8Triplet.checked_row_bytes(u32::MAX / 2), None);
        assert_eq!(TexelFormat::Packed422.checked_row_bytes(u32::MAX), None);
        assert!(!TexelFormat::Packed422.buffer_backable());

        let chroma = PixelFormat::Planar420Video.descriptor().planes[1];
        assert_eq!(chroma.plane_size(1281, 719), (641, 360));
    }
}
