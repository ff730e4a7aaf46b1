//! Content modes and the quad that places the image inside the drawable.
//!
//! Rectangles are normalised to the drawable with the origin at the top-left,
//! matching how views lay out their content. The quad converts them to NDC.

use std::fmt;
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};

/// Placement of the source image inside the drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentMode {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
    #[default]
    ScaleAspectFit,
    ScaleAspectFill,
    ScaleToFill,
}

impl ContentMode {
    pub const ALL: [ContentMode; 12] = [
        ContentMode::TopLeft,
        ContentMode::Top,
        ContentMode::TopRight,
        ContentMode::Left,
        ContentMode::Center,
        ContentMode::Right,
        ContentMode::BottomLeft,
        ContentMode::Bottom,
        ContentMode::BottomRight,
        ContentMode::ScaleAspectFit,
        ContentMode::ScaleAspectFill,
        ContentMode::ScaleToFill,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ContentMode::TopLeft => "top-left",
            ContentMode::Top => "top",
            ContentMode::TopRight => "top-right",
            ContentMode::Left => "left",
            ContentMode::Center => "center",
            ContentMode::Right => "right",
            ContentMode::BottomLeft => "bottom-left",
            ContentMode::Bottom => "bottom",
            ContentMode::BottomRight => "bottom-right",
            ContentMode::ScaleAspectFit => "aspect-fit",
            ContentMode::ScaleAspectFill => "aspect-fill",
            ContentMode::ScaleToFill => "stretch",
        }
    }
}

impl fmt::Display for ContentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContentMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        let alias = match normalized.as_str() {
            "centre" => "center",
            "fit" => "aspect-fit",
            "fill" => "aspect-fill",
            "scale-to-fill" => "stretch",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == alias)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|mode| mode.name()).collect();
                format!(
                    "unknown content mode '{}'; expected one of {}",
                    raw.trim(),
                    names.join(", ")
                )
            })
    }
}

/// Rectangle in drawable-normalised coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Where the image lands inside the drawable. `None` when either size is
/// degenerate, which leaves nothing to draw.
pub fn texture_rect(mode: ContentMode, drawable: (u32, u32), image: (u32, u32)) -> Option<NormRect> {
    if drawable.0 == 0 || drawable.1 == 0 || image.0 == 0 || image.1 == 0 {
        return None;
    }

    let (draw_w, draw_h) = (drawable.0 as f32, drawable.1 as f32);
    let (img_w, img_h) = (image.0 as f32, image.1 as f32);
    let w = img_w / draw_w;
    let h = img_h / draw_h;

    let anchored = |x: f32, y: f32| NormRect {
        x,
        y,
        width: w,
        height: h,
    };
    let centred = (1.0 - w) / 2.0;
    let middle = (1.0 - h) / 2.0;

    let rect = match mode {
        ContentMode::TopLeft => anchored(0.0, 0.0),
        ContentMode::Top => anchored(centred, 0.0),
        ContentMode::TopRight => anchored(1.0 - w, 0.0),
        ContentMode::Left => anchored(0.0, middle),
        ContentMode::Center => anchored(centred, middle),
        ContentMode::Right => anchored(1.0 - w, middle),
        ContentMode::BottomLeft => anchored(0.0, 1.0 - h),
        ContentMode::Bottom => anchored(centred, 1.0 - h),
        ContentMode::BottomRight => anchored(1.0 - w, 1.0 - h),
        ContentMode::ScaleAspectFit | ContentMode::ScaleAspectFill => {
            let scale_x = draw_w / img_w;
            let scale_y = draw_h / img_h;
            let scale = if mode == ContentMode::ScaleAspectFit {
                scale_x.min(scale_y)
            } else {
                scale_x.max(scale_y)
            };
            let width = img_w * scale / draw_w;
            let height = img_h * scale / draw_h;
            NormRect {
                x: (1.0 - width) / 2.0,
                y: (1.0 - height) / 2.0,
                width,
                height,
            }
        }
        ContentMode::ScaleToFill => NormRect {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        },
    };
    Some(rect)
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
    pub uv: [f32; 2],
}

/// Four-vertex triangle strip ordered bottom-left, bottom-right, top-left,
/// top-right.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
    pub vertices: [Vertex; 4],
}

impl Quad {
    pub fn from_rect(rect: NormRect) -> Self {
        let left = rect.x * 2.0 - 1.0;
        let right = left + rect.width * 2.0;
        let top = 1.0 - rect.y * 2.0;
        let bottom = top - rect.height * 2.0;

        let vertex = |x: f32, y: f32, u: f32, v: f32| Vertex {
            position: [x, y, 0.0, 1.0],
            uv: [u, v],
        };
        Self {
            vertices: [
                vertex(left, bottom, 0.0, 1.0),
                vertex(right, bottom, 1.0, 1.0),
                vertex(left, top, 0.0, 0.0),
                vertex(right, top, 1.0, 0.0),
            ],
        }
    }

    pub fn compute(mode: ContentMode, drawable: (u32, u32), image: (u32, u32)) -> Option<Self> {
        texture_rect(mode, drawable, image).map(Self::from_rect)
    }
}
