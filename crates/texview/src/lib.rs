//! Texview maps camera and image pixel formats onto GPU textures and draws
//! them, converting YCbCr to RGB on the GPU.
//!
//! ```text
//!   PixelSource (camera, still image)
//!          │ set_pixel_format / set_source_image_size
//!          │ bind_planes[_zero_copy]
//!          ▼
//!   Viewer ──▶ FrameBinder ──▶ ZeroCopyUploader ──▶ GpuBackend surfaces
//!      │                                                  │
//!      └─ publish FrameSnapshot ◀─────────────────────────┘
//!                  │
//!   WindowRuntime ─┴─▶ render_frame() ──▶ GpuBackend::draw ──▶ swapchain
//! ```
//!
//! `format` resolves a four-character code into a [`FormatDescriptor`]: how
//! many planes, their texel layouts, the colour range, and which fragment
//! program draws them. `Viewer` keeps one GPU surface per plane and reuses it
//! while the producer keeps handing in the same buffers, so a camera cycling
//! through a small ring of buffers settles into zero allocations per frame.
//!
//! [`GpuBackend`] is the seam between that bookkeeping and the GPU. The wgpu
//! implementation drives the window; [`headless::HeadlessBackend`] records
//! calls so the behaviour can be tested without a device.

pub mod backend;
mod binder;
pub mod color;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod gpu;
pub mod headless;
pub mod plane;
mod render;
pub mod source;
mod types;
pub mod upload;
pub mod viewer;
pub mod viewport;
mod window;

pub use backend::{DrawCall, GpuBackend};
pub use binder::BindReport;
pub use diagnostics::ViewerDiagnostics;
pub use error::ViewerError;
pub use format::{
    fourcc, ColorRange, FormatDescriptor, FourCc, FragmentProgram, PixelFormat, TexelFormat,
};
pub use gpu::WgpuBackend;
pub use plane::PlaneView;
pub use render::{RenderOutcome, SkipReason};
pub use source::PixelSource;
pub use types::WindowConfig;
pub use upload::{UploadPath, ALIAS_ALIGNMENT};
pub use viewer::{Viewer, ViewerEvent};
pub use viewport::{ContentMode, Quad};
pub use window::WindowRuntime;
