use std::sync::Arc;

use anyhow::Result;

use crate::backend::GpuBackend;
use crate::format::PixelFormat;
use crate::viewer::Viewer;

/// Something that feeds frames into a [`Viewer`]: a camera, a still image,
/// a decoder.
///
/// `start` sets the format and image size on the viewer and begins binding
/// planes; `stop` ends delivery and must leave no aliased memory bound.
pub trait PixelSource<B: GpuBackend> {
    fn pixel_format(&self) -> PixelFormat;

    fn start(&mut self, viewer: Arc<Viewer<B>>) -> Result<()>;

    fn stop(&mut self) -> Result<()>;
}
