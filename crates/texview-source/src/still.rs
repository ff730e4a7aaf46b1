use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use texview::{GpuBackend, PixelFormat, PixelSource, Viewer};

use crate::convert::{convert, FrameImage};

/// A single image converted once into the requested pixel format.
///
/// Binding goes through the copying path, so the frame can be dropped or
/// replaced as soon as `start` returns.
pub struct StillImageSource {
    frame: FrameImage,
}

impl StillImageSource {
    /// Decodes a PNG, JPEG, BMP, or GIF file.
    pub fn open(path: &Path, format: PixelFormat) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to open image at {}", path.display()))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        tracing::debug!(path = %path.display(), width, height, %format, "decoded still image");
        Self::from_rgba(format, width, height, rgba.as_raw())
    }

    pub fn from_rgba(format: PixelFormat, width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        let frame = convert(format, width, height, rgba)
            .with_context(|| format!("failed to convert image to {format}"))?;
        Ok(Self { frame })
    }

    /// Colour bars over a horizontal luma ramp.
    pub fn test_pattern(format: PixelFormat, width: u32, height: u32) -> Result<Self> {
        let mut rgba = vec![0u8; width as usize * height as usize * 4];
        render_test_pattern(&mut rgba, width, height, 0);
        Self::from_rgba(format, width, height, &rgba)
    }

    pub fn frame(&self) -> &FrameImage {
        &self.frame
    }
}

impl<B: GpuBackend> PixelSource<B> for StillImageSource {
    fn pixel_format(&self) -> PixelFormat {
        self.frame.format()
    }

    fn start(&mut self, viewer: Arc<Viewer<B>>) -> Result<()> {
        let (width, height) = self.frame.size();
        viewer.set_pixel_format(self.frame.format().code())?;
        viewer.set_source_image_size(width, height);
        let report = viewer.bind_planes(&self.frame.views())?;
        tracing::info!(
            format = %self.frame.format(),
            width,
            height,
            planes = report.paths.len(),
            "showing still image"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

/// Fills `rgba` with colour bars in the top two thirds and a grey ramp in
/// the rest, shifted `phase` pixels to the left.
pub(crate) fn render_test_pattern(rgba: &mut [u8], width: u32, height: u32, phase: u32) {
    let bars_end = height * 2 / 3;
    for (index, pixel) in rgba.chunks_exact_mut(4).enumerate() {
        let x = (index as u32 % width).wrapping_add(phase) % width;
        let y = index as u32 / width;
        let [r, g, b] = if y < bars_end {
            BARS[(x as usize * BARS.len()) / width as usize]
        } else {
            let level = (x * 255 / width.saturating_sub(1).max(1)).min(255) as u8;
            [level; 3]
        };
        pixel.copy_from_slice(&[r, g, b, 255]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use texview::headless::HeadlessBackend;
    use texview::RenderOutcome;

    #[test]
    fn start_configures_and_binds() {
        let viewer = Arc::new(Viewer::new(HeadlessBackend::default()));
        viewer.set_drawable_size(64, 64);
        let mut source = StillImageSource::test_pattern(PixelFormat::Planar420Video, 48, 32).unwrap();
        source.start(viewer.clone()).unwrap();

        assert_eq!(viewer.render_frame(&()).unwrap(), RenderOutcome::Drawn);
        let diagnostics = viewer.diagnostics();
        assert_eq!(diagnostics.image_size, (48, 32));
        assert_eq!(diagnostics.format, Some(PixelFormat::Planar420Video));
        assert_eq!(viewer.backend().surfaces_created(), 3);

        // The frame was copied, so dropping the source is fine.
        drop(source);
        assert_eq!(viewer.render_frame(&()).unwrap(), RenderOutcome::Drawn);
    }

    #[test]
    fn decodes_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let image = image::RgbaImage::from_pixel(6, 4, image::Rgba([255, 0, 0, 255]));
        image.save(&path).unwrap();

        let source = StillImageSource::open(&path, PixelFormat::Bgra32).unwrap();
        assert_eq!(source.frame().size(), (6, 4));
        assert_eq!(&source.frame().planes()[0].bytes()[..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = StillImageSource::open(Path::new("/nonexistent/frame.png"), PixelFormat::Rgba32)
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("/nonexistent/frame.png"));
    }

    #[test]
    fn pattern_wraps_with_phase() {
        let mut still = vec![0u8; 16 * 3 * 4];
        let mut moved = still.clone();
        render_test_pattern(&mut still, 16, 3, 0);
        render_test_pattern(&mut moved, 16, 3, 2);
        assert_eq!(&moved[..4], &still[8..12]);
    }
}
