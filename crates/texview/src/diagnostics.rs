use std::fmt;
use std::time::Instant;

use crate::format::PixelFormat;

const FPS_WINDOW_FRAMES: u32 = 30;

/// Frame rate averaged over a window of 30 frames.
#[derive(Debug, Default)]
pub struct FpsCounter {
    frames: u32,
    window_start: Option<Instant>,
    fps: f32,
}

impl FpsCounter {
    /// Counts a frame. Returns the new rate when a window completes.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        if self.frames < FPS_WINDOW_FRAMES {
            return None;
        }

        let elapsed = now.saturating_duration_since(start).as_secs_f32();
        if elapsed > 0.0 {
            self.fps = self.frames as f32 / elapsed;
        }
        self.frames = 0;
        self.window_start = Some(now);
        Some(self.fps)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// Snapshot of viewer health, shown as the window title by the demo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerDiagnostics {
    pub fps: f32,
    pub image_size: (u32, u32),
    pub format: Option<PixelFormat>,
    pub unaligned: bool,
    pub surfaces_built: u64,
    pub surfaces_reused: u64,
    pub frames_drawn: u64,
    pub frames_skipped: u64,
}

impl fmt::Display for ViewerDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = self.format.map(PixelFormat::name).unwrap_or("none");
        write!(
            f,
            "FPS={:.1}, {}x{}, {}",
            self.fps, self.image_size.0, self.image_size.1, format
        )?;
        if self.unaligned {
            f.write_str(", UNALIGNED")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fps_updates_every_thirty_frames() {
        let start = Instant::now();
        let mut counter = FpsCounter::default();
        for frame in 0..29 {
            assert!(counter
                .tick(start + Duration::from_millis(frame * 10))
                .is_none());
        }
        let fps = counter.tick(start + Duration::from_millis(300)).unwrap();
        assert!((fps - 100.0).abs() < 0.5, "{fps}");
        assert_eq!(counter.fps(), fps);
    }

    #[test]
    fn status_line_marks_unaligned_buffers() {
        let mut diagnostics = ViewerDiagnostics {
            fps: 59.94,
            image_size: (1280, 720),
            format: Some(PixelFormat::BiPlanar420Video),
            ..Default::default()
        };
        assert_eq!(
            diagnostics.to_string(),
            "FPS=59.9, 1280x720, 420YpCbCr8BiPlanarVideoRange"
        );

        diagnostics.unaligned = true;
        assert!(diagnostics.to_string().ends_with(", UNALIGNED"));
    }
}
