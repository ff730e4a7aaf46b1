use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use texview::{GpuBackend, PixelFormat, PixelSource, Viewer, ViewerError};

use crate::convert::FrameImage;
use crate::still::render_test_pattern;

#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Frames in the capture ring.
    pub buffers: usize,
    pub frame_interval: Duration,
    /// Bind frames by aliasing their memory. Needs at least two buffers so
    /// the frame being written is never the one on screen.
    pub zero_copy: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            format: PixelFormat::BiPlanar420Video,
            width: 1280,
            height: 720,
            buffers: 3,
            frame_interval: Duration::from_millis(33),
            zero_copy: true,
        }
    }
}

/// Camera stand-in that renders a moving test pattern into a fixed ring of
/// buffers, the way capture drivers cycle through a few backing buffers.
pub struct SyntheticCamera {
    config: CameraConfig,
    delivered: Arc<AtomicU64>,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.buffers == 0 {
            bail!("camera needs at least one buffer");
        }
        if config.width == 0 || config.height == 0 {
            bail!(
                "camera frame size must be non-zero, got {}x{}",
                config.width,
                config.height
            );
        }
        Ok(Self {
            config,
            delivered: Arc::new(AtomicU64::new(0)),
            stop_tx: None,
            worker: None,
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Frames bound successfully since the camera was created.
    pub fn frames_delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn halt(&mut self) -> Result<()> {
        // Dropping the sender wakes the capture loop.
        self.stop_tx.take();
        match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|err| anyhow!("camera thread panicked: {err:?}"))?,
            None => Ok(()),
        }
    }
}

impl<B: GpuBackend> PixelSource<B> for SyntheticCamera {
    fn pixel_format(&self) -> PixelFormat {
        self.config.format
    }

    fn start(&mut self, viewer: Arc<Viewer<B>>) -> Result<()> {
        if self.worker.is_some() {
            bail!("camera is already running");
        }
        viewer.set_pixel_format(self.config.format.code())?;
        viewer.set_source_image_size(self.config.width, self.config.height);

        let (stop_tx, stop_rx) = bounded(1);
        let config = self.config.clone();
        let delivered = self.delivered.clone();
        let handle = thread::Builder::new()
            .name("texview-camera".into())
            .spawn(move || {
                let result = capture_loop(&config, &viewer, &stop_rx, &delivered);
                // Nothing may stay aliased once the ring is freed.
                viewer.reset();
                result
            })
            .map_err(|err| anyhow!("failed to spawn camera thread: {err}"))?;

        tracing::info!(
            format = %self.config.format,
            width = self.config.width,
            height = self.config.height,
            buffers = self.config.buffers,
            "camera started"
        );
        self.stop_tx = Some(stop_tx);
        self.worker = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let result = self.halt();
        tracing::info!(frames = self.frames_delivered(), "camera stopped");
        result
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        if let Err(err) = self.halt() {
            tracing::warn!(error = %err, "camera thread ended with an error");
        }
    }
}

fn capture_loop<B: GpuBackend>(
    config: &CameraConfig,
    viewer: &Viewer<B>,
    stop_rx: &Receiver<()>,
    delivered: &AtomicU64,
) -> Result<()> {
    let mut ring = (0..config.buffers)
        .map(|_| FrameImage::allocate(config.format, config.width, config.height))
        .collect::<Result<Vec<_>>>()?;
    let zero_copy = config.zero_copy && ring.len() >= 2 && ring.iter().all(FrameImage::is_aligned);
    if config.zero_copy && !zero_copy {
        tracing::warn!(
            buffers = ring.len(),
            "zero-copy needs two or more aligned buffers; copying frames instead"
        );
    }

    let mut rgba = vec![0u8; config.width as usize * config.height as usize * 4];
    let mut sequence: u64 = 0;
    loop {
        match stop_rx.recv_timeout(config.frame_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let slot = (sequence % ring.len() as u64) as usize;
        render_test_pattern(&mut rgba, config.width, config.height, (sequence * 4) as u32);
        ring[slot].convert_into(&rgba)?;

        let planes = ring[slot].views();
        let bound = if zero_copy {
            // SAFETY: the ring outlives every bind, the slot written next is
            // never the one bound last, and the viewer is reset before the
            // ring is dropped.
            unsafe { viewer.bind_planes_zero_copy(&planes) }
        } else {
            viewer.bind_planes(&planes)
        };
        match bound {
            Ok(_) => {
                delivered.fetch_add(1, Ordering::SeqCst);
            }
            Err(ViewerError::ResourceAllocation(reason)) => {
                tracing::warn!(sequence, %reason, "dropped camera frame");
            }
            Err(err) => return Err(err.into()),
        }
        sequence += 1;
    }
    Ok(())
}
