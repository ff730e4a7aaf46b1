use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::backend::GpuBackend;
use crate::binder::{BindReport, FrameBinder};
use crate::color::FragmentUniforms;
use crate::diagnostics::{FpsCounter, ViewerDiagnostics};
use crate::error::ViewerError;
use crate::format::{self, FormatDescriptor, FragmentProgram, PixelFormat};
use crate::plane::PlaneView;
use crate::render::{self, FrameSnapshot, RenderOutcome};
use crate::upload::{BindMode, ZeroCopyUploader};
use crate::viewport::{ContentMode, Quad};

/// Notifications for whoever drives presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    SourceSizeChanged { width: u32, height: u32 },
    FormatChanged(PixelFormat),
    FrameBound { rebuilt: usize, reused: usize },
    Reset,
}

struct RenderState<B: GpuBackend> {
    descriptor: Option<FormatDescriptor>,
    pipeline: Option<Arc<B::Pipeline>>,
    image_size: Option<(u32, u32)>,
    drawable_size: Option<(u32, u32)>,
    content_mode: ContentMode,
    quad: Option<Quad>,
    binder: FrameBinder<B::Surface>,
    uploader: ZeroCopyUploader,
    pipelines: HashMap<FragmentProgram, Arc<B::Pipeline>>,
    surfaces_built: u64,
    surfaces_reused: u64,
}

impl<B: GpuBackend> RenderState<B> {
    fn new(content_mode: ContentMode) -> Self {
        Self {
            descriptor: None,
            pipeline: None,
            image_size: None,
            drawable_size: None,
            content_mode,
            quad: None,
            binder: FrameBinder::default(),
            uploader: ZeroCopyUploader::new(),
            pipelines: HashMap::new(),
            surfaces_built: 0,
            surfaces_reused: 0,
        }
    }

    fn update_quad(&mut self) {
        self.quad = match (self.drawable_size, self.image_size) {
            (Some(drawable), Some(image)) => Quad::compute(self.content_mode, drawable, image),
            _ => None,
        };
    }

    fn snapshot(&self) -> FrameSnapshot<B> {
        let uniforms = match self.descriptor {
            Some(descriptor) => {
                FragmentUniforms::for_descriptor(&descriptor, self.image_size.unwrap_or((0, 0)))
            }
            None => FragmentUniforms::default(),
        };
        FrameSnapshot {
            descriptor: self.descriptor,
            pipeline: self.pipeline.clone(),
            surfaces: self.binder.surfaces(),
            quad: self.quad,
            uniforms,
        }
    }
}

#[derive(Default)]
struct PresentStats {
    fps: FpsCounter,
}

/// Displays frames of any supported pixel format through a [`GpuBackend`].
///
/// Producer-side calls (`set_*`, `bind_planes*`, `reset`) serialise on one
/// lock and do their uploads on the calling thread. `render_frame` only reads
/// the last published snapshot, so presentation never waits for an upload;
/// a frame bound while a draw is in flight simply replaces what the next
/// draw sees.
pub struct Viewer<B: GpuBackend> {
    backend: Arc<B>,
    state: Mutex<RenderState<B>>,
    published: Mutex<Arc<FrameSnapshot<B>>>,
    subscribers: Mutex<Vec<Sender<ViewerEvent>>>,
    stats: Mutex<PresentStats>,
    frames_drawn: AtomicU64,
    frames_skipped: AtomicU64,
}

impl<B: GpuBackend> Viewer<B> {
    pub fn new(backend: B) -> Self {
        Self::with_backend(Arc::new(backend))
    }

    pub fn with_backend(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: Mutex::new(RenderState::new(ContentMode::default())),
            published: Mutex::new(Arc::new(FrameSnapshot::empty())),
            subscribers: Mutex::new(Vec::new()),
            stats: Mutex::new(PresentStats::default()),
            frames_drawn: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Receives every event emitted after this call.
    pub fn subscribe(&self) -> Receiver<ViewerEvent> {
        let (tx, rx) = unbounded();
        lock(&self.subscribers).push(tx);
        rx
    }

    pub fn set_source_image_size(&self, width: u32, height: u32) {
        let mut state = self.lock_state();
        if state.image_size == Some((width, height)) {
            return;
        }
        tracing::debug!(width, height, "source image size changed");
        state.image_size = Some((width, height));
        state.update_quad();
        self.publish(&state);
        self.emit(ViewerEvent::SourceSizeChanged { width, height });
    }

    /// Resolves the format and prepares its pipeline. Switching to a new
    /// format drops every surface of the old one; setting the current format
    /// again is a no-op. Fails without touching the viewer when the code is
    /// unknown or the pipeline cannot be built.
    pub fn set_pixel_format(&self, code: u32) -> Result<(), ViewerError> {
        let descriptor = format::resolve(code)?;

        let mut state = self.lock_state();
        if state.descriptor.map(|current| current.format) == Some(descriptor.format) {
            return Ok(());
        }

        let pipeline = match state.pipelines.get(&descriptor.program) {
            Some(pipeline) => pipeline.clone(),
            None => {
                let pipeline = self
                    .backend
                    .build_pipeline(descriptor.program)
                    .map(Arc::new)
                    .map_err(|err| ViewerError::Pipeline(format!("{err:#}")))?;
                tracing::debug!(program = ?descriptor.program, "built fragment pipeline");
                state.pipelines.insert(descriptor.program, pipeline.clone());
                pipeline
            }
        };

        tracing::debug!(
            format = %descriptor.format,
            code = %descriptor.format.fourcc(),
            planes = descriptor.plane_count(),
            range = ?descriptor.color_range,
            "pixel format changed"
        );
        state.descriptor = Some(descriptor);
        state.pipeline = Some(pipeline);
        state.binder.clear();
        self.publish(&state);
        self.emit(ViewerEvent::FormatChanged(descriptor.format));
        Ok(())
    }

    /// Binds one frame, copying every plane into GPU-owned surfaces.
    pub fn bind_planes(&self, planes: &[PlaneView<'_>]) -> Result<BindReport, ViewerError> {
        self.bind(planes, BindMode::Copy)
    }

    /// Binds one frame, aliasing plane memory directly where the alignment
    /// and the backend allow it.
    ///
    /// # Safety
    ///
    /// Aliased surfaces read the caller's memory after this call returns.
    /// Every plane's memory must stay allocated, and unchanged except for
    /// intended frame updates, until the next bind on this viewer or
    /// [`Viewer::reset`].
    pub unsafe fn bind_planes_zero_copy(
        &self,
        planes: &[PlaneView<'_>],
    ) -> Result<BindReport, ViewerError> {
        self.bind(planes, BindMode::ZeroCopy)
    }

    fn bind(&self, planes: &[PlaneView<'_>], mode: BindMode) -> Result<BindReport, ViewerError> {
        let mut state = self.lock_state();
        let (Some(descriptor), Some(_)) = (state.descriptor, state.image_size) else {
            return Err(ViewerError::NotConfigured);
        };

        let RenderState {
            binder, uploader, ..
        } = &mut *state;
        let report = match binder.bind(self.backend.as_ref(), uploader, &descriptor, planes, mode)
        {
            Ok(report) => report,
            Err(err @ ViewerError::ResourceAllocation(_)) => {
                tracing::warn!(error = %err, "dropping frame; keeping previous surfaces");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        state.surfaces_built += report.rebuilt as u64;
        state.surfaces_reused += report.reused as u64;
        if report.rebuilt > 0 {
            self.publish(&state);
        }
        self.emit(ViewerEvent::FrameBound {
            rebuilt: report.rebuilt,
            reused: report.reused,
        });
        Ok(report)
    }

    /// Drops every surface and forgets the format and image size.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        state.descriptor = None;
        state.pipeline = None;
        state.image_size = None;
        state.quad = None;
        state.binder.clear();
        state.uploader = ZeroCopyUploader::new();
        self.publish(&state);
        tracing::debug!("viewer reset");
        self.emit(ViewerEvent::Reset);
    }

    pub fn set_content_mode(&self, mode: ContentMode) {
        let mut state = self.lock_state();
        if state.content_mode == mode {
            return;
        }
        state.content_mode = mode;
        state.update_quad();
        self.publish(&state);
    }

    pub fn set_drawable_size(&self, width: u32, height: u32) {
        let mut state = self.lock_state();
        if state.drawable_size == Some((width, height)) {
            return;
        }
        state.drawable_size = Some((width, height));
        state.update_quad();
        self.publish(&state);
    }

    /// Draws the most recently bound frame, or skips when the viewer is not
    /// fully configured.
    pub fn render_frame(&self, target: &B::Target) -> Result<RenderOutcome, ViewerError> {
        let snapshot = lock(&self.published).clone();
        let outcome = render::draw_snapshot(self.backend.as_ref(), target, &snapshot)?;
        match outcome {
            RenderOutcome::Drawn => {
                self.frames_drawn.fetch_add(1, Ordering::Relaxed);
                lock(&self.stats).fps.tick(Instant::now());
            }
            RenderOutcome::Skipped(reason) => {
                self.frames_skipped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(%reason, "skipped frame");
            }
        }
        Ok(outcome)
    }

    pub fn diagnostics(&self) -> ViewerDiagnostics {
        let state = self.lock_state();
        ViewerDiagnostics {
            fps: lock(&self.stats).fps.fps(),
            image_size: state.image_size.unwrap_or((0, 0)),
            format: state.descriptor.map(|descriptor| descriptor.format),
            unaligned: state.uploader.is_unaligned(),
            surfaces_built: state.surfaces_built,
            surfaces_reused: state.surfaces_reused,
            frames_drawn: self.frames_drawn.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RenderState<B>> {
        lock(&self.state)
    }

    fn publish(&self, state: &RenderState<B>) {
        *lock(&self.published) = Arc::new(state.snapshot());
    }

    fn emit(&self, event: ViewerEvent) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }
}

// Every critical section leaves the state consistent, so a panic elsewhere
// does not make it unusable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
