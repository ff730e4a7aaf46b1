use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Sender};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::window::{Window, WindowBuilder};

use crate::gpu::{GpuContext, WgpuBackend};
use crate::render::RenderOutcome;
use crate::types::WindowConfig;
use crate::viewer::{Viewer, ViewerEvent};

const TITLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
enum WindowCommand {
    Viewer(ViewerEvent),
    Shutdown,
}

type Ready = Result<(EventLoopProxy<WindowCommand>, Arc<Viewer<WgpuBackend>>)>;

/// Presentation side of the viewer: owns the window, its swapchain, and the
/// render loop on a dedicated thread.
struct WindowState {
    // Dropped before `window`; the surface holds raw handles to it.
    gpu: GpuContext,
    viewer: Arc<Viewer<WgpuBackend>>,
    window: Arc<Window>,
    config: WindowConfig,
    last_title: Instant,
}

impl WindowState {
    fn new(window: Arc<Window>, config: WindowConfig) -> Result<Self> {
        let size = window.inner_size();
        let gpu = unsafe { GpuContext::new(window.as_ref(), size, config.vsync)? };
        tracing::info!(adapter = %gpu.adapter_name, format = ?gpu.surface_format, "GPU ready");

        let backend = WgpuBackend::new(gpu.device.clone(), gpu.queue.clone(), gpu.surface_format);
        let viewer = Arc::new(Viewer::new(backend));
        viewer.set_content_mode(config.content_mode);
        viewer.set_drawable_size(gpu.size.width, gpu.size.height);

        Ok(Self {
            gpu,
            viewer,
            window,
            config,
            last_title: Instant::now(),
        })
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
        self.viewer
            .set_drawable_size(self.gpu.size.width, self.gpu.size.height);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.gpu.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        match self.viewer.render_frame(&view) {
            Ok(RenderOutcome::Drawn) => {}
            Ok(RenderOutcome::Skipped(_)) => self.viewer.backend().clear(&view),
            Err(err) => {
                tracing::error!(error = %err, "draw failed");
                self.viewer.backend().clear(&view);
            }
        }
        frame.present();
        self.refresh_title();
        Ok(())
    }

    fn refresh_title(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_title) < TITLE_INTERVAL {
            return;
        }
        self.last_title = now;

        let diagnostics = self.viewer.diagnostics();
        tracing::debug!(
            fps = diagnostics.fps,
            drawn = diagnostics.frames_drawn,
            skipped = diagnostics.frames_skipped,
            surfaces_built = diagnostics.surfaces_built,
            surfaces_reused = diagnostics.surfaces_reused,
            unaligned = diagnostics.unaligned,
            "render stats"
        );
        if self.config.show_diagnostics {
            self.window
                .set_title(&format!("{} - {}", self.config.title, diagnostics));
        }
    }
}

/// Handle to the viewer window running on its own thread.
pub struct WindowRuntime {
    proxy: EventLoopProxy<WindowCommand>,
    viewer: Arc<Viewer<WgpuBackend>>,
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl WindowRuntime {
    /// Opens the window and returns once the GPU is ready and the viewer
    /// accepts frames.
    pub fn spawn(config: WindowConfig) -> Result<Self> {
        let (ready_tx, ready_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("texview-window".into())
            .spawn(move || run_window_thread(config, ready_tx))
            .map_err(|err| anyhow!("failed to spawn window thread: {err}"))?;

        let (proxy, viewer) = ready_rx
            .recv()
            .map_err(|err| anyhow!("window thread failed to initialise: {err}"))??;

        let events = viewer.subscribe();
        let forward = proxy.clone();
        thread::Builder::new()
            .name("texview-events".into())
            .spawn(move || {
                for event in events.iter() {
                    if forward.send_event(WindowCommand::Viewer(event)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|err| anyhow!("failed to spawn event forwarder: {err}"))?;

        Ok(Self {
            proxy,
            viewer,
            join_handle: Some(handle),
        })
    }

    pub fn viewer(&self) -> Arc<Viewer<WgpuBackend>> {
        self.viewer.clone()
    }

    /// Blocks until the user closes the window.
    pub fn wait(mut self) -> Result<()> {
        match self.join_handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|err| anyhow!("window thread panicked: {err:?}"))?,
            None => Ok(()),
        }
    }

    pub fn shutdown(mut self) -> Result<()> {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.proxy.send_event(WindowCommand::Shutdown);
            handle
                .join()
                .map_err(|err| anyhow!("window thread panicked: {err:?}"))??;
        }
        Ok(())
    }
}

impl Drop for WindowRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.proxy.send_event(WindowCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

fn run_window_thread(config: WindowConfig, ready_tx: Sender<Ready>) -> Result<()> {
    let mut builder = EventLoopBuilder::<WindowCommand>::with_user_event();
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        use winit::platform::wayland::EventLoopBuilderExtWayland;
        EventLoopBuilderExtWayland::with_any_thread(&mut builder, true);
    }

    #[cfg(any(
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    }
    let event_loop = match builder.build() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            let _ = ready_tx.send(Err(anyhow!("failed to create event loop: {err}")));
            return Err(anyhow!("failed to create event loop: {err}"));
        }
    };
    let proxy = event_loop.create_proxy();

    let window = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(config.size.0, config.size.1))
        .build(&event_loop);
    let window = match window {
        Ok(window) => Arc::new(window),
        Err(err) => {
            let _ = ready_tx.send(Err(anyhow!("failed to create viewer window: {err}")));
            return Err(anyhow!("failed to create viewer window: {err}"));
        }
    };

    let mut state = match WindowState::new(window, config) {
        Ok(state) => state,
        Err(err) => {
            let wrapped = anyhow!("failed to initialise window renderer: {err:#}");
            let message = wrapped.to_string();
            let _ = ready_tx.send(Err(anyhow!(message)));
            return Err(wrapped);
        }
    };

    let _ = ready_tx.send(Ok((proxy, state.viewer.clone())));

    let run_result = event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        match event {
            Event::UserEvent(command) => match command {
                WindowCommand::Viewer(event) => {
                    tracing::trace!(?event, "viewer event");
                    state.window.request_redraw();
                }
                WindowCommand::Shutdown => {
                    elwt.exit();
                }
            },
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        elwt.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        state.resize(new_size);
                        state.window.request_redraw();
                    }
                    WindowEvent::RedrawRequested => match state.render() {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            let size = state.gpu.size;
                            state.resize(size);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            tracing::error!("surface out of memory; closing viewer");
                            elwt.exit();
                        }
                        Err(wgpu::SurfaceError::Timeout) => {
                            tracing::warn!("surface timeout; retrying next frame");
                        }
                        Err(other) => {
                            tracing::warn!(error = ?other, "surface error; retrying next frame");
                        }
                    },
                    _ => {}
                }
            }
            _ => {}
        }
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
