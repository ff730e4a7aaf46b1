use std::fmt;
use std::sync::Arc;

use crate::backend::{DrawCall, GpuBackend};
use crate::color::FragmentUniforms;
use crate::error::ViewerError;
use crate::format::FormatDescriptor;
use crate::viewport::Quad;

/// Immutable view of everything a draw needs, published by the viewer after
/// each mutation. A draw in flight keeps its snapshot alive, so later binds
/// never pull surfaces out from under it.
pub(crate) struct FrameSnapshot<B: GpuBackend> {
    pub descriptor: Option<FormatDescriptor>,
    pub pipeline: Option<Arc<B::Pipeline>>,
    pub surfaces: Vec<Arc<B::Surface>>,
    pub quad: Option<Quad>,
    pub uniforms: FragmentUniforms,
}

impl<B: GpuBackend> FrameSnapshot<B> {
    pub fn empty() -> Self {
        Self {
            descriptor: None,
            pipeline: None,
            surfaces: Vec::new(),
            quad: None,
            uniforms: FragmentUniforms::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoFormat,
    NoPipeline,
    MissingSurface,
    NoViewport,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NoFormat => "no pixel format set",
            SkipReason::NoPipeline => "no pipeline for the current format",
            SkipReason::MissingSurface => "not every plane has a surface",
            SkipReason::NoViewport => "drawable or image size is empty",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Drawn,
    Skipped(SkipReason),
}

/// Issues one draw for the snapshot, or skips when anything is missing.
pub(crate) fn draw_snapshot<B: GpuBackend>(
    backend: &B,
    target: &B::Target,
    snapshot: &FrameSnapshot<B>,
) -> Result<RenderOutcome, ViewerError> {
    let Some(descriptor) = snapshot.descriptor else {
        return Ok(RenderOutcome::Skipped(SkipReason::NoFormat));
    };
    let Some(pipeline) = snapshot.pipeline.as_deref() else {
        return Ok(RenderOutcome::Skipped(SkipReason::NoPipeline));
    };
    if snapshot.surfaces.is_empty() || snapshot.surfaces.len() != descriptor.plane_count() {
        return Ok(RenderOutcome::Skipped(SkipReason::MissingSurface));
    }
    let Some(quad) = snapshot.quad.as_ref() else {
        return Ok(RenderOutcome::Skipped(SkipReason::NoViewport));
    };

    let call = DrawCall {
        program: descriptor.program,
        pipeline,
        surfaces: &snapshot.surfaces,
        quad,
        uniforms: &snapshot.uniforms,
    };
    backend
        .draw(target, &call)
        .map_err(|err| ViewerError::Draw(format!("{err:#}")))?;
    tracing::trace!(program = ?descriptor.program, "drew frame");
    Ok(RenderOutcome::Drawn)
}
