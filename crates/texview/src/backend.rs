use std::sync::Arc;

use anyhow::Result;

use crate::color::FragmentUniforms;
use crate::format::{FragmentProgram, TexelFormat};
use crate::plane::PlaneView;
use crate::upload::AliasRegion;
use crate::viewport::Quad;

/// Everything one draw needs, borrowed from a published frame snapshot.
pub struct DrawCall<'a, B: GpuBackend + ?Sized> {
    pub program: FragmentProgram,
    pub pipeline: &'a B::Pipeline,
    /// One surface per plane, in texture slot order.
    pub surfaces: &'a [Arc<B::Surface>],
    pub quad: &'a Quad,
    pub uniforms: &'a FragmentUniforms,
}

/// GPU operations the viewer needs. Implemented by the wgpu backend used on
/// screen and by [`crate::headless::HeadlessBackend`] for tests.
///
/// Methods take `&self` and may be called from the producer thread (surface
/// creation) and the presentation thread (`draw`) at the same time.
pub trait GpuBackend: Send + Sync + 'static {
    type Surface: Send + Sync + 'static;
    type Pipeline: Send + Sync + 'static;
    type Target: ?Sized;

    /// Page size used to compute alias regions.
    fn page_size(&self) -> usize;

    /// Wraps host memory as a texture without copying. `Ok(None)` means the
    /// backend cannot alias this region and the caller should copy instead.
    ///
    /// # Safety
    ///
    /// The memory described by `region` must stay valid, and must not be
    /// freed, until the returned surface is replaced by a later bind or
    /// dropped by a reset.
    unsafe fn alias_plane(
        &self,
        region: &AliasRegion,
        plane: &PlaneView<'_>,
        texel: TexelFormat,
    ) -> Result<Option<Self::Surface>>;

    /// Allocates a GPU-private surface and copies the plane into it once.
    fn copy_plane(&self, plane: &PlaneView<'_>, texel: TexelFormat) -> Result<Self::Surface>;

    /// Allocates a surface for a texel layout that cannot be buffer-backed
    /// and writes every texel into it.
    fn replace_texels(&self, plane: &PlaneView<'_>, texel: TexelFormat) -> Result<Self::Surface>;

    /// Rewrites the contents of an owned surface from a plane with the same
    /// geometry, without reallocating.
    fn refresh(
        &self,
        surface: &Self::Surface,
        plane: &PlaneView<'_>,
        texel: TexelFormat,
    ) -> Result<()>;

    fn build_pipeline(&self, program: FragmentProgram) -> Result<Self::Pipeline>;

    fn draw(&self, target: &Self::Target, call: &DrawCall<'_, Self>) -> Result<()>;
}
