//! Backend that records what it is asked to do instead of touching a GPU.
//!
//! Used by the test suites to observe allocation counts, upload paths, and the
//! exact uniforms that reach a draw call.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::{bail, Result};

use crate::backend::{DrawCall, GpuBackend};
use crate::color::FragmentUniforms;
use crate::format::{FragmentProgram, TexelFormat};
use crate::plane::PlaneView;
use crate::upload::{system_page_size, AliasRegion, UploadPath};
use crate::viewport::Quad;

#[derive(Debug, Clone)]
pub struct HeadlessOptions {
    pub page_size: usize,
    pub allow_alias: bool,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            page_size: system_page_size(),
            allow_alias: true,
        }
    }
}

#[derive(Debug)]
pub struct HeadlessSurface {
    pub id: u64,
    pub path: UploadPath,
    pub texel: TexelFormat,
    pub width: u32,
    pub height: u32,
    pub region: Option<AliasRegion>,
    contents: Mutex<Vec<u8>>,
}

impl HeadlessSurface {
    /// Tightly packed copy of the texels; empty for aliased surfaces.
    pub fn contents(&self) -> Vec<u8> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug)]
pub struct HeadlessPipeline {
    pub program: FragmentProgram,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: FragmentProgram,
    pub surface_ids: Vec<u64>,
    /// Alias region of each bound surface; `None` for owned copies.
    pub regions: Vec<Option<AliasRegion>>,
    /// Texels each surface held when the draw was issued.
    pub contents: Vec<Vec<u8>>,
    pub quad: Quad,
    pub uniforms: FragmentUniforms,
}

#[derive(Debug, Default)]
struct Counters {
    surfaces_created: AtomicUsize,
    aliased: AtomicUsize,
    copied: AtomicUsize,
    replaced: AtomicUsize,
    refreshes: AtomicUsize,
    pipelines_built: AtomicUsize,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    options: HeadlessOptions,
    next_id: AtomicU64,
    fail_allocations: AtomicBool,
    counters: Counters,
    draws: Mutex<Vec<DrawRecord>>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(HeadlessOptions::default())
    }
}

impl HeadlessBackend {
    pub fn new(options: HeadlessOptions) -> Self {
        Self {
            options,
            next_id: AtomicU64::new(1),
            fail_allocations: AtomicBool::new(false),
            counters: Counters::default(),
            draws: Mutex::new(Vec::new()),
        }
    }

    /// Makes every following allocation fail, as if the device ran out of
    /// memory.
    pub fn set_fail_allocations(&self, fail: bool) {
        self.fail_allocations.store(fail, Ordering::SeqCst);
    }

    pub fn surfaces_created(&self) -> usize {
        self.counters.surfaces_created.load(Ordering::SeqCst)
    }

    pub fn surfaces_for(&self, path: UploadPath) -> usize {
        let counter = match path {
            UploadPath::Aliased => &self.counters.aliased,
            UploadPath::BufferCopy => &self.counters.copied,
            UploadPath::Replaced => &self.counters.replaced,
        };
        counter.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.counters.refreshes.load(Ordering::SeqCst)
    }

    pub fn pipelines_built(&self) -> usize {
        self.counters.pipelines_built.load(Ordering::SeqCst)
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.draws
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_draw(&self) -> Option<DrawRecord> {
        self.draws
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    fn allocate(
        &self,
        plane: &PlaneView<'_>,
        texel: TexelFormat,
        path: UploadPath,
        region: Option<AliasRegion>,
    ) -> Result<HeadlessSurface> {
        if self.fail_allocations.load(Ordering::SeqCst) {
            bail!(
                "out of memory allocating {}x{} {:?} surface",
                plane.width(),
                plane.height(),
                texel
            );
        }

        let contents = match path {
            UploadPath::Aliased => Vec::new(),
            UploadPath::BufferCopy | UploadPath::Replaced => pack_rows(plane, texel),
        };
        let counter = match path {
            UploadPath::Aliased => &self.counters.aliased,
            UploadPath::BufferCopy => &self.counters.copied,
            UploadPath::Replaced => &self.counters.replaced,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.counters.surfaces_created.fetch_add(1, Ordering::SeqCst);

        Ok(HeadlessSurface {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            path,
            texel,
            width: plane.width(),
            height: plane.height(),
            region,
            contents: Mutex::new(contents),
        })
    }
}

fn pack_rows(plane: &PlaneView<'_>, texel: TexelFormat) -> Vec<u8> {
    let row_bytes = texel.row_bytes(plane.width()) as usize;
    let mut packed = Vec::with_capacity(row_bytes * plane.height() as usize);
    for row in 0..plane.height() as usize {
        let start = row * plane.stride();
        packed.extend_from_slice(&plane.bytes()[start..start + row_bytes]);
    }
    packed
}

impl GpuBackend for HeadlessBackend {
    type Surface = HeadlessSurface;
    type Pipeline = HeadlessPipeline;
    type Target = ();

    fn page_size(&self) -> usize {
        self.options.page_size
    }

    unsafe fn alias_plane(
        &self,
        region: &AliasRegion,
        plane: &PlaneView<'_>,
        texel: TexelFormat,
    ) -> Result<Option<Self::Surface>> {
        if !self.options.allow_alias || !texel.buffer_backable() {
            return Ok(None);
        }
        self.allocate(plane, texel, UploadPath::Aliased, Some(*region))
            .map(Some)
    }

    fn copy_plane(&self, plane: &PlaneView<'_>, texel: TexelFormat) -> Result<Self::Surface> {
        self.allocate(plane, texel, UploadPath::BufferCopy, None)
    }

    fn replace_texels(&self, plane: &PlaneView<'_>, texel: TexelFormat) -> Result<Self::Surface> {
        self.allocate(plane, texel, UploadPath::Replaced, None)
    }

    fn refresh(
        &self,
        surface: &Self::Surface,
        plane: &PlaneView<'_>,
        texel: TexelFormat,
    ) -> Result<()> {
        if surface.width != plane.width() || surface.height != plane.height() {
            bail!(
                "refresh geometry {}x{} does not match surface {}x{}",
                plane.width(),
                plane.height(),
                surface.width,
                surface.height
            );
        }
        *surface
            .contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = pack_rows(plane, texel);
        self.counters.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn build_pipeline(&self, program: FragmentProgram) -> Result<Self::Pipeline> {
        self.counters.pipelines_built.fetch_add(1, Ordering::SeqCst);
        Ok(HeadlessPipeline { program })
    }

    fn draw(&self, _target: &(), call: &DrawCall<'_, Self>) -> Result<()> {
        let record = DrawRecord {
            program: call.pipeline.program,
            surface_ids: call.surfaces.iter().map(|surface| surface.id).collect(),
            regions: call.surfaces.iter().map(|surface| surface.region).collect(),
            contents: call.surfaces.iter().map(|surface| surface.contents()).collect(),
            quad: *call.quad,
            uniforms: *call.uniforms,
        };
        self.draws
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}
