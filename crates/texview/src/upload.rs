//! Zero-copy uploader: decides how one plane of host memory becomes a GPU
//! surface.
//!
//! Three paths exist, tried in order:
//!
//! 1. **Alias**: the plane's pages are mapped as a texture with no copy. Needs
//!    a 64-byte aligned stride, a 64-byte aligned offset into the first page,
//!    and a backend that accepts the region.
//! 2. **Buffer copy**: bytes are copied once into a GPU-owned surface.
//! 3. **Replace**: texel layouts that cannot be buffer-backed are rewritten
//!    whole on every upload.

use std::sync::OnceLock;

use crate::backend::GpuBackend;
use crate::error::ViewerError;
use crate::format::TexelFormat;
use crate::plane::PlaneView;

/// Row and offset alignment required to alias host memory as a texture.
pub const ALIAS_ALIGNMENT: usize = 64;

const FALLBACK_PAGE_SIZE: usize = 4096;

/// Page size of the running platform, queried once.
pub fn system_page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        #[cfg(unix)]
        {
            // SAFETY: sysconf has no preconditions.
            let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if size > 0 {
                return size as usize;
            }
        }
        FALLBACK_PAGE_SIZE
    })
}

/// Page-granular window of host memory that covers one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasRegion {
    /// Start of the page containing the first texel.
    pub page_start: usize,
    /// Distance from `page_start` to the first texel.
    pub offset: usize,
    /// Mapped length, a whole number of pages.
    pub length: usize,
}

impl AliasRegion {
    /// Returns `None` when the plane cannot be aliased.
    pub fn compute(address: usize, stride: usize, height: u32, page_size: usize) -> Option<Self> {
        if page_size == 0 || stride % ALIAS_ALIGNMENT != 0 {
            return None;
        }

        let offset = address % page_size;
        if offset % ALIAS_ALIGNMENT != 0 {
            return None;
        }

        let used = stride.checked_mul(height as usize)?.checked_add(offset)?;
        let length = used.div_ceil(page_size).checked_mul(page_size)?;

        Some(Self {
            page_start: address - offset,
            offset,
            length,
        })
    }
}

/// How a surface was populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadPath {
    Aliased,
    BufferCopy,
    Replaced,
}

/// Whether the caller allows surfaces to alias its memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    Copy,
    ZeroCopy,
}

pub struct Upload<S> {
    pub surface: S,
    pub path: UploadPath,
}

#[derive(Debug, Default)]
pub struct ZeroCopyUploader {
    unaligned: bool,
}

impl ZeroCopyUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a bind had to fall back to copying because of alignment, or
    /// took the per-frame replace path, until the next successful alias.
    pub fn is_unaligned(&self) -> bool {
        self.unaligned
    }

    pub fn upload<B: GpuBackend>(
        &mut self,
        backend: &B,
        plane: &PlaneView<'_>,
        texel: TexelFormat,
        mode: BindMode,
    ) -> Result<Upload<B::Surface>, ViewerError> {
        if mode == BindMode::ZeroCopy && texel.buffer_backable() {
            match AliasRegion::compute(
                plane.address(),
                plane.stride(),
                plane.height(),
                backend.page_size(),
            ) {
                Some(region) => {
                    // SAFETY: `BindMode::ZeroCopy` is only produced by
                    // `Viewer::bind_planes_zero_copy`, whose caller keeps the
                    // plane memory alive until the next bind or reset.
                    let aliased = unsafe { backend.alias_plane(&region, plane, texel) }
                        .map_err(allocation_error)?;
                    if let Some(surface) = aliased {
                        self.unaligned = false;
                        tracing::trace!(
                            page_start = region.page_start,
                            offset = region.offset,
                            length = region.length,
                            "aliased plane memory"
                        );
                        return Ok(Upload {
                            surface,
                            path: UploadPath::Aliased,
                        });
                    }
                    tracing::trace!("backend declined to alias plane; copying");
                }
                None => self.note_unaligned(plane),
            }
        }

        if texel.buffer_backable() {
            let surface = backend
                .copy_plane(plane, texel)
                .map_err(allocation_error)?;
            Ok(Upload {
                surface,
                path: UploadPath::BufferCopy,
            })
        } else {
            let surface = backend
                .replace_texels(plane, texel)
                .map_err(allocation_error)?;
            // Replaced planes are rewritten every frame whatever their alignment.
            self.note_unaligned(plane);
            Ok(Upload {
                surface,
                path: UploadPath::Replaced,
            })
        }
    }

    fn note_unaligned(&mut self, plane: &PlaneView<'_>) {
        if !self.unaligned {
            tracing::warn!(
                address = plane.address(),
                stride = plane.stride(),
                "unaligned plane buffer; falling back to copying uploads"
            );
        }
        self.unaligned = true;
    }
}

pub(crate) fn allocation_error(err: anyhow::Error) -> ViewerError {
    ViewerError::ResourceAllocation(format!("{err:#}"))
}
