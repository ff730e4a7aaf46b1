use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::error::ViewerError;
use crate::format::FormatDescriptor;
use crate::plane::{PlaneFingerprint, PlaneView};
use crate::upload::{allocation_error, BindMode, Upload, UploadPath, ZeroCopyUploader};

/// Outcome of one bind, per plane in slot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    pub rebuilt: usize,
    pub reused: usize,
    pub paths: Vec<UploadPath>,
}

struct SurfaceSlot<S> {
    fingerprint: PlaneFingerprint,
    surface: Arc<S>,
    path: UploadPath,
}

enum Prepared<S> {
    Keep {
        surface: Arc<S>,
        path: UploadPath,
        refresh: bool,
    },
    Built(Upload<S>),
}

/// Keeps the most recently built surface for each plane slot.
///
/// Only one surface per slot is cached: a source alternating between two
/// buffers rebuilds on every switch.
pub(crate) struct FrameBinder<S> {
    slots: Vec<SurfaceSlot<S>>,
}

impl<S> Default for FrameBinder<S> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<S> FrameBinder<S> {
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn surfaces(&self) -> Vec<Arc<S>> {
        self.slots.iter().map(|slot| slot.surface.clone()).collect()
    }

    /// Builds or reuses one surface per plane. Either every slot is updated or,
    /// on error, none are.
    pub fn bind<B>(
        &mut self,
        backend: &B,
        uploader: &mut ZeroCopyUploader,
        descriptor: &FormatDescriptor,
        planes: &[PlaneView<'_>],
        mode: BindMode,
    ) -> Result<BindReport, ViewerError>
    where
        B: GpuBackend<Surface = S>,
    {
        let expected = descriptor.plane_count();
        if planes.len() != expected {
            tracing::error!(
                format = %descriptor.format,
                expected,
                actual = planes.len(),
                "plane count does not match pixel format"
            );
            return Err(ViewerError::PlaneCountMismatch {
                expected,
                actual: planes.len(),
            });
        }

        for (index, (plane, layout)) in planes.iter().zip(descriptor.planes).enumerate() {
            plane.validate(index, layout.texel)?;
        }

        // Surfaces still valid for their plane; `None` needs a new one.
        let retained: Vec<Option<Prepared<S>>> = planes
            .iter()
            .enumerate()
            .map(|(index, plane)| {
                let slot = self
                    .slots
                    .get(index)
                    .filter(|slot| slot.fingerprint == plane.fingerprint())?;
                let aliased = slot.path == UploadPath::Aliased;
                if aliased && mode == BindMode::Copy {
                    return None;
                }
                Some(Prepared::Keep {
                    surface: slot.surface.clone(),
                    path: slot.path,
                    refresh: !aliased,
                })
            })
            .collect();

        // Allocate before touching any retained surface, so a failed
        // allocation leaves the bound frame exactly as it was.
        let mut prepared = Vec::with_capacity(expected);
        for (index, ((plane, layout), retained)) in planes
            .iter()
            .zip(descriptor.planes)
            .zip(retained)
            .enumerate()
        {
            if let Some(keep) = retained {
                prepared.push(keep);
                continue;
            }
            let upload = uploader.upload(backend, plane, layout.texel, mode)?;
            tracing::debug!(
                plane = index,
                width = plane.width(),
                height = plane.height(),
                stride = plane.stride(),
                path = ?upload.path,
                "built plane surface"
            );
            prepared.push(Prepared::Built(upload));
        }

        for (index, ((plane, layout), entry)) in planes
            .iter()
            .zip(descriptor.planes)
            .zip(&prepared)
            .enumerate()
        {
            match entry {
                Prepared::Keep {
                    surface,
                    path,
                    refresh: true,
                } => {
                    backend
                        .refresh(surface, plane, layout.texel)
                        .map_err(allocation_error)?;
                    tracing::trace!(plane = index, ?path, "refreshed surface in place");
                }
                Prepared::Keep { .. } => tracing::trace!(plane = index, "reusing aliased surface"),
                Prepared::Built(_) => {}
            }
        }

        let mut staged = Vec::with_capacity(expected);
        let mut report = BindReport::default();
        for (plane, entry) in planes.iter().zip(prepared) {
            let (surface, path) = match entry {
                Prepared::Keep { surface, path, .. } => {
                    report.reused += 1;
                    (surface, path)
                }
                Prepared::Built(upload) => {
                    report.rebuilt += 1;
                    (Arc::new(upload.surface), upload.path)
                }
            };
            report.paths.push(path);
            staged.push(SurfaceSlot {
                fingerprint: plane.fingerprint(),
                surface,
                path,
            });
        }

        self.slots = staged;
        Ok(report)
    }
}
