use texview::color::{
    FULL_RANGE_MATRIX, FULL_RANGE_OFFSETS, IDENTITY_MATRIX, VIDEO_RANGE_MATRIX,
    VIDEO_RANGE_OFFSETS,
};
use texview::headless::{HeadlessBackend, HeadlessOptions};
use texview::{
    fourcc, ContentMode, PixelFormat, PlaneView, RenderOutcome, SkipReason, UploadPath, Viewer,
    ViewerError, ViewerEvent,
};

const PAGE: usize = 4096;

fn viewer() -> Viewer<HeadlessBackend> {
    Viewer::new(HeadlessBackend::new(HeadlessOptions {
        page_size: PAGE,
        allow_alias: true,
    }))
}

fn configured(format: PixelFormat, width: u32, height: u32) -> Viewer<HeadlessBackend> {
    let viewer = viewer();
    viewer.set_pixel_format(format.code()).unwrap();
    viewer.set_source_image_size(width, height);
    viewer.set_drawable_size(width, height);
    viewer
}

/// Heap bytes whose usable window starts on a 64-byte boundary.
struct AlignedBytes {
    storage: Vec<u8>,
    start: usize,
    len: usize,
}

impl AlignedBytes {
    fn new(len: usize) -> Self {
        let storage = vec![0x80u8; len + 128];
        let start = storage.as_ptr().align_offset(64);
        Self {
            storage,
            start,
            len,
        }
    }

    fn aligned(&self) -> &[u8] {
        &self.storage[self.start..self.start + self.len]
    }

    fn misaligned(&self) -> &[u8] {
        &self.storage[self.start + 1..self.start + 1 + self.len]
    }
}

fn bgra(width: u32, height: u32) -> Vec<u8> {
    vec![0xffu8; (width * height * 4) as usize]
}

fn drawn(viewer: &Viewer<HeadlessBackend>) -> RenderOutcome {
    viewer.render_frame(&()).unwrap()
}

#[test]
fn rebinding_the_same_buffer_reuses_its_surface() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let pixels = bgra(16, 4);
    let plane = PlaneView::new(&pixels, 16, 4, 64);

    let first = viewer.bind_planes(&[plane]).unwrap();
    assert_eq!(first.rebuilt, 1);
    assert_eq!(first.paths, vec![UploadPath::BufferCopy]);

    let second = viewer.bind_planes(&[plane]).unwrap();
    assert_eq!(second.rebuilt, 0);
    assert_eq!(second.reused, 1);

    let backend = viewer.backend();
    assert_eq!(backend.surfaces_created(), 1);
    assert_eq!(backend.refreshes(), 1);
}

#[test]
fn alternating_buffers_rebuild_on_every_switch() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let a = bgra(16, 4);
    let b = bgra(16, 4);

    for pixels in [&a, &b, &a] {
        let report = viewer
            .bind_planes(&[PlaneView::new(pixels, 16, 4, 64)])
            .unwrap();
        assert_eq!(report.rebuilt, 1);
    }
    assert_eq!(viewer.backend().surfaces_created(), 3);
}

#[test]
fn same_address_with_new_geometry_rebuilds() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let pixels = bgra(16, 4);
    viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 4, 64)])
        .unwrap();

    viewer.set_source_image_size(8, 4);
    let report = viewer
        .bind_planes(&[PlaneView::new(&pixels, 8, 4, 64)])
        .unwrap();
    assert_eq!(report.rebuilt, 1);
    assert_eq!(viewer.backend().refreshes(), 0);
}

#[test]
fn format_change_drops_old_surfaces() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let pixels = bgra(16, 4);
    viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 4, 64)])
        .unwrap();
    assert_eq!(drawn(&viewer), RenderOutcome::Drawn);

    viewer
        .set_pixel_format(PixelFormat::BiPlanar420Video.code())
        .unwrap();
    assert_eq!(
        drawn(&viewer),
        RenderOutcome::Skipped(SkipReason::MissingSurface)
    );

    let err = viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 4, 64)])
        .unwrap_err();
    assert_eq!(
        err,
        ViewerError::PlaneCountMismatch {
            expected: 2,
            actual: 1
        }
    );
    assert_eq!(
        drawn(&viewer),
        RenderOutcome::Skipped(SkipReason::MissingSurface)
    );
    assert_eq!(viewer.backend().draws().len(), 1);
}

#[test]
fn empty_plane_list_is_a_count_mismatch() {
    let viewer = configured(PixelFormat::Planar420Full, 8, 8);
    let err = viewer.bind_planes(&[]).unwrap_err();
    assert_eq!(
        err,
        ViewerError::PlaneCountMismatch {
            expected: 3,
            actual: 0
        }
    );
}

#[test]
fn ycbcr_ranges_select_their_matrices() {
    let luma = vec![16u8; 8 * 8];
    let chroma = vec![128u8; 4 * 4 * 2];
    let planes = [
        PlaneView::new(&luma, 8, 8, 8),
        PlaneView::new(&chroma, 4, 4, 8),
    ];

    let viewer = configured(PixelFormat::BiPlanar420Video, 8, 8);
    viewer.bind_planes(&planes).unwrap();
    assert_eq!(drawn(&viewer), RenderOutcome::Drawn);
    let uniforms = viewer.backend().last_draw().unwrap().uniforms;
    assert_eq!(uniforms.color_matrix, VIDEO_RANGE_MATRIX);
    assert_eq!(uniforms.offsets, VIDEO_RANGE_OFFSETS);

    viewer
        .set_pixel_format(PixelFormat::BiPlanar420Full.code())
        .unwrap();
    viewer.bind_planes(&planes).unwrap();
    assert_eq!(drawn(&viewer), RenderOutcome::Drawn);
    let uniforms = viewer.backend().last_draw().unwrap().uniforms;
    assert_eq!(uniforms.color_matrix, FULL_RANGE_MATRIX);
    assert_eq!(uniforms.offsets, FULL_RANGE_OFFSETS);
}

#[test]
fn packed_ycbcra_ranges_follow_their_format() {
    let pixels = vec![0x80u8; 8 * 4 * 4];
    let planes = [PlaneView::new(&pixels, 8, 4, 32)];

    let viewer = configured(PixelFormat::YCbCrA4444, 8, 4);
    viewer.bind_planes(&planes).unwrap();
    assert_eq!(drawn(&viewer), RenderOutcome::Drawn);
    let uniforms = viewer.backend().last_draw().unwrap().uniforms;
    assert_eq!(uniforms.color_matrix, FULL_RANGE_MATRIX);
    assert_eq!(uniforms.offsets, FULL_RANGE_OFFSETS);

    viewer
        .set_pixel_format(PixelFormat::AYCbCr4444.code())
        .unwrap();
    viewer.bind_planes(&planes).unwrap();
    assert_eq!(drawn(&viewer), RenderOutcome::Drawn);
    let uniforms = viewer.backend().last_draw().unwrap().uniforms;
    assert_eq!(uniforms.color_matrix, VIDEO_RANGE_MATRIX);
    assert_eq!(uniforms.offsets, VIDEO_RANGE_OFFSETS);
}

#[test]
fn packed_rgb_uses_permutation_not_matrix() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let pixels = bgra(16, 4);
    viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 4, 64)])
        .unwrap();
    drawn(&viewer);

    let uniforms = viewer.backend().last_draw().unwrap().uniforms;
    assert_eq!(uniforms.permute, [2, 1, 0, 3]);
    assert_eq!(uniforms.color_matrix, IDENTITY_MATRIX);
    assert_eq!(uniforms.offsets, [0.0; 4]);
}

#[test]
fn sixteen_bit_formats_pass_their_layout_and_size() {
    let viewer = configured(PixelFormat::Rgb565, 8, 2);
    let pixels = vec![0u8; 8 * 2 * 2];
    viewer
        .bind_planes(&[PlaneView::new(&pixels, 8, 2, 16)])
        .unwrap();
    drawn(&viewer);

    let uniforms = viewer.backend().last_draw().unwrap().uniforms;
    assert_eq!(uniforms.texel_info, [2, 8, 2, 0]);
}

#[test]
fn reset_skips_the_next_frame() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let pixels = bgra(16, 4);
    viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 4, 64)])
        .unwrap();
    assert_eq!(drawn(&viewer), RenderOutcome::Drawn);

    viewer.reset();
    assert_eq!(drawn(&viewer), RenderOutcome::Skipped(SkipReason::NoFormat));
    assert_eq!(viewer.diagnostics().frames_skipped, 1);
}

#[test]
fn binding_requires_format_and_size() {
    let viewer = viewer();
    let pixels = bgra(16, 4);
    let plane = PlaneView::new(&pixels, 16, 4, 64);
    assert_eq!(
        viewer.bind_planes(&[plane]).unwrap_err(),
        ViewerError::NotConfigured
    );

    viewer.set_pixel_format(PixelFormat::Bgra32.code()).unwrap();
    assert_eq!(
        viewer.bind_planes(&[plane]).unwrap_err(),
        ViewerError::NotConfigured
    );

    viewer.set_source_image_size(16, 4);
    assert!(viewer.bind_planes(&[plane]).is_ok());
}

#[test]
fn unknown_format_leaves_the_viewer_untouched() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let pixels = bgra(16, 4);
    viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 4, 64)])
        .unwrap();

    let err = viewer.set_pixel_format(fourcc(b"zzzz")).unwrap_err();
    assert!(matches!(err, ViewerError::UnsupportedFormat(_)));
    assert_eq!(err.to_string(), "unsupported pixel format 'zzzz'");

    assert_eq!(drawn(&viewer), RenderOutcome::Drawn);
    assert_eq!(
        viewer.diagnostics().format,
        Some(PixelFormat::Bgra32)
    );
}

#[test]
fn short_plane_is_rejected_before_any_upload() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let pixels = vec![0u8; 64 * 3];
    let err = viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 4, 64)])
        .unwrap_err();
    assert_eq!(
        err,
        ViewerError::PlaneTooSmall {
            plane: 0,
            required: 256,
            actual: 192
        }
    );
    assert_eq!(viewer.backend().surfaces_created(), 0);
}

#[test]
fn allocation_failure_keeps_the_previous_frame() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let first = bgra(16, 4);
    let second = bgra(16, 4);
    viewer
        .bind_planes(&[PlaneView::new(&first, 16, 4, 64)])
        .unwrap();
    drawn(&viewer);
    let before = viewer.backend().last_draw().unwrap().surface_ids;

    viewer.backend().set_fail_allocations(true);
    let err = viewer
        .bind_planes(&[PlaneView::new(&second, 16, 4, 64)])
        .unwrap_err();
    assert!(matches!(err, ViewerError::ResourceAllocation(_)));
    drawn(&viewer);
    assert_eq!(viewer.backend().last_draw().unwrap().surface_ids, before);

    viewer.backend().set_fail_allocations(false);
    viewer
        .bind_planes(&[PlaneView::new(&second, 16, 4, 64)])
        .unwrap();
    drawn(&viewer);
    assert_ne!(viewer.backend().last_draw().unwrap().surface_ids, before);
}

#[test]
fn failed_plane_leaves_every_slot_unchanged() {
    let viewer = configured(PixelFormat::Planar420Video, 8, 8);
    let luma = vec![16u8; 64];
    let cb = vec![128u8; 16];
    let cr = vec![128u8; 16];
    let planes = [
        PlaneView::new(&luma, 8, 8, 8),
        PlaneView::new(&cb, 4, 4, 4),
        PlaneView::new(&cr, 4, 4, 4),
    ];
    viewer.bind_planes(&planes).unwrap();
    drawn(&viewer);
    let before = viewer.backend().last_draw().unwrap().surface_ids;

    let other_luma = vec![16u8; 64];
    viewer.backend().set_fail_allocations(true);
    let moved = [
        PlaneView::new(&other_luma, 8, 8, 8),
        PlaneView::new(&cb, 4, 4, 4),
        PlaneView::new(&cr, 4, 4, 4),
    ];
    assert!(viewer.bind_planes(&moved).is_err());
    drawn(&viewer);
    assert_eq!(viewer.backend().last_draw().unwrap().surface_ids, before);
}

#[test]
fn failed_last_plane_leaves_refreshable_planes_untouched() {
    let viewer = configured(PixelFormat::BiPlanar420Full, 8, 8);
    let mut luma = vec![1u8; 64];
    let chroma = vec![1u8; 32];
    viewer
        .bind_planes(&[
            PlaneView::new(&luma, 8, 8, 8),
            PlaneView::new(&chroma, 4, 4, 8),
        ])
        .unwrap();
    drawn(&viewer);
    let before = viewer.backend().last_draw().unwrap();

    // Same luma buffer with new texels, chroma moved to a new buffer.
    luma.fill(9);
    let moved_chroma = vec![2u8; 32];
    viewer.backend().set_fail_allocations(true);
    let err = viewer
        .bind_planes(&[
            PlaneView::new(&luma, 8, 8, 8),
            PlaneView::new(&moved_chroma, 4, 4, 8),
        ])
        .unwrap_err();
    assert!(matches!(err, ViewerError::ResourceAllocation(_)));
    assert_eq!(viewer.backend().refreshes(), 0);

    drawn(&viewer);
    let after = viewer.backend().last_draw().unwrap();
    assert_eq!(after.surface_ids, before.surface_ids);
    assert_eq!(after.contents, before.contents);
    assert!(after.contents[0].iter().all(|&texel| texel == 1));

    viewer.backend().set_fail_allocations(false);
    viewer
        .bind_planes(&[
            PlaneView::new(&luma, 8, 8, 8),
            PlaneView::new(&moved_chroma, 4, 4, 8),
        ])
        .unwrap();
    drawn(&viewer);
    let recovered = viewer.backend().last_draw().unwrap();
    assert_eq!(recovered.surface_ids[0], before.surface_ids[0]);
    assert!(recovered.contents[0].iter().all(|&texel| texel == 9));
    assert!(recovered.contents[1].iter().all(|&texel| texel == 2));
}

#[test]
fn aligned_planes_are_aliased_without_copying() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let bytes = AlignedBytes::new(64 * 4);
    let plane = PlaneView::new(bytes.aligned(), 16, 4, 64);

    let report = unsafe { viewer.bind_planes_zero_copy(&[plane]) }.unwrap();
    assert_eq!(report.paths, vec![UploadPath::Aliased]);
    let again = unsafe { viewer.bind_planes_zero_copy(&[plane]) }.unwrap();
    assert_eq!(again.reused, 1);

    let backend = viewer.backend();
    assert_eq!(backend.surfaces_for(UploadPath::Aliased), 1);
    assert_eq!(backend.refreshes(), 0);
    assert!(!viewer.diagnostics().unaligned);

    drawn(&viewer);
    let region = backend.last_draw().unwrap().regions[0].unwrap();
    assert_eq!(region.offset, plane.address() % PAGE);
    assert_eq!(region.page_start + region.offset, plane.address());
    assert_eq!(region.length % PAGE, 0);
    assert!(region.length >= region.offset + 64 * 4);
}

#[test]
fn misaligned_planes_fall_back_and_are_flagged() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let bytes = AlignedBytes::new(64 * 4);

    let misaligned = PlaneView::new(bytes.misaligned(), 16, 4, 64);
    let report = unsafe { viewer.bind_planes_zero_copy(&[misaligned]) }.unwrap();
    assert_eq!(report.paths, vec![UploadPath::BufferCopy]);
    let diagnostics = viewer.diagnostics();
    assert!(diagnostics.unaligned);
    assert!(diagnostics.to_string().ends_with(", UNALIGNED"));

    let aligned = PlaneView::new(bytes.aligned(), 16, 4, 64);
    let report = unsafe { viewer.bind_planes_zero_copy(&[aligned]) }.unwrap();
    assert_eq!(report.paths, vec![UploadPath::Aliased]);
    assert!(!viewer.diagnostics().unaligned);
}

#[test]
fn stride_off_the_alignment_copies() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let bytes = AlignedBytes::new(80 * 4);
    let plane = PlaneView::new(bytes.aligned(), 16, 4, 80);

    let report = unsafe { viewer.bind_planes_zero_copy(&[plane]) }.unwrap();
    assert_eq!(report.paths, vec![UploadPath::BufferCopy]);
    assert!(viewer.diagnostics().unaligned);
}

#[test]
fn packed_422_is_always_replaced() {
    let viewer = configured(PixelFormat::YCbCr422, 16, 4);
    let bytes = AlignedBytes::new(64 * 4);
    let plane = PlaneView::new(bytes.aligned(), 16, 4, 64);

    let report = unsafe { viewer.bind_planes_zero_copy(&[plane]) }.unwrap();
    assert_eq!(report.paths, vec![UploadPath::Replaced]);
    assert_eq!(viewer.backend().surfaces_for(UploadPath::Aliased), 0);
    assert!(viewer.diagnostics().unaligned);
}

#[test]
fn replaced_planes_raise_the_unaligned_flag_on_safe_binds() {
    let viewer = configured(PixelFormat::YCbCr422, 16, 4);
    let pixels = vec![0x80u8; 32 * 4];
    let report = viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 4, 32)])
        .unwrap();
    assert_eq!(report.paths, vec![UploadPath::Replaced]);
    let diagnostics = viewer.diagnostics();
    assert!(diagnostics.unaligned);
    assert!(diagnostics.to_string().ends_with(", UNALIGNED"));

    viewer.set_pixel_format(PixelFormat::Bgra32.code()).unwrap();
    let bytes = AlignedBytes::new(64 * 4);
    let plane = PlaneView::new(bytes.aligned(), 16, 4, 64);
    let report = unsafe { viewer.bind_planes_zero_copy(&[plane]) }.unwrap();
    assert_eq!(report.paths, vec![UploadPath::Aliased]);
    assert!(!viewer.diagnostics().unaligned);
}

#[test]
fn safe_binds_never_alias() {
    let viewer = configured(PixelFormat::Bgra32, 16, 4);
    let bytes = AlignedBytes::new(64 * 4);
    let report = viewer
        .bind_planes(&[PlaneView::new(bytes.aligned(), 16, 4, 64)])
        .unwrap();
    assert_eq!(report.paths, vec![UploadPath::BufferCopy]);
    assert_eq!(viewer.backend().surfaces_for(UploadPath::Aliased), 0);
}

#[test]
fn declined_alias_copies_without_the_unaligned_flag() {
    let viewer = Viewer::new(HeadlessBackend::new(HeadlessOptions {
        page_size: PAGE,
        allow_alias: false,
    }));
    viewer.set_pixel_format(PixelFormat::Bgra32.code()).unwrap();
    viewer.set_source_image_size(16, 4);

    let bytes = AlignedBytes::new(64 * 4);
    let report = unsafe {
        viewer.bind_planes_zero_copy(&[PlaneView::new(bytes.aligned(), 16, 4, 64)])
    }
    .unwrap();
    assert_eq!(report.paths, vec![UploadPath::BufferCopy]);
    assert!(!viewer.diagnostics().unaligned);
}

#[test]
fn pipelines_are_built_once_per_program() {
    let viewer = viewer();
    for format in [
        PixelFormat::Bgra32,
        PixelFormat::Rgba32,
        PixelFormat::BiPlanar420Video,
        PixelFormat::BiPlanar420Full,
        PixelFormat::Bgra32,
    ] {
        viewer.set_pixel_format(format.code()).unwrap();
    }
    assert_eq!(viewer.backend().pipelines_built(), 2);
}

#[test]
fn content_mode_places_the_quad() {
    let viewer = configured(PixelFormat::Bgra32, 16, 16);
    viewer.set_drawable_size(32, 16);
    let pixels = bgra(16, 16);
    viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 16, 64)])
        .unwrap();

    drawn(&viewer);
    let left = viewer.backend().last_draw().unwrap().quad.vertices[0].position[0];
    assert!((left + 0.5).abs() < 1e-6, "{left}");

    viewer.set_content_mode(ContentMode::ScaleToFill);
    drawn(&viewer);
    let left = viewer.backend().last_draw().unwrap().quad.vertices[0].position[0];
    assert!((left + 1.0).abs() < 1e-6, "{left}");
}

#[test]
fn missing_drawable_size_skips() {
    let viewer = viewer();
    viewer.set_pixel_format(PixelFormat::Bgra32.code()).unwrap();
    viewer.set_source_image_size(16, 4);
    let pixels = bgra(16, 4);
    viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 4, 64)])
        .unwrap();
    assert_eq!(
        drawn(&viewer),
        RenderOutcome::Skipped(SkipReason::NoViewport)
    );
}

#[test]
fn subscribers_see_configuration_and_frames() {
    let viewer = viewer();
    let events = viewer.subscribe();

    viewer.set_pixel_format(PixelFormat::Bgra32.code()).unwrap();
    viewer.set_pixel_format(PixelFormat::Bgra32.code()).unwrap();
    viewer.set_source_image_size(16, 4);
    let pixels = bgra(16, 4);
    viewer
        .bind_planes(&[PlaneView::new(&pixels, 16, 4, 64)])
        .unwrap();
    viewer.reset();

    let seen: Vec<ViewerEvent> = events.try_iter().collect();
    assert_eq!(
        seen,
        vec![
            ViewerEvent::FormatChanged(PixelFormat::Bgra32),
            ViewerEvent::SourceSizeChanged {
                width: 16,
                height: 4
            },
            ViewerEvent::FrameBound {
                rebuilt: 1,
                reused: 0
            },
            ViewerEvent::Reset,
        ]
    );
}
