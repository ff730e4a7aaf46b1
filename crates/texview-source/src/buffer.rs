use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::slice;

use anyhow::{anyhow, bail, Result};
use texview::upload::{system_page_size, AliasRegion};
use texview::{PlaneView, TexelFormat, ALIAS_ALIGNMENT};

/// Host memory for one plane, allocated on a page boundary.
///
/// Rows start every `stride` bytes. [`PlaneBuffer::new`] rounds the stride up
/// to the alias alignment so the buffer can be handed to the zero-copy bind
/// path; [`PlaneBuffer::with_layout`] takes an explicit stride and a byte
/// offset into the first page, which is how drivers that pack planes into a
/// shared allocation present them.
#[derive(Debug)]
pub struct PlaneBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
    offset: usize,
    texel: TexelFormat,
    width: u32,
    height: u32,
    stride: usize,
}

// The buffer exclusively owns its allocation.
unsafe impl Send for PlaneBuffer {}
unsafe impl Sync for PlaneBuffer {}

fn row_bytes(texel: TexelFormat, width: u32) -> Result<u32> {
    texel
        .checked_row_bytes(width)
        .ok_or_else(|| anyhow!("a {width}-pixel {texel:?} row is too large"))
}

impl PlaneBuffer {
    pub fn new(texel: TexelFormat, width: u32, height: u32) -> Result<Self> {
        let stride = (row_bytes(texel, width)? as usize)
            .checked_next_multiple_of(ALIAS_ALIGNMENT)
            .ok_or_else(|| anyhow!("a {width}-pixel {texel:?} row is too large"))?;
        Self::with_layout(texel, width, height, stride, 0)
    }

    pub fn with_layout(
        texel: TexelFormat,
        width: u32,
        height: u32,
        stride: usize,
        offset: usize,
    ) -> Result<Self> {
        let row_bytes = row_bytes(texel, width)? as usize;
        if stride < row_bytes {
            bail!("stride {stride} is shorter than a {width}-pixel {texel:?} row ({row_bytes} bytes)");
        }
        let size = stride
            .checked_mul(height as usize)
            .and_then(|len| len.checked_add(offset))
            .ok_or_else(|| anyhow!("plane of {width}x{height} with stride {stride} is too large"))?;
        let layout = Layout::from_size_align(size.max(1), system_page_size())?;

        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| anyhow!("failed to allocate {size} bytes for a plane buffer"))?;

        Ok(Self {
            ptr,
            layout,
            offset,
            texel,
            width,
            height,
            stride,
        })
    }

    pub fn texel(&self) -> TexelFormat {
        self.texel
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn bytes(&self) -> &[u8] {
        // SAFETY: `offset + stride * height` bytes were allocated and zeroed.
        unsafe {
            slice::from_raw_parts(
                self.ptr.as_ptr().add(self.offset),
                self.stride * self.height as usize,
            )
        }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in `bytes`, and `&mut self` guarantees exclusivity.
        unsafe {
            slice::from_raw_parts_mut(
                self.ptr.as_ptr().add(self.offset),
                self.stride * self.height as usize,
            )
        }
    }

    /// The pixel bytes of one row, without stride padding.
    pub fn row_mut(&mut self, row: u32) -> &mut [u8] {
        let start = row as usize * self.stride;
        let len = self.texel.row_bytes(self.width) as usize;
        &mut self.bytes_mut()[start..start + len]
    }

    pub fn view(&self) -> PlaneView<'_> {
        PlaneView::new(self.bytes(), self.width, self.height, self.stride)
    }

    /// Whether a zero-copy bind of this buffer can alias it.
    pub fn is_aligned(&self) -> bool {
        let view = self.view();
        AliasRegion::compute(view.address(), self.stride, self.height, system_page_size()).is_some()
    }
}

impl Drop for PlaneBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `with_layout` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stride_is_alias_aligned() {
        let buffer = PlaneBuffer::new(TexelFormat::R8Triplet, 30, 4).unwrap();
        assert_eq!(buffer.stride(), 128);
        assert_eq!(buffer.bytes().len(), 128 * 4);
        assert!(buffer.is_aligned());
    }

    #[test]
    fn offsets_off_the_alignment_cannot_alias() {
        let odd = PlaneBuffer::with_layout(TexelFormat::R8, 64, 2, 64, 8).unwrap();
        assert!(!odd.is_aligned());

        let shifted = PlaneBuffer::with_layout(TexelFormat::R8, 64, 2, 64, 128).unwrap();
        assert!(shifted.is_aligned());
        assert_eq!(shifted.view().address() % system_page_size(), 128);
    }

    #[test]
    fn rows_exclude_padding() {
        let mut buffer = PlaneBuffer::new(TexelFormat::Rg8, 5, 3).unwrap();
        buffer.row_mut(1).fill(7);
        let bytes = buffer.bytes();
        assert!(bytes[64..74].iter().all(|byte| *byte == 7));
        assert_eq!(bytes[74], 0);
        assert_eq!(bytes[128], 0);
    }

    #[test]
    fn stride_shorter_than_a_row_is_rejected() {
        assert!(PlaneBuffer::with_layout(TexelFormat::Rgba8, 32, 2, 64, 0).is_err());
    }

    #[test]
    fn rows_wider_than_u32_are_rejected() {
        let err = PlaneBuffer::new(TexelFormat::Rgba8, u32::MAX, 1).unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
        assert!(PlaneBuffer::with_layout(TexelFormat::R8Triplet, u32::MAX / 2, 1, 64, 0).is_err());
    }
}
