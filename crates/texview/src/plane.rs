use crate::error::ViewerError;
use crate::format::TexelFormat;

/// Borrowed view of one plane of a frame.
///
/// The view never owns the pixels. Through the safe bind path the bytes are
/// copied before the call returns; through the zero-copy path the caller
/// promises the memory stays valid until the next bind on the same viewer.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    bytes: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> PlaneView<'a> {
    pub fn new(bytes: &'a [u8], width: u32, height: u32, stride: usize) -> Self {
        Self {
            bytes,
            width,
            height,
            stride,
        }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
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

    pub fn address(&self) -> usize {
        self.bytes.as_ptr() as usize
    }

    pub fn fingerprint(&self) -> PlaneFingerprint {
        PlaneFingerprint {
            address: self.address(),
            len: self.bytes.len(),
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }

    /// Checks that the slice covers every row the texel layout will read.
    pub(crate) fn validate(&self, index: usize, texel: TexelFormat) -> Result<(), ViewerError> {
        let too_small = |required: usize| ViewerError::PlaneTooSmall {
            plane: index,
            required,
            actual: self.bytes.len(),
        };
        let row_bytes = texel
            .checked_row_bytes(self.width)
            .ok_or_else(|| too_small(usize::MAX))? as usize;
        let required = match self.height {
            0 => Some(0),
            rows => self
                .stride
                .checked_mul(rows as usize - 1)
                .and_then(|bytes| bytes.checked_add(row_bytes)),
        };
        match required {
            Some(required) if self.stride >= row_bytes && self.bytes.len() >= required => Ok(()),
            required => Err(too_small(required.unwrap_or(usize::MAX).max(row_bytes))),
        }
    }
}

/// Identity of a plane's backing memory and geometry.
///
/// Two binds with equal fingerprints point at the same memory laid out the
/// same way, so the surface built for the first one can be reused. The
/// address alone is not enough: a driver may hand back the same buffer with
/// a different geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneFingerprint {
    pub address: usize,
    pub len: usize,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
}
