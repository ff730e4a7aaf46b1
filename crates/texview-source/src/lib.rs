//! Frame sources for the texview viewer.
//!
//! [`StillImageSource`] decodes an image file and binds it once.
//! [`SyntheticCamera`] stands in for a capture device: it renders a moving
//! pattern into a small ring of page-aligned [`PlaneBuffer`]s and binds each
//! frame, aliasing the memory when the ring allows it.

pub mod buffer;
pub mod camera;
pub mod convert;
pub mod still;

pub use buffer::PlaneBuffer;
pub use camera::{CameraConfig, SyntheticCamera};
pub use convert::{convert, FrameImage};
pub use still::StillImageSource;
