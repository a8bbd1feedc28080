//! Remote frame buffer and its publication to the render path.
//!
//! | Module   | Purpose                                              |
//! |----------|------------------------------------------------------|
//! | `buffer` | `FrameBuffer`, pixel formats and regions             |
//! | `sync`   | `FrameSync`: staging/publish pipeline, diagnostics   |

pub mod buffer;
pub mod sync;

pub use buffer::{FrameBuffer, PixelFormat, Region};
pub use sync::{DisplaySurface, FrameStats, FrameSync};
