//! Audio/Video buffers for emuhost-core.
//!
//! This module implements the "core pushes, host drains" model.
//!
//! - Video: the core hands over one frame per step through the video-refresh
//!   callback. The host copies it (dropping scanline padding) into a
//!   [`FrameBuffer`], which the runner later copies into the caller's surface.
//!
//! - Audio: the core pushes interleaved stereo i16 samples one pair or one batch
//!   at a time into an [`AudioSampleQueue`]. After each step the runner copies as
//!   much as fits into the caller's sink and clears the queue.
//!
//! Notes / limitations (current):
//! - The frame buffer is not double-buffered; a resize discards the old frame.
//! - Pixel data is stored as the core produced it; `convert` has helpers for
//!   turning RGB565 into RGB888 for image output.

pub mod audio;
pub mod convert;
pub mod video;

#[cfg(test)]
mod tests;

pub use audio::AudioSampleQueue;
pub use video::FrameBuffer;

/// Errors from AV operations.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AvError {
    /// The core reported a pitch shorter than one row of pixels.
    PitchTooSmall { pitch: usize, row_bytes: usize },
    /// The frame handed over is shorter than its dimensions and pitch require.
    ShortFrame { expected: usize, actual: usize },
    /// Width, height and pitch overflow the address space.
    FrameTooLarge,
}

impl core::fmt::Display for AvError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AvError::PitchTooSmall { pitch, row_bytes } => {
                write!(f, "pitch {pitch} is smaller than a {row_bytes}-byte row")
            }
            AvError::ShortFrame { expected, actual } => {
                write!(f, "frame has {actual} bytes, expected at least {expected}")
            }
            AvError::FrameTooLarge => write!(f, "frame dimensions overflow"),
        }
    }
}

impl std::error::Error for AvError {}
