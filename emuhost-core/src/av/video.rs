use crate::abi::PixelFormat;
use log::{debug, warn};

use super::AvError;

/// Host-owned copy of the last frame the core presented.
///
/// Storage only ever grows: a smaller frame reuses the existing allocation, and a
/// larger one reallocates to exactly its own size. `pixels()` always covers exactly
/// `width * height * bytes_per_pixel` bytes of the current dimensions.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    bytes: Vec<u8>,
    allocated: bool,
}

impl FrameBuffer {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per scanline in host memory (no padding).
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel() as usize
    }

    /// True once the core has presented at least one frame since the last release.
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    pub fn pixels(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes currently reserved for frame storage.
    pub fn allocated_bytes(&self) -> usize {
        self.bytes.capacity()
    }

    /// Changing the format invalidates the frame; the next present reallocates.
    pub fn set_format(&mut self, format: PixelFormat) {
        if self.format != format {
            self.format = format;
            self.width = 0;
            self.height = 0;
            self.bytes.clear();
            self.allocated = false;
        }
    }

    /// Resize to `width * height` pixels of the current format.
    ///
    /// Previous contents are not preserved across a dimension change.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), AvError> {
        let len = frame_len(width, height, self.format)?;
        if (width, height) != (self.width, self.height) || !self.allocated {
            debug!(
                "frame buffer resized {}x{} -> {}x{}",
                self.width, self.height, width, height
            );
            self.bytes.clear();
            if len > self.bytes.capacity() {
                self.bytes.reserve_exact(len);
            }
            self.bytes.resize(len, 0);
            self.width = width;
            self.height = height;
            self.allocated = true;
        }
        Ok(())
    }

    /// Copy a frame whose scanlines are `pitch` bytes apart in `src`.
    ///
    /// Exactly `width * bpp` bytes are taken from each source row; any padding up to
    /// `pitch` is skipped.
    pub fn write_pitched(
        &mut self,
        src: &[u8],
        width: u32,
        height: u32,
        pitch: usize,
    ) -> Result<(), AvError> {
        let row_bytes = width as usize * self.format.bytes_per_pixel() as usize;
        if pitch < row_bytes {
            return Err(AvError::PitchTooSmall { pitch, row_bytes });
        }
        let needed = pitched_len(height, pitch, row_bytes).ok_or(AvError::FrameTooLarge)?;
        if src.len() < needed {
            return Err(AvError::ShortFrame {
                expected: needed,
                actual: src.len(),
            });
        }

        self.resize(width, height)?;
        if row_bytes == 0 {
            return Ok(());
        }

        for (dst_row, src_row) in self
            .bytes
            .chunks_exact_mut(row_bytes)
            .zip(src.chunks(pitch))
        {
            dst_row.copy_from_slice(&src_row[..row_bytes]);
        }
        Ok(())
    }

    /// Copy the frame into a caller surface sized for the current dimensions.
    ///
    /// Returns the number of bytes written. A mismatched sink gets the overlapping
    /// prefix only.
    pub fn copy_into(&self, sink: &mut [u8]) -> usize {
        if !self.allocated {
            return 0;
        }
        if sink.len() != self.bytes.len() {
            debug!(
                "video sink is {} bytes, frame is {} bytes ({}x{})",
                sink.len(),
                self.bytes.len(),
                self.width,
                self.height
            );
        }
        let n = sink.len().min(self.bytes.len());
        sink[..n].copy_from_slice(&self.bytes[..n]);
        n
    }

    /// Drop the frame and its storage.
    pub fn release(&mut self) {
        self.width = 0;
        self.height = 0;
        self.bytes = Vec::new();
        self.allocated = false;
    }
}

fn frame_len(width: u32, height: u32, format: PixelFormat) -> Result<usize, AvError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(format.bytes_per_pixel() as usize))
        .ok_or_else(|| {
            warn!("frame {width}x{height} does not fit in memory");
            AvError::FrameTooLarge
        })
}

/// Source bytes spanned by `height` rows `pitch` apart, the last row unpadded.
pub(crate) fn pitched_len(height: u32, pitch: usize, row_bytes: usize) -> Option<usize> {
    match height {
        0 => Some(0),
        h => pitch.checked_mul(h as usize - 1)?.checked_add(row_bytes),
    }
}
