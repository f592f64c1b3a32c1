use log::trace;

/// Interleaved stereo i16 samples produced by the core during one step.
///
/// Always holds whole left/right pairs. The runner drains and clears it once per
/// step; whatever does not fit the host sink is dropped.
#[derive(Debug, Default)]
pub struct AudioSampleQueue {
    samples: Vec<i16>,
}

impl AudioSampleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve room for `samples` values so the first steps don't reallocate.
    pub fn reserve(&mut self, samples: usize) {
        self.samples.reserve(samples);
    }

    pub fn push_frame(&mut self, left: i16, right: i16) {
        self.samples.push(left);
        self.samples.push(right);
    }

    /// Append interleaved pairs. A trailing unpaired value is ignored.
    ///
    /// Returns the number of stereo frames appended.
    pub fn push_interleaved(&mut self, samples: &[i16]) -> usize {
        let frames = samples.len() / 2;
        self.samples.extend_from_slice(&samples[..frames * 2]);
        frames
    }

    /// Number of i16 values queued (twice the frame count).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.samples
    }

    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Copy as many leading samples as fit into `sink`, then empty the queue.
    ///
    /// Returns the number of samples written.
    pub fn drain_into(&mut self, sink: &mut [i16]) -> usize {
        let n = self.samples.len().min(sink.len());
        sink[..n].copy_from_slice(&self.samples[..n]);
        if n < self.samples.len() {
            trace!(
                "audio sink full: dropped {} of {} samples",
                self.samples.len() - n,
                self.samples.len()
            );
        }
        self.samples.clear();
        n
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
