use crate::abi::Capabilities;
use crate::bridge::CallbackBridge;
use crate::loader::CoreApi;

/// Drives one step of a core and hands its output to the host.
pub struct FrameRunner<'a> {
    core: &'a dyn CoreApi,
    bridge: &'a mut CallbackBridge,
}

impl<'a> FrameRunner<'a> {
    pub fn new(core: &'a dyn CoreApi, bridge: &'a mut CallbackBridge) -> Self {
        Self { core, bridge }
    }

    /// Run the core once, then drain video and audio into the sinks.
    ///
    /// - `video`: surface already sized for the current frame (see
    ///   [`FrameBuffer::pixels`](crate::av::FrameBuffer::pixels)). Left untouched
    ///   if the core has never presented a frame.
    /// - `audio`: receives at most `audio.len()` interleaved samples; anything the
    ///   core produced beyond that is dropped.
    ///
    /// Returns the number of audio samples written. Returns 0 without running
    /// anything if the core has no `retro_run`.
    pub fn run(self, video: &mut [u8], audio: &mut [i16]) -> usize {
        if !self.core.capabilities().contains(Capabilities::RUN) {
            return 0;
        }

        let core = self.core;
        self.bridge.bind(|| core.run());

        self.bridge.frame().copy_into(video);
        self.bridge.audio_mut().drain_into(audio)
    }
}
