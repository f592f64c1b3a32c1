use crate::abi::{Capabilities, SystemAvInfo};
use crate::bridge::CallbackBridge;
use crate::loader::CoreApi;

/// Sample rate reported when the core cannot be asked.
pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

/// Ask the core for its AV info. `None` if it has no `retro_get_system_av_info`.
pub fn query_av_info(core: &dyn CoreApi, bridge: &mut CallbackBridge) -> Option<SystemAvInfo> {
    if !core.capabilities().contains(Capabilities::AV_INFO) {
        return None;
    }
    // SAFETY: `SystemAvInfo` holds only integers and floats; all-zero is valid.
    let mut info: SystemAvInfo = unsafe { std::mem::zeroed() };
    bridge.bind(|| core.system_av_info(&mut info));
    Some(info)
}

/// The core's audio sample rate, re-queried on every call.
pub fn sample_rate(core: &dyn CoreApi, bridge: &mut CallbackBridge, fallback: f64) -> f64 {
    query_av_info(core, bridge)
        .map(|info| info.timing.sample_rate)
        .unwrap_or(fallback)
}

/// Playback rate that keeps audio in step with a display running at `display_hz`.
///
/// A core running at `core_fps` is shown at `display_hz`, so its audio has to be
/// played back at the same ratio to avoid under- or overrunning the device
/// buffer. Non-positive rates leave `core_rate` unchanged.
pub fn synced_sample_rate(core_rate: f64, core_fps: f64, display_hz: f64) -> f64 {
    if core_fps <= 0.0 || display_hz <= 0.0 {
        return core_rate;
    }
    core_rate * display_hz / core_fps
}
