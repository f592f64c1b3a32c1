//! Callback bridge between a loaded core and the host-owned buffers.
//!
//! libretro callbacks carry no user pointer, so the functions handed to the core
//! are plain `extern "C"` trampolines. Each one forwards to the [`CallbackBridge`]
//! that is currently bound on the calling thread. The session wraps every call
//! into the core in [`CallbackBridge::bind`], which binds the bridge for the
//! length of a closure and restores the previous binding on the way out, even
//! when the closure panics.
//!
//! A callback fired while no bridge is bound (e.g. from a core-owned thread)
//! gets the neutral answer: `false`, `0`, or nothing.

use crate::abi::{
    Capabilities, DEVICE_JOYPAD, ENVIRONMENT_PIXEL_FORMAT, PixelFormat, entry_points,
};
use crate::av::video::pitched_len;
use crate::av::{AudioSampleQueue, FrameBuffer};
use crate::input::InputMask;
use crate::loader::CoreApi;
use log::{debug, error, warn};
use std::cell::Cell;
use std::ffi::c_void;
use std::os::raw::c_uint;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Host-side state the core writes into (video, audio) and reads from (input)
/// while it runs.
#[derive(Debug, Default)]
pub struct CallbackBridge {
    frame: FrameBuffer,
    audio: AudioSampleQueue,
    input: InputMask,
    pixel_format: PixelFormat,
    format_negotiated: bool,
}

impl CallbackBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn audio(&self) -> &AudioSampleQueue {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioSampleQueue {
        &mut self.audio
    }

    pub fn input(&self) -> &InputMask {
        &self.input
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// True once the core has asked for (and been given) a pixel format.
    pub fn format_negotiated(&self) -> bool {
        self.format_negotiated
    }

    /// Answer an environment query.
    ///
    /// Only pixel-format negotiation is handled; it always yields RGB565. Every
    /// other command returns `false`, which the core treats as "unsupported".
    ///
    /// # Safety
    /// For [`ENVIRONMENT_PIXEL_FORMAT`], `payload` must be null or valid for a
    /// 4-byte write.
    pub unsafe fn environment(&mut self, command: c_uint, payload: *mut c_void) -> bool {
        match command {
            ENVIRONMENT_PIXEL_FORMAT => {
                if payload.is_null() {
                    return false;
                }
                // SAFETY: caller guarantees a writable `enum retro_pixel_format`.
                unsafe { payload.cast::<u32>().write_unaligned(PixelFormat::Rgb565 as u32) };
                self.pixel_format = PixelFormat::Rgb565;
                self.frame.set_format(PixelFormat::Rgb565);
                self.format_negotiated = true;
                true
            }
            _ => false,
        }
    }

    /// Capture one frame. `None` means the core has no new frame this step.
    pub fn video_refresh(&mut self, frame: Option<&[u8]>, width: u32, height: u32, pitch: usize) {
        let Some(src) = frame else {
            return;
        };
        if let Err(err) = self.frame.write_pitched(src, width, height, pitch) {
            warn!("dropping {width}x{height} frame (pitch {pitch}): {err}");
        }
    }

    pub fn audio_sample(&mut self, left: i16, right: i16) {
        self.audio.push_frame(left, right);
    }

    /// Append interleaved stereo samples; returns the number of frames accepted.
    pub fn audio_sample_batch(&mut self, samples: &[i16]) -> usize {
        self.audio.push_interleaved(samples)
    }

    pub fn input_poll(&mut self) {}

    /// 1 if the port 0 joypad button `id` is held, otherwise 0.
    pub fn input_state(&self, port: u32, device: u32, _index: u32, id: u32) -> i16 {
        if port == 0 && device == DEVICE_JOYPAD && self.input.is_pressed(id) {
            1
        } else {
            0
        }
    }

    /// Run `f` with this bridge answering the current thread's trampolines.
    ///
    /// Calls nest: an inner `bind` on another bridge takes over until it returns.
    pub fn bind<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let _active = ActiveBridge::enter(self);
        f()
    }

    /// Drop everything a loaded core produced.
    pub fn reset(&mut self) {
        self.frame.release();
        self.audio.clear();
        self.input.clear();
        self.format_negotiated = false;
    }
}

thread_local! {
    static ACTIVE: Cell<*mut CallbackBridge> = const { Cell::new(ptr::null_mut()) };
}

// Only ever lives on `bind`'s stack frame, so it cannot be leaked past the
// borrow of the bridge it points at.
struct ActiveBridge {
    previous: *mut CallbackBridge,
}

impl ActiveBridge {
    fn enter(bridge: &mut CallbackBridge) -> Self {
        let previous = ACTIVE.with(|slot| slot.replace(bridge as *mut CallbackBridge));
        Self { previous }
    }
}

impl Drop for ActiveBridge {
    fn drop(&mut self) {
        ACTIVE.with(|slot| slot.set(self.previous));
    }
}

fn with_active<R>(f: impl FnOnce(&mut CallbackBridge) -> R) -> Option<R> {
    let bridge = ACTIVE.with(Cell::get);
    if bridge.is_null() {
        debug!("core callback fired with no session bound");
        return None;
    }
    // SAFETY: the pointer was stored by a `bind` call still on this thread's
    // stack, which holds the exclusive borrow; callbacks never re-enter the core.
    let bridge = unsafe { &mut *bridge };
    match panic::catch_unwind(AssertUnwindSafe(|| f(bridge))) {
        Ok(value) => Some(value),
        Err(_) => {
            error!("panic inside core callback; returning neutral value");
            None
        }
    }
}

extern "C" fn environment_cb(command: c_uint, data: *mut c_void) -> bool {
    // SAFETY: the core passes a payload of the type its command documents.
    with_active(|bridge| unsafe { bridge.environment(command, data) }).unwrap_or(false)
}

extern "C" fn video_refresh_cb(data: *const c_void, width: c_uint, height: c_uint, pitch: usize) {
    with_active(|bridge| {
        let frame = if data.is_null() {
            None
        } else {
            let row_bytes = width as usize * bridge.pixel_format().bytes_per_pixel() as usize;
            if pitch < row_bytes {
                warn!("dropping {width}x{height} frame: pitch {pitch} < row {row_bytes}");
                return;
            }
            match pitched_len(height, pitch, row_bytes) {
                // SAFETY: the core guarantees `height` rows of `pitch` bytes at `data`.
                Some(len) => Some(unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) }),
                None => {
                    warn!("dropping {width}x{height} frame: size overflows");
                    return;
                }
            }
        };
        bridge.video_refresh(frame, width, height, pitch);
    });
}

extern "C" fn audio_sample_cb(left: i16, right: i16) {
    with_active(|bridge| bridge.audio_sample(left, right));
}

extern "C" fn audio_sample_batch_cb(data: *const i16, frames: usize) -> usize {
    if data.is_null() || frames == 0 {
        return 0;
    }
    with_active(|bridge| {
        let Some(len) = frames.checked_mul(2) else {
            return 0;
        };
        // SAFETY: the core guarantees `frames` interleaved stereo pairs at `data`.
        let samples = unsafe { std::slice::from_raw_parts(data, len) };
        bridge.audio_sample_batch(samples)
    })
    .unwrap_or(0)
}

extern "C" fn input_poll_cb() {
    with_active(|bridge| bridge.input_poll());
}

extern "C" fn input_state_cb(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16 {
    with_active(|bridge| bridge.input_state(port, device, index, id)).unwrap_or(0)
}

/// Hand the trampolines to every callback registrar the core provides.
///
/// Registrars the core lacks are skipped. Call inside [`CallbackBridge::bind`]:
/// cores commonly query the environment from inside `retro_set_environment`.
pub fn register(core: &dyn CoreApi) {
    let caps = core.capabilities();
    let skip = |flag: Capabilities, name: &str| {
        let missing = !caps.contains(flag);
        if missing {
            debug!("core has no {name}; callback not registered");
        }
        missing
    };

    if !skip(Capabilities::SET_ENVIRONMENT, entry_points::SET_ENVIRONMENT) {
        core.set_environment(environment_cb);
    }
    if !skip(Capabilities::SET_VIDEO_REFRESH, entry_points::SET_VIDEO_REFRESH) {
        core.set_video_refresh(video_refresh_cb);
    }
    if !skip(Capabilities::SET_AUDIO_SAMPLE, entry_points::SET_AUDIO_SAMPLE) {
        core.set_audio_sample(audio_sample_cb);
    }
    if !skip(
        Capabilities::SET_AUDIO_SAMPLE_BATCH,
        entry_points::SET_AUDIO_SAMPLE_BATCH,
    ) {
        core.set_audio_sample_batch(audio_sample_batch_cb);
    }
    if !skip(Capabilities::SET_INPUT_POLL, entry_points::SET_INPUT_POLL) {
        core.set_input_poll(input_poll_cb);
    }
    if !skip(Capabilities::SET_INPUT_STATE, entry_points::SET_INPUT_STATE) {
        core.set_input_state(input_state_cb);
    }
}
