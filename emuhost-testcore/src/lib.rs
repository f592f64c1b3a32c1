//! A libretro core small enough to reason about in tests.
//!
//! Every `retro_run` it presents one 4x2 RGB565 frame whose rows are padded to
//! [`PITCH`] bytes with `0xEE`, and pushes two stereo frames of audio through the
//! batch callback. Holding joypad A on port 0 turns the whole frame `0xFF`.
//!
//! `retro_set_audio_sample` is never exported. Built with the `partial` feature,
//! `retro_run` and `retro_get_system_av_info` are left out as well.
//!
//! [`testcore_counts`] reports how often each lifecycle entry point ran, in
//! [`Counter`] order.

use libretro_sys::{
    AudioSampleBatchFn, DEVICE_JOYPAD, EnvironmentFn, GameInfo, InputPollFn, InputStateFn,
    VideoRefreshFn,
};
use std::ffi::c_void;
use std::os::raw::c_uint;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 2;
pub const PITCH: usize = 12;
pub const SAMPLE_RATE: f64 = 32_040.0;
pub const FPS: f64 = 60.0;
/// Interleaved samples pushed by every step.
pub const AUDIO: [i16; 4] = [100, -100, 200, -200];

const ENVIRONMENT_PIXEL_FORMAT: c_uint = 10;
const PIXEL_FORMAT_RGB565: u32 = 2;
#[cfg_attr(feature = "partial", allow(dead_code))]
const JOYPAD_A: c_uint = 8;

#[repr(usize)]
pub enum Counter {
    Init,
    Deinit,
    LoadGame,
    UnloadGame,
    Run,
}

const COUNTERS: usize = 5;

static COUNTS: [AtomicU32; COUNTERS] = [const { AtomicU32::new(0) }; COUNTERS];

static ENVIRONMENT: Mutex<Option<EnvironmentFn>> = Mutex::new(None);
static VIDEO: Mutex<Option<VideoRefreshFn>> = Mutex::new(None);
static AUDIO_BATCH: Mutex<Option<AudioSampleBatchFn>> = Mutex::new(None);
static INPUT_POLL: Mutex<Option<InputPollFn>> = Mutex::new(None);
static INPUT_STATE: Mutex<Option<InputStateFn>> = Mutex::new(None);

fn bump(counter: Counter) {
    COUNTS[counter as usize].fetch_add(1, Ordering::SeqCst);
}

fn store<T>(slot: &Mutex<Option<T>>, value: T) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
}

#[cfg_attr(feature = "partial", allow(dead_code))]
fn load<T: Copy>(slot: &Mutex<Option<T>>) -> Option<T> {
    *slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Copy the lifecycle counters into `out`.
///
/// # Safety
/// `out` must be valid for writing five `u32`s.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn testcore_counts(out: *mut u32) {
    for (i, count) in COUNTS.iter().enumerate() {
        unsafe { out.add(i).write(count.load(Ordering::SeqCst)) };
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_init() {
    bump(Counter::Init);
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_deinit() {
    bump(Counter::Deinit);
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_environment(callback: EnvironmentFn) {
    store(&ENVIRONMENT, callback);
    let mut format = PIXEL_FORMAT_RGB565;
    // The answer is read back by the host through its own state.
    unsafe {
        callback(
            ENVIRONMENT_PIXEL_FORMAT,
            (&mut format as *mut u32).cast::<c_void>(),
        )
    };
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_video_refresh(callback: VideoRefreshFn) {
    store(&VIDEO, callback);
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_audio_sample_batch(callback: AudioSampleBatchFn) {
    store(&AUDIO_BATCH, callback);
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_input_poll(callback: InputPollFn) {
    store(&INPUT_POLL, callback);
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_set_input_state(callback: InputStateFn) {
    store(&INPUT_STATE, callback);
}

/// # Safety
/// `game` must be null or point to a valid `retro_game_info`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn retro_load_game(game: *const GameInfo) -> bool {
    bump(Counter::LoadGame);
    match unsafe { game.as_ref() } {
        Some(game) => !game.path.is_null(),
        None => false,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn retro_unload_game() {
    bump(Counter::UnloadGame);
}

#[cfg(not(feature = "partial"))]
#[unsafe(no_mangle)]
pub extern "C" fn retro_run() {
    bump(Counter::Run);

    let mut held = false;
    unsafe {
        if let Some(poll) = load(&INPUT_POLL) {
            poll();
        }
        if let Some(state) = load(&INPUT_STATE) {
            held = state(0, DEVICE_JOYPAD, 0, JOYPAD_A) != 0;
        }
    }

    let mut frame = [0xEEu8; PITCH * HEIGHT as usize];
    let row_bytes = WIDTH as usize * 2;
    for (y, row) in frame.chunks_mut(PITCH).enumerate() {
        for (x, byte) in row[..row_bytes].iter_mut().enumerate() {
            *byte = if held { 0xFF } else { (y * 8 + x) as u8 };
        }
    }

    unsafe {
        if let Some(video) = load(&VIDEO) {
            video(frame.as_ptr().cast(), WIDTH, HEIGHT, PITCH);
        }
        if let Some(batch) = load(&AUDIO_BATCH) {
            batch(AUDIO.as_ptr(), AUDIO.len() / 2);
        }
    }
}

/// # Safety
/// `info` must be valid for writing a `retro_system_av_info`.
#[cfg(not(feature = "partial"))]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn retro_get_system_av_info(info: *mut libretro_sys::SystemAvInfo) {
    let Some(info) = (unsafe { info.as_mut() }) else {
        return;
    };
    info.geometry.base_width = WIDTH;
    info.geometry.base_height = HEIGHT;
    info.geometry.max_width = WIDTH;
    info.geometry.max_height = HEIGHT;
    info.geometry.aspect_ratio = 2.0;
    info.timing.fps = FPS;
    info.timing.sample_rate = SAMPLE_RATE;
}
