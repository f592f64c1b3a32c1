//! emuhost-core ABI module
//!
//! This module describes the contract between:
//! - **Host**: `emuhost-core` (this crate)
//! - **Core**: a dynamically loaded libretro module
//!
//! ## Entry points (host -> core)
//! Resolved by symbol name from the loaded module. The host needs at least
//! `retro_run` and `retro_load_game` to actually play anything; every other
//! entry point is optional and degrades to a no-op when missing.
//!
//! ## Callbacks (core -> host)
//! Registered once through the `retro_set_*` entry points:
//! - environment: only pixel-format negotiation is answered (always RGB565)
//! - video refresh: one frame per step, rows separated by `pitch` bytes
//! - audio sample / audio sample batch: interleaved stereo i16
//! - input poll / input state: port 0 digital joypad only
//!
//! The C struct and callback layouts come from `libretro-sys`.

use bitflags::bitflags;
use core::fmt;
use core::str::FromStr;
use std::os::raw::c_uint;
use thiserror::Error;

pub use libretro_sys::{
    AudioSampleBatchFn, AudioSampleFn, DEVICE_JOYPAD, EnvironmentFn, GameInfo, InputPollFn,
    InputStateFn, SystemAvInfo, VideoRefreshFn,
};

/// Environment command answered by the host: the core negotiates its pixel format.
///
/// The host always writes back [`PixelFormat::Rgb565`].
pub const ENVIRONMENT_PIXEL_FORMAT: c_uint = 10;

/// Number of digital joypad ids tracked per port.
pub const JOYPAD_BUTTON_COUNT: u32 = 16;

/// Core export names (entrypoints).
pub mod entry_points {
    pub const INIT: &str = "retro_init";
    pub const DEINIT: &str = "retro_deinit";
    pub const LOAD_GAME: &str = "retro_load_game";
    pub const UNLOAD_GAME: &str = "retro_unload_game";
    pub const RUN: &str = "retro_run";
    pub const GET_SYSTEM_AV_INFO: &str = "retro_get_system_av_info";

    // Callback registrars.
    pub const SET_ENVIRONMENT: &str = "retro_set_environment";
    pub const SET_VIDEO_REFRESH: &str = "retro_set_video_refresh";
    pub const SET_AUDIO_SAMPLE: &str = "retro_set_audio_sample";
    pub const SET_AUDIO_SAMPLE_BATCH: &str = "retro_set_audio_sample_batch";
    pub const SET_INPUT_POLL: &str = "retro_set_input_poll";
    pub const SET_INPUT_STATE: &str = "retro_set_input_state";
}

bitflags! {
    /// Which entry points a bound core actually provides.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct Capabilities: u32 {
        const INIT = 1 << 0;
        const DEINIT = 1 << 1;
        const LOAD_GAME = 1 << 2;
        const UNLOAD_GAME = 1 << 3;
        const RUN = 1 << 4;
        const AV_INFO = 1 << 5;
        const SET_ENVIRONMENT = 1 << 6;
        const SET_VIDEO_REFRESH = 1 << 7;
        const SET_AUDIO_SAMPLE = 1 << 8;
        const SET_AUDIO_SAMPLE_BATCH = 1 << 9;
        const SET_INPUT_POLL = 1 << 10;
        const SET_INPUT_STATE = 1 << 11;
    }
}

impl Capabilities {
    /// Entry points without which a loaded game can never produce a frame.
    pub const REQUIRED: Self = Self::RUN.union(Self::LOAD_GAME);

    /// Symbol name of every single-flag capability, in flag order.
    const NAMES: [(Self, &'static str); 12] = [
        (Self::INIT, entry_points::INIT),
        (Self::DEINIT, entry_points::DEINIT),
        (Self::LOAD_GAME, entry_points::LOAD_GAME),
        (Self::UNLOAD_GAME, entry_points::UNLOAD_GAME),
        (Self::RUN, entry_points::RUN),
        (Self::AV_INFO, entry_points::GET_SYSTEM_AV_INFO),
        (Self::SET_ENVIRONMENT, entry_points::SET_ENVIRONMENT),
        (Self::SET_VIDEO_REFRESH, entry_points::SET_VIDEO_REFRESH),
        (Self::SET_AUDIO_SAMPLE, entry_points::SET_AUDIO_SAMPLE),
        (Self::SET_AUDIO_SAMPLE_BATCH, entry_points::SET_AUDIO_SAMPLE_BATCH),
        (Self::SET_INPUT_POLL, entry_points::SET_INPUT_POLL),
        (Self::SET_INPUT_STATE, entry_points::SET_INPUT_STATE),
    ];

    /// Symbol names of the entry points in `wanted` that `self` lacks.
    pub fn missing(self, wanted: Self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| wanted.contains(*flag) && !self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

/// Pixel formats, numbered as in libretro's `retro_pixel_format`.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PixelFormat {
    /// 0RGB1555, 2 bytes per pixel. libretro's legacy default.
    Argb1555 = 0,
    /// XRGB8888, 4 bytes per pixel.
    Xrgb8888 = 1,
    /// RGB565, 2 bytes per pixel. The only format this host negotiates.
    #[default]
    Rgb565 = 2,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Argb1555 | PixelFormat::Rgb565 => 2,
            PixelFormat::Xrgb8888 => 4,
        }
    }
}

/// Joypad button ids passed as `id` to the input-state callback.
///
/// These match libretro's `RETRO_DEVICE_ID_JOYPAD_*` ids.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum JoypadButton {
    B = 0,
    Y = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
    A = 8,
    X = 9,
    L1 = 10,
    R1 = 11,
    L2 = 12,
    R2 = 13,
    L3 = 14,
    R3 = 15,
}

impl JoypadButton {
    pub const ALL: [JoypadButton; 16] = [
        JoypadButton::B,
        JoypadButton::Y,
        JoypadButton::Select,
        JoypadButton::Start,
        JoypadButton::Up,
        JoypadButton::Down,
        JoypadButton::Left,
        JoypadButton::Right,
        JoypadButton::A,
        JoypadButton::X,
        JoypadButton::L1,
        JoypadButton::R1,
        JoypadButton::L2,
        JoypadButton::R2,
        JoypadButton::L3,
        JoypadButton::R3,
    ];

    pub const fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            JoypadButton::B => "b",
            JoypadButton::Y => "y",
            JoypadButton::Select => "select",
            JoypadButton::Start => "start",
            JoypadButton::Up => "up",
            JoypadButton::Down => "down",
            JoypadButton::Left => "left",
            JoypadButton::Right => "right",
            JoypadButton::A => "a",
            JoypadButton::X => "x",
            JoypadButton::L1 => "l1",
            JoypadButton::R1 => "r1",
            JoypadButton::L2 => "l2",
            JoypadButton::R2 => "r2",
            JoypadButton::L3 => "l3",
            JoypadButton::R3 => "r3",
        }
    }
}

impl fmt::Display for JoypadButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("unknown joypad button `{0}`")]
pub struct ParseButtonError(pub String);

impl FromStr for JoypadButton {
    type Err = ParseButtonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        // Shoulder buttons are commonly written without the "1".
        let name = match lower.as_str() {
            "l" => "l1",
            "r" => "r1",
            other => other,
        };
        Self::ALL
            .iter()
            .copied()
            .find(|button| button.name() == name)
            .ok_or_else(|| ParseButtonError(s.to_string()))
    }
}
