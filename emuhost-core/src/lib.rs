//! emuhost-core: loads a libretro core at runtime and drives it one step at a time.
//!
//! A [`Session`] owns everything one running core needs:
//! - the bound core, behind the [`CoreApi`] capability trait
//! - a [`CallbackBridge`] holding the host-side frame buffer, audio queue and
//!   joypad mask that the core's callbacks write into and read from
//! - the lifecycle state (`Unloaded -> Loaded -> GameLoaded -> Running`)
//!
//! Typical use from an emulation thread:
//!
//! ```no_run
//! use emuhost_core::Session;
//!
//! # fn present(_rgb565: &[u8], _width: u32, _height: u32) {}
//! # fn queue_audio(_interleaved: &[i16]) {}
//! let mut session = Session::new();
//! if session.load("cores/gambatte_libretro.so") && session.load_game("roms/game.gb") {
//!     let mut audio = vec![0i16; 4096];
//!     let mut video = Vec::new();
//!     loop {
//!         let samples = session.run_frame(&mut video, &mut audio);
//!         queue_audio(&audio[..samples]);
//!
//!         // The frame size may change from one step to the next.
//!         let frame = session.frame();
//!         if video.len() != frame.pixels().len() {
//!             video.resize(frame.pixels().len(), 0);
//!             frame.copy_into(&mut video);
//!         }
//!         present(&video, frame.width(), frame.height());
//!     }
//! }
//! ```
//!
//! Input may be updated from any thread through [`Session::input_mask`].
//!
//! Fallible operations come in two flavours: `try_*` methods return
//! [`LoadError`], and the plain ones log the error and return `false`.

pub mod abi;
pub mod av;
pub mod bridge;
pub mod ffi;
pub mod input;
pub mod loader;
pub mod runtime;

pub use crate::abi::{Capabilities, JoypadButton, PixelFormat};
pub use crate::av::FrameBuffer;
pub use crate::bridge::CallbackBridge;
pub use crate::input::InputMask;
pub use crate::loader::{CoreApi, DylibCore, LoadError};

use crate::abi::{GameInfo, SystemAvInfo};
use crate::runtime::{DEFAULT_SAMPLE_RATE, FrameRunner, timing};
use log::{error, info, warn};
use std::ffi::CString;
use std::path::Path;
use std::ptr;

/// Default audio reserve, in samples, taken when a core is attached.
pub const DEFAULT_AUDIO_RESERVE: usize = 4096;

/// Tunables for a [`Session`].
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Samples reserved up front in the audio queue.
    pub audio_reserve: usize,
    /// Reported by [`Session::sample_rate`] when the core has no AV info.
    pub fallback_sample_rate: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            audio_reserve: DEFAULT_AUDIO_RESERVE,
            fallback_sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    Unloaded,
    Loaded,
    GameLoaded,
    Running,
}

impl SessionState {
    fn has_game(self) -> bool {
        matches!(self, SessionState::GameLoaded | SessionState::Running)
    }
}

/// One hosted core and the buffers it talks to.
pub struct Session {
    config: SessionConfig,
    core: Option<Box<dyn CoreApi>>,
    bridge: CallbackBridge,
    state: SessionState,
    frames_run: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            core: None,
            bridge: CallbackBridge::new(),
            state: SessionState::Unloaded,
            frames_run: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Steps run since the game was loaded.
    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    /// Load the core at `path`. Logs and returns `false` on failure.
    pub fn load(&mut self, path: impl AsRef<Path>) -> bool {
        match self.try_load(path) {
            Ok(()) => true,
            Err(err) => {
                error!("{err}");
                false
            }
        }
    }

    /// Open the shared library at `path` and attach it.
    ///
    /// Missing entry points do not fail the load; see [`Session::check_abi`].
    pub fn try_load(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        if self.core.is_some() {
            return Err(LoadError::AlreadyLoaded);
        }
        let core = DylibCore::open(path)?;
        self.attach(Box::new(core))
    }

    /// Attach an already-bound core: register callbacks, then call `retro_init`.
    pub fn attach(&mut self, core: Box<dyn CoreApi>) -> Result<(), LoadError> {
        if self.core.is_some() {
            return Err(LoadError::AlreadyLoaded);
        }

        let caps = core.capabilities();
        let missing = caps.missing(Capabilities::REQUIRED);
        if !missing.is_empty() {
            warn!(
                "core lacks {}; it will load but cannot run games",
                missing.join(", ")
            );
        }

        self.bridge.bind(|| {
            bridge::register(&*core);
            if caps.contains(Capabilities::INIT) {
                core.init();
            }
        });

        self.bridge.audio_mut().reserve(self.config.audio_reserve);
        self.core = Some(core);
        self.state = SessionState::Loaded;
        info!("core attached ({} entry points)", caps.iter().count());
        Ok(())
    }

    /// Load the game at `path` into the attached core. Logs and returns `false` on failure.
    pub fn load_game(&mut self, path: impl AsRef<Path>) -> bool {
        match self.try_load_game(path) {
            Ok(()) => true,
            Err(err) => {
                error!("{err}");
                false
            }
        }
    }

    pub fn try_load_game(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        let core = self.core.as_deref().ok_or(LoadError::NoCore)?;
        if self.state.has_game() {
            return Err(LoadError::GameAlreadyLoaded);
        }
        if !core.capabilities().contains(Capabilities::LOAD_GAME) {
            return Err(LoadError::MissingEntryPoint(abi::entry_points::LOAD_GAME));
        }

        let c_path = path
            .to_str()
            .and_then(|s| CString::new(s).ok())
            .ok_or_else(|| LoadError::InvalidPath(path.to_path_buf()))?;
        let game = GameInfo {
            path: c_path.as_ptr(),
            data: ptr::null(),
            size: 0,
            meta: ptr::null(),
        };

        let loaded = self.bridge.bind(|| core.load_game(&game));
        if !loaded {
            return Err(LoadError::GameRejected(path.to_path_buf()));
        }

        self.state = SessionState::GameLoaded;
        self.frames_run = 0;
        info!("loaded game {}", path.display());
        Ok(())
    }

    /// Press or release joypad button `button_id` on port 0.
    pub fn set_input_state(&self, button_id: u32, pressed: bool) {
        self.bridge.input().set(button_id, pressed);
    }

    /// A handle on the joypad mask that another thread can update.
    pub fn input_mask(&self) -> InputMask {
        self.bridge.input().clone()
    }

    /// Run one step and drain its output; returns the audio samples written.
    ///
    /// A no-op returning 0 unless a game is loaded and the core exports
    /// `retro_run`. See [`FrameRunner::run`] for the sink contracts.
    pub fn run_frame(&mut self, video: &mut [u8], audio: &mut [i16]) -> usize {
        if !self.state.has_game() {
            return 0;
        }
        let Some(core) = self.core.as_deref() else {
            return 0;
        };
        if !core.capabilities().contains(Capabilities::RUN) {
            return 0;
        }

        let written = FrameRunner::new(core, &mut self.bridge).run(video, audio);
        self.state = SessionState::Running;
        self.frames_run += 1;
        written
    }

    /// The last captured frame; size the video sink from its dimensions.
    pub fn frame(&self) -> &FrameBuffer {
        self.bridge.frame()
    }

    pub fn bridge(&self) -> &CallbackBridge {
        &self.bridge
    }

    /// Core-reported audio sample rate, or the configured fallback.
    pub fn sample_rate(&mut self) -> f64 {
        match self.core.as_deref() {
            Some(core) => {
                timing::sample_rate(core, &mut self.bridge, self.config.fallback_sample_rate)
            }
            None => self.config.fallback_sample_rate,
        }
    }

    pub fn av_info(&mut self) -> Option<SystemAvInfo> {
        let core = self.core.as_deref()?;
        timing::query_av_info(core, &mut self.bridge)
    }

    /// Entry points the attached core provides (empty when unloaded).
    pub fn capabilities(&self) -> Capabilities {
        self.core
            .as_deref()
            .map(|core| core.capabilities())
            .unwrap_or_else(Capabilities::empty)
    }

    pub fn can_run(&self) -> bool {
        self.capabilities().contains(Capabilities::RUN)
    }

    pub fn has_av_info(&self) -> bool {
        self.capabilities().contains(Capabilities::AV_INFO)
    }

    pub fn is_loaded(&self) -> bool {
        self.core.is_some()
    }

    /// Fails if the attached core lacks an entry point needed to run a game.
    pub fn check_abi(&self) -> Result<(), LoadError> {
        if self.core.is_none() {
            return Err(LoadError::NoCore);
        }
        let missing = self.capabilities().missing(Capabilities::REQUIRED);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LoadError::IncompatibleAbi { missing })
        }
    }

    /// Unload the game and the core and release their buffers. Safe to repeat.
    pub fn unload(&mut self) {
        let Some(core) = self.core.take() else {
            return;
        };
        let caps = core.capabilities();
        let has_game = self.state.has_game();
        self.bridge.bind(|| {
            if has_game && caps.contains(Capabilities::UNLOAD_GAME) {
                core.unload_game();
            }
            if caps.contains(Capabilities::DEINIT) {
                core.deinit();
            }
        });
        drop(core);

        self.bridge.reset();
        self.state = SessionState::Unloaded;
        self.frames_run = 0;
        info!("core unloaded");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.unload();
    }
}
