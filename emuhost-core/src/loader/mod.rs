//! Loader for libretro core modules.
//!
//! Responsibilities:
//! - Open a core shared library at runtime.
//! - Resolve its exported entry points into a table of optional function pointers.
//! - Expose the table through [`CoreApi`], one method per entry point, so the rest
//!   of the crate never touches symbols or raw pointers.
//!
//! Notes:
//! - A missing entry point is not a load failure. Its method becomes a no-op and
//!   its flag is absent from [`CoreApi::capabilities`].
//! - The library handle lives inside [`DylibCore`]; dropping it unloads the module.

use crate::abi::{
    AudioSampleBatchFn, AudioSampleFn, Capabilities, EnvironmentFn, GameInfo, InputPollFn,
    InputStateFn, SystemAvInfo, VideoRefreshFn, entry_points,
};
use libloading::Library;
use log::{debug, info};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading a core or a game into it.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to open core {}: {source}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("a core is already loaded; unload it first")]
    AlreadyLoaded,

    #[error("no core is loaded")]
    NoCore,

    #[error("a game is already loaded")]
    GameAlreadyLoaded,

    #[error("core does not export {0}")]
    MissingEntryPoint(&'static str),

    #[error("game path {} cannot be passed to the core", .0.display())]
    InvalidPath(PathBuf),

    #[error("core rejected game {}", .0.display())]
    GameRejected(PathBuf),

    #[error("core is missing required entry points: {}", .missing.join(", "))]
    IncompatibleAbi { missing: Vec<&'static str> },
}

/// The entry points of a libretro core.
///
/// Every method is safe to call whether or not the core provides the entry point;
/// unbound ones do nothing (or report failure). Implementations other than
/// [`DylibCore`] are useful for statically linked or scripted cores.
pub trait CoreApi: Send {
    /// Entry points actually provided.
    fn capabilities(&self) -> Capabilities;

    fn init(&self);
    fn deinit(&self);

    /// Returns `false` when unbound or when the core rejects the game.
    fn load_game(&self, game: &GameInfo) -> bool;
    fn unload_game(&self);

    /// Advance the core by one step.
    fn run(&self);

    /// Fill `info`. Leaves it untouched when unbound.
    fn system_av_info(&self, info: &mut SystemAvInfo);

    fn set_environment(&self, callback: EnvironmentFn);
    fn set_video_refresh(&self, callback: VideoRefreshFn);
    fn set_audio_sample(&self, callback: AudioSampleFn);
    fn set_audio_sample_batch(&self, callback: AudioSampleBatchFn);
    fn set_input_poll(&self, callback: InputPollFn);
    fn set_input_state(&self, callback: InputStateFn);
}

/// Resolved entry points of a shared-library core.
#[derive(Default, Clone, Copy)]
struct EntryPoints {
    init: Option<unsafe extern "C" fn()>,
    deinit: Option<unsafe extern "C" fn()>,
    load_game: Option<unsafe extern "C" fn(*const GameInfo) -> bool>,
    unload_game: Option<unsafe extern "C" fn()>,
    run: Option<unsafe extern "C" fn()>,
    get_system_av_info: Option<unsafe extern "C" fn(*mut SystemAvInfo)>,
    set_environment: Option<unsafe extern "C" fn(EnvironmentFn)>,
    set_video_refresh: Option<unsafe extern "C" fn(VideoRefreshFn)>,
    set_audio_sample: Option<unsafe extern "C" fn(AudioSampleFn)>,
    set_audio_sample_batch: Option<unsafe extern "C" fn(AudioSampleBatchFn)>,
    set_input_poll: Option<unsafe extern "C" fn(InputPollFn)>,
    set_input_state: Option<unsafe extern "C" fn(InputStateFn)>,
}

impl EntryPoints {
    /// Resolve every entry point the library exports.
    ///
    /// # Safety
    /// Symbols with these names must have the libretro signatures.
    unsafe fn resolve(library: &Library) -> Self {
        unsafe {
            Self {
                init: symbol(library, entry_points::INIT),
                deinit: symbol(library, entry_points::DEINIT),
                load_game: symbol(library, entry_points::LOAD_GAME),
                unload_game: symbol(library, entry_points::UNLOAD_GAME),
                run: symbol(library, entry_points::RUN),
                get_system_av_info: symbol(library, entry_points::GET_SYSTEM_AV_INFO),
                set_environment: symbol(library, entry_points::SET_ENVIRONMENT),
                set_video_refresh: symbol(library, entry_points::SET_VIDEO_REFRESH),
                set_audio_sample: symbol(library, entry_points::SET_AUDIO_SAMPLE),
                set_audio_sample_batch: symbol(library, entry_points::SET_AUDIO_SAMPLE_BATCH),
                set_input_poll: symbol(library, entry_points::SET_INPUT_POLL),
                set_input_state: symbol(library, entry_points::SET_INPUT_STATE),
            }
        }
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::INIT, self.init.is_some());
        caps.set(Capabilities::DEINIT, self.deinit.is_some());
        caps.set(Capabilities::LOAD_GAME, self.load_game.is_some());
        caps.set(Capabilities::UNLOAD_GAME, self.unload_game.is_some());
        caps.set(Capabilities::RUN, self.run.is_some());
        caps.set(Capabilities::AV_INFO, self.get_system_av_info.is_some());
        caps.set(Capabilities::SET_ENVIRONMENT, self.set_environment.is_some());
        caps.set(Capabilities::SET_VIDEO_REFRESH, self.set_video_refresh.is_some());
        caps.set(Capabilities::SET_AUDIO_SAMPLE, self.set_audio_sample.is_some());
        caps.set(
            Capabilities::SET_AUDIO_SAMPLE_BATCH,
            self.set_audio_sample_batch.is_some(),
        );
        caps.set(Capabilities::SET_INPUT_POLL, self.set_input_poll.is_some());
        caps.set(Capabilities::SET_INPUT_STATE, self.set_input_state.is_some());
        caps
    }
}

/// Look up one exported function, copying the pointer out of the symbol.
///
/// # Safety
/// `T` must match the symbol's real signature.
unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Option<T> {
    match unsafe { library.get::<T>(name.as_bytes()) } {
        Ok(sym) => Some(*sym),
        Err(err) => {
            debug!("{name} not resolved: {err}");
            None
        }
    }
}

/// A libretro core loaded from a shared library.
pub struct DylibCore {
    path: PathBuf,
    entry: EntryPoints,
    capabilities: Capabilities,
    // Keeps every pointer in `entry` valid. Dropped last.
    _library: Library,
}

impl DylibCore {
    /// Open the shared library at `path` and bind whatever entry points it exports.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        // SAFETY: loading runs the module's initialisers; a libretro core is
        // expected to have none with observable side effects.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
        // SAFETY: the names resolved are the libretro entry points, whose
        // signatures `EntryPoints` mirrors.
        let entry = unsafe { EntryPoints::resolve(&library) };
        let capabilities = entry.capabilities();
        info!(
            "opened core {} ({} of {} entry points)",
            path.display(),
            capabilities.iter().count(),
            Capabilities::all().iter().count()
        );

        Ok(Self {
            path: path.to_path_buf(),
            entry,
            capabilities,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for DylibCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DylibCore")
            .field("path", &self.path)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

// SAFETY (for every call below): the pointers were resolved from `_library`,
// which outlives them, and match the libretro signatures.
impl CoreApi for DylibCore {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn init(&self) {
        if let Some(f) = self.entry.init {
            unsafe { f() }
        }
    }

    fn deinit(&self) {
        if let Some(f) = self.entry.deinit {
            unsafe { f() }
        }
    }

    fn load_game(&self, game: &GameInfo) -> bool {
        match self.entry.load_game {
            Some(f) => unsafe { f(game) },
            None => false,
        }
    }

    fn unload_game(&self) {
        if let Some(f) = self.entry.unload_game {
            unsafe { f() }
        }
    }

    fn run(&self) {
        if let Some(f) = self.entry.run {
            unsafe { f() }
        }
    }

    fn system_av_info(&self, info: &mut SystemAvInfo) {
        if let Some(f) = self.entry.get_system_av_info {
            unsafe { f(info) }
        }
    }

    fn set_environment(&self, callback: EnvironmentFn) {
        if let Some(f) = self.entry.set_environment {
            unsafe { f(callback) }
        }
    }

    fn set_video_refresh(&self, callback: VideoRefreshFn) {
        if let Some(f) = self.entry.set_video_refresh {
            unsafe { f(callback) }
        }
    }

    fn set_audio_sample(&self, callback: AudioSampleFn) {
        if let Some(f) = self.entry.set_audio_sample {
            unsafe { f(callback) }
        }
    }

    fn set_audio_sample_batch(&self, callback: AudioSampleBatchFn) {
        if let Some(f) = self.entry.set_audio_sample_batch {
            unsafe { f(callback) }
        }
    }

    fn set_input_poll(&self, callback: InputPollFn) {
        if let Some(f) = self.entry.set_input_poll {
            unsafe { f(callback) }
        }
    }

    fn set_input_state(&self, callback: InputStateFn) {
        if let Some(f) = self.entry.set_input_state {
            unsafe { f(callback) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_not_found() {
        let err = DylibCore::open("/nonexistent/emuhost/core_libretro.so").unwrap_err();
        match &err {
            LoadError::NotFound { path, .. } => {
                assert_eq!(path, Path::new("/nonexistent/emuhost/core_libretro.so"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("failed to open core"));
    }

    #[test]
    fn empty_table_has_no_capabilities() {
        assert_eq!(EntryPoints::default().capabilities(), Capabilities::empty());
    }

    #[test]
    fn incompatible_abi_lists_names() {
        let err = LoadError::IncompatibleAbi {
            missing: vec![entry_points::RUN, entry_points::LOAD_GAME],
        };
        assert_eq!(
            err.to_string(),
            "core is missing required entry points: retro_run, retro_load_game"
        );
    }
}
