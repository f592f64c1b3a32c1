//! C ABI over [`Session`], for hosts that call in through JNI or similar.
//!
//! Every function takes the opaque pointer returned by [`emuhost_session_new`].
//! Null pointers, invalid strings and panics all map to the failure sentinel
//! (`false`, `0`, or the fallback sample rate); nothing unwinds into the caller.
//!
//! Input may be driven from another thread through a separate handle from
//! [`emuhost_input_handle`]; the session pointer itself must only be used from one
//! thread at a time.

use crate::runtime::DEFAULT_SAMPLE_RATE;
use crate::{InputMask, Session};
use log::error;
use std::ffi::{CStr, c_char};
use std::os::raw::c_uint;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

fn guard<R>(fallback: R, f: impl FnOnce() -> R) -> R {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!("panic in emuhost C API call");
        fallback
    })
}

/// # Safety
/// `path` must be null or a valid NUL-terminated string.
unsafe fn path_arg(path: *const c_char) -> Option<PathBuf> {
    if path.is_null() {
        return None;
    }
    let path = unsafe { CStr::from_ptr(path) };
    path.to_str().ok().map(PathBuf::from)
}

#[unsafe(no_mangle)]
pub extern "C" fn emuhost_session_new() -> *mut Session {
    Box::into_raw(Box::new(Session::new()))
}

/// Unloads everything and frees the session.
///
/// # Safety
/// `session` must be null or a pointer from [`emuhost_session_new`] not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_session_free(session: *mut Session) {
    if session.is_null() {
        return;
    }
    let session = unsafe { Box::from_raw(session) };
    guard((), move || drop(session));
}

/// # Safety
/// `session` must be a live session pointer or null; `path` a NUL-terminated
/// string or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_load_core(session: *mut Session, path: *const c_char) -> bool {
    let (Some(session), Some(path)) = (unsafe { session.as_mut() }, unsafe { path_arg(path) })
    else {
        return false;
    };
    guard(false, || session.load(path))
}

/// # Safety
/// As [`emuhost_load_core`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_load_game(session: *mut Session, path: *const c_char) -> bool {
    let (Some(session), Some(path)) = (unsafe { session.as_mut() }, unsafe { path_arg(path) })
    else {
        return false;
    };
    guard(false, || session.load_game(path))
}

/// Negative ids are ignored.
///
/// # Safety
/// `session` must be a live session pointer or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_set_input_state(
    session: *const Session,
    button_id: i32,
    pressed: bool,
) {
    let Some(session) = (unsafe { session.as_ref() }) else {
        return;
    };
    if let Ok(id) = u32::try_from(button_id) {
        session.set_input_state(id, pressed);
    }
}

/// Runs one step. Writes the frame into `video` (`video_len` bytes) and up to
/// `audio_capacity` samples into `audio`; returns the number of samples written.
///
/// # Safety
/// `session` must be a live session pointer or null. `video` must be null or valid
/// for `video_len` bytes, `audio` null or valid for `audio_capacity` i16 values.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_run_frame(
    session: *mut Session,
    video: *mut u8,
    video_len: usize,
    audio: *mut i16,
    audio_capacity: usize,
) -> usize {
    let Some(session) = (unsafe { session.as_mut() }) else {
        return 0;
    };
    let video: &mut [u8] = if video.is_null() {
        &mut []
    } else {
        unsafe { std::slice::from_raw_parts_mut(video, video_len) }
    };
    let audio: &mut [i16] = if audio.is_null() {
        &mut []
    } else {
        unsafe { std::slice::from_raw_parts_mut(audio, audio_capacity) }
    };
    guard(0, || session.run_frame(video, audio))
}

/// # Safety
/// `session` must be a live session pointer or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_frame_width(session: *const Session) -> c_uint {
    unsafe { session.as_ref() }.map_or(0, |s| s.frame().width())
}

/// # Safety
/// `session` must be a live session pointer or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_frame_height(session: *const Session) -> c_uint {
    unsafe { session.as_ref() }.map_or(0, |s| s.frame().height())
}

/// # Safety
/// `session` must be a live session pointer or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_sample_rate(session: *mut Session) -> f64 {
    let Some(session) = (unsafe { session.as_mut() }) else {
        return DEFAULT_SAMPLE_RATE;
    };
    let fallback = session.config().fallback_sample_rate;
    guard(fallback, || session.sample_rate())
}

/// # Safety
/// `session` must be a live session pointer or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_unload(session: *mut Session) {
    if let Some(session) = unsafe { session.as_mut() } {
        guard((), || session.unload());
    }
}

/// A joypad handle usable from any thread; free with [`emuhost_input_free`].
///
/// # Safety
/// `session` must be a live session pointer or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_input_handle(session: *const Session) -> *mut InputMask {
    match unsafe { session.as_ref() } {
        Some(session) => Box::into_raw(Box::new(session.input_mask())),
        None => std::ptr::null_mut(),
    }
}

/// # Safety
/// `mask` must be null or a live pointer from [`emuhost_input_handle`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_input_set(mask: *const InputMask, button_id: i32, pressed: bool) {
    let Some(mask) = (unsafe { mask.as_ref() }) else {
        return;
    };
    if let Ok(id) = u32::try_from(button_id) {
        mask.set(id, pressed);
    }
}

/// # Safety
/// `mask` must be null or a pointer from [`emuhost_input_handle`] not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn emuhost_input_free(mask: *mut InputMask) {
    if !mask.is_null() {
        drop(unsafe { Box::from_raw(mask) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn null_arguments_yield_sentinels() {
        unsafe {
            assert!(!emuhost_load_core(std::ptr::null_mut(), std::ptr::null()));
            assert!(!emuhost_load_game(std::ptr::null_mut(), std::ptr::null()));
            let written = emuhost_run_frame(
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                0,
                std::ptr::null_mut(),
                0,
            );
            assert_eq!(written, 0);
            assert_eq!(emuhost_frame_width(std::ptr::null()), 0);
            assert_eq!(emuhost_sample_rate(std::ptr::null_mut()), DEFAULT_SAMPLE_RATE);
            assert!(emuhost_input_handle(std::ptr::null()).is_null());
            emuhost_set_input_state(std::ptr::null(), 3, true);
            emuhost_unload(std::ptr::null_mut());
            emuhost_session_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn session_round_trip_without_core() {
        let session = emuhost_session_new();
        let missing = CString::new("/nonexistent/emuhost/core.so").unwrap();
        let game = CString::new("/nonexistent/game.gb").unwrap();
        unsafe {
            assert!(!emuhost_load_core(session, missing.as_ptr()));
            assert!(!emuhost_load_game(session, game.as_ptr()));

            let mut audio = [0i16; 16];
            let written = emuhost_run_frame(
                session,
                std::ptr::null_mut(),
                0,
                audio.as_mut_ptr(),
                audio.len(),
            );
            assert_eq!(written, 0);
            assert_eq!(emuhost_sample_rate(session), DEFAULT_SAMPLE_RATE);

            let mask = emuhost_input_handle(session);
            emuhost_input_set(mask, 8, true);
            emuhost_input_set(mask, -1, true);
            assert!((*session).bridge().input().is_pressed(8));
            emuhost_set_input_state(session, 8, false);
            assert_eq!((*mask).bits(), 0);
            emuhost_input_free(mask);

            emuhost_session_free(session);
        }
    }
}
