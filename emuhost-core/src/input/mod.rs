//! Input module for emuhost-core.
//!
//! Responsibilities:
//! - Hold the pressed/released state of the port 0 digital joypad.
//! - Let the host's input path (possibly another thread) update it at any time.
//! - Answer the core's input-state queries during a step.
//!
//! The core's input-poll callback does nothing: the host keeps the mask current
//! out of band instead of polling a device. A single atomic word backs the mask,
//! so a reader sees either the old or the new state of a button, never a mix.

use crate::abi::{JOYPAD_BUTTON_COUNT, JoypadButton};
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

/// Bitset of pressed joypad buttons, one bit per libretro joypad id.
///
/// Clones share the same bits; hand one to the input thread and keep one in the
/// session.
#[derive(Clone, Debug, Default)]
pub struct InputMask {
    bits: Arc<AtomicU16>,
}

impl InputMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the bit for `id`. Ids outside the joypad range are ignored.
    pub fn set(&self, id: u32, pressed: bool) {
        let Some(bit) = bit_for(id) else {
            trace!("ignoring input for out-of-range button id {id}");
            return;
        };
        if pressed {
            self.bits.fetch_or(bit, Ordering::Relaxed);
        } else {
            self.bits.fetch_and(!bit, Ordering::Relaxed);
        }
    }

    pub fn set_button(&self, button: JoypadButton, pressed: bool) {
        self.set(button.id(), pressed);
    }

    pub fn is_pressed(&self, id: u32) -> bool {
        bit_for(id).is_some_and(|bit| self.bits() & bit != 0)
    }

    pub fn bits(&self) -> u16 {
        self.bits.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.bits.store(0, Ordering::Relaxed);
    }
}

fn bit_for(id: u32) -> Option<u16> {
    (id < JOYPAD_BUTTON_COUNT).then(|| 1u16 << id)
}
