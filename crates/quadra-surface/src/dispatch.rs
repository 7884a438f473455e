//! Physical-control event dispatch
//!
//! Routes raw hardware events to the active page's controls. Encoder motion
//! inside the dead zone is noise from the detents and is dropped. Holding an
//! encoder's switch while rotating latches fine mode for that encoder; a
//! press-and-release with no rotation resets the control instead. Navigation
//! keys act on the release edge only so holding one never repeat-fires.

use crate::pages::{PagedEditor, PARAM_SLOTS};

/// Encoder deltas inside this band are ignored.
pub const DEAD_ZONE: f32 = 0.01;

/// The four navigation keys between the encoder row and the button row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
}

/// Per-encoder switch state for fine mode and reset gating.
#[derive(Default)]
pub struct Dispatcher {
    held: [bool; PARAM_SLOTS],
    fine_latched: [bool; PARAM_SLOTS],
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder rotation. The sign picks the direction; a held switch makes
    /// the step fine and latches the encoder out of reset-on-release.
    pub fn on_encoder(&mut self, editor: &PagedEditor, encoder: usize, delta: f32) {
        if encoder >= PARAM_SLOTS || delta.abs() < DEAD_ZONE {
            return;
        }
        let Some(control) = editor.active_param_slot(encoder) else {
            return;
        };
        let fine = self.held[encoder];
        if fine {
            self.fine_latched[encoder] = true;
        }
        if delta > 0.0 {
            control.borrow_mut().inc(fine);
        } else {
            control.borrow_mut().dec(fine);
        }
    }

    /// Encoder push switch. Acts on release: a hold with no rotation resets
    /// the bound control; the fine latch clears either way.
    pub fn on_encoder_switch(&mut self, editor: &PagedEditor, encoder: usize, pressed: bool) {
        if encoder >= PARAM_SLOTS {
            return;
        }
        if pressed {
            self.held[encoder] = true;
            return;
        }
        if !self.fine_latched[encoder] {
            if let Some(control) = editor.active_param_slot(encoder) {
                log::debug!("surface: encoder {encoder} reset");
                control.borrow_mut().reset();
            }
        }
        self.fine_latched[encoder] = false;
        self.held[encoder] = false;
    }

    /// One of the eight general buttons; both edges go to the control.
    pub fn on_button(&mut self, editor: &PagedEditor, button: usize, pressed: bool) {
        let Some(control) = editor.active_button_slot(button) else {
            return;
        };
        if pressed {
            control.borrow_mut().on_down();
        } else {
            control.borrow_mut().on_up();
        }
    }

    /// Navigation keys: Up/Down move the param page, Left/Right the button
    /// page, release edge only.
    pub fn on_nav(&mut self, editor: &mut PagedEditor, key: NavKey, pressed: bool) {
        if pressed {
            return;
        }
        match key {
            NavKey::Up => editor.chg_param_page(-1),
            NavKey::Down => editor.chg_param_page(1),
            NavKey::Left => editor.chg_button_page(-1),
            NavKey::Right => editor.chg_button_page(1),
        }
        log::debug!(
            "surface: nav {key:?} -> param page {} button page {}",
            editor.param_page(),
            editor.button_page()
        );
    }
}
