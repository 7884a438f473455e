//! Control-surface layer for the quadra plugin suite
//!
//! The host exposes a tiny fixed surface: four encoders with push switches,
//! eight buttons, four navigation keys and two shift keys. This crate
//! multiplexes that surface over an arbitrarily large parameter space:
//!
//! - [`control`] — the control abstraction physical events land on
//! - [`pages`] — views holding pages of encoder/button control slots, with
//!   the single-active-page navigation state machine
//! - [`dispatch`] — raw hardware events to the active page's controls
//! - [`sequencer`] — the composite layer/mode editor used by the sequencer
//!   plugins
//!
//! Everything here runs on the control-event context; nothing is touched
//! from the audio path.

pub mod control;
pub mod dispatch;
pub mod pages;
pub mod sequencer;

pub use control::{
    button_slots, param_slot, slot, Control, ControlRef, MomentaryButton, ParamControl, Rgb, Slot,
    ToggleButton,
};
pub use dispatch::{Dispatcher, NavKey};
pub use pages::{PagedEditor, BUTTON_SLOTS, PARAM_SLOTS};
pub use sequencer::{EncoderMode, SequencerEditor};
