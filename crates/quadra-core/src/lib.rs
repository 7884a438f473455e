//! Core engine layer for the quadra plugin suite
//!
//! This crate provides everything a plugin's audio side needs:
//! - Parameter descriptors and the atomic parameter store shared between the
//!   control/MIDI context and the audio context
//! - Preallocated multi-channel block buffers
//! - The `Processor` contract plugins implement for the host
//! - The structured state document used for save/load
//! - The two routing/selection engines: the 8x8 matrix switch and the
//!   four-slot algorithm rack
//!
//! # Threading
//!
//! Parameter values are f32 bit patterns in atomics: the control context is
//! the sole writer, the audio context only reads. Structural changes that
//! cannot be expressed as a scalar write (algorithm swaps) travel over a
//! lock-free rtrb queue and are applied at block boundaries.

pub mod algos;
pub mod block;
pub mod matrix;
pub mod params;
pub mod processor;
pub mod rack;
pub mod state;

pub use algos::{Algo, AlgoId};
pub use block::{BlockBuffer, Sample};
pub use matrix::{MatrixSwitch, NUM_CHANNELS};
pub use params::{ChangeOrigin, ParamChange, ParamDesc, ParamStore};
pub use processor::Processor;
pub use rack::{AlgoRack, RackControl, NUM_ENGINES};
pub use state::{AutomationKind, AutomationRecord, CustomState, MidiState, StateDoc};
