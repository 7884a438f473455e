//! Concrete plugins
//!
//! Each plugin pairs an engine from `quadra-core` with a surface layout from
//! `quadra-surface` and the MIDI automation table from `quadra-midi`, and
//! persists the whole assembly through the structured state document:
//!
//! - [`matrix`] — the 8x8 matrix switch (`msw8`)
//! - [`rack`] — the four-slot algorithm rack (`swat`)
//!
//! The audio path is `process` only; everything else (events, pumping,
//! save/load) belongs to the control context.

pub mod matrix;
pub mod rack;

pub use matrix::MatrixPlugin;
pub use rack::RackPlugin;
