//! The contract every plugin engine implements for the host
//!
//! The host calls `prepare` once when processing starts (or the block size
//! changes), then `process` once per audio block on the real-time thread.
//! `save_state`/`load_state` run only on the control thread while processing
//! is suspended, so engines never see them race against `process`.

use crate::block::BlockBuffer;
use crate::state::CustomState;

pub trait Processor {
    fn name(&self) -> &'static str;

    /// Size internal scratch storage. No allocation is permitted after this.
    fn prepare(&mut self, sample_rate: f64, max_frames: usize);

    /// Process one block in place. Channel `i` of `io` is both input and
    /// output channel `i`; implementations must not assume they differ.
    fn process(&mut self, io: &mut BlockBuffer, frames: usize);

    /// Host-mirrored channel enables. Engines that gate routing on them
    /// override these; indices out of range are ignored.
    fn set_input_enabled(&mut self, _index: usize, _enabled: bool) {}

    fn set_output_enabled(&mut self, _index: usize, _enabled: bool) {}

    /// Engine-specific persisted state, stored under the document's custom
    /// section. Engines with nothing beyond their parameters return `Null`.
    fn save_state(&self) -> CustomState {
        CustomState::Null
    }

    fn load_state(&mut self, _state: &CustomState) {}
}
