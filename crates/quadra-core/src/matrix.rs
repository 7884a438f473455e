//! 8x8 matrix switch engine
//!
//! Routes one of eight signal inputs to one of eight outputs. The input and
//! output selections are each the sum of a stored select parameter and a
//! control-voltage input, clamped and mapped onto a discrete index. In
//! "active only" mode the selection range covers just the enabled channels,
//! and the dense index is compacted back onto absolute channel numbers by
//! walking the enable flags.
//!
//! The selected input is staged through scratch storage before the buffer is
//! cleared and the output written: input and output channel indices can
//! alias on the shared block buffer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::block::{BlockBuffer, Sample};
use crate::params::{ParamDesc, ParamStore};
use crate::processor::Processor;
use crate::state::CustomState;

/// Signal channels per side.
pub const NUM_CHANNELS: usize = 8;

// Parameter indices
pub const P_IN_SEL: usize = 0;
pub const P_OUT_SEL: usize = 1;
pub const P_USE_ACTIVE: usize = 2;
pub const P_IN_EN: usize = 3; // ..P_IN_EN + 8
pub const P_OUT_EN: usize = P_IN_EN + NUM_CHANNELS; // ..P_OUT_EN + 8

// Buffer channel layout. Outputs share the low channels with the CV and
// signal inputs, which is why routing stages through scratch.
pub const CH_IN_SEL_CV: usize = 0;
pub const CH_OUT_SEL_CV: usize = 1;
pub const CH_SIG_IN: usize = 2; // ..CH_SIG_IN + 8
pub const CH_SIG_OUT: usize = 0; // ..CH_SIG_OUT + 8
pub const MATRIX_BUFFER_CHANNELS: usize = CH_SIG_IN + NUM_CHANNELS;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
struct MatrixState {
    in_sel: f32,
    out_sel: f32,
    use_active: bool,
}

/// The matrix switch engine.
pub struct MatrixSwitch {
    params: Arc<ParamStore>,
    staging: Vec<Sample>,
    last_in: AtomicUsize,
    last_out: AtomicUsize,
}

impl MatrixSwitch {
    /// Parameter table for the matrix switch; the plugin builds its
    /// [`ParamStore`] from this.
    pub fn param_descs() -> Vec<ParamDesc> {
        let mut descs = vec![
            ParamDesc::new("insel", "In Sel", -1.0, 1.0, 0.0).steps(0.05, 0.005),
            ParamDesc::new("outsel", "Out Sel", -1.0, 1.0, 0.0).steps(0.05, 0.005),
            ParamDesc::toggle("active", "Active"),
        ];
        for i in 0..NUM_CHANNELS {
            descs.push(ParamDesc::toggle(
                format!("inen{}", i + 1),
                format!("In {}", i + 1),
            ));
        }
        for i in 0..NUM_CHANNELS {
            descs.push(ParamDesc::toggle(
                format!("outen{}", i + 1),
                format!("Out {}", i + 1),
            ));
        }
        descs
    }

    pub fn new(params: Arc<ParamStore>) -> Self {
        Self {
            params,
            staging: Vec::new(),
            last_in: AtomicUsize::new(0),
            last_out: AtomicUsize::new(0),
        }
    }

    /// The channel pair resolved on the most recent block, for the editor
    /// readout.
    pub fn last_selection(&self) -> (usize, usize) {
        (
            self.last_in.load(Ordering::Relaxed),
            self.last_out.load(Ordering::Relaxed),
        )
    }

    fn enable_flags(&self, base: usize) -> [bool; NUM_CHANNELS] {
        let mut flags = [false; NUM_CHANNELS];
        for (i, f) in flags.iter_mut().enumerate() {
            *f = self.params.get_bool(base + i);
        }
        flags
    }
}

/// Map a select voltage onto `[0, active_count)`.
fn dense_index(select: f32, active_count: usize) -> usize {
    let clamped = select.clamp(-1.0, 0.999);
    ((clamped + 1.0) * active_count as f32 / 2.0) as usize
}

/// Resolve the k-th enabled channel, 0-indexed. Overruns clamp to the last
/// enabled channel; with nothing enabled the result is channel 0, which the
/// caller's liveness check then rejects.
fn nth_enabled(flags: &[bool; NUM_CHANNELS], k: usize) -> usize {
    let mut seen = 0;
    let mut last = 0;
    for (ch, enabled) in flags.iter().enumerate() {
        if *enabled {
            if seen == k {
                return ch;
            }
            seen += 1;
            last = ch;
        }
    }
    last
}

impl Processor for MatrixSwitch {
    fn name(&self) -> &'static str {
        "msw8"
    }

    fn prepare(&mut self, _sample_rate: f64, max_frames: usize) {
        self.staging.clear();
        self.staging.resize(max_frames, 0.0);
    }

    fn process(&mut self, io: &mut BlockBuffer, frames: usize) {
        let cv_in = io.channel(CH_IN_SEL_CV)[0];
        let cv_out = io.channel(CH_OUT_SEL_CV)[0];

        let in_enabled = self.enable_flags(P_IN_EN);
        let out_enabled = self.enable_flags(P_OUT_EN);
        let use_active = self.params.get_bool(P_USE_ACTIVE);

        let in_count = if use_active {
            in_enabled.iter().filter(|e| **e).count()
        } else {
            NUM_CHANNELS
        };
        let out_count = if use_active {
            out_enabled.iter().filter(|e| **e).count()
        } else {
            NUM_CHANNELS
        };

        let dense_in = dense_index(self.params.get(P_IN_SEL) + cv_in, in_count);
        let dense_out = dense_index(self.params.get(P_OUT_SEL) + cv_out, out_count);

        let (in_idx, out_idx) = if use_active {
            (
                nth_enabled(&in_enabled, dense_in),
                nth_enabled(&out_enabled, dense_out),
            )
        } else {
            (
                dense_in.min(NUM_CHANNELS - 1),
                dense_out.min(NUM_CHANNELS - 1),
            )
        };
        self.last_in.store(in_idx, Ordering::Relaxed);
        self.last_out.store(out_idx, Ordering::Relaxed);

        let live = in_enabled[in_idx] && out_enabled[out_idx];

        if live {
            io.read_channel(CH_SIG_IN + in_idx, &mut self.staging, frames);
        }
        io.clear(frames);
        if live {
            io.write_channel(CH_SIG_OUT + out_idx, &self.staging, frames);
        }
    }

    fn set_input_enabled(&mut self, index: usize, enabled: bool) {
        if index < NUM_CHANNELS {
            self.params
                .set(P_IN_EN + index, if enabled { 1.0 } else { 0.0 });
        }
    }

    fn set_output_enabled(&mut self, index: usize, enabled: bool) {
        if index < NUM_CHANNELS {
            self.params
                .set(P_OUT_EN + index, if enabled { 1.0 } else { 0.0 });
        }
    }

    fn save_state(&self) -> CustomState {
        let state = MatrixState {
            in_sel: self.params.get(P_IN_SEL),
            out_sel: self.params.get(P_OUT_SEL),
            use_active: self.params.get_bool(P_USE_ACTIVE),
        };
        serde_yaml::to_value(state).unwrap_or(CustomState::Null)
    }

    fn load_state(&mut self, state: &CustomState) {
        // Legacy documents have no custom section; the selects were already
        // restored through the params tree.
        if state.is_null() {
            return;
        }
        let state: MatrixState = serde_yaml::from_value(state.clone()).unwrap_or_default();
        self.params.set_silent(P_IN_SEL, state.in_sel);
        self.params.set_silent(P_OUT_SEL, state.out_sel);
        self.params
            .set_silent(P_USE_ACTIVE, if state.use_active { 1.0 } else { 0.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_matrix() -> (MatrixSwitch, Arc<ParamStore>, BlockBuffer) {
        let params = Arc::new(ParamStore::new(MatrixSwitch::param_descs()));
        let mut m = MatrixSwitch::new(params.clone());
        m.prepare(48_000.0, 16);
        let mut io = BlockBuffer::new(MATRIX_BUFFER_CHANNELS);
        io.prepare(16);
        (m, params, io)
    }

    fn enable(params: &ParamStore, base: usize, channels: &[usize]) {
        for ch in channels {
            params.set(base + ch, 1.0);
        }
    }

    #[test]
    fn test_nth_enabled_resolves_kth_channel() {
        // Channels 1, 2, 4 enabled: dense index 2 is the third enabled
        // channel, which is absolute channel 4.
        let flags = [false, true, true, false, true, false, false, false];
        assert_eq!(nth_enabled(&flags, 0), 1);
        assert_eq!(nth_enabled(&flags, 1), 2);
        assert_eq!(nth_enabled(&flags, 2), 4);
    }

    #[test]
    fn test_nth_enabled_overrun_clamps_to_last() {
        let flags = [false, true, true, false, true, false, false, false];
        assert_eq!(nth_enabled(&flags, 3), 4);
        assert_eq!(nth_enabled(&flags, 7), 4);
    }

    #[test]
    fn test_dense_index_spans_full_range() {
        assert_eq!(dense_index(-1.0, 8), 0);
        assert_eq!(dense_index(0.0, 8), 4);
        assert_eq!(dense_index(0.999, 8), 7);
        // Over-range selects clamp rather than wrap
        assert_eq!(dense_index(5.0, 8), 7);
        assert_eq!(dense_index(-5.0, 8), 0);
    }

    #[test]
    fn test_routes_selected_input_to_selected_output() {
        let (mut m, params, mut io) = make_matrix();
        enable(&params, P_IN_EN, &[3]);
        enable(&params, P_OUT_EN, &[5]);
        params.set(P_IN_SEL, -0.2); // dense 3 of 8
        params.set(P_OUT_SEL, 0.3); // dense 5 of 8

        for s in io.channel_mut(CH_SIG_IN + 3) {
            *s = 0.5;
        }
        m.process(&mut io, 16);

        assert_eq!(io.channel(CH_SIG_OUT + 5), &[0.5; 16]);
        assert_eq!(m.last_selection(), (3, 5));
    }

    #[test]
    fn test_disabled_endpoint_silences_output() {
        let (mut m, params, mut io) = make_matrix();
        enable(&params, P_IN_EN, &[0]);
        // No outputs enabled: nothing may pass
        for s in io.channel_mut(CH_SIG_IN) {
            *s = 1.0;
        }
        m.process(&mut io, 16);

        for out in 0..NUM_CHANNELS {
            assert_eq!(io.channel(CH_SIG_OUT + out), &[0.0; 16]);
        }
    }

    #[test]
    fn test_active_only_compaction_selects_absolute_channel() {
        let (mut m, params, mut io) = make_matrix();
        params.set(P_USE_ACTIVE, 1.0);
        enable(&params, P_IN_EN, &[1, 2, 4]);
        enable(&params, P_OUT_EN, &[0]);
        // Dense range is [0, 3); a select just under the top lands on
        // dense index 2, which must compact to absolute channel 4.
        params.set(P_IN_SEL, 0.999);
        params.set(P_OUT_SEL, -1.0);

        for s in io.channel_mut(CH_SIG_IN + 4) {
            *s = 0.25;
        }
        m.process(&mut io, 16);

        assert_eq!(m.last_selection(), (4, 0));
        assert_eq!(io.channel(CH_SIG_OUT), &[0.25; 16]);
    }

    #[test]
    fn test_aliased_input_output_channel_survives_routing() {
        // Input 2 lives on the same buffer channel as output 4; routing
        // in 2 -> out 4 must not read cleared data.
        let (mut m, params, mut io) = make_matrix();
        enable(&params, P_IN_EN, &[2]);
        enable(&params, P_OUT_EN, &[4]);
        params.set(P_IN_SEL, -0.4); // dense 2
        params.set(P_OUT_SEL, 0.2); // dense 4

        for s in io.channel_mut(CH_SIG_IN + 2) {
            *s = 0.75;
        }
        m.process(&mut io, 16);
        assert_eq!(io.channel(CH_SIG_OUT + 4), &[0.75; 16]);
    }

    #[test]
    fn test_state_round_trip() {
        let (mut m, params, _io) = make_matrix();
        params.set(P_IN_SEL, 0.5);
        params.set(P_OUT_SEL, -0.25);
        params.set(P_USE_ACTIVE, 1.0);

        let saved = m.save_state();

        let (mut fresh, fresh_params, _io2) = make_matrix();
        fresh.load_state(&saved);
        assert_eq!(fresh_params.get(P_IN_SEL), 0.5);
        assert_eq!(fresh_params.get(P_OUT_SEL), -0.25);
        assert!(fresh_params.get_bool(P_USE_ACTIVE));
    }
}
