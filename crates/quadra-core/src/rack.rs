//! Four-slot algorithm rack engine
//!
//! Each slot runs one [`Algo`] over three inputs and two outputs on the
//! shared block buffer. Algorithm swaps never happen on the audio thread:
//! [`RackControl`] builds and sizes the fresh instance on the control thread
//! and hands it over a lock-free queue; the audio side installs it at block
//! start and returns the old instance over a second queue for the control
//! thread to drop.

use std::mem;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::algos::{Algo, AlgoId, AlgoIo};
use crate::block::{BlockBuffer, Sample};
use crate::params::{ParamDesc, ParamStore};
use crate::processor::Processor;
use crate::state::CustomState;

/// Engine slots in the rack.
pub const NUM_ENGINES: usize = 4;
/// Inputs per slot (X, Y, Z).
pub const SLOT_INS: usize = 3;
/// Outputs per slot (A, B).
pub const SLOT_OUTS: usize = 2;

// Per-slot parameter layout, repeated at SLOT_STRIDE.
pub const SP_ALGO: usize = 0;
pub const SP_VAL1: usize = 1;
pub const SP_VAL2: usize = 2;
pub const SP_IN_EN: usize = 3; // ..SP_IN_EN + 3
pub const SP_OUT_EN: usize = 6; // ..SP_OUT_EN + 2
pub const SLOT_STRIDE: usize = 8;

// Buffer channel layout. Slot outputs share the low channels with slot
// inputs, so every slot's outputs are staged before the clear-and-write.
pub const CH_SLOT_IN: usize = 0; // slot * SLOT_INS + 0..3
pub const CH_SLOT_OUT: usize = 0; // slot * SLOT_OUTS + 0..2
pub const RACK_BUFFER_CHANNELS: usize = NUM_ENGINES * SLOT_INS;

const SWAP_QUEUE_LEN: usize = NUM_ENGINES * 2;

struct SwapCommand {
    slot: usize,
    algo: Algo,
}

/// Prepare settings published by the audio side so the control side can size
/// a fresh algorithm before sending it over.
struct RackShared {
    sample_rate_bits: AtomicU64,
    max_frames: AtomicUsize,
}

/// Control-thread handle for the rack: builds algorithm instances, sends
/// swaps, reclaims retired instances.
pub struct RackControl {
    swap_tx: rtrb::Producer<SwapCommand>,
    trash_rx: rtrb::Consumer<Algo>,
    shared: Arc<RackShared>,
}

impl RackControl {
    /// Build, size and send a fresh instance for `slot`. Dropped with a
    /// warning if the swap queue is full or the slot is out of range.
    pub fn set_algo(&mut self, slot: usize, id: AlgoId) {
        if slot >= NUM_ENGINES {
            log::warn!("algo swap for out-of-range slot {slot} dropped");
            return;
        }
        let mut algo = Algo::new(id);
        let sample_rate = f64::from_bits(self.shared.sample_rate_bits.load(Ordering::Relaxed));
        let max_frames = self.shared.max_frames.load(Ordering::Relaxed);
        if max_frames > 0 {
            algo.prepare(sample_rate, max_frames);
        }
        if self.swap_tx.push(SwapCommand { slot, algo }).is_err() {
            log::warn!("swap queue full, algo change for slot {slot} dropped");
        }
    }

    /// Drop algorithm instances the audio side has retired. Returns how many
    /// were reclaimed.
    pub fn collect(&mut self) -> usize {
        let mut n = 0;
        while self.trash_rx.pop().is_ok() {
            n += 1;
        }
        n
    }
}

/// The rack engine proper. Lives on the audio side once processing starts.
pub struct AlgoRack {
    params: Arc<ParamStore>,
    slots: Vec<Algo>,
    staging: Vec<Vec<Sample>>,
    swap_rx: rtrb::Consumer<SwapCommand>,
    trash_tx: rtrb::Producer<Algo>,
    shared: Arc<RackShared>,
    sample_rate: f64,
    max_frames: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RackState {
    algos: Vec<usize>,
}

impl AlgoRack {
    pub fn param_descs() -> Vec<ParamDesc> {
        let mut descs = Vec::with_capacity(NUM_ENGINES * SLOT_STRIDE);
        for slot in 1..=NUM_ENGINES {
            descs.push(ParamDesc::select(
                format!("algo{slot}"),
                format!("Algo {slot}"),
                (AlgoId::COUNT - 1) as f32,
            ));
            descs.push(ParamDesc::new(
                format!("val{slot}a"),
                format!("Val {slot}A"),
                -1.0,
                1.0,
                0.0,
            ));
            descs.push(ParamDesc::new(
                format!("val{slot}b"),
                format!("Val {slot}B"),
                -1.0,
                1.0,
                0.0,
            ));
            for label in ["X", "Y", "Z"] {
                descs.push(ParamDesc::toggle(
                    format!("in{slot}{}", label.to_lowercase()),
                    format!("In {slot}{label}"),
                ));
            }
            for label in ["A", "B"] {
                descs.push(ParamDesc::toggle(
                    format!("out{slot}{}", label.to_lowercase()),
                    format!("Out {slot}{label}"),
                ));
            }
        }
        descs
    }

    pub fn new(params: Arc<ParamStore>) -> (Self, RackControl) {
        let (swap_tx, swap_rx) = rtrb::RingBuffer::new(SWAP_QUEUE_LEN);
        let (trash_tx, trash_rx) = rtrb::RingBuffer::new(SWAP_QUEUE_LEN);
        let shared = Arc::new(RackShared {
            sample_rate_bits: AtomicU64::new(0.0f64.to_bits()),
            max_frames: AtomicUsize::new(0),
        });
        let rack = Self {
            params,
            slots: (0..NUM_ENGINES).map(|_| Algo::new(AlgoId::Display)).collect(),
            staging: Vec::new(),
            swap_rx,
            trash_tx,
            shared: shared.clone(),
            sample_rate: 0.0,
            max_frames: 0,
        };
        let control = RackControl {
            swap_tx,
            trash_rx,
            shared,
        };
        (rack, control)
    }

    /// Currently installed algorithm per slot, for the editor readout.
    pub fn slot_ids(&self) -> [AlgoId; NUM_ENGINES] {
        let mut ids = [AlgoId::Display; NUM_ENGINES];
        for (id, slot) in ids.iter_mut().zip(&self.slots) {
            *id = slot.id();
        }
        ids
    }

    fn apply_swaps(&mut self) {
        while let Ok(cmd) = self.swap_rx.pop() {
            if cmd.slot >= NUM_ENGINES {
                continue;
            }
            let old = mem::replace(&mut self.slots[cmd.slot], cmd.algo);
            // If the trash queue is full the old instance drops here; the
            // queue holds more than can be in flight, so that is a test-only
            // situation.
            let _ = self.trash_tx.push(old);
        }
    }

    fn install(&mut self, slot: usize, id: AlgoId) {
        let mut algo = Algo::new(id);
        if self.max_frames > 0 {
            algo.prepare(self.sample_rate, self.max_frames);
        }
        self.slots[slot] = algo;
    }
}

impl Processor for AlgoRack {
    fn name(&self) -> &'static str {
        "swat"
    }

    fn prepare(&mut self, sample_rate: f64, max_frames: usize) {
        self.sample_rate = sample_rate;
        self.max_frames = max_frames;
        self.shared
            .sample_rate_bits
            .store(sample_rate.to_bits(), Ordering::Relaxed);
        self.shared.max_frames.store(max_frames, Ordering::Relaxed);
        self.staging.clear();
        self.staging
            .resize(NUM_ENGINES * SLOT_OUTS, vec![0.0; max_frames]);
        for slot in &mut self.slots {
            slot.prepare(sample_rate, max_frames);
        }
    }

    fn process(&mut self, io: &mut BlockBuffer, frames: usize) {
        self.apply_swaps();

        let params = &self.params;
        for (slot, (algo, stag)) in self
            .slots
            .iter_mut()
            .zip(self.staging.chunks_mut(SLOT_OUTS))
            .enumerate()
        {
            let base = slot * SLOT_STRIDE;
            let vals = [params.get(base + SP_VAL1), params.get(base + SP_VAL2)];
            let in_base = CH_SLOT_IN + slot * SLOT_INS;
            let (sa, sb) = stag.split_at_mut(1);

            let mut input = [None; SLOT_INS];
            for (i, ch) in input.iter_mut().enumerate() {
                if params.get_bool(base + SP_IN_EN + i) {
                    *ch = Some(&io.channel(in_base + i)[..frames]);
                }
            }
            let [x, y, z] = input;
            let a = if params.get_bool(base + SP_OUT_EN) {
                Some(&mut sa[0][..frames])
            } else {
                None
            };
            let b = if params.get_bool(base + SP_OUT_EN + 1) {
                Some(&mut sb[0][..frames])
            } else {
                None
            };
            algo.process(AlgoIo { x, y, z, a, b }, vals, frames);
        }

        // Disabled outputs stay at the cleared silence.
        io.clear(frames);
        for slot in 0..NUM_ENGINES {
            let base = slot * SLOT_STRIDE;
            for out in 0..SLOT_OUTS {
                if self.params.get_bool(base + SP_OUT_EN + out) {
                    io.write_channel(
                        CH_SLOT_OUT + slot * SLOT_OUTS + out,
                        &self.staging[slot * SLOT_OUTS + out],
                        frames,
                    );
                }
            }
        }
    }

    fn set_input_enabled(&mut self, index: usize, enabled: bool) {
        if index < NUM_ENGINES * SLOT_INS {
            let param = (index / SLOT_INS) * SLOT_STRIDE + SP_IN_EN + index % SLOT_INS;
            self.params.set(param, if enabled { 1.0 } else { 0.0 });
        }
    }

    fn set_output_enabled(&mut self, index: usize, enabled: bool) {
        if index < NUM_ENGINES * SLOT_OUTS {
            let param = (index / SLOT_OUTS) * SLOT_STRIDE + SP_OUT_EN + index % SLOT_OUTS;
            self.params.set(param, if enabled { 1.0 } else { 0.0 });
        }
    }

    fn save_state(&self) -> CustomState {
        let state = RackState {
            algos: self.slots.iter().map(|s| s.id().index()).collect(),
        };
        serde_yaml::to_value(state).unwrap_or(CustomState::Null)
    }

    /// Runs on the control thread with processing suspended, so slots are
    /// installed directly rather than through the swap queue.
    fn load_state(&mut self, state: &CustomState) {
        if state.is_null() {
            return;
        }
        let state: RackState = serde_yaml::from_value(state.clone()).unwrap_or_default();
        for slot in 0..NUM_ENGINES {
            let id = state
                .algos
                .get(slot)
                .map(|i| AlgoId::from_index(*i))
                .unwrap_or(AlgoId::Display);
            self.install(slot, id);
            self.params
                .set_silent(slot * SLOT_STRIDE + SP_ALGO, id.index() as f32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rack() -> (AlgoRack, RackControl, Arc<ParamStore>, BlockBuffer) {
        let params = Arc::new(ParamStore::new(AlgoRack::param_descs()));
        let (mut rack, control) = AlgoRack::new(params.clone());
        rack.prepare(48_000.0, 8);
        let mut io = BlockBuffer::new(RACK_BUFFER_CHANNELS);
        io.prepare(8);
        (rack, control, params, io)
    }

    fn enable_slot(params: &ParamStore, slot: usize) {
        let base = slot * SLOT_STRIDE;
        for i in 0..SLOT_INS {
            params.set(base + SP_IN_EN + i, 1.0);
        }
        for i in 0..SLOT_OUTS {
            params.set(base + SP_OUT_EN + i, 1.0);
        }
    }

    #[test]
    fn test_display_slot_routes_x_to_a() {
        let (mut rack, _control, params, mut io) = make_rack();
        enable_slot(&params, 1);
        let in_x = CH_SLOT_IN + SLOT_INS; // slot 1 X
        for s in io.channel_mut(in_x) {
            *s = 0.5;
        }
        rack.process(&mut io, 8);
        assert_eq!(io.channel(CH_SLOT_OUT + SLOT_OUTS), &[0.5; 8]); // slot 1 A
    }

    #[test]
    fn test_disabled_output_is_cleared() {
        let (mut rack, _control, params, mut io) = make_rack();
        enable_slot(&params, 0);
        params.set(SP_OUT_EN, 0.0); // disable slot 0 A again
        for s in io.channel_mut(CH_SLOT_IN) {
            *s = 1.0;
        }
        rack.process(&mut io, 8);
        assert_eq!(io.channel(CH_SLOT_OUT), &[0.0; 8]);
    }

    #[test]
    fn test_disabled_input_reads_as_silence() {
        let (mut rack, _control, params, mut io) = make_rack();
        enable_slot(&params, 0);
        params.set(SP_IN_EN, 0.0); // disable slot 0 X
        for s in io.channel_mut(CH_SLOT_IN) {
            *s = 1.0;
        }
        rack.process(&mut io, 8);
        assert_eq!(io.channel(CH_SLOT_OUT), &[0.0; 8]);
    }

    #[test]
    fn test_swap_applies_at_block_start_and_retires_old() {
        let (mut rack, mut control, params, mut io) = make_rack();
        enable_slot(&params, 0);
        params.set(SP_VAL1, 0.75);

        control.set_algo(0, AlgoId::Constant);
        rack.process(&mut io, 8);

        assert_eq!(rack.slot_ids()[0], AlgoId::Constant);
        assert_eq!(io.channel(CH_SLOT_OUT), &[0.75; 8]);
        assert_eq!(control.collect(), 1);
    }

    #[test]
    fn test_out_of_range_slot_swap_is_dropped() {
        let (mut rack, mut control, _params, mut io) = make_rack();
        control.set_algo(NUM_ENGINES, AlgoId::Delay);
        rack.process(&mut io, 8);
        assert_eq!(control.collect(), 0);
    }

    #[test]
    fn test_state_round_trip() {
        let (mut rack, mut control, _params, mut io) = make_rack();
        control.set_algo(0, AlgoId::MinMax);
        control.set_algo(3, AlgoId::Delay);
        rack.process(&mut io, 8);
        let saved = rack.save_state();

        let (mut fresh, _fc, fresh_params, _io2) = make_rack();
        fresh.load_state(&saved);
        let ids = fresh.slot_ids();
        assert_eq!(ids[0], AlgoId::MinMax);
        assert_eq!(ids[3], AlgoId::Delay);
        assert_eq!(fresh_params.get(SP_ALGO), AlgoId::MinMax.index() as f32);
    }

    #[test]
    fn test_bad_algo_id_loads_as_display() {
        let (mut rack, _control, _params, _io) = make_rack();
        let state: CustomState =
            serde_yaml::from_str("algos: [99, 1, 2, 3]").unwrap();
        rack.load_state(&state);
        assert_eq!(rack.slot_ids()[0], AlgoId::Display);
        assert_eq!(rack.slot_ids()[1], AlgoId::Constant);
    }
}
