//! The algorithm rack plugin
//!
//! One view per engine slot: the param page carries the algorithm select and
//! the two value parameters, the button page the slot's channel enables.
//! Algorithm-select edits are picked up in `pump` and turned into swap
//! commands; the engine installs them at the next block.

use std::sync::Arc;

use anyhow::Context;
use quadra_core::rack::{
    AlgoRack, RackControl, NUM_ENGINES, SLOT_INS, SLOT_OUTS, SLOT_STRIDE, SP_ALGO, SP_IN_EN,
    SP_VAL1, SP_VAL2,
};
use quadra_core::{AlgoId, BlockBuffer, ParamChange, ParamStore, Processor, StateDoc};
use quadra_midi::{AutomationTable, MidiEvent, MidiIo};
use quadra_surface::{button_slots, param_slot, Dispatcher, NavKey, PagedEditor};

pub struct RackPlugin {
    params: Arc<ParamStore>,
    engine: AlgoRack,
    control: RackControl,
    editor: PagedEditor,
    dispatcher: Dispatcher,
    automation: AutomationTable,
    midi: MidiIo,
    midi_settings: quadra_core::MidiState,
    changes: flume::Receiver<ParamChange>,
}

impl RackPlugin {
    pub fn new() -> Self {
        let params = Arc::new(ParamStore::new(AlgoRack::param_descs()));
        let (engine, control) = AlgoRack::new(params.clone());
        let changes = params.changes();

        let mut editor = PagedEditor::new(NUM_ENGINES);
        for slot in 0..NUM_ENGINES {
            let base = slot * SLOT_STRIDE;
            editor.add_param_page(
                [
                    param_slot(&params, base + SP_ALGO),
                    param_slot(&params, base + SP_VAL1),
                    param_slot(&params, base + SP_VAL2),
                    None,
                ],
                slot,
            );
            // X/Y/Z and A/B enables are consecutive in the slot's params
            editor.add_button_page(
                button_slots(&params, base + SP_IN_EN, SLOT_INS + SLOT_OUTS),
                slot,
            );
        }

        Self {
            automation: AutomationTable::new(params.clone()),
            params,
            engine,
            control,
            editor,
            dispatcher: Dispatcher::new(),
            midi: MidiIo::closed(),
            midi_settings: quadra_core::MidiState::default(),
            changes,
        }
    }

    pub fn params(&self) -> &Arc<ParamStore> {
        &self.params
    }

    /// Bring the editor onto one engine slot's view.
    pub fn select_slot(&mut self, slot: usize) {
        if slot < NUM_ENGINES {
            self.editor.set_view(slot);
        }
    }

    pub fn selected_slot(&self) -> usize {
        self.editor.view()
    }

    /// Installed algorithm per slot, for the editor readout.
    pub fn slot_ids(&self) -> [AlgoId; NUM_ENGINES] {
        self.engine.slot_ids()
    }

    // ---- audio context ----

    pub fn prepare(&mut self, sample_rate: f64, max_frames: usize) {
        self.engine.prepare(sample_rate, max_frames);
    }

    pub fn process(&mut self, io: &mut BlockBuffer, frames: usize) {
        self.engine.process(io, frames);
    }

    // ---- control context ----

    pub fn on_encoder(&mut self, encoder: usize, delta: f32) {
        self.dispatcher.on_encoder(&self.editor, encoder, delta);
    }

    pub fn on_encoder_switch(&mut self, encoder: usize, pressed: bool) {
        self.dispatcher
            .on_encoder_switch(&self.editor, encoder, pressed);
    }

    pub fn on_button(&mut self, button: usize, pressed: bool) {
        self.dispatcher.on_button(&self.editor, button, pressed);
    }

    pub fn on_nav(&mut self, key: NavKey, pressed: bool) {
        self.dispatcher.on_nav(&mut self.editor, key, pressed);
    }

    pub fn set_learn(&mut self, on: bool) {
        self.automation.set_learn(on);
    }

    pub fn on_midi(&mut self, event: &MidiEvent) -> Option<MidiEvent> {
        self.automation.on_midi(event)
    }

    /// Drain MIDI input and parameter changes. Algorithm-select edits become
    /// swap commands; retired instances are reclaimed here too.
    pub fn pump(&mut self) -> Vec<MidiEvent> {
        let mut notes = Vec::new();
        if let Some(input) = &self.midi.input {
            while let Ok(event) = input.events().try_recv() {
                if let Some(note) = self.automation.on_midi(&event) {
                    notes.push(note);
                }
            }
        }
        while let Ok(change) = self.changes.try_recv() {
            if change.index % SLOT_STRIDE == SP_ALGO {
                let slot = change.index / SLOT_STRIDE;
                let id = AlgoId::from_index(change.value as usize);
                log::debug!("rack: slot {slot} -> {}", id.title());
                self.control.set_algo(slot, id);
            }
            self.automation.on_param_change(&change);
        }
        self.control.collect();
        notes
    }

    // ---- persistence (control context, processing suspended) ----

    pub fn save(&self) -> anyhow::Result<String> {
        let mut midi = self.midi_settings.clone();
        midi.automation = self.automation.records();
        let doc = StateDoc {
            params: self.params.snapshot(),
            midi,
            custom: self.engine.save_state(),
        };
        doc.to_yaml().context("serializing rack state")
    }

    pub fn load(&mut self, text: &str) {
        let doc = StateDoc::from_yaml(text);
        self.params.restore(&doc.params);
        self.engine.load_state(&doc.custom);
        if doc.custom.is_null() {
            // Legacy documents carry the slot algorithms only as params;
            // queue swaps so the engine catches up at the next block.
            for slot in 0..NUM_ENGINES {
                let value = self.params.get(slot * SLOT_STRIDE + SP_ALGO);
                self.control.set_algo(slot, AlgoId::from_index(value as usize));
            }
        }
        self.automation.load(&doc.midi.automation);
        self.automation.set_channel(doc.midi.channel);
        self.automation.set_note_input(doc.midi.note_input);
        self.midi_settings = doc.midi;
        self.midi = MidiIo::open(&self.midi_settings);
        self.automation
            .set_output(self.midi.output.as_ref().map(|o| o.sender()));
    }
}

impl Default for RackPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadra_core::rack::{RACK_BUFFER_CHANNELS, SP_OUT_EN};

    fn enable_slot(plugin: &RackPlugin, slot: usize) {
        let base = slot * SLOT_STRIDE;
        for i in 0..SLOT_INS {
            plugin.params().set(base + SP_IN_EN + i, 1.0);
        }
        for i in 0..SLOT_OUTS {
            plugin.params().set(base + SP_OUT_EN + i, 1.0);
        }
    }

    #[test]
    fn test_encoder_edit_swaps_algorithm() {
        let mut plugin = RackPlugin::new();
        plugin.prepare(48_000.0, 8);
        enable_slot(&plugin, 0);

        // Algo select is encoder 0 with unit steps; one coarse step selects
        // Constant
        plugin.on_encoder(0, 1.0);
        assert_eq!(plugin.params().get(SP_ALGO), 1.0);
        plugin.pump();

        plugin.params().set(SP_VAL1, 0.5);
        let mut io = BlockBuffer::new(RACK_BUFFER_CHANNELS);
        io.prepare(8);
        plugin.process(&mut io, 8);
        assert_eq!(io.channel(0), &[0.5; 8]);
    }

    #[test]
    fn test_slot_views_address_their_own_params() {
        let mut plugin = RackPlugin::new();
        plugin.select_slot(2);
        plugin.on_encoder(1, 1.0); // val 3A
        assert!(plugin.params().get(2 * SLOT_STRIDE + SP_VAL1) > 0.0);
        assert_eq!(plugin.params().get(SP_VAL1), 0.0);
    }

    #[test]
    fn test_document_round_trip_restores_slots() {
        let mut plugin = RackPlugin::new();
        plugin.prepare(48_000.0, 8);
        plugin.params().set(2 * SLOT_STRIDE + SP_ALGO, 3.0); // MinMax
        plugin.pump();
        let mut io = BlockBuffer::new(RACK_BUFFER_CHANNELS);
        io.prepare(8);
        plugin.process(&mut io, 8);
        let saved = plugin.save().unwrap();

        let mut fresh = RackPlugin::new();
        fresh.load(&saved);
        assert_eq!(fresh.params().get(2 * SLOT_STRIDE + SP_ALGO), 3.0);
        let mut io2 = BlockBuffer::new(RACK_BUFFER_CHANNELS);
        io2.prepare(8);
        fresh.prepare(48_000.0, 8);
        fresh.process(&mut io2, 8);
        assert_eq!(fresh.slot_ids()[2], AlgoId::MinMax);
    }

    #[test]
    fn test_legacy_document_syncs_slots_from_params() {
        let mut plugin = RackPlugin::new();
        plugin.prepare(48_000.0, 8);
        plugin.load("algo1: 2.0\n");
        assert_eq!(plugin.params().get(SP_ALGO), 2.0);

        let mut io = BlockBuffer::new(RACK_BUFFER_CHANNELS);
        io.prepare(8);
        plugin.process(&mut io, 8);
        assert_eq!(plugin.slot_ids()[0], AlgoId::PrecisionAdder);
    }
}
