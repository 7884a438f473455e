//! The matrix switch plugin
//!
//! Surface layout: one view, one param page (in select, out select,
//! active-only) and two button pages (input enables, output enables). MIDI
//! automation and the persisted document wrap the engine unchanged.

use std::sync::Arc;

use anyhow::Context;
use quadra_core::matrix::{
    MatrixSwitch, NUM_CHANNELS, P_IN_EN, P_IN_SEL, P_OUT_EN, P_OUT_SEL, P_USE_ACTIVE,
};
use quadra_core::{BlockBuffer, ParamChange, ParamStore, Processor, StateDoc};
use quadra_midi::{AutomationTable, MidiEvent, MidiIo};
use quadra_surface::{button_slots, param_slot, Dispatcher, NavKey, PagedEditor};

pub struct MatrixPlugin {
    params: Arc<ParamStore>,
    engine: MatrixSwitch,
    editor: PagedEditor,
    dispatcher: Dispatcher,
    automation: AutomationTable,
    midi: MidiIo,
    midi_settings: quadra_core::MidiState,
    changes: flume::Receiver<ParamChange>,
}

impl MatrixPlugin {
    pub fn new() -> Self {
        let params = Arc::new(ParamStore::new(MatrixSwitch::param_descs()));
        let engine = MatrixSwitch::new(params.clone());
        let changes = params.changes();

        let mut editor = PagedEditor::new(1);
        editor.add_param_page(
            [
                param_slot(&params, P_IN_SEL),
                param_slot(&params, P_OUT_SEL),
                param_slot(&params, P_USE_ACTIVE),
                None,
            ],
            0,
        );
        editor.add_button_page(button_slots(&params, P_IN_EN, NUM_CHANNELS), 0);
        editor.add_button_page(button_slots(&params, P_OUT_EN, NUM_CHANNELS), 0);

        Self {
            automation: AutomationTable::new(params.clone()),
            params,
            engine,
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

    /// Resolved channel pair from the last processed block.
    pub fn last_selection(&self) -> (usize, usize) {
        self.engine.last_selection()
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

    /// Drain MIDI input and parameter-change notifications. Returns note
    /// events to hand to the engine when note input is enabled.
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
            self.automation.on_param_change(&change);
        }
        notes
    }

    /// Feed one already-parsed event, for hosts that own the MIDI driver.
    pub fn on_midi(&mut self, event: &MidiEvent) -> Option<MidiEvent> {
        self.automation.on_midi(event)
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
        doc.to_yaml().context("serializing matrix switch state")
    }

    pub fn load(&mut self, text: &str) {
        let doc = StateDoc::from_yaml(text);
        self.params.restore(&doc.params);
        self.engine.load_state(&doc.custom);
        self.automation.load(&doc.midi.automation);
        self.automation.set_channel(doc.midi.channel);
        self.automation.set_note_input(doc.midi.note_input);
        self.midi_settings = doc.midi;
        self.midi = MidiIo::open(&self.midi_settings);
        self.automation
            .set_output(self.midi.output.as_ref().map(|o| o.sender()));
    }
}

impl Default for MatrixPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadra_core::matrix::{CH_SIG_IN, MATRIX_BUFFER_CHANNELS};
    use quadra_core::{AutomationKind, AutomationRecord};

    #[test]
    fn test_surface_drives_engine() {
        let mut plugin = MatrixPlugin::new();
        plugin.prepare(48_000.0, 16);

        // Enable in 0 and out 0 on the two button pages
        plugin.on_button(0, true);
        plugin.on_button(0, false);
        plugin.on_nav(NavKey::Right, false);
        plugin.on_button(0, true);
        plugin.on_button(0, false);
        assert!(plugin.params().get_bool(P_IN_EN));
        assert!(plugin.params().get_bool(P_OUT_EN));

        // Select channel 0 on both sides
        plugin.params().set(P_IN_SEL, -1.0);
        plugin.params().set(P_OUT_SEL, -1.0);

        let mut io = BlockBuffer::new(MATRIX_BUFFER_CHANNELS);
        io.prepare(16);
        for s in io.channel_mut(CH_SIG_IN) {
            *s = 0.5;
        }
        plugin.process(&mut io, 16);
        assert_eq!(io.channel(0), &[0.5; 16]);
        assert_eq!(plugin.last_selection(), (0, 0));
    }

    #[test]
    fn test_automation_round_trip_through_document() {
        let mut plugin = MatrixPlugin::new();
        plugin.automation.load(&[AutomationRecord {
            param: 5,
            channel: 1,
            num: 20,
            kind: AutomationKind::Cc,
            scale: 1.0,
            offset: 0.0,
        }]);
        let saved = plugin.save().unwrap();

        let mut fresh = MatrixPlugin::new();
        fresh.load(&saved);
        fresh.on_midi(&MidiEvent::ControlChange {
            channel: 1,
            cc: 20,
            value: 127,
        });
        assert_eq!(fresh.params().get(5), 1.0);
    }

    #[test]
    fn test_legacy_document_restores_params_only() {
        let mut plugin = MatrixPlugin::new();
        plugin.load("insel: 0.5\nactive: 1.0\n");
        assert_eq!(plugin.params().get(P_IN_SEL), 0.5);
        assert!(plugin.params().get_bool(P_USE_ACTIVE));
    }

    #[test]
    fn test_learn_binds_through_the_surface() {
        let mut plugin = MatrixPlugin::new();
        plugin.set_learn(true);
        plugin.on_encoder(0, 0.5); // touch in-select
        plugin.pump();
        plugin.on_midi(&MidiEvent::ControlChange {
            channel: 0,
            cc: 7,
            value: 64,
        });

        let saved = plugin.save().unwrap();
        let doc = StateDoc::from_yaml(&saved);
        assert_eq!(doc.midi.automation.len(), 1);
        assert_eq!(doc.midi.automation[0].param, P_IN_SEL as i64);
        assert_eq!(doc.midi.automation[0].num, 7);
    }
}
