//! MIDI automation binding table
//!
//! Maps parameters to MIDI controls in both directions: incoming CC/Note
//! messages drive bound parameters, and control-surface parameter edits emit
//! the bound message through the output sender. Bindings are created by
//! MIDI-learn: arm, touch a parameter, send the CC — the table installs the
//! binding and disarms.
//!
//! Parameter writes made by this table are tagged with the automation origin
//! so the outgoing path can ignore them; without that, an incoming CC would
//! echo straight back out to the device.

use std::collections::HashMap;
use std::sync::Arc;

use quadra_core::{
    AutomationKind, AutomationRecord, ChangeOrigin, ParamChange, ParamStore,
};

use crate::event::MidiEvent;

/// One installed binding. The channel stored here addresses the outgoing
/// message; incoming events are filtered only by the table-level gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binding {
    pub channel: u8,
    pub num: u8,
    pub kind: AutomationKind,
    pub scale: f32,
    pub offset: f32,
}

pub struct AutomationTable {
    params: Arc<ParamStore>,
    bindings: HashMap<usize, Binding>,
    learn: bool,
    pending: Option<usize>,
    /// 0 accepts every channel, 1-16 only that channel
    channel: u8,
    note_input: bool,
    output_tx: Option<flume::Sender<MidiEvent>>,
}

impl AutomationTable {
    pub fn new(params: Arc<ParamStore>) -> Self {
        Self {
            params,
            bindings: HashMap::new(),
            learn: false,
            pending: None,
            channel: 0,
            note_input: false,
            output_tx: None,
        }
    }

    /// Wire the outgoing side to the output worker's queue.
    pub fn set_output(&mut self, tx: Option<flume::Sender<MidiEvent>>) {
        self.output_tx = tx;
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel.min(16);
    }

    pub fn set_note_input(&mut self, enabled: bool) {
        self.note_input = enabled;
    }

    /// Arm or disarm learn mode. Arming always clears the pending target.
    pub fn set_learn(&mut self, on: bool) {
        self.learn = on;
        self.pending = None;
    }

    pub fn learning(&self) -> bool {
        self.learn
    }

    pub fn binding(&self, param: usize) -> Option<&Binding> {
        self.bindings.get(&param)
    }

    pub fn unbind(&mut self, param: usize) -> Option<Binding> {
        self.bindings.remove(&param)
    }

    /// Feed one parameter-change notification from the store's channel.
    ///
    /// Armed: a control-context change records the learn target. Unarmed: a
    /// change that did not come from this table emits the bound message.
    pub fn on_param_change(&mut self, change: &ParamChange) {
        if change.origin == ChangeOrigin::Automation {
            return;
        }
        if self.learn {
            self.pending = Some(change.index);
            return;
        }
        let Some(binding) = self.bindings.get(&change.index) else {
            return;
        };
        let event = match binding.kind {
            AutomationKind::Cc => {
                let norm = if binding.scale.abs() > f32::EPSILON {
                    (change.value - binding.offset) / binding.scale
                } else {
                    0.0
                };
                MidiEvent::ControlChange {
                    channel: binding.channel,
                    cc: binding.num,
                    value: (norm * 127.0).round().clamp(0.0, 127.0) as u8,
                }
            }
            AutomationKind::Note => {
                if change.value > 0.5 {
                    MidiEvent::NoteOn {
                        channel: binding.channel,
                        note: binding.num,
                        velocity: 127,
                    }
                } else {
                    MidiEvent::NoteOff {
                        channel: binding.channel,
                        note: binding.num,
                        velocity: 0,
                    }
                }
            }
            AutomationKind::Pressure => MidiEvent::ChannelPressure {
                channel: binding.channel,
                value: (change.value.clamp(0.0, 1.0) * 127.0) as u8,
            },
        };
        if let Some(tx) = &self.output_tx {
            if tx.try_send(event).is_err() {
                log::warn!("MIDI: output queue full, dropping {event:?}");
            }
        }
    }

    /// Feed one incoming MIDI event. Returns the event back when it is a
    /// note the plugin should receive (note input enabled, gate passed).
    pub fn on_midi(&mut self, event: &MidiEvent) -> Option<MidiEvent> {
        if self.channel != 0 && event.channel() != self.channel - 1 {
            return None;
        }

        // Armed with a captured target: the completing CC installs the
        // binding, single-shot, and is consumed. Anything else falls
        // through so existing bindings keep working mid-learn.
        if self.learn {
            if let MidiEvent::ControlChange { channel, cc, .. } = event {
                if let Some(param) = self.pending.take() {
                    self.bindings.insert(
                        param,
                        Binding {
                            channel: *channel,
                            num: *cc,
                            kind: AutomationKind::Cc,
                            scale: 1.0,
                            offset: 0.0,
                        },
                    );
                    self.learn = false;
                    log::info!("MIDI: learned CC {cc} (ch {channel}) -> param {param}");
                    return None;
                }
            }
        }

        match *event {
            MidiEvent::ControlChange { cc, value, .. } => {
                for (param, b) in self.matches(AutomationKind::Cc, cc) {
                    self.drive(param, value as f32 / 127.0 * b.scale + b.offset);
                }
                None
            }
            MidiEvent::NoteOn { note, velocity, .. } => {
                for (param, b) in self.matches(AutomationKind::Note, note) {
                    self.drive(param, velocity as f32 / 127.0 * b.scale + b.offset);
                }
                self.note_input.then_some(*event)
            }
            MidiEvent::NoteOff { note, .. } => {
                for (param, b) in self.matches(AutomationKind::Note, note) {
                    self.drive(param, b.offset);
                }
                self.note_input.then_some(*event)
            }
            // Pressure bindings are output-only
            MidiEvent::ChannelPressure { .. } => None,
        }
    }

    /// Every binding listening for `kind`/`num`. Several parameters may
    /// share one control; all of them get driven. The binding's own channel
    /// is for the outgoing side only; input filtering is the table gate.
    fn matches(&self, kind: AutomationKind, num: u8) -> Vec<(usize, Binding)> {
        self.bindings
            .iter()
            .filter(|(_, b)| b.kind == kind && b.num == num)
            .map(|(param, b)| (*param, *b))
            .collect()
    }

    /// Apply an automation value, only when it actually changes the
    /// parameter, bracketed as a gesture for the host.
    fn drive(&self, param: usize, value: f32) {
        if (self.params.get(param) - value).abs() <= f32::EPSILON {
            return;
        }
        self.params.begin_gesture();
        self.params.set_from_automation(param, value);
        self.params.end_gesture();
    }

    /// Persistable copy of the table.
    pub fn records(&self) -> Vec<AutomationRecord> {
        let mut out: Vec<AutomationRecord> = self
            .bindings
            .iter()
            .map(|(param, b)| AutomationRecord {
                param: *param as i64,
                channel: b.channel,
                num: b.num,
                kind: b.kind,
                scale: b.scale,
                offset: b.offset,
            })
            .collect();
        out.sort_by_key(|r| r.param);
        out
    }

    /// Replace the table from persisted records. Half-captured entries
    /// (negative param) and out-of-range indices are dropped.
    pub fn load(&mut self, records: &[AutomationRecord]) {
        self.bindings.clear();
        for r in records {
            let Ok(param) = usize::try_from(r.param) else {
                log::debug!("MIDI: dropping half-captured automation record");
                continue;
            };
            if param >= self.params.len() {
                log::warn!("MIDI: dropping automation record for unknown param {param}");
                continue;
            }
            self.bindings.insert(
                param,
                Binding {
                    channel: r.channel,
                    num: r.num,
                    kind: r.kind,
                    scale: r.scale,
                    offset: r.offset,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadra_core::ParamDesc;

    fn make_table() -> (AutomationTable, Arc<ParamStore>) {
        let params = Arc::new(ParamStore::new(vec![
            ParamDesc::new("a", "A", 0.0, 1.0, 0.0),
            ParamDesc::new("b", "B", 0.0, 1.0, 0.0),
            ParamDesc::toggle("gate", "Gate"),
        ]));
        (AutomationTable::new(params.clone()), params)
    }

    fn cc(channel: u8, cc: u8, value: u8) -> MidiEvent {
        MidiEvent::ControlChange { channel, cc, value }
    }

    #[test]
    fn test_learn_is_single_shot() {
        let (mut table, params) = make_table();
        table.set_learn(true);

        // Touch param 1 on the surface, then send a CC
        params.set(1, 0.3);
        let change = params.changes().try_recv().unwrap();
        table.on_param_change(&change);
        table.on_midi(&cc(0, 20, 64));

        assert!(!table.learning());
        let b = table.binding(1).unwrap();
        assert_eq!((b.num, b.kind), (20, AutomationKind::Cc));

        // The next CC drives the parameter instead of re-learning
        table.on_midi(&cc(0, 20, 127));
        assert_eq!(params.get(1), 1.0);
    }

    #[test]
    fn test_arming_clears_pending() {
        let (mut table, params) = make_table();
        table.set_learn(true);
        params.set(0, 0.5);
        let change = params.changes().try_recv().unwrap();
        table.on_param_change(&change);

        // Re-arm: the captured target is forgotten, so a CC binds nothing
        table.set_learn(true);
        table.on_midi(&cc(0, 7, 100));
        assert!(table.binding(0).is_none());
    }

    #[test]
    fn test_shared_cc_drives_every_binding() {
        let (mut table, params) = make_table();
        let record = AutomationRecord {
            param: 0,
            channel: 0,
            num: 20,
            kind: AutomationKind::Cc,
            scale: 1.0,
            offset: 0.0,
        };
        table.load(&[record, AutomationRecord { param: 1, ..record }]);

        table.on_midi(&cc(0, 20, 127));
        assert_eq!(params.get(0), 1.0);
        assert_eq!(params.get(1), 1.0);
    }

    #[test]
    fn test_input_ignores_binding_channel() {
        let (mut table, params) = make_table();
        table.load(&[AutomationRecord {
            param: 0,
            channel: 4,
            num: 20,
            kind: AutomationKind::Cc,
            scale: 1.0,
            offset: 0.0,
        }]);

        // Omni gate: the binding's channel only shapes the outgoing side
        table.on_midi(&cc(1, 20, 127));
        assert_eq!(params.get(0), 1.0);
    }

    #[test]
    fn test_armed_cc_without_pending_still_drives() {
        let (mut table, params) = make_table();
        table.load(&[AutomationRecord {
            param: 0,
            channel: 0,
            num: 10,
            kind: AutomationKind::Cc,
            scale: 1.0,
            offset: 0.0,
        }]);

        // Armed but nothing touched yet: bound CCs keep driving and the
        // table stays armed for the capture
        table.set_learn(true);
        table.on_midi(&cc(0, 10, 127));
        assert_eq!(params.get(0), 1.0);
        assert!(table.learning());
    }

    #[test]
    fn test_channel_gate() {
        let (mut table, params) = make_table();
        table.load(&[AutomationRecord {
            param: 0,
            channel: 2,
            num: 10,
            kind: AutomationKind::Cc,
            scale: 1.0,
            offset: 0.0,
        }]);

        // Gate to channel 3 (wire channel 2): other channels are ignored
        table.set_channel(3);
        table.on_midi(&cc(1, 10, 127));
        assert_eq!(params.get(0), 0.0);
        table.on_midi(&cc(2, 10, 127));
        assert_eq!(params.get(0), 1.0);

        // Omni accepts anything the binding's channel matches
        table.set_channel(0);
        table.on_midi(&cc(2, 10, 0));
        assert_eq!(params.get(0), 0.0);
    }

    #[test]
    fn test_note_binding_drives_on_and_off() {
        let (mut table, params) = make_table();
        table.load(&[AutomationRecord {
            param: 2,
            channel: 0,
            num: 60,
            kind: AutomationKind::Note,
            scale: 1.0,
            offset: 0.0,
        }]);

        table.on_midi(&MidiEvent::NoteOn {
            channel: 0,
            note: 60,
            velocity: 127,
        });
        assert_eq!(params.get(2), 1.0);
        table.on_midi(&MidiEvent::NoteOff {
            channel: 0,
            note: 60,
            velocity: 0,
        });
        assert_eq!(params.get(2), 0.0);
    }

    #[test]
    fn test_note_input_forwarding() {
        let (mut table, _params) = make_table();
        let on = MidiEvent::NoteOn {
            channel: 0,
            note: 64,
            velocity: 100,
        };
        assert_eq!(table.on_midi(&on), None);
        table.set_note_input(true);
        assert_eq!(table.on_midi(&on), Some(on));
    }

    #[test]
    fn test_outgoing_emits_cc_and_skips_automation_echo() {
        let (mut table, params) = make_table();
        let (tx, rx) = flume::bounded(16);
        table.set_output(Some(tx));
        table.load(&[AutomationRecord {
            param: 0,
            channel: 1,
            num: 30,
            kind: AutomationKind::Cc,
            scale: 1.0,
            offset: 0.0,
        }]);

        params.set(0, 1.0);
        table.on_param_change(&params.changes().try_recv().unwrap());
        assert_eq!(
            rx.try_recv().unwrap(),
            cc(1, 30, 127)
        );

        // A change the table itself made must not echo back out
        params.set_from_automation(0, 0.5);
        table.on_param_change(&params.changes().try_recv().unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_records_round_trip_and_drop_invalid() {
        let (mut table, _params) = make_table();
        let good = AutomationRecord {
            param: 1,
            channel: 0,
            num: 11,
            kind: AutomationKind::Pressure,
            scale: 0.5,
            offset: 0.25,
        };
        table.load(&[
            good,
            AutomationRecord { param: -1, ..good },
            AutomationRecord { param: 99, ..good },
        ]);

        assert_eq!(table.records(), vec![good]);
    }
}
