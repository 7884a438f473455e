//! Parameter descriptors and the atomic parameter store
//!
//! Parameters are the single piece of state shared between the audio context
//! and the control/MIDI context. Values are stored as f32 bit patterns in
//! `AtomicU32`s: the control context is the sole writer, the audio context
//! only reads. No locks anywhere near the audio path.
//!
//! Changes made through the writing API are broadcast as [`ParamChange`]
//! events over a bounded flume channel, tagged with their origin so the
//! automation layer can tell an encoder edit from an incoming MIDI edit.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use flume::{Receiver, Sender};

/// Static description of one logical parameter.
#[derive(Debug, Clone)]
pub struct ParamDesc {
    /// Stable identifier used in the persisted params tree
    pub id: String,
    /// Display label for the bound control
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    /// Step applied by a coarse encoder detent
    pub coarse_step: f32,
    /// Step applied while fine mode is latched
    pub fine_step: f32,
}

impl ParamDesc {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        let coarse = (max - min) / 20.0;
        Self {
            id: id.into(),
            name: name.into(),
            min,
            max,
            default,
            coarse_step: coarse,
            fine_step: coarse / 10.0,
        }
    }

    /// Override the default coarse/fine step sizes.
    pub fn steps(mut self, coarse: f32, fine: f32) -> Self {
        self.coarse_step = coarse;
        self.fine_step = fine;
        self
    }

    /// A 0/1 toggle parameter stepping in whole units.
    pub fn toggle(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, 0.0, 1.0, 0.0).steps(1.0, 1.0)
    }

    /// An integer-stepped selector over `[0, max]`.
    pub fn select(id: impl Into<String>, name: impl Into<String>, max: f32) -> Self {
        Self::new(id, name, 0.0, max, 0.0).steps(1.0, 1.0)
    }
}

/// Where a parameter write came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Encoder/button edit from the control surface
    Control,
    /// Incoming MIDI automation (must not be echoed back out)
    Automation,
}

/// A parameter change notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamChange {
    pub index: usize,
    pub value: f32,
    pub origin: ChangeOrigin,
}

/// Fixed-size store of atomically readable parameter values.
///
/// Built once at plugin construction from a descriptor table. The audio
/// thread reads with [`ParamStore::get`]; all writes happen on the control
/// context and are clamped to the descriptor bounds.
pub struct ParamStore {
    descs: Vec<ParamDesc>,
    values: Vec<AtomicU32>,
    gesture_depth: AtomicUsize,
    change_tx: Sender<ParamChange>,
    change_rx: Receiver<ParamChange>,
}

impl ParamStore {
    pub fn new(descs: Vec<ParamDesc>) -> Self {
        let values = descs
            .iter()
            .map(|d| AtomicU32::new(d.default.to_bits()))
            .collect();
        // Bounded so a stalled consumer can never balloon memory; a full
        // channel drops the notification, never the value itself.
        let (change_tx, change_rx) = flume::bounded(256);
        Self {
            descs,
            values,
            gesture_depth: AtomicUsize::new(0),
            change_tx,
            change_rx,
        }
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    pub fn desc(&self, index: usize) -> Option<&ParamDesc> {
        self.descs.get(index)
    }

    /// Look up a parameter index by its persisted id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.descs.iter().position(|d| d.id == id)
    }

    /// Read a value. Safe from any thread, including the audio thread.
    pub fn get(&self, index: usize) -> f32 {
        self.values
            .get(index)
            .map(|v| f32::from_bits(v.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    /// Read a toggle-style parameter as a bool.
    pub fn get_bool(&self, index: usize) -> bool {
        self.get(index) > 0.5
    }

    /// A receiver for change notifications. Receivers are clonable; each
    /// notification is delivered to one consumer.
    pub fn changes(&self) -> Receiver<ParamChange> {
        self.change_rx.clone()
    }

    /// Write a value from the control surface.
    pub fn set(&self, index: usize, value: f32) {
        self.write(index, value, ChangeOrigin::Control);
    }

    /// Write a value from incoming MIDI automation.
    pub fn set_from_automation(&self, index: usize, value: f32) {
        self.write(index, value, ChangeOrigin::Automation);
    }

    /// Write a value without notifying listeners. Used when rehydrating
    /// persisted state, which must not trigger outgoing MIDI.
    pub fn set_silent(&self, index: usize, value: f32) {
        let Some(desc) = self.descs.get(index) else {
            return;
        };
        let clamped = value.clamp(desc.min, desc.max);
        self.values[index].store(clamped.to_bits(), Ordering::Relaxed);
    }

    fn write(&self, index: usize, value: f32, origin: ChangeOrigin) {
        let Some(desc) = self.descs.get(index) else {
            return;
        };
        let clamped = value.clamp(desc.min, desc.max);
        let bits = clamped.to_bits();
        let prev = self.values[index].swap(bits, Ordering::Relaxed);
        if prev == bits {
            return;
        }
        let change = ParamChange {
            index,
            value: clamped,
            origin,
        };
        if self.change_tx.try_send(change).is_err() {
            log::warn!("params: change channel full, dropping notification");
        }
    }

    /// Step a parameter up by its coarse or fine increment.
    pub fn inc(&self, index: usize, fine: bool) {
        if let Some(desc) = self.descs.get(index) {
            let step = if fine { desc.fine_step } else { desc.coarse_step };
            self.set(index, self.get(index) + step);
        }
    }

    /// Step a parameter down by its coarse or fine increment.
    pub fn dec(&self, index: usize, fine: bool) {
        if let Some(desc) = self.descs.get(index) {
            let step = if fine { desc.fine_step } else { desc.coarse_step };
            self.set(index, self.get(index) - step);
        }
    }

    /// Return a parameter to its descriptor default.
    pub fn reset(&self, index: usize) {
        if let Some(desc) = self.descs.get(index) {
            self.set(index, desc.default);
        }
    }

    /// Open a gesture bracket around a programmatic edit, so the host sees
    /// one logical change. Brackets nest.
    pub fn begin_gesture(&self) {
        self.gesture_depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn end_gesture(&self) {
        let prev = self.gesture_depth.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "unbalanced gesture bracket");
    }

    pub fn in_gesture(&self) -> bool {
        self.gesture_depth.load(Ordering::Relaxed) > 0
    }

    /// Snapshot all values keyed by id, for the persisted params tree.
    pub fn snapshot(&self) -> std::collections::BTreeMap<String, f32> {
        self.descs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), self.get(i)))
            .collect()
    }

    /// Rehydrate values from a persisted params tree. Unknown ids are
    /// ignored; missing ids keep their current value.
    pub fn restore(&self, saved: &std::collections::BTreeMap<String, f32>) {
        for (id, value) in saved {
            if let Some(index) = self.index_of(id) {
                self.set_silent(index, *value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ParamStore {
        ParamStore::new(vec![
            ParamDesc::new("gain", "Gain", 0.0, 1.0, 0.5),
            ParamDesc::toggle("mute", "Mute"),
        ])
    }

    #[test]
    fn test_set_clamps_to_bounds() {
        let s = store();
        s.set(0, 2.0);
        assert_eq!(s.get(0), 1.0);
        s.set(0, -1.0);
        assert_eq!(s.get(0), 0.0);
    }

    #[test]
    fn test_inc_dec_steps() {
        let s = store();
        s.inc(0, false);
        assert!((s.get(0) - 0.55).abs() < 1e-6);
        s.dec(0, true);
        assert!((s.get(0) - 0.545).abs() < 1e-6);
    }

    #[test]
    fn test_reset_returns_default() {
        let s = store();
        s.set(0, 0.9);
        s.reset(0);
        assert_eq!(s.get(0), 0.5);
    }

    #[test]
    fn test_change_notification_carries_origin() {
        let s = store();
        let rx = s.changes();
        s.set(0, 0.7);
        s.set_from_automation(0, 0.9);
        let first = rx.try_recv().unwrap();
        assert_eq!(first.origin, ChangeOrigin::Control);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.origin, ChangeOrigin::Automation);
        assert_eq!(second.value, 0.9);
    }

    #[test]
    fn test_unchanged_write_does_not_notify() {
        let s = store();
        let rx = s.changes();
        s.set(0, 0.5);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_silent_write_does_not_notify() {
        let s = store();
        let rx = s.changes();
        s.set_silent(0, 0.8);
        assert_eq!(s.get(0), 0.8);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let s = store();
        s.set(0, 0.25);
        s.set(1, 1.0);
        let saved = s.snapshot();

        let fresh = store();
        fresh.restore(&saved);
        assert_eq!(fresh.get(0), 0.25);
        assert!(fresh.get_bool(1));
    }
}
