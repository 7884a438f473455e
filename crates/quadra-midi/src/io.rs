//! MIDI device discovery and connection
//!
//! Uses midir for cross-platform MIDI I/O (ALSA on the target host). Input
//! bytes are parsed in the midir callback and forwarded over a bounded flume
//! channel; output events go to a dedicated worker thread that owns the
//! connection, so a slow device can never stall the control path.
//!
//! Device failures are non-fatal throughout: a handler that fails to open is
//! simply absent and every send through it is a no-op.

use std::thread::JoinHandle;

use midir::{MidiInput, MidiOutput};
use quadra_core::MidiState;

use crate::event::MidiEvent;

const EVENT_QUEUE_LEN: usize = 256;

/// Error type for MIDI device operations
#[derive(Debug, thiserror::Error)]
pub enum MidiIoError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInit(String),

    #[error("Failed to initialize MIDI output: {0}")]
    OutputInit(String),

    #[error("No MIDI port found matching pattern: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    Connection(String),

    #[error("Failed to get port info: {0}")]
    PortInfo(String),
}

/// List input port names, for the device-selection page.
pub fn available_input_ports() -> anyhow::Result<Vec<String>> {
    let midi_in = MidiInput::new("quadra-midi-scan")?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect())
}

/// List output port names.
pub fn available_output_ports() -> anyhow::Result<Vec<String>> {
    let midi_out = MidiOutput::new("quadra-midi-scan")?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect())
}

/// Open input connection: parses bytes in the midir callback and forwards
/// events over a bounded channel.
pub struct MidiInputHandler {
    // Held only to keep the connection alive
    _connection: midir::MidiInputConnection<()>,
    events: flume::Receiver<MidiEvent>,
    port_name: String,
}

impl MidiInputHandler {
    /// Connect to the first input port whose name contains `port_match`
    /// (case-insensitive).
    pub fn connect(port_match: &str) -> Result<Self, MidiIoError> {
        let pattern = port_match.to_lowercase();
        let midi_in =
            MidiInput::new("quadra-midi-in").map_err(|e| MidiIoError::InputInit(e.to_string()))?;

        let port = midi_in
            .ports()
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiIoError::PortNotFound(port_match.to_string()))?;

        let port_name = midi_in
            .port_name(&port)
            .map_err(|e| MidiIoError::PortInfo(e.to_string()))?;
        log::info!("MIDI: found input port: {port_name}");

        let (tx, events) = flume::bounded(EVENT_QUEUE_LEN);
        let connection = midi_in
            .connect(
                &port,
                "quadra-midi-input",
                move |_timestamp, bytes, _| {
                    if let Some(event) = MidiEvent::parse(bytes) {
                        if tx.try_send(event).is_err() {
                            log::warn!("MIDI: input queue full, dropping {event:?}");
                        }
                    }
                },
                (),
            )
            .map_err(|e| MidiIoError::Connection(e.to_string()))?;

        Ok(Self {
            _connection: connection,
            events,
            port_name,
        })
    }

    /// Parsed events, drained by the control thread.
    pub fn events(&self) -> &flume::Receiver<MidiEvent> {
        &self.events
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Output connection behind a worker thread. The worker owns the midir
/// connection; callers just queue events.
pub struct MidiOutputHandler {
    tx: flume::Sender<MidiEvent>,
    port_name: String,
    // Worker exits when the last sender drops
    _worker: JoinHandle<()>,
}

impl MidiOutputHandler {
    pub fn connect(port_match: &str) -> Result<Self, MidiIoError> {
        let pattern = port_match.to_lowercase();
        let midi_out = MidiOutput::new("quadra-midi-out")
            .map_err(|e| MidiIoError::OutputInit(e.to_string()))?;

        let port = midi_out
            .ports()
            .into_iter()
            .find(|port| {
                midi_out
                    .port_name(port)
                    .map(|name| name.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiIoError::PortNotFound(port_match.to_string()))?;

        let port_name = midi_out
            .port_name(&port)
            .map_err(|e| MidiIoError::PortInfo(e.to_string()))?;
        log::info!("MIDI: found output port: {port_name}");

        let mut connection = midi_out
            .connect(&port, "quadra-midi-output")
            .map_err(|e| MidiIoError::Connection(e.to_string()))?;

        let (tx, rx) = flume::bounded::<MidiEvent>(EVENT_QUEUE_LEN);
        let worker = std::thread::Builder::new()
            .name("quadra-midi-out".to_string())
            .spawn(move || {
                for event in rx.iter() {
                    if let Err(e) = connection.send(&event.to_bytes()) {
                        log::warn!("MIDI: send failed: {e}");
                    }
                }
                log::debug!("MIDI: output worker exiting");
            })
            .map_err(|e| MidiIoError::Connection(e.to_string()))?;

        Ok(Self {
            tx,
            port_name,
            _worker: worker,
        })
    }

    /// Queue an event for the worker. Non-blocking; drops with a warning
    /// when the queue is full.
    pub fn send(&self, event: MidiEvent) {
        if self.tx.try_send(event).is_err() {
            log::warn!("MIDI: output queue full, dropping {event:?}");
        }
    }

    /// Sender handle for the automation table's outgoing path.
    pub fn sender(&self) -> flume::Sender<MidiEvent> {
        self.tx.clone()
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Both directions for one plugin, opened best-effort from persisted
/// settings. Empty device names and open failures leave the side absent.
pub struct MidiIo {
    pub input: Option<MidiInputHandler>,
    pub output: Option<MidiOutputHandler>,
}

impl MidiIo {
    pub fn open(state: &MidiState) -> Self {
        let input = if state.input_device.is_empty() {
            None
        } else {
            match MidiInputHandler::connect(&state.input_device) {
                Ok(h) => Some(h),
                Err(e) => {
                    log::warn!("MIDI: input '{}' unavailable: {e}", state.input_device);
                    None
                }
            }
        };
        let output = if state.output_device.is_empty() {
            None
        } else {
            match MidiOutputHandler::connect(&state.output_device) {
                Ok(h) => Some(h),
                Err(e) => {
                    log::warn!("MIDI: output '{}' unavailable: {e}", state.output_device);
                    None
                }
            }
        };
        Self { input, output }
    }

    pub fn closed() -> Self {
        Self {
            input: None,
            output: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_with_empty_device_names_is_closed() {
        let io = MidiIo::open(&MidiState::default());
        assert!(io.input.is_none());
        assert!(io.output.is_none());
    }
}
