//! MIDI layer for the quadra plugin suite
//!
//! - Wire event parsing/encoding via midly
//! - Device discovery and connection via midir (ALSA on the target host)
//! - A dedicated output worker thread so sends never block the control path
//! - The automation binding table: MIDI-learn, CC/Note/Pressure bindings,
//!   bidirectional parameter sync

pub mod automation;
pub mod event;
pub mod io;

pub use automation::{AutomationTable, Binding};
pub use event::MidiEvent;
pub use io::{MidiInputHandler, MidiIo, MidiIoError, MidiOutputHandler};
