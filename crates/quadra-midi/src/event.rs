//! MIDI wire events
//!
//! Parses raw bytes from the midir callback with midly and encodes outgoing
//! events back to bytes. Only the channel-voice messages the automation
//! table cares about are represented; everything else parses to `None`.

use midly::live::LiveEvent;
use midly::num::{u4, u7};
use midly::MidiMessage;

/// A parsed channel-voice message. Channels are 0-based (wire numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, cc: u8, value: u8 },
    ChannelPressure { channel: u8, value: u8 },
}

impl MidiEvent {
    /// Parse raw MIDI bytes. Note On with velocity 0 is treated as Note Off.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let event = LiveEvent::parse(data).ok()?;
        let LiveEvent::Midi { channel, message } = event else {
            return None;
        };
        let channel = channel.as_int();
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => Some(Self::NoteOff {
                channel,
                note: key.as_int(),
                velocity: 0,
            }),
            MidiMessage::NoteOn { key, vel } => Some(Self::NoteOn {
                channel,
                note: key.as_int(),
                velocity: vel.as_int(),
            }),
            MidiMessage::NoteOff { key, vel } => Some(Self::NoteOff {
                channel,
                note: key.as_int(),
                velocity: vel.as_int(),
            }),
            MidiMessage::Controller { controller, value } => Some(Self::ControlChange {
                channel,
                cc: controller.as_int(),
                value: value.as_int(),
            }),
            MidiMessage::ChannelAftertouch { vel } => Some(Self::ChannelPressure {
                channel,
                value: vel.as_int(),
            }),
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::ChannelPressure { channel, .. } => *channel,
        }
    }

    fn to_live(self) -> LiveEvent<'static> {
        let (channel, message) = match self {
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => (
                channel,
                MidiMessage::NoteOn {
                    key: u7::from(note),
                    vel: u7::from(velocity),
                },
            ),
            Self::NoteOff {
                channel,
                note,
                velocity,
            } => (
                channel,
                MidiMessage::NoteOff {
                    key: u7::from(note),
                    vel: u7::from(velocity),
                },
            ),
            Self::ControlChange { channel, cc, value } => (
                channel,
                MidiMessage::Controller {
                    controller: u7::from(cc),
                    value: u7::from(value),
                },
            ),
            Self::ChannelPressure { channel, value } => (
                channel,
                MidiMessage::ChannelAftertouch {
                    vel: u7::from(value),
                },
            ),
        };
        LiveEvent::Midi {
            channel: u4::from(channel),
            message,
        }
    }

    /// Encode to wire bytes for a midir send. Runs on the output worker,
    /// never on the audio thread.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3);
        if let Err(e) = self.to_live().write_std(&mut buf) {
            log::warn!("MIDI: failed to encode {self:?}: {e}");
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_change() {
        let ev = MidiEvent::parse(&[0xB2, 20, 100]);
        assert_eq!(
            ev,
            Some(MidiEvent::ControlChange {
                channel: 2,
                cc: 20,
                value: 100
            })
        );
    }

    #[test]
    fn test_note_on_velocity_zero_is_note_off() {
        let ev = MidiEvent::parse(&[0x90, 60, 0]);
        assert_eq!(
            ev,
            Some(MidiEvent::NoteOff {
                channel: 0,
                note: 60,
                velocity: 0
            })
        );
    }

    #[test]
    fn test_parse_channel_pressure() {
        let ev = MidiEvent::parse(&[0xD3, 90]);
        assert_eq!(
            ev,
            Some(MidiEvent::ChannelPressure {
                channel: 3,
                value: 90
            })
        );
    }

    #[test]
    fn test_unhandled_messages_parse_to_none() {
        // Pitch bend
        assert_eq!(MidiEvent::parse(&[0xE0, 0, 64]), None);
        assert_eq!(MidiEvent::parse(&[]), None);
    }

    #[test]
    fn test_encode_matches_wire_format() {
        let ev = MidiEvent::ControlChange {
            channel: 2,
            cc: 20,
            value: 100,
        };
        assert_eq!(ev.to_bytes(), vec![0xB2, 20, 100]);

        let ev = MidiEvent::NoteOn {
            channel: 0,
            note: 60,
            velocity: 127,
        };
        assert_eq!(ev.to_bytes(), vec![0x90, 60, 127]);
    }
}
