// Sequence events - Tagged event kinds with stable identities
// Every event carries a UUID so batch edits survive tick re-sorting

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::groove::grid::TimeSignature;

/// Sequence-local time unit (ticks per quarter note fixed by the timebase)
pub type Tick = i64;

/// Stable identity of an event, independent of its position in a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Generate a fresh identity
    pub fn new() -> Self {
        EventId(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of a sequence event, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EventKind {
    /// Note with its sounding length in ticks
    Note { key: u8, velocity: u8, duration: Tick },

    /// Continuous controller (value 0-127)
    Controller { number: u8, value: u8 },

    /// Pitch bend, signed 14-bit (-8192..=8191)
    PitchBend { value: i16 },

    /// Tempo change in beats per minute
    Tempo { bpm: f64 },

    /// Time signature change
    TimeSignature(TimeSignature),

    /// Anything the retiming engine only moves (sysex, meta text, program change...)
    Other { data: Vec<u8> },
}

impl EventKind {
    /// Short lowercase name, used in error messages and logs
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Note { .. } => "note",
            EventKind::Controller { .. } => "controller",
            EventKind::PitchBend { .. } => "pitch bend",
            EventKind::Tempo { .. } => "tempo",
            EventKind::TimeSignature(_) => "time signature",
            EventKind::Other { .. } => "other",
        }
    }
}

/// Kind of a continuous stream the decimator can thin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// A single controller number
    Controller(u8),

    /// Pitch bend
    PitchBend,
}

impl StreamKind {
    /// Truncate a real value into this stream's native integer domain
    pub fn truncate(&self, value: f64) -> i32 {
        match self {
            StreamKind::Controller(_) => {
                let clamped = value.trunc().clamp(0.0, 127.0) as u8;
                midly::num::u7::from(clamped).as_int() as i32
            }
            StreamKind::PitchBend => {
                let clamped = value.trunc().clamp(-8192.0, 8191.0) as i16;
                midly::PitchBend::from_int(clamped).as_int() as i32
            }
        }
    }

    /// Build the event payload carrying `value` for this stream
    pub fn event_kind(&self, value: f64) -> EventKind {
        let native = self.truncate(value);
        match self {
            StreamKind::Controller(number) => EventKind::Controller {
                number: *number,
                value: native as u8,
            },
            StreamKind::PitchBend => EventKind::PitchBend {
                value: native as i16,
            },
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Controller(number) => write!(f, "controller {}", number),
            StreamKind::PitchBend => write!(f, "pitch bend"),
        }
    }
}

/// A single event positioned on the tick axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier
    pub id: EventId,

    /// Position in ticks
    pub tick: Tick,

    /// Kind-specific payload
    pub kind: EventKind,
}

impl Event {
    /// Create an event with a fresh identity
    pub fn new(tick: Tick, kind: EventKind) -> Self {
        Event {
            id: EventId::new(),
            tick,
            kind,
        }
    }

    pub fn note(tick: Tick, key: u8, velocity: u8, duration: Tick) -> Self {
        Event::new(
            tick,
            EventKind::Note {
                key,
                velocity,
                duration,
            },
        )
    }

    pub fn controller(tick: Tick, number: u8, value: u8) -> Self {
        Event::new(tick, EventKind::Controller { number, value })
    }

    pub fn pitch_bend(tick: Tick, value: i16) -> Self {
        Event::new(tick, EventKind::PitchBend { value })
    }

    pub fn tempo(tick: Tick, bpm: f64) -> Self {
        Event::new(tick, EventKind::Tempo { bpm })
    }

    pub fn time_signature(tick: Tick, signature: TimeSignature) -> Self {
        Event::new(tick, EventKind::TimeSignature(signature))
    }

    /// Controller number or note number, when the kind has one
    pub fn code(&self) -> Option<u8> {
        match &self.kind {
            EventKind::Note { key, .. } => Some(*key),
            EventKind::Controller { number, .. } => Some(*number),
            _ => None,
        }
    }

    /// Note length in ticks (notes only)
    pub fn duration(&self) -> Option<Tick> {
        match &self.kind {
            EventKind::Note { duration, .. } => Some(*duration),
            _ => None,
        }
    }

    /// Stream this event belongs to, if it is a continuous control event
    pub fn stream_kind(&self) -> Option<StreamKind> {
        match &self.kind {
            EventKind::Controller { number, .. } => Some(StreamKind::Controller(*number)),
            EventKind::PitchBend { .. } => Some(StreamKind::PitchBend),
            _ => None,
        }
    }

    /// Numeric value of a continuous control event
    pub fn control_value(&self) -> Option<f64> {
        match &self.kind {
            EventKind::Controller { value, .. } => Some(*value as f64),
            EventKind::PitchBend { value } => Some(*value as f64),
            _ => None,
        }
    }

    /// Human readable description of the kind, including the controller number
    pub fn describe_kind(&self) -> String {
        match self.stream_kind() {
            Some(stream) => stream.to_string(),
            None => self.kind.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ids_are_unique() {
        let a = Event::controller(0, 7, 100);
        let b = Event::controller(0, 7, 100);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_accessors() {
        let note = Event::note(120, 60, 100, 240);
        assert_eq!(note.code(), Some(60));
        assert_eq!(note.duration(), Some(240));
        assert_eq!(note.stream_kind(), None);

        let cc = Event::controller(0, 11, 64);
        assert_eq!(cc.code(), Some(11));
        assert_eq!(cc.stream_kind(), Some(StreamKind::Controller(11)));
        assert_eq!(cc.control_value(), Some(64.0));

        let bend = Event::pitch_bend(0, -4096);
        assert_eq!(bend.stream_kind(), Some(StreamKind::PitchBend));
        assert_eq!(bend.control_value(), Some(-4096.0));
    }

    #[test]
    fn test_truncate_controller_domain() {
        let kind = StreamKind::Controller(1);
        assert_eq!(kind.truncate(12.9), 12);
        assert_eq!(kind.truncate(200.0), 127);
        assert_eq!(kind.truncate(-3.0), 0);
    }

    #[test]
    fn test_truncate_pitch_bend_domain() {
        let kind = StreamKind::PitchBend;
        assert_eq!(kind.truncate(-100.7), -100);
        assert_eq!(kind.truncate(9000.0), 8191);
        assert_eq!(kind.truncate(-9000.0), -8192);
    }

    #[test]
    fn test_describe_kind() {
        assert_eq!(Event::controller(0, 7, 0).describe_kind(), "controller 7");
        assert_eq!(Event::pitch_bend(0, 0).describe_kind(), "pitch bend");
        assert_eq!(Event::tempo(0, 120.0).describe_kind(), "tempo");
    }
}
