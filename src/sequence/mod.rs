// Sequence - In-memory musical sequence the retiming commands operate on
// Track 0 is the conductor track holding tempo and time signature events

pub mod event;
pub mod track;

pub use event::{Event, EventId, EventKind, StreamKind, Tick};
pub use track::{BatchModify, EventChange, ResolvedBatch, Selection, Track, TrackError};

use serde::{Deserialize, Serialize};

use crate::groove::grid::TimeSignature;
use crate::groove::tempo::TempoMap;

/// Standard MIDI resolution
pub const DEFAULT_TIMEBASE: u32 = 480;

/// Index of the conductor track
pub const CONDUCTOR_TRACK: usize = 0;

/// A set of tracks sharing one timebase and one tempo map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SequenceData")]
pub struct Sequence {
    /// Ticks per quarter note
    timebase: u32,

    tracks: Vec<Track>,
}

impl Sequence {
    /// Create a sequence holding only an empty conductor track
    pub fn new(timebase: u32) -> Self {
        Sequence {
            timebase: timebase.max(1),
            tracks: vec![Track::new("Conductor")],
        }
    }

    pub fn timebase(&self) -> u32 {
        self.timebase
    }

    /// Append a track and return its index
    pub fn add_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn conductor(&self) -> &Track {
        &self.tracks[CONDUCTOR_TRACK]
    }

    pub fn conductor_mut(&mut self) -> &mut Track {
        &mut self.tracks[CONDUCTOR_TRACK]
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Add a tempo change to the conductor track
    pub fn set_tempo(&mut self, tick: Tick, bpm: f64) {
        self.conductor_mut().insert(Event::tempo(tick, bpm));
    }

    /// Add a time signature change to the conductor track
    pub fn set_time_signature(&mut self, tick: Tick, signature: TimeSignature) {
        self.conductor_mut()
            .insert(Event::time_signature(tick, signature));
    }

    /// Snapshot of the current tempo and meter
    pub fn tempo_map(&self) -> TempoMap {
        TempoMap::from_track(self.timebase, self.conductor())
    }
}

/// Serialized form; may arrive without a conductor track
#[derive(Deserialize)]
struct SequenceData {
    timebase: u32,

    #[serde(default)]
    tracks: Vec<Track>,
}

impl From<SequenceData> for Sequence {
    fn from(data: SequenceData) -> Self {
        let mut tracks = data.tracks;
        if tracks.is_empty() {
            tracks.push(Track::new("Conductor"));
        }
        Sequence {
            timebase: data.timebase.max(1),
            tracks,
        }
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Sequence::new(DEFAULT_TIMEBASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groove::tempo::TimeBase;

    #[test]
    fn test_new_sequence_has_conductor() {
        let seq = Sequence::default();
        assert_eq!(seq.track_count(), 1);
        assert_eq!(seq.timebase(), 480);
        assert!(seq.conductor().is_empty());
    }

    #[test]
    fn test_add_track_returns_index() {
        let mut seq = Sequence::default();
        assert_eq!(seq.add_track(Track::new("Piano")), 1);
        assert_eq!(seq.add_track(Track::new("Bass")), 2);
        assert_eq!(seq.track(2).map(|t| t.name.as_str()), Some("Bass"));
        assert!(seq.track(3).is_none());
    }

    #[test]
    fn test_tempo_map_reflects_conductor() {
        let mut seq = Sequence::new(96);
        seq.set_tempo(0, 60.0);
        seq.set_time_signature(0, TimeSignature::new(3, 4));

        let map = seq.tempo_map();
        assert_eq!(map.timebase(), 96);
        assert!((map.tick_to_time(96) - 1.0).abs() < 1e-9);
        assert_eq!(map.tick_to_musical(288).bar, 2);
    }

    #[test]
    fn test_deserialized_sequence_always_has_conductor() {
        let seq: Sequence = serde_json::from_str(r#"{"timebase":0,"tracks":[]}"#).unwrap();
        assert_eq!(seq.track_count(), 1);
        assert_eq!(seq.timebase(), 1);
        assert!(seq.conductor().is_empty());

        let map = seq.tempo_map();
        assert_eq!(map.tempo_at(0), (120.0, 0));
    }

    #[test]
    fn test_sequence_json_round_trip_keeps_tracks() {
        let mut seq = Sequence::new(96);
        seq.set_tempo(0, 90.0);
        seq.add_track(Track::with_events("Lead", vec![Event::note(0, 60, 100, 48)]));

        let json = serde_json::to_string(&seq).unwrap();
        let restored: Sequence = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.track_count(), 2);
        assert_eq!(restored.timebase(), 96);
        assert_eq!(restored.track(1).map(|t| t.len()), Some(1));
    }
}
