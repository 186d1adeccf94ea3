// Tempo Map - Tick <-> absolute time and tick <-> bar:beat:tick conversion
// Built from the conductor track's tempo and time signature events

use crate::groove::grid::{MusicalTime, TimeSignature};
use crate::sequence::{EventKind, Tick, Track};

/// Tempo used before the first tempo event, or when there is none
pub const DEFAULT_BPM: f64 = 120.0;

/// Time conversion contract consumed by the retiming algorithms
///
/// Conversions are monotonic and mutually inverse up to tick rounding.
pub trait TimeBase {
    /// Ticks per quarter note
    fn timebase(&self) -> u32;

    /// Absolute time in seconds of a tick
    fn tick_to_time(&self, tick: Tick) -> f64;

    /// Nearest tick at an absolute time in seconds
    fn time_to_tick(&self, seconds: f64) -> Tick;

    fn tick_to_musical(&self, tick: Tick) -> MusicalTime;

    fn musical_to_tick(&self, bar: i64, beat: i64, tick: Tick) -> Tick;

    /// Signature in effect at `tick`, with the tick its window starts at
    fn time_signature_at(&self, tick: Tick) -> (TimeSignature, Tick);

    /// Tempo in effect at `tick`, with the tick its window starts at
    fn tempo_at(&self, tick: Tick) -> (f64, Tick);
}

/// One constant-tempo stretch of the timeline
#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoSegment {
    tick: Tick,
    bpm: f64,
    /// Absolute time at `tick`
    time: f64,
}

/// One time signature window
#[derive(Debug, Clone, Copy, PartialEq)]
struct SignatureWindow {
    tick: Tick,
    signature: TimeSignature,
    /// 1-based bar number starting at `tick`
    bar: i64,
}

/// Piecewise tempo and meter map
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    timebase: u32,
    tempos: Vec<TempoSegment>,
    signatures: Vec<SignatureWindow>,
}

impl TempoMap {
    /// Empty map: constant 120 BPM, 4/4 throughout
    pub fn new(timebase: u32) -> Self {
        TempoMap {
            timebase: timebase.max(1),
            tempos: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Build from (tick, bpm) changes and (tick, signature) changes
    ///
    /// Changes need not be sorted. Non-positive or non-finite tempos are ignored.
    pub fn from_changes(
        timebase: u32,
        tempo_changes: &[(Tick, f64)],
        signature_changes: &[(Tick, TimeSignature)],
    ) -> Self {
        let mut map = TempoMap::new(timebase);

        let mut tempos: Vec<(Tick, f64)> = tempo_changes
            .iter()
            .copied()
            .filter(|(tick, bpm)| *tick >= 0 && bpm.is_finite() && *bpm > 0.0)
            .collect();
        tempos.sort_by_key(|(tick, _)| *tick);

        for (tick, bpm) in tempos {
            let time = map.tick_to_time(tick);
            map.tempos.push(TempoSegment { tick, bpm, time });
        }

        let mut signatures: Vec<(Tick, TimeSignature)> = signature_changes
            .iter()
            .copied()
            .filter(|(tick, _)| *tick >= 0)
            .collect();
        signatures.sort_by_key(|(tick, _)| *tick);

        for (tick, signature) in signatures {
            let bar = match map.signatures.last() {
                Some(prev) => {
                    let bar_ticks = prev.signature.bar_ticks(map.timebase);
                    let elapsed = tick - prev.tick;
                    // A change in the middle of a bar opens a new bar
                    prev.bar + (elapsed + bar_ticks - 1) / bar_ticks
                }
                None => {
                    let bar_ticks = TimeSignature::default().bar_ticks(map.timebase);
                    1 + (tick + bar_ticks - 1) / bar_ticks
                }
            };
            // A later change on the same tick replaces the earlier one
            if map.signatures.last().map(|w| w.tick) == Some(tick) {
                map.signatures.pop();
            }
            map.signatures.push(SignatureWindow {
                tick,
                signature,
                bar,
            });
        }

        map
    }

    /// Build from a conductor track
    pub fn from_track(timebase: u32, track: &Track) -> Self {
        let mut tempo_changes = Vec::new();
        let mut signature_changes = Vec::new();

        for event in track.events() {
            match &event.kind {
                EventKind::Tempo { bpm } => tempo_changes.push((event.tick, *bpm)),
                EventKind::TimeSignature(signature) => {
                    signature_changes.push((event.tick, *signature))
                }
                _ => {}
            }
        }

        TempoMap::from_changes(timebase, &tempo_changes, &signature_changes)
    }

    fn segment_at_tick(&self, tick: Tick) -> TempoSegment {
        let idx = self.tempos.partition_point(|seg| seg.tick <= tick);
        if idx == 0 {
            TempoSegment {
                tick: 0,
                bpm: DEFAULT_BPM,
                time: 0.0,
            }
        } else {
            self.tempos[idx - 1]
        }
    }

    fn segment_at_time(&self, seconds: f64) -> TempoSegment {
        let idx = self.tempos.partition_point(|seg| seg.time <= seconds);
        if idx == 0 {
            TempoSegment {
                tick: 0,
                bpm: DEFAULT_BPM,
                time: 0.0,
            }
        } else {
            self.tempos[idx - 1]
        }
    }

    fn window_at_tick(&self, tick: Tick) -> SignatureWindow {
        let idx = self.signatures.partition_point(|w| w.tick <= tick);
        if idx == 0 {
            SignatureWindow {
                tick: 0,
                signature: TimeSignature::default(),
                bar: 1,
            }
        } else {
            self.signatures[idx - 1]
        }
    }

    fn window_at_bar(&self, bar: i64) -> SignatureWindow {
        let idx = self.signatures.partition_point(|w| w.bar <= bar);
        if idx == 0 {
            SignatureWindow {
                tick: 0,
                signature: TimeSignature::default(),
                bar: 1,
            }
        } else {
            self.signatures[idx - 1]
        }
    }
}

impl TimeBase for TempoMap {
    fn timebase(&self) -> u32 {
        self.timebase
    }

    fn tick_to_time(&self, tick: Tick) -> f64 {
        let seg = self.segment_at_tick(tick);
        seg.time + (tick - seg.tick) as f64 * 60.0 / (seg.bpm * self.timebase as f64)
    }

    fn time_to_tick(&self, seconds: f64) -> Tick {
        let seg = self.segment_at_time(seconds);
        let ticks = (seconds - seg.time) * self.timebase as f64 * seg.bpm / 60.0;
        (seg.tick + (ticks + 0.5).floor() as Tick).max(0)
    }

    fn tick_to_musical(&self, tick: Tick) -> MusicalTime {
        let window = self.window_at_tick(tick);
        let beat_ticks = window.signature.beat_ticks(self.timebase);
        let beats_per_bar = window.signature.beats_per_bar();

        let elapsed = tick - window.tick;
        let beat = elapsed.div_euclid(beat_ticks);
        MusicalTime {
            bar: window.bar + beat.div_euclid(beats_per_bar),
            beat: beat.rem_euclid(beats_per_bar) + 1,
            tick: elapsed - beat * beat_ticks,
        }
    }

    fn musical_to_tick(&self, bar: i64, beat: i64, tick: Tick) -> Tick {
        let window = self.window_at_bar(bar);
        let beat_ticks = window.signature.beat_ticks(self.timebase);
        let beats_per_bar = window.signature.beats_per_bar();

        window.tick + tick + ((beat - 1) + (bar - window.bar) * beats_per_bar) * beat_ticks
    }

    fn time_signature_at(&self, tick: Tick) -> (TimeSignature, Tick) {
        let window = self.window_at_tick(tick);
        (window.signature, window.tick)
    }

    fn tempo_at(&self, tick: Tick) -> (f64, Tick) {
        let seg = self.segment_at_tick(tick);
        (seg.bpm, seg.tick)
    }
}
