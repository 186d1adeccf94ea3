// Musical Grid - Time signatures, bar:beat:tick positions and beat boundaries
// Provides the metric structure guide onsets are quantized against

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sequence::Tick;

/// Musical time signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Beats per bar
    pub numerator: u8,

    /// Note value that gets one beat (4 = quarter note, 8 = eighth note)
    pub denominator: u8,

    /// Explicit beat length in ticks, overriding the one derived from the denominator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticks_per_beat: Option<Tick>,
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8) -> Self {
        TimeSignature {
            numerator,
            denominator,
            ticks_per_beat: None,
        }
    }

    /// Signature with an explicit beat length
    pub fn with_ticks_per_beat(numerator: u8, denominator: u8, ticks_per_beat: Tick) -> Self {
        TimeSignature {
            numerator,
            denominator,
            ticks_per_beat: Some(ticks_per_beat),
        }
    }

    pub fn four_four() -> Self {
        Self::new(4, 4)
    }

    /// Beat length in ticks at the given timebase (ticks per quarter note)
    pub fn beat_ticks(&self, timebase: u32) -> Tick {
        if let Some(ticks) = self.ticks_per_beat.filter(|t| *t > 0) {
            return ticks;
        }
        if self.denominator == 0 {
            return timebase as Tick;
        }
        (timebase as Tick * 4 / self.denominator as Tick).max(1)
    }

    /// Bar length in ticks at the given timebase
    pub fn bar_ticks(&self, timebase: u32) -> Tick {
        self.beat_ticks(timebase) * self.beats_per_bar()
    }

    /// Number of beats per bar (never zero)
    pub fn beats_per_bar(&self) -> Tick {
        (self.numerator as Tick).max(1)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Position expressed as bar:beat:tick
/// Bars and beats are 1-based, tick is the offset within the beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MusicalTime {
    pub bar: i64,
    pub beat: i64,
    pub tick: Tick,
}

impl MusicalTime {
    pub fn new(bar: i64, beat: i64, tick: Tick) -> Self {
        MusicalTime { bar, beat, tick }
    }
}

impl fmt::Display for MusicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.bar, self.beat, self.tick)
    }
}

/// Beat boundaries surrounding a tick inside one signature window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatBounds {
    /// Start of the bar containing the tick
    pub bar_top: Tick,

    /// Start of the beat containing the tick
    pub beat_top: Tick,

    /// Start of the following beat, never past the end of the bar
    pub next_beat_top: Tick,
}

impl BeatBounds {
    /// Locate the bar and beat around `tick`
    ///
    /// `window_start` is the tick where `signature` took effect.
    pub fn locate(
        tick: Tick,
        window_start: Tick,
        signature: &TimeSignature,
        timebase: u32,
    ) -> Self {
        let bar_ticks = signature.bar_ticks(timebase);
        let beat_ticks = signature.beat_ticks(timebase);

        let bar_top = tick - (tick - window_start).rem_euclid(bar_ticks);
        let beat_top = tick - (tick - bar_top).rem_euclid(beat_ticks);
        let next_beat_top = (beat_top + beat_ticks).min(bar_top + bar_ticks);

        BeatBounds {
            bar_top,
            beat_top,
            next_beat_top,
        }
    }

    /// Nearest of the two surrounding beats; an exact tie goes to the later one
    pub fn nearest(&self, tick: Tick) -> Tick {
        if tick - self.beat_top < self.next_beat_top - tick {
            self.beat_top
        } else {
            self.next_beat_top
        }
    }
}
