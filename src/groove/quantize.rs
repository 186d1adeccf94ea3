// Guide Quantization - Snaps guide-track onsets onto beat boundaries
// Produces the ordered anchor points the tick remap is built from

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::grid::BeatBounds;
use super::tempo::TimeBase;
use crate::sequence::{EventKind, Tick, Track};

/// Minimum number of anchors a remap needs
pub const MIN_ANCHORS: usize = 2;

/// Errors raised while building or validating anchors
#[derive(Debug, Error, PartialEq)]
pub enum AnchorError {
    #[error("The guide track needs at least {MIN_ANCHORS} distinct note onsets (found {found})")]
    InsufficientAnchors { found: usize },

    #[error("Anchor {index} is out of order")]
    OutOfOrder { index: usize },
}

/// One guide onset and the grid position it is pulled to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideAnchor {
    /// Onset tick before reclocking
    pub original_tick: Tick,

    /// Beat boundary the onset lands on after reclocking
    pub quantized_tick: Tick,

    /// Absolute time of the onset in seconds
    pub original_time: f64,
}

impl GuideAnchor {
    pub fn new(original_tick: Tick, quantized_tick: Tick, original_time: f64) -> Self {
        GuideAnchor {
            original_tick,
            quantized_tick,
            original_time,
        }
    }
}

/// Note onset ticks of a guide track, ascending, with chords collapsed
pub fn guide_onsets(track: &Track) -> Vec<Tick> {
    let mut onsets: Vec<Tick> = track
        .events()
        .iter()
        .filter(|e| matches!(e.kind, EventKind::Note { .. }))
        .map(|e| e.tick)
        .collect();
    onsets.sort_unstable();
    onsets.dedup();
    onsets
}

/// Quantize guide onsets into anchors
///
/// Algorithm:
/// 1. Locate the bar and beat around each onset in its signature window
/// 2. The first onset snaps to the nearer of its beat start and the next beat
///    (an exact tie goes to the next beat)
/// 3. Every later onset snaps forward to the next beat
pub fn build_guide_anchors(
    onsets: &[Tick],
    time_base: &dyn TimeBase,
) -> Result<Vec<GuideAnchor>, AnchorError> {
    let mut sorted = onsets.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    if sorted.len() < MIN_ANCHORS {
        return Err(AnchorError::InsufficientAnchors {
            found: sorted.len(),
        });
    }

    let timebase = time_base.timebase();
    let anchors = sorted
        .iter()
        .enumerate()
        .map(|(i, &tick)| {
            let (signature, window_start) = time_base.time_signature_at(tick);
            let bounds = BeatBounds::locate(tick, window_start, &signature, timebase);

            let quantized_tick = if i == 0 {
                bounds.nearest(tick)
            } else {
                bounds.next_beat_top
            };

            GuideAnchor::new(tick, quantized_tick, time_base.tick_to_time(tick))
        })
        .collect();

    Ok(anchors)
}

/// Check the anchor invariants: enough anchors, strictly increasing original
/// ticks and times, non-decreasing quantized ticks
pub fn validate_anchors(anchors: &[GuideAnchor]) -> Result<(), AnchorError> {
    if anchors.len() < MIN_ANCHORS {
        return Err(AnchorError::InsufficientAnchors {
            found: anchors.len(),
        });
    }

    for (i, pair) in anchors.windows(2).enumerate() {
        let (a, b) = (&pair[0], &pair[1]);
        let ordered = a.original_tick < b.original_tick
            && a.original_time < b.original_time
            && a.quantized_tick <= b.quantized_tick;
        if !ordered {
            return Err(AnchorError::OutOfOrder { index: i + 1 });
        }
    }

    Ok(())
}
