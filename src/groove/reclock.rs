// Reclocking - Moves a performance onto the grid defined by its guide track
// Remaps every track's ticks and rebuilds the tempo curve so absolute timing is kept

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::quantize::{build_guide_anchors, guide_onsets, AnchorError, GuideAnchor};
use super::remap::TickRemapFunction;
use super::tempo::{TempoMap, TimeBase};
use crate::sequence::{
    BatchModify, Event, EventChange, EventKind, ResolvedBatch, Sequence, Tick, Track, TrackError,
};

/// Errors that can occur during reclocking
#[derive(Debug, Error, PartialEq)]
pub enum ReclockError {
    #[error("Guide track {0} not found")]
    GuideTrackNotFound(usize),

    #[error(transparent)]
    Anchor(#[from] AnchorError),

    #[error(transparent)]
    Track(#[from] TrackError),
}

/// Events moved on one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMoves {
    pub track: usize,
    pub events_moved: usize,
}

/// Outcome of a reclock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReclockReport {
    /// Anchors the remap was built from
    pub anchors: Vec<GuideAnchor>,

    /// Tracks with at least one moved event
    pub moves: Vec<TrackMoves>,

    /// Tempo events dropped from the anchored span
    pub tempo_events_removed: usize,

    /// Tempo events written for the new curve
    pub tempo_events_inserted: usize,
}

/// Reclock a sequence against the note onsets of `guide_track`
///
/// Nothing is modified if the guide track is missing or yields fewer than two anchors.
pub fn reclock(sequence: &mut Sequence, guide_track: usize) -> Result<ReclockReport, ReclockError> {
    let guide = sequence
        .track(guide_track)
        .ok_or(ReclockError::GuideTrackNotFound(guide_track))?;

    let time_base = sequence.tempo_map();
    let onsets = guide_onsets(guide);
    let anchors = build_guide_anchors(&onsets, &time_base)?;
    log::debug!(
        "Guide track {} gave {} anchors from {} onsets",
        guide_track,
        anchors.len(),
        onsets.len()
    );

    reclock_with_anchors(sequence, anchors)
}

/// Reclock a sequence against an explicit anchor list
pub fn reclock_with_anchors(
    sequence: &mut Sequence,
    anchors: Vec<GuideAnchor>,
) -> Result<ReclockReport, ReclockError> {
    let remap = TickRemapFunction::new(anchors)?;
    let time_base = sequence.tempo_map();

    // Plan and resolve every track against the current tempo map before touching any
    let batches: Vec<ResolvedBatch> = sequence
        .tracks()
        .iter()
        .map(|track| {
            let changes = plan_track(track, &remap, &time_base);
            track.resolve(BatchModify::Explicit(changes))
        })
        .collect::<Result<_, _>>()?;
    let tempo_events = tempo_curve(&remap, &time_base);

    let mut moves = Vec::new();
    for (index, batch) in batches.into_iter().enumerate() {
        if batch.is_empty() {
            continue;
        }
        if let Some(track) = sequence.track_mut(index) {
            let events_moved = track.apply(batch);
            log::debug!("Reclocked {} events on track {}", events_moved, index);
            moves.push(TrackMoves {
                track: index,
                events_moved,
            });
        }
    }

    let span = remap.first().quantized_tick..=remap.last().quantized_tick;
    let conductor = sequence.conductor_mut();
    let stale = conductor.select_where(|e| {
        matches!(e.kind, EventKind::Tempo { .. }) && span.contains(&e.tick)
    });
    let tempo_events_removed = conductor.cut(&stale).len();
    let tempo_events_inserted = tempo_events.len();
    conductor.merge(tempo_events);

    let report = ReclockReport {
        anchors: remap.anchors().to_vec(),
        moves,
        tempo_events_removed,
        tempo_events_inserted,
    };

    log::info!(
        "Reclocked {} events across {} tracks on {} anchors ({} tempo events replaced by {})",
        report.moves.iter().map(|m| m.events_moved).sum::<usize>(),
        report.moves.len(),
        report.anchors.len(),
        report.tempo_events_removed,
        report.tempo_events_inserted
    );

    Ok(report)
}

/// Tick and duration changes for one track; unchanged events are left out
fn plan_track(track: &Track, remap: &TickRemapFunction, time_base: &TempoMap) -> Vec<EventChange> {
    track
        .events()
        .iter()
        .filter_map(|event| {
            let tick = remap.map_tick(event.tick, time_base);
            let duration = event.duration().map(|d| {
                let end = remap.map_tick(event.tick + d, time_base);
                (end - tick).max(1)
            });

            if tick == event.tick && duration == event.duration() {
                return None;
            }
            Some(EventChange {
                id: event.id,
                tick,
                duration,
            })
        })
        .collect()
}

/// Tempo events reproducing the guide's timing on the quantized grid
///
/// One event per anchor pair at the earlier anchor, plus one at the last anchor
/// restoring the tempo that was in effect there.
fn tempo_curve(remap: &TickRemapFunction, time_base: &TempoMap) -> Vec<Event> {
    let timebase = time_base.timebase() as f64;
    let mut events = Vec::with_capacity(remap.anchors().len());

    for pair in remap.anchors().windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let width: Tick = b.quantized_tick - a.quantized_tick;
        if width == 0 {
            log::warn!(
                "Skipping tempo for anchors at ticks {} and {}: both quantize to {}",
                a.original_tick,
                b.original_tick,
                a.quantized_tick
            );
            continue;
        }
        let bpm = width as f64 * 60.0 / timebase / (b.original_time - a.original_time);
        events.push(Event::tempo(a.quantized_tick, bpm));
    }

    let last = remap.last();
    let (bpm, _) = time_base.tempo_at(last.original_tick);
    events.push(Event::tempo(last.quantized_tick, bpm));

    events
}
