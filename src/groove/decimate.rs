// Decimation - Thins dense controller and pitch bend streams
// Parallel streams share one sampling boundary that advances by a fixed time interval

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::tempo::TimeBase;
use crate::sequence::{Event, Selection, Sequence, StreamKind, Tick};

/// Errors raised before a decimation touches any track
#[derive(Debug, Error, PartialEq)]
pub enum DecimateError {
    #[error("No events selected")]
    NoSelection,

    #[error(
        "Track {track} has a selected {found} event; \
         all streams must share one controller number or be pitch bend"
    )]
    KindMismatch { track: usize, found: String },

    #[error("Invalid interval: {0} ms")]
    InvalidInterval(f64),

    #[error("Track {0} not found")]
    TrackNotFound(usize),

    #[error("Track {0} is selected more than once")]
    DuplicateTrack(usize),
}

/// One point of a continuous stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub tick: Tick,
    pub value: f64,
}

impl ControlPoint {
    pub fn new(tick: Tick, value: f64) -> Self {
        ControlPoint { tick, value }
    }
}

/// Point counts for one decimated stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub track: usize,
    pub points_before: usize,
    pub points_after: usize,
}

/// Walks one input stream and collects its output
struct Cursor<'a> {
    points: &'a [ControlPoint],
    pos: usize,
    last_emitted: Option<i32>,
    output: Vec<ControlPoint>,
}

impl<'a> Cursor<'a> {
    fn new(points: &'a [ControlPoint]) -> Self {
        Cursor {
            points,
            pos: 0,
            last_emitted: None,
            output: Vec::new(),
        }
    }

    fn current(&self) -> Option<&ControlPoint> {
        self.points.get(self.pos)
    }

    /// Next point for a boundary the current point trails
    fn catch_up(&mut self, boundary: Tick) -> ControlPoint {
        while self.points.get(self.pos).is_some_and(|p| p.tick < boundary) {
            self.pos += 1;
        }

        match self.points.get(self.pos) {
            Some(next) if next.tick == boundary => {
                self.pos += 1;
                *next
            }
            Some(next) => {
                // pos > 0: at least one point trailed the boundary
                let prev = &self.points[self.pos - 1];
                let fraction = (boundary - prev.tick) as f64 / (next.tick - prev.tick) as f64;
                ControlPoint::new(boundary, prev.value + (next.value - prev.value) * fraction)
            }
            None => {
                let last = &self.points[self.points.len() - 1];
                ControlPoint::new(boundary, last.value)
            }
        }
    }

    /// Record a point unless its truncated value repeats the previous one
    fn emit(&mut self, point: ControlPoint, kind: StreamKind) {
        let native = kind.truncate(point.value);
        if self.last_emitted == Some(native) {
            return;
        }
        self.last_emitted = Some(native);
        self.output.push(ControlPoint::new(point.tick, native as f64));
    }
}

/// Decimate parallel streams of one kind
///
/// Algorithm:
/// 1. Pick the stream whose next point is earliest (ties go to the earlier stream)
/// 2. A point at or past the boundary is emitted as is
/// 3. A point trailing the boundary is skipped up to it; the value at the boundary
///    is interpolated, or held from the last point when the stream runs out
/// 4. Points repeating the previous truncated value are dropped
/// 5. The boundary moves `interval_ms` later in absolute time
///
/// Output values are truncated to the stream's native domain.
pub fn decimate_streams(
    streams: &[Vec<ControlPoint>],
    kind: StreamKind,
    interval_ms: f64,
    time_base: &dyn TimeBase,
) -> Result<Vec<Vec<ControlPoint>>, DecimateError> {
    if !interval_ms.is_finite() || interval_ms < 0.0 {
        return Err(DecimateError::InvalidInterval(interval_ms));
    }
    let interval = interval_ms / 1000.0;

    let mut cursors: Vec<Cursor> = streams.iter().map(|s| Cursor::new(s)).collect();
    let mut boundary: Option<Tick> = None;

    loop {
        let chosen = cursors
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.current().map(|p| (p.tick, i)))
            .min();
        let Some((tick, index)) = chosen else {
            break;
        };

        let cursor = &mut cursors[index];
        let point = match boundary {
            Some(b) if tick < b => cursor.catch_up(b),
            _ => {
                let point = cursor.points[cursor.pos];
                cursor.pos += 1;
                point
            }
        };
        cursor.emit(point, kind);

        let next = time_base.time_to_tick(time_base.tick_to_time(point.tick) + interval);
        boundary = Some(next);
    }

    Ok(cursors.into_iter().map(|c| c.output).collect())
}

/// Decimate the selected events of several tracks in place
///
/// Every selection must resolve to events of one stream kind. All output is
/// computed before any track is changed; each selection is then cut and the
/// new points merged back.
pub fn decimate(
    sequence: &mut Sequence,
    selections: &[(usize, Selection)],
    interval_ms: f64,
) -> Result<Vec<StreamSummary>, DecimateError> {
    if !interval_ms.is_finite() || interval_ms < 0.0 {
        return Err(DecimateError::InvalidInterval(interval_ms));
    }

    let mut kind: Option<StreamKind> = None;
    let mut inputs: Vec<(usize, &Selection, Vec<ControlPoint>)> = Vec::new();

    let mut seen = HashSet::new();
    for (track_index, selection) in selections {
        if !seen.insert(*track_index) {
            return Err(DecimateError::DuplicateTrack(*track_index));
        }
        let track = sequence
            .track(*track_index)
            .ok_or(DecimateError::TrackNotFound(*track_index))?;

        let events = track.selected(selection);
        if events.is_empty() {
            continue;
        }

        let mut points = Vec::with_capacity(events.len());
        for event in events {
            let stream = event.stream_kind().filter(|s| kind.map_or(true, |k| k == *s));
            let (Some(stream), Some(value)) = (stream, event.control_value()) else {
                return Err(DecimateError::KindMismatch {
                    track: *track_index,
                    found: event.describe_kind(),
                });
            };
            kind = Some(stream);
            points.push(ControlPoint::new(event.tick, value));
        }
        inputs.push((*track_index, selection, points));
    }

    let Some(kind) = kind else {
        return Err(DecimateError::NoSelection);
    };

    let time_base = sequence.tempo_map();
    let streams: Vec<Vec<ControlPoint>> = inputs.iter().map(|(_, _, p)| p.clone()).collect();
    let outputs = decimate_streams(&streams, kind, interval_ms, &time_base)?;

    let mut summaries = Vec::with_capacity(outputs.len());
    for ((track_index, selection, points), output) in inputs.iter().zip(outputs) {
        let summary = StreamSummary {
            track: *track_index,
            points_before: points.len(),
            points_after: output.len(),
        };
        log::debug!(
            "Decimated {} on track {}: {} -> {} points",
            kind,
            track_index,
            summary.points_before,
            summary.points_after
        );

        let replacement: Vec<Event> = output
            .iter()
            .map(|p| Event::new(p.tick, kind.event_kind(p.value)))
            .collect();

        if let Some(track) = sequence.track_mut(*track_index) {
            track.cut(selection);
            track.merge(replacement);
        }
        summaries.push(summary);
    }

    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groove::tempo::TempoMap;
    use crate::sequence::Track;

    fn ramp(step: usize) -> Vec<ControlPoint> {
        (0..=480)
            .step_by(step)
            .map(|t| ControlPoint::new(t as Tick, (10 + t / 48) as f64))
            .collect()
    }

    fn ticks_and_values(points: &[ControlPoint]) -> Vec<(Tick, f64)> {
        points.iter().map(|p| (p.tick, p.value)).collect()
    }

    #[test]
    fn test_dense_ramp_reduces_to_interval() {
        let map = TempoMap::new(480);
        let out = decimate_streams(&[ramp(8)], StreamKind::Controller(1), 100.0, &map).unwrap();
        assert_eq!(
            ticks_and_values(&out[0]),
            vec![(0, 10.0), (96, 12.0), (192, 14.0), (288, 16.0), (384, 18.0), (480, 20.0)]
        );
    }

    #[test]
    fn test_sparse_stream_is_unchanged() {
        let map = TempoMap::new(480);
        let input = vec![ControlPoint::new(0, 10.0), ControlPoint::new(480, 20.0)];
        let out =
            decimate_streams(&[input.clone()], StreamKind::Controller(1), 100.0, &map).unwrap();
        assert_eq!(out[0], input);
    }

    #[test]
    fn test_interpolates_at_boundary() {
        let map = TempoMap::new(480);
        let input: Vec<ControlPoint> = (0..=20)
            .map(|i| ControlPoint::new(i * 10, i as f64))
            .collect();
        let out = decimate_streams(&[input], StreamKind::Controller(7), 100.0, &map).unwrap();

        // 96 falls between 90 (9) and 100 (10); the final value is held to the next boundary
        assert_eq!(
            ticks_and_values(&out[0]),
            vec![(0, 0.0), (96, 9.0), (192, 19.0), (288, 20.0)]
        );
    }

    #[test]
    fn test_repeated_values_are_dropped() {
        let map = TempoMap::new(480);
        let input: Vec<ControlPoint> = (0..=10)
            .map(|i| ControlPoint::new(i * 96, if i < 10 { 64.0 } else { 65.0 }))
            .collect();
        let out = decimate_streams(&[input], StreamKind::Controller(7), 100.0, &map).unwrap();
        assert_eq!(ticks_and_values(&out[0]), vec![(0, 64.0), (960, 65.0)]);
    }

    #[test]
    fn test_output_never_longer_and_keeps_end_values() {
        let map = TempoMap::from_changes(480, &[(0, 90.0), (300, 150.0)], &[]);
        let input: Vec<ControlPoint> = (0..200)
            .map(|i| ControlPoint::new(i * 7, ((i * 37) % 16384) as f64 - 8192.0))
            .collect();
        let out = decimate_streams(&[input.clone()], StreamKind::PitchBend, 35.0, &map).unwrap();

        assert!(out[0].len() <= input.len());
        assert_eq!(out[0][0].value, input[0].value);
        assert_eq!(out[0][out[0].len() - 1].value, input[input.len() - 1].value);
        assert!(out[0].windows(2).all(|w| w[0].tick < w[1].tick));
    }

    #[test]
    fn test_decimation_is_fixed_point() {
        let map = TempoMap::new(480);
        let input: Vec<ControlPoint> = (0..=20)
            .map(|i| ControlPoint::new(i * 10, i as f64))
            .collect();
        let once = decimate_streams(&[input], StreamKind::Controller(7), 100.0, &map).unwrap();
        let twice = decimate_streams(&once, StreamKind::Controller(7), 100.0, &map).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_streams_share_one_boundary() {
        let map = TempoMap::new(480);
        let a = vec![ControlPoint::new(0, 0.0), ControlPoint::new(50, 50.0)];
        let b = vec![ControlPoint::new(10, 100.0), ControlPoint::new(200, 110.0)];
        let out = decimate_streams(&[a, b], StreamKind::Controller(1), 100.0, &map).unwrap();

        assert_eq!(ticks_and_values(&out[0]), vec![(0, 0.0), (192, 50.0)]);
        assert_eq!(ticks_and_values(&out[1]), vec![(96, 104.0), (288, 110.0)]);
    }

    #[test]
    fn test_invalid_interval() {
        let map = TempoMap::new(480);
        assert_eq!(
            decimate_streams(&[ramp(8)], StreamKind::PitchBend, -1.0, &map),
            Err(DecimateError::InvalidInterval(-1.0))
        );
        assert!(decimate_streams(&[ramp(8)], StreamKind::PitchBend, f64::NAN, &map).is_err());
    }

    fn controller_track(number: u8) -> Track {
        let events = (0..=480)
            .step_by(8)
            .map(|t| Event::controller(t as Tick, number, (10 + t / 48) as u8))
            .collect();
        Track::with_events("Automation", events)
    }

    #[test]
    fn test_decimate_replaces_selection() {
        let mut seq = Sequence::default();
        let mut track = controller_track(11);
        track.insert(Event::note(100, 60, 100, 240));
        let index = seq.add_track(track);

        let selection = seq
            .track(index)
            .unwrap()
            .select_where(|e| e.code() == Some(11) && e.duration().is_none());
        let summaries = decimate(&mut seq, &[(index, selection)], 100.0).unwrap();

        assert_eq!(
            summaries,
            vec![StreamSummary {
                track: index,
                points_before: 61,
                points_after: 6
            }]
        );
        let track = seq.track(index).unwrap();
        assert_eq!(track.len(), 7);
        let cc_ticks: Vec<Tick> = track
            .events()
            .iter()
            .filter(|e| e.stream_kind().is_some())
            .map(|e| e.tick)
            .collect();
        assert_eq!(cc_ticks, vec![0, 96, 192, 288, 384, 480]);
    }

    #[test]
    fn test_empty_selection_leaves_sequence_untouched() {
        let mut seq = Sequence::default();
        let index = seq.add_track(controller_track(1));

        let result = decimate(&mut seq, &[(index, Selection::new())], 100.0);
        assert_eq!(result, Err(DecimateError::NoSelection));
        assert_eq!(seq.track(index).unwrap().len(), 61);
    }

    #[test]
    fn test_kind_mismatch_aborts_before_mutation() {
        let mut seq = Sequence::default();
        let first = seq.add_track(controller_track(1));
        let second = seq.add_track(controller_track(7));

        let selections = vec![
            (first, seq.track(first).unwrap().select_all()),
            (second, seq.track(second).unwrap().select_all()),
        ];
        let result = decimate(&mut seq, &selections, 100.0);

        assert_eq!(
            result,
            Err(DecimateError::KindMismatch {
                track: second,
                found: "controller 7".to_string()
            })
        );
        assert_eq!(seq.track(first).unwrap().len(), 61);
    }

    #[test]
    fn test_notes_are_not_a_stream() {
        let mut seq = Sequence::default();
        let index = seq.add_track(Track::with_events("Keys", vec![Event::note(0, 60, 100, 10)]));
        let selection = seq.track(index).unwrap().select_all();

        assert_eq!(
            decimate(&mut seq, &[(index, selection)], 100.0),
            Err(DecimateError::KindMismatch {
                track: index,
                found: "note".to_string()
            })
        );
    }

    #[test]
    fn test_same_track_twice_is_rejected() {
        let mut seq = Sequence::default();
        let index = seq.add_track(controller_track(1));
        let selection = seq.track(index).unwrap().select_all();

        let selections = vec![(index, selection.clone()), (index, selection)];
        let result = decimate(&mut seq, &selections, 100.0);
        assert_eq!(result, Err(DecimateError::DuplicateTrack(index)));

        let ticks: Vec<Tick> = seq
            .track(index)
            .unwrap()
            .events()
            .iter()
            .map(|e| e.tick)
            .collect();
        assert_eq!(ticks.len(), 61);
        assert_eq!(ticks.last(), Some(&480));
    }

    #[test]
    fn test_unknown_track() {
        let mut seq = Sequence::default();
        assert_eq!(
            decimate(&mut seq, &[(9, Selection::new())], 100.0),
            Err(DecimateError::TrackNotFound(9))
        );
    }
}
