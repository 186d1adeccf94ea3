// Track - Tick-ordered event storage with selections and batch edits
// Positions shift whenever ticks change, so edits address events by EventId

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::event::{Event, EventId, EventKind, Tick};

/// Errors that can occur while editing a track
#[derive(Debug, Error, PartialEq)]
pub enum TrackError {
    #[error("Event {0} is not in this track")]
    UnknownEvent(EventId),

    #[error("Invalid scale factor: {0}")]
    InvalidScale(f64),
}

/// Ordered subset of a track's events, keyed by identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    ids: Vec<EventId>,
}

impl Selection {
    pub fn new() -> Self {
        Selection { ids: Vec::new() }
    }

    pub fn from_ids(ids: Vec<EventId>) -> Self {
        Selection { ids }
    }

    pub fn ids(&self) -> &[EventId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }
}

/// New position (and optionally length) for one event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventChange {
    pub id: EventId,
    pub tick: Tick,

    /// New note length; ignored for events without a duration
    pub duration: Option<Tick>,
}

/// A positional edit applied to many events in one pass
#[derive(Debug, Clone, PartialEq)]
pub enum BatchModify {
    /// Explicit per-event values
    Explicit(Vec<EventChange>),

    /// `tick' = origin + (tick - origin) * scale + offset` for every selected event;
    /// note lengths are scaled by the same factor
    ScaleOffset {
        selection: Selection,
        origin: Tick,
        scale: f64,
        offset: Tick,
    },
}

/// A batch edit checked against one track, ready to apply
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBatch {
    /// Event position at resolve time and its new values
    changes: Vec<(usize, EventChange)>,
}

impl ResolvedBatch {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// A sequence track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Track name
    pub name: String,

    /// Whether edit commands may touch this track
    pub editable: bool,

    /// Events sorted by tick; equal ticks keep insertion order
    events: Vec<Event>,

    /// Current user selection
    selection: Selection,
}

impl Track {
    /// Create an empty, editable track
    pub fn new(name: impl Into<String>) -> Self {
        Track {
            name: name.into(),
            editable: true,
            events: Vec::new(),
            selection: Selection::new(),
        }
    }

    /// Create a track from events in any order
    pub fn with_events(name: impl Into<String>, events: Vec<Event>) -> Self {
        let mut track = Track::new(name);
        track.merge(events);
        track
    }

    /// Events in tick order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event(&self, id: &EventId) -> Option<&Event> {
        self.events.iter().find(|e| e.id == *id)
    }

    /// Insert one event after any events already on the same tick
    pub fn insert(&mut self, event: Event) {
        let pos = self.events.partition_point(|e| e.tick <= event.tick);
        self.events.insert(pos, event);
    }

    /// Insert events in tick order, each after existing events on its tick
    pub fn merge(&mut self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        self.events.extend(events);
        // Stable sort keeps existing events ahead of newcomers on equal ticks
        self.events.sort_by_key(|e| e.tick);
    }

    /// Remove the selected events, returning them in tick order
    pub fn cut(&mut self, selection: &Selection) -> Vec<Event> {
        let wanted: HashSet<EventId> = selection.ids().iter().copied().collect();
        let (removed, kept): (Vec<Event>, Vec<Event>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|e| wanted.contains(&e.id));
        self.events = kept;

        let selection_ids: Vec<EventId> = self
            .selection
            .ids()
            .iter()
            .copied()
            .filter(|id| !wanted.contains(id))
            .collect();
        self.selection = Selection::from_ids(selection_ids);

        removed
    }

    /// Select every event
    pub fn select_all(&self) -> Selection {
        Selection::from_ids(self.events.iter().map(|e| e.id).collect())
    }

    /// Select events matching a predicate, in tick order
    pub fn select_where<F>(&self, mut predicate: F) -> Selection
    where
        F: FnMut(&Event) -> bool,
    {
        Selection::from_ids(
            self.events
                .iter()
                .filter(|e| predicate(e))
                .map(|e| e.id)
                .collect(),
        )
    }

    /// Selected events in tick order; ids not in this track are skipped
    pub fn selected(&self, selection: &Selection) -> Vec<&Event> {
        let wanted: HashSet<&EventId> = selection.ids().iter().collect();
        self.events.iter().filter(|e| wanted.contains(&e.id)).collect()
    }

    /// Current user selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    /// Apply a positional batch edit atomically
    ///
    /// Every referenced event is validated before anything moves; the track is
    /// re-sorted once at the end. Returns the number of events changed.
    pub fn modify(&mut self, batch: BatchModify) -> Result<usize, TrackError> {
        let resolved = self.resolve(batch)?;
        Ok(self.apply(resolved))
    }

    /// Validate a batch edit against this track without changing it
    pub fn resolve(&self, batch: BatchModify) -> Result<ResolvedBatch, TrackError> {
        let changes = match batch {
            BatchModify::Explicit(changes) => changes,
            BatchModify::ScaleOffset {
                selection,
                origin,
                scale,
                offset,
            } => self.scaled_changes(&selection, origin, scale, offset)?,
        };

        let positions: HashMap<EventId, usize> = self
            .events
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.id, pos))
            .collect();

        let resolved = changes
            .into_iter()
            .map(|change| {
                positions
                    .get(&change.id)
                    .map(|pos| (*pos, change))
                    .ok_or(TrackError::UnknownEvent(change.id))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedBatch { changes: resolved })
    }

    /// Apply a batch resolved against this track; cannot fail
    ///
    /// Entries whose event is no longer at its resolved position are skipped.
    /// Returns the number of events changed.
    pub fn apply(&mut self, batch: ResolvedBatch) -> usize {
        let mut applied = 0;
        for (pos, change) in &batch.changes {
            let Some(event) = self.events.get_mut(*pos).filter(|e| e.id == change.id) else {
                continue;
            };
            event.tick = change.tick;
            if let (Some(new_duration), EventKind::Note { duration, .. }) =
                (change.duration, &mut event.kind)
            {
                *duration = new_duration;
            }
            applied += 1;
        }
        self.events.sort_by_key(|e| e.tick);

        applied
    }

    fn scaled_changes(
        &self,
        selection: &Selection,
        origin: Tick,
        scale: f64,
        offset: Tick,
    ) -> Result<Vec<EventChange>, TrackError> {
        if !scale.is_finite() || scale < 0.0 {
            return Err(TrackError::InvalidScale(scale));
        }

        selection
            .ids()
            .iter()
            .map(|id| {
                let event = self.event(id).ok_or(TrackError::UnknownEvent(*id))?;
                let scaled = origin as f64 + (event.tick - origin) as f64 * scale;
                Ok(EventChange {
                    id: *id,
                    tick: (scaled.floor() as Tick + offset).max(0),
                    duration: event
                        .duration()
                        .map(|d| ((d as f64 * scale).floor() as Tick).max(1)),
                })
            })
            .collect()
    }
}
