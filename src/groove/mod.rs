// Groove Engine - Tempo map, grid, decimation and reclocking
// Tempo-relative retiming of sequence events

pub mod decimate;
pub mod grid;
pub mod quantize;
pub mod reclock;
pub mod remap;
pub mod tempo;

pub use decimate::{decimate, decimate_streams, ControlPoint, DecimateError, StreamSummary};
pub use grid::{BeatBounds, MusicalTime, TimeSignature};
pub use quantize::{build_guide_anchors, guide_onsets, AnchorError, GuideAnchor};
pub use reclock::{reclock, reclock_with_anchors, ReclockError, ReclockReport, TrackMoves};
pub use remap::TickRemapFunction;
pub use tempo::{TempoMap, TimeBase, DEFAULT_BPM};
