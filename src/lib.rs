// Retempo - Tempo-relative event retiming for MIDI sequences
// Module declarations

pub mod commands;
pub mod groove;
pub mod sequence;
pub mod settings;

pub use commands::{
    decimate_command, reclock_command, CommandError, CommandOutcome, CommandResult,
    DecimateReport,
};
pub use groove::{ReclockReport, TempoMap, TimeBase};
pub use sequence::{Event, EventId, EventKind, Sequence, Tick, Track};
pub use settings::{CommandSettings, DecimateSettings, ReclockSettings};
