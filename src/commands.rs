// Sequence Commands - Decimate and reclock entry points
// Each command takes its settings, runs to completion and returns them with a report
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::groove::{self, DecimateError, ReclockError, ReclockReport, StreamSummary};
use crate::sequence::{Selection, Sequence};
use crate::settings::{
    CommandSettings, DecimateSettings, ReclockSettings, SettingsError, DECIMATE_SETTINGS_KEY,
    RECLOCK_SETTINGS_KEY,
};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Track {0} not found")]
    TrackNotFound(usize),

    #[error(transparent)]
    Decimate(DecimateError),

    #[error(transparent)]
    Reclock(ReclockError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

// Missing tracks surface as `TrackNotFound` whichever command hit them
impl From<DecimateError> for CommandError {
    fn from(error: DecimateError) -> Self {
        match error {
            DecimateError::TrackNotFound(index) => CommandError::TrackNotFound(index),
            other => CommandError::Decimate(other),
        }
    }
}

impl From<ReclockError> for CommandError {
    fn from(error: ReclockError) -> Self {
        match error {
            ReclockError::GuideTrackNotFound(index) => CommandError::TrackNotFound(index),
            other => CommandError::Reclock(other),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Command result together with the settings it ran with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome<R, S> {
    pub report: R,
    pub settings: S,
}

/// Per-stream point counts of a decimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecimateReport {
    pub streams: Vec<StreamSummary>,
}

impl DecimateReport {
    pub fn points_before(&self) -> usize {
        self.streams.iter().map(|s| s.points_before).sum()
    }

    pub fn points_after(&self) -> usize {
        self.streams.iter().map(|s| s.points_after).sum()
    }
}

// ==================== DECIMATE ====================

/// Thin the current selection of every track
///
/// All selected events across the considered tracks must belong to one
/// controller number, or all be pitch bend.
pub fn decimate_command(
    sequence: &mut Sequence,
    settings: DecimateSettings,
) -> CommandResult<CommandOutcome<DecimateReport, DecimateSettings>> {
    let selections: Vec<(usize, Selection)> = sequence
        .tracks()
        .iter()
        .enumerate()
        .filter(|(_, track)| track.editable || !settings.editable_only)
        .filter(|(_, track)| !track.selection().is_empty())
        .map(|(index, track)| (index, track.selection().clone()))
        .collect();

    let streams = groove::decimate(sequence, &selections, settings.interval_ms)?;
    let report = DecimateReport { streams };

    log::info!(
        "Decimated {} streams at {} ms: {} -> {} points",
        report.streams.len(),
        settings.interval_ms,
        report.points_before(),
        report.points_after()
    );

    Ok(CommandOutcome { report, settings })
}

/// Decimate with settings read from and written back to `store`
pub fn decimate_with_store(
    sequence: &mut Sequence,
    store: &mut CommandSettings,
) -> CommandResult<DecimateReport> {
    let settings: DecimateSettings = store.load(DECIMATE_SETTINGS_KEY);
    let outcome = decimate_command(sequence, settings)?;
    store.store(DECIMATE_SETTINGS_KEY, &outcome.settings)?;
    Ok(outcome.report)
}

// ==================== RECLOCK ====================

/// Reclock the sequence so the guide track's onsets fall on beats
pub fn reclock_command(
    sequence: &mut Sequence,
    settings: ReclockSettings,
) -> CommandResult<CommandOutcome<ReclockReport, ReclockSettings>> {
    let report = groove::reclock(sequence, settings.guide_track)?;
    Ok(CommandOutcome { report, settings })
}

/// Reclock with settings read from and written back to `store`
pub fn reclock_with_store(
    sequence: &mut Sequence,
    store: &mut CommandSettings,
) -> CommandResult<ReclockReport> {
    let settings: ReclockSettings = store.load(RECLOCK_SETTINGS_KEY);
    let outcome = reclock_command(sequence, settings)?;
    store.store(RECLOCK_SETTINGS_KEY, &outcome.settings)?;
    Ok(outcome.report)
}
