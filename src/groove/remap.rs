// Tick Remap - Piecewise-linear time -> tick mapping built from guide anchors
// Pulls every event between two anchors proportionally to its elapsed time

use super::quantize::{validate_anchors, AnchorError, GuideAnchor};
use super::tempo::TimeBase;
use crate::sequence::Tick;

/// Monotonic remap from (tick, absolute time) to a reclocked tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickRemapFunction {
    anchors: Vec<GuideAnchor>,
}

impl TickRemapFunction {
    /// Build from an anchor list, rejecting lists that would reverse time
    pub fn new(anchors: Vec<GuideAnchor>) -> Result<Self, AnchorError> {
        validate_anchors(&anchors)?;
        Ok(TickRemapFunction { anchors })
    }

    pub fn anchors(&self) -> &[GuideAnchor] {
        &self.anchors
    }

    /// First anchor (always present)
    pub fn first(&self) -> &GuideAnchor {
        &self.anchors[0]
    }

    /// Last anchor (always present)
    pub fn last(&self) -> &GuideAnchor {
        &self.anchors[self.anchors.len() - 1]
    }

    /// Remapped tick for an event at `tick`, whose absolute time is `time`
    pub fn map(&self, tick: Tick, time: f64) -> Tick {
        let first = self.first();
        let last = self.last();

        if tick < first.original_tick {
            // Never pass the first anchor, even if it snapped backwards
            return tick.min(first.quantized_tick);
        }
        if time >= last.original_time {
            return last.quantized_tick + (tick - last.original_tick);
        }

        let idx = self
            .anchors
            .partition_point(|a| a.original_time <= time)
            .saturating_sub(1);
        let (a, b) = (&self.anchors[idx], &self.anchors[idx + 1]);

        let elapsed = time - a.original_time;
        let fraction = (elapsed / (b.original_time - a.original_time)).clamp(0.0, 1.0);
        let span = (b.quantized_tick - a.quantized_tick) as f64;
        a.quantized_tick + (span * fraction) as Tick
    }

    /// Remapped tick, reading the event's time from a time base
    pub fn map_tick(&self, tick: Tick, time_base: &dyn TimeBase) -> Tick {
        self.map(tick, time_base.tick_to_time(tick))
    }
}
