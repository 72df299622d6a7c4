//! Activity Detection
//!
//! Segments recorded vehicle trips into labeled activities:
//! - Longitudinal: cruising, accelerating, decelerating (host and targets)
//! - Lateral host: lane-following, left/right lane change
//! - Lateral target: lane-following, cut-in, cut-out per side
//! - Per-frame target states and the lead-vehicle tag
//!
//! Detection is a pure batch pass over a complete [`SignalTable`]: the
//! algorithms look ahead by bounded horizons and cannot run on a live,
//! growing series. Re-running on the same table and configuration yields
//! identical events and columns.

pub mod config;
pub mod events;
pub mod lateral_host;
pub mod lateral_target;
pub mod longitudinal;
pub mod states;

pub use config::{ChannelSchema, DetectorConfig, LineChannels};
pub use events::{
    apply_events, ActivityLabel, Event, LateralActivityHost, LateralActivityTarget, LateralState,
    LeadVehicle, LongitudinalActivity, LongitudinalState,
};
pub use lateral_host::HostLateralDetector;
pub use lateral_target::{LineProjection, TargetLateralDetector};
pub use longitudinal::LongitudinalDetector;
pub use states::{FrameClassifier, TargetFrameStates};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use signal_table::{SignalTable, TableError};

/// Detection error types
#[derive(Error, Debug)]
pub enum DetectionError {
    /// Table access failed (missing channel, length mismatch)
    #[error(transparent)]
    Table(#[from] TableError),

    /// Configuration value outside its documented range
    #[error("Configuration value {name} = {value} is out of range")]
    InvalidConfig { name: &'static str, value: f64 },
}

/// Ordered event lists of one target slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetReport {
    /// Slot index.
    pub slot: usize,
    /// Longitudinal activity events (relative speed channel).
    pub longitudinal: Vec<Event<LongitudinalActivity>>,
    /// Lateral activity events.
    pub lateral: Vec<Event<LateralActivityTarget>>,
}

/// Ordered event lists of a full detection run, for the visualization and
/// persistence collaborators. The table itself carries the forward-filled
/// label columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    /// Host longitudinal activity events.
    pub host_longitudinal: Vec<Event<LongitudinalActivity>>,
    /// Host lateral activity events.
    pub host_lateral: Vec<Event<LateralActivityHost>>,
    /// Per-slot event lists.
    pub targets: Vec<TargetReport>,
}

/// Top-level detector running every activity pass over a table.
pub struct ActivityDetector {
    config: DetectorConfig,
    schema: ChannelSchema,
}

impl ActivityDetector {
    /// Create a detector, rejecting configurations outside their documented
    /// ranges.
    pub fn new(config: DetectorConfig, schema: ChannelSchema) -> Result<Self, DetectionError> {
        config.validate()?;
        Ok(Self { config, schema })
    }

    /// The validated configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// The channel schema.
    pub fn schema(&self) -> &ChannelSchema {
        &self.schema
    }

    /// Run all detectors and forward-fill their label columns.
    ///
    /// Order matters only where data flows: per-frame states need the
    /// projected line columns of the lateral target pass, and lead selection
    /// needs every slot's lateral state. Everything else is independent.
    pub fn annotate(&self, table: &mut SignalTable) -> Result<DetectionReport, DetectionError> {
        info!(
            "annotating {} samples at {} Hz, {} target slots",
            table.len(),
            table.frequency(),
            self.config.n_targets
        );

        let longitudinal = LongitudinalDetector::new(&self.config);
        let host_longitudinal = longitudinal.detect(table, &self.schema.host_speed)?;
        apply_events(table, "host_longitudinal_activity", &host_longitudinal)?;

        let host_lateral = HostLateralDetector::new(&self.config, &self.schema).detect(table)?;
        apply_events(table, "host_lateral_activity", &host_lateral)?;

        let lateral = TargetLateralDetector::new(&self.config, &self.schema);
        let classifier = FrameClassifier::new(&self.config, &self.schema);
        let mut targets = Vec::with_capacity(self.config.n_targets);
        let mut states = Vec::with_capacity(self.config.n_targets);
        for slot in 0..self.config.n_targets {
            let events = longitudinal.detect(table, &self.schema.target_vx(slot))?;
            apply_events(
                table,
                &self.schema.target_channel(slot, "longitudinal_activity"),
                &events,
            )?;
            let lateral_events = lateral.detect(table, slot)?;
            apply_events(
                table,
                &self.schema.target_channel(slot, "lateral_activity"),
                &lateral_events,
            )?;
            states.push(classifier.classify_target(table, slot)?);
            targets.push(TargetReport {
                slot,
                longitudinal: events,
                lateral: lateral_events,
            });
        }
        classifier.select_lead(table, &states)?;

        Ok(DetectionReport {
            host_longitudinal,
            host_lateral,
            targets,
        })
    }
}
