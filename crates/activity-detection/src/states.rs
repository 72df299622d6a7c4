//! Per-frame target states and lead-vehicle selection

use tracing::debug;

use signal_table::SignalTable;

use crate::config::{ChannelSchema, DetectorConfig};
use crate::events::{ActivityLabel, LateralState, LeadVehicle, LongitudinalState};
use crate::DetectionError;

/// Frame-by-frame state of one target slot.
#[derive(Debug, Clone)]
pub struct TargetFrameStates {
    /// Front/rear relative to the host.
    pub longitudinal: Vec<LongitudinalState>,
    /// Lane relative to the projected host lane.
    pub lateral: Vec<LateralState>,
}

/// Classifier for per-frame target states and the lead-vehicle tag.
pub struct FrameClassifier<'a> {
    config: &'a DetectorConfig,
    schema: &'a ChannelSchema,
}

impl<'a> FrameClassifier<'a> {
    /// Create a classifier borrowing a validated configuration and schema.
    pub fn new(config: &'a DetectorConfig, schema: &'a ChannelSchema) -> Self {
        Self { config, schema }
    }

    /// Classify one target slot frame by frame.
    ///
    /// Requires the projected line columns of the slot, so it runs after the
    /// lateral target detector. Writes the state columns and returns the
    /// states for the lead-vehicle selection.
    pub fn classify_target(
        &self,
        table: &mut SignalTable,
        slot: usize,
    ) -> Result<TargetFrameStates, DetectionError> {
        let n = table.len();
        let dx = table.get(&self.schema.target_dx(slot))?.to_vec();
        let id = table.get(&self.schema.target_id(slot))?.to_vec();
        let left = table
            .get(&self.schema.target_channel(slot, "line_left"))?
            .to_vec();
        let right = table
            .get(&self.schema.target_channel(slot, "line_right"))?
            .to_vec();
        let left_q = table.get(&self.schema.left_line.quality)?.to_vec();
        let right_q = table.get(&self.schema.right_line.quality)?.to_vec();

        let mut longitudinal = Vec::with_capacity(n);
        let mut lateral = Vec::with_capacity(n);
        for t in 0..n {
            longitudinal.push(if id[t] == 0.0 {
                LongitudinalState::NoVehicle
            } else if dx[t] >= 0.0 {
                LongitudinalState::Front
            } else {
                LongitudinalState::Rear
            });

            // Overwrite cascade: the later rules take precedence, so any
            // untrusted or degenerate line geometry ends at Unknown.
            let mut state = LateralState::Unknown;
            if right[t] > 0.0 {
                state = LateralState::Right;
            }
            if left[t] < 0.0 {
                state = LateralState::Left;
            }
            if right[t] <= 0.0 && left[t] >= 0.0 {
                state = LateralState::Same;
            }
            if left_q[t] < self.config.min_line_quality
                || right_q[t] < self.config.min_line_quality
            {
                state = LateralState::Unknown;
            }
            if left[t] < right[t] {
                state = LateralState::Unknown;
            }
            if id[t] == 0.0 {
                state = LateralState::NoVehicle;
            }
            lateral.push(state);
        }

        table.set(
            &self.schema.target_channel(slot, "longitudinal_state"),
            longitudinal.iter().map(|s| s.value()).collect(),
        )?;
        table.set(
            &self.schema.target_channel(slot, "lateral_state"),
            lateral.iter().map(|s| s.value()).collect(),
        )?;

        Ok(TargetFrameStates {
            longitudinal,
            lateral,
        })
    }

    /// Tag the lead vehicle per frame.
    ///
    /// The lead is the closest forward target sharing the host lane; all
    /// other tracked vehicles are no-lead, empty slots no-vehicle. Writes a
    /// tag column per slot and returns the tags.
    pub fn select_lead(
        &self,
        table: &mut SignalTable,
        states: &[TargetFrameStates],
    ) -> Result<Vec<Vec<LeadVehicle>>, DetectionError> {
        let n = table.len();
        let slots = states.len();
        let mut dx = Vec::with_capacity(slots);
        let mut id = Vec::with_capacity(slots);
        for slot in 0..slots {
            dx.push(table.get(&self.schema.target_dx(slot))?.to_vec());
            id.push(table.get(&self.schema.target_id(slot))?.to_vec());
        }

        let mut min_dx = vec![f64::INFINITY; n];
        for slot in 0..slots {
            for t in 0..n {
                if states[slot].lateral[t] == LateralState::Same
                    && dx[slot][t] > 0.0
                    && dx[slot][t] < min_dx[t]
                {
                    min_dx[t] = dx[slot][t];
                }
            }
        }

        let mut tags = Vec::with_capacity(slots);
        for slot in 0..slots {
            let column: Vec<LeadVehicle> = (0..n)
                .map(|t| {
                    if id[slot][t] == 0.0 {
                        LeadVehicle::NoVehicle
                    } else if states[slot].lateral[t] == LateralState::Same
                        && dx[slot][t] > 0.0
                        && dx[slot][t] == min_dx[t]
                    {
                        LeadVehicle::Lead
                    } else {
                        LeadVehicle::NoLead
                    }
                })
                .collect();
            table.set(
                &self.schema.target_channel(slot, "lead_vehicle"),
                column.iter().map(|l| l.value()).collect(),
            )?;
            tags.push(column);
        }

        debug!("lead vehicle tagged over {} slots", slots);
        Ok(tags)
    }
}
