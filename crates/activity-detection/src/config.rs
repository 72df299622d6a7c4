//! Detector configuration and channel schema

use serde::{Deserialize, Serialize};

use crate::DetectionError;

/// Column names of one lane-line polynomial and its quality score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineChannels {
    /// Constant coefficient (lateral offset at the host, meters).
    pub constant: String,
    /// Linear coefficient.
    pub linear: String,
    /// Quadratic coefficient.
    pub quadratic: String,
    /// Cubic coefficient.
    pub cubic: String,
    /// Per-sample quality score of the fit.
    pub quality: String,
}

impl LineChannels {
    fn with_prefix(prefix: &str) -> Self {
        Self {
            constant: format!("{prefix}_c0"),
            linear: format!("{prefix}_c1"),
            quadratic: format!("{prefix}_c2"),
            cubic: format!("{prefix}_c3"),
            quality: format!("{prefix}_quality"),
        }
    }
}

/// Names of the input channels, plus helpers deriving the per-slot channel
/// names. Keeps column naming configurable without scattering string
/// formatting through the detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSchema {
    /// Host longitudinal speed channel.
    pub host_speed: String,
    /// Left lane-line channels.
    pub left_line: LineChannels,
    /// Right lane-line channels.
    pub right_line: LineChannels,
    /// Prefix of every per-slot target channel.
    pub target_prefix: String,
}

impl Default for ChannelSchema {
    fn default() -> Self {
        Self {
            host_speed: "host_vx".to_owned(),
            left_line: LineChannels::with_prefix("line_l"),
            right_line: LineChannels::with_prefix("line_r"),
            target_prefix: "target".to_owned(),
        }
    }
}

impl ChannelSchema {
    /// Name of an arbitrary per-slot channel.
    pub fn target_channel(&self, slot: usize, field: &str) -> String {
        format!("{}_{slot}_{field}", self.target_prefix)
    }

    /// Relative longitudinal offset of a target slot.
    pub fn target_dx(&self, slot: usize) -> String {
        self.target_channel(slot, "dx")
    }

    /// Relative lateral offset of a target slot.
    pub fn target_dy(&self, slot: usize) -> String {
        self.target_channel(slot, "dy")
    }

    /// Relative longitudinal speed of a target slot.
    pub fn target_vx(&self, slot: usize) -> String {
        self.target_channel(slot, "vx")
    }

    /// Relative longitudinal acceleration of a target slot.
    pub fn target_ax(&self, slot: usize) -> String {
        self.target_channel(slot, "ax")
    }

    /// Track id of a target slot (0 marks an empty slot).
    pub fn target_id(&self, slot: usize) -> String {
        self.target_channel(slot, "id")
    }
}

/// Fixed calibration of all detectors. Values are not learned; they are the
/// tuned constants the state machines were designed around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Look-ahead window for the speed difference signals (s).
    pub time_speed_difference: f64,
    /// Minimum windowed speed difference to consider a longitudinal start (m/s).
    pub min_speed_difference: f64,
    /// Minimum speed for an acceleration to count as an activity (m/s).
    pub min_activity_speed: f64,
    /// Speed-difference level below which a longitudinal activity ends (m/s).
    pub diffspeed_start_act: f64,
    /// Minimum total speed change to confirm a longitudinal event (m/s).
    pub min_speed_inc: f64,
    /// Cruising segments shorter than this get merged away (s).
    pub min_cruising_time: f64,
    /// Bound on the forward confirmation scan of a longitudinal event (s).
    pub max_time_activity: f64,
    /// Bound on the backward start search of a host lane change (s).
    pub max_time_host_lane_change: f64,
    /// Lane-line quality below which the line is treated as absent.
    pub min_line_quality: f64,
    /// Lateral jump that flags a potential lane change (m).
    pub lane_change_threshold: f64,
    /// Extra lookback applied to the host start search (s). No explanation
    /// survives for this offset; treat as calibration and do not retune.
    pub lane_change_magic_time: f64,
    /// Level of the up/down signals separating settled from moving (m).
    pub lane_conf_threshold: f64,
    /// Bound on the start/end searches of a target lateral maneuver (s).
    pub max_time_lat_target: f64,
    /// Scale between lane width and the start/goal lateral distance of a
    /// target maneuver. Calibration constant, do not retune.
    pub factor_goal_y_target: f64,
    /// Number of target slots in the table.
    pub n_targets: usize,
    /// Horizon of the host lane-line differencing (s).
    pub diff_max_valid_time_host: f64,
    /// Horizon of the target lane-line differencing (s).
    pub diff_max_valid_time_target: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            time_speed_difference: 1.0,
            min_speed_difference: 0.5 / 3.6,
            min_activity_speed: 0.25 / 3.6,
            diffspeed_start_act: 0.25 / 3.6,
            min_speed_inc: 4.0 / 3.6,
            min_cruising_time: 4.0,
            max_time_activity: 300.0,
            max_time_host_lane_change: 10.0,
            min_line_quality: 3.0,
            lane_change_threshold: 1.0,
            lane_change_magic_time: 1.0,
            lane_conf_threshold: 0.25,
            max_time_lat_target: 10.0,
            factor_goal_y_target: 0.25,
            n_targets: 8,
            diff_max_valid_time_host: 7.0,
            diff_max_valid_time_target: 2.0,
        }
    }
}

impl DetectorConfig {
    /// Reject configurations outside the documented ranges.
    pub fn validate(&self) -> Result<(), DetectionError> {
        let positive = [
            ("time_speed_difference", self.time_speed_difference),
            ("min_cruising_time", self.min_cruising_time),
            ("max_time_activity", self.max_time_activity),
            ("max_time_host_lane_change", self.max_time_host_lane_change),
            ("lane_change_threshold", self.lane_change_threshold),
            ("lane_conf_threshold", self.lane_conf_threshold),
            ("max_time_lat_target", self.max_time_lat_target),
            ("factor_goal_y_target", self.factor_goal_y_target),
            ("diff_max_valid_time_host", self.diff_max_valid_time_host),
            (
                "diff_max_valid_time_target",
                self.diff_max_valid_time_target,
            ),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(DetectionError::InvalidConfig { name, value });
            }
        }
        let non_negative = [
            ("min_speed_difference", self.min_speed_difference),
            ("min_activity_speed", self.min_activity_speed),
            ("diffspeed_start_act", self.diffspeed_start_act),
            ("min_speed_inc", self.min_speed_inc),
            ("min_line_quality", self.min_line_quality),
            ("lane_change_magic_time", self.lane_change_magic_time),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(DetectionError::InvalidConfig { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_window() {
        let config = DetectorConfig {
            time_speed_difference: 0.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            DetectionError::InvalidConfig {
                name: "time_speed_difference",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let config = DetectorConfig {
            min_speed_inc: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_channel_names() {
        let schema = ChannelSchema::default();
        assert_eq!(schema.target_dx(0), "target_0_dx");
        assert_eq!(schema.target_id(7), "target_7_id");
        assert_eq!(schema.left_line.constant, "line_l_c0");
        assert_eq!(schema.right_line.quality, "line_r_quality");
    }
}
