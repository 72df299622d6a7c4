//! Host lateral activity detection
//!
//! Splits the host trajectory into lane-following, left and right lane-change
//! segments. The trigger is the bounded-horizon jump of both lane-line
//! offsets in the same direction (the line tracker re-anchors one lane over
//! when the host crosses a line); the start search then walks back to the
//! last laterally settled sample before the maneuver.

use tracing::debug;

use signal_table::{bounded_diff, rolling_max, rolling_min, SignalTable};

use crate::config::{ChannelSchema, DetectorConfig};
use crate::events::{Event, LateralActivityHost};
use crate::DetectionError;

/// Detector for host lane-change segments.
pub struct HostLateralDetector<'a> {
    config: &'a DetectorConfig,
    schema: &'a ChannelSchema,
}

impl<'a> HostLateralDetector<'a> {
    /// Create a detector borrowing a validated configuration and schema.
    pub fn new(config: &'a DetectorConfig, schema: &'a ChannelSchema) -> Self {
        Self { config, schema }
    }

    /// Detect the lateral activities of the host vehicle.
    ///
    /// Writes the gated line offsets, their up/down signals and the
    /// bounded-horizon differences back into the table as diagnostics and
    /// returns the ordered event list, starting with lane-following at the
    /// first sample.
    pub fn detect(
        &self,
        table: &mut SignalTable,
    ) -> Result<Vec<Event<LateralActivityHost>>, DetectionError> {
        let n = table.len();
        let left_y = table.get(&self.schema.left_line.constant)?.to_vec();
        let right_y = table.get(&self.schema.right_line.constant)?.to_vec();
        let left_q = table.get(&self.schema.left_line.quality)?.to_vec();
        let right_q = table.get(&self.schema.right_line.quality)?.to_vec();

        let valid_left: Vec<bool> = left_q
            .iter()
            .map(|q| *q >= self.config.min_line_quality)
            .collect();
        let valid_right: Vec<bool> = right_q
            .iter()
            .map(|q| *q >= self.config.min_line_quality)
            .collect();
        let gated = |y: &[f64], valid: &[bool]| -> Vec<f64> {
            y.iter()
                .zip(valid)
                .map(|(v, ok)| if *ok { *v } else { f64::NAN })
                .collect()
        };
        let left_gated = gated(&left_y, &valid_left);
        let right_gated = gated(&right_y, &valid_right);
        let center: Vec<f64> = (0..n).map(|t| (left_y[t] + right_y[t]) / 2.0).collect();
        let center_gated: Vec<f64> = (0..n)
            .map(|t| {
                if valid_left[t] && valid_right[t] {
                    center[t]
                } else {
                    f64::NAN
                }
            })
            .collect();

        // Settling signals: distance below the trailing 1 s maximum (down)
        // and above the trailing 1 s minimum (up). Any low-quality sample
        // inside the window invalidates the signal.
        let window = table.samples(1.0) + 1;
        let sub = |a: &[f64], b: Vec<f64>| -> Vec<f64> {
            a.iter().zip(b).map(|(x, y)| x - y).collect()
        };
        let down_left = sub(&left_gated, rolling_max(&left_gated, window, window));
        let down_right = sub(&right_gated, rolling_max(&right_gated, window, window));
        let up_left = sub(&left_gated, rolling_min(&left_gated, window, window));
        let up_right = sub(&right_gated, rolling_min(&right_gated, window, window));

        let horizon = table.samples(self.config.diff_max_valid_time_host);
        let diff_left = bounded_diff(&left_y, &valid_left, horizon);
        let diff_right = bounded_diff(&right_y, &valid_right, horizon);

        table.set("line_center", center)?;
        table.set("line_center_valid", center_gated.clone())?;
        table.set("line_left_valid", left_gated)?;
        table.set("line_right_valid", right_gated)?;
        table.set("line_left_down", down_left.clone())?;
        table.set("line_right_down", down_right.clone())?;
        table.set("line_left_up", up_left.clone())?;
        table.set("line_right_up", up_right.clone())?;
        let left_diff_name = format!("{}_diff", self.schema.left_line.constant);
        let right_diff_name = format!("{}_diff", self.schema.right_line.constant);
        table.set(&left_diff_name, diff_left.delta.clone())?;
        table.set(&right_diff_name, diff_right.delta.clone())?;

        // Guard signals for the backward start search, oriented so that a
        // value below the confidence threshold means "settled".
        let climb_left: Vec<f64> = down_left.iter().map(|v| -v).collect();
        let climb_right: Vec<f64> = down_right.iter().map(|v| -v).collect();
        let neg_right: Vec<f64> = right_y.iter().map(|v| -v).collect();

        let lookback = table.samples(self.config.max_time_host_lane_change);
        let magic = table.samples(self.config.lane_change_magic_time);
        let threshold = self.config.lane_change_threshold;
        let time = table.time();

        let mut events = vec![Event {
            index: 0,
            time: time[0],
            label: LateralActivityHost::LaneFollowing,
        }];
        let mut current = LateralActivityHost::LaneFollowing;

        for t in 0..n {
            let potential_left =
                diff_left.delta[t] > threshold && diff_right.delta[t] > threshold;
            let potential_right =
                diff_left.delta[t] < -threshold && diff_right.delta[t] < -threshold;

            if current != LateralActivityHost::LeftLaneChange && potential_left {
                let last = events.last().map(|e| e.index).unwrap_or(0);
                if let Some(begin) = self.start_of_lane_change(
                    t,
                    last,
                    &left_y,
                    (&climb_left, &climb_right),
                    lookback,
                    magic,
                ) {
                    current = LateralActivityHost::LeftLaneChange;
                    events.push(Event {
                        index: begin,
                        time: time[begin],
                        label: current,
                    });
                }
            } else if current != LateralActivityHost::RightLaneChange && potential_right {
                let last = events.last().map(|e| e.index).unwrap_or(0);
                if let Some(begin) = self.start_of_lane_change(
                    t,
                    last,
                    &neg_right,
                    (&up_left, &up_right),
                    lookback,
                    magic,
                ) {
                    current = LateralActivityHost::RightLaneChange;
                    events.push(Event {
                        index: begin,
                        time: time[begin],
                        label: current,
                    });
                }
            } else if current != LateralActivityHost::LaneFollowing && center_gated[t].is_finite()
            {
                let settled = up_right[t] < self.config.lane_conf_threshold
                    || up_left[t] < self.config.lane_conf_threshold;
                let not_diverging = down_left[t] > -self.config.lane_conf_threshold
                    || down_right[t] > -self.config.lane_conf_threshold;
                if settled && not_diverging {
                    current = LateralActivityHost::LaneFollowing;
                    events.push(Event {
                        index: t,
                        time: time[t],
                        label: current,
                    });
                }
            }
        }

        debug!("{} host lateral events detected", events.len());
        Ok(events)
    }

    /// Walk back from the trigger sample to the start of the lane change.
    ///
    /// The anchor is the most recent sample at which either side's guard
    /// signal reports the host as laterally settled; the start is then the
    /// maximum of the crossed line's distance within the configured lookback
    /// window before the anchor. Rejected when no settled sample exists,
    /// when the start would not follow the previous event, or when the
    /// distance takes a larger-than-threshold step right after the start.
    fn start_of_lane_change(
        &self,
        t: usize,
        last_event: usize,
        distance: &[f64],
        guards: (&[f64], &[f64]),
        lookback: usize,
        magic: usize,
    ) -> Option<usize> {
        let lower = t.saturating_sub(lookback).max(last_event);
        let anchor = (lower..=t).rev().find(|&j| {
            guards.0[j] < self.config.lane_conf_threshold
                || guards.1[j] < self.config.lane_conf_threshold
        })?;

        let floor = anchor.saturating_sub(magic).max(last_event + 1);
        if floor > anchor {
            return None;
        }
        let mut begin: Option<usize> = None;
        for j in floor..=anchor {
            if !distance[j].is_finite() {
                continue;
            }
            begin = match begin {
                Some(b) if distance[j] <= distance[b] => Some(b),
                _ => Some(j),
            };
        }
        let begin = begin?;

        if begin + 1 >= distance.len() {
            return None;
        }
        if (distance[begin] - distance[begin + 1]).abs() > self.config.lane_change_threshold {
            return None;
        }
        Some(begin)
    }
}
