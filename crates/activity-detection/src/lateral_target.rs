//! Target lateral activity detection
//!
//! Classifies each tracked object's lateral maneuvers relative to the host
//! lane: lane-following, cut-in toward the host lane, or cut-out away from
//! it, on either side. The host's lane-line cubics are projected onto the
//! target's longitudinal offset; a maneuver candidate is a sign crossing of
//! the projected offset, confirmed by backward and forward searches for the
//! start and end of the lateral motion.

use tracing::debug;

use signal_table::{bounded_diff, rolling_max, rolling_min, BoundedDiff, SignalTable};

use crate::config::{ChannelSchema, DetectorConfig};
use crate::events::{Event, LateralActivityTarget};
use crate::DetectionError;

/// Projected lane-line geometry of one target slot.
pub struct LineProjection {
    /// Distance from the target to the host's left line, quality gated.
    pub left: Vec<f64>,
    /// Distance from the target to the host's right line, quality gated.
    pub right: Vec<f64>,
    /// Midpoint of the two projected lines.
    pub center: Vec<f64>,
    /// Left distance below its trailing 1 s maximum.
    pub left_down: Vec<f64>,
    /// Left distance above its trailing 1 s minimum.
    pub left_up: Vec<f64>,
    /// Right distance below its trailing 1 s maximum.
    pub right_down: Vec<f64>,
    /// Right distance above its trailing 1 s minimum.
    pub right_up: Vec<f64>,
}

/// Detector for per-target cut-in / cut-out segments.
pub struct TargetLateralDetector<'a> {
    config: &'a DetectorConfig,
    schema: &'a ChannelSchema,
}

impl<'a> TargetLateralDetector<'a> {
    /// Create a detector borrowing a validated configuration and schema.
    pub fn new(config: &'a DetectorConfig, schema: &'a ChannelSchema) -> Self {
        Self { config, schema }
    }

    /// Project the host lane lines onto a target and derive its settling
    /// signals. Writes the per-slot line columns back into the table.
    pub fn project_lines(
        &self,
        table: &mut SignalTable,
        slot: usize,
    ) -> Result<LineProjection, DetectionError> {
        let n = table.len();
        let dx = table.get(&self.schema.target_dx(slot))?.to_vec();
        let dy = table.get(&self.schema.target_dy(slot))?.to_vec();
        let l0 = table.get(&self.schema.left_line.constant)?.to_vec();
        let l1 = table.get(&self.schema.left_line.linear)?.to_vec();
        let l2 = table.get(&self.schema.left_line.quadratic)?.to_vec();
        let l3 = table.get(&self.schema.left_line.cubic)?.to_vec();
        let lq = table.get(&self.schema.left_line.quality)?.to_vec();
        let r0 = table.get(&self.schema.right_line.constant)?.to_vec();
        let r1 = table.get(&self.schema.right_line.linear)?.to_vec();
        let r2 = table.get(&self.schema.right_line.quadratic)?.to_vec();
        let r3 = table.get(&self.schema.right_line.cubic)?.to_vec();
        let rq = table.get(&self.schema.right_line.quality)?.to_vec();

        let project = |c0: f64, c1: f64, c2: f64, c3: f64, x: f64, y: f64| {
            c0 + c1 * x + c2 * x * x + c3 * x * x * x - y
        };
        let mut left = vec![f64::NAN; n];
        let mut right = vec![f64::NAN; n];
        for t in 0..n {
            if lq[t] >= self.config.min_line_quality {
                left[t] = project(l0[t], l1[t], l2[t], l3[t], dx[t], dy[t]);
            }
            if rq[t] >= self.config.min_line_quality {
                right[t] = project(r0[t], r1[t], r2[t], r3[t], dx[t], dy[t]);
            }
        }
        let center: Vec<f64> = (0..n).map(|t| (left[t] + right[t]) / 2.0).collect();

        // Targets drop in and out of sensor range, so the settling windows
        // only require a third of their samples to be trusted.
        let window = table.samples(1.0);
        let min_periods = window / 3;
        let sub = |a: &[f64], b: Vec<f64>| -> Vec<f64> {
            a.iter().zip(b).map(|(x, y)| x - y).collect()
        };
        let left_down = sub(&left, rolling_max(&left, window, min_periods));
        let left_up = sub(&left, rolling_min(&left, window, min_periods));
        let right_down = sub(&right, rolling_max(&right, window, min_periods));
        let right_up = sub(&right, rolling_min(&right, window, min_periods));

        table.set(&self.schema.target_channel(slot, "line_left"), left.clone())?;
        table.set(
            &self.schema.target_channel(slot, "line_right"),
            right.clone(),
        )?;
        table.set(
            &self.schema.target_channel(slot, "line_center"),
            center.clone(),
        )?;
        table.set(
            &self.schema.target_channel(slot, "line_left_down"),
            left_down.clone(),
        )?;
        table.set(
            &self.schema.target_channel(slot, "line_left_up"),
            left_up.clone(),
        )?;
        table.set(
            &self.schema.target_channel(slot, "line_right_down"),
            right_down.clone(),
        )?;
        table.set(
            &self.schema.target_channel(slot, "line_right_up"),
            right_up.clone(),
        )?;

        Ok(LineProjection {
            left,
            right,
            center,
            left_down,
            left_up,
            right_down,
            right_up,
        })
    }

    /// Detect the lateral activities of one target slot.
    pub fn detect(
        &self,
        table: &mut SignalTable,
        slot: usize,
    ) -> Result<Vec<Event<LateralActivityTarget>>, DetectionError> {
        let n = table.len();
        let lines = self.project_lines(table, slot)?;

        let horizon = table.samples(self.config.diff_max_valid_time_target);
        let valid_left: Vec<bool> = lines.left.iter().map(|v| v.is_finite()).collect();
        let valid_right: Vec<bool> = lines.right.iter().map(|v| v.is_finite()).collect();
        let diff_left = bounded_diff(&lines.left, &valid_left, horizon);
        let diff_right = bounded_diff(&lines.right, &valid_right, horizon);
        table.set(
            &self.schema.target_channel(slot, "line_left_diff"),
            diff_left.delta.clone(),
        )?;
        table.set(
            &self.schema.target_channel(slot, "line_right_diff"),
            diff_right.delta.clone(),
        )?;

        let neg_left: Vec<f64> = lines.left.iter().map(|v| -v).collect();
        let neg_right: Vec<f64> = lines.right.iter().map(|v| -v).collect();
        let bound = table.samples(self.config.max_time_lat_target);
        let time = table.time().to_vec();

        let mut events = vec![Event {
            index: 0,
            time: time[0],
            label: LateralActivityTarget::LaneFollowing,
        }];
        // Suppression counter, in samples: while positive, the committed
        // maneuver may not revert to lane-following.
        let mut hold: i64 = 0;

        for t in 1..n {
            hold -= 1;
            let eligible = lines.center[t].is_finite() && lines.right[t] < lines.left[t];
            let current = events[events.len() - 1].label;

            if eligible
                && !current.is_left()
                && sign_crossed(&diff_left, t, 1.0)
            {
                self.commit(
                    t,
                    LateralActivityTarget::LeftCutOut,
                    &lines.left,
                    &lines.left_down,
                    &lines,
                    bound,
                    &time,
                    &mut events,
                    &mut hold,
                );
            } else if eligible
                && !current.is_left()
                && sign_crossed(&diff_right, t, 1.0)
            {
                self.commit(
                    t,
                    LateralActivityTarget::LeftCutIn,
                    &lines.right,
                    &lines.right_down,
                    &lines,
                    bound,
                    &time,
                    &mut events,
                    &mut hold,
                );
            } else if eligible
                && !current.is_right()
                && sign_crossed(&diff_left, t, -1.0)
            {
                self.commit(
                    t,
                    LateralActivityTarget::RightCutIn,
                    &neg_left,
                    &lines.left_up,
                    &lines,
                    bound,
                    &time,
                    &mut events,
                    &mut hold,
                );
            } else if eligible
                && !current.is_right()
                && sign_crossed(&diff_right, t, -1.0)
            {
                self.commit(
                    t,
                    LateralActivityTarget::RightCutOut,
                    &neg_right,
                    &lines.right_up,
                    &lines,
                    bound,
                    &time,
                    &mut events,
                    &mut hold,
                );
            } else if current != LateralActivityTarget::LaneFollowing && hold <= 0 {
                events.push(Event {
                    index: t,
                    time: time[t],
                    label: LateralActivityTarget::LaneFollowing,
                });
            }
        }

        debug!("{} lateral events detected for target {}", events.len(), slot);
        Ok(events)
    }

    /// Confirm a maneuver candidate and record its event.
    ///
    /// The candidate is dropped silently when either the start or the end
    /// search rejects it. A start that coincides with the previous event
    /// supersedes that event (the maneuver was already ongoing).
    #[allow(clippy::too_many_arguments)]
    fn commit(
        &self,
        t: usize,
        label: LateralActivityTarget,
        distance: &[f64],
        difference: &[f64],
        lines: &LineProjection,
        bound: usize,
        time: &[f64],
        events: &mut Vec<Event<LateralActivityTarget>>,
        hold: &mut i64,
    ) {
        let from_y = self.config.factor_goal_y_target * (lines.left[t] - lines.right[t]);
        let goal_y = -from_y;
        let last = events[events.len() - 1].index;

        let Some(begin) = self.start_of_maneuver(t, from_y, goal_y, distance, difference, last, bound)
        else {
            return;
        };
        let Some(end) = self.end_of_maneuver(t, goal_y, distance, bound) else {
            return;
        };

        if begin == last {
            events.pop();
        }
        events.push(Event {
            index: begin,
            time: time[begin],
            label,
        });
        *hold = end as i64 - t as i64;
    }

    /// Backward search for the start of a maneuver.
    ///
    /// Walks back from the candidate sample, bounded by the search horizon
    /// and the previous event. The start is the most recent sample where the
    /// distance exceeds the departure level `from_y` and holds stable for
    /// one sample. A distance already below half the goal level rejects the
    /// candidate outright. When the difference signal bottoms out at an
    /// exact zero inside the window, the start snaps to the latest zero.
    /// Exhausting the window down to the previous event means the maneuver
    /// was already ongoing at that event.
    fn start_of_maneuver(
        &self,
        t: usize,
        from_y: f64,
        goal_y: f64,
        distance: &[f64],
        difference: &[f64],
        last_event: usize,
        bound: usize,
    ) -> Option<usize> {
        let lower = t.saturating_sub(bound).max(last_event);
        let mut begin = lower;
        let mut found = false;
        for j in (lower..=t).rev() {
            begin = j;
            let d = distance[j];
            if j != t && d < goal_y / 2.0 {
                return None;
            }
            if d > from_y {
                if j == 0 {
                    found = true;
                } else if (d - distance[j - 1]).abs() < self.config.lane_change_threshold {
                    found = true;
                }
                break;
            }
        }
        if found {
            if let Some(zero) = (begin..=t).rev().find(|&k| difference[k] == 0.0) {
                return Some(zero);
            }
            return Some(begin);
        }
        if begin == last_event {
            return Some(begin);
        }
        None
    }

    /// Forward search for the end of a maneuver.
    ///
    /// Confirms the first sample where the distance drops below the goal
    /// level and holds stable for one sample. A distance that turns positive
    /// again before reaching the goal rejects the whole candidate.
    fn end_of_maneuver(
        &self,
        t: usize,
        goal_y: f64,
        distance: &[f64],
        bound: usize,
    ) -> Option<usize> {
        let upper = (t + bound).min(distance.len() - 1);
        for j in t..=upper {
            let d = distance[j];
            if d > 0.0 {
                return None;
            }
            if d < goal_y {
                if j > 0 && (d - distance[j - 1]).abs() < self.config.lane_change_threshold {
                    return Some(j);
                }
                break;
            }
        }
        None
    }
}

/// Sign crossing of a projected line offset between the last trustworthy
/// sample and the current one. `orientation` +1 detects a crossing from
/// positive to negative, -1 the mirrored crossing.
fn sign_crossed(diff: &BoundedDiff, t: usize, orientation: f64) -> bool {
    let current = orientation * diff.current[t];
    let previous = orientation * diff.previous[t];
    current.is_finite() && previous.is_finite() && current < 0.0 && previous >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = 200;

    /// Table with trusted straight lane lines and one target slot whose
    /// lateral offset follows `dy`.
    fn target_table(dy: Vec<f64>) -> SignalTable {
        let time: Vec<f64> = (0..N).map(|i| i as f64 * 0.1).collect();
        let mut table = SignalTable::new(time, 10.0).unwrap();
        table.set("line_l_c0", vec![1.75; N]).unwrap();
        table.set("line_l_c1", vec![0.0; N]).unwrap();
        table.set("line_l_c2", vec![0.0; N]).unwrap();
        table.set("line_l_c3", vec![0.0; N]).unwrap();
        table.set("line_l_quality", vec![5.0; N]).unwrap();
        table.set("line_r_c0", vec![-1.75; N]).unwrap();
        table.set("line_r_c1", vec![0.0; N]).unwrap();
        table.set("line_r_c2", vec![0.0; N]).unwrap();
        table.set("line_r_c3", vec![0.0; N]).unwrap();
        table.set("line_r_quality", vec![5.0; N]).unwrap();
        table.set("target_0_dx", vec![20.0; N]).unwrap();
        table.set("target_0_dy", dy).unwrap();
        table
    }

    fn detect(table: &mut SignalTable) -> Vec<Event<LateralActivityTarget>> {
        let config = DetectorConfig::default();
        let schema = ChannelSchema::default();
        TargetLateralDetector::new(&config, &schema)
            .detect(table, 0)
            .unwrap()
    }

    /// Ramp from `a` to `b` between t = 5 s and t = 8 s.
    fn dy_ramp(a: f64, b: f64) -> Vec<f64> {
        (0..N)
            .map(|i| {
                let t = i as f64 * 0.1;
                if t <= 5.0 {
                    a
                } else if t <= 8.0 {
                    a + (b - a) / 3.0 * (t - 5.0)
                } else {
                    b
                }
            })
            .collect()
    }

    #[test]
    fn test_cut_in_from_right_lane() {
        // Target one lane to the right merges into the host lane, crossing
        // the projected right line at t = 6.5 s.
        let mut table = target_table(dy_ramp(-3.5, 0.0));
        let events = detect(&mut table);

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].label, LateralActivityTarget::LaneFollowing);
        assert_eq!(events[0].index, 0);
        // Start where the approach toward the line begins.
        assert_eq!(events[1].label, LateralActivityTarget::LeftCutIn);
        assert_eq!(events[1].index, 57);
        // Lane-following again once the suppression window is spent.
        assert_eq!(events[2].label, LateralActivityTarget::LaneFollowing);
        assert_eq!(events[2].index, 73);
    }

    #[test]
    fn test_cut_out_to_right_lane() {
        // Target leaves the host lane to the right, crossing the projected
        // right line outward.
        let mut table = target_table(dy_ramp(0.0, -3.5));
        let events = detect(&mut table);

        assert_eq!(events.len(), 3);
        assert_eq!(events[1].label, LateralActivityTarget::RightCutOut);
        assert_eq!(events[1].index, 57);
        assert_eq!(events[2].label, LateralActivityTarget::LaneFollowing);
        assert_eq!(events[2].index, 73);
    }

    #[test]
    fn test_adjacent_lane_following_produces_no_maneuver() {
        let mut table = target_table(vec![-3.5; N]);
        let events = detect(&mut table);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label, LateralActivityTarget::LaneFollowing);
    }

    #[test]
    fn test_ongoing_maneuver_supersedes_initial_event() {
        // The recording starts with the target already drifting across the
        // host's right line; the crossing is reached at t = 5 s.
        let time: Vec<f64> = (0..N).map(|i| i as f64 * 0.1).collect();
        let mut table = SignalTable::new(time.clone(), 10.0).unwrap();
        let right: Vec<f64> = time.iter().map(|t| 0.5 - 0.1 * t).collect();
        let left: Vec<f64> = right.iter().map(|v| v + 3.5).collect();
        table.set("line_l_c0", left).unwrap();
        table.set("line_l_c1", vec![0.0; N]).unwrap();
        table.set("line_l_c2", vec![0.0; N]).unwrap();
        table.set("line_l_c3", vec![0.0; N]).unwrap();
        table.set("line_l_quality", vec![5.0; N]).unwrap();
        table.set("line_r_c0", right).unwrap();
        table.set("line_r_c1", vec![0.0; N]).unwrap();
        table.set("line_r_c2", vec![0.0; N]).unwrap();
        table.set("line_r_c3", vec![0.0; N]).unwrap();
        table.set("line_r_quality", vec![5.0; N]).unwrap();
        table.set("target_0_dx", vec![20.0; N]).unwrap();
        table.set("target_0_dy", vec![0.0; N]).unwrap();

        let events = detect(&mut table);
        // The initial lane-following event is superseded: the maneuver was
        // already ongoing at the first sample.
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].label, LateralActivityTarget::LeftCutIn);
        assert_eq!(events[0].index, 0);
        assert_eq!(events[1].label, LateralActivityTarget::LaneFollowing);
        assert_eq!(events[1].index, 138);
    }

    #[test]
    fn test_untrusted_lines_produce_no_maneuver() {
        let mut table = target_table(dy_ramp(-3.5, 0.0));
        table.set("line_l_quality", vec![0.0; N]).unwrap();
        table.set("line_r_quality", vec![0.0; N]).unwrap();
        let events = detect(&mut table);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let mut table = target_table(dy_ramp(-3.5, 0.0));
        let first = detect(&mut table);
        let second = detect(&mut table);
        assert_eq!(first, second);
    }
}
