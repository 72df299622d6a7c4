//! Longitudinal activity detection
//!
//! Splits a speed signal into cruising, accelerating and decelerating
//! segments. The same detector runs for the host speed and, re-parameterized
//! on the relative speed channel, for every target slot.

use tracing::debug;

use signal_table::{rolling_max, rolling_min, shift, SignalTable};

use crate::config::DetectorConfig;
use crate::events::{Event, LongitudinalActivity};
use crate::DetectionError;

/// Detector for cruising / accelerating / decelerating segments.
pub struct LongitudinalDetector<'a> {
    config: &'a DetectorConfig,
}

impl<'a> LongitudinalDetector<'a> {
    /// Create a detector borrowing a validated configuration.
    pub fn new(config: &'a DetectorConfig) -> Self {
        Self { config }
    }

    /// Detect the longitudinal activities of the given speed channel.
    ///
    /// Writes the derived `_gain`/`_loss` diagnostic columns back into the
    /// table and returns the ordered event list. The first event is always
    /// cruising at the first sample.
    pub fn detect(
        &self,
        table: &mut SignalTable,
        channel: &str,
    ) -> Result<Vec<Event<LongitudinalActivity>>, DetectionError> {
        let n = table.len();
        let look = table.samples(self.config.time_speed_difference);
        let speed = table.get(channel)?.to_vec();

        // Speed change over the next look-ahead window, measured against the
        // window extremum so a gain only registers once the signal actually
        // departs from its minimum (and vice versa for a loss).
        let led = shift(&speed, -(look as isize));
        let win_min = rolling_min(&led, look + 1, look + 1);
        let win_max = rolling_max(&led, look + 1, look + 1);
        let gain: Vec<f64> = (0..n).map(|t| led[t] - win_min[t]).collect();
        let loss: Vec<f64> = (0..n).map(|t| led[t] - win_max[t]).collect();
        let gain_start: Vec<f64> = (0..n)
            .map(|t| if speed[t] == win_min[t] { gain[t] } else { 0.0 })
            .collect();
        let loss_start: Vec<f64> = (0..n)
            .map(|t| if speed[t] == win_max[t] { loss[t] } else { 0.0 })
            .collect();

        table.set(&format!("{channel}_gain"), gain.clone())?;
        table.set(&format!("{channel}_gain_start"), gain_start.clone())?;
        table.set(&format!("{channel}_loss"), loss.clone())?;
        table.set(&format!("{channel}_loss_start"), loss_start.clone())?;

        let fall: Vec<f64> = loss.iter().map(|v| -v).collect();
        let confirm_bound = table.samples(self.config.max_time_activity);
        let time = table.time();

        let mut events = vec![Event {
            index: 0,
            time: time[0],
            label: LongitudinalActivity::Cruising,
        }];
        let mut current = LongitudinalActivity::Cruising;
        let mut end_time = f64::INFINITY;

        for t in 0..n {
            if current != LongitudinalActivity::Accelerating
                && gain_start[t] >= self.config.min_speed_difference
                && speed[t] >= self.config.min_activity_speed
            {
                if let Some(end) = self.end_of_activity(t, &gain, &speed, confirm_bound) {
                    current = LongitudinalActivity::Accelerating;
                    events.push(Event {
                        index: t,
                        time: time[t],
                        label: current,
                    });
                    end_time = time[end];
                }
            } else if current != LongitudinalActivity::Decelerating
                && loss_start[t] <= -self.config.min_speed_difference
            {
                if let Some(end) = self.end_of_activity(t, &fall, &speed, confirm_bound) {
                    current = LongitudinalActivity::Decelerating;
                    events.push(Event {
                        index: t,
                        time: time[t],
                        label: current,
                    });
                    end_time = time[end];
                }
            } else if current != LongitudinalActivity::Cruising && time[t] >= end_time {
                current = LongitudinalActivity::Cruising;
                events.push(Event {
                    index: t,
                    time: time[t],
                    label: current,
                });
            }
        }

        let events = self.merge_short_cruising(events, &speed, time);
        debug!(
            "{} longitudinal events detected on channel {}",
            events.len(),
            channel
        );
        Ok(events)
    }

    /// Find where a potential activity starting at `t` levels off.
    ///
    /// Scans the signed speed-difference series forward, bounded by the
    /// confirmation horizon, for the first sample below the end level; the
    /// last sample of the data is the fallback end. Returns `None` when the
    /// total speed change up to that end is too small to count as an event.
    fn end_of_activity(
        &self,
        t: usize,
        difference: &[f64],
        speed: &[f64],
        bound: usize,
    ) -> Option<usize> {
        let n = speed.len();
        let limit = (t + bound).min(n - 1);
        let end = (t..=limit)
            .find(|&j| difference[j] < self.config.diffspeed_start_act)
            .unwrap_or(n - 1);
        if (speed[end] - speed[t]).abs() < self.config.min_speed_inc {
            None
        } else {
            Some(end)
        }
    }

    /// Merge away cruising segments shorter than the configured minimum.
    ///
    /// A short cruise between two events of equal label collapses into the
    /// earlier event; between differing labels the pair is replaced by a
    /// single event at the speed extremum of the bracket (last minimum before
    /// an acceleration, last maximum before a deceleration). The first and
    /// last events are never touched.
    fn merge_short_cruising(
        &self,
        events: Vec<Event<LongitudinalActivity>>,
        speed: &[f64],
        time: &[f64],
    ) -> Vec<Event<LongitudinalActivity>> {
        let mut merged = Vec::with_capacity(events.len());
        let mut i = 0;
        while i < events.len() {
            if i == 0
                || i == events.len() - 1
                || events[i].label != LongitudinalActivity::Cruising
                || events[i + 1].time - events[i].time >= self.config.min_cruising_time
            {
                merged.push(events[i]);
                i += 1;
            } else if events[i - 1].label == events[i + 1].label {
                i += 2;
            } else {
                let label = events[i + 1].label;
                let lo = events[i].index;
                let hi = events[i + 1].index;
                let mut best = lo;
                for j in lo..=hi {
                    let better = if label == LongitudinalActivity::Accelerating {
                        speed[j] <= speed[best]
                    } else {
                        speed[j] >= speed[best]
                    };
                    if better {
                        best = j;
                    }
                }
                merged.push(Event {
                    index: best,
                    time: time[best],
                    label,
                });
                i += 2;
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::apply_events;
    use proptest::prelude::*;

    fn table_with_speed(speed: Vec<f64>) -> SignalTable {
        let time: Vec<f64> = (0..speed.len()).map(|i| i as f64 * 0.1).collect();
        let mut table = SignalTable::new(time, 10.0).unwrap();
        table.set("host_vx", speed).unwrap();
        table
    }

    fn event(index: usize, label: LongitudinalActivity) -> Event<LongitudinalActivity> {
        Event {
            index,
            time: index as f64 * 0.1,
            label,
        }
    }

    #[test]
    fn test_ramp_then_plateau_yields_one_acceleration() {
        // 0 to 30 m/s over 5 s, then 10 s flat.
        let speed: Vec<f64> = (0..150).map(|i| (0.6 * i as f64).min(30.0)).collect();
        let mut table = table_with_speed(speed);
        let config = DetectorConfig::default();
        let events = LongitudinalDetector::new(&config)
            .detect(&mut table, "host_vx")
            .unwrap();

        let accelerating: Vec<_> = events
            .iter()
            .filter(|e| e.label == LongitudinalActivity::Accelerating)
            .collect();
        let decelerating: Vec<_> = events
            .iter()
            .filter(|e| e.label == LongitudinalActivity::Decelerating)
            .collect();
        assert_eq!(accelerating.len(), 1);
        assert!(decelerating.is_empty());
        assert_eq!(events[0].label, LongitudinalActivity::Cruising);
        assert_eq!(events[0].index, 0);
        // Acceleration recognized within the look-ahead window of the start.
        assert!(accelerating[0].time <= 1.0 + 1e-9);
        // Cruising resumes when the speed stabilizes at t = 5 s.
        assert_eq!(events.last().unwrap().label, LongitudinalActivity::Cruising);
        assert!((events.last().unwrap().time - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_braking_yields_one_deceleration() {
        // 30 m/s flat for 5 s, down to 0 over 5 s, then flat.
        let speed: Vec<f64> = (0..150)
            .map(|i| {
                let t = i as f64 * 0.1;
                (30.0 - 6.0 * (t - 5.0).max(0.0)).max(0.0)
            })
            .collect();
        let mut table = table_with_speed(speed);
        let config = DetectorConfig::default();
        let events = LongitudinalDetector::new(&config)
            .detect(&mut table, "host_vx")
            .unwrap();

        let decelerating: Vec<_> = events
            .iter()
            .filter(|e| e.label == LongitudinalActivity::Decelerating)
            .collect();
        assert_eq!(decelerating.len(), 1);
        assert!(decelerating[0].time < 5.0);
        assert!(!events
            .iter()
            .any(|e| e.label == LongitudinalActivity::Accelerating));
        assert!((events.last().unwrap().time - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_cruise_between_equal_labels_collapses() {
        let speed: Vec<f64> = (0..300).map(|i| i as f64 * 0.1).collect();
        let table = table_with_speed(speed.clone());
        let config = DetectorConfig::default();
        let detector = LongitudinalDetector::new(&config);
        let events = vec![
            event(0, LongitudinalActivity::Cruising),
            event(20, LongitudinalActivity::Accelerating),
            event(30, LongitudinalActivity::Cruising),
            event(50, LongitudinalActivity::Accelerating),
            event(200, LongitudinalActivity::Cruising),
        ];
        let merged = detector.merge_short_cruising(events, &speed, table.time());
        assert_eq!(
            merged,
            vec![
                event(0, LongitudinalActivity::Cruising),
                event(20, LongitudinalActivity::Accelerating),
                event(200, LongitudinalActivity::Cruising),
            ]
        );
    }

    #[test]
    fn test_short_cruise_between_differing_labels_moves_to_extremum() {
        // Speed peaks at sample 42, inside the bracket [30, 50].
        let speed: Vec<f64> = (0..300)
            .map(|i| {
                if i <= 42 {
                    i as f64 * 0.1
                } else {
                    4.2 - (i - 42) as f64 * 0.1
                }
            })
            .collect();
        let table = table_with_speed(speed.clone());
        let config = DetectorConfig::default();
        let detector = LongitudinalDetector::new(&config);
        let events = vec![
            event(0, LongitudinalActivity::Cruising),
            event(20, LongitudinalActivity::Accelerating),
            event(30, LongitudinalActivity::Cruising),
            event(50, LongitudinalActivity::Decelerating),
            event(200, LongitudinalActivity::Cruising),
        ];
        let merged = detector.merge_short_cruising(events, &speed, table.time());
        assert_eq!(
            merged,
            vec![
                event(0, LongitudinalActivity::Cruising),
                event(20, LongitudinalActivity::Accelerating),
                event(42, LongitudinalActivity::Decelerating),
                event(200, LongitudinalActivity::Cruising),
            ]
        );
    }

    #[test]
    fn test_first_and_last_events_survive_merging() {
        let speed: Vec<f64> = vec![1.0; 300];
        let table = table_with_speed(speed.clone());
        let config = DetectorConfig::default();
        let detector = LongitudinalDetector::new(&config);
        // Both cruises are short, but sit at the list boundaries.
        let events = vec![
            event(0, LongitudinalActivity::Cruising),
            event(10, LongitudinalActivity::Accelerating),
            event(15, LongitudinalActivity::Cruising),
        ];
        let merged = detector.merge_short_cruising(events.clone(), &speed, table.time());
        assert_eq!(merged, events);
    }

    proptest! {
        #[test]
        fn detection_is_deterministic_and_well_formed(
            speed in proptest::collection::vec(0.0f64..40.0, 30..150)
        ) {
            let mut table = table_with_speed(speed);
            let mut again = table.clone();
            let config = DetectorConfig::default();
            let detector = LongitudinalDetector::new(&config);

            let events = detector.detect(&mut table, "host_vx").unwrap();
            let repeat = detector.detect(&mut again, "host_vx").unwrap();
            prop_assert_eq!(&events, &repeat);

            // Neutral label at the first sample.
            prop_assert_eq!(events[0].index, 0);
            prop_assert_eq!(events[0].label, LongitudinalActivity::Cruising);
            // Strictly increasing timestamps, no repeated labels.
            for pair in events.windows(2) {
                prop_assert!(pair[0].time < pair[1].time);
                prop_assert!(pair[0].label != pair[1].label);
            }
            // Forward-filled column is defined everywhere.
            apply_events(&mut table, "host_longitudinal_activity", &events).unwrap();
            let column = table.get("host_longitudinal_activity").unwrap();
            prop_assert!(column.iter().all(|v| v.is_finite()));
        }
    }
}
