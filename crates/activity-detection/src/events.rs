//! Activity labels and events
//!
//! Closed label sets with explicit discriminants and short string codes. The
//! discriminant is what gets forward-filled into table columns; the code is
//! the stable serialized form of an event list.

use serde::{Deserialize, Serialize};
use signal_table::{forward_fill, SignalTable, TableError};

/// Common behaviour of every label set.
pub trait ActivityLabel: Copy + PartialEq {
    /// Stable short code used in serialized event lists.
    fn code(&self) -> &'static str;

    /// Numeric value written into table label columns.
    fn value(&self) -> f64;
}

/// Longitudinal activity of the host or a target.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LongitudinalActivity {
    #[serde(rename = "c")]
    Cruising = 0,
    #[serde(rename = "a")]
    Accelerating = 1,
    #[serde(rename = "d")]
    Decelerating = 2,
}

impl ActivityLabel for LongitudinalActivity {
    fn code(&self) -> &'static str {
        match self {
            Self::Cruising => "c",
            Self::Accelerating => "a",
            Self::Decelerating => "d",
        }
    }

    fn value(&self) -> f64 {
        *self as u8 as f64
    }
}

/// Lateral activity of the host vehicle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LateralActivityHost {
    #[serde(rename = "fl")]
    LaneFollowing = 0,
    #[serde(rename = "l")]
    LeftLaneChange = 1,
    #[serde(rename = "r")]
    RightLaneChange = 2,
}

impl ActivityLabel for LateralActivityHost {
    fn code(&self) -> &'static str {
        match self {
            Self::LaneFollowing => "fl",
            Self::LeftLaneChange => "l",
            Self::RightLaneChange => "r",
        }
    }

    fn value(&self) -> f64 {
        *self as u8 as f64
    }
}

/// Lateral activity of a target, relative to the host lane.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LateralActivityTarget {
    #[serde(rename = "fl")]
    LaneFollowing = 0,
    #[serde(rename = "li")]
    LeftCutIn = 1,
    #[serde(rename = "lo")]
    LeftCutOut = 2,
    #[serde(rename = "ri")]
    RightCutIn = 3,
    #[serde(rename = "ro")]
    RightCutOut = 4,
}

impl LateralActivityTarget {
    /// Whether the label belongs to the leftward maneuver pair.
    pub fn is_left(&self) -> bool {
        matches!(self, Self::LeftCutIn | Self::LeftCutOut)
    }

    /// Whether the label belongs to the rightward maneuver pair.
    pub fn is_right(&self) -> bool {
        matches!(self, Self::RightCutIn | Self::RightCutOut)
    }
}

impl ActivityLabel for LateralActivityTarget {
    fn code(&self) -> &'static str {
        match self {
            Self::LaneFollowing => "fl",
            Self::LeftCutIn => "li",
            Self::LeftCutOut => "lo",
            Self::RightCutIn => "ri",
            Self::RightCutOut => "ro",
        }
    }

    fn value(&self) -> f64 {
        *self as u8 as f64
    }
}

/// Per-frame longitudinal state of a target.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LongitudinalState {
    #[serde(rename = "f")]
    Front = 0,
    #[serde(rename = "r")]
    Rear = 1,
    #[serde(rename = "na")]
    NoVehicle = 2,
}

impl ActivityLabel for LongitudinalState {
    fn code(&self) -> &'static str {
        match self {
            Self::Front => "f",
            Self::Rear => "r",
            Self::NoVehicle => "na",
        }
    }

    fn value(&self) -> f64 {
        *self as u8 as f64
    }
}

/// Per-frame lateral state of a target.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LateralState {
    #[serde(rename = "l")]
    Left = 0,
    #[serde(rename = "r")]
    Right = 1,
    #[serde(rename = "s")]
    Same = 2,
    #[serde(rename = "u")]
    Unknown = 3,
    #[serde(rename = "na")]
    NoVehicle = 4,
}

impl ActivityLabel for LateralState {
    fn code(&self) -> &'static str {
        match self {
            Self::Left => "l",
            Self::Right => "r",
            Self::Same => "s",
            Self::Unknown => "u",
            Self::NoVehicle => "na",
        }
    }

    fn value(&self) -> f64 {
        *self as u8 as f64
    }
}

/// Per-frame lead-vehicle tag of a target.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadVehicle {
    #[serde(rename = "y")]
    Lead = 0,
    #[serde(rename = "n")]
    NoLead = 1,
    #[serde(rename = "na")]
    NoVehicle = 2,
}

impl ActivityLabel for LeadVehicle {
    fn code(&self) -> &'static str {
        match self {
            Self::Lead => "y",
            Self::NoLead => "n",
            Self::NoVehicle => "na",
        }
    }

    fn value(&self) -> f64 {
        *self as u8 as f64
    }
}

/// A labeled event: the activity `label` starts at `time` and runs until the
/// next event of the same series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event<L> {
    /// Sample index into the table.
    pub index: usize,
    /// Timestamp of the sample (seconds).
    pub time: f64,
    /// Activity starting at this event.
    pub label: L,
}

/// Forward-fill an event list into a table label column.
///
/// Each event writes its label value at its own sample; the value then holds
/// until the next event. Re-applying the same events overwrites the column
/// identically.
pub fn apply_events<L: ActivityLabel>(
    table: &mut SignalTable,
    column: &str,
    events: &[Event<L>],
) -> Result<(), TableError> {
    let mut values = vec![f64::NAN; table.len()];
    for event in events {
        values[event.index] = event.label.value();
    }
    forward_fill(&mut values);
    table.set(column, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_codes_are_pinned() {
        assert_eq!(LongitudinalActivity::Cruising.code(), "c");
        assert_eq!(LongitudinalActivity::Accelerating.code(), "a");
        assert_eq!(LongitudinalActivity::Decelerating.code(), "d");
        assert_eq!(LateralActivityHost::LaneFollowing.code(), "fl");
        assert_eq!(LateralActivityTarget::LeftCutIn.code(), "li");
        assert_eq!(LateralActivityTarget::RightCutOut.code(), "ro");
        assert_eq!(LateralState::Unknown.code(), "u");
        assert_eq!(LeadVehicle::NoVehicle.code(), "na");
    }

    #[test]
    fn test_labels_serialize_to_codes() {
        assert_eq!(
            serde_json::to_string(&LongitudinalActivity::Accelerating).unwrap(),
            "\"a\""
        );
        assert_eq!(
            serde_json::to_string(&LateralActivityTarget::RightCutIn).unwrap(),
            "\"ri\""
        );
        let event = Event {
            index: 3,
            time: 0.3,
            label: LeadVehicle::Lead,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            "{\"index\":3,\"time\":0.3,\"label\":\"y\"}"
        );
    }

    #[test]
    fn test_apply_events_covers_from_first_event() {
        let time: Vec<f64> = (0..6).map(|i| i as f64 * 0.1).collect();
        let mut table = SignalTable::new(time, 10.0).unwrap();
        let events = vec![
            Event {
                index: 0,
                time: 0.0,
                label: LongitudinalActivity::Cruising,
            },
            Event {
                index: 3,
                time: 0.3,
                label: LongitudinalActivity::Accelerating,
            },
        ];
        apply_events(&mut table, "activity", &events).unwrap();
        let column = table.get("activity").unwrap();
        assert_eq!(column, &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }
}
