use serde::{Deserialize, Serialize};
use time::Date;

use super::services::DayAvailability;
use crate::calendar::{iso_date, TimeSlot};

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAvailabilityRequest {
    pub date: String,
    #[serde(default)]
    pub time_slots: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_slots: Option<Vec<TimeSlot>>,
}

impl From<DayAvailability> for AvailabilityResponse {
    fn from(day: DayAvailability) -> Self {
        match day {
            DayAvailability::Open(slots) => Self {
                available: true,
                time_slots: Some(slots),
            },
            DayAvailability::Closed => Self {
                available: false,
                time_slots: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeEntry {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub time_slots: Option<Vec<TimeSlot>>,
}
