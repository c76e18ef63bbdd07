//! Raw record schema
//!
//! The ten reservation attributes a booking record carries, the label
//! encoding, and conversion of a single record into a one-row DataFrame
//! for the inference path.

use crate::error::{PredictError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Unique booking identifier, dropped before processing
pub const ID_COLUMN: &str = "Booking_ID";

/// Label column name in raw and processed datasets
pub const LABEL_COLUMN: &str = "booking_status";

/// Raw label value for a booking that was kept
pub const LABEL_NOT_CANCELED: &str = "Not_Canceled";

/// Raw label value for a booking that was canceled
pub const LABEL_CANCELED: &str = "Canceled";

/// Encode a raw label string to its {0, 1} class
pub fn encode_label(raw: &str) -> Result<i64> {
    match raw {
        LABEL_NOT_CANCELED => Ok(0),
        LABEL_CANCELED => Ok(1),
        other => Err(PredictError::Schema(format!(
            "unknown booking_status value: {other:?}"
        ))),
    }
}

/// A single reservation record, as submitted for prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub lead_time: i64,
    pub no_of_special_requests: i64,
    pub avg_price_per_room: f64,
    pub arrival_month: i64,
    pub arrival_date: i64,
    pub market_segment_type: String,
    pub no_of_week_nights: i64,
    pub no_of_weekend_nights: i64,
    pub type_of_meal_plan: String,
    pub room_type_reserved: String,
}

impl BookingRecord {
    /// Convert the record into a one-row DataFrame matching the raw
    /// training schema (minus identifier and label).
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let df = df!(
            "lead_time" => &[self.lead_time],
            "no_of_special_requests" => &[self.no_of_special_requests],
            "avg_price_per_room" => &[self.avg_price_per_room],
            "arrival_month" => &[self.arrival_month],
            "arrival_date" => &[self.arrival_date],
            "market_segment_type" => &[self.market_segment_type.as_str()],
            "no_of_week_nights" => &[self.no_of_week_nights],
            "no_of_weekend_nights" => &[self.no_of_weekend_nights],
            "type_of_meal_plan" => &[self.type_of_meal_plan.as_str()],
            "room_type_reserved" => &[self.room_type_reserved.as_str()],
        )?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> BookingRecord {
        BookingRecord {
            lead_time: 45,
            no_of_special_requests: 1,
            avg_price_per_room: 110.5,
            arrival_month: 7,
            arrival_date: 15,
            market_segment_type: "Online".to_string(),
            no_of_week_nights: 3,
            no_of_weekend_nights: 2,
            type_of_meal_plan: "Meal Plan 1".to_string(),
            room_type_reserved: "Room_Type 1".to_string(),
        }
    }

    #[test]
    fn test_label_encoding() {
        assert_eq!(encode_label(LABEL_NOT_CANCELED).unwrap(), 0);
        assert_eq!(encode_label(LABEL_CANCELED).unwrap(), 1);
        assert!(encode_label("Maybe").is_err());
    }

    #[test]
    fn test_record_to_dataframe() {
        let df = sample_record().to_dataframe().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 10);
        let segment = df.column("market_segment_type").unwrap();
        assert_eq!(segment.str().unwrap().get(0), Some("Online"));
    }
}
