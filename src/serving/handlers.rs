//! Request handlers for the prediction form

use super::error::ServingError;
use super::state::ServingContext;
use crate::schema::BookingRecord;
use axum::{
    extract::{Form, State},
    response::Html,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Raw form fields; everything arrives as text so each field can be
/// validated and reported individually
#[derive(Debug, Deserialize)]
pub struct PredictForm {
    #[serde(default)]
    lead_time: String,
    #[serde(default)]
    no_of_special_requests: String,
    #[serde(default)]
    avg_price_per_room: String,
    #[serde(default)]
    arrival_month: String,
    #[serde(default)]
    arrival_date: String,
    #[serde(default)]
    market_segment_type: String,
    #[serde(default)]
    no_of_week_nights: String,
    #[serde(default)]
    no_of_weekend_nights: String,
    #[serde(default)]
    type_of_meal_plan: String,
    #[serde(default)]
    room_type_reserved: String,
}

fn parse_int(field: &str, value: &str, errors: &mut Vec<String>) -> i64 {
    match value.trim().parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            errors.push(format!("{field} must be a whole number"));
            0
        }
    }
}

fn parse_float(field: &str, value: &str, errors: &mut Vec<String>) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            errors.push(format!("{field} must be a number"));
            0.0
        }
    }
}

fn parse_text(field: &str, value: &str, errors: &mut Vec<String>) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(format!("{field} is required"));
    }
    trimmed.to_string()
}

impl PredictForm {
    /// Validate every field, collecting all problems instead of stopping
    /// at the first
    fn into_record(self) -> std::result::Result<BookingRecord, Vec<String>> {
        let mut errors = Vec::new();

        let record = BookingRecord {
            lead_time: parse_int("lead_time", &self.lead_time, &mut errors),
            no_of_special_requests: parse_int(
                "no_of_special_requests",
                &self.no_of_special_requests,
                &mut errors,
            ),
            avg_price_per_room: parse_float(
                "avg_price_per_room",
                &self.avg_price_per_room,
                &mut errors,
            ),
            arrival_month: parse_int("arrival_month", &self.arrival_month, &mut errors),
            arrival_date: parse_int("arrival_date", &self.arrival_date, &mut errors),
            market_segment_type: parse_text(
                "market_segment_type",
                &self.market_segment_type,
                &mut errors,
            ),
            no_of_week_nights: parse_int("no_of_week_nights", &self.no_of_week_nights, &mut errors),
            no_of_weekend_nights: parse_int(
                "no_of_weekend_nights",
                &self.no_of_weekend_nights,
                &mut errors,
            ),
            type_of_meal_plan: parse_text("type_of_meal_plan", &self.type_of_meal_plan, &mut errors),
            room_type_reserved: parse_text(
                "room_type_reserved",
                &self.room_type_reserved,
                &mut errors,
            ),
        };

        if errors.is_empty() {
            Ok(record)
        } else {
            Err(errors)
        }
    }
}

/// GET /: render the empty form
pub async fn index() -> Html<String> {
    Html(render_page(None, &[]))
}

/// POST /: validate the submitted record and render the prediction.
/// Field-level problems come back as page messages; artifact or transform
/// failures are fatal to the request and surface as errors.
pub async fn predict(
    State(ctx): State<Arc<ServingContext>>,
    Form(form): Form<PredictForm>,
) -> std::result::Result<Html<String>, ServingError> {
    let record = match form.into_record() {
        Ok(record) => record,
        Err(errors) => return Ok(Html(render_page(None, &errors))),
    };

    let prediction = ctx.predict(&record)?;
    info!(prediction, "served prediction");
    Ok(Html(render_page(Some(prediction), &[])))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn render_page(prediction: Option<i64>, errors: &[String]) -> String {
    let verdict = match prediction {
        Some(1) => r#"<p class="result canceled">Likely to be canceled</p>"#.to_string(),
        Some(_) => r#"<p class="result kept">Likely to be kept</p>"#.to_string(),
        None => String::new(),
    };

    let error_list = if errors.is_empty() {
        String::new()
    } else {
        let items: String = errors
            .iter()
            .map(|e| format!("<li>{e}</li>"))
            .collect();
        format!(r#"<ul class="errors">{items}</ul>"#)
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<title>Booking Cancellation Prediction</title>
<style>
body {{ font-family: sans-serif; max-width: 32rem; margin: 2rem auto; }}
label {{ display: block; margin-top: 0.6rem; }}
input {{ width: 100%; padding: 0.3rem; }}
button {{ margin-top: 1rem; padding: 0.5rem 1.5rem; }}
.errors {{ color: #b00020; }}
.result {{ font-size: 1.2rem; font-weight: bold; }}
.canceled {{ color: #b00020; }}
.kept {{ color: #1b5e20; }}
</style>
</head>
<body>
<h1>Booking Cancellation Prediction</h1>
{error_list}
{verdict}
<form method="post" action="/">
<label>Lead time (days) <input name="lead_time" /></label>
<label>Special requests <input name="no_of_special_requests" /></label>
<label>Average price per room <input name="avg_price_per_room" /></label>
<label>Arrival month <input name="arrival_month" /></label>
<label>Arrival date <input name="arrival_date" /></label>
<label>Market segment <input name="market_segment_type" /></label>
<label>Week nights <input name="no_of_week_nights" /></label>
<label>Weekend nights <input name="no_of_weekend_nights" /></label>
<label>Meal plan <input name="type_of_meal_plan" /></label>
<label>Room type <input name="room_type_reserved" /></label>
<button type="submit">Predict</button>
</form>
</body>
</html>"#
    )
}
