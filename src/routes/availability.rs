use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::AppResult;
use crate::services::calendar::SlotEntry;
use crate::services::notifications::NotificationService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_availability))
}

#[derive(Serialize)]
struct AvailabilityResponse {
    capacity: u32,
    slots: Vec<SlotEntry>,
}

/// Slots of the latest calendar that still have free courts.
async fn get_availability(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<AvailabilityResponse>> {
    let calendar = NotificationService::new(&state).current_calendar().await?;

    Ok(Json(AvailabilityResponse {
        capacity: calendar.capacity(),
        slots: calendar.non_empty().entries(),
    }))
}
