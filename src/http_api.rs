use crate::energy_manager::{EnergyReport, SensorUpdate, SharedEnergyManager};
use crate::event_coordinator::EnergyEvent;
use crate::job_state::JobEvent;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

/// Sensor update as posted, before non-numeric fields are dropped
type RawSensorUpdate = HashMap<String, HashMap<String, Value>>;

#[derive(Clone)]
pub struct ApiState {
    pub manager: SharedEnergyManager,
    pub events: Sender<EnergyEvent>,
}

/// Query route plus the ingress routes used by the sensor and job publishers
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/server/energy", get(get_energy))
        .route("/server/sensors/update", post(post_sensor_update))
        .route("/server/job_state/:event", post(post_job_event))
        .with_state(state)
}

pub async fn serve(bind_addr: SocketAddr, state: ApiState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "Energy API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn get_energy(State(state): State<ApiState>) -> Json<EnergyReport> {
    let manager = state.manager.lock().await;
    Json(manager.snapshot())
}

async fn post_sensor_update(
    State(state): State<ApiState>,
    Json(update): Json<RawSensorUpdate>,
) -> StatusCode {
    publish(&state, EnergyEvent::Sensors(numeric_update(update))).await
}

/// Keeps the finite numeric fields of every sensor. A bad field only drops
/// that field, the rest of the payload still applies.
fn numeric_update(raw: RawSensorUpdate) -> SensorUpdate {
    raw.into_iter()
        .map(|(sensor_id, fields)| {
            let numeric = fields
                .into_iter()
                .filter_map(|(name, value)| match value.as_f64() {
                    Some(v) if v.is_finite() => Some((name, v)),
                    _ => {
                        debug!(sensor = %sensor_id, field = %name, "Ignoring non-numeric field");
                        None
                    }
                })
                .collect();
            (sensor_id, numeric)
        })
        .collect()
}

// The job statistics body is not needed, only the event name
async fn post_job_event(State(state): State<ApiState>, Path(event): Path<String>) -> StatusCode {
    match event.parse::<JobEvent>() {
        Ok(job_event) => publish(&state, EnergyEvent::Job(job_event)).await,
        Err(e) => {
            warn!(error = %e, "Rejected job event");
            StatusCode::BAD_REQUEST
        }
    }
}

async fn publish(state: &ApiState, event: EnergyEvent) -> StatusCode {
    match state.events.send(event).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
