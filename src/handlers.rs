//! HTTP handlers for the alert API.
//!
//! - `POST /alert` ingests one alert and broadcasts it.
//! - `GET /events` opens a Server-Sent Events stream of alerts.
//! - `GET /` serves the dashboard page.

use crate::config::StreamConfig;
use crate::core::{AlertEvent, IngestAck};
use crate::error::ApiError;
use crate::internal_metrics::Metrics;
use crate::registry::SubscriberRegistry;
use crate::session::StreamSession;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{debug, info, instrument, warn};

/// Shared state injected into every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub registry: Arc<SubscriberRegistry>,
    pub stream: StreamConfig,
    pub dashboard_path: PathBuf,
    pub metrics: Metrics,
}

/// Builds the router for the alert API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/alert", post(ingest_alert).fallback(method_not_allowed))
        .route("/events", get(stream_events))
        .route("/", get(dashboard))
        .with_state(state)
}

/// Accepts one alert, stamps it if needed, and broadcasts it to every subscriber.
#[instrument(skip_all)]
pub async fn ingest_alert(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let result = accept_alert(&state, body);
    if let Err(e) = &result {
        state.metrics.increment_alert_rejected(e.reason());
    }
    let alert = result?;

    info!("Alert received: {} - {}", alert.title, alert.message);
    state.metrics.alerts_received_total.increment(1);

    Ok((StatusCode::ACCEPTED, Json(IngestAck::accepted())))
}

fn accept_alert(
    state: &AppState,
    body: Result<Bytes, BytesRejection>,
) -> Result<AlertEvent, ApiError> {
    let body = body.map_err(ApiError::UnreadableBody)?;
    let mut alert = AlertEvent::from_slice(&body).map_err(ApiError::InvalidJson)?;
    alert.normalize();

    let payload = alert.to_payload().map_err(ApiError::Encode)?;
    let outcome = state.registry.broadcast(&payload);
    debug!(
        delivered = outcome.delivered,
        dropped = outcome.dropped,
        "Alert broadcast"
    );
    Ok(alert)
}

async fn method_not_allowed(State(state): State<AppState>) -> ApiError {
    let error = ApiError::MethodNotAllowed;
    state.metrics.increment_alert_rejected(error.reason());
    error
}

/// Opens an event stream for one dashboard viewer.
///
/// The subscriber is registered before the response is returned. Its session
/// runs on its own task and ends when the client disconnects.
#[instrument(skip_all)]
pub async fn stream_events(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    let session = StreamSession::connect(state.registry.clone(), state.stream.queue_capacity, peer);
    debug!(subscriber = %session.subscriber_id(), "Starting stream session");

    // One slot: a slow client backs up into its own bounded queue, where
    // broadcasts start dropping, instead of here.
    let (transport_tx, transport_rx) = mpsc::channel(1);
    tokio::spawn(session.run(transport_tx));

    let frames = ReceiverStream::new(transport_rx)
        .map(|payload| Ok::<_, Infallible>(Event::default().data(&*payload)));

    let sse = Sse::new(frames);
    let sse = match state.stream.keep_alive_seconds {
        0 => sse.into_response(),
        secs => sse
            .keep_alive(KeepAlive::new().interval(Duration::from_secs(secs)))
            .into_response(),
    };

    (
        [
            (header::CONNECTION, "keep-alive"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        sse,
    )
        .into_response()
}

/// Serves the dashboard page from disk.
#[instrument(skip_all)]
pub async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    match tokio::fs::read_to_string(&state.dashboard_path).await {
        Ok(page) => Ok(Html(page)),
        Err(e) => {
            warn!(path = %state.dashboard_path.display(), "Failed to read dashboard: {}", e);
            Err(ApiError::DashboardNotFound)
        }
    }
}
