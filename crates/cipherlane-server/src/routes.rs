//! HTTP routes for the controller server
//!
//! The caller identity comes from the `x-caller` header as a hex principal.
//! Authenticating that header is the transport's job, not this server's.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use cipherlane_core::{
    Ciphertext, DecryptedConfig, LaneConfig, Principal, RecordId, RequestId, TrafficRecord,
};
use cipherlane_engine::{
    ConfigMetric, ControllerStats, EncryptedValue, Event, RecordMetric, RevealState, SensorMetric,
};

use crate::error::{Result, ServerError};
use crate::metrics;
use crate::state::SharedState;

pub const CALLER_HEADER: &str = "x-caller";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub admin: Principal,
    pub shadow_mode: bool,
    pub stats: ControllerStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub volume: Ciphertext,
    pub avg_speed: Ciphertext,
    pub destination_pattern: Ciphertext,
    pub congestion_level: Ciphertext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub id: RecordId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpecialEventRequest {
    pub impact: Ciphertext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevealResponse {
    pub id: RecordId,
    pub request_id: RequestId,
}

/// Reveal progress plus the plaintext once revealed
#[derive(Debug, Serialize, Deserialize)]
pub struct DecryptedResponse {
    pub id: RecordId,
    pub state: RevealState,
    pub pending_requests: Vec<RequestId>,
    pub config: DecryptedConfig,
}

/// Oracle fulfillment; bundle and proof are hex
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub request_id: RequestId,
    pub bundle: String,
    pub proof: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricResponse {
    pub metric: String,
    pub value: EncryptedValue,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub operator: Principal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub operator: Principal,
    pub is_operator: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    /// Offset to pass as `since` on the next poll
    pub next: usize,
    pub events: Vec<Event>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptRequest {
    pub value: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub handle: Ciphertext,
}

/// Principal from the `x-caller` header
fn caller(headers: &HeaderMap) -> Result<Principal> {
    let value = headers.get(CALLER_HEADER).ok_or(ServerError::MissingCaller)?;
    let value = value
        .to_str()
        .map_err(|_| ServerError::InvalidRequest("x-caller is not valid ASCII".into()))?;
    parse_principal(value)
}

fn parse_principal(s: &str) -> Result<Principal> {
    s.parse()
        .map_err(|e: cipherlane_core::Error| ServerError::InvalidRequest(e.to_string()))
}

fn parse_hex(field: &str, s: &str) -> Result<Vec<u8>> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| ServerError::InvalidRequest(format!("Invalid {} hex: {}", field, e)))
}

/// Count the outcome of an operator or sensor operation
fn track<T>(op: &'static str, result: Result<T>) -> Result<T> {
    metrics::record_operation(op, metrics::outcome(&result));
    result
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let state = state.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        admin: state.controller.admin(),
        shadow_mode: state.shadow_mode,
        stats: state.controller.stats(),
    })
}

async fn submit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>> {
    let result = async {
        let sensor = caller(&headers)?;
        let mut state = state.write().await;
        let id = state.controller.submit(
            &sensor,
            req.volume,
            req.avg_speed,
            req.destination_pattern,
            req.congestion_level,
        );
        metrics::set_records(state.controller.stats().records);
        Ok::<_, ServerError>(SubmitResponse { id })
    }
    .await;
    track(metrics::OP_SUBMIT, result).map(Json)
}

async fn get_record(State(state): State<SharedState>, Path(id): Path<RecordId>) -> Result<Json<TrafficRecord>> {
    let state = state.read().await;
    Ok(Json(state.controller.record(id)?.clone()))
}

async fn special_event(
    State(state): State<SharedState>,
    Path(id): Path<RecordId>,
    headers: HeaderMap,
    Json(req): Json<SpecialEventRequest>,
) -> Result<Json<TrafficRecord>> {
    let result = async {
        let caller = caller(&headers)?;
        let mut state = state.write().await;
        state.controller.adjust_for_special_event(&caller, id, req.impact)?;
        Ok::<_, ServerError>(state.controller.record(id)?.clone())
    }
    .await;
    track(metrics::OP_SPECIAL_EVENT, result).map(Json)
}

async fn adaptive_control(
    State(state): State<SharedState>,
    Path(id): Path<RecordId>,
    headers: HeaderMap,
) -> Result<Json<TrafficRecord>> {
    let result = async {
        let caller = caller(&headers)?;
        let mut state = state.write().await;
        state.controller.adaptive_control(&caller, id)?;
        Ok::<_, ServerError>(state.controller.record(id)?.clone())
    }
    .await;
    track(metrics::OP_ADAPTIVE_CONTROL, result).map(Json)
}

async fn transit_priority(
    State(state): State<SharedState>,
    Path(id): Path<RecordId>,
    headers: HeaderMap,
) -> Result<Json<TrafficRecord>> {
    let result = async {
        let caller = caller(&headers)?;
        let mut state = state.write().await;
        state.controller.optimize_for_transit(&caller, id)?;
        Ok::<_, ServerError>(state.controller.record(id)?.clone())
    }
    .await;
    track(metrics::OP_TRANSIT_PRIORITY, result).map(Json)
}

async fn plan(
    State(state): State<SharedState>,
    Path(id): Path<RecordId>,
    headers: HeaderMap,
) -> Result<Json<LaneConfig>> {
    let result = async {
        let caller = caller(&headers)?;
        let mut state = state.write().await;
        Ok::<_, ServerError>(state.controller.plan(&caller, id)?.clone())
    }
    .await;
    track(metrics::OP_PLAN, result).map(Json)
}

async fn get_config(State(state): State<SharedState>, Path(id): Path<RecordId>) -> Result<Json<LaneConfig>> {
    let state = state.read().await;
    Ok(Json(state.controller.lane_config(id)?.clone()))
}

async fn request_reveal(
    State(state): State<SharedState>,
    Path(id): Path<RecordId>,
    headers: HeaderMap,
) -> Result<Json<RevealResponse>> {
    let result = async {
        let caller = caller(&headers)?;
        let mut state = state.write().await;
        let request_id = state.controller.request_reveal(&caller, id)?;
        metrics::set_pending_reveals(state.controller.stats().pending_reveals);
        Ok::<_, ServerError>(RevealResponse { id, request_id })
    }
    .await;
    track(metrics::OP_REQUEST_REVEAL, result).map(Json)
}

async fn get_decrypted(State(state): State<SharedState>, Path(id): Path<RecordId>) -> Json<DecryptedResponse> {
    let state = state.read().await;
    Json(DecryptedResponse {
        id,
        state: state.controller.reveal_state(id),
        pending_requests: state.controller.pending_requests(id),
        config: state.controller.decrypted_config(id),
    })
}

/// Oracle callback; open to anyone, the proof is the authentication
async fn oracle_callback(
    State(state): State<SharedState>,
    Json(req): Json<CallbackRequest>,
) -> Result<Json<DecryptedConfig>> {
    let bundle = parse_hex("bundle", &req.bundle)?;
    let proof = parse_hex("proof", &req.proof)?;

    let mut state = state.write().await;
    let result = state.controller.on_reveal_callback(req.request_id, &bundle, &proof);
    metrics::record_callback(if result.is_ok() {
        metrics::CALLBACK_REVEALED
    } else {
        metrics::CALLBACK_REJECTED
    });
    metrics::set_pending_reveals(state.controller.stats().pending_reveals);
    Ok(Json(result?))
}

async fn record_metric(
    State(state): State<SharedState>,
    Path((id, metric)): Path<(RecordId, String)>,
) -> Result<Json<MetricResponse>> {
    let metric: RecordMetric = metric.parse().map_err(ServerError::InvalidRequest)?;
    let state = state.read().await;
    let value = state.controller.record_metric(id, metric)?;
    Ok(Json(MetricResponse {
        metric: metric.to_string(),
        value: EncryptedValue::Uint(value),
    }))
}

async fn config_metric(
    State(state): State<SharedState>,
    Path((id, metric)): Path<(RecordId, String)>,
) -> Result<Json<MetricResponse>> {
    let metric: ConfigMetric = metric.parse().map_err(ServerError::InvalidRequest)?;
    let state = state.read().await;
    let value = state.controller.config_metric(id, metric)?;
    Ok(Json(MetricResponse {
        metric: metric.to_string(),
        value: EncryptedValue::Uint(value),
    }))
}

async fn sensor_metric(
    State(state): State<SharedState>,
    Path((sensor, metric)): Path<(String, String)>,
) -> Result<Json<MetricResponse>> {
    let sensor = parse_principal(&sensor)?;
    let metric: SensorMetric = metric.parse().map_err(ServerError::InvalidRequest)?;
    let state = state.read().await;
    Ok(Json(MetricResponse {
        metric: metric.to_string(),
        value: state.controller.sensor_metric(&sensor, metric),
    }))
}

async fn authorize(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>> {
    let result = async {
        let caller = caller(&headers)?;
        let mut state = state.write().await;
        state.controller.authorize(&caller, req.operator)?;
        Ok::<_, ServerError>(AuthorizeResponse {
            operator: req.operator,
            is_operator: state.controller.is_operator(&req.operator),
        })
    }
    .await;
    track(metrics::OP_AUTHORIZE, result).map(Json)
}

async fn events(State(state): State<SharedState>, Query(query): Query<EventsQuery>) -> Json<EventsResponse> {
    let state = state.read().await;
    let events = state.controller.events_since(query.since).to_vec();
    Json(EventsResponse {
        next: state.controller.events().len(),
        events,
    })
}

/// Trivial encryption against the shadow ALU
async fn shadow_encrypt(
    State(state): State<SharedState>,
    Json(req): Json<EncryptRequest>,
) -> Result<Json<EncryptResponse>> {
    let state = state.read().await;
    if !state.shadow_mode {
        return Err(ServerError::ShadowDisabled);
    }
    Ok(Json(EncryptResponse {
        handle: state.alu.encrypt(req.value),
    }))
}

async fn prometheus(State(state): State<SharedState>) -> Result<String> {
    let state = state.read().await;
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or(ServerError::MetricsDisabled)
}

/// Create the router with all routes
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/telemetry", post(submit))
        .route("/telemetry/{id}", get(get_record))
        .route("/telemetry/{id}/special-event", post(special_event))
        .route("/telemetry/{id}/adaptive-control", post(adaptive_control))
        .route("/telemetry/{id}/transit-priority", post(transit_priority))
        .route("/config/{id}", get(get_config))
        .route("/config/{id}/plan", post(plan))
        .route("/config/{id}/reveal", post(request_reveal))
        .route("/config/{id}/decrypted", get(get_decrypted))
        .route("/oracle/callback", post(oracle_callback))
        .route("/analytics/record/{id}/{metric}", get(record_metric))
        .route("/analytics/config/{id}/{metric}", get(config_metric))
        .route("/analytics/sensor/{sensor}/{metric}", get(sensor_metric))
        .route("/admin/authorize", post(authorize))
        .route("/events", get(events))
        .route("/shadow/encrypt", post(shadow_encrypt))
        .route("/metrics", get(prometheus))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_caller_header() {
        let mut headers = HeaderMap::new();
        assert!(matches!(caller(&headers), Err(ServerError::MissingCaller)));

        headers.insert(CALLER_HEADER, HeaderValue::from_static("0xzz"));
        assert!(matches!(caller(&headers), Err(ServerError::InvalidRequest(_))));

        headers.insert(
            CALLER_HEADER,
            HeaderValue::from_static("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
        );
        assert_eq!(caller(&headers).unwrap(), Principal::new([0xaa; 20]));
    }

    #[test]
    fn test_parse_hex_accepts_prefix() {
        assert_eq!(parse_hex("bundle", "0x0102").unwrap(), vec![1, 2]);
        assert_eq!(parse_hex("bundle", "0102").unwrap(), vec![1, 2]);
        assert!(parse_hex("proof", "0xg0").is_err());
    }
}
