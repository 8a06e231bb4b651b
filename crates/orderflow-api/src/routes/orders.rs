//! Order submission, lookup, listing, and synthetic generation.

use std::sync::PoisonError;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::routing::{get, post};
use axum::{Json, Router};
use orderflow_core::error::DomainError;
use orderflow_core::order::Order;
use orderflow_core::store::OrderBrief;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::demo;
use crate::error::ApiError;
use crate::state::AppState;

/// Largest order file accepted in a multipart upload.
const MAX_UPLOAD_BYTES: usize = 2 << 20;
/// Request body cap: a full-size upload plus its multipart framing.
const MAX_BODY_BYTES: usize = MAX_UPLOAD_BYTES + (64 << 10);
const DEFAULT_LIST_LIMIT: u32 = 100;
const MAX_LIST_LIMIT: u32 = 1000;
const MAX_GENERATE_COUNT: u32 = 1000;

/// Response body for an order accepted onto the queue.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub order_uid: String,
}

/// Response body for a batch of generated orders.
#[derive(Debug, Serialize)]
pub struct GeneratedResponse {
    pub status: &'static str,
    /// Business keys that were published; failed publishes are omitted.
    pub enqueued_uids: Vec<String>,
}

/// Response body for GET /api/v1/orders.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub rows: Vec<OrderBrief>,
}

/// Query parameters for GET /api/v1/orders. Unparseable or out-of-range
/// values fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListParams {
    fn limit(&self) -> u32 {
        parse_in_range(self.limit.as_deref(), 1, MAX_LIST_LIMIT).unwrap_or(DEFAULT_LIST_LIMIT)
    }

    fn offset(&self) -> u32 {
        parse_in_range(self.offset.as_deref(), 0, u32::MAX).unwrap_or(0)
    }
}

/// Query parameters for POST /api/v1/orders/generate.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateParams {
    pub count: Option<String>,
}

impl GenerateParams {
    fn count(&self) -> u32 {
        parse_in_range(self.count.as_deref(), 1, MAX_GENERATE_COUNT).unwrap_or(1)
    }
}

fn parse_in_range(raw: Option<&str>, min: u32, max: u32) -> Option<u32> {
    raw?.trim()
        .parse::<u32>()
        .ok()
        .filter(|value| (min..=max).contains(value))
}

/// POST /
///
/// Accepts an order as `application/json`, as JSON text in a `text/plain`
/// body, or as a JSON file in the `file` field of a multipart form, and
/// publishes it to the order topic.
#[instrument(skip(state, request))]
async fn create_order(
    State(state): State<AppState>,
    request: Request,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let order = read_order(request).await?;

    state
        .producer
        .publish(&order)
        .await
        .map_err(ApiError::publish)?;
    info!(order_uid = %order.order_uid, "order accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted",
            order_uid: order.order_uid,
        }),
    ))
}

/// GET /{order_uid}
#[instrument(skip(state))]
async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>, ApiError> {
    if order_uid.trim().is_empty() {
        return Err(DomainError::Validation("order_uid is required".into()).into());
    }

    let order = state
        .service
        .get_by_key(&order_uid)
        .await?
        .ok_or(DomainError::OrderNotFound(order_uid))?;

    Ok(Json(Order::clone(&order)))
}

/// GET /
#[instrument(skip(state))]
async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let rows = state
        .service
        .list_brief(params.limit(), params.offset())
        .await?;
    Ok(Json(ListResponse { rows }))
}

/// POST /generate
#[instrument(skip(state))]
async fn generate_orders(
    State(state): State<AppState>,
    Query(params): Query<GenerateParams>,
) -> (StatusCode, Json<GeneratedResponse>) {
    let count = params.count();
    info!(count, "generating orders");

    let mut enqueued_uids = Vec::new();
    for _ in 0..count {
        let order = {
            let mut rng = state.rng.lock().unwrap_or_else(PoisonError::into_inner);
            demo::generate_order(state.clock.as_ref(), &mut *rng)
        };
        match state.producer.publish(&order).await {
            Ok(()) => enqueued_uids.push(order.order_uid),
            Err(e) => warn!(order_uid = %order.order_uid, error = %e, "publishing generated order failed"),
        }
    }

    (
        StatusCode::ACCEPTED,
        Json(GeneratedResponse {
            status: "accepted",
            enqueued_uids,
        }),
    )
}

async fn read_order(request: Request) -> Result<Order, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media_type.as_str() {
        "application/json" => {
            let body = Bytes::from_request(request, &())
                .await
                .map_err(|e| decode_error(e.body_text()))?;
            decode_order(&body, true)
        }
        "text/plain" => {
            let body = Bytes::from_request(request, &())
                .await
                .map_err(|e| decode_error(e.body_text()))?;
            decode_order(&body, false)
        }
        "multipart/form-data" => {
            let multipart = Multipart::from_request(request, &())
                .await
                .map_err(|e| decode_error(e.body_text()))?;
            let file = read_file_field(multipart).await?;
            decode_order(&file, true)
        }
        _ => Err(ApiError::UnsupportedMediaType(content_type)),
    }
}

/// Reads the `file` field of a multipart form, up to `MAX_UPLOAD_BYTES`.
async fn read_file_field(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| decode_error(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let mut file = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| decode_error(e.body_text()))?
        {
            if file.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(decode_error(format!(
                    "order file exceeds {MAX_UPLOAD_BYTES} bytes"
                )));
            }
            file.extend_from_slice(&chunk);
        }
        return Ok(file);
    }

    Err(decode_error("multipart form has no \"file\" field".into()))
}

/// Decodes an order body. In strict mode, fields the order model does not
/// know are rejected.
fn decode_order(body: &[u8], strict: bool) -> Result<Order, ApiError> {
    let raw: Value =
        serde_json::from_slice(body).map_err(|e| decode_error(format!("invalid JSON: {e}")))?;
    let order = Order::deserialize(&raw).map_err(|e| decode_error(format!("invalid JSON: {e}")))?;

    if strict {
        let known =
            serde_json::to_value(&order).map_err(|e| decode_error(format!("invalid JSON: {e}")))?;
        if let Some(field) = unknown_field(&raw, &known, "") {
            return Err(decode_error(format!("unknown field {field}")));
        }
    }

    order.validate()?;
    Ok(order)
}

/// Returns the path of the first key in `given` that has no counterpart in
/// `known`, the re-serialized form of the decoded order.
fn unknown_field(given: &Value, known: &Value, path: &str) -> Option<String> {
    match (given, known) {
        (Value::Object(given), Value::Object(known)) => given.iter().find_map(|(key, value)| {
            let field = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            match known.get(key) {
                None => Some(field),
                Some(expected) => unknown_field(value, expected, &field),
            }
        }),
        (Value::Array(given), Value::Array(known)) => given
            .iter()
            .zip(known)
            .enumerate()
            .find_map(|(index, (value, expected))| {
                unknown_field(value, expected, &format!("{path}[{index}]"))
            }),
        _ => None,
    }
}

fn decode_error(message: String) -> ApiError {
    ApiError::Domain(DomainError::Decode(message))
}

/// Returns the router for order endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/generate", post(generate_orders))
        .route("/{order_uid}", get(get_order))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
