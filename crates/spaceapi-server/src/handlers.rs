//! Request handlers
//!
//! Handlers never reject: every outcome, including errors, is turned into a
//! response here so the route table cannot fall through to another match.
//! Store calls run on the blocking pool.

use crate::error::{error_reply, ApiError, ApiResult, Surface};
use crate::state::AppState;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use spaceapi_core::{bool_from_json, int_from_json, FieldUpdate, Sensor, StateUpdate};
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{Reply, Response};

/// Query or form parameters of the change endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ChangeParams {
    pub key: Option<String>,
    pub value: Option<String>,
}

fn ok_json(value: &Value) -> Response {
    warp::reply::json(value).into_response()
}

fn respond(result: ApiResult<Response>) -> Result<Response, Infallible> {
    Ok(result.unwrap_or_else(|e| e.to_response()))
}

async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "blocking store task failed");
        ApiError::Internal("internal error".to_string())
    })?
}

/// Parse a JSON object body
fn json_object(body: &[u8]) -> ApiResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(ApiError::bad_request("expected a JSON object")),
        Err(_) => Err(ApiError::bad_request("invalid or missing JSON body")),
    }
}

/// `GET /`, `/api`, `/api.json`
pub async fn get_document(state: AppState) -> Result<Response, Infallible> {
    let store = state.store;
    respond(
        blocking(move || {
            let document = store
                .read()
                .map_err(|e| ApiError::from_status(e.into(), Surface::Change))?;
            Ok(ok_json(&document.into_value()))
        })
        .await,
    )
}

/// `GET|POST|PUT /api/keepalive`
pub async fn keepalive(state: AppState) -> Result<Response, Infallible> {
    state.watchdog.signal();
    Ok(ok_json(&json!({ "status": "ok" })))
}

/// `POST /api/update_state`
pub async fn update_state(state: AppState, body: Bytes) -> Result<Response, Infallible> {
    respond(update_state_inner(state, &body).await)
}

async fn update_state_inner(state: AppState, body: &[u8]) -> ApiResult<Response> {
    let fields = json_object(body)?;

    let message = match fields.get("message") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };
    let open = match fields.get("open") {
        None => None,
        Some(raw) => Some(
            bool_from_json(raw)
                .ok_or_else(|| ApiError::bad_request(format!("invalid value for open: {raw}")))?,
        ),
    };

    let update = StateUpdate { message, open };
    let store = state.store;
    let data = blocking(move || {
        store
            .apply_state(&update)
            .map_err(|e| ApiError::from_status(e, Surface::Update))
    })
    .await?;

    Ok(ok_json(&json!({ "success": true, "data": data })))
}

/// `POST /api/update_<sensor>`
pub async fn update_sensor(
    sensor: Sensor,
    state: AppState,
    body: Bytes,
) -> Result<Response, Infallible> {
    respond(update_sensor_inner(sensor, state, &body).await)
}

async fn update_sensor_inner(sensor: Sensor, state: AppState, body: &[u8]) -> ApiResult<Response> {
    let fields = json_object(body)?;
    let raw = fields
        .get("value")
        .ok_or_else(|| ApiError::missing("value", Surface::Update))?;
    let value = int_from_json(raw)
        .ok_or_else(|| ApiError::bad_request(format!("value must be an integer, got {raw}")))?;

    let store = state.store;
    let data = blocking(move || {
        store
            .apply(&FieldUpdate::Sensor(sensor, value))
            .map_err(|e| ApiError::from_status(e, Surface::Update))
    })
    .await?;

    Ok(ok_json(&json!({ "success": true, "data": data })))
}

/// `GET /api/change/get`, `POST|PUT /api/change[/post|/put]`
pub async fn change(state: AppState, params: ChangeParams) -> Result<Response, Infallible> {
    respond(change_inner(state, params).await)
}

async fn change_inner(state: AppState, params: ChangeParams) -> ApiResult<Response> {
    let Some(key) = params.key else {
        return Err(ApiError::missing("key", Surface::Change));
    };
    let Some(value) = params.value else {
        return Err(ApiError::missing("value", Surface::Change));
    };

    let update = state
        .registry
        .resolve(&key, &value)
        .map_err(|e| ApiError::from_validation(e, Surface::Change))?;

    let store = state.store;
    blocking(move || {
        store
            .apply(&update)
            .map_err(|e| ApiError::from_status(e, Surface::Change))
    })
    .await?;

    Ok(ok_json(&json!({ "status": "ok" })))
}

/// `GET /api/get/<key>`
pub async fn get_key(state: AppState, key: String) -> Result<Response, Infallible> {
    respond(get_key_inner(state, key).await)
}

async fn get_key_inner(state: AppState, key: String) -> ApiResult<Response> {
    state
        .registry
        .lookup(&key)
        .map_err(|e| ApiError::from_validation(e, Surface::Change))?;

    let AppState {
        store, registry, ..
    } = state;
    let (label, value) = blocking(move || {
        let document = store
            .read()
            .map_err(|e| ApiError::from_status(e.into(), Surface::Change))?;
        registry
            .read(&document, &key)
            .map_err(|e| ApiError::from_status(e, Surface::Change))
    })
    .await?;

    let mut body = Map::new();
    body.insert(label.to_string(), value);
    Ok(ok_json(&Value::Object(body)))
}

/// Fallback for unmatched paths
pub fn not_found() -> Response {
    error_reply(StatusCode::NOT_FOUND, "not found / invalid path")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_status_depends_on_surface() {
        assert_eq!(
            ApiError::missing("value", Surface::Update),
            ApiError::bad_request("missing value")
        );
        assert_eq!(
            ApiError::missing("key", Surface::Change).status(),
            StatusCode::NOT_ACCEPTABLE
        );
    }

    #[test]
    fn json_object_rejects_non_objects() {
        assert!(json_object(br#"{"value": 1}"#).is_ok());
        assert_eq!(
            json_object(b"[1, 2]").unwrap_err(),
            ApiError::bad_request("expected a JSON object")
        );
        assert!(matches!(json_object(b""), Err(ApiError::BadRequest(_))));
        assert!(matches!(json_object(b"{oops"), Err(ApiError::BadRequest(_))));
    }
}
