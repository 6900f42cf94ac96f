//! Route table
//!
//! ```text
//! GET              /  /api  /api/  /api.json     whole document
//! GET|POST|PUT     /api/keepalive                reset the watchdog
//! POST  (token)    /api/update_state             {message?, open?}
//! POST  (token)    /api/update_<sensor>          {value}
//! GET              /api/change/get?key=&value=
//! POST|PUT         /api/change[/post|/put]       form key=&value=
//! GET              /api/get/<key>
//! ```

use crate::auth::with_token;
use crate::error::{error_reply, ApiError};
use crate::handlers::{self, ChangeParams};
use crate::state::AppState;
use spaceapi_core::Sensor;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

/// Largest accepted request body
pub const MAX_BODY_BYTES: u64 = 16 * 1024;

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Reject a declared Content-Length above [`MAX_BODY_BYTES`]; a missing header is accepted
fn body_limit() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(|length: Option<u64>| async move {
            match length {
                Some(length) if length > MAX_BODY_BYTES => {
                    Err(warp::reject::custom(ApiError::PayloadTooLarge))
                }
                _ => Ok(()),
            }
        })
        .untuple_one()
}

fn json_body() -> impl Filter<Extract = (warp::hyper::body::Bytes,), Error = Rejection> + Clone {
    body_limit().and(warp::body::bytes())
}

/// Resolve the `<sensor>` of `/api/update_<sensor>`
fn sensor_segment() -> impl Filter<Extract = (Sensor,), Error = Rejection> + Clone {
    warp::path!("api" / String).and_then(|segment: String| async move {
        segment
            .strip_prefix("update_")
            .and_then(Sensor::from_name)
            .ok_or_else(warp::reject::not_found)
    })
}

/// All endpoints, with rejections turned into JSON error responses
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    api(state).recover(handle_rejection)
}

/// All endpoints without the rejection handler
pub fn api(state: AppState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let document = warp::path::end()
        .or(warp::path!("api"))
        .unify()
        .or(warp::path!("api.json"))
        .unify()
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::get_document);

    let keepalive = warp::path!("api" / "keepalive")
        .and(warp::get().or(warp::post()).unify().or(warp::put()).unify())
        .and(with_state(state.clone()))
        .and_then(handlers::keepalive);

    let update_state = warp::path!("api" / "update_state")
        .and(warp::post())
        .and(with_token(state.token.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(handlers::update_state);

    let update_sensor = sensor_segment()
        .and(warp::post())
        .and(with_token(state.token.clone()))
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(handlers::update_sensor);

    let change_get = warp::path!("api" / "change" / "get")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(warp::query::<ChangeParams>())
        .and_then(handlers::change);

    let change_form = warp::path!("api" / "change")
        .or(warp::path!("api" / "change" / "post"))
        .unify()
        .or(warp::path!("api" / "change" / "put"))
        .unify()
        .and(warp::post().or(warp::put()).unify())
        .and(with_state(state.clone()))
        .and(body_limit())
        .and(warp::body::form::<ChangeParams>())
        .and_then(handlers::change);

    let get_key = warp::path!("api" / "get" / String)
        .and(warp::get())
        .and(with_state(state))
        .and_then(|key: String, state: AppState| handlers::get_key(state, key));

    document
        .or(keepalive)
        .unify()
        .or(update_state)
        .unify()
        .or(change_get)
        .unify()
        .or(change_form)
        .unify()
        .or(get_key)
        .unify()
        .or(update_sensor)
        .unify()
}

/// Turn rejections into `{"error": ...}` responses
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<ApiError>() {
        return Ok(e.to_response());
    }

    let response = if err.is_not_found() {
        handlers::not_found()
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
    {
        error_reply(StatusCode::BAD_REQUEST, "malformed request")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        error_reply(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported media type")
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        error_reply(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    };

    tracing::warn!(status = response.status().as_u16(), "request rejected");
    Ok(response)
}
