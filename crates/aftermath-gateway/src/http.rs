//! HTTP surface
//!
//! ```text
//! POST /api/analyze                 multipart `before` + `after`
//! GET  /api/result-image/<token>    streamed visualization, served once
//! GET  /api/health                  liveness and session counters
//! ```
//!
//! Every error is a JSON body `{ "error": "..." }` with the status from
//! [`GatewayError::status`].

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::AnalysisGateway;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{self, TryStreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::io;
use tracing::Instrument;
use warp::http::{header, HeaderValue, StatusCode};
use warp::hyper::Body;
use warp::multipart::{FormData, Part};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Body of every error response
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Health check body
#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    sessions: aftermath_session::StatsSnapshot,
}

/// Build all routes
pub fn routes(
    gateway: AnalysisGateway,
    config: &GatewayConfig,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let with_gateway = warp::any().map(move || gateway.clone());

    let analyze = warp::path!("api" / "analyze")
        .and(warp::post())
        .and(warp::multipart::form().max_length(config.max_upload_bytes))
        .and(with_gateway.clone())
        .and_then(analyze_handler);

    let fetch = warp::path!("api" / "result-image" / String)
        .and(warp::get())
        .and(with_gateway.clone())
        .and_then(fetch_handler);

    let health = warp::path!("api" / "health")
        .and(warp::get())
        .and(with_gateway)
        .map(health_handler);

    analyze
        .or(fetch)
        .or(health)
        .with(cors(config))
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn cors(config: &GatewayConfig) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(["GET", "POST", "OPTIONS"])
        .allow_headers(["content-type"]);
    if config.cors_origins.is_empty() {
        builder.allow_any_origin()
    } else {
        builder.allow_origins(config.cors_origins.iter().map(String::as_str))
    }
}

async fn analyze_handler(form: FormData, gateway: AnalysisGateway) -> Result<Response, Infallible> {
    let uploads = match Uploads::collect(form).await {
        Ok(uploads) => uploads,
        Err(e) => return Ok(error_reply(&e)),
    };

    let reply = match gateway
        .analyze(uploads.before.map(single_chunk), uploads.after.map(single_chunk))
        .await
    {
        Ok(outcome) => warp::reply::json(&outcome.to_response()).into_response(),
        Err(e) => error_reply(&e),
    };
    Ok(reply)
}

async fn fetch_handler(token: String, gateway: AnalysisGateway) -> Result<Response, Infallible> {
    let span = tracing::info_span!("fetch", token = %token);
    async move {
        let artifact = match gateway.fetch_result(&token).await {
            Ok(artifact) => artifact,
            Err(e) => return Ok(error_reply(&e)),
        };
        tracing::debug!(bytes = artifact.len(), "serving result");

        let len = artifact.len();
        let mut response = Response::new(Body::wrap_stream(artifact.into_stream()));
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        Ok(response)
    }
    .instrument(span)
    .await
}

fn health_handler(gateway: AnalysisGateway) -> warp::reply::Json {
    warp::reply::json(&HealthBody {
        status: "ok",
        sessions: gateway.sessions().stats(),
    })
}

/// The two image fields of an analyze form, buffered
///
/// Both parts are held in memory (bounded by `max_upload_bytes`) so a form
/// missing either field is rejected before a session or any file exists.
#[derive(Debug, Default)]
struct Uploads {
    before: Option<Bytes>,
    after: Option<Bytes>,
}

impl Uploads {
    async fn collect(mut form: FormData) -> GatewayResult<Self> {
        let mut uploads = Self::default();
        while let Some(part) = form.try_next().await.map_err(malformed)? {
            let slot = match part.name() {
                "before" => &mut uploads.before,
                "after" => &mut uploads.after,
                other => {
                    tracing::debug!(field = other, "ignoring form field");
                    read_part(part).await?;
                    continue;
                }
            };
            if slot.is_some() {
                return Err(GatewayError::validation(format!(
                    "duplicate form field: {}",
                    part.name()
                )));
            }
            *slot = Some(read_part(part).await?);
        }
        Ok(uploads)
    }
}

async fn read_part(part: Part) -> GatewayResult<Bytes> {
    part.stream()
        .try_fold(BytesMut::new(), |mut acc, buf| async move {
            acc.put(buf);
            Ok::<_, warp::Error>(acc)
        })
        .await
        .map(BytesMut::freeze)
        .map_err(malformed)
}

#[allow(clippy::needless_pass_by_value)]
fn malformed(err: warp::Error) -> GatewayError {
    GatewayError::validation(format!("malformed multipart body: {err}"))
}

fn single_chunk(bytes: Bytes) -> stream::Iter<std::iter::Once<io::Result<Bytes>>> {
    stream::iter(std::iter::once(Ok(bytes)))
}

fn error_reply(err: &GatewayError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    } else {
        tracing::debug!(error = %err, "request rejected");
    }
    json_error(status, err.client_message())
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let reply = if err.is_not_found() {
        json_error(StatusCode::NOT_FOUND, "not found")
    } else if let Some(e) = err.find::<warp::reject::PayloadTooLarge>() {
        json_error(StatusCode::PAYLOAD_TOO_LARGE, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else if err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        json_error(
            StatusCode::BAD_REQUEST,
            "expected a multipart form with before and after images",
        )
    } else if let Some(e) = err.find::<warp::cors::CorsForbidden>() {
        json_error(StatusCode::FORBIDDEN, e.to_string())
    } else {
        tracing::debug!(rejection = ?err, "unhandled rejection");
        json_error(StatusCode::BAD_REQUEST, "bad request")
    };
    Ok(reply)
}
