//! Notification ingress handler
//!
//! Validates and frames inbound notifications, then hands each one to the
//! worker pool through the [`JobSubmitter`] contract.
//!
//! # Order of effects
//!
//! ```text
//! method ─► Content-Type ─► read body ─► frame Request ─► submit ─► respond ─► health++
//!   405         400             400        (telemetry)     │
//!                                                          ├─ Ok  ─► 202, bucket incremented
//!                                                          └─ Err ─► 408, health untouched
//! ```
//!
//! Nothing is submitted unless every validation step passed, and no response
//! is produced before the submission has resolved.

use crate::metrics;
use axum::body::Body;
use axum::extract::{OriginalUri, Request as HttpRequest, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, trace};
use viesti_core::{ContentType, HealthTracker, JobSubmitter, Request, RequestHandler, job};

/// Body returned with `202 Accepted`
pub const ACCEPTED_BODY: &str = "Request placed on to queue.\n";

/// Body returned with `408 Request Timeout`
pub const TIMEOUT_BODY: &str = "Unable to handle request at this time.\n";

/// Default upper bound on a request body
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Capabilities the ingress handler depends on
#[derive(Clone)]
pub struct IngressState {
    /// Admission-controlled submission to the worker pool
    pub submitter: Arc<dyn JobSubmitter>,
    /// Outbound dispatch, invoked from inside the submitted job
    pub dispatcher: Arc<dyn RequestHandler>,
    /// Payload-size counters, bumped on accepted requests only
    pub health: Arc<dyn HealthTracker>,
    /// Bodies larger than this are rejected as unreadable
    pub max_payload_bytes: usize,
}

impl IngressState {
    /// Create ingress state with the default payload limit
    pub fn new(
        submitter: Arc<dyn JobSubmitter>,
        dispatcher: Arc<dyn RequestHandler>,
        health: Arc<dyn HealthTracker>,
    ) -> Self {
        Self {
            submitter,
            dispatcher,
            health,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    /// Override the payload limit
    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }
}

/// Why a request was refused before submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngressRejection {
    /// Only POST is accepted
    #[error("Method {0} not allowed, use POST.")]
    MethodNotAllowed(Method),

    /// No Content-Type header
    #[error("Missing Content-Type header.")]
    MissingContentType,

    /// More than one Content-Type value
    #[error("Multiple Content-Type headers are not allowed.")]
    MultipleContentTypes,

    /// Content-Type outside the supported set
    #[error("Unsupported Content-Type '{0}', expected application/json or application/msgpack.")]
    UnsupportedContentType(String),

    /// Body could not be read in full
    #[error("Unable to read request body.")]
    UnreadableBody,
}

impl IngressRejection {
    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            IngressRejection::MethodNotAllowed(_) => "method_not_allowed",
            IngressRejection::MissingContentType => "missing_content_type",
            IngressRejection::MultipleContentTypes => "multiple_content_types",
            IngressRejection::UnsupportedContentType(_) => "unsupported_content_type",
            IngressRejection::UnreadableBody => "unreadable_body",
        }
    }

    /// HTTP status for this rejection
    pub fn status(&self) -> StatusCode {
        match self {
            IngressRejection::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for IngressRejection {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = format!("{self}\n");
        match self {
            IngressRejection::MethodNotAllowed(_) => {
                (status, [(header::ALLOW, "POST")], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}

/// Extract the single supported Content-Type from `headers`
pub fn content_type(headers: &HeaderMap) -> Result<ContentType, IngressRejection> {
    let mut values = headers.get_all(header::CONTENT_TYPE).iter();

    let value = values.next().ok_or(IngressRejection::MissingContentType)?;
    if values.next().is_some() {
        return Err(IngressRejection::MultipleContentTypes);
    }

    let value = value.to_str().map_err(|_| {
        IngressRejection::UnsupportedContentType(
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
    })?;

    // Content-Type is not a list header; a comma in the media type means several
    // values were folded together. Quoted parameters may legally contain commas.
    let media_type = value.split(';').next().unwrap_or_default();
    if media_type.contains(',') {
        return Err(IngressRejection::MultipleContentTypes);
    }

    value
        .parse::<ContentType>()
        .map_err(|e| IngressRejection::UnsupportedContentType(e.0))
}

/// `POST <notify-path>` handler
///
/// Routed for every method so that method validation happens here.
pub async fn ingress_handler(State(state): State<IngressState>, request: HttpRequest) -> Response {
    let time_received = Utc::now();
    debug!("Receiving incoming request...");

    let (parts, body) = request.into_parts();

    if parts.method != Method::POST {
        trace!(method = %parts.method, "Rejecting request with unsupported method");
        return reject(IngressRejection::MethodNotAllowed(parts.method));
    }

    let content_type = match content_type(&parts.headers) {
        Ok(ct) => ct,
        Err(rejection) => {
            trace!(reason = rejection.reason(), "Rejecting request with invalid Content-Type");
            return reject(rejection);
        }
    };

    let payload = match read_body(body, state.max_payload_bytes).await {
        Ok(payload) => payload,
        Err(rejection) => return reject(rejection),
    };

    let target_url = parts
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.0.to_string())
        .unwrap_or_else(|| parts.uri.to_string());

    let request = Request::new(payload, content_type, target_url, time_received);
    let payload_size = request.raw_payload_size();
    metrics::try_record_received(content_type.as_str(), payload_size);

    let dispatcher = Arc::clone(&state.dispatcher);
    let submitted = state
        .submitter
        .submit(job(move |worker_id| async move {
            dispatcher.handle_request(worker_id, request).await;
        }))
        .await;

    match submitted {
        Ok(()) => {
            let response = (StatusCode::ACCEPTED, ACCEPTED_BODY).into_response();
            debug!(payload_size, %content_type, "Request placed on to queue.");
            metrics::try_record_enqueued();
            state.health.increment_bucket(payload_size);
            response
        }
        Err(e) => {
            let response = (StatusCode::REQUEST_TIMEOUT, TIMEOUT_BODY).into_response();
            debug!(error = %e, payload_size, "Unable to handle request at this time.");
            metrics::try_record_dropped(e.reason());
            response
        }
    }
}

async fn read_body(body: Body, limit: usize) -> Result<bytes::Bytes, IngressRejection> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        error!(error = %e, "Unable to retrieve the request body.");
        metrics::try_record_body_error();
        IngressRejection::UnreadableBody
    })
}

fn reject(rejection: IngressRejection) -> Response {
    metrics::try_record_rejected(rejection.reason());
    rejection.into_response()
}
