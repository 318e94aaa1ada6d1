//! Inbound request envelope
//!
//! A [`Request`] is framed once by the ingress handler and is read-only from
//! then on. It moves into the submitted job and is owned by exactly one
//! worker afterwards.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a worker slot in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Supported payload encodings
///
/// The gateway never decodes the payload. The encoding is carried through
/// so the dispatcher can forward it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    /// `application/json`
    #[serde(rename = "application/json")]
    Json,
    /// `application/msgpack`
    #[serde(rename = "application/msgpack")]
    Msgpack,
}

impl ContentType {
    /// Every encoding accepted on ingress
    pub const SUPPORTED: [ContentType; 2] = [ContentType::Json, ContentType::Msgpack];

    /// Canonical media type string
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Msgpack => "application/msgpack",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a header value names an unsupported encoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported content type: {0}")]
pub struct UnsupportedContentType(pub String);

impl FromStr for ContentType {
    type Err = UnsupportedContentType;

    /// Parses a `Content-Type` header value.
    ///
    /// Parameters (`; charset=utf-8`) are ignored and the media type is
    /// matched case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let essence = value.split(';').next().unwrap_or_default().trim();

        ContentType::SUPPORTED
            .into_iter()
            .find(|ct| essence.eq_ignore_ascii_case(ct.as_str()))
            .ok_or_else(|| UnsupportedContentType(value.to_string()))
    }
}

/// Timestamps and size metadata for one request
///
/// `time_received`, `time_accepted` and `raw_payload_size` are fixed during
/// admission. The optional fields belong to the dispatcher, which fills them
/// on the copy it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    /// When the ingress handler started processing
    pub time_received: DateTime<Utc>,
    /// When the body was fully read and the request framed
    pub time_accepted: DateTime<Utc>,
    /// Length of the raw payload in bytes
    pub raw_payload_size: usize,
    /// When a worker began outbound dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_dispatched: Option<DateTime<Utc>>,
    /// When outbound dispatch finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_completed: Option<DateTime<Utc>>,
}

/// A validated inbound notification
#[derive(Debug, Clone)]
pub struct Request {
    raw_payload: Bytes,
    content_type: ContentType,
    target_url: String,
    telemetry: Telemetry,
}

impl Request {
    /// Frame a request from a fully read body.
    ///
    /// Stamps `time_accepted` and derives `raw_payload_size` from the
    /// payload, so the size always matches the bytes carried.
    pub fn new(
        raw_payload: Bytes,
        content_type: ContentType,
        target_url: impl Into<String>,
        time_received: DateTime<Utc>,
    ) -> Self {
        let telemetry = Telemetry {
            time_received,
            time_accepted: Utc::now(),
            raw_payload_size: raw_payload.len(),
            time_dispatched: None,
            time_completed: None,
        };

        Self {
            raw_payload,
            content_type,
            target_url: target_url.into(),
            telemetry,
        }
    }

    /// The unparsed body
    pub fn raw_payload(&self) -> &Bytes {
        &self.raw_payload
    }

    /// Declared payload encoding
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Original request path and query
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Admission telemetry
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Payload size in bytes
    pub fn raw_payload_size(&self) -> usize {
        self.telemetry.raw_payload_size
    }

    /// Split into payload and telemetry, for dispatchers that need to
    /// stamp the later lifecycle fields.
    pub fn into_parts(self) -> (Bytes, ContentType, String, Telemetry) {
        (
            self.raw_payload,
            self.content_type,
            self.target_url,
            self.telemetry,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parses_supported_values() {
        assert_eq!(
            "application/json".parse::<ContentType>().unwrap(),
            ContentType::Json
        );
        assert_eq!(
            "application/msgpack".parse::<ContentType>().unwrap(),
            ContentType::Msgpack
        );
    }

    #[test]
    fn test_content_type_ignores_parameters_and_case() {
        assert_eq!(
            "Application/JSON; charset=utf-8".parse::<ContentType>().unwrap(),
            ContentType::Json
        );
    }

    #[test]
    fn test_content_type_rejects_unsupported() {
        let err = "text/plain".parse::<ContentType>().unwrap_err();
        assert_eq!(err, UnsupportedContentType("text/plain".to_string()));
        assert!("".parse::<ContentType>().is_err());
        assert!("application/jsonx".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_request_size_matches_payload() {
        let request = Request::new(
            Bytes::from_static(br#"{"a":1}"#),
            ContentType::Json,
            "/api/v3/notify",
            Utc::now(),
        );

        assert_eq!(request.raw_payload_size(), 7);
        assert_eq!(request.telemetry().raw_payload_size, request.raw_payload().len());
        assert!(request.telemetry().time_accepted >= request.telemetry().time_received);
        assert!(request.telemetry().time_dispatched.is_none());
    }

    #[test]
    fn test_telemetry_serializes_without_unset_fields() {
        let request = Request::new(Bytes::new(), ContentType::Msgpack, "/", Utc::now());
        let json = serde_json::to_value(request.telemetry()).unwrap();

        assert_eq!(json["raw_payload_size"], 0);
        assert!(json.get("time_dispatched").is_none());
    }

    #[test]
    fn test_worker_id_display() {
        assert_eq!(WorkerId(3).to_string(), "worker-3");
    }
}
