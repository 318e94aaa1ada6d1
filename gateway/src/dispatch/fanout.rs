//! Single-attempt HTTP fanout
//!
//! POSTs each payload, unchanged and with its original Content-Type, to every
//! configured listener concurrently. One attempt per listener; failures are
//! logged and counted, never retried.

use crate::dispatch::DeliveryProfile;
use crate::error::Result;
use crate::metrics;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use viesti_core::{ContentType, Request, RequestHandler, ServerProfiler, WorkerId};

/// Why one listener did not take a payload
#[derive(Debug, Clone, PartialEq, Eq)]
enum DeliveryFailure {
    Timeout,
    Network,
    Status(u16),
}

impl DeliveryFailure {
    fn outcome(&self) -> &'static str {
        match self {
            DeliveryFailure::Timeout => "timeout",
            DeliveryFailure::Network => "network",
            DeliveryFailure::Status(_) => "rejected",
        }
    }
}

/// Dispatcher fanning each request out to a fixed listener list
pub struct FanoutDispatcher {
    client: reqwest::Client,
    listeners: Vec<String>,
    profiler: Arc<dyn ServerProfiler<Entry = DeliveryProfile>>,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl FanoutDispatcher {
    /// Create a dispatcher with a per-request `timeout`
    pub fn new(
        listeners: Vec<String>,
        timeout: Duration,
        profiler: Arc<dyn ServerProfiler<Entry = DeliveryProfile>>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, listeners, profiler))
    }

    /// Create a dispatcher around an existing client
    pub fn with_client(
        client: reqwest::Client,
        listeners: Vec<String>,
        profiler: Arc<dyn ServerProfiler<Entry = DeliveryProfile>>,
    ) -> Self {
        Self {
            client,
            listeners,
            profiler,
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Configured listener URLs
    pub fn listeners(&self) -> &[String] {
        &self.listeners
    }

    /// Total successful per-listener deliveries
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Total failed per-listener deliveries
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    async fn deliver(
        &self,
        url: &str,
        payload: Bytes,
        content_type: ContentType,
    ) -> std::result::Result<(), DeliveryFailure> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type.as_str())
            .body(payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(DeliveryFailure::Status(resp.status().as_u16())),
            Err(e) if e.is_timeout() => Err(DeliveryFailure::Timeout),
            Err(_) => Err(DeliveryFailure::Network),
        }
    }
}

#[async_trait]
impl RequestHandler for FanoutDispatcher {
    async fn handle_request(&self, worker_id: WorkerId, request: Request) {
        let started = Instant::now();
        let (payload, content_type, target_url, mut telemetry) = request.into_parts();
        telemetry.time_dispatched = Some(Utc::now());

        let sends = self
            .listeners
            .iter()
            .map(|url| self.deliver(url, payload.clone(), content_type));
        let results = futures::future::join_all(sends).await;

        let mut delivered = 0usize;
        for (url, result) in self.listeners.iter().zip(&results) {
            match result {
                Ok(()) => {
                    delivered += 1;
                    metrics::try_record_delivery("delivered");
                    debug!(%worker_id, listener = %url, "Delivered payload");
                }
                Err(failure) => {
                    metrics::try_record_delivery(failure.outcome());
                    warn!(%worker_id, listener = %url, failure = ?failure, "Delivery failed");
                }
            }
        }
        let failed = results.len() - delivered;

        self.delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        self.failed.fetch_add(failed as u64, Ordering::Relaxed);

        telemetry.time_completed = Some(Utc::now());
        metrics::try_record_delivery_duration(started.elapsed());

        self.profiler.record(DeliveryProfile {
            worker_id,
            target_url,
            content_type,
            telemetry,
            listeners: self.listeners.len(),
            delivered,
            failed,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::profiler::RingProfiler;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use parking_lot::Mutex;

    type Received = Arc<Mutex<Vec<(String, Bytes)>>>;

    /// Local listener: `/ok` records and answers 200, `/fail` answers 500
    async fn spawn_listener() -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let app = Router::new()
            .route(
                "/ok",
                post(move |headers: HeaderMap, body: Bytes| {
                    let sink = Arc::clone(&sink);
                    async move {
                        let ct = headers
                            .get(CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        sink.lock().push((ct, body));
                        StatusCode::OK
                    }
                }),
            )
            .route("/fail", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (format!("http://{addr}"), received)
    }

    fn request(body: &'static str, content_type: ContentType) -> Request {
        Request::new(
            Bytes::from_static(body.as_bytes()),
            content_type,
            "/api/v3/notify",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_no_listeners_still_records_profile() {
        let profiler = Arc::new(RingProfiler::<DeliveryProfile>::new(4));
        let dispatcher =
            FanoutDispatcher::new(vec![], Duration::from_secs(1), profiler.clone()).unwrap();

        dispatcher
            .handle_request(WorkerId(2), request("{}", ContentType::Json))
            .await;

        let report = profiler.report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].worker_id, WorkerId(2));
        assert_eq!(report[0].listeners, 0);
        assert_eq!(report[0].delivered, 0);
        assert!(report[0].telemetry.time_dispatched.is_some());
        assert!(report[0].telemetry.time_completed.is_some());
    }

    #[tokio::test]
    async fn test_fanout_delivers_and_counts_failures() {
        let (base, received) = spawn_listener().await;
        let profiler = Arc::new(RingProfiler::<DeliveryProfile>::new(4));
        let dispatcher = FanoutDispatcher::new(
            vec![format!("{base}/ok"), format!("{base}/fail")],
            Duration::from_secs(2),
            profiler.clone(),
        )
        .unwrap();

        dispatcher
            .handle_request(WorkerId(0), request(r#"{"a":1}"#, ContentType::Msgpack))
            .await;

        let received = received.lock().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "application/msgpack");
        assert_eq!(received[0].1, Bytes::from_static(br#"{"a":1}"#));

        let entry = &profiler.report()[0];
        assert_eq!(entry.listeners, 2);
        assert_eq!(entry.delivered, 1);
        assert_eq!(entry.failed, 1);
        assert_eq!(entry.telemetry.raw_payload_size, 7);
        assert_eq!(dispatcher.delivered_count(), 1);
        assert_eq!(dispatcher.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_listener_is_a_failure() {
        let profiler = Arc::new(RingProfiler::<DeliveryProfile>::new(4));
        // Bind then drop to get a port nothing listens on
        let port = {
            let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let dispatcher = FanoutDispatcher::new(
            vec![format!("http://127.0.0.1:{port}/gone")],
            Duration::from_secs(2),
            profiler.clone(),
        )
        .unwrap();

        dispatcher
            .handle_request(WorkerId(1), request("{}", ContentType::Json))
            .await;

        let entry = &profiler.report()[0];
        assert_eq!(entry.delivered, 0);
        assert_eq!(entry.failed, 1);
    }

    #[test]
    fn test_profile_serializes_content_type_and_worker() {
        let entry = DeliveryProfile {
            worker_id: WorkerId(5),
            target_url: "/api/v3/notify".to_string(),
            content_type: ContentType::Json,
            telemetry: request("{}", ContentType::Json).telemetry().clone(),
            listeners: 0,
            delivered: 0,
            failed: 0,
        };
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["worker_id"], 5);
        assert_eq!(json["content_type"], "application/json");
        assert_eq!(json["telemetry"]["raw_payload_size"], 2);
    }
}
