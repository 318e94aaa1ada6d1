//! Custom dispatcher example: log each accepted notification, no HTTP fanout.
//!
//! ```bash
//! cargo run -p viesti-runtime --example custom_dispatcher
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use viesti_runtime::prelude::*;

/// Prints each payload and records a profile entry for it
struct PrintDispatcher {
    profiler: Arc<Profiler>,
}

#[async_trait]
impl RequestHandler for PrintDispatcher {
    async fn handle_request(&self, worker_id: WorkerId, request: Request) {
        println!(
            "[{worker_id}] {} {} bytes from {}",
            request.content_type(),
            request.raw_payload_size(),
            request.target_url()
        );

        let (_, content_type, target_url, telemetry) = request.into_parts();
        self.profiler.record(DeliveryProfile {
            worker_id,
            target_url,
            content_type,
            telemetry,
            listeners: 0,
            delivered: 0,
            failed: 0,
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    RuntimeBuilder::new()
        .metrics_port(9091)
        .dispatcher(|_config, profiler| {
            let dispatcher: Arc<dyn RequestHandler> = Arc::new(PrintDispatcher { profiler });
            Ok(dispatcher)
        })
        .run()
        .await
}
