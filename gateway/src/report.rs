//! Profile reporting handler
//!
//! Serves the server profiler's current snapshot as a JSON array.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::error;
use viesti_core::ServerProfiler;

/// `GET <profile-path>` handler
///
/// An empty profiler serializes to `[]`, never `null`.
pub async fn profile_handler<P>(State(profiler): State<Arc<P>>) -> Response
where
    P: ServerProfiler + 'static,
{
    let entries = profiler.report();

    match serde_json::to_vec(&entries) {
        Ok(mut body) => {
            body.push(b'\n');
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, entries = entries.len(), "Failed to serialize server profile");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Unable to serialize server profile: {e}\n"),
            )
                .into_response()
        }
    }
}
