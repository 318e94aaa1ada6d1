//! Notification HTTP surface
//!
//! Two routes: the ingress path takes every method so the handler owns the
//! 405 and Content-Type decisions, and the profile path serves the profiler
//! snapshot on `GET`.

use crate::ingress::{IngressState, ingress_handler};
use crate::report::profile_handler;
use axum::Router;
use axum::routing::{any, get};
use std::sync::Arc;
use viesti_core::ServerProfiler;

/// Build the notification router
pub fn router<P>(
    notify_path: &str,
    profile_path: &str,
    ingress: IngressState,
    profiler: Arc<P>,
) -> Router
where
    P: ServerProfiler + 'static,
{
    let profile = Router::new()
        .route(profile_path, get(profile_handler::<P>))
        .with_state(profiler);

    Router::new()
        .route(notify_path, any(ingress_handler))
        .with_state(ingress)
        .merge(profile)
}
