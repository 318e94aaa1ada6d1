//! viesti-core - Core types for the viesti notification gateway
//!
//! This crate holds the types and capability traits shared between the
//! gateway and anything plugged into it:
//!
//! - [`Request`] / [`Telemetry`] - the framed inbound notification
//! - [`JobSubmitter`] - admission-controlled submission to a worker pool
//! - [`RequestHandler`] - outbound dispatch for one request
//! - [`HealthTracker`] - payload-size bucket counters
//! - [`ServerProfiler`] - rolling record of processed requests
//! - [`SubmitError`] - why a submission was refused
//!
//! Dispatchers and test doubles depend on this crate alone; the concrete
//! pool, tracker and profiler live in `viesti-gateway`.
//!
//! ```text
//! viesti-core ◄── viesti-gateway ◄── viesti-runtime
//!     ▲
//!     └────────── custom dispatchers
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

mod dispatch;
mod error;
mod health;
mod profile;
/// The framed inbound request and its telemetry
pub mod request;
mod submit;

pub use dispatch::RequestHandler;
pub use error::SubmitError;
pub use health::HealthTracker;
pub use profile::ServerProfiler;
pub use request::{ContentType, Request, Telemetry, UnsupportedContentType, WorkerId};
pub use submit::{job, Job, JobSubmitter};
