//! HTTP surface for visitlog.
//!
//! - `GET /healthz` liveness, not recorded
//! - `GET /` landing page, recorded as a `pageview`
//! - `POST /api/telemetry` validated payload, recorded as `telemetry`
//!
//! Records are written in the background after the response is decided;
//! see [`state::AppState::record`].

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::VisitServer;
pub use state::AppState;
