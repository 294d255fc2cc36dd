use axum::{body::Bytes, extract::State, http::StatusCode};
use std::sync::Arc;
use visitlog_core::EventKind;

use super::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /api/telemetry
///
/// The body is read as raw bytes so that beacon senders using `text/plain`
/// are accepted; it must still be a JSON object of the active shape.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let payload = state.validator.validate_slice(&body).map_err(|report| {
        tracing::warn!(
            visitlog.event = "telemetry_rejected",
            request_id = %ctx.request_id,
            violations = report.details.len(),
            "Telemetry payload rejected"
        );
        ApiError::BadRequest(report)
    })?;

    let entry = ctx
        .entry(EventKind::Telemetry, &state.hasher)
        .field("schema", payload.profile().as_str())
        .telemetry(payload)
        .build();
    state.record(entry);

    Ok(StatusCode::NO_CONTENT)
}
