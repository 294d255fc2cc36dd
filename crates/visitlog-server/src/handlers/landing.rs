use axum::{body::Bytes, extract::State, response::Html};
use std::sync::Arc;
use visitlog_core::EventKind;

use super::RequestContext;
use crate::state::AppState;

/// GET /
///
/// Serves the landing page and records a pageview without waiting for it.
pub async fn index(State(state): State<Arc<AppState>>, ctx: RequestContext) -> Html<Bytes> {
    let entry = ctx.entry(EventKind::Pageview, &state.hasher).build();
    state.record(entry);

    Html(state.landing_page())
}
