use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::Registry;
use serde::Deserialize;

use crate::email_probe;
use crate::metrics;
use crate::prober::timeout::{SCRAPE_TIMEOUT_HEADER, as_deadline, resolve_timeout};
use crate::prober::{LogSink, Prober, ScrapeLogger};

pub struct AppState {
    pub prober: Prober,
    pub process_registry: Registry,
    pub sink: Arc<dyn LogSink>,
}

#[derive(Debug, Deserialize)]
struct ProbeParams {
    target: Option<String>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/probe", get(probe_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// One probe per request: resolve the scrape timeout, validate the target,
/// run the orchestrator under the derived deadline, and answer with the
/// per-request registry rendered as exposition text. A failed verification
/// is still a successful scrape: HTTP 200 with probe_success at 0.
async fn probe_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProbeParams>,
    headers: HeaderMap,
) -> Response {
    let header_value = match headers.get(SCRAPE_TIMEOUT_HEADER).map(|v| v.to_str()) {
        None => None,
        Some(Ok(value)) => Some(value),
        Some(Err(e)) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to parse timeout from Prometheus header: {e}"),
            )
                .into_response();
        }
    };
    let timeout_seconds = match resolve_timeout(header_value) {
        Ok(seconds) => seconds,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to parse timeout from Prometheus header: {e}"),
            )
                .into_response();
        }
    };

    let target = match params.target {
        Some(target) if !target.is_empty() => target,
        _ => {
            return (StatusCode::BAD_REQUEST, "Target parameter is missing").into_response();
        }
    };

    let logger = ScrapeLogger::new(&target, state.sink.clone());
    logger.info(&format!(
        "Beginning probe, timeout_seconds={timeout_seconds}"
    ));

    let report = state.prober.probe(&target, as_deadline(timeout_seconds)).await;
    match &report.result {
        Ok(result) => logger.info(&format!(
            "Probe succeeded, reachable={}, duration_seconds={}",
            result.reachable.as_str(),
            result.duration_seconds
        )),
        Err(e) => logger.error(&format!(
            "Probe failed: {}, duration_seconds={}",
            email_probe::report(e),
            report.duration_seconds
        )),
    }

    render_registry(&report.registry)
}

/// Process-wide metrics, separate from the per-probe registries.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    render_registry(&state.process_registry)
}

fn render_registry(registry: &Registry) -> Response {
    match metrics::render(registry) {
        Ok(body) => (
            [(header::CONTENT_TYPE, metrics::EXPOSITION_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {e}"),
        )
            .into_response(),
    }
}
