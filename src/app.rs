use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, Response},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{field, Span};

use crate::nutrition;
use crate::state::AppState;

const SERVICE: &str = "aliment";
const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn build_app(state: AppState) -> Router {
    let model = state.config.llm.model.clone();
    Router::new()
        .nest("/api/v1",
              Router::new()
                  .merge(nutrition::router())
                  .route("/health", get(|| async { "ok" }))
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |req: &Request<Body>| request_span(req, &model))
                .on_response(record_response),
        )
}

/// Span for one API call. `route` is the matched template, so per-user paths
/// and query strings do not fan out into separate series.
fn request_span(req: &Request<Body>, model: &str) -> Span {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned());
    let span = tracing::info_span!(
        "nutrition_request",
        service = SERVICE,
        method = %req.method(),
        route = field::Empty,
        uri = %req.uri(),
        llm_model = %model,
        request_id = field::Empty,
        status = field::Empty,
    );
    if let Some(route) = route {
        span.record("route", route.as_str());
    }
    if let Some(id) = request_id(req) {
        span.record("request_id", id);
    }
    span
}

/// Caller-supplied correlation id, if it is printable.
fn request_id<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn record_response(res: &Response<Body>, latency: Duration, span: &Span) {
    let status = res.status();
    span.record("status", field::display(status));
    let latency_ms = latency.as_millis() as u64;
    if status.is_server_error() {
        tracing::error!(%status, latency_ms, "nutrition request failed");
    } else {
        tracing::info!(%status, latency_ms, "nutrition request served");
    }
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "4000".into())
    )
        .parse()?;

    tracing::info!(service = SERVICE, "listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
