//! # cuberelay: upload relay for the cube solver
//!
//! `cuberelay` sits between the browser upload page of a Rubik's cube solver and the external
//! service that actually recognises and solves cubes. Browsers post six photos, one per face,
//! and get back an ordered list of moves.
//!
//! ## Request Flow
//!
//! ```text
//! browser ──multipart U,R,F,D,L,B──► POST /api/analyze-cube
//!                                       │ FaceSet::from_multipart   (presence, size, type)
//!                                       │ Solver::solve             (one attempt, bounded timeout)
//!                                       ▼
//!                                  solving backend ──JSON──► relayed verbatim
//! ```
//!
//! Every failure is turned into a `{error, details}` JSON body: `400` when the upload itself is
//! wrong, `500` when forwarding fails. Requests share no mutable state; each one owns its
//! uploaded bytes (and its temporary directory, when spilling to disk) until the response is
//! produced.
//!
//! The [`client`] module holds the other half: the state of the upload form and the HTTP client
//! that submits it to the relay.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use cuberelay::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = cuberelay::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     cuberelay::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config)?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod image_type;
mod openapi;
pub mod solver;
pub mod telemetry;
pub mod types;
pub mod uploads;

#[cfg(test)]
mod test_utils;

use crate::config::CorsOrigin;
use crate::openapi::ApiDoc;
use crate::solver::{HttpSolver, Solver};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::{Json, Router, routing::get};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::Face;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .solver(Arc::new(HttpSolver::new(&config.backend)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub solver: Arc<dyn Solver>,
}

impl AppState {
    /// State wired to the HTTP solver described by `config.backend`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let solver = HttpSolver::new(&config.backend)?;
        Ok(Self::builder().solver(Arc::new(solver)).config(config).build())
    }
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - `POST /api/analyze-cube`: the relay, with a body limit sized for six faces
/// - `GET /healthz`: liveness probe
/// - `GET /api-docs/openapi.json` and `/docs`: OpenAPI document and viewer
/// - `GET /internal/metrics`: Prometheus metrics, when enabled
///
/// # Errors
///
/// Returns an error if the CORS configuration cannot be turned into header values.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let body_limit = state.config.uploads.request_body_limit();
    debug!(body_limit, "Relay request body limit");

    let relay_route = axum::routing::post(api::handlers::analyze::analyze_cube)
        .fallback(api::handlers::analyze::method_not_allowed)
        .layer(DefaultBodyLimit::max(body_limit));

    let router = Router::new()
        .route("/api/analyze-cube", relay_route)
        .route("/healthz", get(api::handlers::health::healthz))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The relay server.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] builds the solver client and router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal resolves, in-flight requests finish and telemetry is flushed
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting cube relay with configuration: {:#?}", config);

        let app_state = AppState::from_config(config.clone())?;
        let router = build_router(&app_state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Cube relay listening on http://{}, forwarding to {}",
            bind_addr, self.config.backend.url
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
