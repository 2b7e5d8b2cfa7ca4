//! # portstock-api — Consumables Inventory Web Application
//!
//! Server-rendered pages for the port authority's consumables store: the
//! item catalog, receiving, issuing against departments, returns, user
//! administration, and printable reports. Stock is held per terminal
//! (`jct_stock`, `uct_stock`) and an issue is refused rather than allowed
//! to drive a counter below zero.
//!
//! ## Surface
//!
//! | Prefix                 | Module                  | Access              |
//! |------------------------|-------------------------|---------------------|
//! | `/login`               | [`routes::session`]     | public              |
//! | `/`, `/dashboard`      | [`routes::dashboard`]   | any signed-in user  |
//! | `/items/*`             | [`routes::items`]       | Viewer / Storekeeper / Admin |
//! | `/receipts/*`          | [`routes::receiving`]   | Viewer / Storekeeper |
//! | `/issues/*`            | [`routes::issuing`]     | Viewer / Storekeeper |
//! | `/issues/:id/return`, `/returns` | [`routes::returns`] | Viewer / Storekeeper |
//! | `/departments/*`       | [`routes::departments`] | Viewer / Admin      |
//! | `/users/*`             | [`routes::users`]       | Admin               |
//! | `/reports/*`           | [`routes::reports`]     | any signed-in user  |
//! | `/audit`               | [`routes::audit`]       | Admin               |
//! | `/api/v1/*`            | [`routes::api`]         | any signed-in user (JSON) |
//! | `/health/*`, `/metrics`, `/assets/*` | this module | public        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → SessionMiddleware → BodyLimit → Handler
//! ```

pub mod audit;
pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod error;
pub mod extractors;
pub mod inventory;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod views;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use portstock_core::report::{stock_summary, StockFilter};
use portstock_core::Terminal;

use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Largest accepted form body. Every form is a handful of short fields.
const BODY_LIMIT: usize = 64 * 1024;

/// Assemble the application router.
///
/// Sign-in, static assets, health probes and `/metrics` are mounted outside
/// the session middleware; everything else requires a live session.
pub fn app(state: AppState) -> Router {
    let metrics = if state.config.metrics_enabled {
        match ApiMetrics::new() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "failed to register Prometheus metrics; /metrics disabled"
                );
                None
            }
        }
    } else {
        None
    };

    let protected = routes::protected()
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(from_fn_with_state(state.clone(), auth::session_middleware));

    let mut public = routes::public()
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .route("/assets/app.css", get(views::assets::stylesheet))
        .route("/assets/app.js", get(views::assets::script))
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    if let Some(m) = &metrics {
        public = public
            .route("/metrics", get(prometheus_metrics))
            .layer(Extension(m.clone()));
    }

    let mut router = Router::new().merge(public).merge(protected);
    if let Some(m) = metrics {
        router = router
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(m));
    }
    router
        .layer(middleware::tracing_layer::layer())
        .with_state(state)
}

/// GET /metrics — Prometheus scrape endpoint.
///
/// Inventory gauges are recomputed from the stores on every scrape.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    let items = state.items.list();
    let summary = stock_summary(&items, &StockFilter::default());

    metrics.items_total().set(summary.rows.len() as f64);
    metrics.low_stock_items().set(summary.low_count as f64);

    metrics.stock_units().reset();
    for terminal in Terminal::ALL {
        let units = match terminal {
            Terminal::Jct => summary.total_jct,
            Terminal::Uct => summary.total_uct,
        };
        metrics
            .stock_units()
            .with_label_values(&[terminal.as_str()])
            .set(units as f64);
    }

    metrics.movements_total().reset();
    for (kind, count) in [
        ("receipt", state.receipts.len()),
        ("issue", state.issues.len()),
        ("return", state.returns.len()),
    ] {
        metrics
            .movements_total()
            .with_label_values(&[kind])
            .set(count as f64);
    }

    metrics
        .sessions_active()
        .set(state.sessions.active_count() as f64);

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode Prometheus metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe: 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: stores are readable and, when configured, the database
/// answers `SELECT 1`.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let _ = state.items.len();
    let _ = state.users.len();

    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!(error = %e, "database health check failed");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
