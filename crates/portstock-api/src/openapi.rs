//! # OpenAPI Document
//!
//! Collects the utoipa-annotated JSON endpoints into one OpenAPI document,
//! served at `/api/v1/openapi.json` behind the same session as the API.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// OpenAPI document for the read-only JSON API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "portstock JSON API",
        description = "Read-only access to consumables stock held at the JCT and UCT terminal stores.\n\nAuthentication: the `portstock_session` cookie set by signing in at `/login`. Requests without a live session get 401.",
        license(name = "BUSL-1.1")
    ),
    paths(
        crate::routes::api::stock,
        crate::routes::api::low_stock,
        crate::routes::api::ledger,
    ),
    components(schemas(
        crate::routes::api::StockItem,
        crate::routes::api::StockResponse,
        crate::routes::api::LedgerLine,
        crate::routes::api::LedgerResponse,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "stock", description = "Stock position and reorder list"),
        (name = "items", description = "Per-item stock cards"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_endpoint() {
        let doc = ApiDoc::openapi();
        for path in ["/api/v1/stock", "/api/v1/stock/low", "/api/v1/items/{id}/ledger"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn document_has_schemas() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.schemas.contains_key("StockResponse"));
        assert!(components.schemas.contains_key("ErrorBody"));
    }

    #[test]
    fn document_serializes() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("portstock JSON API"));
    }
}
