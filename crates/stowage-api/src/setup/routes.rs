//! Route configuration and setup.
//!
//! Health checks live in [health](health).

mod health;

use crate::api_doc::ApiDoc;
use crate::constants::{API_PREFIX, LOCAL_UPLOAD_PATH, OPENAPI_PATH, PUBLIC_ASSETS_PATH};
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use stowage_core::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    // Direct uploads stream bodies up to the largest category ceiling.
    let body_limit = usize::try_from(config.category_limits().largest_max_size_bytes())
        .unwrap_or(usize::MAX);

    let app = Router::new()
        .merge(asset_routes())
        .merge(health_routes())
        .route(
            OPENAPI_PATH,
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .with_state(state)
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_PATH).path("/docs"))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!(body_limit_bytes = body_limit, "Routes configured");
    Ok(app)
}

fn asset_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/businesses/{{businessId}}/assets/uploads", API_PREFIX),
            post(handlers::uploads::create_uploads),
        )
        .route(
            &format!(
                "{}/businesses/{{businessId}}/assets/uploads/{{assetId}}/complete",
                API_PREFIX
            ),
            post(handlers::uploads::complete_upload),
        )
        .route(
            &format!("{}/{{assetId}}", PUBLIC_ASSETS_PATH),
            get(handlers::public_asset::get_public_asset),
        )
        .route(
            &format!("{}/{{assetId}}", LOCAL_UPLOAD_PATH),
            post(handlers::direct_upload::receive_upload),
        )
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS_ORIGINS entry: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
