//! Public asset route: serves assembled bytes by asset id (no auth).

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use futures::StreamExt;
use stowage_core::constants::IMMUTABLE_CACHE_CONTROL;
use stowage_core::AppError;
use stowage_storage::PublicLocation;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

fn etag_for(asset_id: &str) -> String {
    format!("\"{}\"", asset_id)
}

/// `If-None-Match` is a list of entity tags or `*`; weak tags compare equal.
fn if_none_match_hits(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|tag| tag.trim().trim_start_matches("W/"))
        .any(|tag| tag == "*" || tag == etag)
}

fn build(builder: axum::http::response::Builder, body: Body) -> Result<Response, HttpAppError> {
    builder.body(body).map_err(|e| {
        tracing::error!(error = %e, "Failed to build response");
        HttpAppError::from(AppError::Internal(e.to_string()))
    })
}

/// Fetch an uploaded asset
#[utoipa::path(
    get,
    path = "/api/v0/public/assets/{assetId}",
    tag = "public",
    params(("assetId" = String, Path, description = "Asset identifier")),
    responses(
        (status = 200, description = "Asset bytes"),
        (status = 302, description = "Redirect to the object URL"),
        (status = 304, description = "Client copy is current"),
        (status = 404, description = "Unknown asset or upload not finished", body = ErrorResponse),
        (status = 502, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers), fields(asset_id = %asset_id, operation = "get_public_asset"))]
pub async fn get_public_asset(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let asset = state.public_assets.resolve(&asset_id).await?;
    let etag = etag_for(&asset.asset_id);

    match asset.location {
        PublicLocation::Redirect(url) => {
            let location = HeaderValue::from_str(&url).map_err(|e| {
                AppError::Internal(format!("Invalid redirect location: {}", e))
            })?;
            build(
                Response::builder()
                    .status(StatusCode::FOUND)
                    .header(header::LOCATION, location)
                    .header(header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL),
                Body::empty(),
            )
        }
        PublicLocation::Stream {
            body,
            content_length,
        } => {
            if if_none_match_hits(&headers, &etag) {
                return build(
                    Response::builder()
                        .status(StatusCode::NOT_MODIFIED)
                        .header(header::ETAG, etag.as_str())
                        .header(header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL),
                    Body::empty(),
                );
            }

            let body_stream = body.map(|result| {
                result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
            });

            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, asset.content_type.as_str())
                .header(header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL)
                .header(header::ETAG, etag.as_str());
            if let Some(length) = content_length {
                builder = builder.header(header::CONTENT_LENGTH, length);
            }
            build(builder, Body::from_stream(body_stream))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_none_match_variants() {
        let etag = etag_for("ast_1");
        let mut headers = HeaderMap::new();
        assert!(!if_none_match_hits(&headers, &etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"ast_0\", W/\"ast_1\""));
        assert!(if_none_match_hits(&headers, &etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(if_none_match_hits(&headers, &etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"ast_2\""));
        assert!(!if_none_match_hits(&headers, &etag));
    }
}
