use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tracing::{info, warn};

use super::{
    error::ApiError,
    models::{ArchiveStatusResponse, CleanupResponse, HealthResponse, ZipRequest, ZipResponse},
    state::AppState,
    validation::validate_request,
};
use crate::jobs::JobId;
use crate::retention::sweep_blocking;

/// Archive request endpoint (POST /zip)
///
/// Validates the request shape, hands the members to the orchestrator and
/// answers with the new `file_id` right away. Missing or unreadable members
/// never fail the request; they are left out of the archive by the
/// background job.
pub async fn submit_archive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    // Content-Type is optional, but when sent it must be JSON
    if let Some(value) = headers.get(header::CONTENT_TYPE) {
        let content_type = value
            .to_str()
            .map_err(|_| ApiError::InvalidPayload("Content-Type is not valid ASCII".into()))?;
        super::utils::parse_content_type(content_type)?;
    }

    // Decompression already happened in RequestDecompressionLayer, so the
    // limit applies to the inflated bytes
    let limit = state.config.server.api.max_payload_bytes.as_u64() as usize;
    let body_bytes = read_body(body, limit).await?;

    let request: ZipRequest = serde_json::from_slice(&body_bytes)?;
    validate_request(&request, &state.config.server.api)
        .map_err(|err| ApiError::InvalidPayload(err.to_string()))?;

    let id = state
        .orchestrator
        .submit(request.filenames)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok((
        StatusCode::OK,
        Json(ZipResponse {
            file_id: id.to_string(),
        }),
    ))
}

async fn read_body(body: axum::body::Body, limit: usize) -> Result<Vec<u8>, ApiError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes().to_vec()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ApiError::PayloadTooLarge { limit })
        }
        Err(err) => Err(ApiError::InvalidPayload(format!("cannot read body: {err}"))),
    }
}

/// Archive existence probe (GET /zip/{file_id})
///
/// Looks for `<output_root>/<file_id>.zip`. A missing file means the job is
/// still running, has failed, or the archive was already swept; the probe
/// cannot tell these apart.
pub async fn archive_status(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: JobId = file_id
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("file_id {file_id:?} is not a UUID")))?;

    let path = state.orchestrator.pipeline().publisher().destination(&id);
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(ApiError::NotFound(format!("archive {id}"))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("archive {id}")));
        }
        Err(err) => {
            return Err(ApiError::Internal(format!(
                "cannot stat {}: {err}",
                path.display()
            )));
        }
    };

    let modified = metadata
        .modified()
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok((
        StatusCode::OK,
        Json(ArchiveStatusResponse {
            file_id: id.to_string(),
            size_bytes: metadata.len(),
            modified_at: modified.into(),
        }),
    ))
}

/// On-demand retention sweep (GET|POST /clean-old)
pub async fn clean_old(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    info!(root = %state.retention.root.display(), "Sweep requested over HTTP");

    let stats = sweep_blocking(Arc::clone(&state.retention), Arc::clone(&state.metrics))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok((StatusCode::OK, Json(CleanupResponse::from(stats))))
}

/// Health check endpoint (GET /health)
///
/// The service is healthy while it can answer; the output root is reported
/// separately so a missing or unwritable volume shows up here.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());

    let output_root = &state.config.storage.output_root;
    let storage = match tokio::fs::metadata(output_root).await {
        Ok(metadata) if metadata.is_dir() => "healthy",
        // Created lazily by the first publish
        Err(err) if err.kind() == io::ErrorKind::NotFound => "healthy",
        Ok(_) | Err(_) => {
            warn!(path = %output_root.display(), "Output root is not a usable directory");
            "unhealthy"
        }
    };
    components.insert("storage".to_string(), storage.to_string());

    let all_healthy = components.values().all(|status| status == "healthy");
    let (overall_status, status_code) = if all_healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

/// Counter snapshot (GET /operators/metrics)
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
