use axum::{
    extract::{multipart::Field, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::transfer::server::ServerState;
use crate::utils::file::is_plain_file_name;

#[derive(Debug, Serialize, Deserialize)]
pub struct Welcome {
    pub status: String,
    pub service: String,
    pub name: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreReceipt {
    pub name: String,
    pub size: u64,
}

fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok()
}

fn require_session(state: &ServerState, headers: &HeaderMap) -> Result<Uuid, StatusCode> {
    match session_token(headers) {
        Some(token) if state.has_session(&token) => Ok(token),
        _ => {
            warn!("Rejected request without a valid session");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub async fn welcome(State(state): State<Arc<ServerState>>) -> Json<Welcome> {
    Json(Welcome {
        status: "healthy".to_string(),
        service: "droplocal".to_string(),
        name: state.name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn login(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, StatusCode> {
    if !state.credentials_match(&request.user, &request.password) {
        warn!("Login incorrect for user {}", request.user);
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = state.open_session();
    info!("User {} logged in", request.user);
    Ok(Json(LoginResponse { token }))
}

pub async fn logout(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    let token = require_session(&state, &headers)?;
    state.close_session(&token);
    info!("Session closed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn store_file(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<StoreReceipt>, StatusCode> {
    require_session(&state, &headers)?;
    info!("Store request received");

    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to read multipart field: {}", e);
        StatusCode::BAD_REQUEST
    })? {
        let file_name = field.file_name().ok_or_else(|| {
            error!("File name is missing from multipart field");
            StatusCode::BAD_REQUEST
        })?.to_string();

        if !is_plain_file_name(&file_name) {
            error!("Refusing to store under name {:?}", file_name);
            return Err(StatusCode::BAD_REQUEST);
        }

        let file_path = state.directory().join(&file_name);
        info!("File will be saved to: {:?}", file_path);

        let received = receive(&mut field, &file_path, state.upload_limit()).await;
        let size = settle(&file_path, received).await?;

        info!("File stored successfully: {} ({} bytes)", file_name, size);
        return Ok(Json(StoreReceipt { name: file_name, size }));
    }

    error!("No file found in multipart request");
    Err(StatusCode::BAD_REQUEST)
}

/// Stream one multipart field into a new file at `path`, synced to disk.
async fn receive(
    field: &mut Field<'_>,
    path: &Path,
    limit: Option<u64>,
) -> Result<u64, StatusCode> {
    let mut file = tokio::fs::File::create(path).await.map_err(|e| {
        error!("Failed to create file {:?}: {}", path, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(|e| {
        error!("Failed to read file data for {:?}: {}", path, e);
        StatusCode::BAD_REQUEST
    })? {
        size += chunk.len() as u64;
        if let Some(limit) = limit.filter(|limit| size > *limit) {
            error!("Refusing {:?}: larger than the {} byte limit", path, limit);
            // Read the rest so the peer gets the response rather than a reset
            while let Ok(Some(_)) = field.chunk().await {}
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }
        file.write_all(&chunk).await.map_err(|e| {
            error!("Failed to write file data for {:?}: {}", path, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    }

    // Ensure data is flushed to disk
    file.flush().await.map_err(|e| {
        error!("Failed to flush file {:?}: {}", path, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    file.sync_all().await.map_err(|e| {
        error!("Failed to sync file {:?}: {}", path, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(size)
}

/// Keep the file at `path` only if receiving it succeeded.
async fn settle<T>(path: &Path, received: Result<T, StatusCode>) -> Result<T, StatusCode> {
    if received.is_err() {
        discard(path).await;
    }
    received
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove partial file {:?}: {}", path, e);
    }
}

/// Handle 404 errors for API routes
pub async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({
        "error": "API endpoint not found"
    })))
}
