//! HTTP routes
//!
//! Handlers stay thin: they pull identifiers out of the request, hand them to
//! the services held in `AppState` and turn the result into a response.
//! Errors are rendered by `VaultError`'s `ResponseError` impl.

pub mod admin;

use actix_web::http::header;
use actix_web::{get, post, delete, web, HttpRequest, HttpResponse};
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::{VaultError, VaultResult};
use crate::service::account_service::{Credentials, Registration};
use crate::service::admin::AdminCapability;
use crate::service::user_context::UserContext;
use crate::storage::{detect_content_type, Download};

/// Header carrying the admin password
pub const ADMIN_HEADER: &str = "x-admin-password";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    name: String,
    size: u64,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignedUrlQuery {
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub viewer: Option<String>,
}

pub(crate) fn admin_from(req: &HttpRequest, state: &AppState) -> AdminCapability {
    let presented = req.headers().get(ADMIN_HEADER).and_then(|v| v.to_str().ok());
    state.admin_capability(presented)
}

fn tag_owner(owner: &str) {
    log_mdc::insert("owner", owner);
}

/// Drain the request body, refusing anything past `limit` bytes
async fn read_body(mut payload: web::Payload, limit: usize) -> VaultResult<BytesMut> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            warn!("Error reading payload chunk: {}", e);
            VaultError::invalid("Error reading payload")
        })?;
        if body.len() + chunk.len() > limit {
            warn!("Upload exceeds {} bytes", limit);
            return Err(VaultError::invalid("Payload too large"));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[post("/register")]
pub async fn register(
    body: web::Json<Registration>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VaultError> {
    let summary = state.account_service.register(&body).await?;
    Ok(HttpResponse::Created().json(summary))
}

#[post("/login")]
pub async fn login(
    body: web::Json<Credentials>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VaultError> {
    let summary = state.account_service.login(&body).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[post("/upload/{owner}/{file}")]
pub async fn upload(
    path: web::Path<(String, String)>,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VaultError> {
    let (owner, file) = path.into_inner();
    tag_owner(&owner);

    debug!("Starting upload of {}/{}", owner, file);
    let body = read_body(payload, state.config.server.max_payload_size).await?;
    if body.is_empty() {
        warn!("No data uploaded for {}/{}", owner, file);
        return Err(VaultError::invalid("No data was uploaded"));
    }

    let record = state.storage_service.upload(&owner, &file, body.freeze()).await?;
    info!("Upload of {}/{} complete ({} bytes)", owner, file, record.size);
    Ok(HttpResponse::Created().json(UploadedFile {
        name: file,
        size: record.size,
        created_at: record.created_at,
        etag: record.etag,
        link: record.link,
    }))
}

#[get("/upload/signed-url/{owner}")]
pub async fn signed_upload_url(
    path: web::Path<String>,
    query: web::Query<SignedUrlQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VaultError> {
    let owner = path.into_inner();
    tag_owner(&owner);

    let file = query
        .filename
        .as_deref()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| VaultError::invalid("Missing filename"))?;
    let content_type = query.content_type.as_deref().unwrap_or_default();

    let authorization = state
        .storage_service
        .authorize_upload(&owner, file, content_type)
        .await?;
    Ok(HttpResponse::Ok().json(authorization))
}

#[get("/download/{owner}/{file}")]
pub async fn download(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VaultError> {
    let (owner, file) = path.into_inner();
    tag_owner(&owner);

    match state.storage_service.download(&owner, &file).await? {
        Download::Bytes(data) => Ok(HttpResponse::Ok()
            .content_type(detect_content_type(&file))
            .insert_header((header::CONTENT_DISPOSITION, format!("inline; filename=\"{}\"", file)))
            .body(data)),
        Download::Redirect(url) => Ok(HttpResponse::Found()
            .insert_header((header::LOCATION, url))
            .finish()),
    }
}

#[get("/files/{owner}")]
pub async fn list_files(
    path: web::Path<String>,
    query: web::Query<ListQuery>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VaultError> {
    let owner = path.into_inner();
    tag_owner(&owner);

    let mut context = UserContext::with_viewer(owner, query.into_inner().viewer);
    if let Some(peer) = req.peer_addr() {
        context.set_metadata("peer".to_string(), peer.to_string());
    }
    let files = state.storage_service.list_files(&context).await?;
    Ok(HttpResponse::Ok().json(files))
}

#[delete("/files/{owner}/{file}")]
pub async fn delete_file(
    path: web::Path<(String, String)>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VaultError> {
    let (owner, file) = path.into_inner();
    tag_owner(&owner);

    let admin = admin_from(&req, &state);
    let entry = state
        .trash_service
        .trash_file(&owner, &file, admin, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "trashed": entry.name() })))
}

/// Register every route on an actix app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(register)
        .service(login)
        .service(signed_upload_url)
        .service(upload)
        .service(download)
        .service(list_files)
        .service(delete_file);
    admin::configure(cfg);
}
