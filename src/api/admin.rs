//! Admin routes. Every handler turns the `x-admin-password` header into an
//! `AdminCapability`; the services refuse the call when it is denied.

use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use log::info;
use serde::Deserialize;

use crate::api::admin_from;
use crate::app_state::AppState;
use crate::error::VaultError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CleanupQuery {
    pub days: Option<i64>,
}

#[get("/admin/users")]
pub async fn list_users(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, VaultError> {
    let accounts = state.account_service.list_accounts(admin_from(&req, &state)).await?;
    Ok(HttpResponse::Ok().json(accounts))
}

#[get("/admin/pending-users")]
pub async fn pending_users(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, VaultError> {
    let accounts = state.account_service.pending_accounts(admin_from(&req, &state)).await?;
    Ok(HttpResponse::Ok().json(accounts))
}

#[post("/admin/approve/{owner}")]
pub async fn approve_user(
    path: web::Path<String>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VaultError> {
    let owner = path.into_inner();
    log_mdc::insert("owner", &owner);
    let summary = state
        .account_service
        .approve(&owner, admin_from(&req, &state))
        .await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[delete("/admin/users/{owner}")]
pub async fn delete_user(
    path: web::Path<String>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VaultError> {
    let owner = path.into_inner();
    log_mdc::insert("owner", &owner);
    let entry = state
        .trash_service
        .trash_account(&owner, admin_from(&req, &state), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "trashed": entry.name() })))
}

/// Purge trash entries at least `days` old, the configured retention by default
#[post("/admin/cleanup-trash")]
pub async fn cleanup_trash(
    query: web::Query<CleanupQuery>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VaultError> {
    let window = match query.days {
        Some(days) => Duration::try_days(days).ok_or_else(|| VaultError::invalid("Invalid days"))?,
        None => state.trash_service.retention(),
    };
    let removed = state
        .trash_service
        .sweep(admin_from(&req, &state), window, Utc::now())
        .await?;
    info!("Trash cleanup removed {} entries", removed);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "removed": removed })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_users)
        .service(pending_users)
        .service(approve_user)
        .service(delete_user)
        .service(cleanup_trash);
}
