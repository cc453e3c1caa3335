// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Invoice and contact routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Invoice;
use crate::services::xero::{XeroContact, XeroInvoice};
use crate::services::{CreateXeroInvoiceRequest, SyncReport};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/xero/contacts", get(list_contacts))
        .route(
            "/api/xero/invoices",
            get(list_remote_invoices).post(create_xero_invoice),
        )
        .route("/api/xero/invoices/sync", post(sync_invoices))
        .route("/api/invoices", get(list_invoices))
        .route(
            "/api/invoices/{id}",
            get(get_invoice).delete(delete_invoice),
        )
}

// ─── Xero ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ContactsResponse {
    pub success: bool,
    pub contacts: Vec<XeroContact>,
}

async fn list_contacts(State(state): State<Arc<AppState>>) -> Result<Json<ContactsResponse>> {
    let contacts = state.invoice_service.list_contacts().await?;
    Ok(Json(ContactsResponse {
        success: true,
        contacts,
    }))
}

#[derive(Serialize)]
pub struct RemoteInvoicesResponse {
    pub success: bool,
    pub invoices: Vec<XeroInvoice>,
}

async fn list_remote_invoices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RemoteInvoicesResponse>> {
    let invoices = state.invoice_service.list_remote_invoices().await?;
    Ok(Json(RemoteInvoicesResponse {
        success: true,
        invoices,
    }))
}

#[derive(Serialize)]
pub struct CreatedInvoiceResponse {
    pub success: bool,
    pub invoice: XeroInvoice,
}

async fn create_xero_invoice(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateXeroInvoiceRequest>,
) -> Result<Json<CreatedInvoiceResponse>> {
    tracing::info!(user_id = %user.user_id, contact_id = %req.contact_id, "Creating Xero invoice");
    let invoice = state.invoice_service.create_in_xero(req).await?;
    Ok(Json(CreatedInvoiceResponse {
        success: true,
        invoice,
    }))
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: SyncReport,
}

async fn sync_invoices(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SyncResponse>> {
    tracing::info!(user_id = %user.user_id, "User-initiated invoice sync");
    let report = state.invoice_sync.sync_from_remote().await?;
    Ok(Json(SyncResponse {
        success: true,
        report,
    }))
}

// ─── Local invoices ──────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    #[serde(default)]
    include_deleted: bool,
}

#[derive(Serialize)]
pub struct InvoicesResponse {
    pub success: bool,
    pub invoices: Vec<Invoice>,
}

async fn list_invoices(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Json<InvoicesResponse>> {
    let invoices = state.invoice_service.list(params.include_deleted).await?;
    Ok(Json(InvoicesResponse {
        success: true,
        invoices,
    }))
}

async fn get_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>> {
    Ok(Json(state.invoice_service.get(&id).await?))
}

#[derive(Deserialize, Default)]
pub struct DeleteRequest {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub invoice: Invoice,
}

/// Soft delete: the record stays, flagged with who/why/when.
async fn delete_invoice(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<DeleteResponse>> {
    // The body is optional; an empty one means "no reason given".
    let reason = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<DeleteRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
            .reason
    };
    tracing::info!(user_id = %user.user_id, invoice = %id, "Soft-deleting invoice");
    let invoice = state.invoice_service.soft_delete(&id, reason).await?;
    Ok(Json(DeleteResponse {
        success: true,
        invoice,
    }))
}
