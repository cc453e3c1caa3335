// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Xero OAuth connection routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::AppState;

/// The OAuth callback. Xero redirects the browser here, so it carries no
/// session token.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/xero/callback", get(auth_callback))
}

/// Connection management (auth required).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/xero/status", get(status))
        .route("/api/xero/auth-url", get(auth_url))
        .route("/api/xero/disconnect", post(disconnect))
        .route("/api/xero/refresh", post(force_refresh))
}

// ─── Status ──────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatusResponse {
    pub connected: bool,
    pub tenant_id: Option<String>,
    pub expires_at: Option<String>,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = state.tokens.status().await;

    Json(StatusResponse {
        connected: status.connected,
        tenant_id: status.tenant_id,
        expires_at: status.expires_at.map(crate::time_utils::format_utc_rfc3339),
    })
}

// ─── Consent ─────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthUrlResponse {
    pub success: bool,
    pub auth_url: String,
}

/// Consent URL for the frontend to send the browser to.
async fn auth_url(State(state): State<Arc<AppState>>) -> Result<Json<AuthUrlResponse>> {
    let auth_url = state.consent.build_consent_url()?;
    tracing::info!("Issued Xero consent URL");

    Ok(Json(AuthUrlResponse {
        success: true,
        auth_url,
    }))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens and pick the organisation.
///
/// Always redirects back to the frontend; failures travel in `xero_error`.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let frontend_url = state.config.frontend_url.trim_end_matches('/');

    // User declined consent, or Xero reported a problem
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Xero");
        return error_redirect(frontend_url, &format!("Xero authorization failed: {}", error));
    }

    match state
        .consent
        .handle_callback(params.code.as_deref(), params.state.as_deref())
        .await
    {
        Ok(tenant) => {
            tracing::info!(tenant_id = %tenant.tenant_id, "OAuth callback complete");
            Redirect::temporary(&format!("{}/invoices?xero_connected=true", frontend_url))
        }
        Err(e) => {
            tracing::warn!(code = e.code(), error = %e, "OAuth callback failed");
            error_redirect(frontend_url, &callback_error_message(&e))
        }
    }
}

fn error_redirect(frontend_url: &str, message: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}/invoices?xero_error={}",
        frontend_url,
        urlencoding::encode(message)
    ))
}

/// Human-readable message for the redirect. Never includes remote bodies.
fn callback_error_message(e: &AppError) -> String {
    match e {
        AppError::InvalidState => {
            "Authorization session expired or was tampered with. Please try connecting again."
                .to_string()
        }
        AppError::MissingCode => "Xero did not return an authorization code.".to_string(),
        AppError::TokenExchangeFailed(_) => {
            "Could not obtain tokens from Xero. Please try connecting again.".to_string()
        }
        AppError::NoOrganizations => {
            "No Xero organisations are available for this account.".to_string()
        }
        _ => "Failed to connect to Xero.".to_string(),
    }
}

// ─── Disconnect / refresh ────────────────────────────────────

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

async fn disconnect(State(state): State<Arc<AppState>>) -> Result<Json<MessageResponse>> {
    state.consent.disconnect().await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Disconnected from Xero".to_string(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub expires_at: String,
}

async fn force_refresh(State(state): State<Arc<AppState>>) -> Result<Json<RefreshResponse>> {
    let token = state.tokens.force_refresh().await?;

    Ok(Json(RefreshResponse {
        success: true,
        expires_at: crate::time_utils::format_utc_rfc3339(token.expires_at_utc()),
    }))
}
