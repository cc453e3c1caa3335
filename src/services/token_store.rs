// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Xero token lifecycle: storage, refresh gate and tenant selection.

use crate::db::TokenRepository;
use crate::error::AppError;
use crate::models::{TenantSelection, TokenSet};
use crate::services::xero::XeroApi;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Connection details reported to the frontend.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub tenant_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Token and tenant for one API call.
#[derive(Debug, Clone)]
pub struct XeroConnectionContext {
    pub access_token: String,
    pub tenant_id: String,
}

/// Owns the single live Xero token set.
///
/// This service encapsulates:
/// - Reading tokens, refreshing them when within 5 minutes of expiry
/// - Replacing tokens on write (never merging)
/// - The selected tenant, cached in memory after first read
/// - A refresh lock so concurrent readers issue one refresh between them
pub struct TokenStore {
    repo: Arc<dyn TokenRepository>,
    xero: Arc<dyn XeroApi>,
    /// `None` until first read; `Some(None)` caches "no tenant selected".
    tenant_cache: RwLock<Option<Option<String>>>,
    refresh_lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(repo: Arc<dyn TokenRepository>, xero: Arc<dyn XeroApi>) -> Self {
        Self {
            repo,
            xero,
            tenant_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    // ─── Reading ─────────────────────────────────────────────────────────────

    /// Current token set, refreshed if it is about to expire.
    ///
    /// `None` means "not connected": nothing stored, the store failed, or the
    /// refresh was rejected. The caller should prompt for re-authentication.
    pub async fn read(&self) -> Option<TokenSet> {
        self.read_at(Utc::now()).await
    }

    /// [`read`](Self::read) evaluated at `now`.
    pub async fn read_at(&self, now: DateTime<Utc>) -> Option<TokenSet> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        let token = self.load().await?;
        if !token.expires_within(now, margin) {
            return Some(token);
        }

        // One refresh at a time. Whoever waited re-reads and usually finds the
        // token the previous holder stored.
        let _guard = self.refresh_lock.lock().await;

        let token = self.load().await?;
        if !token.expires_within(now, margin) {
            return Some(token);
        }

        tracing::info!("Xero access token near expiry, refreshing");
        match self.refresh_and_store(&token, now).await {
            Ok(refreshed) => Some(refreshed),
            Err(e) => {
                tracing::warn!(error = %e, "Xero token refresh failed, re-authentication required");
                None
            }
        }
    }

    /// Stored token without refreshing. Errors are swallowed.
    async fn load(&self) -> Option<TokenSet> {
        match self.repo.get_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load Xero token");
                None
            }
        }
    }

    /// Stored token without refreshing. Used by disconnect and status.
    pub async fn peek(&self) -> Option<TokenSet> {
        self.load().await
    }

    async fn refresh_and_store(
        &self,
        current: &TokenSet,
        now: DateTime<Utc>,
    ) -> Result<TokenSet, AppError> {
        let response = self.xero.refresh_token(&current.refresh_token).await?;
        let mut refreshed = response
            .into_token_set()
            .map_err(|msg| AppError::XeroAuthRequired(format!("Token refresh failed: {}", msg)))?;
        refreshed.tenant_id = current.tenant_id.clone();

        self.write_at(refreshed, now).await
    }

    /// Refresh regardless of expiry.
    pub async fn force_refresh(&self) -> Result<TokenSet, AppError> {
        let _guard = self.refresh_lock.lock().await;

        let token = self
            .repo
            .get_token()
            .await?
            .ok_or(AppError::NotConnected)?;

        self.refresh_and_store(&token, Utc::now()).await
    }

    // ─── Writing ─────────────────────────────────────────────────────────────

    /// Replace the stored token set.
    pub async fn write(&self, token: TokenSet) -> Result<TokenSet, AppError> {
        self.write_at(token, Utc::now()).await
    }

    /// [`write`](Self::write) with `expiresAt` derived from `now` when absent.
    pub async fn write_at(
        &self,
        mut token: TokenSet,
        now: DateTime<Utc>,
    ) -> Result<TokenSet, AppError> {
        if token.access_token.is_empty() {
            return Err(AppError::Validation("accessToken is required".to_string()));
        }
        if token.refresh_token.is_empty() {
            return Err(AppError::Validation("refreshToken is required".to_string()));
        }

        token.normalize(now);
        self.repo.put_token(&token).await?;
        tracing::debug!(expires_at = ?token.expires_at, "Xero token stored");
        Ok(token)
    }

    /// Remove the token set and the tenant selection.
    pub async fn delete_all(&self) -> Result<(), AppError> {
        self.repo.delete_tokens().await?;
        self.repo.delete_tenant().await?;
        *self.tenant_cache.write().await = Some(None);
        Ok(())
    }

    // ─── Tenant ──────────────────────────────────────────────────────────────

    /// Selected organisation, cached after the first read.
    pub async fn get_tenant_id(&self) -> Option<String> {
        if let Some(cached) = self.tenant_cache.read().await.as_ref() {
            return cached.clone();
        }

        let tenant = match self.repo.get_tenant().await {
            Ok(Some(selection)) => Some(selection.tenant_id),
            Ok(None) => self.load().await.and_then(|t| t.tenant_id),
            Err(e) => {
                // Not cached, so the next call tries again.
                tracing::warn!(error = %e, "Failed to load Xero tenant");
                return None;
            }
        };

        *self.tenant_cache.write().await = Some(tenant.clone());
        tenant
    }

    pub async fn set_tenant_id(
        &self,
        tenant_id: &str,
        tenant_name: Option<String>,
    ) -> Result<(), AppError> {
        let selection = TenantSelection {
            tenant_id: tenant_id.to_string(),
            tenant_name,
            selected_at: Some(format_utc_rfc3339(Utc::now())),
        };
        self.repo.put_tenant(&selection).await?;
        *self.tenant_cache.write().await = Some(Some(tenant_id.to_string()));
        tracing::info!(tenant_id, "Xero tenant selected");
        Ok(())
    }

    /// Forget the selected organisation, e.g. after a consent with none.
    pub async fn clear_tenant(&self) -> Result<(), AppError> {
        self.repo.delete_tenant().await?;
        *self.tenant_cache.write().await = Some(None);
        Ok(())
    }

    // ─── Connection checks ───────────────────────────────────────────────────

    /// Valid token and active tenant, or the reason there isn't one.
    pub async fn require_connection(&self) -> Result<XeroConnectionContext, AppError> {
        let Some(token) = self.read().await else {
            // Distinguish "never connected" from "connection went bad".
            return Err(if self.peek().await.is_some() {
                AppError::reconnect()
            } else {
                AppError::NotConnected
            });
        };

        let tenant_id = self.get_tenant_id().await.ok_or(AppError::NotConnected)?;

        Ok(XeroConnectionContext {
            access_token: token.access_token,
            tenant_id,
        })
    }

    pub async fn status(&self) -> ConnectionStatus {
        let now = Utc::now();
        let token = self.read_at(now).await;
        let tenant_id = self.get_tenant_id().await;

        let connected = token
            .as_ref()
            .is_some_and(|t| !t.is_expired(now))
            && tenant_id.is_some();

        ConnectionStatus {
            connected,
            expires_at: token.map(|t| t.expires_at_utc()),
            tenant_id,
        }
    }
}
