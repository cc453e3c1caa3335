// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Xero OAuth consent flow.
//!
//! `UNAUTHENTICATED → AWAITING_CALLBACK → AUTHENTICATED`. Each consent URL
//! carries its own state token, so several users can be mid-authorization at
//! once. A state token is accepted once and expires after ten minutes.

use crate::config::Config;
use crate::error::AppError;
use crate::services::token_store::TokenStore;
use crate::services::xero::XeroApi;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// How long a consent URL stays usable.
const STATE_TTL_MINUTES: i64 = 10;

/// Bytes of randomness in a state token.
const STATE_BYTES: usize = 32;

/// Where the consent flow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentPhase {
    Unauthenticated,
    AwaitingCallback,
    Authenticated,
}

/// Result of a completed callback.
#[derive(Debug, Clone)]
pub struct ConnectedTenant {
    pub tenant_id: String,
    pub tenant_name: Option<String>,
}

pub struct ConsentFlow {
    xero: Arc<dyn XeroApi>,
    tokens: Arc<TokenStore>,
    rng: SystemRandom,
    client_id: String,
    redirect_uri: String,
    scopes: String,
    authorize_url: String,
    /// State token → time issued
    pending: DashMap<String, DateTime<Utc>>,
}

impl ConsentFlow {
    pub fn new(config: &Config, xero: Arc<dyn XeroApi>, tokens: Arc<TokenStore>) -> Self {
        Self {
            xero,
            tokens,
            rng: SystemRandom::new(),
            client_id: config.xero_client_id.clone(),
            redirect_uri: config.xero_redirect_uri.clone(),
            scopes: config.xero_scopes.clone(),
            authorize_url: format!(
                "{}/identity/connect/authorize",
                config.xero_login_url.trim_end_matches('/')
            ),
            pending: DashMap::new(),
        }
    }

    /// Issue a fresh random state token and remember it.
    pub fn generate_state(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; STATE_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;

        let state = URL_SAFE_NO_PAD.encode(bytes);
        let now = Utc::now();
        self.prune_expired(now);
        self.pending.insert(state.clone(), now);
        Ok(state)
    }

    /// Authorization URL with a newly generated state.
    pub fn build_consent_url(&self) -> Result<String, AppError> {
        let state = self.generate_state()?;

        Ok(format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scopes),
            state
        ))
    }

    fn prune_expired(&self, now: DateTime<Utc>) {
        let ttl = Duration::minutes(STATE_TTL_MINUTES);
        self.pending.retain(|_, issued| now - *issued < ttl);
    }

    /// Consume a state token. False if unknown, already used or expired.
    fn take_state(&self, state: &str, now: DateTime<Utc>) -> bool {
        match self.pending.remove(state) {
            Some((_, issued)) => now - issued < Duration::minutes(STATE_TTL_MINUTES),
            None => false,
        }
    }

    /// Complete the authorization: verify state, exchange the code, store
    /// tokens and select the first organisation.
    pub async fn handle_callback(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<ConnectedTenant, AppError> {
        let now = Utc::now();

        // 1. CSRF check
        let state_ok = state.is_some_and(|s| !s.is_empty() && self.take_state(s, now));
        if !state_ok {
            tracing::warn!("OAuth callback with unknown or expired state");
            return Err(AppError::InvalidState);
        }

        // 2. Code present
        let code = code
            .filter(|c| !c.is_empty())
            .ok_or(AppError::MissingCode)?;

        // 3. Exchange
        tracing::info!("Exchanging Xero authorization code for tokens");
        let response = self.xero.exchange_code(code).await.map_err(|e| {
            tracing::error!(error = %e, "Xero token exchange failed");
            AppError::TokenExchangeFailed(e.to_string())
        })?;
        let token_set = response
            .into_token_set()
            .map_err(AppError::TokenExchangeFailed)?;

        // 4. Persist
        let token_set = self.tokens.write(token_set).await?;

        // 5. Organisation
        let connections = self.xero.connections(&token_set.access_token).await?;
        let Some(first) = connections.into_iter().next() else {
            // The new grant must not be paired with a previously selected tenant
            self.tokens.clear_tenant().await?;
            tracing::warn!("Xero consent granted no organisations");
            return Err(AppError::NoOrganizations);
        };

        self.tokens
            .set_tenant_id(&first.tenant_id, first.tenant_name.clone())
            .await?;

        tracing::info!(
            tenant_id = %first.tenant_id,
            tenant_name = ?first.tenant_name,
            "Xero connected"
        );

        Ok(ConnectedTenant {
            tenant_id: first.tenant_id,
            tenant_name: first.tenant_name,
        })
    }

    /// Revoke remotely (best effort), then clear everything local.
    pub async fn disconnect(&self) -> Result<(), AppError> {
        if let Some(token) = self.tokens.peek().await {
            if let Err(e) = self.xero.revoke_token(&token.refresh_token).await {
                tracing::warn!(error = %e, "Xero token revocation failed, clearing local tokens anyway");
            }
        }

        self.pending.clear();
        self.tokens.delete_all().await?;
        tracing::info!("Xero disconnected");
        Ok(())
    }

    pub async fn phase(&self) -> ConsentPhase {
        if self.tokens.peek().await.is_some() {
            return ConsentPhase::Authenticated;
        }
        self.prune_expired(Utc::now());
        if self.pending.is_empty() {
            ConsentPhase::Unauthenticated
        } else {
            ConsentPhase::AwaitingCallback
        }
    }
}
