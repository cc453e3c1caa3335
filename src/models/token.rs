// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token set and tenant selection.
//!
//! Field names are camelCase so the legacy token file deserializes as-is.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The only token type Xero issues.
pub const BEARER: &str = "Bearer";

/// The live Xero credential bundle. At most one exists at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds as reported by the token endpoint
    #[serde(default)]
    pub expires_in: i64,
    /// Absolute expiry, epoch milliseconds. Derived on write when absent.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Space-delimited granted scopes
    #[serde(default)]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

fn default_token_type() -> String {
    BEARER.to_string()
}

impl TokenSet {
    /// Fill in derived fields relative to `now`.
    pub fn normalize(&mut self, now: DateTime<Utc>) {
        if self.expires_at.is_none() {
            // Absurd lifetimes saturate (and read as expired) instead of overflowing.
            let lifetime_ms = self.expires_in.saturating_mul(1000);
            self.expires_at = Some(now.timestamp_millis().saturating_add(lifetime_ms));
        }
        self.token_type = BEARER.to_string();
    }

    /// Expiry as a timestamp. A missing or out-of-range value counts as expired.
    pub fn expires_at_utc(&self) -> DateTime<Utc> {
        self.expires_at
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// True when the token expires before `now + margin`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at_utc() < now + margin
    }

    /// True when the token has already expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at_utc() <= now
    }
}

/// The Xero organisation used for API calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSelection {
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_at: Option<String>,
}
