// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Xero identity and accounting API client.
//!
//! Handles:
//! - Authorization code exchange, refresh and revocation
//! - Tenant (connection) listing
//! - Receivable invoice listing (paged) and creation
//! - Contact listing
//! - 401 mapping to "please reconnect"

use crate::config::Config;
use crate::error::AppError;
use crate::models::TokenSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Xero returns at most this many invoices per page.
pub const INVOICE_PAGE_SIZE: usize = 100;

/// Invoice type for accounts receivable (sales invoices).
pub const ACCREC: &str = "ACCREC";

/// Remote operations the service needs from Xero.
#[async_trait]
pub trait XeroApi: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError>;

    async fn revoke_token(&self, token: &str) -> Result<(), AppError>;

    /// Organisations the access token may act on.
    async fn connections(&self, access_token: &str) -> Result<Vec<XeroConnection>, AppError>;

    /// One page (1-based) of receivable invoices.
    async fn list_invoices(
        &self,
        access_token: &str,
        tenant_id: &str,
        page: u32,
    ) -> Result<Vec<XeroInvoice>, AppError>;

    async fn list_contacts(
        &self,
        access_token: &str,
        tenant_id: &str,
    ) -> Result<Vec<XeroContact>, AppError>;

    async fn create_invoice(
        &self,
        access_token: &str,
        tenant_id: &str,
        invoice: &NewXeroInvoice,
    ) -> Result<XeroInvoice, AppError>;
}

/// Xero API client.
#[derive(Clone)]
pub struct XeroClient {
    http: reqwest::Client,
    identity_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl XeroClient {
    /// Create a new Xero client with OAuth credentials.
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            identity_url: config.xero_identity_url.trim_end_matches('/').to_string(),
            api_url: config.xero_api_url.trim_end_matches('/').to_string(),
            client_id: config.xero_client_id.clone(),
            client_secret: config.xero_client_secret.clone(),
            redirect_uri: config.xero_redirect_uri.clone(),
        }
    }

    fn token_url(&self) -> String {
        format!("{}/connect/token", self.identity_url)
    }

    fn accounting_url(&self, resource: &str) -> String {
        format!("{}/api.xro/2.0/{}", self.api_url, resource)
    }

    /// POST a form to the token endpoint with client credentials.
    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(self.token_url())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(transport_error)?;

        check_response_json(response).await
    }

    /// Generic tenant-scoped GET with JSON response.
    async fn get_tenant_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        tenant_id: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header("xero-tenant-id", tenant_id)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        check_response_json(response).await
    }
}

#[async_trait]
impl XeroApi for XeroClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// Revoking the refresh token invalidates the whole grant, including
    /// any access token issued from it.
    async fn revoke_token(&self, token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/connect/revocation", self.identity_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("token", token)])
            .send()
            .await
            .map_err(transport_error)?;

        check_response(response).await?;
        tracing::info!("Xero token revoked");
        Ok(())
    }

    async fn connections(&self, access_token: &str) -> Result<Vec<XeroConnection>, AppError> {
        let response = self
            .http
            .get(format!("{}/connections", self.api_url))
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        check_response_json(response).await
    }

    async fn list_invoices(
        &self,
        access_token: &str,
        tenant_id: &str,
        page: u32,
    ) -> Result<Vec<XeroInvoice>, AppError> {
        let envelope: InvoicesEnvelope = self
            .get_tenant_json(
                &self.accounting_url("Invoices"),
                access_token,
                tenant_id,
                &[
                    ("where", format!("Type==\"{}\"", ACCREC)),
                    ("page", page.to_string()),
                ],
            )
            .await?;
        Ok(envelope.invoices)
    }

    async fn list_contacts(
        &self,
        access_token: &str,
        tenant_id: &str,
    ) -> Result<Vec<XeroContact>, AppError> {
        let envelope: ContactsEnvelope = self
            .get_tenant_json(&self.accounting_url("Contacts"), access_token, tenant_id, &[])
            .await?;
        Ok(envelope.contacts)
    }

    async fn create_invoice(
        &self,
        access_token: &str,
        tenant_id: &str,
        invoice: &NewXeroInvoice,
    ) -> Result<XeroInvoice, AppError> {
        let body = serde_json::json!({ "Invoices": [invoice] });

        let response = self
            .http
            .post(self.accounting_url("Invoices"))
            .bearer_auth(access_token)
            .header("xero-tenant-id", tenant_id)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let envelope: InvoicesEnvelope = check_response_json(response).await?;
        envelope.invoices.into_iter().next().ok_or_else(|| AppError::XeroApi {
            status: 200,
            body: "Xero returned no invoice".to_string(),
        })
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    AppError::XeroApi {
        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
        body: format!("Request to Xero failed: {}", e),
    }
}

/// Map a non-success response to an error, keeping the body for diagnostics.
async fn error_from_response(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    // Unauthorized - token revoked or expired
    if status.as_u16() == 401 {
        return AppError::reconnect();
    }

    if status.as_u16() == 429 {
        tracing::warn!("Xero rate limit hit (429)");
    }

    AppError::XeroApi {
        status: status.as_u16(),
        body,
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<(), AppError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(error_from_response(response).await)
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let status = response.status().as_u16();
    response.json().await.map_err(|e| AppError::XeroApi {
        status,
        body: format!("JSON parse error: {}", e),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

/// Token endpoint response. Credentials are optional here so a malformed
/// response can be told apart from a transport failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub session_state: Option<String>,
}

impl TokenResponse {
    /// Convert to a token set. Fails if either credential is missing or empty.
    pub fn into_token_set(self) -> Result<TokenSet, String> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or("response is missing access_token")?;
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or("response is missing refresh_token")?;

        Ok(TokenSet {
            access_token,
            refresh_token,
            expires_in: self.expires_in,
            expires_at: None,
            token_type: crate::models::token::BEARER.to_string(),
            scope: self.scope.unwrap_or_default(),
            id_token: self.id_token,
            session_state: self.session_state,
            tenant_id: None,
        })
    }
}

/// An organisation the user granted access to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XeroConnection {
    #[serde(default)]
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_type: Option<String>,
    #[serde(default)]
    pub tenant_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XeroContactRef {
    #[serde(rename = "ContactID", default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XeroLineItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_amount: Option<f64>,
}

/// Invoice as returned by the accounting API.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XeroInvoice {
    #[serde(rename = "InvoiceID")]
    pub invoice_id: String,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub contact: Option<XeroContactRef>,
    #[serde(default)]
    pub date_string: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub due_date_string: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub line_items: Vec<XeroLineItem>,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub amount_due: Option<f64>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl XeroInvoice {
    /// Issue date, preferring `DateString`.
    pub fn issue_date(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.date_string
            .as_deref()
            .or(self.date.as_deref())
            .and_then(crate::time_utils::parse_xero_date)
    }

    pub fn due(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.due_date_string
            .as_deref()
            .or(self.due_date.as_deref())
            .and_then(crate::time_utils::parse_xero_date)
    }

    /// Description of the first line item.
    pub fn first_line_description(&self) -> Option<String> {
        self.line_items
            .first()
            .and_then(|item| item.description.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XeroContact {
    #[serde(rename = "ContactID")]
    pub contact_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub contact_status: Option<String>,
    #[serde(default)]
    pub is_customer: Option<bool>,
}

/// Body of an invoice create request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewXeroInvoice {
    pub r#type: String,
    pub contact: XeroContactRef,
    pub line_items: Vec<XeroLineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    pub status: String,
}

#[derive(Deserialize)]
struct InvoicesEnvelope {
    #[serde(rename = "Invoices", default)]
    invoices: Vec<XeroInvoice>,
}

#[derive(Deserialize)]
struct ContactsEnvelope {
    #[serde(rename = "Contacts", default)]
    contacts: Vec<XeroContact>,
}
