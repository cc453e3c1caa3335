// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use xero_sync::config::Config;
use xero_sync::db::{FirestoreDb, MemoryDb, Repositories};
use xero_sync::error::AppError;
use xero_sync::models::TokenSet;
use xero_sync::routes::create_router;
use xero_sync::services::xero::{
    NewXeroInvoice, TokenResponse, XeroApi, XeroConnection, XeroContact, XeroContactRef,
    XeroInvoice, INVOICE_PAGE_SIZE,
};
use xero_sync::services::TokenStore;
use xero_sync::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Fake Xero ───────────────────────────────────────────────

/// Scriptable stand-in for the Xero identity and accounting APIs.
#[allow(dead_code)]
pub struct FakeXero {
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub revoke_calls: AtomicUsize,
    pub fail_exchange: AtomicBool,
    pub fail_refresh: AtomicBool,
    pub fail_revoke: AtomicBool,
    /// Every accounting call answers 401.
    pub reject_access: AtomicBool,
    /// Delay inside refresh, to widen race windows.
    pub refresh_delay_ms: AtomicUsize,
    pub exchange_response: Mutex<TokenResponse>,
    /// Responses handed out by refresh in order; numbered tokens once empty.
    pub refresh_responses: Mutex<VecDeque<TokenResponse>>,
    pub connections: Mutex<Vec<XeroConnection>>,
    pub invoices: Mutex<Vec<XeroInvoice>>,
    pub contacts: Mutex<Vec<XeroContact>>,
    pub pages_requested: Mutex<Vec<u32>>,
    pub access_tokens_seen: Mutex<Vec<String>>,
    pub revoked: Mutex<Vec<String>>,
    pub created: Mutex<Vec<NewXeroInvoice>>,
}

impl Default for FakeXero {
    fn default() -> Self {
        Self {
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
            fail_exchange: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            fail_revoke: AtomicBool::new(false),
            reject_access: AtomicBool::new(false),
            refresh_delay_ms: AtomicUsize::new(0),
            exchange_response: Mutex::new(token_response("access-1", "refresh-1")),
            refresh_responses: Mutex::new(VecDeque::new()),
            connections: Mutex::new(vec![connection("tenant-1", "Demo Company")]),
            invoices: Mutex::new(Vec::new()),
            contacts: Mutex::new(Vec::new()),
            pages_requested: Mutex::new(Vec::new()),
            access_tokens_seen: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
        }
    }
}

#[allow(dead_code)]
impl FakeXero {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn queue_refresh(&self, access: &str, refresh: &str) {
        self.refresh_responses
            .lock()
            .unwrap()
            .push_back(token_response(access, refresh));
    }

    pub fn set_invoices(&self, invoices: Vec<XeroInvoice>) {
        *self.invoices.lock().unwrap() = invoices;
    }

    fn check_access(&self, access_token: &str) -> Result<(), AppError> {
        self.access_tokens_seen
            .lock()
            .unwrap()
            .push(access_token.to_string());
        if self.reject_access.load(Ordering::SeqCst) {
            return Err(AppError::reconnect());
        }
        Ok(())
    }
}

#[async_trait]
impl XeroApi for FakeXero {
    async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, AppError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_exchange.load(Ordering::SeqCst) {
            return Err(AppError::XeroApi {
                status: 400,
                body: "{\"error\":\"invalid_grant\"}".to_string(),
            });
        }
        Ok(self.exchange_response.lock().unwrap().clone())
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenResponse, AppError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = self.refresh_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
        }

        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AppError::XeroApi {
                status: 400,
                body: "{\"error\":\"invalid_grant\"}".to_string(),
            });
        }

        let queued = self.refresh_responses.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| {
            token_response(&format!("refreshed-{}", n), &format!("refresh-{}", n + 1))
        }))
    }

    async fn revoke_token(&self, token: &str) -> Result<(), AppError> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        self.revoked.lock().unwrap().push(token.to_string());
        if self.fail_revoke.load(Ordering::SeqCst) {
            return Err(AppError::XeroApi {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn connections(&self, access_token: &str) -> Result<Vec<XeroConnection>, AppError> {
        self.check_access(access_token)?;
        Ok(self.connections.lock().unwrap().clone())
    }

    async fn list_invoices(
        &self,
        access_token: &str,
        _tenant_id: &str,
        page: u32,
    ) -> Result<Vec<XeroInvoice>, AppError> {
        self.check_access(access_token)?;
        self.pages_requested.lock().unwrap().push(page);

        let all = self.invoices.lock().unwrap();
        Ok(all
            .iter()
            .skip((page as usize - 1) * INVOICE_PAGE_SIZE)
            .take(INVOICE_PAGE_SIZE)
            .cloned()
            .collect())
    }

    async fn list_contacts(
        &self,
        access_token: &str,
        _tenant_id: &str,
    ) -> Result<Vec<XeroContact>, AppError> {
        self.check_access(access_token)?;
        Ok(self.contacts.lock().unwrap().clone())
    }

    async fn create_invoice(
        &self,
        access_token: &str,
        _tenant_id: &str,
        invoice: &NewXeroInvoice,
    ) -> Result<XeroInvoice, AppError> {
        self.check_access(access_token)?;
        let mut created = self.created.lock().unwrap();
        created.push(invoice.clone());

        Ok(XeroInvoice {
            invoice_id: format!("created-{}", created.len()),
            invoice_number: invoice.invoice_number.clone(),
            r#type: Some(invoice.r#type.clone()),
            contact: Some(XeroContactRef {
                contact_id: invoice.contact.contact_id.clone(),
                name: Some("Acme Demolition".to_string()),
            }),
            status: invoice.status.clone(),
            total: invoice
                .line_items
                .iter()
                .filter_map(|item| item.unit_amount)
                .sum(),
            ..Default::default()
        })
    }
}

// ─── Builders ────────────────────────────────────────────────

#[allow(dead_code)]
pub fn token_response(access: &str, refresh: &str) -> TokenResponse {
    TokenResponse {
        access_token: Some(access.to_string()),
        refresh_token: Some(refresh.to_string()),
        expires_in: 1800,
        token_type: Some("Bearer".to_string()),
        scope: Some("offline_access accounting.transactions".to_string()),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn connection(tenant_id: &str, name: &str) -> XeroConnection {
    XeroConnection {
        id: format!("conn-{}", tenant_id),
        tenant_id: tenant_id.to_string(),
        tenant_type: Some("ORGANISATION".to_string()),
        tenant_name: Some(name.to_string()),
    }
}

/// A token set that expires at `expires_at`.
#[allow(dead_code)]
pub fn token_expiring(access: &str, refresh: &str, expires_at: DateTime<Utc>) -> TokenSet {
    TokenSet {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_in: 1800,
        expires_at: Some(expires_at.timestamp_millis()),
        token_type: "Bearer".to_string(),
        scope: String::new(),
        id_token: None,
        session_state: None,
        tenant_id: None,
    }
}

#[allow(dead_code)]
pub fn remote_invoice(id: &str, number: &str, status: &str, total: f64) -> XeroInvoice {
    XeroInvoice {
        invoice_id: id.to_string(),
        invoice_number: Some(number.to_string()),
        r#type: Some("ACCREC".to_string()),
        contact: Some(XeroContactRef {
            contact_id: Some("contact-1".to_string()),
            name: Some("Acme Demolition".to_string()),
        }),
        date_string: Some("2024-03-01T00:00:00".to_string()),
        due_date_string: Some("2024-03-31T00:00:00".to_string()),
        status: status.to_string(),
        total,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn token_store(db: &Arc<MemoryDb>, xero: &Arc<FakeXero>) -> TokenStore {
    TokenStore::new(db.clone(), xero.clone())
}

/// App state over in-memory storage and the given fake.
#[allow(dead_code)]
pub fn test_state(xero: &Arc<FakeXero>) -> (Arc<AppState>, Arc<MemoryDb>) {
    let db = Arc::new(MemoryDb::new());
    let state = Arc::new(AppState::new(
        Config::default(),
        Repositories::from_backend(db.clone()),
        xero.clone(),
    ));
    (state, db)
}

/// Store a fresh token and select a tenant, as a completed callback would.
#[allow(dead_code)]
pub async fn connect(state: &AppState, access: &str) {
    let token = token_expiring(access, "refresh-0", Utc::now() + chrono::Duration::minutes(30));
    state.tokens.write(token).await.unwrap();
    state
        .tokens
        .set_tenant_id("tenant-1", Some("Demo Company".to_string()))
        .await
        .unwrap();
}

/// Create a test app with in-memory storage.
/// Returns the router, the shared state and the fake Xero.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<FakeXero>) {
    let xero = FakeXero::new();
    let (state, _db) = test_state(&xero);
    (create_router(state.clone()), state, xero)
}
