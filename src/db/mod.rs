//! Database layer.
//!
//! Services talk to storage through the repository traits below. Firestore
//! is the production backend; `MemoryDb` backs local development and tests.

pub mod firestore;
pub mod legacy;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Invoice, TenantSelection, TokenSet};
use async_trait::async_trait;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const XERO_TOKENS: &str = "xerotokens";
    pub const XERO_TENANT: &str = "xerotenant";
    pub const INVOICES: &str = "invoices";
}

/// Document ID of the single live token set (and tenant selection).
pub const SINGLETON_DOC_ID: &str = "current";

/// Storage for the singleton Xero token set and tenant selection.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn get_token(&self) -> Result<Option<TokenSet>, AppError>;

    /// Replace the stored token set in a single write.
    async fn put_token(&self, token: &TokenSet) -> Result<(), AppError>;

    async fn delete_tokens(&self) -> Result<(), AppError>;

    async fn get_tenant(&self) -> Result<Option<TenantSelection>, AppError>;

    async fn put_tenant(&self, tenant: &TenantSelection) -> Result<(), AppError>;

    async fn delete_tenant(&self) -> Result<(), AppError>;
}

/// Storage for local invoices.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, AppError>;

    /// Look up the invoice linked to a Xero invoice.
    async fn find_by_xero_id(&self, xero_invoice_id: &str) -> Result<Option<Invoice>, AppError>;

    /// Insert or overwrite an invoice keyed by its local ID.
    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;

    /// All invoices, newest first. Soft-deleted ones only when asked.
    async fn list_invoices(&self, include_deleted: bool) -> Result<Vec<Invoice>, AppError>;
}

/// Both repositories, split out of one backend.
#[derive(Clone)]
pub struct Repositories {
    pub tokens: Arc<dyn TokenRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
}

impl Repositories {
    pub fn from_backend<D>(backend: Arc<D>) -> Self
    where
        D: TokenRepository + InvoiceRepository + 'static,
    {
        Self {
            tokens: backend.clone(),
            invoices: backend,
        }
    }
}

/// Newest first, by invoice date then creation time.
pub(crate) fn sort_newest_first(invoices: &mut [Invoice]) {
    invoices.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}
