// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process storage backend.
//!
//! Same semantics as Firestore: the token set and tenant are singletons,
//! invoices are keyed by local ID. Data is lost on restart.

use crate::db::{sort_newest_first, InvoiceRepository, TokenRepository};
use crate::error::AppError;
use crate::models::{Invoice, TenantSelection, TokenSet};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryDb {
    token: RwLock<Option<TokenSet>>,
    tenant: RwLock<Option<TenantSelection>>,
    invoices: DashMap<String, Invoice>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored token sets (zero or one).
    pub fn token_count(&self) -> usize {
        self.token.read().map(|t| usize::from(t.is_some())).unwrap_or(0)
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.len()
    }
}

fn poisoned() -> AppError {
    AppError::Database("In-memory store lock poisoned".to_string())
}

#[async_trait]
impl TokenRepository for MemoryDb {
    async fn get_token(&self) -> Result<Option<TokenSet>, AppError> {
        Ok(self.token.read().map_err(|_| poisoned())?.clone())
    }

    async fn put_token(&self, token: &TokenSet) -> Result<(), AppError> {
        *self.token.write().map_err(|_| poisoned())? = Some(token.clone());
        Ok(())
    }

    async fn delete_tokens(&self) -> Result<(), AppError> {
        *self.token.write().map_err(|_| poisoned())? = None;
        Ok(())
    }

    async fn get_tenant(&self) -> Result<Option<TenantSelection>, AppError> {
        Ok(self.tenant.read().map_err(|_| poisoned())?.clone())
    }

    async fn put_tenant(&self, tenant: &TenantSelection) -> Result<(), AppError> {
        *self.tenant.write().map_err(|_| poisoned())? = Some(tenant.clone());
        Ok(())
    }

    async fn delete_tenant(&self) -> Result<(), AppError> {
        *self.tenant.write().map_err(|_| poisoned())? = None;
        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for MemoryDb {
    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, AppError> {
        Ok(self.invoices.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_by_xero_id(&self, xero_invoice_id: &str) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .invoices
            .iter()
            .find(|entry| entry.value().xero_invoice_id.as_deref() == Some(xero_invoice_id))
            .map(|entry| entry.value().clone()))
    }

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        self.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(())
    }

    async fn list_invoices(&self, include_deleted: bool) -> Result<Vec<Invoice>, AppError> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|entry| include_deleted || !entry.value().is_deleted)
            .map(|entry| entry.value().clone())
            .collect();
        sort_newest_first(&mut invoices);
        Ok(invoices)
    }
}
