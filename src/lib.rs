// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Xero-Sync: Xero connection and invoice sync for the field services back office
//!
//! This crate owns the Xero OAuth token lifecycle (consent, refresh,
//! disconnect) and pulls receivable invoices into the local invoice store.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Repositories;
use services::{ConsentFlow, InvoiceService, InvoiceSync, TokenStore, XeroApi};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tokens: Arc<TokenStore>,
    pub consent: ConsentFlow,
    pub invoice_sync: InvoiceSync,
    pub invoice_service: InvoiceService,
}

impl AppState {
    /// Wire the services over the given storage and Xero client.
    pub fn new(config: Config, repos: Repositories, xero: Arc<dyn XeroApi>) -> Self {
        let tokens = Arc::new(TokenStore::new(repos.tokens, xero.clone()));
        let consent = ConsentFlow::new(&config, xero.clone(), tokens.clone());
        let invoice_sync = InvoiceSync::new(
            tokens.clone(),
            xero.clone(),
            repos.invoices.clone(),
            config.sync_concurrency,
        );
        let invoice_service = InvoiceService::new(tokens.clone(), xero, repos.invoices);

        Self {
            config,
            tokens,
            consent,
            invoice_sync,
            invoice_service,
        }
    }
}
