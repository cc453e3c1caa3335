// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod consent;
pub mod invoice_sync;
pub mod invoices;
pub mod token_store;
pub mod xero;

pub use consent::{ConsentFlow, ConsentPhase, ConnectedTenant};
pub use invoice_sync::{InvoiceSync, SyncReport};
pub use invoices::{CreateXeroInvoiceRequest, InvoiceService};
pub use token_store::{ConnectionStatus, TokenStore};
pub use xero::{XeroApi, XeroClient};
