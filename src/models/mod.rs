// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod invoice;
pub mod token;

pub use invoice::{Invoice, InvoiceStatus};
pub use token::{TenantSelection, TokenSet};
