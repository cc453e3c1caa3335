// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local invoice model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Local invoice lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Paid,
    Overdue,
    Cancelled,
    AwaitingApproval,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::AwaitingApproval => "awaiting_approval",
        }
    }

    /// Map a Xero status by lower-casing it.
    ///
    /// Xero statuses with no local counterpart (`authorised`, `voided`, ...)
    /// are rejected.
    pub fn from_remote(remote: &str) -> Result<Self, String> {
        remote.trim().to_ascii_lowercase().parse()
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "pending" => Ok(InvoiceStatus::Pending),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            "awaiting_approval" => Ok(InvoiceStatus::AwaitingApproval),
            other => Err(format!("'{}' is not a valid invoice status", other)),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoice record. Never hard-deleted; see `is_deleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Local identifier (also used as document ID)
    pub id: String,
    /// Human-facing invoice code
    #[serde(rename = "invoiceID")]
    #[validate(length(min = 1, message = "invoiceID is required"))]
    pub invoice_id: String,
    #[validate(range(min = 0.0, message = "amount must not be negative"))]
    pub amount: f64,
    pub status: InvoiceStatus,
    pub date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,

    // ─── Xero linkage ────────────────────────────────────────────
    #[serde(default)]
    pub xero_invoice_id: Option<String>,
    #[serde(default)]
    pub xero_status: Option<String>,
    /// Display fallback when no local client is linked
    #[serde(default)]
    pub xero_client_name: Option<String>,
    #[serde(default)]
    pub xero_contact_id: Option<String>,
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,

    // ─── Soft delete ─────────────────────────────────────────────
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub delete_reason: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// New, unlinked invoice with a fresh local ID.
    pub fn new(invoice_id: String, amount: f64, status: InvoiceStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invoice_id,
            amount,
            status,
            date: None,
            due_date: None,
            description: None,
            project_id: None,
            client_id: None,
            xero_invoice_id: None,
            xero_status: None,
            xero_client_name: None,
            xero_contact_id: None,
            last_synced: None,
            is_deleted: false,
            delete_reason: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Flag the invoice as deleted.
    pub fn soft_delete(&mut self, reason: Option<String>, now: DateTime<Utc>) {
        self.is_deleted = true;
        self.delete_reason = reason;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    /// Name to show for the counterparty when no client is linked.
    pub fn display_client(&self) -> Option<&str> {
        if self.client_id.is_some() {
            return None;
        }
        self.xero_client_name.as_deref()
    }
}
