// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local invoice operations and the Xero calls behind the invoice screens.

use crate::db::InvoiceRepository;
use crate::error::{AppError, Result};
use crate::models::{Invoice, InvoiceStatus};
use crate::services::token_store::TokenStore;
use crate::services::xero::{
    NewXeroInvoice, XeroApi, XeroContact, XeroContactRef, XeroInvoice, XeroLineItem, ACCREC,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// Request to raise a draft receivable invoice in Xero.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateXeroInvoiceRequest {
    #[validate(length(min = 1, message = "contactId is required"))]
    pub contact_id: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[validate(range(min = 0.0, message = "amount must not be negative"))]
    pub amount: f64,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    /// `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub reference: Option<String>,
    pub account_code: Option<String>,
    /// Local invoice to link to the created Xero invoice.
    pub local_invoice_id: Option<String>,
}

pub struct InvoiceService {
    tokens: Arc<TokenStore>,
    xero: Arc<dyn XeroApi>,
    invoices: Arc<dyn InvoiceRepository>,
}

impl InvoiceService {
    pub fn new(
        tokens: Arc<TokenStore>,
        xero: Arc<dyn XeroApi>,
        invoices: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self {
            tokens,
            xero,
            invoices,
        }
    }

    // ─── Local ───────────────────────────────────────────────────

    pub async fn list(&self, include_deleted: bool) -> Result<Vec<Invoice>> {
        self.invoices.list_invoices(include_deleted).await
    }

    pub async fn get(&self, id: &str) -> Result<Invoice> {
        self.invoices
            .get_invoice(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {}", id)))
    }

    /// Flag an invoice as deleted. Already-deleted invoices are left as-is.
    pub async fn soft_delete(&self, id: &str, reason: Option<String>) -> Result<Invoice> {
        let mut invoice = self.get(id).await?;
        if invoice.is_deleted {
            return Ok(invoice);
        }

        invoice.soft_delete(reason, Utc::now());
        self.invoices.save_invoice(&invoice).await?;
        tracing::info!(invoice_id = %invoice.invoice_id, "Invoice soft-deleted");
        Ok(invoice)
    }

    // ─── Xero ────────────────────────────────────────────────────

    pub async fn list_contacts(&self) -> Result<Vec<XeroContact>> {
        let ctx = self.tokens.require_connection().await?;
        self.xero
            .list_contacts(&ctx.access_token, &ctx.tenant_id)
            .await
    }

    /// First page of receivable invoices, straight from Xero.
    pub async fn list_remote_invoices(&self) -> Result<Vec<XeroInvoice>> {
        let ctx = self.tokens.require_connection().await?;
        self.xero
            .list_invoices(&ctx.access_token, &ctx.tenant_id, 1)
            .await
    }

    /// Raise a draft invoice in Xero, optionally linking a local invoice.
    pub async fn create_in_xero(&self, req: CreateXeroInvoiceRequest) -> Result<XeroInvoice> {
        req.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        for date in [&req.date, &req.due_date].into_iter().flatten() {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                AppError::Validation(format!("'{}' is not a YYYY-MM-DD date", date))
            })?;
        }

        // Resolve the link target before touching Xero.
        let local = match &req.local_invoice_id {
            Some(id) => Some(self.get(id).await?),
            None => None,
        };

        let ctx = self.tokens.require_connection().await?;

        let new_invoice = NewXeroInvoice {
            r#type: ACCREC.to_string(),
            contact: XeroContactRef {
                contact_id: Some(req.contact_id.clone()),
                name: None,
            },
            line_items: vec![XeroLineItem {
                description: Some(req.description.clone()),
                quantity: Some(1.0),
                unit_amount: Some(req.amount),
                account_code: req.account_code.clone(),
                line_amount: None,
            }],
            date: req.date.clone(),
            due_date: req.due_date.clone(),
            reference: req.reference.clone(),
            invoice_number: local.as_ref().map(|inv| inv.invoice_id.clone()),
            status: "DRAFT".to_string(),
        };

        let created = self
            .xero
            .create_invoice(&ctx.access_token, &ctx.tenant_id, &new_invoice)
            .await?;

        tracing::info!(xero_invoice_id = %created.invoice_id, "Invoice created in Xero");

        if let Some(mut local) = local {
            let now = Utc::now();
            local.xero_invoice_id = Some(created.invoice_id.clone());
            local.xero_status = Some(created.status.clone());
            local.xero_contact_id = Some(req.contact_id);
            if let Some(name) = created.contact.as_ref().and_then(|c| c.name.clone()) {
                local.xero_client_name = Some(name);
            }
            if let Ok(status) = InvoiceStatus::from_remote(&created.status) {
                local.status = status;
            }
            local.last_synced = Some(now);
            local.updated_at = now;
            self.invoices.save_invoice(&local).await?;
        }

        Ok(created)
    }
}
