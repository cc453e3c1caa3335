// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pull receivable invoices from Xero into the local invoice store.
//!
//! Handles:
//! 1. Connection check (token + tenant)
//! 2. Fetching every ACCREC page
//! 3. Upsert by Xero invoice ID, a bounded number at a time
//! 4. Per-invoice failure capture (one bad invoice never stops the batch)

use crate::db::InvoiceRepository;
use crate::error::{AppError, Result};
use crate::models::{Invoice, InvoiceStatus};
use crate::services::token_store::{TokenStore, XeroConnectionContext};
use crate::services::xero::{XeroApi, XeroInvoice, INVOICE_PAGE_SIZE};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Upper bound on pages fetched in one sync.
const MAX_PAGES: u32 = 500;

/// Aggregate result of a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncReport {
    pub created: u32,
    pub updated: u32,
    pub errors: u32,
}

/// What happened to one remote invoice.
#[derive(Debug)]
pub enum SyncOutcome {
    Created,
    Updated,
    Failed { xero_invoice_id: String, error: AppError },
}

impl SyncReport {
    fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Failed { .. } => self.errors += 1,
        }
    }
}

pub struct InvoiceSync {
    tokens: Arc<TokenStore>,
    xero: Arc<dyn XeroApi>,
    invoices: Arc<dyn InvoiceRepository>,
    concurrency: usize,
}

impl InvoiceSync {
    pub fn new(
        tokens: Arc<TokenStore>,
        xero: Arc<dyn XeroApi>,
        invoices: Arc<dyn InvoiceRepository>,
        concurrency: usize,
    ) -> Self {
        Self {
            tokens,
            xero,
            invoices,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch all receivable invoices and upsert them locally.
    pub async fn sync_from_remote(&self) -> Result<SyncReport> {
        let ctx = self.tokens.require_connection().await?;
        let remote = self.fetch_all_receivables(&ctx).await?;

        tracing::info!(
            count = remote.len(),
            tenant_id = %ctx.tenant_id,
            "Syncing invoices from Xero"
        );

        let report = self.apply(remote, Utc::now()).await;

        tracing::info!(
            created = report.created,
            updated = report.updated,
            errors = report.errors,
            "Invoice sync complete"
        );
        Ok(report)
    }

    /// All ACCREC invoices, page by page until a short page.
    pub async fn fetch_all_receivables(
        &self,
        ctx: &XeroConnectionContext,
    ) -> Result<Vec<XeroInvoice>> {
        let mut all = Vec::new();

        for page in 1..=MAX_PAGES {
            let batch = self
                .xero
                .list_invoices(&ctx.access_token, &ctx.tenant_id, page)
                .await?;
            let len = batch.len();
            all.extend(batch);

            if len < INVOICE_PAGE_SIZE {
                break;
            }
        }

        Ok(all)
    }

    /// Upsert a batch of remote invoices. Never fails as a whole.
    ///
    /// Entries sharing an `InvoiceID` run one after another in their original
    /// order, so a repeated invoice is created once and then updated.
    pub async fn apply(&self, remote: Vec<XeroInvoice>, now: DateTime<Utc>) -> SyncReport {
        let outcomes: Vec<SyncOutcome> = stream::iter(group_by_invoice_id(remote))
            .map(|lane| async move {
                let mut outcomes = Vec::with_capacity(lane.len());
                for invoice in lane {
                    let xero_invoice_id = invoice.invoice_id.clone();
                    outcomes.push(match self.sync_one(invoice, now).await {
                        Ok(outcome) => outcome,
                        Err(error) => SyncOutcome::Failed {
                            xero_invoice_id,
                            error,
                        },
                    });
                }
                outcomes
            })
            .buffer_unordered(self.concurrency)
            .flat_map(stream::iter)
            .collect()
            .await;

        let mut report = SyncReport::default();
        for outcome in &outcomes {
            if let SyncOutcome::Failed {
                xero_invoice_id,
                error,
            } = outcome
            {
                tracing::warn!(xero_invoice_id = %xero_invoice_id, error = %error, "Failed to sync invoice");
            }
            report.record(outcome);
        }
        report
    }

    async fn sync_one(&self, remote: XeroInvoice, now: DateTime<Utc>) -> Result<SyncOutcome> {
        if remote.invoice_id.is_empty() {
            return Err(AppError::Validation("InvoiceID is missing".to_string()));
        }
        let status = InvoiceStatus::from_remote(&remote.status).map_err(AppError::Validation)?;

        match self.invoices.find_by_xero_id(&remote.invoice_id).await? {
            Some(mut existing) => {
                existing.amount = remote.total;
                existing.status = status;
                existing.date = remote.issue_date();
                existing.due_date = remote.due();
                existing.description = remote.first_line_description();
                existing.xero_status = Some(remote.status.clone());
                if let Some(contact) = &remote.contact {
                    existing.xero_contact_id = contact.contact_id.clone().or(existing.xero_contact_id);
                    existing.xero_client_name = contact.name.clone().or(existing.xero_client_name);
                }
                existing.last_synced = Some(now);
                existing.updated_at = now;

                validate(&existing)?;
                self.invoices.save_invoice(&existing).await?;
                Ok(SyncOutcome::Updated)
            }
            None => {
                let invoice = invoice_from_remote(&remote, status, now);
                validate(&invoice)?;
                self.invoices.save_invoice(&invoice).await?;
                tracing::debug!(xero_invoice_id = %remote.invoice_id, "Created local invoice");
                Ok(SyncOutcome::Created)
            }
        }
    }
}

/// Split into lanes, one per `InvoiceID`, in first-seen order.
fn group_by_invoice_id(remote: Vec<XeroInvoice>) -> Vec<Vec<XeroInvoice>> {
    let mut lane_of: HashMap<String, usize> = HashMap::new();
    let mut lanes: Vec<Vec<XeroInvoice>> = Vec::new();

    for invoice in remote {
        match lane_of.get(&invoice.invoice_id) {
            Some(&lane) => lanes[lane].push(invoice),
            None => {
                lane_of.insert(invoice.invoice_id.clone(), lanes.len());
                lanes.push(vec![invoice]);
            }
        }
    }
    lanes
}

fn validate(invoice: &Invoice) -> Result<()> {
    invoice
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Build a new local invoice mirroring `remote`.
fn invoice_from_remote(remote: &XeroInvoice, status: InvoiceStatus, now: DateTime<Utc>) -> Invoice {
    let code = remote
        .invoice_number
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| remote.invoice_id.clone());

    let mut invoice = Invoice::new(code, remote.total, status, now);
    invoice.date = remote.issue_date();
    invoice.due_date = remote.due();
    invoice.description = remote.first_line_description();
    invoice.xero_invoice_id = Some(remote.invoice_id.clone());
    invoice.xero_status = Some(remote.status.clone());
    if let Some(contact) = &remote.contact {
        invoice.xero_contact_id = contact.contact_id.clone();
        invoice.xero_client_name = contact.name.clone();
    }
    invoice.last_synced = Some(now);
    invoice
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::xero::{XeroContactRef, XeroLineItem};

    #[test]
    fn test_invoice_from_remote() {
        let remote = XeroInvoice {
            invoice_id: "x-1".into(),
            invoice_number: Some("INV-0007".into()),
            contact: Some(XeroContactRef {
                contact_id: Some("c-1".into()),
                name: Some("Acme Demolition".into()),
            }),
            date_string: Some("2024-03-01T00:00:00".into()),
            status: "DRAFT".into(),
            line_items: vec![XeroLineItem {
                description: Some("Asbestos removal".into()),
                ..Default::default()
            }],
            total: 1200.0,
            ..Default::default()
        };
        let now = Utc::now();
        let inv = invoice_from_remote(&remote, InvoiceStatus::Draft, now);

        assert_eq!(inv.invoice_id, "INV-0007");
        assert_eq!(inv.xero_invoice_id.as_deref(), Some("x-1"));
        assert_eq!(inv.xero_status.as_deref(), Some("DRAFT"));
        assert_eq!(inv.status, InvoiceStatus::Draft);
        assert_eq!(inv.description.as_deref(), Some("Asbestos removal"));
        assert_eq!(inv.xero_client_name.as_deref(), Some("Acme Demolition"));
        assert_eq!(inv.last_synced, Some(now));
        assert!(inv.date.is_some());
    }

    #[test]
    fn test_invoice_number_falls_back_to_id() {
        let remote = XeroInvoice {
            invoice_id: "x-2".into(),
            status: "PAID".into(),
            ..Default::default()
        };
        let inv = invoice_from_remote(&remote, InvoiceStatus::Paid, Utc::now());
        assert_eq!(inv.invoice_id, "x-2");
    }

    #[test]
    fn test_group_by_invoice_id_keeps_order() {
        let remote = ["a", "b", "a", "c", "a"]
            .iter()
            .enumerate()
            .map(|(i, id)| XeroInvoice {
                invoice_id: id.to_string(),
                total: i as f64,
                ..Default::default()
            })
            .collect();

        let lanes = group_by_invoice_id(remote);
        let ids: Vec<&str> = lanes.iter().map(|l| l[0].invoice_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);

        let totals: Vec<f64> = lanes[0].iter().map(|i| i.total).collect();
        assert_eq!(totals, [0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_report_counts() {
        let mut report = SyncReport::default();
        report.record(&SyncOutcome::Created);
        report.record(&SyncOutcome::Updated);
        report.record(&SyncOutcome::Failed {
            xero_invoice_id: "x".into(),
            error: AppError::Validation("bad".into()),
        });
        assert_eq!(
            report,
            SyncReport {
                created: 1,
                updated: 1,
                errors: 1
            }
        );
    }
}
