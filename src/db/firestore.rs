// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Xero tokens (singleton document, replaced by upsert)
//! - Tenant selection (singleton document)
//! - Invoices (local records, keyed by local ID)

use crate::db::{collections, sort_newest_first, InvoiceRepository, TokenRepository, SINGLETON_DOC_ID};
use crate::error::AppError;
use crate::models::{Invoice, TenantSelection, TokenSet};
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn delete_singleton(&self, collection: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(SINGLETON_DOC_ID)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for FirestoreDb {
    async fn get_token(&self) -> Result<Option<TokenSet>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::XERO_TOKENS)
            .obj()
            .one(SINGLETON_DOC_ID)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Upsert of the singleton: the previous token set is replaced in one
    /// write, so there is never a moment without a stored token.
    async fn put_token(&self, token: &TokenSet) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::XERO_TOKENS)
            .document_id(SINGLETON_DOC_ID)
            .object(token)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_tokens(&self) -> Result<(), AppError> {
        self.delete_singleton(collections::XERO_TOKENS).await
    }

    async fn get_tenant(&self) -> Result<Option<TenantSelection>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::XERO_TENANT)
            .obj()
            .one(SINGLETON_DOC_ID)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_tenant(&self, tenant: &TenantSelection) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::XERO_TENANT)
            .document_id(SINGLETON_DOC_ID)
            .object(tenant)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_tenant(&self) -> Result<(), AppError> {
        self.delete_singleton(collections::XERO_TENANT).await
    }
}

#[async_trait]
impl InvoiceRepository for FirestoreDb {
    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::INVOICES)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_xero_id(&self, xero_invoice_id: &str) -> Result<Option<Invoice>, AppError> {
        let xero_invoice_id = xero_invoice_id.to_string();
        let matches: Vec<Invoice> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::INVOICES)
            .filter(move |q| q.field("xeroInvoiceId").eq(xero_invoice_id.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.into_iter().next())
    }

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::INVOICES)
            .document_id(&invoice.id)
            .object(invoice)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_invoices(&self, include_deleted: bool) -> Result<Vec<Invoice>, AppError> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::INVOICES);

        let result = if include_deleted {
            query.obj::<Invoice>().query().await
        } else {
            query
                .filter(|q| q.field("isDeleted").eq(false))
                .obj::<Invoice>()
                .query()
                .await
        };
        let mut invoices = result.map_err(|e| AppError::Database(e.to_string()))?;

        sort_newest_first(&mut invoices);
        Ok(invoices)
    }
}
