// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-shot import of the legacy JSON token and tenant files.
//!
//! Older deployments kept the token set in a JSON file next to the service
//! and the tenant in a second file (`{ "tenantId": "..." }`). The database is
//! now the only store; at startup those files are copied in (only when the
//! database holds no token) and renamed to `*.migrated`.

use crate::db::TokenRepository;
use crate::models::{TenantSelection, TokenSet};
use crate::time_utils::format_utc_rfc3339;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTenantFile {
    tenant_id: String,
}

/// What the import did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LegacyImport {
    pub token_imported: bool,
    pub tenant_imported: bool,
}

/// Load a legacy token file. `Ok(None)` when the file does not exist.
pub fn load_token_file(path: &Path) -> anyhow::Result<Option<TokenSet>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let token: TokenSet = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(token))
}

/// Load a legacy tenant file. `Ok(None)` when the file does not exist.
pub fn load_tenant_file(path: &Path) -> anyhow::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let tenant: LegacyTenantFile = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(tenant.tenant_id).filter(|id| !id.is_empty()))
}

fn migrated_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".migrated");
    path.with_file_name(name)
}

/// Import the legacy files into `repo` if it has no token yet.
pub async fn import_legacy_files(
    repo: &dyn TokenRepository,
    token_path: &Path,
    tenant_path: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<LegacyImport> {
    let mut result = LegacyImport::default();

    if repo.get_token().await?.is_some() {
        tracing::debug!("Token already stored, skipping legacy import");
        return Ok(result);
    }

    let Some(mut token) = load_token_file(token_path)? else {
        return Ok(result);
    };

    if token.access_token.is_empty() || token.refresh_token.is_empty() {
        anyhow::bail!(
            "legacy token file {} is missing credentials",
            token_path.display()
        );
    }

    let tenant_id = load_tenant_file(tenant_path)?.or_else(|| token.tenant_id.clone());
    token.tenant_id = tenant_id.clone();
    token.normalize(now);
    repo.put_token(&token).await?;
    result.token_imported = true;

    if let Some(tenant_id) = tenant_id {
        repo.put_tenant(&TenantSelection {
            tenant_id,
            tenant_name: None,
            selected_at: Some(format_utc_rfc3339(now)),
        })
        .await?;
        result.tenant_imported = true;
    }

    for path in [token_path, tenant_path] {
        if path.exists() {
            std::fs::rename(path, migrated_path(path))
                .with_context(|| format!("renaming {}", path.display()))?;
        }
    }

    tracing::info!(
        tenant_imported = result.tenant_imported,
        "Imported legacy Xero token file"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use chrono::TimeZone;

    const TOKEN_JSON: &str = r#"{
        "accessToken": "legacy-access",
        "refreshToken": "legacy-refresh",
        "expiresIn": 1800,
        "tokenType": "bearer",
        "scope": "offline_access",
        "tenantId": "tenant-in-token"
    }"#;

    fn write_files(dir: &Path, token: &str, tenant: Option<&str>) -> (PathBuf, PathBuf) {
        let token_path = dir.join("xero-token.json");
        let tenant_path = dir.join("xero-tenant.json");
        std::fs::write(&token_path, token).unwrap();
        if let Some(tenant) = tenant {
            std::fs::write(&tenant_path, tenant).unwrap();
        }
        (token_path, tenant_path)
    }

    #[test]
    fn test_migrated_path() {
        assert_eq!(
            migrated_path(Path::new("config/xero-token.json")),
            PathBuf::from("config/xero-token.json.migrated")
        );
    }

    #[test]
    fn test_missing_files_are_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_token_file(&dir.path().join("nope.json"))
            .unwrap()
            .is_none());
        assert!(load_tenant_file(&dir.path().join("nope.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_token_file(&path).is_err());
    }

    #[tokio::test]
    async fn test_import_stores_token_and_renames_files() {
        let dir = tempfile::tempdir().unwrap();
        let (token_path, tenant_path) =
            write_files(dir.path(), TOKEN_JSON, Some(r#"{"tenantId":"tenant-in-file"}"#));
        let repo = MemoryDb::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let result = import_legacy_files(&repo, &token_path, &tenant_path, now)
            .await
            .unwrap();
        assert_eq!(
            result,
            LegacyImport {
                token_imported: true,
                tenant_imported: true
            }
        );

        let token = repo.get_token().await.unwrap().unwrap();
        assert_eq!(token.access_token, "legacy-access");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_at, Some(now.timestamp_millis() + 1_800_000));
        // Tenant file wins over the token's own field
        assert_eq!(token.tenant_id.as_deref(), Some("tenant-in-file"));
        assert_eq!(
            repo.get_tenant().await.unwrap().unwrap().tenant_id,
            "tenant-in-file"
        );

        assert!(!token_path.exists());
        assert!(!tenant_path.exists());
        assert!(migrated_path(&token_path).exists());
        assert!(migrated_path(&tenant_path).exists());
    }

    #[tokio::test]
    async fn test_import_falls_back_to_token_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let (token_path, tenant_path) = write_files(dir.path(), TOKEN_JSON, None);
        let repo = MemoryDb::new();

        let result = import_legacy_files(&repo, &token_path, &tenant_path, Utc::now())
            .await
            .unwrap();
        assert!(result.tenant_imported);
        assert_eq!(
            repo.get_tenant().await.unwrap().unwrap().tenant_id,
            "tenant-in-token"
        );
        assert!(migrated_path(&token_path).exists());
    }

    #[tokio::test]
    async fn test_import_skipped_when_token_stored() {
        let dir = tempfile::tempdir().unwrap();
        let (token_path, tenant_path) = write_files(dir.path(), TOKEN_JSON, None);
        let repo = MemoryDb::new();

        let mut existing: TokenSet = serde_json::from_str(TOKEN_JSON).unwrap();
        existing.access_token = "current-access".to_string();
        repo.put_token(&existing).await.unwrap();

        let result = import_legacy_files(&repo, &token_path, &tenant_path, Utc::now())
            .await
            .unwrap();
        assert_eq!(result, LegacyImport::default());
        assert_eq!(
            repo.get_token().await.unwrap().unwrap().access_token,
            "current-access"
        );
        assert!(token_path.exists(), "file left alone");
    }

    #[tokio::test]
    async fn test_import_rejects_file_without_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let (token_path, tenant_path) = write_files(
            dir.path(),
            r#"{"accessToken":"","refreshToken":"legacy-refresh"}"#,
            None,
        );
        let repo = MemoryDb::new();

        let err = import_legacy_files(&repo, &token_path, &tenant_path, Utc::now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing credentials"));
        assert_eq!(repo.token_count(), 0);
        assert!(token_path.exists());
        assert!(!migrated_path(&token_path).exists());
    }

    #[tokio::test]
    async fn test_import_without_files_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryDb::new();

        let result = import_legacy_files(
            &repo,
            &dir.path().join("xero-token.json"),
            &dir.path().join("xero-tenant.json"),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(result, LegacyImport::default());
        assert_eq!(repo.token_count(), 0);
    }
}
