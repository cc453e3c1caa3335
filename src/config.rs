//! Application configuration loaded from environment variables.
//!
//! The Xero client credentials and redirect URI are required; the service
//! refuses to start without them.

use std::env;
use std::path::PathBuf;

/// Default OAuth scopes requested from Xero.
pub const DEFAULT_XERO_SCOPES: &str = "offline_access openid profile email \
     accounting.transactions accounting.contacts accounting.settings";

/// Where tokens and invoices are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Xero OAuth app ---
    /// Xero OAuth client ID
    pub xero_client_id: String,
    /// Xero OAuth client secret
    pub xero_client_secret: String,
    /// Callback URL registered with the Xero app
    pub xero_redirect_uri: String,
    /// Space-delimited scopes requested during consent
    pub xero_scopes: String,
    pub xero_login_url: String,
    pub xero_identity_url: String,
    pub xero_api_url: String,

    // --- Service ---
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    pub storage_backend: StorageBackend,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Maximum invoices written concurrently during a sync
    pub sync_concurrency: usize,

    // --- Legacy file-based token storage (import only) ---
    pub legacy_token_file: PathBuf,
    pub legacy_tenant_file: PathBuf,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            xero_client_id: "test_client_id".to_string(),
            xero_client_secret: "test_secret".to_string(),
            xero_redirect_uri: "http://localhost:5000/api/xero/callback".to_string(),
            xero_scopes: DEFAULT_XERO_SCOPES.to_string(),
            xero_login_url: "https://login.xero.com".to_string(),
            xero_identity_url: "https://identity.xero.com".to_string(),
            xero_api_url: "https://api.xero.com".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            port: 5000,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            storage_backend: StorageBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            sync_concurrency: 4,
            legacy_token_file: PathBuf::from("config/xero-token.json"),
            legacy_tenant_file: PathBuf::from("config/xero-tenant.json"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => StorageBackend::Firestore,
            "memory" => StorageBackend::Memory,
            other => return Err(ConfigError::Invalid("STORAGE_BACKEND", other.to_string())),
        };

        Ok(Self {
            xero_client_id: required("XERO_CLIENT_ID")?,
            xero_client_secret: required("XERO_CLIENT_SECRET")?,
            xero_redirect_uri: required("XERO_REDIRECT_URI")?,
            xero_scopes: env::var("XERO_SCOPES").unwrap_or_else(|_| DEFAULT_XERO_SCOPES.to_string()),
            xero_login_url: env::var("XERO_LOGIN_URL")
                .unwrap_or_else(|_| "https://login.xero.com".to_string()),
            xero_identity_url: env::var("XERO_IDENTITY_URL")
                .unwrap_or_else(|_| "https://identity.xero.com".to_string()),
            xero_api_url: env::var("XERO_API_URL")
                .unwrap_or_else(|_| "https://api.xero.com".to_string()),

            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
            storage_backend,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            sync_concurrency: env::var("SYNC_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(4)
                .max(1),

            legacy_token_file: env::var("LEGACY_TOKEN_FILE")
                .unwrap_or_else(|_| "config/xero-token.json".to_string())
                .into(),
            legacy_tenant_file: env::var("LEGACY_TENANT_FILE")
                .unwrap_or_else(|_| "config/xero-tenant.json".to_string())
                .into(),
        })
    }
}

/// Read a required variable, trimming stray whitespace from secret bindings.
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
