//! Credential resolution.
//!
//! Resolution order: certificate (optionally on behalf of a user assertion),
//! user assertion with client secret, client secret, ambient default identity.
//! Any failure is returned to the caller; attacks treat it as fatal.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use faultline_config::AzureConfig;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("'{0}' is required for the configured authentication method")]
    MissingSetting(&'static str),

    #[error("failed to read certificate {path}: {source}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("certificate {0} is empty")]
    EmptyCertificate(PathBuf),
}

/// Secret material that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Managed identity, workload identity or developer login of the host.
    DefaultIdentity,
    ClientSecret {
        tenant_id: String,
        client_id: String,
        secret: Secret,
    },
    Certificate {
        tenant_id: String,
        client_id: String,
        certificate: Vec<u8>,
        password: Option<Secret>,
        user_assertion: Option<Secret>,
    },
    OnBehalfOf {
        tenant_id: String,
        client_id: String,
        secret: Secret,
        user_assertion: Secret,
    },
}

impl Credential {
    pub fn method(&self) -> &'static str {
        match self {
            Credential::DefaultIdentity => "default-identity",
            Credential::ClientSecret { .. } => "client-secret",
            Credential::Certificate { .. } => "certificate",
            Credential::OnBehalfOf { .. } => "on-behalf-of",
        }
    }
}

pub trait CredentialProvider: Send + Sync {
    fn credential(&self) -> Result<Credential, CredentialError>;
}

/// Resolves credentials from [`AzureConfig`].
#[derive(Debug, Clone)]
pub struct EnvironmentCredentialProvider {
    config: AzureConfig,
}

impl EnvironmentCredentialProvider {
    pub fn new(config: AzureConfig) -> Self {
        Self { config }
    }

    fn required(value: &Option<String>, name: &'static str) -> Result<String, CredentialError> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(CredentialError::MissingSetting(name))
    }
}

impl CredentialProvider for EnvironmentCredentialProvider {
    fn credential(&self) -> Result<Credential, CredentialError> {
        let config = &self.config;

        if let Some(path) = config.certificate_path.as_deref().filter(|p| !p.is_empty()) {
            info!("Using certificate authentication.");
            let path = PathBuf::from(path);
            let certificate =
                std::fs::read(&path).map_err(|source| CredentialError::Certificate {
                    path: path.clone(),
                    source,
                })?;
            if certificate.is_empty() {
                return Err(CredentialError::EmptyCertificate(path));
            }
            return Ok(Credential::Certificate {
                tenant_id: Self::required(&config.tenant_id, "AZURE_TENANT_ID")?,
                client_id: Self::required(&config.client_id, "AZURE_CLIENT_ID")?,
                certificate,
                password: config.certificate_password.clone().map(Secret::new),
                user_assertion: config.user_assertion.clone().map(Secret::new),
            });
        }

        if let Some(assertion) = config.user_assertion.as_deref().filter(|a| !a.is_empty()) {
            return Ok(Credential::OnBehalfOf {
                tenant_id: Self::required(&config.tenant_id, "AZURE_TENANT_ID")?,
                client_id: Self::required(&config.client_id, "AZURE_CLIENT_ID")?,
                secret: Secret::new(Self::required(
                    &config.client_secret,
                    "AZURE_CLIENT_SECRET",
                )?),
                user_assertion: Secret::new(assertion),
            });
        }

        if let Some(secret) = config.client_secret.as_deref().filter(|s| !s.is_empty()) {
            return Ok(Credential::ClientSecret {
                tenant_id: Self::required(&config.tenant_id, "AZURE_TENANT_ID")?,
                client_id: Self::required(&config.client_id, "AZURE_CLIENT_ID")?,
                secret: Secret::new(secret),
            });
        }

        debug!("No explicit credentials configured, using the default identity");
        Ok(Credential::DefaultIdentity)
    }
}
