//! Identity boundary.
//!
//! A chat session only starts once an `Identity` is established. The rest of
//! the application sees nothing but the `IdentityProvider` trait; token
//! formats and key handling stay behind it.

use std::str::FromStr;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use scholar_core::config::{expand_home, IdentityConfig};

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

impl Identity {
    /// Name to greet the user with.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider is not configured correctly: {0}")]
    Configuration(String),
    #[error("no identity token supplied (use --id-token or SCHOLAR_ID_TOKEN)")]
    MissingToken,
    #[error("identity token has expired; sign in again")]
    Expired,
    #[error("identity token rejected: {0}")]
    Rejected(String),
}

/// Exchanges a credential for a verified identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_credential(&self, token: &str) -> Result<Identity, IdentityError>;
}

/// Build the provider selected by `[identity]`.
pub fn provider_from_config(
    config: &IdentityConfig,
) -> Result<Box<dyn IdentityProvider>, IdentityError> {
    if config.enabled {
        Ok(Box::new(JwtIdentityProvider::from_config(config)?))
    } else {
        Ok(Box::new(LocalIdentityProvider))
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Verifies OpenID Connect ID tokens (signature, issuer, audience, expiry).
pub struct JwtIdentityProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn from_config(config: &IdentityConfig) -> Result<Self, IdentityError> {
        if config.audience.trim().is_empty() {
            return Err(IdentityError::Configuration(
                "[identity].audience must be set to the client ID".to_string(),
            ));
        }
        let algorithm = Algorithm::from_str(config.algorithm.trim()).map_err(|_| {
            IdentityError::Configuration(format!("unsupported algorithm {}", config.algorithm))
        })?;

        let decoding_key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = config
                    .secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        IdentityError::Configuration(
                            "[identity].secret is required for HMAC algorithms".to_string(),
                        )
                    })?;
                DecodingKey::from_secret(secret.as_bytes())
            }
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
                let key_path = config.key_path.as_deref().ok_or_else(|| {
                    IdentityError::Configuration(
                        "[identity].key_path is required for RSA algorithms".to_string(),
                    )
                })?;
                let path = expand_home(key_path);
                let pem = std::fs::read(&path).map_err(|e| {
                    IdentityError::Configuration(format!("cannot read {}: {}", path.display(), e))
                })?;
                DecodingKey::from_rsa_pem(&pem)
                    .map_err(|e| IdentityError::Configuration(format!("invalid RSA key: {}", e)))?
            }
            other => {
                return Err(IdentityError::Configuration(format!(
                    "unsupported algorithm {:?}",
                    other
                )))
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);

        Ok(Self {
            decoding_key,
            validation,
        })
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn exchange_credential(&self, token: &str) -> Result<Identity, IdentityError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(IdentityError::MissingToken);
        }
        let claims = match decode::<IdTokenClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(err) => {
                tracing::warn!(error = %err, "Identity token verification failed");
                return Err(match err.kind() {
                    ErrorKind::ExpiredSignature => IdentityError::Expired,
                    ErrorKind::InvalidIssuer => IdentityError::Rejected("wrong issuer".into()),
                    ErrorKind::InvalidAudience => IdentityError::Rejected("wrong audience".into()),
                    ErrorKind::InvalidSignature => IdentityError::Rejected("bad signature".into()),
                    _ => IdentityError::Rejected(err.to_string()),
                });
            }
        };

        tracing::info!(subject = %claims.sub, "Identity token verified");
        Ok(Identity {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            picture: claims.picture,
        })
    }
}

/// Signs in as the local OS user. Used when token verification is disabled.
pub struct LocalIdentityProvider;

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn exchange_credential(&self, _token: &str) -> Result<Identity, IdentityError> {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "local".to_string());
        tracing::warn!(user = %user, "Identity verification disabled; signing in as local user");
        Ok(Identity {
            id: format!("local:{}", user),
            name: Some(user),
            email: None,
            picture: None,
        })
    }
}
