//! # Bearer Token Authentication
//!
//! Signed-token verification and issuance for the gateway.
//!
//! - [`TokenVerifier`] checks signature, format and expiry of an HMAC-signed
//!   JWT and returns the subject as the caller identity.
//! - [`TokenIssuer`] mints tokens for the demo login endpoint.
//! - [`PublicPaths`] is the allowlist of routes that skip authentication.
//!
//! The secret and algorithm are fixed when the verifier is built.

use chrono::Utc;
use gateway_config::{AuthSettings, JwtAlgorithm};
use gateway_core::{CallerIdentity, GatewayError, GatewayResult};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Claims carried by gateway tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (caller identity)
    pub sub: String,
    /// Issued at (seconds since the Unix epoch)
    #[serde(default)]
    pub iat: i64,
    /// Expiry (seconds since the Unix epoch)
    pub exp: i64,
}

/// Validates a credential and yields the caller identity
pub trait CredentialVerifier: Send + Sync + fmt::Debug {
    /// Verify a credential. Never panics; all failures are `InvalidCredential`.
    fn verify(&self, credential: &str) -> GatewayResult<CallerIdentity>;
}

fn to_algorithm(algorithm: JwtAlgorithm) -> Algorithm {
    match algorithm {
        JwtAlgorithm::HS256 => Algorithm::HS256,
        JwtAlgorithm::HS384 => Algorithm::HS384,
        JwtAlgorithm::HS512 => Algorithm::HS512,
    }
}

/// HMAC JWT verifier
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier for the given secret and algorithm
    #[must_use]
    pub fn new(secret: &[u8], algorithm: JwtAlgorithm) -> Self {
        let mut validation = Validation::new(to_algorithm(algorithm));
        // Expiry is checked against an explicit instant in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Create a verifier from auth settings
    #[must_use]
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            settings.secret.expose_secret().as_bytes(),
            settings.algorithm,
        )
    }

    /// Verify a credential as of `now` (seconds since the Unix epoch)
    pub fn verify_at(&self, credential: &str, now: i64) -> GatewayResult<CallerIdentity> {
        let claims = decode::<Claims>(credential, &self.key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "Token validation failed");
                GatewayError::invalid_credential(e.to_string())
            })?
            .claims;

        if claims.exp <= now {
            return Err(GatewayError::invalid_credential("token expired"));
        }

        if claims.sub.is_empty() {
            return Err(GatewayError::invalid_credential("empty subject"));
        }

        Ok(CallerIdentity::new(claims.sub))
    }
}

impl CredentialVerifier for TokenVerifier {
    fn verify(&self, credential: &str) -> GatewayResult<CallerIdentity> {
        self.verify_at(credential, Utc::now().timestamp())
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

/// Token issuance error
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signing failed
    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// A freshly minted token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    /// Encoded JWT
    pub token: String,
    /// Always `bearer`
    pub token_type: &'static str,
    /// Seconds until expiry
    pub expires_in: u64,
}

/// HMAC JWT issuer
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    header: Header,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer
    #[must_use]
    pub fn new(secret: &[u8], algorithm: JwtAlgorithm, ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            header: Header::new(to_algorithm(algorithm)),
            ttl,
        }
    }

    /// Create an issuer from auth settings
    #[must_use]
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            settings.secret.expose_secret().as_bytes(),
            settings.algorithm,
            settings.token_ttl,
        )
    }

    /// Issue a token for `subject` valid from now
    pub fn issue(&self, subject: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, Utc::now().timestamp())
    }

    /// Issue a token for `subject` as of `now` (seconds since the Unix epoch)
    pub fn issue_at(&self, subject: &str, now: i64) -> Result<IssuedToken, TokenError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
        };

        Ok(IssuedToken {
            token: encode(&self.header, &claims, &self.key)?,
            token_type: "bearer",
            expires_in: self.ttl.as_secs(),
        })
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.header.alg)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Pull the token out of an `Authorization` header value.
///
/// Accepts `Bearer <token>` (scheme is case-insensitive) or a bare token.
#[must_use]
pub fn extract_bearer(value: &str) -> &str {
    let value = value.trim();
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => value,
    }
}

/// Allowlist of unauthenticated paths. A trailing `*` makes an entry a prefix match.
#[derive(Debug, Clone, Default)]
pub struct PublicPaths {
    paths: Vec<String>,
}

impl PublicPaths {
    /// Create from a list of paths
    #[must_use]
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }

    /// Check if a path is public
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.paths.iter().any(|p| match p.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == p,
        })
    }
}
