//! Access token verification against the user pool's JWKS document.
//!
//! The key set is fetched lazily on the first verification and cached for the
//! process lifetime, matching the rotation model of Cognito pools (keys only
//! change when the pool is recreated).

use std::sync::Arc;

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::config::Config;
use crate::errors::Error;

/// Claims carried by pool-issued JWTs. Access tokens identify the client via
/// `client_id` and the user via `username`; ID tokens use `aud` and
/// `cognito:username` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, rename = "cognito:username")]
    pub cognito_username: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub token_use: Option<String>,
}

impl AccessClaims {
    /// The username, whichever claim flavor carried it.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().or(self.cognito_username.as_deref())
    }
}

/// Verifies RS256 tokens against the pool's JWKS document.
#[derive(Clone)]
pub struct TokenVerifier {
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    client_id: String,
    keys: Arc<OnceCell<JwkSet>>,
}

impl TokenVerifier {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build().map_err(|e| Error::Internal {
            operation: format!("build JWKS http client: {e}"),
        })?;

        Ok(Self {
            http,
            jwks_url: config.jwks_url(),
            issuer: config.cognito_issuer(),
            client_id: config.cognito.client_id.clone(),
            keys: Arc::new(OnceCell::new()),
        })
    }

    /// Verify signature, expiry, issuer and client binding, returning the claims.
    pub async fn verify(&self, token: &str) -> Result<AccessClaims, Error> {
        let jwks = self.keys().await?;

        let header = decode_header(token).map_err(map_jwt_error)?;
        let kid = header.kid.ok_or(Error::Unauthenticated { message: None })?;
        let jwk = jwks.find(&kid).ok_or_else(|| {
            trace!("Token signed with unknown key id {kid}");
            Error::Unauthenticated { message: None }
        })?;

        let key = DecodingKey::from_jwk(jwk).map_err(|e| Error::Internal {
            operation: format!("build decoding key for {kid}: {e}"),
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        // Access tokens carry `client_id` instead of `aud`; both flavors are
        // checked by hand below.
        validation.validate_aud = false;

        let data = decode::<AccessClaims>(token, &key, &validation).map_err(map_jwt_error)?;
        let claims = data.claims;

        let client_matches = claims.aud.as_deref() == Some(self.client_id.as_str())
            || claims.client_id.as_deref() == Some(self.client_id.as_str());
        if !client_matches {
            trace!("Token was not issued for this app client");
            return Err(Error::Unauthenticated { message: None });
        }

        Ok(claims)
    }

    async fn keys(&self) -> Result<&JwkSet, Error> {
        self.keys.get_or_try_init(|| self.fetch_jwks()).await
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, Error> {
        let response = self
            .http
            .get(self.jwks_url.as_str())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::Internal {
                operation: format!("fetch JWKS from {}: {e}", self.jwks_url),
            })?;

        let jwks: JwkSet = response.json().await.map_err(|e| Error::Internal {
            operation: format!("parse JWKS from {}: {e}", self.jwks_url),
        })?;

        debug!("Fetched {} signing keys from {}", jwks.keys.len(), self.jwks_url);
        Ok(jwks)
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> Error {
    match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Server errors (500) - key issues, internal failures
        jsonwebtoken::errors::ErrorKind::InvalidEcdsaKey
        | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_)
        | jsonwebtoken::errors::ErrorKind::RsaFailedSigning
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName
        | jsonwebtoken::errors::ErrorKind::InvalidKeyFormat
        | jsonwebtoken::errors::ErrorKind::MissingAlgorithm
        | jsonwebtoken::errors::ErrorKind::Json(_)
        | jsonwebtoken::errors::ErrorKind::Utf8(_)
        | jsonwebtoken::errors::ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        // Catch-all for any future error variants (default to server error for safety)
        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    }
}
