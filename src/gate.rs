//! Request-level entry points for handlers.
//!
//! Handlers call [`AuthGate::authenticate`] for user requests and
//! [`AuthGate::authorize_webhook`] for signed callbacks, then turn a
//! [`Denial`] straight into a JSON response body. Denials never say which
//! check failed; the detailed reason only goes to the log.

use chrono::{DateTime, Utc};
use http::header::AUTHORIZATION;
use http::HeaderMap;
use serde::Serialize;
use thiserror::Error;

use crate::sigv4::RequestSignatureVerifier;
use crate::token::IdentityTokenVerifier;
use crate::types::token::VerifiedClaims;

/// Header the web client sends the identity token in.
pub const IDENTITY_TOKEN_HEADER: &str = "x-firebase-token";

/// Rejection suitable for an HTTP response: `{"error", "code", "status"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{status} {code}: {error}")]
pub struct Denial {
    pub error: String,
    pub code: &'static str,
    pub status: u16,
}

impl Denial {
    pub fn missing_token() -> Self {
        Self {
            error: format!("Missing {} header", IDENTITY_TOKEN_HEADER),
            code: "MISSING_TOKEN",
            status: 401,
        }
    }

    pub fn invalid_token() -> Self {
        Self {
            error: "Invalid or expired token".to_string(),
            code: "INVALID_TOKEN",
            status: 401,
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            error: "Unauthorized".to_string(),
            code: "UNAUTHORIZED",
            status: 401,
        }
    }
}

/// A user whose identity token verified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticatedCaller {
    pub uid: String,
    pub email: Option<String>,
    pub claims: VerifiedClaims,
}

fn non_empty<'a>(headers: &'a HeaderMap, name: impl http::header::AsHeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn strip_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Token from `x-firebase-token` (an optional `Bearer ` prefix is dropped),
/// falling back to `Authorization: Bearer <token>`.
pub fn extract_identity_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = non_empty(headers, IDENTITY_TOKEN_HEADER) {
        return match strip_bearer(value) {
            Some(token) => Some(token),
            None if value.contains(' ') => None,
            None => Some(value),
        };
    }
    non_empty(headers, AUTHORIZATION).and_then(strip_bearer)
}

pub struct AuthGate {
    tokens: IdentityTokenVerifier,
    webhooks: RequestSignatureVerifier,
    audience: String,
}

impl AuthGate {
    pub fn new(
        tokens: IdentityTokenVerifier,
        webhooks: RequestSignatureVerifier,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            webhooks,
            audience: audience.into(),
        }
    }

    /// Wire both verifiers from configuration, fetching keys over HTTPS.
    #[cfg(feature = "fetch")]
    pub fn from_config(config: &crate::config::AuthConfig) -> Result<Self, crate::error::Error> {
        use std::sync::Arc;

        use crate::key_source::PublicKeySource;

        let keys = PublicKeySource::from_url(&config.keys_url, config.key_fetch_timeout())?
            .with_ttl(config.key_cache_ttl());
        let tokens =
            IdentityTokenVerifier::new(&config.issuer_base, &config.project_id, Arc::new(keys));
        let webhooks =
            RequestSignatureVerifier::new(&config.webhook_region, &config.webhook_service)
                .with_replay_window(config.replay_window());
        Ok(Self::new(tokens, webhooks, &config.project_id))
    }

    pub fn token_verifier(&self) -> &IdentityTokenVerifier {
        &self.tokens
    }

    pub fn webhook_verifier(&self) -> &RequestSignatureVerifier {
        &self.webhooks
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedCaller, Denial> {
        self.authenticate_at(headers, Utc::now().timestamp()).await
    }

    pub async fn authenticate_at(
        &self,
        headers: &HeaderMap,
        now: i64,
    ) -> Result<AuthenticatedCaller, Denial> {
        let token = extract_identity_token(headers).ok_or_else(Denial::missing_token)?;

        // The verifier logs the precise failure; the caller only learns "invalid".
        let claims = self
            .tokens
            .verify_at(token, &self.audience, now)
            .await
            .map_err(|_| Denial::invalid_token())?;

        let uid = claims
            .subject()
            .ok_or_else(Denial::invalid_token)?
            .to_string();
        Ok(AuthenticatedCaller {
            uid,
            email: claims.email.clone(),
            claims,
        })
    }

    pub fn authorize_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), Denial> {
        self.authorize_webhook_at(headers, body, Utc::now())
    }

    pub fn authorize_webhook_at(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        if self.webhooks.verify_at(headers, body, now) {
            Ok(())
        } else {
            Err(Denial::unauthorized())
        }
    }
}
