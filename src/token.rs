//! Verification of RS256 identity tokens issued by the identity provider.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. three dot-separated segments
//! 2. header decodes, `alg` is exactly `RS256` (no negotiation)
//! 3. payload decodes
//! 4. `exp` is in the future, `iat` is not
//! 5. `iss` equals `{issuer_base}/{project_id}`, `aud` equals the expected audience
//! 6. the `kid` resolves through [`PublicKeySource`]
//! 7. the PKCS#1 v1.5 / SHA-256 signature over `header.payload` verifies
//! 8. `user_id` or `sub` is present
//!
//! Claim checks happen before the key lookup, so expired or foreign tokens
//! never cause a key fetch.

use std::sync::Arc;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::key_source::PublicKeySource;
use crate::types::token::{claim_text, TokenHeader, VerifiedClaims};

/// The only accepted signing algorithm.
pub const SUPPORTED_ALGORITHM: &str = "RS256";

/// Issuer prefix for Firebase Auth ID tokens.
pub const DEFAULT_ISSUER_BASE: &str = "https://securetoken.google.com";

/// base64url that tolerates, but does not require, `=` padding.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// `{issuer_base}/{project_id}`.
pub fn expected_issuer(issuer_base: &str, project_id: &str) -> String {
    format!("{}/{}", issuer_base.trim_end_matches('/'), project_id)
}

/// Base64url-decode a token segment and parse it as JSON.
pub fn decode_segment<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T, Error> {
    let bytes = BASE64URL.decode(segment).map_err(|e| {
        Error::MalformedHeaderOrPayload(format!("{} is not base64url: {}", what, e))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedHeaderOrPayload(format!("{} is not valid JSON: {}", what, e)))
}

pub struct IdentityTokenVerifier {
    keys: Arc<PublicKeySource>,
    issuer: String,
}

impl IdentityTokenVerifier {
    pub fn new(issuer_base: &str, project_id: &str, keys: Arc<PublicKeySource>) -> Self {
        Self {
            keys,
            issuer: expected_issuer(issuer_base, project_id),
        }
    }

    /// Verifier for Firebase Auth tokens of `project_id`.
    pub fn for_project(project_id: &str, keys: Arc<PublicKeySource>) -> Self {
        Self::new(DEFAULT_ISSUER_BASE, project_id, keys)
    }

    pub fn expected_issuer(&self) -> &str {
        &self.issuer
    }

    pub fn key_source(&self) -> &PublicKeySource {
        &self.keys
    }

    /// Verify `token` against the current wall-clock time.
    pub async fn verify(&self, token: &str, expected_audience: &str) -> Result<VerifiedClaims, Error> {
        self.verify_at(token, expected_audience, Utc::now().timestamp())
            .await
    }

    /// Verify `token` as of `now` (epoch seconds).
    pub async fn verify_at(
        &self,
        token: &str,
        expected_audience: &str,
        now: i64,
    ) -> Result<VerifiedClaims, Error> {
        let result = self.check(token, expected_audience, now).await;
        match &result {
            Ok(claims) => tracing::debug!(
                sub = claims.subject().unwrap_or_default(),
                "identity token verified"
            ),
            Err(e) => tracing::warn!(code = %e.code(), error = %e, "identity token rejected"),
        }
        result
    }

    async fn check(
        &self,
        token: &str,
        expected_audience: &str,
        now: i64,
    ) -> Result<VerifiedClaims, Error> {
        let parts: Vec<&str> = token.split('.').collect();
        let &[header_b64, payload_b64, signature_b64] = parts.as_slice() else {
            return Err(Error::MalformedToken);
        };

        let header: TokenHeader = decode_segment(header_b64, "header")?;
        if header.alg != SUPPORTED_ALGORITHM {
            return Err(Error::UnsupportedAlgorithm(header.alg));
        }

        let claims: VerifiedClaims = decode_segment(payload_b64, "payload")?;

        let (Some(exp), Some(iat)) = (claims.expires_at(), claims.issued_at()) else {
            return Err(Error::MalformedHeaderOrPayload(
                "exp and iat must be numeric".to_string(),
            ));
        };
        let now_secs = now as f64;
        if exp <= now_secs {
            return Err(Error::TokenExpired);
        }
        if iat > now_secs {
            return Err(Error::TokenNotYetValid);
        }

        if claims.issuer() != Some(self.issuer.as_str()) {
            return Err(Error::IssuerMismatch {
                expected: self.issuer.clone(),
                actual: claim_text(&claims.iss),
            });
        }
        if claims.audience() != Some(expected_audience) {
            return Err(Error::AudienceMismatch {
                expected: expected_audience.to_string(),
                actual: claim_text(&claims.aud),
            });
        }

        let key = self.keys.get_key(&header.kid).await?;

        let signature = BASE64URL
            .decode(signature_b64)
            .map_err(|_| Error::SignatureInvalid)?;
        let signing_input = format!("{}.{}", header_b64, payload_b64);
        if !key.verify(signing_input.as_bytes(), &signature) {
            return Err(Error::SignatureInvalid);
        }

        if claims.subject().is_none() {
            return Err(Error::MissingSubject);
        }

        Ok(claims)
    }
}
