//! Boundary check for webhook callbacks signed with AWS Signature V4 headers.
//!
//! [`RequestSignatureVerifier::verify`] is a yes/no gate. It requires the
//! `authorization`, `x-amz-date` and `x-amz-content-sha256` headers, pins the
//! credential scope to the configured region and service, enforces a replay
//! window around `x-amz-date`, and binds the declared content hash to the raw
//! body bytes. The reason for a rejection is emitted as a `tracing` event and
//! is never returned to the caller; [`RequestSignatureVerifier::evaluate_at`]
//! exposes it as a typed value for metrics and tests.
//!
//! Known limitation: the signing secret is not available at this boundary, so
//! the `Signature` field is only checked to be 64 lowercase hex characters.
//! No HMAC is recomputed. Authenticity rests on the scope, timestamp and
//! content-hash checks together.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use http::HeaderMap;
use sha2::{Digest, Sha256};

use crate::types::sigv4::{AuthorizationHeader, CredentialScope, VerifiedWebhook};

pub const ALGORITHM_TAG: &str = "AWS4-HMAC-SHA256";
pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const DATE_HEADER: &str = "x-amz-date";
pub const CONTENT_SHA256_HEADER: &str = "x-amz-content-sha256";
pub const SCOPE_TERMINATOR: &str = "aws4_request";

/// API Gateway signs its callbacks for this service. It is accepted in
/// addition to the configured service, and nothing else is.
pub const API_GATEWAY_SERVICE: &str = "execute-api";

pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_secs(15 * 60);

const SIGNATURE_HEX_LEN: usize = 64;

/// Why a signed request was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingHeader(&'static str),
    MalformedAuthorization,
    MalformedCredential,
    RegionMismatch { expected: String, actual: String },
    ServiceMismatch { expected: String, actual: String },
    MalformedTimestamp,
    OutsideReplayWindow { skew_ms: i64 },
    ContentHashMismatch,
    MalformedSignature,
}

impl RejectReason {
    /// Short stable label for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MissingHeader(_) => "missing_header",
            RejectReason::MalformedAuthorization => "malformed_authorization",
            RejectReason::MalformedCredential => "malformed_credential",
            RejectReason::RegionMismatch { .. } => "region_mismatch",
            RejectReason::ServiceMismatch { .. } => "service_mismatch",
            RejectReason::MalformedTimestamp => "malformed_timestamp",
            RejectReason::OutsideReplayWindow { .. } => "outside_replay_window",
            RejectReason::ContentHashMismatch => "content_hash_mismatch",
            RejectReason::MalformedSignature => "malformed_signature",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingHeader(name) => write!(f, "missing {} header", name),
            RejectReason::MalformedAuthorization => write!(f, "invalid Authorization header format"),
            RejectReason::MalformedCredential => write!(f, "invalid credential scope format"),
            RejectReason::RegionMismatch { expected, actual } => write!(
                f,
                "credential region '{}' does not match expected '{}'",
                actual, expected
            ),
            RejectReason::ServiceMismatch { expected, actual } => write!(
                f,
                "credential service '{}' does not match expected '{}' or '{}'",
                actual, expected, API_GATEWAY_SERVICE
            ),
            RejectReason::MalformedTimestamp => write!(f, "invalid {} format", DATE_HEADER),
            RejectReason::OutsideReplayWindow { skew_ms } => {
                write!(f, "request timestamp is {} ms away from now", skew_ms)
            }
            RejectReason::ContentHashMismatch => write!(f, "content hash mismatch"),
            RejectReason::MalformedSignature => write!(f, "signature is not 64 lowercase hex characters"),
        }
    }
}

/// Parse the authorization header. Fields after the algorithm tag may come
/// in any order and unrelated fields are ignored.
pub fn parse_authorization(value: &str) -> Option<AuthorizationHeader> {
    let rest = value.trim().strip_prefix(ALGORITHM_TAG)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;
    for field in rest.split(',') {
        let Some((name, val)) = field.trim().split_once('=') else {
            continue;
        };
        let slot = match name.trim() {
            "Credential" => &mut credential,
            "SignedHeaders" => &mut signed_headers,
            "Signature" => &mut signature,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(val.trim());
        }
    }

    let credential = credential.filter(|s| !s.is_empty())?;
    let signed_headers = signed_headers.filter(|s| !s.is_empty())?;
    let signature = signature.filter(|s| !s.is_empty())?;
    Some(AuthorizationHeader {
        credential: credential.to_string(),
        signed_headers: signed_headers.split(';').map(str::to_string).collect(),
        signature: signature.to_string(),
    })
}

/// Parse `accessKeyId/YYYYMMDD/region/service/aws4_request`.
pub fn parse_credential_scope(credential: &str) -> Option<CredentialScope> {
    let parts: Vec<&str> = credential.split('/').collect();
    let &[access_key_id, date, region, service, terminator] = parts.as_slice() else {
        return None;
    };

    let scope_component =
        |s: &str| !s.is_empty() && s.bytes().all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-'));

    let well_formed = !access_key_id.is_empty()
        && access_key_id
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        && date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && scope_component(region)
        && scope_component(service)
        && terminator == SCOPE_TERMINATOR;

    well_formed.then(|| CredentialScope {
        access_key_id: access_key_id.to_string(),
        date: date.to_string(),
        region: region.to_string(),
        service: service.to_string(),
    })
}

/// Parse the compact `YYYYMMDDTHHMMSSZ` timestamp.
pub fn parse_amz_date(value: &str) -> Option<DateTime<Utc>> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 16
        && bytes[8] == b'T'
        && bytes[15] == b'Z'
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[9..15].iter().all(u8::is_ascii_digit);
    if !shape_ok {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Format `time` the way `x-amz-date` carries it.
pub fn format_amz_date(time: &DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Lowercase hex SHA-256 of `body`.
pub fn content_sha256(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

#[derive(Debug, Clone)]
pub struct RequestSignatureVerifier {
    region: String,
    service: String,
    replay_window: Duration,
}

impl RequestSignatureVerifier {
    pub fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
            replay_window: DEFAULT_REPLAY_WINDOW,
        }
    }

    pub fn with_replay_window(mut self, replay_window: Duration) -> Self {
        self.replay_window = replay_window;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// `true` only if every check passes. `body` must be the bytes exactly as received.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        self.verify_at(headers, body, Utc::now())
    }

    pub fn verify_at(&self, headers: &HeaderMap, body: &[u8], now: DateTime<Utc>) -> bool {
        match self.evaluate_at(headers, body, now) {
            Ok(verified) => {
                tracing::info!(
                    region = %verified.scope.region,
                    service = %verified.scope.service,
                    date = %verified.scope.date,
                    access_key = %verified.scope.access_key_hint(),
                    signed_headers = %verified.signed_headers.join(";"),
                    skew_ms = verified.skew_ms,
                    "webhook signature checks passed"
                );
                true
            }
            Err(reason) => {
                tracing::warn!(reason = reason.code(), detail = %reason, "webhook signature rejected");
                false
            }
        }
    }

    /// Run every check and report the first failure.
    pub fn evaluate_at(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<VerifiedWebhook, RejectReason> {
        let authorization = header(headers, AUTHORIZATION_HEADER)?;
        let amz_date = header(headers, DATE_HEADER)?;
        let declared_hash = header(headers, CONTENT_SHA256_HEADER)?;

        let auth = parse_authorization(authorization).ok_or(RejectReason::MalformedAuthorization)?;
        let scope =
            parse_credential_scope(&auth.credential).ok_or(RejectReason::MalformedCredential)?;

        if scope.region != self.region {
            return Err(RejectReason::RegionMismatch {
                expected: self.region.clone(),
                actual: scope.region,
            });
        }
        if scope.service != self.service && scope.service != API_GATEWAY_SERVICE {
            return Err(RejectReason::ServiceMismatch {
                expected: self.service.clone(),
                actual: scope.service,
            });
        }

        let request_time = parse_amz_date(amz_date).ok_or(RejectReason::MalformedTimestamp)?;
        let skew_ms = now
            .signed_duration_since(request_time)
            .num_milliseconds()
            .abs();
        let window_ms = i64::try_from(self.replay_window.as_millis()).unwrap_or(i64::MAX);
        if skew_ms > window_ms {
            return Err(RejectReason::OutsideReplayWindow { skew_ms });
        }

        if !content_sha256(body).eq_ignore_ascii_case(declared_hash) {
            return Err(RejectReason::ContentHashMismatch);
        }

        let signature_ok = auth.signature.len() == SIGNATURE_HEX_LEN
            && auth
                .signature
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !signature_ok {
            return Err(RejectReason::MalformedSignature);
        }

        Ok(VerifiedWebhook {
            scope,
            signed_headers: auth.signed_headers,
            request_time,
            skew_ms,
        })
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, RejectReason> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(RejectReason::MissingHeader(name))
}
