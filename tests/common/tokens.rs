//! Fixture keys, certificates and token builders.
//!
//! Shared by the unit tests (through `src/testutil.rs`) and the integration
//! tests (through `tests/common`), so both sign and verify the same claims.
#![allow(dead_code)]

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use sha2::Sha256;

pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
pub const OTHER_KEY_PEM: &str = include_str!("../fixtures/other_key.pem");
pub const CERT_V1_PEM: &str = include_str!("../fixtures/cert_v1.pem");
pub const CERT_V3_PEM: &str = include_str!("../fixtures/cert_v3.pem");
pub const OTHER_CERT_PEM: &str = include_str!("../fixtures/other_cert.pem");
pub const SIGNING_SPKI_PEM: &str = include_str!("../fixtures/signing_spki.pem");

pub const PROJECT_ID: &str = "clinic-notes-test";
pub const KID: &str = "kid-primary";
pub const OTHER_KID: &str = "kid-secondary";

pub fn b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn sign_with(private_key_pem: &str, message: &[u8]) -> Vec<u8> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem).unwrap();
    SigningKey::<Sha256>::new(private_key).sign(message).to_vec()
}

pub fn sign_rs256(message: &[u8]) -> Vec<u8> {
    sign_with(SIGNING_KEY_PEM, message)
}

/// Encode and RS256-sign a compact token.
pub fn encode_token(header: &Value, payload: &Value, private_key_pem: &str) -> String {
    let signing_input = format!(
        "{}.{}",
        b64url(header.to_string().as_bytes()),
        b64url(payload.to_string().as_bytes())
    );
    let signature = sign_with(private_key_pem, signing_input.as_bytes());
    format!("{}.{}", signing_input, b64url(&signature))
}

pub fn header_for(kid: &str) -> Value {
    json!({ "alg": "RS256", "kid": kid, "typ": "JWT" })
}

/// Claims that pass every check at `now`.
pub fn claims_at(now: i64) -> Value {
    json!({
        "iss": format!("https://securetoken.google.com/{}", PROJECT_ID),
        "aud": PROJECT_ID,
        "auth_time": now - 60,
        "user_id": "uid-123",
        "sub": "uid-123",
        "iat": now - 60,
        "exp": now + 3600,
        "email": "clinician@example.com",
        "email_verified": true,
        "firebase": {
            "identities": { "email": ["clinician@example.com"] },
            "sign_in_provider": "password"
        }
    })
}

pub fn key_set() -> HashMap<String, String> {
    HashMap::from([
        (KID.to_string(), CERT_V3_PEM.to_string()),
        (OTHER_KID.to_string(), OTHER_CERT_PEM.to_string()),
    ])
}
