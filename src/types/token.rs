use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Decoded first segment of a compact token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Provider-specific sign-in details carried in the `firebase` claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FirebaseInfo {
    #[serde(default)]
    pub identities: Map<String, Value>,
    #[serde(default)]
    pub sign_in_provider: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The full decoded payload of a token that passed verification.
///
/// `iss` and `aud` are kept as raw JSON so that a token carrying them in an
/// unexpected shape (an audience array, a numeric issuer) is rejected by the
/// issuer/audience comparison rather than as malformed. A missing value is
/// `null`. `iat` and `exp` are required and may be integers or floats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifiedClaims {
    #[serde(default)]
    pub iss: Value,
    #[serde(default)]
    pub aud: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub iat: Number,
    pub exp: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firebase: Option<FirebaseInfo>,
    /// Every other claim, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VerifiedClaims {
    /// `user_id`, falling back to `sub`. Empty strings count as absent.
    pub fn subject(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.sub.as_deref().filter(|s| !s.is_empty()))
    }

    /// `iss`, when it is a string.
    pub fn issuer(&self) -> Option<&str> {
        self.iss.as_str()
    }

    /// `aud`, when it is a single string.
    pub fn audience(&self) -> Option<&str> {
        self.aud.as_str()
    }

    /// `iat` in epoch seconds.
    pub fn issued_at(&self) -> Option<f64> {
        self.iat.as_f64()
    }

    /// `exp` in epoch seconds.
    pub fn expires_at(&self) -> Option<f64> {
        self.exp.as_f64()
    }
}

/// Render a claim for an error message. A missing claim renders empty.
pub fn claim_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
