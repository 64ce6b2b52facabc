use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed token: expected three dot-separated segments")]
    MalformedToken,

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Malformed token header or payload: {0}")]
    MalformedHeaderOrPayload(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token used before issued")]
    TokenNotYetValid,

    #[error("Invalid issuer: expected {expected}, got {actual}")]
    IssuerMismatch { expected: String, actual: String },

    #[error("Invalid audience: expected {expected}, got {actual}")]
    AudienceMismatch { expected: String, actual: String },

    #[error("Public key not found for kid: {0}")]
    UnknownSigningKey(String),

    #[error("Invalid token signature")]
    SignatureInvalid,

    #[error("No subject or user_id in token")]
    MissingSubject,

    #[error("Key source unavailable: {0}")]
    KeySourceUnavailable(String),

    #[error("Invalid PEM: {0}")]
    InvalidPem(String),

    #[error("Invalid certificate structure: {0}")]
    InvalidCertificateStructure(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::MalformedToken => ErrorCode::MalformedToken,
            Error::UnsupportedAlgorithm(_) => ErrorCode::UnsupportedAlgorithm,
            Error::MalformedHeaderOrPayload(_) => ErrorCode::MalformedHeaderOrPayload,
            Error::TokenExpired => ErrorCode::TokenExpired,
            Error::TokenNotYetValid => ErrorCode::TokenNotYetValid,
            Error::IssuerMismatch { .. } => ErrorCode::IssuerMismatch,
            Error::AudienceMismatch { .. } => ErrorCode::AudienceMismatch,
            Error::UnknownSigningKey(_) => ErrorCode::UnknownSigningKey,
            Error::SignatureInvalid => ErrorCode::SignatureInvalid,
            Error::MissingSubject => ErrorCode::MissingSubject,
            Error::KeySourceUnavailable(_) => ErrorCode::KeySourceUnavailable,
            Error::InvalidPem(_) => ErrorCode::InvalidPem,
            Error::InvalidCertificateStructure(_) => ErrorCode::InvalidCertificateStructure,
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::InvalidPem(err.to_string())
    }
}

/// Error codes for structured logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "MALFORMED_TOKEN")]
    MalformedToken,
    #[serde(rename = "UNSUPPORTED_ALGORITHM")]
    UnsupportedAlgorithm,
    #[serde(rename = "MALFORMED_HEADER_OR_PAYLOAD")]
    MalformedHeaderOrPayload,
    #[serde(rename = "TOKEN_EXPIRED")]
    TokenExpired,
    #[serde(rename = "TOKEN_NOT_YET_VALID")]
    TokenNotYetValid,
    #[serde(rename = "ISSUER_MISMATCH")]
    IssuerMismatch,
    #[serde(rename = "AUDIENCE_MISMATCH")]
    AudienceMismatch,
    #[serde(rename = "UNKNOWN_SIGNING_KEY")]
    UnknownSigningKey,
    #[serde(rename = "SIGNATURE_INVALID")]
    SignatureInvalid,
    #[serde(rename = "MISSING_SUBJECT")]
    MissingSubject,
    #[serde(rename = "KEY_SOURCE_UNAVAILABLE")]
    KeySourceUnavailable,
    #[serde(rename = "INVALID_PEM")]
    InvalidPem,
    #[serde(rename = "INVALID_CERTIFICATE_STRUCTURE")]
    InvalidCertificateStructure,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::MalformedToken => "MALFORMED_TOKEN",
            ErrorCode::UnsupportedAlgorithm => "UNSUPPORTED_ALGORITHM",
            ErrorCode::MalformedHeaderOrPayload => "MALFORMED_HEADER_OR_PAYLOAD",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::TokenNotYetValid => "TOKEN_NOT_YET_VALID",
            ErrorCode::IssuerMismatch => "ISSUER_MISMATCH",
            ErrorCode::AudienceMismatch => "AUDIENCE_MISMATCH",
            ErrorCode::UnknownSigningKey => "UNKNOWN_SIGNING_KEY",
            ErrorCode::SignatureInvalid => "SIGNATURE_INVALID",
            ErrorCode::MissingSubject => "MISSING_SUBJECT",
            ErrorCode::KeySourceUnavailable => "KEY_SOURCE_UNAVAILABLE",
            ErrorCode::InvalidPem => "INVALID_PEM",
            ErrorCode::InvalidCertificateStructure => "INVALID_CERTIFICATE_STRUCTURE",
        };
        write!(f, "{}", s)
    }
}
