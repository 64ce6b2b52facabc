//! # edge-authn
//!
//! Inbound credential verification for edge request handlers.
//!
//! Two kinds of caller reach the handlers: signed-in users carrying an
//! RS256 identity token from the identity provider, and an API gateway
//! delivering webhook callbacks with AWS Signature V4 style headers. This
//! crate checks both before any business logic runs.
//!
//! ## Features
//!
//! - **Identity tokens**: structural, algorithm, time, issuer, audience and signature checks, in a fixed order
//! - **Key rotation**: the provider's published certificates are fetched on demand and cached for an hour
//! - **Certificate parsing**: a small DER walker pulls the `SubjectPublicKeyInfo` out of each X.509 certificate
//! - **Webhook callbacks**: region and service pinning, a replay window and a body hash binding
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edge_authn::config::AuthConfig;
//! use edge_authn::gate::AuthGate;
//! use http::HeaderMap;
//!
//! # async fn handle(headers: HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::from_env()?;
//! let gate = AuthGate::from_config(&config)?;
//!
//! match gate.authenticate(&headers).await {
//!     Ok(caller) => println!("request from {}", caller.uid),
//!     Err(denial) => println!("{}", serde_json::to_string(&denial)?),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Security
//!
//! - Only `RS256` is accepted; `none` and HMAC algorithms are rejected before any key lookup
//! - Claim checks run before the key lookup, so foreign or expired tokens never trigger a fetch
//! - Webhook signatures are shape-checked only. See [`sigv4`] for what that does and does not cover.
//!
//! ## Error Handling
//!
//! Token verification returns `Result<T, Error>`. Every [`error::Error`]
//! maps to a stable [`error::ErrorCode`] for logs and metrics.

pub mod certificate;
pub mod config;
pub mod der;
pub mod error;
pub mod gate;
pub mod key_cache;
pub mod key_source;
pub mod sigv4;
pub mod token;
pub mod types;

#[cfg(test)]
mod testutil;

pub use config::AuthConfig;
pub use error::{Error, ErrorCode};
pub use gate::{AuthGate, AuthenticatedCaller, Denial};
pub use key_source::{KeySetFetcher, PublicKeySource};
pub use sigv4::RequestSignatureVerifier;
pub use token::IdentityTokenVerifier;
pub use types::token::VerifiedClaims;
