//! # Warden Auth
//!
//! Bearer token verification against a remotely published key set.
//!
//! Three pieces compose into the authentication core of a host process:
//!
//! - [`KeySetProvider`] lazily fetches and caches the identity provider's
//!   public signing keys, deduplicating concurrent fetches and respecting a
//!   cooldown between refresh attempts.
//! - [`TokenVerifier`] validates a token's signature, algorithm, issuer, and
//!   time claims against the current key set, retrying transient failures
//!   under a bounded [`RetryPolicy`] with a per-attempt deadline.
//! - Per-principal metadata caching lives in the `warden-cache` crate.
//!
//! ## Security
//!
//! - Only asymmetric algorithms (EdDSA, RS256) are accepted by default
//! - `none` and the symmetric HS* family are rejected unconditionally
//! - Key ids, issuers, and algorithm names are compared in constant time
//! - No unsafe code is allowed in this crate
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use warden_auth::{KeySetProvider, TokenVerifier};
//! use warden_config::AuthConfig;
//!
//! # async fn example(token: &str) -> Result<(), warden_auth::AuthError> {
//! let config = AuthConfig {
//!     jwks_url: "https://id.example.com/.well-known/jwks.json".into(),
//!     expected_issuer: "https://id.example.com".into(),
//!     ..AuthConfig::default()
//! };
//!
//! let provider = Arc::new(KeySetProvider::new(&config)?);
//! let verifier = TokenVerifier::new(provider, &config);
//!
//! let claims = verifier.verify(token).await?;
//! println!("Authenticated principal: {}", claims.principal());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Authentication errors
pub mod error;
/// Claims and unverified decode helpers
pub mod jwt;
/// Key set fetching and caching
pub mod keyset;
/// Claim validation
pub mod validation;
/// Token verification with bounded retry
pub mod verifier;

pub use error::AuthError;
pub use jwt::{Claims, TokenHeader};
pub use keyset::{Jwk, KeySet, KeySetProvider};
pub use verifier::{RetryPolicy, TokenVerifier};
