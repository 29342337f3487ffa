//! Key set fetching and caching
//!
//! [`KeySetProvider`] owns the cached handle to the identity provider's
//! published signing keys and coordinates concurrent callers:
//!
//! - **Single fetch per refresh cycle**: the first caller to observe a missing
//!   or expired handle starts the fetch; every concurrent caller attaches to
//!   the same in-progress future and receives the same result, handle or
//!   error.
//! - **Atomic handle swap**: the key set is immutable once fetched and is
//!   replaced, never mutated, so readers never observe a partially built
//!   handle.
//! - **Cooldown**: after any fetch attempt, no new fetch starts until the
//!   cooldown has elapsed, protecting the provider during an outage.
//!
//! The provider never retries internally; retry policy lives in
//! [`crate::verifier::TokenVerifier`].

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use base64::Engine;
use futures::{FutureExt, future::BoxFuture, future::Shared};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use warden_config::AuthConfig;

use crate::error::AuthError;

/// JSON Web Key as defined in RFC 7517
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("OKP" for EdDSA, "RSA" for RS256)
    pub kty: String,

    /// Public key use (should be "sig" for signatures)
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    /// Key ID - unique identifier for this key
    pub kid: String,

    /// Algorithm ("EdDSA", "RS256")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Curve (Ed25519 for EdDSA)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// Base64url encoded public key (for EdDSA)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// RSA modulus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// Convert this key to a jsonwebtoken `DecodingKey`
    pub fn to_decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match self.kty.as_str() {
            "OKP" => {
                let x = self
                    .x
                    .as_ref()
                    .ok_or_else(|| AuthError::KeyFetch("EdDSA key missing 'x' parameter".into()))?;

                // Raw 32-byte public key, base64url encoded
                let key_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
                    .decode(x)
                    .map_err(|e| {
                        AuthError::KeyFetch(format!("Failed to decode EdDSA public key: {}", e))
                    })?;

                // Wrap the raw key in a DER SubjectPublicKeyInfo
                let mut der = vec![
                    0x30, 0x2a, // SEQUENCE, 42 bytes
                    0x30, 0x05, // SEQUENCE, 5 bytes
                    0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
                    0x03, 0x21, 0x00, // BIT STRING, 33 bytes (32 + 1 padding indicator)
                ];
                der.extend_from_slice(&key_bytes);

                let pem = format!(
                    "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----",
                    base64::engine::general_purpose::STANDARD.encode(&der)
                );

                DecodingKey::from_ed_pem(pem.as_bytes()).map_err(|e| {
                    AuthError::KeyFetch(format!("Failed to create EdDSA decoding key: {}", e))
                })
            }
            "RSA" => {
                let n = self
                    .n
                    .as_ref()
                    .ok_or_else(|| AuthError::KeyFetch("RSA key missing 'n' parameter".into()))?;
                let e = self
                    .e
                    .as_ref()
                    .ok_or_else(|| AuthError::KeyFetch("RSA key missing 'e' parameter".into()))?;

                DecodingKey::from_rsa_components(n, e).map_err(|e| {
                    AuthError::KeyFetch(format!("Failed to create RSA decoding key: {}", e))
                })
            }
            _ => Err(AuthError::UnsupportedAlgorithm(format!(
                "Unsupported key type: {}",
                self.kty
            ))),
        }
    }

    /// Get the algorithm for this key
    pub fn algorithm(&self) -> Result<Algorithm, AuthError> {
        match (self.kty.as_str(), self.alg.as_deref()) {
            ("OKP", Some("EdDSA")) | ("OKP", None) => Ok(Algorithm::EdDSA),
            ("RSA", Some("RS256")) => Ok(Algorithm::RS256),
            (kty, alg) => Err(AuthError::UnsupportedAlgorithm(format!(
                "Unsupported key type/algorithm: {}/{}",
                kty,
                alg.unwrap_or("none")
            ))),
        }
    }
}

/// Key set document as published by the identity provider
#[derive(Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

/// Immutable snapshot of the identity provider's signing keys
///
/// Replaced wholesale on refresh; holders of an `Arc<KeySet>` keep a
/// consistent view for the lifetime of their verification.
#[derive(Clone, Debug)]
pub struct KeySet {
    keys: Vec<Jwk>,
    fetched_at: Instant,
}

impl KeySet {
    /// The keys contained in this snapshot
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// When this snapshot was fetched
    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// Age of this snapshot
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Find a key by ID using constant-time comparison
    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys
            .iter()
            .find(|k| k.kid.as_bytes().ct_eq(kid.as_bytes()).into())
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<KeySet>, AuthError>>>;

#[derive(Default)]
struct ProviderState {
    current: Option<Arc<KeySet>>,
    in_flight: Option<SharedFetch>,
    last_attempt: Option<Instant>,
}

/// Cached, single-flight provider of the identity provider's key set
pub struct KeySetProvider {
    http_client: reqwest::Client,
    jwks_url: String,
    max_age: Duration,
    cooldown: Duration,
    state: Mutex<ProviderState>,
}

impl KeySetProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created (typically due to
    /// TLS configuration issues)
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.keyset_fetch_timeout_ms))
            .build()
            .map_err(|e| AuthError::KeyFetch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            jwks_url: config.jwks_url.clone(),
            max_age: Duration::from_secs(config.keyset_max_age_seconds),
            cooldown: Duration::from_secs(config.keyset_cooldown_seconds),
            state: Mutex::new(ProviderState::default()),
        })
    }

    /// Get the current key set, fetching it if missing or expired
    ///
    /// Concurrent callers share a single fetch and all receive the same
    /// result. When a refresh fails but a previous handle exists, the previous
    /// handle is served; with no previous handle the fetch error is returned
    /// to every waiter.
    pub async fn get(&self) -> Result<Arc<KeySet>, AuthError> {
        let fetch = {
            let mut state = self.state.lock().await;

            if let Some(current) = &state.current {
                if current.age() < self.max_age {
                    tracing::debug!("Key set cache hit");
                    warden_observe::metrics::record_keyset_cache_hit();
                    return Ok(current.clone());
                }
            }

            if let Some(in_flight) = &state.in_flight {
                in_flight.clone()
            } else {
                if let Some(last) = state.last_attempt {
                    if last.elapsed() < self.cooldown {
                        // Within the cooldown window no new fetch may start,
                        // regardless of how the last attempt concluded.
                        return match &state.current {
                            Some(current) => {
                                tracing::debug!(
                                    "Key set expired but refresh is cooling down, serving previous handle"
                                );
                                warden_observe::metrics::record_keyset_stale_served();
                                Ok(current.clone())
                            }
                            None => Err(AuthError::ProviderUnavailable(
                                "key set fetch cooling down after failed attempt".into(),
                            )),
                        };
                    }
                }

                state.last_attempt = Some(Instant::now());
                tracing::info!(url = %self.jwks_url, "Key set missing or expired, fetching");
                warden_observe::metrics::record_keyset_cache_miss();

                let client = self.http_client.clone();
                let url = self.jwks_url.clone();
                let fetch: SharedFetch = async move { fetch_key_set(&client, &url).await }
                    .boxed()
                    .shared();
                state.in_flight = Some(fetch.clone());
                fetch
            }
        };

        // The in-flight future only makes progress while some caller polls
        // it; the client-level timeout bounds how long that can take.
        let result = fetch.clone().await;

        let mut state = self.state.lock().await;
        if state
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.ptr_eq(&fetch))
        {
            state.in_flight = None;
            if let Ok(key_set) = &result {
                state.current = Some(key_set.clone());
            }
        }

        match result {
            Ok(key_set) => Ok(key_set),
            Err(err) => match &state.current {
                Some(current) => {
                    tracing::warn!(error = %err, "Key set refresh failed, serving previous handle");
                    warden_observe::metrics::record_keyset_stale_served();
                    Ok(current.clone())
                }
                None => Err(err),
            },
        }
    }
}

/// Fetch the key set from the provider endpoint, recording metrics
async fn fetch_key_set(
    client: &reqwest::Client,
    url: &str,
) -> Result<Arc<KeySet>, AuthError> {
    let start = Instant::now();
    let result = fetch_key_set_inner(client, url).await;
    let duration = start.elapsed().as_secs_f64();

    warden_observe::metrics::record_keyset_refresh(duration, result.is_ok());

    match &result {
        Ok(key_set) => {
            tracing::info!(key_count = key_set.keys.len(), "Key set fetched");
        }
        Err(e) => {
            tracing::error!(error = %e, "Key set fetch failed");
        }
    }

    result
}

async fn fetch_key_set_inner(
    client: &reqwest::Client,
    url: &str,
) -> Result<Arc<KeySet>, AuthError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() || e.is_connect() {
            AuthError::ProviderUnavailable(format!("key set fetch failed: {}", e))
        } else {
            AuthError::KeyFetch(format!("key set fetch failed: {}", e))
        }
    })?;

    let status = response.status();
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(AuthError::ProviderUnavailable(format!(
            "key endpoint returned status {}",
            status
        )));
    }
    if !status.is_success() {
        return Err(AuthError::KeyFetch(format!(
            "key endpoint returned status {}",
            status
        )));
    }

    let document: JwksDocument = response
        .json()
        .await
        .map_err(|e| AuthError::KeyFetch(format!("Failed to parse key set: {}", e)))?;

    if document.keys.is_empty() {
        return Err(AuthError::KeyFetch("key set contains no keys".into()));
    }

    Ok(Arc::new(KeySet {
        keys: document.keys,
        fetched_at: Instant::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eddsa_jwk(kid: &str) -> Jwk {
        Jwk {
            kty: "OKP".into(),
            use_: Some("sig".into()),
            kid: kid.into(),
            alg: Some("EdDSA".into()),
            crv: Some("Ed25519".into()),
            x: Some("test".into()),
            n: None,
            e: None,
        }
    }

    #[test]
    fn test_jwk_algorithm_detection() {
        assert_eq!(eddsa_jwk("k1").algorithm().unwrap(), Algorithm::EdDSA);

        let rs256_jwk = Jwk {
            kty: "RSA".into(),
            use_: Some("sig".into()),
            kid: "k2".into(),
            alg: Some("RS256".into()),
            crv: None,
            x: None,
            n: Some("test".into()),
            e: Some("test".into()),
        };
        assert_eq!(rs256_jwk.algorithm().unwrap(), Algorithm::RS256);

        let unknown_jwk = Jwk {
            kty: "EC".into(),
            use_: None,
            kid: "k3".into(),
            alg: Some("ES256".into()),
            crv: None,
            x: None,
            n: None,
            e: None,
        };
        assert!(unknown_jwk.algorithm().is_err());
    }

    #[test]
    fn test_jwk_missing_parameters() {
        let mut jwk = eddsa_jwk("k1");
        jwk.x = None;
        assert!(jwk.to_decoding_key().is_err());

        let jwk = Jwk {
            kty: "RSA".into(),
            use_: None,
            kid: "k2".into(),
            alg: Some("RS256".into()),
            crv: None,
            x: None,
            n: None,
            e: None,
        };
        assert!(jwk.to_decoding_key().is_err());
    }

    #[test]
    fn test_key_set_find_key() {
        let key_set = KeySet {
            keys: vec![eddsa_jwk("key-001"), eddsa_jwk("key-002")],
            fetched_at: Instant::now(),
        };

        assert_eq!(key_set.find_key("key-001").unwrap().kid, "key-001");
        assert_eq!(key_set.find_key("key-002").unwrap().kid, "key-002");
        assert!(key_set.find_key("key-003").is_none());
    }

    #[test]
    fn test_key_set_age() {
        let key_set = KeySet {
            keys: vec![eddsa_jwk("key-001")],
            fetched_at: Instant::now() - Duration::from_secs(10),
        };

        assert!(key_set.age() >= Duration::from_secs(10));
    }

    #[test]
    fn test_jwks_document_deserialize() {
        let json = r#"{
            "keys": [
                {
                    "kty": "OKP",
                    "use": "sig",
                    "kid": "key-001",
                    "alg": "EdDSA",
                    "crv": "Ed25519",
                    "x": "abc"
                }
            ]
        }"#;

        let document: JwksDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.keys.len(), 1);
        assert_eq!(document.keys[0].kid, "key-001");
    }
}
