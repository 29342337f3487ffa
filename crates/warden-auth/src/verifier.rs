//! Token verification with bounded retry
//!
//! [`TokenVerifier`] validates a raw bearer token against the current key set:
//! signature, algorithm allow-list, issuer, time claims, and optionally the
//! audience. Transient failures (key endpoint unreachable, attempt deadline
//! exceeded) are retried under an explicit [`RetryPolicy`]; semantic failures
//! are returned immediately since retrying cannot change their outcome.
//!
//! Verification itself is a pure computation over a token and a key set; the
//! only suspension points are the key fetch performed via
//! [`KeySetProvider`] and the per-attempt deadline. Dropping the future
//! returned by [`TokenVerifier::verify`] cancels the in-progress attempt and
//! the retry loop with it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};
use warden_config::AuthConfig;

use crate::{
    error::AuthError,
    jwt::{self, Claims},
    keyset::KeySetProvider,
    validation::{
        validate_algorithm, validate_audience, validate_issuer, validate_timestamp_claims,
    },
};

/// Bounded retry policy for transient verification failures
///
/// Backoff is linear in the attempt number: the delay before the retry
/// following attempt `n` is `n * base_delay`. No delay is applied after the
/// final attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy allowing up to `max_attempts` attempts (minimum 1)
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Maximum number of attempts, first attempt included
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed after `attempt` completed attempts
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to apply before the retry following attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Verifies bearer tokens against the key set published by the identity
/// provider
pub struct TokenVerifier {
    key_set_provider: Arc<KeySetProvider>,
    expected_issuer: String,
    expected_audience: Option<String>,
    accepted_algorithms: Vec<String>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    clock_skew_seconds: u64,
    max_token_age_seconds: u64,
}

impl TokenVerifier {
    /// Create a verifier backed by the given key set provider
    pub fn new(key_set_provider: Arc<KeySetProvider>, config: &AuthConfig) -> Self {
        Self {
            key_set_provider,
            expected_issuer: config.expected_issuer.clone(),
            expected_audience: config.expected_audience.clone(),
            accepted_algorithms: config.accepted_algorithms.clone(),
            retry: RetryPolicy::new(
                config.verify_max_attempts,
                Duration::from_millis(config.verify_backoff_base_ms),
            ),
            attempt_timeout: Duration::from_millis(config.verify_attempt_timeout_ms),
            clock_skew_seconds: config.clock_skew_seconds,
            max_token_age_seconds: config.max_token_age_seconds,
        }
    }

    /// Verify a raw bearer token and return its claims
    ///
    /// # Errors
    ///
    /// Semantic failures (`InvalidSignature`, `InvalidIssuer`,
    /// `UnsupportedAlgorithm`, `TokenExpired`, ...) are returned on the first
    /// attempt. Transient failures are retried per the configured policy;
    /// once the budget is spent, `VerificationFailed` is returned.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let start = Instant::now();
        let result = self.verify_with_retry(token).await;
        let duration = start.elapsed().as_secs_f64();

        warden_observe::metrics::record_verification(
            if result.is_ok() { "success" } else { "failure" },
            duration,
        );

        result
    }

    async fn verify_with_retry(&self, token: &str) -> Result<Claims, AuthError> {
        let mut attempt = 1u32;

        loop {
            let outcome = match timeout(self.attempt_timeout, self.verify_once(token)).await {
                Ok(result) => result,
                Err(_) => Err(AuthError::AttemptTimeout),
            };

            let err = match outcome {
                Ok(claims) => return Ok(claims),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => err,
            };

            if !self.retry.allows_retry(attempt) {
                tracing::warn!(
                    attempts = attempt,
                    error = %err,
                    "Verification retries exhausted"
                );
                return Err(AuthError::VerificationFailed {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            let delay = self.retry.backoff(attempt);
            tracing::debug!(
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient verification failure, retrying"
            );
            warden_observe::metrics::record_verification_retry();
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// A single verification attempt
    async fn verify_once(&self, token: &str) -> Result<Claims, AuthError> {
        let header = jwt::decode_token_header(token)?;

        validate_algorithm(&header.alg, &self.accepted_algorithms)?;
        let algorithm = header
            .alg
            .parse()
            .map_err(|_| AuthError::UnsupportedAlgorithm(header.alg.clone()))?;

        let kid = header.kid.ok_or_else(|| {
            AuthError::InvalidTokenFormat("token header missing 'kid' field".into())
        })?;

        let key_set = self.key_set_provider.get().await?;
        let jwk = key_set
            .find_key(&kid)
            .ok_or_else(|| AuthError::KeyNotFound(kid.clone()))?;
        let decoding_key = jwk.to_decoding_key()?;

        let claims = jwt::verify_signature(token, &decoding_key, algorithm)?;

        validate_issuer(&claims.iss, &self.expected_issuer)?;
        validate_timestamp_claims(&claims, self.clock_skew_seconds, self.max_token_age_seconds)?;
        validate_audience(claims.aud.as_deref(), self.expected_audience.as_deref())?;

        Ok(claims)
    }
}
