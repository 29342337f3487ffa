//! Token claim validation
//!
//! Claim checks shared by the verifier:
//! - Algorithm allow-list with unconditional rejection of insecure algorithms
//! - Exact issuer matching
//! - Timestamp validation with configurable clock skew and maximum token age
//! - Optional audience matching

use std::time::{SystemTime, UNIX_EPOCH};

use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{error::AuthError, jwt::Claims};

/// Algorithms that are never accepted for security reasons
///
/// `none` carries no signature at all; the HS* family is symmetric, and a
/// verifier holding only public keys must not be coaxed into using one as an
/// HMAC secret.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Validate a token's algorithm against the accepted list
///
/// Uses constant-time comparison to prevent timing attacks.
pub fn validate_algorithm(alg: &str, accepted_algorithms: &[String]) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS
        .iter()
        .any(|forbidden| alg.as_bytes().ct_eq(forbidden.as_bytes()).into())
    {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "Algorithm '{}' is not allowed for security reasons",
            alg
        )));
    }

    if !accepted_algorithms
        .iter()
        .any(|a| a.as_bytes().ct_eq(alg.as_bytes()).into())
    {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "Algorithm '{}' is not in accepted list",
            alg
        )));
    }

    Ok(())
}

/// Validate the issuer claim against the configured issuer (exact match)
pub fn validate_issuer(iss: &str, expected: &str) -> Result<(), AuthError> {
    if iss.is_empty() {
        return Err(AuthError::InvalidIssuer("Issuer cannot be empty".into()));
    }

    if !bool::from(iss.as_bytes().ct_eq(expected.as_bytes())) {
        warn!(issuer = %iss, "Issuer does not match expected issuer");
        return Err(AuthError::InvalidIssuer(format!(
            "expected '{}', got '{}'",
            expected, iss
        )));
    }

    Ok(())
}

/// Validate the audience claim when an expected audience is configured
pub fn validate_audience(aud: Option<&str>, expected: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    match aud {
        Some(aud) if bool::from(aud.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        Some(aud) => {
            warn!(audience = %aud, "Audience does not match expected audience");
            Err(AuthError::InvalidAudience(format!(
                "expected '{}', got '{}'",
                expected, aud
            )))
        }
        None => Err(AuthError::MissingClaim("aud".into())),
    }
}

/// Validate all timestamp-related claims with clock skew tolerance
///
/// Checks:
/// - `exp` (expiration) is in the future (with clock skew)
/// - `nbf` (not before) is in the past (with clock skew)
/// - `iat` (issued at) is not in the future and not older than `max_token_age`
pub fn validate_timestamp_claims(
    claims: &Claims,
    clock_skew_seconds: u64,
    max_token_age_seconds: u64,
) -> Result<(), AuthError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| AuthError::InvalidTokenFormat("System time is before Unix epoch".into()))?
        .as_secs();

    if claims.exp + clock_skew_seconds <= now {
        return Err(AuthError::TokenExpired);
    }

    if let Some(nbf) = claims.nbf {
        if nbf > now + clock_skew_seconds {
            return Err(AuthError::TokenNotYetValid);
        }
    }

    if claims.iat > now + clock_skew_seconds {
        return Err(AuthError::InvalidTokenFormat(
            "iat claim is in the future".into(),
        ));
    }

    let token_age = now.saturating_sub(claims.iat);
    if token_age > max_token_age_seconds {
        warn!(
            token_age = %token_age,
            max_age = %max_token_age_seconds,
            "Token exceeds maximum age"
        );
        return Err(AuthError::TokenTooOld);
    }

    Ok(())
}
