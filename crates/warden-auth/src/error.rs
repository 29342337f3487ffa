use thiserror::Error;

/// Authentication errors
///
/// `Clone` is required: a single-flight key fetch delivers its error to every
/// waiting caller.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Malformed token - cannot be decoded
    #[error("Invalid token format: {0}")]
    InvalidTokenFormat(String),

    /// Token has expired
    #[error("Token expired")]
    TokenExpired,

    /// Token not yet valid (nbf claim in future)
    #[error("Token not yet valid")]
    TokenNotYetValid,

    /// Token too old (issued at exceeds max age)
    #[error("Token too old")]
    TokenTooOld,

    /// Signature verification failed
    #[error("Invalid signature")]
    InvalidSignature,

    /// Issuer does not match the expected issuer
    #[error("Invalid issuer: {0}")]
    InvalidIssuer(String),

    /// Audience doesn't match expected value
    #[error("Invalid audience: {0}")]
    InvalidAudience(String),

    /// Required claim is missing
    #[error("Missing claim: {0}")]
    MissingClaim(String),

    /// Algorithm not in allowed list
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No key with the given id in the current key set
    #[error("Key '{0}' not found in current key set")]
    KeyNotFound(String),

    /// Key set fetch failed in a way a retry cannot fix (bad payload, 4xx)
    #[error("Key fetch failed: {0}")]
    KeyFetch(String),

    /// Key endpoint unreachable, timed out, or returned a 5xx
    #[error("Key endpoint unavailable: {0}")]
    ProviderUnavailable(String),

    /// A single verification attempt exceeded its deadline
    #[error("Verification attempt timed out")]
    AttemptTimeout,

    /// Terminal failure after the retry budget was spent on transient errors
    #[error("Verification failed after {attempts} attempts: {last_error}")]
    VerificationFailed {
        /// Number of attempts performed
        attempts: u32,
        /// Message of the last transient failure
        last_error: String,
    },
}

impl AuthError {
    /// Whether a retry could change the outcome
    ///
    /// Only network/timeout-shaped failures qualify; semantic failures
    /// (signature, issuer, algorithm, expiry) are final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::ProviderUnavailable(_) | AuthError::AttemptTimeout
        )
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken => {
                AuthError::InvalidTokenFormat("Invalid token structure".into())
            }
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            ErrorKind::InvalidAudience => {
                AuthError::InvalidAudience("Audience validation failed".into())
            }
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer("Issuer validation failed".into()),
            ErrorKind::InvalidAlgorithm => {
                AuthError::UnsupportedAlgorithm("Algorithm not supported".into())
            }
            _ => AuthError::InvalidTokenFormat(format!("Token error: {}", err)),
        }
    }
}
