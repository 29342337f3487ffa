use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Verified token claims
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Subject (the principal)
    pub sub: String,
    /// Audience (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Expiration time (seconds since epoch)
    pub exp: u64,
    /// Issued at (seconds since epoch)
    pub iat: u64,
    /// Not before (optional, seconds since epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    /// Token ID (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Any further claims carried by the token
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// The principal identifier this token asserts
    pub fn principal(&self) -> &str {
        &self.sub
    }
}

/// Decoded token header fields
///
/// `alg` is kept as a raw string so unknown values (including "none") reach
/// the allow-list check instead of failing at parse time.
#[derive(Clone, Debug)]
pub struct TokenHeader {
    /// Signing algorithm name as carried by the token
    pub alg: String,
    /// Key ID
    pub kid: Option<String>,
}

/// Decode a token's header without verification
pub fn decode_token_header(token: &str) -> Result<TokenHeader, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::InvalidTokenFormat(
            "token must have 3 parts separated by dots".into(),
        ));
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(parts[0]).map_err(|e| {
        AuthError::InvalidTokenFormat(format!("Failed to decode token header: {}", e))
    })?;

    #[derive(Deserialize)]
    struct RawHeader {
        alg: String,
        #[serde(default)]
        kid: Option<String>,
    }

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        AuthError::InvalidTokenFormat(format!("Failed to parse token header: {}", e))
    })?;

    Ok(TokenHeader {
        alg: header.alg,
        kid: header.kid,
    })
}

/// Decode token claims without verification
///
/// Used for diagnostics only; never trust the result of this function for an
/// authentication decision.
pub fn decode_claims_unverified(token: &str) -> Result<Claims, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::InvalidTokenFormat(
            "token must have 3 parts separated by dots".into(),
        ));
    }

    let payload_bytes = URL_SAFE_NO_PAD.decode(parts[1]).map_err(|e| {
        AuthError::InvalidTokenFormat(format!("Failed to decode token payload: {}", e))
    })?;

    let claims: Claims = serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::InvalidTokenFormat(format!("Failed to parse claims: {}", e)))?;

    if claims.iss.is_empty() {
        return Err(AuthError::MissingClaim("iss".into()));
    }
    if claims.sub.is_empty() {
        return Err(AuthError::MissingClaim("sub".into()));
    }

    Ok(claims)
}

/// Verify a token's signature with a public key
///
/// Time and audience claims are validated separately with clock-skew
/// tolerance, so the library checks are disabled here.
pub fn verify_signature(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let token_data = decode::<Claims>(token, key, &validation)?;

    Ok(token_data.claims)
}
