mod common;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::mock_jwks::{
    DEFAULT_KID, TEST_ISSUER, claims_for_issuer, default_claims, generate_hs256_token,
    generate_token, generate_token_signed_by, generate_unsigned_token, start_mock_jwks_server,
};
use warden_auth::{AuthError, KeySetProvider, TokenVerifier};
use warden_config::AuthConfig;

fn verifier_config(jwks_url: &str) -> AuthConfig {
    AuthConfig {
        jwks_url: jwks_url.to_string(),
        expected_issuer: TEST_ISSUER.into(),
        keyset_cooldown_seconds: 0,
        verify_max_attempts: 2,
        verify_backoff_base_ms: 200,
        verify_attempt_timeout_ms: 1000,
        ..AuthConfig::default()
    }
}

fn verifier_for(config: &AuthConfig) -> TokenVerifier {
    let provider = Arc::new(KeySetProvider::new(config).unwrap());
    TokenVerifier::new(provider, config)
}

#[tokio::test]
async fn test_verify_success() {
    let (jwks_url, _state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    let mut claims = default_claims();
    claims
        .extra
        .insert("department".into(), serde_json::json!("engineering"));
    let token = generate_token(DEFAULT_KID, &claims);

    let verified = verifier.verify(&token).await.expect("Verification failed");

    assert_eq!(verified.principal(), "user:alice");
    assert_eq!(verified.iss, TEST_ISSUER);
    assert_eq!(
        verified.extra.get("department"),
        Some(&serde_json::json!("engineering"))
    );
}

#[tokio::test]
async fn test_verify_uses_cached_key_set() {
    let (jwks_url, state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    let token1 = generate_token(DEFAULT_KID, &default_claims());
    let token2 = generate_token(DEFAULT_KID, &default_claims());

    verifier.verify(&token1).await.expect("First verification failed");
    verifier.verify(&token2).await.expect("Second verification failed");

    assert_eq!(state.fetches(), 1);
}

#[tokio::test]
async fn test_wrong_issuer_fails_without_retry() {
    let (jwks_url, state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    let token = generate_token(DEFAULT_KID, &claims_for_issuer("https://evil.example.com"));

    let start = Instant::now();
    let err = verifier.verify(&token).await.expect_err("Wrong issuer must fail");

    assert!(matches!(err, AuthError::InvalidIssuer(_)));
    // A semantic failure is never retried: no backoff delay was spent
    assert!(start.elapsed() < Duration::from_millis(200));
    assert_eq!(state.fetches(), 1);
}

#[tokio::test]
async fn test_hs256_rejected_before_any_fetch() {
    let (jwks_url, state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    let token = generate_hs256_token(DEFAULT_KID, &default_claims());

    let err = verifier.verify(&token).await.expect_err("HS256 must be rejected");

    assert!(matches!(err, AuthError::UnsupportedAlgorithm(_)));
    assert_eq!(state.fetches(), 0);
}

#[tokio::test]
async fn test_alg_none_rejected() {
    let (jwks_url, state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    let token = generate_unsigned_token(DEFAULT_KID, &default_claims());

    let err = verifier.verify(&token).await.expect_err("'none' must be rejected");

    assert!(matches!(err, AuthError::UnsupportedAlgorithm(_)));
    assert_eq!(state.fetches(), 0);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (jwks_url, _state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    let mut claims = default_claims();
    claims.exp = claims.iat - 3600; // expired an hour before issuance time
    claims.iat -= 7200;
    let token = generate_token(DEFAULT_KID, &claims);

    let err = verifier.verify(&token).await.expect_err("Expired token must fail");
    assert!(matches!(err, AuthError::TokenExpired));
}

#[tokio::test]
async fn test_not_yet_valid_token_rejected() {
    let (jwks_url, _state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    let mut claims = default_claims();
    claims.nbf = Some(claims.iat + 300);
    let token = generate_token(DEFAULT_KID, &claims);

    let err = verifier.verify(&token).await.expect_err("Premature token must fail");
    assert!(matches!(err, AuthError::TokenNotYetValid));
}

#[tokio::test]
async fn test_unknown_kid_rejected() {
    let (jwks_url, state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    let token = generate_token("warden-key-999", &default_claims());

    let err = verifier.verify(&token).await.expect_err("Unknown kid must fail");

    assert!(matches!(err, AuthError::KeyNotFound(_)));
    assert_eq!(state.fetches(), 1);
}

#[tokio::test]
async fn test_forged_signature_rejected() {
    let (jwks_url, _state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    // Header names the served key but the signature comes from another keypair
    let token = generate_token_signed_by(DEFAULT_KID, "warden-key-other", &default_claims());

    let start = Instant::now();
    let err = verifier.verify(&token).await.expect_err("Forged token must fail");

    assert!(matches!(err, AuthError::InvalidSignature));
    assert!(start.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn test_missing_kid_rejected() {
    let (jwks_url, _state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    // jsonwebtoken omits the kid field when unset
    let signing_only_token = {
        let claims = default_claims();
        let token = generate_token(DEFAULT_KID, &claims);
        // Re-encode the header without a kid, keeping payload and signature
        let parts: Vec<&str> = token.split('.').collect();
        let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = base64::Engine::encode(engine, br#"{"alg":"EdDSA"}"#);
        format!("{}.{}.{}", header, parts[1], parts[2])
    };

    let err = verifier
        .verify(&signing_only_token)
        .await
        .expect_err("Token without kid must fail");
    assert!(matches!(err, AuthError::InvalidTokenFormat(_)));
}

#[tokio::test]
async fn test_transient_failure_retried_then_succeeds() {
    let (jwks_url, state, _handle) = start_mock_jwks_server().await;
    state.fail_next(1);

    let verifier = verifier_for(&verifier_config(&jwks_url));
    let token = generate_token(DEFAULT_KID, &default_claims());

    let start = Instant::now();
    let verified = verifier
        .verify(&token)
        .await
        .expect("Verification should succeed on the retry");

    assert_eq!(verified.principal(), "user:alice");
    // Exactly one retry happened, and the configured backoff was respected
    assert_eq!(state.fetches(), 2);
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_retries_exhausted_is_terminal() {
    let (jwks_url, state, _handle) = start_mock_jwks_server().await;
    state.fail_always();

    let mut config = verifier_config(&jwks_url);
    config.verify_backoff_base_ms = 100;
    let verifier = verifier_for(&config);
    let token = generate_token(DEFAULT_KID, &default_claims());

    let err = verifier
        .verify(&token)
        .await
        .expect_err("Exhausted retries must fail");

    // Terminal even though its cause was transient
    assert!(!err.is_transient());

    match err {
        AuthError::VerificationFailed {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("unavailable"));
        }
        other => panic!("Expected VerificationFailed, got {:?}", other),
    }

    // Exactly max_attempts fetch attempts, no more
    assert_eq!(state.fetches(), 2);
}

#[tokio::test]
async fn test_attempt_deadline_counts_as_transient() {
    let (jwks_url, state, _handle) = start_mock_jwks_server().await;
    state.hang.store(true, std::sync::atomic::Ordering::SeqCst);

    let mut config = verifier_config(&jwks_url);
    config.verify_attempt_timeout_ms = 300;
    config.verify_backoff_base_ms = 100;
    let verifier = verifier_for(&config);
    let token = generate_token(DEFAULT_KID, &default_claims());

    let start = Instant::now();
    let err = verifier.verify(&token).await.expect_err("Hung endpoint must time out");

    match err {
        AuthError::VerificationFailed {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("timed out"));
        }
        other => panic!("Expected VerificationFailed, got {:?}", other),
    }

    // Two timed-out attempts plus one backoff delay
    assert!(start.elapsed() >= Duration::from_millis(700));
    // The hung fetch was started once and shared across attempts
    assert_eq!(state.fetches(), 1);
}

#[tokio::test]
async fn test_audience_enforced_when_configured() {
    let (jwks_url, _state, _handle) = start_mock_jwks_server().await;

    let mut config = verifier_config(&jwks_url);
    config.expected_audience = Some("api://warden".into());
    let verifier = verifier_for(&config);

    // Matching audience verifies
    let mut claims = default_claims();
    claims.aud = Some("api://warden".into());
    let token = generate_token(DEFAULT_KID, &claims);
    verifier.verify(&token).await.expect("Matching audience should verify");

    // Wrong audience is rejected
    let mut claims = default_claims();
    claims.aud = Some("api://other".into());
    let token = generate_token(DEFAULT_KID, &claims);
    let err = verifier.verify(&token).await.expect_err("Wrong audience must fail");
    assert!(matches!(err, AuthError::InvalidAudience(_)));

    // Absent audience is rejected
    let token = generate_token(DEFAULT_KID, &default_claims());
    let err = verifier.verify(&token).await.expect_err("Missing audience must fail");
    assert!(matches!(err, AuthError::MissingClaim(_)));
}

#[tokio::test]
async fn test_malformed_token_rejected() {
    let (jwks_url, state, _handle) = start_mock_jwks_server().await;
    let verifier = verifier_for(&verifier_config(&jwks_url));

    for token in ["", "garbage", "only.two", "a.b.c.d"] {
        let err = verifier.verify(token).await.expect_err("Malformed token must fail");
        assert!(matches!(err, AuthError::InvalidTokenFormat(_)));
    }

    assert_eq!(state.fetches(), 0);
}
