//! Cryptographic helpers for authentication.
//!
//! - PBKDF2-SHA256 password hashing (cost stored per user)
//! - HMAC-SHA256 JWT signing/verification
//! - Random single-use tokens, stored as SHA-256 digests

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::{Claims, ServiceError};

/// Default PBKDF2 cost for newly hashed passwords.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

// ── Password hashing ────────────────────────────────────────────────────────

/// A salted password hash, hex-encoded, with the cost it was derived at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
    pub iterations: u32,
}

/// Hash a password with PBKDF2-SHA256 and a fresh random salt.
pub fn hash_password(password: &str, iterations: u32) -> Result<PasswordHash, ServiceError> {
    let iterations = iterations.max(1);
    let mut salt = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);

    Ok(PasswordHash {
        hash: hex::encode(hash),
        salt: hex::encode(salt),
        iterations,
    })
}

/// Verify a password against a stored hash and salt (both hex-encoded).
///
/// Any malformed stored value verifies as `false`.
pub fn verify_password(password: &str, hash_hex: &str, salt_hex: &str, iterations: u32) -> bool {
    if iterations == 0 {
        return false;
    }
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(hash_hex) else {
        return false;
    };
    if expected.len() != HASH_LEN {
        return false;
    }

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);

    constant_time_eq(&hash, &expected)
}

// ── JWT (HMAC-SHA256) ───────────────────────────────────────────────────────

/// JWT header (always HS256).
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Access token lifetime: 7 days in seconds.
pub const JWT_EXPIRY_SECS: u64 = 7 * 24 * 3600;

/// Sign the given claims. Returns the encoded JWT string.
pub fn sign_jwt(claims: &Claims, secret: &str) -> Result<String, ServiceError> {
    let header_b64 = URL_SAFE_NO_PAD.encode(JWT_HEADER.as_bytes());

    let payload = serde_json::to_vec(claims)
        .map_err(|e| ServiceError::Internal(format!("encoding JWT claims: {e}")))?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = hmac_sha256(secret.as_bytes(), signing_input.as_bytes())?;
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{signing_input}.{sig_b64}"))
}

/// Verify a JWT and return its claims if the signature and expiry check out.
pub fn verify_jwt(token: &str, secret: &str, now_unix: u64) -> Result<Claims, ServiceError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(ServiceError::Unauthorized("invalid JWT format".into()));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(parts[0])
        .map_err(|_| ServiceError::Unauthorized("invalid JWT header encoding".into()))?;
    let header: serde_json::Value = serde_json::from_slice(&header_bytes)
        .map_err(|_| ServiceError::Unauthorized("invalid JWT header".into()))?;
    if header["alg"].as_str() != Some("HS256") {
        return Err(ServiceError::Unauthorized("unsupported JWT algorithm".into()));
    }

    // Verify signature
    let signing_input = format!("{}.{}", parts[0], parts[1]);
    let actual_sig = URL_SAFE_NO_PAD
        .decode(parts[2])
        .map_err(|_| ServiceError::Unauthorized("invalid JWT signature encoding".into()))?;
    let mut mac = new_mac(secret.as_bytes())?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&actual_sig)
        .map_err(|_| ServiceError::Unauthorized("invalid JWT signature".into()))?;

    // Decode payload
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| ServiceError::Unauthorized("invalid JWT payload encoding".into()))?;
    let claims: Claims = serde_json::from_slice(&payload_bytes)
        .map_err(|_| ServiceError::Unauthorized("invalid JWT payload".into()))?;

    if now_unix >= claims.exp {
        return Err(ServiceError::Unauthorized("JWT expired".into()));
    }

    Ok(claims)
}

// ── Tokens ──────────────────────────────────────────────────────────────────

/// Generate a secure random token (for password resets). Returns hex-encoded.
pub fn generate_token() -> Result<String, ServiceError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    Ok(hex::encode(bytes))
}

/// Hash a token with SHA-256 for storage. Returns hex-encoded.
pub fn hash_token(token: &str) -> String {
    use sha2::Digest;
    let hash = sha2::Sha256::digest(token.as_bytes());
    hex::encode(hash)
}

// ── Internal ────────────────────────────────────────────────────────────────

fn new_mac(key: &[u8]) -> Result<Hmac<Sha256>, ServiceError> {
    Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| ServiceError::Internal(format!("HMAC key: {e}")))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ServiceError> {
    let mut mac = new_mac(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    const SECRET: &str = "test-secret";

    fn claims(now: u64) -> Claims {
        Claims {
            user_id: "u1".into(),
            email: "admin@acme.test".into(),
            role: Role::Admin,
            tenant_id: "t1".into(),
            tenant_slug: "acme".into(),
            iat: now,
            exp: now + JWT_EXPIRY_SECS,
        }
    }

    #[test]
    fn password_roundtrip_and_mismatch() {
        let hashed = hash_password("password", 1_000).unwrap();
        assert_eq!(hashed.iterations, 1_000);
        assert!(verify_password("password", &hashed.hash, &hashed.salt, 1_000));
        assert!(!verify_password("Password", &hashed.hash, &hashed.salt, 1_000));
        assert!(!verify_password("password", &hashed.hash, &hashed.salt, 999));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("password", 10).unwrap();
        let b = hash_password("password", 10).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("x", "not-hex", "00", 10));
        assert!(!verify_password("x", "00", "not-hex", 10));
        assert!(!verify_password("x", "00", "00", 10));
        assert!(!verify_password("x", &"00".repeat(32), "00", 0));
    }

    #[test]
    fn jwt_roundtrip_keeps_claims() {
        let now = 1_700_000_000;
        let token = sign_jwt(&claims(now), SECRET).unwrap();
        let decoded = verify_jwt(&token, SECRET, now + 60).unwrap();
        assert_eq!(decoded, claims(now));
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let now = 1_700_000_000;
        let token = sign_jwt(&claims(now), SECRET).unwrap();
        assert!(verify_jwt(&token, "other-secret", now).is_err());
    }

    #[test]
    fn jwt_rejects_expired() {
        let now = 1_700_000_000;
        let token = sign_jwt(&claims(now), SECRET).unwrap();
        let err = verify_jwt(&token, SECRET, now + JWT_EXPIRY_SECS).unwrap_err();
        assert_eq!(err.message(), "JWT expired");
        assert!(verify_jwt(&token, SECRET, now + JWT_EXPIRY_SECS - 1).is_ok());
    }

    #[test]
    fn jwt_rejects_tampered_payload() {
        let now = 1_700_000_000;
        let token = sign_jwt(&claims(now), SECRET).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut forged = claims(now);
        forged.role = Role::Member;
        forged.tenant_id = "t2".into();
        let forged_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged_b64, parts[2]);

        let err = verify_jwt(&tampered, SECRET, now).unwrap_err();
        assert_eq!(err.message(), "invalid JWT signature");
    }

    #[test]
    fn jwt_rejects_other_algorithms() {
        let now = 1_700_000_000;
        let token = sign_jwt(&claims(now), SECRET).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let none_header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let forged = format!("{none_header}.{}.", parts[1]);
        let err = verify_jwt(&forged, SECRET, now).unwrap_err();
        assert_eq!(err.message(), "unsupported JWT algorithm");
    }

    #[test]
    fn jwt_rejects_garbage() {
        assert!(verify_jwt("abc", SECRET, 0).is_err());
        assert!(verify_jwt("a.b.c", SECRET, 0).is_err());
        assert!(verify_jwt("", SECRET, 0).is_err());
    }

    #[test]
    fn tokens_are_random_and_hash_deterministically() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
    }
}
