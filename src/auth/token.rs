// src/auth/token.rs — Token and identity helpers
//
// `decode_claims` reads the payload segment of a JWT without verifying the
// signature. The API layer in front of this library has already validated
// the token; this is only for extracting user information from it.
// `validate_claims` additionally enforces the `exp` claim when the auth
// config asks for it.

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::infra::config::AuthConfig;
use crate::infra::errors::RengloError;

/// Decode the claims of a JWT and, when `auth.check_token_expiration` is
/// set, reject tokens whose `exp` is in the past. No signature verification.
pub fn validate_claims(
    token: &str,
    auth: &AuthConfig,
) -> Result<serde_json::Value, RengloError> {
    let claims = decode_claims(token)?;

    if auth.check_token_expiration {
        if let Some(exp) = claims.get("exp").and_then(serde_json::Value::as_i64) {
            if exp < Utc::now().timestamp() {
                return Err(RengloError::InvalidToken("token is expired".into()));
            }
        }
    }

    Ok(claims)
}

/// Decode the claims of a JWT. No signature verification.
pub fn decode_claims(token: &str) -> Result<serde_json::Value, RengloError> {
    let mut segments = token.split('.');
    let (_header, payload) = match (segments.next(), segments.next()) {
        (Some(h), Some(p)) if !p.is_empty() => (h, p),
        _ => {
            return Err(RengloError::InvalidToken(
                "expected header.payload.signature segments".into(),
            ))
        }
    };

    let bytes = base64url_decode(payload)
        .map_err(|e| RengloError::InvalidToken(format!("payload is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RengloError::InvalidToken(format!("payload is not JSON: {e}")))
}

/// Part of the email before the `@`, with non-alphanumerics removed.
pub fn username_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// First `digits` hex characters of the SHA-256 digest of the input. Used
/// for short, stable identifiers derived from names.
pub fn short_hash(input: &str, digits: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let full = hex::encode(hasher.finalize());
    full[..digits.min(full.len())].to_string()
}

// -- Base64url (no padding) --

pub fn base64url_encode(data: &[u8]) -> String {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    let mut result = String::with_capacity((data.len() * 4).div_ceil(3));
    let mut i = 0;
    while i + 2 < data.len() {
        let n = ((data[i] as u32) << 16) | ((data[i + 1] as u32) << 8) | (data[i + 2] as u32);
        result.push(TABLE[((n >> 18) & 0x3F) as usize] as char);
        result.push(TABLE[((n >> 12) & 0x3F) as usize] as char);
        result.push(TABLE[((n >> 6) & 0x3F) as usize] as char);
        result.push(TABLE[(n & 0x3F) as usize] as char);
        i += 3;
    }
    let remaining = data.len() - i;
    if remaining == 2 {
        let n = ((data[i] as u32) << 16) | ((data[i + 1] as u32) << 8);
        result.push(TABLE[((n >> 18) & 0x3F) as usize] as char);
        result.push(TABLE[((n >> 12) & 0x3F) as usize] as char);
        result.push(TABLE[((n >> 6) & 0x3F) as usize] as char);
    } else if remaining == 1 {
        let n = (data[i] as u32) << 16;
        result.push(TABLE[((n >> 18) & 0x3F) as usize] as char);
        result.push(TABLE[((n >> 12) & 0x3F) as usize] as char);
    }
    result
}

/// Decode a base64url-encoded string to bytes. Accepts both padded and
/// unpadded input since issuers differ.
pub fn base64url_decode(input: &str) -> anyhow::Result<Vec<u8>> {
    fn val(b: u8) -> Option<u32> {
        match b {
            b'A'..=b'Z' => Some((b - b'A') as u32),
            b'a'..=b'z' => Some((b - b'a' + 26) as u32),
            b'0'..=b'9' => Some((b - b'0' + 52) as u32),
            b'-' => Some(62),
            b'_' => Some(63),
            _ => None,
        }
    }

    let input = input.trim_end_matches('=');
    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut buf: u32 = 0;
    let mut bits = 0;

    for &b in input.as_bytes() {
        let v =
            val(b).ok_or_else(|| anyhow::anyhow!("invalid base64url character: {}", b as char))?;
        buf = (buf << 6) | v;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((buf >> bits) as u8);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_token(claims: &serde_json::Value) -> String {
        let header = base64url_encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = base64url_encode(serde_json::to_string(claims).unwrap().as_bytes());
        format!("{header}.{payload}.fakesig")
    }

    #[test]
    fn test_decode_claims() {
        let token = make_token(&json!({
            "sub": "user-123",
            "email": "ada.lovelace@renglo.com"
        }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims["sub"], "user-123");
        assert_eq!(claims["email"], "ada.lovelace@renglo.com");
    }

    #[test]
    fn test_validate_claims_expiration() {
        let past = Utc::now().timestamp() - 600;
        let future = Utc::now().timestamp() + 600;
        let checking = AuthConfig {
            check_token_expiration: true,
        };
        let lenient = AuthConfig {
            check_token_expiration: false,
        };

        let expired = make_token(&json!({"sub": "u1", "exp": past}));
        let err = validate_claims(&expired, &checking).unwrap_err();
        assert!(matches!(err, RengloError::InvalidToken(_)));

        // Disabled flag lets expired tokens through
        let claims = validate_claims(&expired, &lenient).unwrap();
        assert_eq!(claims["sub"], "u1");

        let fresh = make_token(&json!({"sub": "u1", "exp": future}));
        assert!(validate_claims(&fresh, &checking).is_ok());

        // No exp claim means nothing to check
        let no_exp = make_token(&json!({"sub": "u1"}));
        assert!(validate_claims(&no_exp, &checking).is_ok());
    }

    #[test]
    fn test_decode_claims_rejects_garbage() {
        assert!(decode_claims("not-a-token").is_err());
        assert!(decode_claims("a.!!!.c").is_err());
    }

    #[test]
    fn test_username_from_email() {
        assert_eq!(username_from_email("ada.lovelace@renglo.com"), "adalovelace");
        assert_eq!(username_from_email("x_y-z@e.com"), "xyz");
        assert_eq!(username_from_email("no-at-sign"), "noatsign");
    }

    #[test]
    fn test_short_hash_stable_prefix() {
        let full = short_hash("portfolio-name", 64);
        let short = short_hash("portfolio-name", 12);
        assert_eq!(short.len(), 12);
        assert!(full.starts_with(&short));
        // Different inputs diverge
        assert_ne!(short_hash("a", 12), short_hash("b", 12));
    }

    #[test]
    fn test_base64url_roundtrip() {
        for sample in [&b""[..], b"f", b"fo", b"foo", b"foobar", &[0xff, 0x00, 0x7f]] {
            let encoded = base64url_encode(sample);
            assert_eq!(base64url_decode(&encoded).unwrap(), sample);
        }
    }

    #[test]
    fn test_base64url_decode_accepts_padding() {
        // "fo" encodes to "Zm8" unpadded, "Zm8=" padded
        assert_eq!(base64url_decode("Zm8=").unwrap(), b"fo");
    }
}
