// Local token decoding
// Used when the validation endpoint cannot be reached

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};

use super::types::{TokenClaims, TokenStatus};
use crate::error::{AuthError, Result};

/// Decode the payload segment of a three-segment token
///
/// A leading `prefix` is stripped first. Padding on the payload is tolerated.
pub fn decode_claims(token: &str, prefix: &str) -> Result<TokenClaims> {
    let raw = token.strip_prefix(prefix).unwrap_or(token).trim();

    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::MalformedToken(format!(
            "expected 3 segments, got {}",
            parts.len()
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("payload is not base64url: {}", e)))?;

    serde_json::from_slice(&payload)
        .map_err(|e| AuthError::MalformedToken(format!("payload is not valid claims: {}", e)))
}

/// Whole minutes left until `exp`, floored
pub fn remaining_minutes(exp: i64, now: DateTime<Utc>) -> i64 {
    let remaining_ms = exp
        .saturating_mul(1000)
        .saturating_sub(now.timestamp_millis());
    remaining_ms.div_euclid(60_000)
}

/// Classify a token without the validator
///
/// Never fails: anything undecodable is `Invalid`.
pub fn classify_locally(token: &str, prefix: &str, now: DateTime<Utc>) -> TokenStatus {
    match decode_claims(token, prefix) {
        Ok(claims) => {
            tracing::debug!(
                user_id = ?claims.user_id,
                roles = ?claims.roles,
                "Decoded token locally"
            );
            TokenStatus::from_minutes(remaining_minutes(claims.exp, now), claims.email)
        }
        Err(e) => {
            tracing::warn!("Local token decode failed: {}", e);
            TokenStatus::Invalid
        }
    }
}

/// Build an unsigned token around `claims`, for tests
#[cfg(any(test, feature = "test-utils"))]
pub fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{}.{}.signature", header, payload)
}
