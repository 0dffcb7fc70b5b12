//! Session lifetime detection
//!
//! Credential values that are JWTs (optionally behind a scheme such as
//! `Bearer `) carry their own expiration in the `exp` claim. Signatures are
//! not verified: the claim is only used to decide when to refresh.

use super::types::Authentication;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ExpirationClaim {
    #[serde(default)]
    exp: Option<f64>,
}

/// Expiration of a JWT-shaped value, if it has one
pub fn jwt_expiration(value: &str) -> Option<DateTime<Utc>> {
    let token = value.split_whitespace().last()?;
    if token.matches('.').count() != 2 {
        return None;
    }

    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<ExpirationClaim>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    #[allow(clippy::cast_possible_truncation)]
    let exp = data.claims.exp? as i64;
    DateTime::from_timestamp(exp, 0)
}

/// Smallest positive lifetime, in seconds, among JWTs found in the
/// authentication values
pub fn detect_ttl(authentication: &Authentication) -> Option<u64> {
    let now = Utc::now();
    authentication
        .values()
        .filter_map(jwt_expiration)
        .filter_map(|expires_at| u64::try_from((expires_at - now).num_seconds()).ok())
        .filter(|seconds| *seconds > 0)
        .min()
}
