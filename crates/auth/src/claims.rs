use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use identyflow_core::UserId;

use crate::{Principal, Role};

/// JWT claims carried by every API token.
///
/// `iat`/`exp` are Unix seconds, as registered JWT claims require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the user id.
    pub sub: UserId,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(principal: Principal, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: principal.id,
            role: principal.role,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.sub, self.role)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("malformed or badly signed token: {0}")]
    Malformed(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Deterministically validate the time window of decoded claims.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.exp <= claims.iat {
        return Err(TokenError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

/// Verifies bearer tokens for the transport layer.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// HS256 issuer + validator sharing one secret.
#[derive(Clone)]
pub struct Hs256TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Hs256TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, principal: Principal, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = JwtClaims::new(principal, now, self.ttl);
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl JwtValidator for Hs256TokenService {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock below.
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> Hs256TokenService {
        Hs256TokenService::new(secret.as_bytes(), Duration::hours(24))
    }

    #[test]
    fn issued_token_validates_and_carries_principal() {
        let svc = service("s3cret");
        let principal = Principal::new(UserId::new(), Role::Admin);
        let now = Utc::now();

        let token = svc.issue(principal, now).unwrap();
        let claims = svc.validate(&token, now + Duration::minutes(5)).unwrap();

        assert_eq!(claims.principal(), principal);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = service("s3cret");
        let now = Utc::now();
        let token = svc.issue(Principal::new(UserId::new(), Role::God), now).unwrap();

        let err = svc.validate(&token, now + Duration::hours(25)).unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }

    #[test]
    fn token_signed_with_other_secret_is_malformed() {
        let now = Utc::now();
        let token = service("one")
            .issue(Principal::new(UserId::new(), Role::Instrutor), now)
            .unwrap();

        let err = service("two").validate(&token, now).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn claims_time_window_checks() {
        let now = Utc::now();
        let mut claims = JwtClaims::new(
            Principal::new(UserId::new(), Role::Admin),
            now,
            Duration::minutes(10),
        );
        assert_eq!(validate_claims(&claims, now), Ok(()));
        assert_eq!(
            validate_claims(&claims, now - Duration::minutes(1)),
            Err(TokenError::NotYetValid)
        );

        claims.exp = claims.iat;
        assert_eq!(validate_claims(&claims, now), Err(TokenError::InvalidTimeWindow));
    }
}
