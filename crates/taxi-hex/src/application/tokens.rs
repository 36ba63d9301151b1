use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use taxi_types::domain::identity::{Capability, Identity};
use uuid::Uuid;

use crate::errors::AppError;

/// Longest lifetime a token may be given, in seconds (ten years).
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

fn ttl(secs: i64) -> Duration {
    Duration::seconds(secs.clamp(-MAX_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub cap: Capability,
    pub kind: TokenKind,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// Signs and checks HS256 JWTs carrying the caller's [`Identity`].
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl: ttl(access_ttl_secs),
            refresh_ttl: ttl(refresh_ttl_secs),
        }
    }

    pub fn issue(&self, identity: Identity) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            refresh: self.sign(identity, TokenKind::Refresh)?,
            access: self.sign(identity, TokenKind::Access)?,
        })
    }

    /// Access token for an identity already proven by a refresh token.
    pub fn access_for(&self, identity: Identity) -> anyhow::Result<String> {
        self.sign(identity, TokenKind::Access)
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Identity, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {e}")))?;
        let claims = data.claims;
        if claims.kind != expected {
            return Err(AppError::Unauthorized("Token has wrong type".into()));
        }
        let user_id = claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;
        Ok(Identity::new(user_id, claims.cap))
    }

    fn sign(&self, identity: Identity, kind: TokenKind) -> anyhow::Result<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: identity.user_id.to_string(),
            cap: identity.capability,
            kind,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp().max(0) as usize,
            exp: now
                .checked_add_signed(ttl)
                .ok_or_else(|| anyhow::anyhow!("token expiry out of range"))?
                .timestamp()
                .max(0) as usize,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> Identity {
        Identity::new(7, Capability::TaxiDriver)
    }

    #[test]
    fn access_token_round_trips_identity() {
        let issuer = TokenIssuer::new("secret", 300, 3600);
        let pair = issuer.issue(driver()).unwrap();
        let identity = issuer.verify(&pair.access, TokenKind::Access).unwrap();
        assert_eq!(identity, driver());
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let issuer = TokenIssuer::new("secret", 300, 3600);
        let pair = issuer.issue(driver()).unwrap();
        assert!(matches!(
            issuer.verify(&pair.refresh, TokenKind::Access),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            issuer.verify(&pair.access, TokenKind::Refresh),
            Err(AppError::Unauthorized(_))
        ));
        let identity = issuer.verify(&pair.refresh, TokenKind::Refresh).unwrap();
        let access = issuer.access_for(identity).unwrap();
        assert_eq!(issuer.verify(&access, TokenKind::Access).unwrap(), driver());
    }

    #[test]
    fn foreign_and_expired_tokens_are_rejected() {
        let issuer = TokenIssuer::new("secret", 300, 3600);
        let other = TokenIssuer::new("other-secret", 300, 3600);
        let forged = other.issue(driver()).unwrap();
        assert!(issuer.verify(&forged.access, TokenKind::Access).is_err());

        let stale = TokenIssuer::new("secret", -120, -120);
        let expired = stale.issue(driver()).unwrap();
        assert!(issuer.verify(&expired.access, TokenKind::Access).is_err());
        assert!(issuer.verify("garbage", TokenKind::Access).is_err());
    }

    #[test]
    fn extreme_ttls_are_clamped() {
        let issuer = TokenIssuer::new("secret", i64::MAX, i64::MIN);
        let pair = issuer.issue(driver()).unwrap();
        assert_eq!(issuer.verify(&pair.access, TokenKind::Access).unwrap(), driver());
        assert!(issuer.verify(&pair.refresh, TokenKind::Refresh).is_err());
    }
}
