use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::error::SessionError;
use crate::jwt::claims::Claims;
use crate::jwt::{Identity, IdentityProvider};
use crate::models::UserId;

const TOKEN_TTL_SECS: u64 = 60 * 60;

/// Verifies HS256 bearer tokens into user identities.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtIdentityProvider {
    pub fn new(secret: &[u8]) -> Self {
        JwtIdentityProvider {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issues a one-hour token. Account flows live elsewhere; this is used by
    /// tooling and tests that need a credential the verifier accepts.
    pub fn create_token(&self, user_id: UserId, username: &str) -> Result<String, SessionError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SessionError::Store(e.to_string()))?
            .as_secs();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: (now + TOKEN_TTL_SECS) as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| SessionError::Store(format!("could not sign token: {}", e)))
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn verify_credential(&self, token: &str) -> Result<Identity, SessionError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| SessionError::Unauthenticated("invalid or expired token".to_string()))?;
        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| SessionError::Unauthenticated("token subject is not a user id".to_string()))?;
        Ok(Identity {
            user_id,
            username: claims.username,
        })
    }
}
