pub mod claims;
pub mod jwt_helper;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::models::UserId;

pub use jwt_helper::JwtIdentityProvider;

/// A verified caller. Attached once per request or per push connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

#[cfg_attr(test, mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    fn verify_credential(&self, token: &str) -> Result<Identity, SessionError>;
}

/// Resolves an `Authorization: Bearer <token>` header value into an identity.
pub fn bearer_identity(
    provider: &dyn IdentityProvider,
    authorization: Option<&str>,
) -> Result<Identity, SessionError> {
    let header = authorization.ok_or_else(|| {
        SessionError::Unauthenticated("no authentication token provided".to_string())
    })?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            SessionError::Unauthenticated("authorization header must be a bearer token".to_string())
        })?;
    provider.verify_credential(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn bearer_header_is_stripped_before_verification() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_verify_credential()
            .with(eq("abc.def.ghi"))
            .times(1)
            .returning(|_| {
                Ok(Identity {
                    user_id: 3,
                    username: "cy".into(),
                })
            });

        let identity = bearer_identity(&provider, Some("Bearer abc.def.ghi")).unwrap();
        assert_eq!(identity.user_id, 3);
    }

    #[test]
    fn missing_or_malformed_headers_never_reach_the_provider() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_verify_credential().times(0);

        for header in [None, Some("Basic xyz"), Some("Bearer "), Some("token")] {
            assert!(matches!(
                bearer_identity(&provider, header),
                Err(SessionError::Unauthenticated(_))
            ));
        }
    }
}
