use std::sync::Arc;

use matatena_core::{bearer_identity, Identity, IdentityProvider, SessionError};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use tracing::warn;

/// Identity provider handed to Rocket as managed state.
pub struct Identities(pub Arc<dyn IdentityProvider>);

/// Why the last request guard rejected the caller, read back by the 401 catcher.
pub struct AuthFailure(pub Option<String>);

/// A caller whose bearer token verified.
pub struct AuthUser(pub Identity);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = SessionError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(identities) = request.rocket().state::<Identities>() else {
            let err = SessionError::Store("identity provider is not configured".to_string());
            return Outcome::Error((Status::InternalServerError, err));
        };

        match bearer_identity(
            identities.0.as_ref(),
            request.headers().get_one("Authorization"),
        ) {
            Ok(identity) => Outcome::Success(AuthUser(identity)),
            Err(err) => {
                warn!(uri = %request.uri(), reason = err.reason(), "rejected credential");
                request.local_cache(|| AuthFailure(Some(err.reason().to_string())));
                Outcome::Error((Status::Unauthorized, err))
            }
        }
    }
}
