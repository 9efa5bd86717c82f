use axum::{
    extract::{
        rejection::{TypedHeaderRejection, TypedHeaderRejectionReason},
        FromRef, FromRequestParts,
    },
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    RequestPartsExt, TypedHeader,
};
use tap::TapFallible;

use crate::error::{Error, UnauthorizedType};

use super::token::{decode_access_token, JwtState};

/// Caller identity taken from a valid bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccess {
    pub email: String,
}

impl UserAccess {
    pub fn from_token(jwt_state: &JwtState, token: &str) -> Result<Self, Error> {
        let token = decode_access_token(jwt_state, token)
            .map_err(|_| Error::Unauthorized(UnauthorizedType::InvalidToken))
            .tap_err(|_| tracing::debug!("rejected undecodable access token"))?;

        if token.claims.is_expired() {
            return Err(Error::Unauthorized(UnauthorizedType::InvalidToken))
                .tap_err(|_| tracing::debug!("rejected expired access token"));
        }

        Ok(Self {
            email: token.claims.email.email,
        })
    }
}

fn rejection_kind(rejection: &TypedHeaderRejection) -> UnauthorizedType {
    match rejection.reason() {
        TypedHeaderRejectionReason::Missing => UnauthorizedType::MissingToken,
        _ => UnauthorizedType::InvalidToken,
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserAccess
where
    JwtState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(token)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|rejection| Error::Unauthorized(rejection_kind(&rejection)))?;

        let jwt = JwtState::from_ref(state);

        Self::from_token(&jwt, token.token())
    }
}
