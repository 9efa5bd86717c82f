use axum::{extract::State, Json};
use jsonwebtoken::TokenData;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use validator::Validate;

use crate::{error::Error, util::ValidJson};

pub const ACCESS_TOKEN_LIFETIME: Duration = Duration::hours(1);

#[derive(Clone)]
pub struct JwtState {
    validation: jsonwebtoken::Validation,
    header: jsonwebtoken::Header,

    encoding_key: jsonwebtoken::EncodingKey,
    decoding_key: jsonwebtoken::DecodingKey,
}

impl JwtState {
    /// HMAC-SHA256 keys derived from the shared secret.
    pub fn new(secret: &[u8]) -> Self {
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = false;

        Self {
            header,
            validation,

            encoding_key: jsonwebtoken::EncodingKey::from_secret(secret),
            decoding_key: jsonwebtoken::DecodingKey::from_secret(secret),
        }
    }
}

pub fn current_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Body of `POST /jwt`. The whole object becomes the `email` claim, so a
/// decoded token reads `{"email": {"email": "..."}}`.
#[derive(Validate, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    #[validate(email)]
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccessTokenClaims {
    pub email: TokenSubject,
    pub iat: i64,
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp < current_timestamp().unix_timestamp()
    }
}

pub struct GenerateAccessTokenResponse {
    pub expired_at: OffsetDateTime,
    pub token: String,
}

pub fn generate_access_token(
    jwt_state: &JwtState,
    subject: &TokenSubject,
) -> Result<GenerateAccessTokenResponse, Error> {
    let issued_at = current_timestamp();
    let expired_at = issued_at + ACCESS_TOKEN_LIFETIME;
    let token = generate_access_token_with_exp(
        jwt_state,
        subject,
        issued_at.unix_timestamp(),
        expired_at.unix_timestamp(),
    )?;

    Ok(GenerateAccessTokenResponse { expired_at, token })
}

pub fn generate_access_token_with_exp(
    jwt_state: &JwtState,
    subject: &TokenSubject,
    iat: i64,
    exp: i64,
) -> Result<String, Error> {
    jsonwebtoken::encode(
        &jwt_state.header,
        &AccessTokenClaims {
            email: subject.clone(),
            iat,
            exp,
        },
        &jwt_state.encoding_key,
    )
    .map_err(Into::into)
}

pub fn decode_access_token(
    jwt_state: &JwtState,
    token: &str,
) -> Result<TokenData<AccessTokenClaims>, Error> {
    jsonwebtoken::decode(token, &jwt_state.decoding_key, &jwt_state.validation).map_err(Into::into)
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn issue(
    State(jwt_state): State<JwtState>,
    ValidJson(subject): ValidJson<TokenSubject>,
) -> Result<Json<TokenResponse>, Error> {
    let token = generate_access_token(&jwt_state, &subject)?;

    Ok(Json(TokenResponse { token: token.token }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> TokenSubject {
        TokenSubject {
            email: "a@b.com".to_string(),
        }
    }

    #[test]
    pub fn test_access_token() {
        let jwt = JwtState::new(b"secret");

        let token = generate_access_token(&jwt, &subject()).unwrap().token;

        let token = decode_access_token(&jwt, &token).unwrap();
        assert_eq!(token.claims.email, subject());
        assert!(!token.claims.is_expired());

        let lifetime = token.claims.exp - current_timestamp().unix_timestamp();
        assert!((3590..=3600).contains(&lifetime), "lifetime was {lifetime}");

        let token = generate_access_token_with_exp(
            &jwt,
            &subject(),
            0,
            (current_timestamp() + Duration::seconds(-1)).unix_timestamp(),
        )
        .unwrap();

        let token = decode_access_token(&jwt, &token).unwrap();

        assert!(token.claims.is_expired());
    }

    #[test]
    pub fn test_wrong_secret_is_rejected() {
        let token = generate_access_token(&JwtState::new(b"secret"), &subject())
            .unwrap()
            .token;

        assert!(decode_access_token(&JwtState::new(b"other"), &token).is_err());
    }

    #[tokio::test]
    pub async fn test_issue() {
        let jwt = JwtState::new(b"secret");

        let Json(response) = issue(State(jwt.clone()), ValidJson(subject()))
            .await
            .unwrap();

        let claims = decode_access_token(&jwt, &response.token).unwrap().claims;
        let raw = serde_json::to_value(&claims).unwrap();
        assert_eq!(raw["email"], serde_json::json!({ "email": "a@b.com" }));
        assert_eq!(claims.exp - claims.iat, 3600);
    }
}
