use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    MalformedPayload(String),

    #[error("{0} not found")]
    NotFound(Uri),

    #[error("No resource found")]
    NoResource,

    #[error("no user registered with email {0}")]
    UserNotFound(String),

    #[error("Partner not found")]
    PartnerNotFound,

    #[error("{0}")]
    DatabaseError(#[from] mongodb::error::Error),

    #[error("{0}")]
    JWTError(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    Unauthorized(UnauthorizedType),

    #[error("{0}")]
    BSONSerError(#[from] bson::ser::Error),

    #[error("{0}")]
    BSONDeError(#[from] bson::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UnauthorizedType {
    #[error("unauthorized access")]
    MissingToken,

    #[error("unauthorized token")]
    InvalidToken,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorJson {
    pub error: bool,
    pub r#type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl From<Error> for ErrorJson {
    fn from(err: Error) -> Self {
        let r#type = err.to_string_variant();

        let message = if err.is_internal() {
            "Internal server error".to_string()
        } else {
            err.to_string()
        };

        let errors = match err {
            Error::ValidationError(err) => serde_json::to_value(err).ok(),
            Error::MalformedPayload(..)
            | Error::NotFound(..)
            | Error::NoResource
            | Error::UserNotFound(..)
            | Error::PartnerNotFound
            | Error::DatabaseError(..)
            | Error::JWTError(..)
            | Error::Unauthorized(..)
            | Error::BSONSerError(..)
            | Error::BSONDeError(..) => None,
        };

        Self {
            error: true,
            r#type,
            message,
            errors,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("error: {:?}", self);
        let status = self.status();

        let error = ErrorJson::from(self);

        (status, Json(error)).into_response()
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            Self::ValidationError(..) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::MalformedPayload(..) => StatusCode::BAD_REQUEST,
            Self::NotFound(..) | Self::NoResource | Self::UserNotFound(..) | Self::PartnerNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::DatabaseError(..)
            | Self::JWTError(..)
            | Self::BSONSerError(..)
            | Self::BSONDeError(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Storage and signing failures keep their detail in the log only.
    pub fn is_internal(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
    }

    pub fn to_string_variant(&self) -> String {
        macro_rules! match_var {
            ($id:ident !) => {
                Self::$id
            };
            ($id:ident (..)) => {
                Self::$id(..)
            };
        }

        macro_rules! variant {
            ($($name:ident $tt:tt),+) => {
                match self {
                    $(
                        match_var!($name $tt) => {
                            stringify!($name)
                       }
                    )+
                }
            };
        }

        variant! {
            ValidationError(..),
            MalformedPayload(..),
            NotFound(..),
            NoResource!,
            UserNotFound(..),
            PartnerNotFound!,
            DatabaseError(..),
            JWTError(..),
            Unauthorized(..),
            BSONSerError(..),
            BSONDeError(..)
        }
        .to_string()
    }
}

impl From<axum::extract::rejection::PathRejection> for Error {
    fn from(_value: axum::extract::rejection::PathRejection) -> Self {
        Self::NoResource
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    async fn body_json(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unauthorized_bodies() {
        let (status, body) = body_json(Error::Unauthorized(UnauthorizedType::MissingToken)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "unauthorized access");

        let (status, body) = body_json(Error::Unauthorized(UnauthorizedType::InvalidToken)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "unauthorized token");
        assert_eq!(body["type"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_internal_errors_hide_detail() {
        let err = bson::from_document::<String>(bson::doc! {}).unwrap_err();
        let (status, body) = body_json(Error::BSONDeError(err)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["type"], "BSONDeError");
    }

    #[tokio::test]
    async fn test_not_found_variants() {
        let (status, body) = body_json(Error::PartnerNotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Partner not found");

        let (status, body) = body_json(Error::UserNotFound("a@b.com".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "no user registered with email a@b.com");
    }
}
