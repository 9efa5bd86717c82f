use axum::{
    extract::{Query, State},
    Json,
};
use bson::Document;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::Error,
    store::{fields, CreateUser, SharedStore},
    util::{strip_reserved, JsonDocument, ObjectIdString, ValidJson},
};

use super::auth::UserAccess;

/// The three role collections a user can be registered in. A user without a
/// `role` field has not registered for any of them yet.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Business,
    Rider,
    Partner,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Business, UserRole::Rider, UserRole::Partner];

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Business => "business",
            UserRole::Rider => "rider",
            UserRole::Partner => "partner",
        }
    }

    pub fn siblings(self) -> impl Iterator<Item = UserRole> {
        Self::ALL.into_iter().filter(move |it| *it != self)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,

    #[serde(flatten)]
    pub profile: Document,
}

impl CreateUserRequest {
    /// Roles are only ever granted through role assignment.
    pub fn into_document(self) -> Document {
        let mut profile = strip_reserved(self.profile);
        profile.remove(fields::ROLE);

        let mut doc = bson::doc! { "email": self.email };
        doc.extend(profile);
        doc
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum CreateUserResponse {
    Created {
        acknowledged: bool,
        inserted_id: ObjectIdString,
    },
    Exists {
        message: String,
    },
}

pub async fn create(
    State(store): State<SharedStore>,
    ValidJson(request): ValidJson<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, Error> {
    let email = request.email.clone();

    let response = match store.create_user(&email, request.into_document()).await? {
        CreateUser::Created(id) => CreateUserResponse::Created {
            acknowledged: true,
            inserted_id: id.into(),
        },
        CreateUser::AlreadyExists => {
            tracing::debug!(%email, "user already registered");
            CreateUserResponse::Exists {
                message: "already exist".to_string(),
            }
        }
    };

    Ok(Json(response))
}

pub async fn index(
    State(store): State<SharedStore>,
    _user: UserAccess,
) -> Result<Json<Vec<JsonDocument>>, Error> {
    let users = store.users().await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoleQuery {
    pub email: Option<String>,
}

/// `_id` and `role` of the user, or `null` when nobody has that email.
pub async fn role(
    State(store): State<SharedStore>,
    _user: UserAccess,
    Query(query): Query<RoleQuery>,
) -> Result<Json<Option<JsonDocument>>, Error> {
    let Some(email) = query.email else {
        return Ok(Json(None));
    };

    let role = store.user_role(&email).await?;

    Ok(Json(role.map(Into::into)))
}
