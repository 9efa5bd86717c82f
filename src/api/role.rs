//! Role assignment: registering a user in exactly one role collection.
//!
//! A switch touches the `users` record, the target collection and both
//! sibling collections. All of it runs in one store session, so either the
//! whole switch is visible or none of it is, and the caller gets a single
//! response once the sibling profiles are gone.

use axum::{extract::State, Json};
use bson::Document;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use validator::Validate;

use crate::{
    error::Error,
    store::{SharedStore, Store, UpdateSummary},
    util::{strip_reserved, ObjectIdString, ValidJson},
};

use super::{auth::UserAccess, user::UserRole};

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct RoleRequest {
    #[validate(email)]
    pub email: String,

    #[serde(flatten)]
    pub profile: Document,
}

impl RoleRequest {
    pub fn into_document(self) -> Document {
        let mut doc = bson::doc! { "email": self.email };
        doc.extend(strip_reserved(self.profile));
        doc
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProfileWrite {
    Inserted { inserted_id: ObjectIdString },
    Updated(UpdateSummary),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Retraction {
    pub role: UserRole,
    pub deleted_count: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoleAssignment {
    pub email: String,
    pub role: UserRole,
    pub user: UpdateSummary,
    pub profile: ProfileWrite,
    pub retracted: Vec<Retraction>,
}

#[tracing::instrument(
    skip_all,
    fields(
        email = %request.email,
        role = %role,
    )
)]
pub async fn assign_role(
    store: &dyn Store,
    role: UserRole,
    request: RoleRequest,
) -> Result<RoleAssignment, Error> {
    let email = request.email.clone();
    let profile = request.into_document();

    let mut session = store.begin().await?;

    session
        .find_user(&email)
        .await?
        .ok_or_else(|| Error::UserNotFound(email.clone()))
        .tap_err(|_| tracing::debug!("tried assigning a role to an unregistered email"))?;

    let user = session.set_user_role(&email, role).await?;

    // re-registering for the same role refreshes the existing profile; a
    // partner keeps its menu
    let profile = match session.find_profile(role, &email).await? {
        Some(_) => ProfileWrite::Updated(session.update_profile(role, &email, profile).await?),
        None => ProfileWrite::Inserted {
            inserted_id: session.insert_profile(role, profile).await?.into(),
        },
    };

    let mut retracted = vec![];
    for sibling in role.siblings() {
        let deleted_count = session.delete_profiles(sibling, &email).await?;
        if deleted_count > 0 {
            tracing::debug!(%sibling, deleted_count, "retracted previous role profile");
        }

        retracted.push(Retraction {
            role: sibling,
            deleted_count,
        });
    }

    session.commit().await?;
    tracing::info!("role assigned");

    Ok(RoleAssignment {
        email,
        role,
        user,
        profile,
        retracted,
    })
}

pub async fn business(
    State(store): State<SharedStore>,
    _user: UserAccess,
    ValidJson(request): ValidJson<RoleRequest>,
) -> Result<Json<RoleAssignment>, Error> {
    assign_role(store.as_ref(), UserRole::Business, request)
        .await
        .map(Json)
}

pub async fn rider(
    State(store): State<SharedStore>,
    _user: UserAccess,
    ValidJson(request): ValidJson<RoleRequest>,
) -> Result<Json<RoleAssignment>, Error> {
    assign_role(store.as_ref(), UserRole::Rider, request)
        .await
        .map(Json)
}
