//! Storage seam between the HTTP handlers and the document database.
//!
//! Handlers never talk to a driver directly. They receive a [`SharedStore`]
//! through application state, which is either the MongoDB backed
//! [`MongoStore`] or the in-process [`MemoryStore`].
//!
//! Multi-step writes go through a [`StoreSession`]: nothing a session writes
//! is visible to other requests until [`StoreSession::commit`] succeeds, and
//! dropping a session without committing discards its writes.

use std::sync::Arc;

use bson::{oid::ObjectId, Document};
use serde::{Deserialize, Serialize};

use crate::{api::user::UserRole, error::Error};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub type SharedStore = Arc<dyn Store>;

pub mod collections {
    pub const USERS: &str = "users";
    pub const REVIEWS: &str = "reviews";
    pub const RIDER: &str = "rider";
    pub const PARTNER: &str = "partner";
    pub const BUSINESS: &str = "business";
    pub const DIVISION: &str = "division";
    pub const DISTRICTS: &str = "districts";
    pub const UPAZILAS: &str = "upazilas";
    pub const MIGRATIONS: &str = "migrations";
}

/// Field names shared by both store implementations.
pub mod fields {
    pub const ID: &str = "_id";
    pub const EMAIL: &str = "email";
    pub const ROLE: &str = "role";
    pub const MENU: &str = "menu";
    pub const LOCATION_OF_OUTLET: &str = "locationOfOutlet";
    pub const LOCATIONS: &str = "locations";
    pub const LOCATION_LEVELS: [&str; 3] = ["division", "district", "upazila"];
    pub const DIVISION_ID: &str = "division_id";
    pub const DISTRICT_ID: &str = "district_id";
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub matched_count: u64,
    pub modified_count: u64,
}

impl From<mongodb::results::UpdateResult> for UpdateSummary {
    fn from(value: mongodb::results::UpdateResult) -> Self {
        Self {
            matched_count: value.matched_count,
            modified_count: value.modified_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateUser {
    Created(ObjectId),
    AlreadyExists,
}

#[axum::async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, Error>;

    async fn reviews(&self) -> Result<Vec<Document>, Error>;

    async fn users(&self) -> Result<Vec<Document>, Error>;

    /// Only `_id` and `role` of the user.
    async fn user_role(&self, email: &str) -> Result<Option<Document>, Error>;

    /// Inserts `user` unless a user with `email` exists.
    async fn create_user(&self, email: &str, user: Document) -> Result<CreateUser, Error>;

    async fn partners(&self) -> Result<Vec<Document>, Error>;

    async fn partners_at(&self, location: &str) -> Result<Vec<Document>, Error>;

    /// Case-insensitive substring match on any `locations.*` level.
    async fn partners_matching(&self, fragment: &str) -> Result<Vec<Document>, Error>;

    async fn partner_by_id(&self, id: ObjectId) -> Result<Option<Document>, Error>;

    async fn partner_by_email(&self, email: &str) -> Result<Option<Document>, Error>;

    /// Appends `item` to the partner's menu as one atomic update and returns
    /// the partner after the update, or `None` when no partner has `email`.
    async fn append_menu_item(&self, email: &str, item: Document)
        -> Result<Option<Document>, Error>;

    async fn divisions(&self) -> Result<Vec<Document>, Error>;

    async fn districts(&self, division_id: &str) -> Result<Vec<Document>, Error>;

    async fn upazilas(&self, district_id: &str) -> Result<Vec<Document>, Error>;
}

#[axum::async_trait]
pub trait StoreSession: Send {
    async fn find_user(&mut self, email: &str) -> Result<Option<Document>, Error>;

    async fn set_user_role(&mut self, email: &str, role: UserRole)
        -> Result<UpdateSummary, Error>;

    async fn find_profile(&mut self, role: UserRole, email: &str)
        -> Result<Option<Document>, Error>;

    async fn insert_profile(&mut self, role: UserRole, profile: Document)
        -> Result<ObjectId, Error>;

    /// `$set`s every field of `profile` on the first profile with `email`.
    async fn update_profile(
        &mut self,
        role: UserRole,
        email: &str,
        profile: Document,
    ) -> Result<UpdateSummary, Error>;

    async fn delete_profiles(&mut self, role: UserRole, email: &str) -> Result<u64, Error>;

    async fn commit(self: Box<Self>) -> Result<(), Error>;
}
