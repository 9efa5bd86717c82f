//! In-process [`Store`] used by the test-suite and for local experiments
//! without a MongoDB deployment.
//!
//! Every collection is a `Vec<Document>` in insertion order. One async mutex
//! guards all of them; a session stages its writes on a copy of the data and
//! swaps it in on commit.

use std::{collections::HashMap, sync::Arc};

use bson::{oid::ObjectId, Bson, Document};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{api::user::UserRole, error::Error};

use super::{collections, fields, CreateUser, Store, StoreSession, UpdateSummary};

#[derive(Debug, Default, Clone)]
struct MemoryData {
    collections: HashMap<&'static str, Vec<Document>>,
}

impl MemoryData {
    fn collection(&self, name: &'static str) -> &[Document] {
        self.collections
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn collection_mut(&mut self, name: &'static str) -> &mut Vec<Document> {
        self.collections.entry(name).or_default()
    }

    fn find(&self, name: &'static str, predicate: impl Fn(&Document) -> bool) -> Vec<Document> {
        self.collection(name)
            .iter()
            .filter(|doc| predicate(doc))
            .cloned()
            .collect()
    }

    fn find_one(
        &self,
        name: &'static str,
        predicate: impl Fn(&Document) -> bool,
    ) -> Option<Document> {
        self.collection(name).iter().find(|doc| predicate(doc)).cloned()
    }

    fn insert(&mut self, name: &'static str, mut doc: Document) -> ObjectId {
        let id = match doc.get_object_id(fields::ID) {
            Ok(id) => id,
            Err(_) => {
                let id = ObjectId::new();
                doc.insert(fields::ID, id);
                id
            }
        };

        self.collection_mut(name).push(doc);
        id
    }
}

fn field_is(doc: &Document, field: &str, value: &str) -> bool {
    doc.get_str(field).ok() == Some(value)
}

fn email_is(doc: &Document, email: &str) -> bool {
    field_is(doc, fields::EMAIL, email)
}

fn profile_collection(role: UserRole) -> &'static str {
    match role {
        UserRole::Business => collections::BUSINESS,
        UserRole::Rider => collections::RIDER,
        UserRole::Partner => collections::PARTNER,
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends documents to a collection as they are, assigning an `_id` to
    /// those without one.
    pub async fn seed(&self, collection: &'static str, docs: impl IntoIterator<Item = Document>) {
        let mut data = self.data.lock().await;
        for doc in docs {
            data.insert(collection, doc);
        }
    }

    pub async fn documents(&self, collection: &'static str) -> Vec<Document> {
        self.data.lock().await.collection(collection).to_vec()
    }

    pub async fn find_user(&self, email: &str) -> Option<Document> {
        self.data
            .lock()
            .await
            .find_one(collections::USERS, |doc| email_is(doc, email))
    }

    pub async fn profiles(&self, role: UserRole, email: &str) -> Vec<Document> {
        self.data
            .lock()
            .await
            .find(profile_collection(role), |doc| email_is(doc, email))
    }
}

#[axum::async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, Error> {
        let guard = self.data.clone().lock_owned().await;
        let staged = (*guard).clone();

        Ok(Box::new(MemorySession { guard, staged }))
    }

    async fn reviews(&self) -> Result<Vec<Document>, Error> {
        Ok(self.documents(collections::REVIEWS).await)
    }

    async fn users(&self) -> Result<Vec<Document>, Error> {
        Ok(self.documents(collections::USERS).await)
    }

    async fn user_role(&self, email: &str) -> Result<Option<Document>, Error> {
        let user = self.find_user(email).await;

        Ok(user.map(|user| {
            let mut projected = Document::new();
            for key in [fields::ID, fields::ROLE] {
                if let Some(value) = user.get(key) {
                    projected.insert(key, value.clone());
                }
            }
            projected
        }))
    }

    async fn create_user(&self, email: &str, user: Document) -> Result<CreateUser, Error> {
        let mut data = self.data.lock().await;

        if data.find_one(collections::USERS, |doc| email_is(doc, email)).is_some() {
            return Ok(CreateUser::AlreadyExists);
        }

        Ok(CreateUser::Created(data.insert(collections::USERS, user)))
    }

    async fn partners(&self) -> Result<Vec<Document>, Error> {
        Ok(self.documents(collections::PARTNER).await)
    }

    async fn partners_at(&self, location: &str) -> Result<Vec<Document>, Error> {
        Ok(self.data.lock().await.find(
            collections::PARTNER,
            |doc| field_is(doc, fields::LOCATION_OF_OUTLET, location),
        ))
    }

    async fn partners_matching(&self, fragment: &str) -> Result<Vec<Document>, Error> {
        let pattern = regex::RegexBuilder::new(&regex::escape(fragment))
            .case_insensitive(true)
            .build()
            .map_err(|err| Error::MalformedPayload(err.to_string()))?;

        Ok(self.data.lock().await.find(collections::PARTNER, |doc| {
            let Ok(locations) = doc.get_document(fields::LOCATIONS) else {
                return false;
            };

            fields::LOCATION_LEVELS.iter().any(|level| {
                locations
                    .get_str(level)
                    .map(|value| pattern.is_match(value))
                    .unwrap_or(false)
            })
        }))
    }

    async fn partner_by_id(&self, id: ObjectId) -> Result<Option<Document>, Error> {
        Ok(self.data.lock().await.find_one(collections::PARTNER, |doc| {
            doc.get_object_id(fields::ID).ok() == Some(id)
        }))
    }

    async fn partner_by_email(&self, email: &str) -> Result<Option<Document>, Error> {
        Ok(self
            .data
            .lock()
            .await
            .find_one(collections::PARTNER, |doc| email_is(doc, email)))
    }

    async fn append_menu_item(
        &self,
        email: &str,
        item: Document,
    ) -> Result<Option<Document>, Error> {
        let mut data = self.data.lock().await;

        let Some(partner) = data
            .collection_mut(collections::PARTNER)
            .iter_mut()
            .find(|doc| email_is(doc, email))
        else {
            return Ok(None);
        };

        let mut menu = match partner.get(fields::MENU) {
            Some(Bson::Array(items)) => items.clone(),
            Some(Bson::Null) | None => vec![],
            Some(other) => {
                return Err(Error::MalformedPayload(format!(
                    "menu of {email} is not an array: {other}"
                )))
            }
        };
        menu.push(Bson::Document(item));
        partner.insert(fields::MENU, menu);

        Ok(Some(partner.clone()))
    }

    async fn divisions(&self) -> Result<Vec<Document>, Error> {
        Ok(self.documents(collections::DIVISION).await)
    }

    async fn districts(&self, division_id: &str) -> Result<Vec<Document>, Error> {
        Ok(self.data.lock().await.find(
            collections::DISTRICTS,
            |doc| field_is(doc, fields::DIVISION_ID, division_id),
        ))
    }

    async fn upazilas(&self, district_id: &str) -> Result<Vec<Document>, Error> {
        Ok(self.data.lock().await.find(
            collections::UPAZILAS,
            |doc| field_is(doc, fields::DISTRICT_ID, district_id),
        ))
    }
}

pub struct MemorySession {
    guard: OwnedMutexGuard<MemoryData>,
    staged: MemoryData,
}

#[axum::async_trait]
impl StoreSession for MemorySession {
    async fn find_user(&mut self, email: &str) -> Result<Option<Document>, Error> {
        Ok(self.staged.find_one(collections::USERS, |doc| email_is(doc, email)))
    }

    async fn set_user_role(
        &mut self,
        email: &str,
        role: UserRole,
    ) -> Result<UpdateSummary, Error> {
        let mut summary = UpdateSummary::default();

        if let Some(user) = self
            .staged
            .collection_mut(collections::USERS)
            .iter_mut()
            .find(|doc| email_is(doc, email))
        {
            summary.matched_count = 1;
            if !field_is(user, fields::ROLE, role.as_str()) {
                user.insert(fields::ROLE, role.as_str());
                summary.modified_count = 1;
            }
        }

        Ok(summary)
    }

    async fn find_profile(
        &mut self,
        role: UserRole,
        email: &str,
    ) -> Result<Option<Document>, Error> {
        Ok(self
            .staged
            .find_one(profile_collection(role), |doc| email_is(doc, email)))
    }

    async fn insert_profile(
        &mut self,
        role: UserRole,
        profile: Document,
    ) -> Result<ObjectId, Error> {
        Ok(self.staged.insert(profile_collection(role), profile))
    }

    async fn update_profile(
        &mut self,
        role: UserRole,
        email: &str,
        profile: Document,
    ) -> Result<UpdateSummary, Error> {
        let mut summary = UpdateSummary::default();

        if let Some(existing) = self
            .staged
            .collection_mut(profile_collection(role))
            .iter_mut()
            .find(|doc| email_is(doc, email))
        {
            summary.matched_count = 1;
            for (key, value) in profile {
                if existing.get(&key) != Some(&value) {
                    existing.insert(key, value);
                    summary.modified_count = 1;
                }
            }
        }

        Ok(summary)
    }

    async fn delete_profiles(&mut self, role: UserRole, email: &str) -> Result<u64, Error> {
        let profiles = self.staged.collection_mut(profile_collection(role));
        let before = profiles.len();
        profiles.retain(|doc| !email_is(doc, email));

        Ok((before - profiles.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let Self { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
