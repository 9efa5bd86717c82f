use bson::{oid::ObjectId, Document};
use mongodb::{
    error::{CommandError, ErrorKind, WriteError, WriteFailure},
    options::{
        Acknowledgment, ClientOptions, FindOneAndUpdateOptions, FindOneOptions, ReadConcern,
        ReadPreference, ReturnDocument, SelectionCriteria, TransactionOptions, WriteConcern,
    },
    ClientSession,
};

use crate::{api::user::UserRole, error::Error, migrate::MigrationCollection, mongo_ext::Collection};

use super::{collections, fields, CreateUser, Store, StoreSession, UpdateSummary};

#[derive(Clone)]
pub struct MongoStore {
    pub(crate) client: mongodb::Client,
    pub(crate) database: mongodb::Database,

    pub(crate) users: Collection<Document>,
    pub(crate) reviews: Collection<Document>,
    pub(crate) rider: Collection<Document>,
    pub(crate) partner: Collection<Document>,
    pub(crate) business: Collection<Document>,
    pub(crate) division: Collection<Document>,
    pub(crate) districts: Collection<Document>,
    pub(crate) upazilas: Collection<Document>,
    pub(crate) migrations: MigrationCollection,
}

impl MongoStore {
    pub async fn connect(mongo_url: &str, database_name: &str) -> Result<Self, Error> {
        let mongo_client_opt = ClientOptions::parse(mongo_url).await?;
        let client = mongodb::Client::with_options(mongo_client_opt)?;

        Ok(Self::from_client(client, database_name))
    }

    pub fn from_client(client: mongodb::Client, database_name: &str) -> Self {
        let db = client.database(database_name);

        Self {
            users: db.collection(collections::USERS).into(),
            reviews: db.collection(collections::REVIEWS).into(),
            rider: db.collection(collections::RIDER).into(),
            partner: db.collection(collections::PARTNER).into(),
            business: db.collection(collections::BUSINESS).into(),
            division: db.collection(collections::DIVISION).into(),
            districts: db.collection(collections::DISTRICTS).into(),
            upazilas: db.collection(collections::UPAZILAS).into(),
            migrations: MigrationCollection(db.collection(collections::MIGRATIONS).into()),

            database: db,
            client,
        }
    }

    pub async fn ping(&self) -> Result<(), Error> {
        self.client
            .database("admin")
            .run_command(bson::doc! { "ping": 1 }, None)
            .await?;

        tracing::info!(database = %self.database.name(), "pinged deployment");
        Ok(())
    }

    pub async fn shutdown(self) {
        tracing::info!("closing database connection");
        self.client.shutdown().await;
    }

    pub(crate) fn profiles(&self, role: UserRole) -> &Collection<Document> {
        match role {
            UserRole::Business => &self.business,
            UserRole::Rider => &self.rider,
            UserRole::Partner => &self.partner,
        }
    }

    fn transaction_options() -> TransactionOptions {
        TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Primary))
            .build()
    }
}

pub(crate) const DUPLICATE_KEY: i32 = 11000;

/// Server error code of a failed write or command.
pub(crate) fn error_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code, .. })) => Some(*code),
        ErrorKind::Command(CommandError { code, .. }) => Some(*code),
        _ => None,
    }
}

pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    error_code(err) == Some(DUPLICATE_KEY)
}

#[axum::async_trait]
impl Store for MongoStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, Error> {
        let mut session = self.client.start_session(None).await?;
        session
            .start_transaction(Self::transaction_options())
            .await?;

        Ok(Box::new(MongoSession {
            store: self.clone(),
            session,
        }))
    }

    async fn reviews(&self) -> Result<Vec<Document>, Error> {
        self.reviews.find_all(None, None).await
    }

    async fn users(&self) -> Result<Vec<Document>, Error> {
        self.users.find_all(None, None).await
    }

    async fn user_role(&self, email: &str) -> Result<Option<Document>, Error> {
        self.users
            .find_one(
                bson::doc! { "email": email },
                FindOneOptions::builder()
                    .projection(bson::doc! { "role": 1 })
                    .build(),
            )
            .await
            .map_err(Into::into)
    }

    async fn create_user(&self, email: &str, mut user: Document) -> Result<CreateUser, Error> {
        if self.users.find_one_by_email(email).await?.is_some() {
            return Ok(CreateUser::AlreadyExists);
        }

        let id = ObjectId::new();
        user.insert(fields::ID, id);

        match self.users.insert_one(&user, None).await {
            Ok(_) => Ok(CreateUser::Created(id)),
            // lost the race against a concurrent insert, caught by the unique index
            Err(err) if is_duplicate_key(&err) => Ok(CreateUser::AlreadyExists),
            Err(err) => Err(err.into()),
        }
    }

    async fn partners(&self) -> Result<Vec<Document>, Error> {
        self.partner.find_all(None, None).await
    }

    async fn partners_at(&self, location: &str) -> Result<Vec<Document>, Error> {
        self.partner
            .find_all(bson::doc! { "locationOfOutlet": location }, None)
            .await
    }

    async fn partners_matching(&self, fragment: &str) -> Result<Vec<Document>, Error> {
        let pattern = regex::escape(fragment);

        let any_level = fields::LOCATION_LEVELS
            .iter()
            .map(|level| {
                let mut clause = Document::new();
                clause.insert(
                    format!("{}.{}", fields::LOCATIONS, level),
                    bson::doc! { "$regex": pattern.clone(), "$options": "i" },
                );
                clause
            })
            .collect::<Vec<_>>();

        self.partner
            .find_all(bson::doc! { "$or": any_level }, None)
            .await
    }

    async fn partner_by_id(&self, id: ObjectId) -> Result<Option<Document>, Error> {
        self.partner
            .find_one(bson::doc! { "_id": id }, None)
            .await
            .map_err(Into::into)
    }

    async fn partner_by_email(&self, email: &str) -> Result<Option<Document>, Error> {
        self.partner.find_one_by_email(email).await
    }

    async fn append_menu_item(
        &self,
        email: &str,
        item: Document,
    ) -> Result<Option<Document>, Error> {
        // pipeline update so a missing or null menu starts empty; `$literal`
        // keeps "$"-prefixed strings in the item from reading as field paths
        let append = vec![bson::doc! {
            "$set": {
                "menu": {
                    "$concatArrays": [
                        { "$ifNull": ["$menu", []] },
                        [{ "$literal": item }],
                    ]
                }
            }
        }];

        self.partner
            .find_one_and_update(
                bson::doc! { "email": email },
                append,
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await
            .map_err(Into::into)
    }

    async fn divisions(&self) -> Result<Vec<Document>, Error> {
        self.division.find_all(None, None).await
    }

    async fn districts(&self, division_id: &str) -> Result<Vec<Document>, Error> {
        self.districts
            .find_all(bson::doc! { "division_id": division_id }, None)
            .await
    }

    async fn upazilas(&self, district_id: &str) -> Result<Vec<Document>, Error> {
        self.upazilas
            .find_all(bson::doc! { "district_id": district_id }, None)
            .await
    }
}

pub struct MongoSession {
    store: MongoStore,
    session: ClientSession,
}

#[axum::async_trait]
impl StoreSession for MongoSession {
    async fn find_user(&mut self, email: &str) -> Result<Option<Document>, Error> {
        self.store
            .users
            .find_one_by_email_with_session(email, &mut self.session)
            .await
    }

    async fn set_user_role(
        &mut self,
        email: &str,
        role: UserRole,
    ) -> Result<UpdateSummary, Error> {
        self.store
            .users
            .update_one_with_session(
                bson::doc! { "email": email },
                bson::doc! { "$set": { "role": role.as_str() } },
                None,
                &mut self.session,
            )
            .await
            .map(Into::into)
            .map_err(Into::into)
    }

    async fn find_profile(
        &mut self,
        role: UserRole,
        email: &str,
    ) -> Result<Option<Document>, Error> {
        self.store
            .profiles(role)
            .find_one_by_email_with_session(email, &mut self.session)
            .await
    }

    async fn insert_profile(
        &mut self,
        role: UserRole,
        mut profile: Document,
    ) -> Result<ObjectId, Error> {
        let id = ObjectId::new();
        profile.insert(fields::ID, id);

        self.store
            .profiles(role)
            .insert_one_with_session(&profile, None, &mut self.session)
            .await?;

        Ok(id)
    }

    async fn update_profile(
        &mut self,
        role: UserRole,
        email: &str,
        profile: Document,
    ) -> Result<UpdateSummary, Error> {
        self.store
            .profiles(role)
            .update_one_with_session(
                bson::doc! { "email": email },
                bson::doc! { "$set": profile },
                None,
                &mut self.session,
            )
            .await
            .map(Into::into)
            .map_err(Into::into)
    }

    async fn delete_profiles(&mut self, role: UserRole, email: &str) -> Result<u64, Error> {
        self.store
            .profiles(role)
            .delete_many_with_session(bson::doc! { "email": email }, None, &mut self.session)
            .await
            .map(|it| it.deleted_count)
            .map_err(Into::into)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), Error> {
        self.session.commit_transaction().await.map_err(Into::into)
    }
}
