//! Versioned index migrations.
//!
//! MongoDB refuses to build indexes inside a multi-document transaction on
//! collections that already hold data, so every index is built outside any
//! session (`createIndexes` is a no-op for an identical existing index). Only
//! the version records are written in one transaction. A step that fails on
//! legacy data is logged and left unrecorded, so it is retried on the next
//! start.

use std::collections::HashSet;

use bson::{oid::ObjectId, Document};
use mongodb::{options::IndexOptions, ClientSession, IndexModel};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    mongo_ext::Collection,
    store::{
        mongo::{error_code, DUPLICATE_KEY},
        MongoStore,
    },
};

/// Server codes of index builds that conflict with existing index
/// definitions.
const INDEX_OPTIONS_CONFLICT: i32 = 85;
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;

#[derive(Serialize, Deserialize, Debug)]
pub struct MigrateModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub version: i64,
}

#[derive(Clone)]
pub struct MigrationCollection(pub Collection<MigrateModel>);

impl std::ops::Deref for MigrationCollection {
    type Target = Collection<MigrateModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MigrationCollection {
    pub async fn insert_version_with_session(
        &self,
        version: i64,
        session: &mut ClientSession,
    ) -> Result<(), mongodb::error::Error> {
        self.insert_one_with_session(
            MigrateModel {
                id: ObjectId::new(),
                version,
            },
            None,
            session,
        )
        .await
        .map(|_| ())
    }

    pub async fn versions(&self) -> Result<HashSet<i64>, Error> {
        Ok(self
            .find_all(None, None)
            .await?
            .into_iter()
            .map(|it| it.version)
            .collect())
    }
}

fn index(keys: Document, unique: bool) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(unique).build())
        .build()
}

fn is_blocked_by_existing_data(err: &mongodb::error::Error) -> bool {
    matches!(
        error_code(err),
        Some(DUPLICATE_KEY | INDEX_OPTIONS_CONFLICT | INDEX_KEY_SPECS_CONFLICT)
    )
}

impl MongoStore {
    async fn v1_migrate(&self) -> Result<(), mongodb::error::Error> {
        self.migrations
            .create_index(index(bson::doc! { "version": 1 }, true), None)
            .await?;

        self.users
            .create_index(index(bson::doc! { "email": 1 }, true), None)
            .await?;

        Ok(())
    }

    async fn v2_migrate(&self) -> Result<(), mongodb::error::Error> {
        self.partner
            .create_index(index(bson::doc! { "email": 1 }, false), None)
            .await?;

        self.partner
            .create_index(index(bson::doc! { "locationOfOutlet": 1 }, false), None)
            .await?;

        for profiles in [&self.business, &self.rider] {
            profiles
                .create_index(index(bson::doc! { "email": 1 }, false), None)
                .await?;
        }

        Ok(())
    }

    async fn v3_migrate(&self) -> Result<(), mongodb::error::Error> {
        self.districts
            .create_index(index(bson::doc! { "division_id": 1 }, false), None)
            .await?;

        self.upazilas
            .create_index(index(bson::doc! { "district_id": 1 }, false), None)
            .await?;

        Ok(())
    }

    pub async fn run_migration(&self) -> Result<(), Error> {
        let applied = self.migrations.versions().await?;
        let mut completed = vec![];

        macro_rules! migrate {
            ($version:expr, $fun:ident) => {
                if !applied.contains(&$version) {
                    tracing::debug!("running migration version {}", $version);
                    match self.$fun().await {
                        Ok(()) => completed.push($version),
                        Err(err) if is_blocked_by_existing_data(&err) => {
                            tracing::warn!(
                                "migration version {} blocked by existing data, retrying on next start: {}",
                                $version,
                                err
                            );
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            };
        }

        migrate!(1, v1_migrate);
        migrate!(2, v2_migrate);
        migrate!(3, v3_migrate);

        if completed.is_empty() {
            return Ok(());
        }

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        for version in completed {
            self.migrations
                .insert_version_with_session(version, &mut session)
                .await?;
        }

        session.commit_transaction().await?;
        Ok(())
    }
}
