use std::ops::Deref;

use bson::Document;
use mongodb::{options::FindOptions, ClientSession};
use serde::de::DeserializeOwned;

use crate::error::Error;

pub struct Collection<T>(pub mongodb::Collection<T>);

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Collection<T> {
    type Target = mongodb::Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> From<mongodb::Collection<T>> for Collection<T> {
    fn from(value: mongodb::Collection<T>) -> Self {
        Self(value)
    }
}

impl<T> Collection<T>
where
    T: DeserializeOwned + Send + Sync + Unpin,
{
    pub async fn find_all(
        &self,
        filter: impl Into<Option<Document>>,
        options: impl Into<Option<FindOptions>>,
    ) -> Result<Vec<T>, Error> {
        let mut cursor = self.find(filter, options).await?;

        let mut vec = vec![];

        while cursor.advance().await? {
            vec.push(cursor.deserialize_current()?);
        }

        Ok(vec)
    }

    pub async fn find_one_by_email(&self, email: &str) -> Result<Option<T>, Error> {
        self.find_one(bson::doc! { "email": email }, None)
            .await
            .map_err(Into::into)
    }

    pub async fn find_one_by_email_with_session(
        &self,
        email: &str,
        session: &mut ClientSession,
    ) -> Result<Option<T>, Error> {
        self.find_one_with_session(bson::doc! { "email": email }, None, session)
            .await
            .map_err(Into::into)
    }
}
