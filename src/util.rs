use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::Request,
    Json,
};
use bson::{oid::ObjectId, Bson, Document};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use validator::Validate;

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct ObjectIdString(#[serde(with = "object_id_string")] pub ObjectId);

impl From<ObjectId> for ObjectIdString {
    fn from(value: ObjectId) -> Self {
        Self(value)
    }
}

impl std::ops::Deref for ObjectIdString {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::cmp::PartialEq for ObjectIdString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl std::cmp::Eq for ObjectIdString {}

impl std::cmp::PartialEq<ObjectId> for ObjectIdString {
    fn eq(&self, other: &ObjectId) -> bool {
        self.0 == *other
    }
}

mod object_id_string {
    use bson::oid::ObjectId;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(id: &ObjectId, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&id.to_hex())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ObjectId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A stored document rendered the way API clients expect it: ObjectIds as
/// hex strings, dates as RFC 3339, everything else as relaxed extended JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument(pub Document);

impl From<Document> for JsonDocument {
    fn from(value: Document) -> Self {
        Self(value)
    }
}

impl Serialize for JsonDocument {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        document_to_json(&self.0).serialize(serializer)
    }
}

pub fn document_to_json(doc: &Document) -> serde_json::Value {
    serde_json::Value::Object(
        doc.iter()
            .map(|(key, value)| (key.clone(), bson_to_json(value)))
            .collect(),
    )
}

pub fn bson_to_json(value: &Bson) -> serde_json::Value {
    match value {
        Bson::ObjectId(id) => serde_json::Value::String(id.to_hex()),
        Bson::DateTime(date) => date
            .try_to_rfc3339_string()
            .map(serde_json::Value::String)
            .unwrap_or_else(|_| serde_json::Value::from(date.timestamp_millis())),
        Bson::Document(doc) => document_to_json(doc),
        Bson::Array(items) => serde_json::Value::Array(items.iter().map(bson_to_json).collect()),
        other => other.clone().into_relaxed_extjson(),
    }
}

/// JSON body that must pass its `validator` rules before reaching a handler.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[axum::async_trait]
impl<T, S, B> FromRequest<S, B> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    B: Send + 'static,
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
{
    type Rejection = Error;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| Error::MalformedPayload(rejection.body_text()))?;

        value.validate()?;

        Ok(Self(value))
    }
}

/// Drops keys a client must not control before a payload is persisted.
pub fn strip_reserved(mut doc: Document) -> Document {
    doc.remove("_id");
    doc
}
