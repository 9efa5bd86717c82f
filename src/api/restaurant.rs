use axum::{
    extract::{Path, Query, State},
    Json,
};
use bson::oid::ObjectId;
use serde::Deserialize;
use tap::TapFallible;

use crate::{error::Error, store::SharedStore, util::JsonDocument};

use super::partner::menu_of;

fn documents(docs: Vec<bson::Document>) -> Json<Vec<JsonDocument>> {
    Json(docs.into_iter().map(Into::into).collect())
}

pub async fn index(State(store): State<SharedStore>) -> Result<Json<Vec<JsonDocument>>, Error> {
    Ok(documents(store.partners().await?))
}

#[derive(Deserialize, Debug)]
pub struct LocationQuery {
    pub location: Option<String>,
}

/// Partners whose `locationOfOutlet` equals the query term exactly.
pub async fn by_location(
    State(store): State<SharedStore>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<Vec<JsonDocument>>, Error> {
    let Some(location) = query.location.filter(|it| !it.is_empty()) else {
        return Ok(Json(vec![]));
    };

    Ok(documents(store.partners_at(&location).await?))
}

pub async fn search(
    State(store): State<SharedStore>,
    Path(search_query): Path<String>,
) -> Result<Json<Vec<JsonDocument>>, Error> {
    let partners = store.partners_matching(&search_query).await?;
    tracing::debug!(%search_query, found = partners.len(), "searched outlet locations");

    Ok(documents(partners))
}

pub async fn show(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Json<JsonDocument>, Error> {
    let id: ObjectId = id
        .parse()
        .map_err(|_| Error::NoResource)
        .tap_err(|_| tracing::debug!(%id, "restaurant id is not an ObjectId"))?;

    let partner = store.partner_by_id(id).await?.ok_or(Error::NoResource)?;

    Ok(Json(partner.into()))
}

#[derive(Deserialize, Debug)]
pub struct MenuQuery {
    pub email: Option<String>,
}

pub async fn menu(
    State(store): State<SharedStore>,
    Query(query): Query<MenuQuery>,
) -> Result<Json<serde_json::Value>, Error> {
    let Some(email) = query.email else {
        return Err(Error::PartnerNotFound);
    };

    let partner = store
        .partner_by_email(&email)
        .await?
        .ok_or(Error::PartnerNotFound)
        .tap_err(|_| tracing::debug!(%email, "menu requested for an unknown outlet"))?;

    Ok(Json(menu_of(&partner)))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use crate::{api::tests::bootstrap, store::collections};

    use super::*;

    async fn seeded() -> crate::api::tests::Bootstrap {
        let bootstrap = bootstrap();
        bootstrap
            .memory
            .seed(
                collections::PARTNER,
                [
                    bson::doc! {
                        "email": "dhanmondi@tasty.com",
                        "locationOfOutlet": "Dhanmondi",
                        "locations": { "division": "Dhaka", "district": "Dhaka", "upazila": "Dhanmondi" },
                        "menu": [{ "dish": "kacchi" }],
                    },
                    bson::doc! {
                        "email": "agrabad@tasty.com",
                        "locationOfOutlet": "Agrabad",
                        "locations": { "division": "Chattogram", "district": "Chattogram", "upazila": "Double Mooring" },
                    },
                ],
            )
            .await;
        bootstrap
    }

    fn emails(Json(docs): Json<Vec<JsonDocument>>) -> Vec<String> {
        docs.into_iter()
            .filter_map(|doc| doc.0.get_str("email").ok().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let bootstrap = seeded().await;

        let found = search(bootstrap.store(), Path("DHAKA".to_string()))
            .await
            .unwrap();
        assert_eq!(emails(found), vec!["dhanmondi@tasty.com"]);

        let found = search(bootstrap.store(), Path("mooring".to_string()))
            .await
            .unwrap();
        assert_eq!(emails(found), vec!["agrabad@tasty.com"]);
    }

    #[tokio::test]
    async fn test_search_matches_text_literally() {
        let bootstrap = seeded().await;

        let found = search(bootstrap.store(), Path(".*".to_string()))
            .await
            .unwrap();
        assert!(found.0.is_empty());
    }

    #[tokio::test]
    async fn test_by_location_is_exact() {
        let bootstrap = seeded().await;

        let query = |location: Option<&str>| {
            Query(LocationQuery {
                location: location.map(str::to_string),
            })
        };

        let found = by_location(bootstrap.store(), query(Some("Agrabad")))
            .await
            .unwrap();
        assert_eq!(emails(found), vec!["agrabad@tasty.com"]);

        let found = by_location(bootstrap.store(), query(Some("agrabad")))
            .await
            .unwrap();
        assert!(found.0.is_empty());

        let found = by_location(bootstrap.store(), query(None)).await.unwrap();
        assert!(found.0.is_empty());
    }

    #[tokio::test]
    async fn test_show() {
        let bootstrap = seeded().await;
        let id = bootstrap.memory.documents(collections::PARTNER).await[0]
            .get_object_id("_id")
            .unwrap();

        let Json(partner) = show(bootstrap.store(), Path(id.to_hex())).await.unwrap();
        assert_eq!(partner.0.get_str("email").ok(), Some("dhanmondi@tasty.com"));

        let err = show(bootstrap.store(), Path("not-an-id".to_string()))
            .await
            .unwrap_err();
        assert_matches!(err, Error::NoResource);

        let err = show(bootstrap.store(), Path(ObjectId::new().to_hex()))
            .await
            .unwrap_err();
        assert_matches!(err, Error::NoResource);
    }

    #[tokio::test]
    async fn test_menu() {
        let bootstrap = seeded().await;

        let query = |email: Option<&str>| {
            Query(MenuQuery {
                email: email.map(str::to_string),
            })
        };

        let Json(found) = menu(bootstrap.store(), query(Some("dhanmondi@tasty.com")))
            .await
            .unwrap();
        assert_eq!(found, json!([{ "dish": "kacchi" }]));

        let Json(found) = menu(bootstrap.store(), query(Some("agrabad@tasty.com")))
            .await
            .unwrap();
        assert_eq!(found, json!([]));

        let err = menu(bootstrap.store(), query(Some("ghost@tasty.com")))
            .await
            .unwrap_err();
        assert_matches!(err, Error::PartnerNotFound);

        let err = menu(bootstrap.store(), query(None)).await.unwrap_err();
        assert_matches!(err, Error::PartnerNotFound);
    }
}
