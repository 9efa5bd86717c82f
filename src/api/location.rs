//! Division → district → upazila lookups. Read only.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{error::Error, store::SharedStore, util::JsonDocument};

/// `?data=<parent id>`
#[derive(Deserialize, Debug)]
pub struct ParentQuery {
    pub data: Option<String>,
}

pub async fn divisions(State(store): State<SharedStore>) -> Result<Json<Vec<JsonDocument>>, Error> {
    let divisions = store.divisions().await?;

    Ok(Json(divisions.into_iter().map(Into::into).collect()))
}

pub async fn districts(
    State(store): State<SharedStore>,
    Query(query): Query<ParentQuery>,
) -> Result<Json<Vec<JsonDocument>>, Error> {
    let Some(division_id) = query.data else {
        return Ok(Json(vec![]));
    };

    let districts = store.districts(&division_id).await?;

    Ok(Json(districts.into_iter().map(Into::into).collect()))
}

pub async fn upazilas(
    State(store): State<SharedStore>,
    Query(query): Query<ParentQuery>,
) -> Result<Json<Vec<JsonDocument>>, Error> {
    let Some(district_id) = query.data else {
        return Ok(Json(vec![]));
    };

    let upazilas = store.upazilas(&district_id).await?;

    Ok(Json(upazilas.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use crate::{api::tests::bootstrap, store::collections};

    use super::*;

    fn data(value: Option<&str>) -> Query<ParentQuery> {
        Query(ParentQuery {
            data: value.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_districts_filter_by_division() {
        let bootstrap = bootstrap();
        bootstrap
            .memory
            .seed(
                collections::DISTRICTS,
                [
                    bson::doc! { "id": "1", "division_id": "D1", "name": "Comilla" },
                    bson::doc! { "id": "2", "division_id": "D2", "name": "Rajshahi" },
                    bson::doc! { "id": "3", "division_id": "D1", "name": "Feni" },
                ],
            )
            .await;

        let Json(found) = districts(bootstrap.store(), data(Some("D1"))).await.unwrap();
        let names: Vec<_> = found
            .iter()
            .filter_map(|doc| doc.0.get_str("name").ok())
            .collect();
        assert_eq!(names, vec!["Comilla", "Feni"]);

        let Json(found) = districts(bootstrap.store(), data(None)).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_upazilas_filter_by_district() {
        let bootstrap = bootstrap();
        bootstrap
            .memory
            .seed(
                collections::UPAZILAS,
                [
                    bson::doc! { "district_id": "1", "name": "Debidwar" },
                    bson::doc! { "district_id": "2", "name": "Paba" },
                ],
            )
            .await;

        let Json(found) = upazilas(bootstrap.store(), data(Some("2"))).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.get_str("name").ok(), Some("Paba"));
    }

    #[tokio::test]
    async fn test_divisions() {
        let bootstrap = bootstrap();
        bootstrap
            .memory
            .seed(collections::DIVISION, [bson::doc! { "name": "Dhaka" }])
            .await;

        let Json(found) = divisions(bootstrap.store()).await.unwrap();
        assert_eq!(found.len(), 1);
    }
}
