use axum::{extract::State, Json};

use crate::{error::Error, store::SharedStore, util::JsonDocument};

pub async fn index(State(store): State<SharedStore>) -> Result<Json<Vec<JsonDocument>>, Error> {
    let reviews = store.reviews().await?;

    Ok(Json(reviews.into_iter().map(Into::into).collect()))
}
