use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    api::token::JwtState,
    config::Config,
    error::Error,
    store::{MongoStore, SharedStore},
};

#[derive(FromRef, Clone)]
pub struct AppState {
    pub jwt_state: JwtState,
    pub store: SharedStore,
}

impl AppState {
    pub fn new(jwt_state: JwtState, store: SharedStore) -> Self {
        Self { jwt_state, store }
    }

    /// Connects to MongoDB and brings its indexes up to date. The returned
    /// [`MongoStore`] handle is what gets shut down once the server stops.
    pub async fn from_config(config: &Config) -> Result<(Self, MongoStore), Error> {
        let jwt_state = JwtState::new(config.jwt_secret.as_bytes());

        let store = MongoStore::connect(&config.mongo_uri, &config.database_name).await?;
        store.ping().await?;
        store.run_migration().await?;

        Ok((Self::new(jwt_state, Arc::new(store.clone())), store))
    }
}
