use mongodb::{
    bson::doc,
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Collection,
};
use std::time::Duration;

use crate::{config::Config, errors::AppResult};

const APP_NAME: &str = "numeracy-server";

#[derive(Clone)]
pub struct Database {
    client: Client,
    db_name: String,
}

impl Database {
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let mut client_options = ClientOptions::parse(&config.mongo_conn_string).await?;

        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);
        client_options.app_name = Some(APP_NAME.to_string());
        // One sequential pipeline plus the trigger endpoint.
        client_options.max_pool_size = Some(4);
        client_options.min_pool_size = Some(1);
        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        log::info!(
            "Successfully connected to MongoDB database {}",
            config.mongo_db_name
        );

        Ok(Self {
            client,
            db_name: config.mongo_db_name.clone(),
        })
    }

    pub fn get_collection<T>(&self, collection_name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.client
            .database(&self.db_name)
            .collection(collection_name)
    }

    pub async fn health_check(&self) -> AppResult<()> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    /// Builds a handle without contacting the server. Operations fail fast if nothing listens.
    #[cfg(test)]
    pub async fn unconnected(conn_string: &str, db_name: &str) -> AppResult<Self> {
        let mut client_options = ClientOptions::parse(conn_string).await?;
        client_options.app_name = Some(APP_NAME.to_string());
        client_options.server_selection_timeout = Some(Duration::from_millis(200));

        Ok(Self {
            client: Client::with_options(client_options)?,
            db_name: db_name.to_string(),
        })
    }
}
