use crate::domain::models::Record;
use crate::error::{AppError, AppResult};
use crate::storage::{StoreBackend, StoreSession};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion};
use mongodb::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// MongoDB backend using the Stable API v1.
pub struct MongoBackend {
    uri: String,
    app_name: String,
    timeout: Duration,
}

impl MongoBackend {
    pub fn new(uri: String, app_name: String, timeout: Duration) -> Self {
        Self { uri, app_name, timeout }
    }
}

#[async_trait]
impl StoreBackend for MongoBackend {
    async fn open(&self) -> AppResult<Arc<dyn StoreSession>> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| AppError::Connection(format!("Invalid connection string: {}", e)))?;
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
        options.app_name = Some(self.app_name.clone());
        options.connect_timeout = Some(self.timeout);
        options.server_selection_timeout = Some(self.timeout);

        let client = Client::with_options(options)
            .map_err(|e| AppError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Arc::new(MongoSession { client }))
    }

    fn name(&self) -> &'static str {
        "mongo"
    }
}

struct MongoSession {
    client: Client,
}

fn to_document(record: &Record) -> AppResult<Document> {
    bson::to_document(record).map_err(|e| AppError::Internal(format!("BSON error: {}", e)))
}

fn to_record(document: Document) -> Record {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

#[async_trait]
impl StoreSession for MongoSession {
    async fn ping(&self) -> AppResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AppError::Connection(format!("Ping failed: {}", e)))?;
        Ok(())
    }

    async fn list_collection_names(&self, database: &str) -> AppResult<Vec<String>> {
        Ok(self.client.database(database).list_collection_names().await?)
    }

    async fn find(&self, database: &str, collection: &str, filter: Record) -> AppResult<Vec<Record>> {
        let filter = to_document(&filter)?;
        debug!("find on {}.{} with filter {}", database, collection, filter);

        let cursor = self.client
            .database(database)
            .collection::<Document>(collection)
            .find(filter)
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;

        Ok(documents.into_iter().map(to_record).collect())
    }

    async fn insert_many(&self, database: &str, collection: &str, records: Vec<Record>) -> AppResult<bool> {
        let documents = records
            .iter()
            .map(to_document)
            .collect::<AppResult<Vec<_>>>()?;
        let expected = documents.len();

        let result = self.client
            .database(database)
            .collection::<Document>(collection)
            .insert_many(documents)
            .await?;

        debug!("inserted {}/{} documents into {}.{}", result.inserted_ids.len(), expected, database, collection);
        Ok(result.inserted_ids.len() == expected)
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    #[test]
    fn record_converts_to_bson_document() {
        let record = json!({"name": "Shedd", "visitors": 2000000, "tags": ["fresh", "salt"]})
            .as_object()
            .cloned()
            .unwrap();
        let document = to_document(&record).unwrap();
        assert_eq!(document.get_str("name").unwrap(), "Shedd");
        assert!(matches!(
            document.get("visitors"),
            Some(Bson::Int64(2000000)) | Some(Bson::Int32(2000000))
        ));
        assert_eq!(document.get_array("tags").unwrap().len(), 2);
    }

    #[test]
    fn object_id_round_trips_as_extended_json() {
        let id = ObjectId::new();
        let record = to_record(doc! { "_id": id, "name": "Shedd" });
        assert_eq!(record["name"], json!("Shedd"));
        assert_eq!(record["_id"], json!({ "$oid": id.to_hex() }));
    }

    #[tokio::test]
    async fn malformed_uri_is_a_connection_error() {
        let backend = MongoBackend::new("not-a-uri".to_string(), "test".to_string(), Duration::from_secs(1));
        assert!(matches!(backend.open().await, Err(AppError::Connection(_))));
    }
}
