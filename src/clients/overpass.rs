use crate::domain::models::Record;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

/// Client for an Overpass-style geospatial query endpoint.
pub struct OverpassClient {
    client: Client,
    endpoint: String,
}

impl OverpassClient {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }

    /// Run `query` and return the JSON payload as received.
    /// Calls: GET {endpoint}?data={query}
    pub async fn fetch_features(&self, query: &str) -> AppResult<Value> {
        debug!("Querying geospatial endpoint: {}", self.endpoint);

        let response = self.client
            .get(&self.endpoint)
            .query(&[("data", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let features: Value = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse geospatial response: {}", e)))?;

        info!("Received {} features", elements(&features).len());
        Ok(features)
    }
}

/// Object entries of the payload's `elements` array, as records.
pub fn elements(features: &Value) -> Vec<Record> {
    features
        .get("elements")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|item| item.as_object().cloned()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{http_client, test_server};
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    fn client() -> Client {
        http_client("aquaria-test/0.1", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetch_features_sends_query_and_returns_payload_unmodified() {
        let router = Router::new().route(
            "/api/interpreter",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let query = params.get("data").cloned().unwrap_or_default();
                Json(json!({
                    "version": 0.6,
                    "echo": query,
                    "elements": [
                        {"type": "node", "id": 1, "tags": {"tourism": "aquarium", "name": "Shedd"}},
                        {"type": "way", "id": 2, "center": {"lat": 1.0, "lon": 2.0}}
                    ]
                }))
            }),
        );
        let base = test_server::serve(router).await;
        let overpass = OverpassClient::new(client(), format!("{}/api/interpreter", base));

        let query = "[out:json];node[\"tourism\"=\"aquarium\"];out center;";
        let features = overpass.fetch_features(query).await.unwrap();

        assert_eq!(features["echo"], json!(query));
        assert_eq!(features["version"], json!(0.6));
        let records = elements(&features);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["tags"]["name"], json!("Shedd"));
    }

    #[tokio::test]
    async fn fetch_features_surfaces_error_status() {
        let router = Router::new().route(
            "/api/interpreter",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limited") }),
        );
        let base = test_server::serve(router).await;
        let overpass = OverpassClient::new(client(), format!("{}/api/interpreter", base));

        let result = overpass.fetch_features("[out:json];").await;
        assert!(matches!(result, Err(AppError::Fetch { status: 429, .. })));
    }

    #[test]
    fn elements_skips_non_objects_and_missing_arrays() {
        let features = json!({"elements": [{"id": 1}, 5, "x", {"id": 2}]});
        assert_eq!(elements(&features).len(), 2);
        assert!(elements(&json!({"remark": "timeout"})).is_empty());
    }
}
