pub mod fetcher;
pub mod overpass;
pub mod robots;

pub use fetcher::PolicyFetcher;
pub use overpass::OverpassClient;

use crate::error::{AppError, AppResult};
use reqwest::Client;
use std::time::Duration;

/// Build the HTTP client shared by the outbound clients.
pub fn http_client(user_agent: &str, timeout: Duration) -> AppResult<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))
}
