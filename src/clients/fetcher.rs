use crate::clients::http_client;
use crate::clients::robots::RobotsPolicy;
use crate::error::{AppError, AppResult};
use reqwest::{Client, StatusCode};
use scraper::Html;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Agent evaluated by [`PolicyFetcher::is_allowed`] when the caller has no
/// specific one.
pub const DEFAULT_AGENT: &str = "*";

/// HTTP fetcher that honors each site's robots.txt.
pub struct PolicyFetcher {
    client: Client,
    agent: String,
}

impl PolicyFetcher {
    /// The same `user_agent` is sent on every request and evaluated against
    /// robots.txt by `get_document`.
    pub fn new(user_agent: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: http_client(user_agent, timeout)?,
            agent: user_agent.to_string(),
        })
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    fn parse_url(url: &str) -> AppResult<Url> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(AppError::Validation(format!("Unsupported URL: {}", url)));
        }
        Ok(parsed)
    }

    /// `{scheme}://{host[:port]}/robots.txt` for the given page.
    pub fn robots_url(url: &Url) -> AppResult<Url> {
        Ok(url.join("/robots.txt")?)
    }

    async fn fetch_policy(&self, url: &Url) -> AppResult<RobotsPolicy> {
        let robots_url = Self::robots_url(url)?;
        debug!("Fetching robots policy: {}", robots_url);

        let response = self.client.get(robots_url.clone()).send().await?;
        let status = response.status();

        let policy = if status.is_success() {
            RobotsPolicy::parse(&response.text().await?)
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            RobotsPolicy::disallow_all()
        } else if status.is_client_error() {
            RobotsPolicy::allow_all()
        } else {
            warn!("robots policy at {} returned {}, treating site as disallowed", robots_url, status);
            RobotsPolicy::disallow_all()
        };
        Ok(policy)
    }

    /// Check whether `agent` may fetch `url`. The policy is fetched on every call.
    pub async fn is_allowed(&self, url: &str, agent: &str) -> AppResult<bool> {
        let parsed = Self::parse_url(url)?;
        let policy = self.fetch_policy(&parsed).await?;

        let path = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };
        Ok(policy.is_allowed(agent, &path))
    }

    /// Fetch and parse a page. `Ok(None)` when robots.txt denies the fetch.
    pub async fn get_document(&self, url: &str) -> AppResult<Option<Html>> {
        if !self.is_allowed(url, &self.agent).await? {
            info!("Unable to fetch {} due to robots.txt", url);
            return Ok(None);
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(Some(Html::parse_document(&body)))
    }
}
