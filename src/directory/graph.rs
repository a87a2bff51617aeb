//! Microsoft Graph implementation of [`DirectoryClient`]
//!
//! Credential acquisition happens elsewhere: the client is handed a bearer
//! token and uses it unchanged for every request.

use super::types::{MemberRecord, MembershipRecord, ObjectSummary};
use super::DirectoryClient;
use crate::error::{ConfigError, QueryError, QueryResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Largest `$top` accepted by the membership endpoints
pub const MAX_PAGE_SIZE: u32 = 999;

const USER_SELECT: &str = "id,userType,userPrincipalName,displayName";
const MEMBERSHIP_SELECT: &str = "id,displayName";

/// `OData` error response
#[derive(Debug, Deserialize)]
struct ODataError {
    error: ODataErrorBody,
}

#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    code: String,
    message: String,
}

/// One page of a collection response
#[derive(Debug, Deserialize)]
struct ODataPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Connection settings resolved once at startup
#[derive(Clone)]
pub struct GraphConfig {
    /// API root including the version segment, e.g. `https://graph.microsoft.com/v1.0`
    pub base_url: Url,

    /// Pre-acquired bearer token
    pub token: String,

    /// `$top` for collection requests
    pub page_size: u32,

    /// Per-request timeout
    pub timeout: Duration,

    /// Retries for throttled or transiently failing requests
    pub max_retries: u32,

    /// First backoff delay for 5xx retries, doubled each attempt
    pub retry_delay: Duration,
}

impl GraphConfig {
    /// Create a configuration with default paging and retry settings
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidEndpoint {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEndpoint {
                url: base_url.to_string(),
                reason: "URL cannot carry a path".into(),
            });
        }

        Ok(Self {
            base_url,
            token: token.into(),
            page_size: MAX_PAGE_SIZE,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Microsoft Graph directory client
#[derive(Debug)]
pub struct GraphClient {
    http: reqwest::Client,
    config: GraphConfig,
}

impl GraphClient {
    /// Create a new client
    pub fn new(config: GraphConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("tenant-walker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::InvalidEndpoint {
                url: config.base_url.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, config })
    }

    /// Build `{base}/{segments...}?{query}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> QueryResult<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| QueryError::Decode("endpoint cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// GET a JSON document, retrying throttled and transient failures
    async fn get_json<T: DeserializeOwned>(&self, id: &str, url: &Url) -> QueryResult<T> {
        let mut attempts = 0u32;
        let mut delay = self.config.retry_delay;

        loop {
            let response = self
                .http
                .get(url.clone())
                .bearer_auth(&self.config.token)
                .send()
                .await
                .map_err(|e| QueryError::Transport(e.to_string()))?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(delay.as_secs());

                if attempts >= self.config.max_retries {
                    return Err(QueryError::Throttled {
                        retry_after_secs: retry_after,
                    });
                }

                attempts += 1;
                warn!(
                    object = id,
                    retry_after_secs = retry_after,
                    attempt = attempts,
                    "Throttled by directory service"
                );
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                continue;
            }

            if matches!(
                status,
                StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            ) && attempts < self.config.max_retries
            {
                attempts += 1;
                warn!(
                    object = id,
                    status = %status,
                    attempt = attempts,
                    "Transient error, retrying after {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                continue;
            }

            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(|e| QueryError::Decode(e.to_string()));
            }

            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(id, status, &body));
        }
    }

    /// Walk every page of a collection, handing items over one at a time
    async fn for_each_item<T, F>(&self, id: &str, first: Url, mut on_item: F) -> QueryResult<()>
    where
        T: DeserializeOwned,
        F: FnMut(T) + Send,
    {
        let mut next = Some(first);
        let mut pages = 0u32;

        while let Some(url) = next {
            let page: ODataPage<T> = self.get_json(id, &url).await?;
            pages += 1;

            for item in page.value {
                on_item(item);
            }

            next = page
                .next_link
                .map(|link| Url::parse(&link))
                .transpose()
                .map_err(|e| QueryError::Decode(format!("invalid nextLink: {e}")))?;
        }

        debug!(object = id, pages, "Collection fully read");
        Ok(())
    }
}

/// Translate a non-success response into a typed query error
fn error_from_response(id: &str, status: StatusCode, body: &str) -> QueryError {
    match status {
        StatusCode::NOT_FOUND => QueryError::NotFound { id: id.to_string() },
        StatusCode::FORBIDDEN => QueryError::PermissionDenied { id: id.to_string() },
        StatusCode::TOO_MANY_REQUESTS => QueryError::Throttled { retry_after_secs: 0 },
        _ => match serde_json::from_str::<ODataError>(body) {
            Ok(odata) => QueryError::Api {
                code: odata.error.code,
                message: odata.error.message,
            },
            Err(_) => QueryError::Api {
                code: status.to_string(),
                message: body.to_string(),
            },
        },
    }
}

#[async_trait]
impl DirectoryClient for GraphClient {
    #[instrument(skip(self))]
    async fn get_direct_object(&self, id: &str) -> QueryResult<ObjectSummary> {
        let url = self.endpoint(&["users", id], &[("$select", USER_SELECT)])?;
        self.get_json(id, &url).await
    }

    #[instrument(skip(self))]
    async fn get_memberships(&self, id: &str) -> QueryResult<Vec<MembershipRecord>> {
        let top = self.config.page_size.to_string();
        let url = self.endpoint(
            &["users", id, "memberOf"],
            &[("$select", MEMBERSHIP_SELECT), ("$top", &top)],
        )?;

        let mut memberships = Vec::new();
        self.for_each_item(id, url, |m: MembershipRecord| memberships.push(m))
            .await?;
        Ok(memberships)
    }

    #[instrument(skip(self, on_member))]
    async fn stream_group_members(
        &self,
        group_id: &str,
        on_member: &mut (dyn FnMut(MemberRecord) + Send),
    ) -> QueryResult<()> {
        let top = self.config.page_size.to_string();
        let url = self.endpoint(
            &["groups", group_id, "members"],
            &[("$select", USER_SELECT), ("$top", &top)],
        )?;

        self.for_each_item(group_id, url, |m: MemberRecord| on_member(m))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> GraphClient {
        GraphClient::new(GraphConfig::new(base, "token").unwrap()).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let c = client("https://graph.microsoft.com/v1.0");
        let url = c
            .endpoint(&["users", "guest_contoso.com#EXT#@fabrikam.onmicrosoft.com"], &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.microsoft.com/v1.0/users/guest_contoso.com%23EXT%23@fabrikam.onmicrosoft.com"
        );
    }

    #[test]
    fn test_endpoint_trailing_slash_base() {
        let c = client("https://graph.microsoft.com/v1.0/");
        let url = c.endpoint(&["groups", "g1", "members"], &[]).unwrap();
        assert_eq!(url.path(), "/v1.0/groups/g1/members");
    }

    #[test]
    fn test_error_from_odata_body() {
        let body = r#"{"error":{"code":"Authorization_RequestDenied","message":"Insufficient privileges"}}"#;
        let err = error_from_response("u1", StatusCode::BAD_REQUEST, body);
        assert_eq!(
            err,
            QueryError::Api {
                code: "Authorization_RequestDenied".into(),
                message: "Insufficient privileges".into(),
            }
        );
    }

    #[test]
    fn test_error_not_found() {
        let err = error_from_response("u1", StatusCode::NOT_FOUND, "");
        assert_eq!(err, QueryError::NotFound { id: "u1".into() });
    }

    #[test]
    fn test_page_size_clamped() {
        let config = GraphConfig::new("https://graph.microsoft.com/v1.0", "t")
            .unwrap()
            .with_page_size(5000);
        assert_eq!(config.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = GraphConfig::new("https://graph.microsoft.com/v1.0", "secret").unwrap();
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(GraphConfig::new("not a url", "t").is_err());
        assert!(GraphConfig::new("mailto:someone@example.com", "t").is_err());
    }
}
