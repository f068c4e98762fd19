//! Authenticated Reddit client over the OAuth listing API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use subharvest_core::ports::SourceClient;
use subharvest_shared::{Credentials, Result, Submission, SubharvestError};

/// OAuth token endpoint base.
const AUTH_BASE: &str = "https://www.reddit.com";
/// Authenticated API base.
const API_BASE: &str = "https://oauth.reddit.com";
/// Reddit caps listing pages at 100 items.
const PAGE_SIZE: u32 = 100;

/// Handle over an authenticated Reddit session.
///
/// Construction performs the token exchange; a value of this type is
/// proof that credentials were accepted.
#[derive(Debug)]
pub struct RedditClient {
    http: Client,
    api_base: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    /// Reddit reports bad user credentials as 200 + `{"error": "invalid_grant"}`.
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    after: Option<String>,
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: RawSubmission,
}

#[derive(Debug, Deserialize)]
struct RawSubmission {
    id: String,
    title: String,
    score: i64,
    url: String,
    num_comments: i64,
    created_utc: f64,
    author: Option<String>,
    #[serde(default)]
    selftext: String,
}

impl RedditClient {
    /// Authenticate against the production Reddit endpoints.
    pub async fn connect(credentials: &Credentials) -> Result<Self> {
        Self::connect_to(AUTH_BASE, API_BASE, credentials).await
    }

    /// Authenticate against explicit base URLs. Tests point these at a
    /// mock server.
    pub async fn connect_to(
        auth_base: &str,
        api_base: &str,
        credentials: &Credentials,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(credentials.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SubharvestError::source(format!("failed to build HTTP client: {e}")))?;

        let auth_base = parse_base(auth_base)?;
        let api_base = parse_base(api_base)?;

        let token_url = auth_base
            .join("api/v1/access_token")
            .map_err(|e| SubharvestError::source(format!("token endpoint URL: {e}")))?;

        let response = http
            .post(token_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SubharvestError::source(format!("token request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => SubharvestError::Auth(format!(
                    "token endpoint rejected client credentials (HTTP {status})"
                )),
                429 => SubharvestError::RateLimited(format!(
                    "token endpoint throttled the request (HTTP {status})"
                )),
                _ => SubharvestError::source(format!("token endpoint returned HTTP {status}")),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SubharvestError::source(format!("token response: {e}")))?;

        if let Some(error) = token.error {
            return Err(SubharvestError::Auth(format!("token exchange failed: {error}")));
        }
        let token = token
            .access_token
            .ok_or_else(|| SubharvestError::Auth("token response carried no access_token".into()))?;

        info!("reddit client authenticated");
        Ok(Self {
            http,
            api_base,
            token,
        })
    }

    /// Fetch one listing page of `/r/{feed_id}/new`.
    async fn fetch_page(
        &self,
        feed_id: &str,
        page_size: u32,
        after: Option<&str>,
    ) -> Result<ListingData> {
        let mut url = self
            .api_base
            .join(&format!("r/{feed_id}/new.json"))
            .map_err(|e| SubharvestError::source(format!("listing URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &page_size.to_string());
            query.append_pair("raw_json", "1");
            if let Some(after) = after {
                query.append_pair("after", after);
            }
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SubharvestError::source(format!("listing request: {e}")))?;

        let response = check_listing_status(response, feed_id)?;
        let listing: Listing = response
            .json()
            .await
            .map_err(|e| SubharvestError::source(format!("listing response: {e}")))?;
        Ok(listing.data)
    }
}

fn parse_base(base: &str) -> Result<Url> {
    Url::parse(base).map_err(|e| SubharvestError::source(format!("invalid base URL '{base}': {e}")))
}

fn check_listing_status(response: Response, feed_id: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(match status.as_u16() {
        401 | 403 => SubharvestError::Auth(format!("source rejected the request (HTTP {status})")),
        404 => SubharvestError::NotFound {
            feed: feed_id.to_string(),
        },
        429 => {
            SubharvestError::RateLimited(format!("source throttled the request (HTTP {status})"))
        }
        _ => SubharvestError::source(format!("unexpected HTTP {status} from source")),
    })
}

fn into_submission(raw: RawSubmission) -> Submission {
    let author = raw.author.filter(|a| !a.is_empty() && a != "[deleted]");
    let body = if raw.selftext.trim().is_empty() {
        None
    } else {
        Some(raw.selftext)
    };
    Submission {
        id: raw.id,
        title: raw.title,
        score: raw.score,
        url: raw.url,
        num_comments: raw.num_comments,
        created_utc: raw.created_utc,
        author,
        body,
    }
}

#[async_trait]
impl SourceClient for RedditClient {
    /// Walk the newest-first listing with the source's `after` cursor until
    /// `limit` items are collected or the listing is exhausted.
    #[instrument(skip(self))]
    async fn fetch_recent(&self, feed_id: &str, limit: u32) -> Result<Vec<Submission>> {
        let mut collected: Vec<Submission> = Vec::with_capacity(limit as usize);
        let mut after: Option<String> = None;

        while (collected.len() as u32) < limit {
            let remaining = limit - collected.len() as u32;
            let page = self
                .fetch_page(feed_id, remaining.min(PAGE_SIZE), after.as_deref())
                .await?;

            if page.children.is_empty() {
                break;
            }
            for child in page.children {
                collected.push(into_submission(child.data));
            }

            match page.after {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        collected.truncate(limit as usize);
        debug!(count = collected.len(), feed_id, "fetched recent submissions");
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/api/v1/access_token";

    fn creds() -> Credentials {
        Credentials {
            client_id: "cid".into(),
            client_secret: "shh".into(),
            username: "me".into(),
            password: "pw".into(),
            user_agent: "subharvest-tests/0.0".into(),
        }
    }

    fn child(id: &str, created_utc: f64) -> serde_json::Value {
        json!({
            "kind": "t3",
            "data": {
                "id": id,
                "title": format!("post {id}"),
                "score": 5,
                "url": format!("https://example.com/{id}"),
                "num_comments": 2,
                "created_utc": created_utc,
                "author": "someone",
                "selftext": "",
            }
        })
    }

    fn listing(children: Vec<serde_json::Value>, after: Option<&str>) -> serde_json::Value {
        json!({ "kind": "Listing", "data": { "after": after, "children": children } })
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "bearer",
                "expires_in": 3600,
                "scope": "*",
            })))
            .mount(server)
            .await;
    }

    async fn connect(server: &MockServer) -> RedditClient {
        RedditClient::connect_to(&server.uri(), &server.uri(), &creds())
            .await
            .expect("connect")
    }

    #[tokio::test]
    async fn fetches_and_maps_a_single_page() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        let mut deleted = child("b2", 200.0);
        deleted["data"]["author"] = json!("[deleted]");
        deleted["data"]["selftext"] = json!("some body text");

        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(listing(vec![child("a1", 300.0), deleted], None)),
            )
            .mount(&server)
            .await;

        let client = connect(&server).await;
        let submissions = client.fetch_recent("rust", 10).await.expect("fetch");

        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].id, "a1");
        assert_eq!(submissions[0].author.as_deref(), Some("someone"));
        assert!(submissions[0].body.is_none());
        assert_eq!(submissions[1].id, "b2");
        assert!(submissions[1].author.is_none(), "[deleted] maps to None");
        assert_eq!(submissions[1].body.as_deref(), Some("some body text"));
    }

    #[tokio::test]
    async fn paginates_with_the_after_cursor() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .and(query_param_is_missing("after"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![child("a", 300.0), child("b", 200.0)],
                Some("t3_b"),
            )))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .and(query_param("after", "t3_b"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(listing(vec![child("c", 100.0)], None)),
            )
            .mount(&server)
            .await;

        let client = connect(&server).await;
        let submissions = client.fetch_recent("rust", 5).await.expect("fetch");

        let ids: Vec<&str> = submissions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"], "source order preserved across pages");
    }

    #[tokio::test]
    async fn stops_at_the_requested_limit() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        // More items than asked for on one page; no second request happens
        // because the limit is reached.
        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![child("a", 300.0), child("b", 200.0), child("c", 100.0)],
                Some("t3_c"),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = connect(&server).await;
        let submissions = client.fetch_recent("rust", 2).await.expect("fetch");
        assert_eq!(submissions.len(), 2);
    }

    #[tokio::test]
    async fn empty_listing_yields_no_submissions() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/emptysub/new.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![], None)))
            .mount(&server)
            .await;

        let client = connect(&server).await;
        let submissions = client.fetch_recent("emptysub", 10).await.expect("fetch");
        assert!(submissions.is_empty());
    }

    #[tokio::test]
    async fn invalid_grant_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "invalid_grant" })),
            )
            .mount(&server)
            .await;

        let err = RedditClient::connect_to(&server.uri(), &server.uri(), &creds())
            .await
            .expect_err("invalid grant must fail");
        assert!(matches!(err, SubharvestError::Auth(_)));
    }

    #[tokio::test]
    async fn rejected_client_credentials_are_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = RedditClient::connect_to(&server.uri(), &server.uri(), &creds())
            .await
            .expect_err("401 must fail");
        assert!(matches!(err, SubharvestError::Auth(_)));
    }

    #[tokio::test]
    async fn missing_feed_is_not_found() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/no_such_sub/new.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = connect(&server).await;
        let err = client
            .fetch_recent("no_such_sub", 10)
            .await
            .expect_err("404 must fail");
        assert!(matches!(err, SubharvestError::NotFound { ref feed } if feed == "no_such_sub"));
    }

    #[tokio::test]
    async fn throttling_is_a_rate_limit_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = connect(&server).await;
        let err = client
            .fetch_recent("rust", 10)
            .await
            .expect_err("429 must fail");
        assert!(matches!(err, SubharvestError::RateLimited(_)));
    }
}
