use std::time::Duration;

use commentsync_api_types::{
    CommentPage, CreateCommentRequest, CreateCommentResponse, PageQuery, RawComment,
};
use tracing::debug;

use crate::error::ApiError;

/// Header Django's CSRF middleware reads on state-changing requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Typed HTTP client for the comment API.
///
/// `base_url` is the API root (e.g. `http://localhost:8000/api`). Reads are
/// anonymous; writes carry the CSRF token and, when set, a bearer token.
/// Obtaining either token is the session bootstrap's job.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    csrf_token: Option<String>,
}

impl ApiClient {
    /// Create a new client with the given base URL and timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
            csrf_token: None,
        }
    }

    pub fn set_auth(&mut self, token: String) {
        self.auth_token = Some(token);
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn set_csrf_token(&mut self, token: String) {
        self.csrf_token = Some(token);
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── Comments ──────────────────────────────────────────────────────────

    /// `GET /comments/?page=&ordering=`
    pub async fn list_comments(&self, query: &PageQuery) -> Result<CommentPage, ApiError> {
        debug!("GET /comments/ page={} ordering={}", query.page, query.ordering);
        let resp = self
            .client
            .get(self.url("/comments/"))
            .query(query)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `POST /comments/` returning the server's record of the new comment.
    pub async fn create_comment(&self, req: &CreateCommentRequest) -> Result<RawComment, ApiError> {
        let mut builder = self.client.post(self.url("/comments/")).json(req);
        if let Some(token) = self.csrf_token.as_deref() {
            builder = builder.header(CSRF_HEADER, token);
        }
        if let Some(token) = self.auth_token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        let resp = builder.send().await?;
        let created: CreateCommentResponse = parse_response(resp).await?;
        Ok(created.into_comment())
    }
}

/// Parse an HTTP response: return the deserialized body on 2xx,
/// or an error containing the status and body text.
async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}
