//! Wire types for the comment feed API.
//!
//! These mirror the JSON the server emits and accepts. Every inbound field is
//! optional or defaulted: a payload with missing fields still decodes, and
//! `commentsync-core` fills the gaps during normalization.

use serde::{Deserialize, Serialize};

// ─── Comments ────────────────────────────────────────────────────────────────

/// Author sub-record attached to a comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
}

/// A comment exactly as the server returns it, replies nested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    /// RFC 3339 timestamp; kept as a string so a malformed value degrades
    /// instead of failing the whole page.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub parent_username: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub replies: Option<Vec<RawComment>>,
}

// ─── Pages ───────────────────────────────────────────────────────────────────

/// Query parameters for `GET /comments/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageQuery {
    pub page: u32,
    pub ordering: String,
}

/// Paginated envelope for `GET /comments/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentPage {
    #[serde(default)]
    pub results: Vec<RawComment>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Body of `POST /comments/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
    pub parent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<RawUser>,
    /// CAPTCHA key, forwarded verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_0: Option<String>,
    /// CAPTCHA answer, forwarded verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_1: Option<String>,
}

/// Response of `POST /comments/`. Servers either wrap the created record in
/// `data` or return it bare; both decode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CreateCommentResponse {
    Wrapped { data: RawComment },
    Bare(RawComment),
}

impl CreateCommentResponse {
    pub fn into_comment(self) -> RawComment {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(comment) => comment,
        }
    }
}

// ─── Realtime ────────────────────────────────────────────────────────────────

/// Inbound message on the realtime channel, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// Another client created a comment. Depending on the server build the
    /// payload carries either the new id or the serialized comment.
    NewComment {
        #[serde(default)]
        comment_id: Option<i64>,
        #[serde(default)]
        comment: Option<serde_json::Value>,
    },
    #[serde(other)]
    Unknown,
}

impl RealtimeEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn is_remote_write(&self) -> bool {
        matches!(self, Self::NewComment { .. })
    }
}
