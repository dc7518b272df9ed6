//! Normalization of raw wire comments.
//!
//! The server may omit the author sub-record, individual author fields, the
//! `replies` list or even the timestamp. Rather than failing, every gap is
//! filled by one policy:
//!
//! - `user` present: username from `user.username`, else top-level
//!   `user_name`, else the anonymous placeholder. Email and homepage come from
//!   `user` when non-empty.
//! - `user` absent: `user_name`, else the placeholder.
//! - `replies` absent: empty.
//! - `text` absent: empty string.
//! - `created_at` absent or unparsable: the current time.

use crate::comment::{Author, CommentFields, CommentId, CommentRecord};
use chrono::{DateTime, Utc};
use commentsync_api_types::{RawComment, RawUser};
use tracing::debug;

/// Placeholder shown for comments without any author information.
pub const ANONYMOUS_NAME: &str = "Анонім";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorDefaults {
    pub anonymous_name: String,
}

impl Default for AuthorDefaults {
    fn default() -> Self {
        Self {
            anonymous_name: ANONYMOUS_NAME.to_string(),
        }
    }
}

/// Normalize a raw comment and, depth-first, all of its replies.
pub fn normalize(raw: RawComment, defaults: &AuthorDefaults) -> CommentRecord {
    let author = resolve_author(raw.user.as_ref(), raw.user_name.as_deref(), defaults);
    let created_at = parse_timestamp(raw.created_at.as_deref(), raw.id);
    let replies = raw
        .replies
        .unwrap_or_default()
        .into_iter()
        .map(|reply| normalize(reply, defaults))
        .collect();

    CommentRecord {
        fields: CommentFields {
            id: raw.id.map(CommentId),
            author,
            body: raw.text.unwrap_or_default(),
            created_at,
            parent_id: raw.parent.map(CommentId),
            parent_author: raw.parent_username.filter(|name| !name.is_empty()),
            attachment: raw.file.filter(|file| !file.is_empty()),
        },
        replies,
    }
}

pub fn resolve_author(
    user: Option<&RawUser>,
    user_name: Option<&str>,
    defaults: &AuthorDefaults,
) -> Author {
    let fallback_name = || {
        non_empty(user_name)
            .unwrap_or(defaults.anonymous_name.as_str())
            .to_string()
    };

    match user {
        Some(user) => Author {
            username: non_empty(user.username.as_deref())
                .map(str::to_string)
                .unwrap_or_else(fallback_name),
            email: non_empty(user.email.as_deref())
                .unwrap_or_default()
                .to_string(),
            homepage: non_empty(user.homepage.as_deref()).map(str::to_string),
        },
        None => Author::named(fallback_name()),
    }
}

fn parse_timestamp(value: Option<&str>, id: Option<i64>) -> DateTime<Utc> {
    match value.map(DateTime::parse_from_rfc3339) {
        Some(Ok(ts)) => ts.with_timezone(&Utc),
        Some(Err(e)) => {
            debug!("comment {id:?}: unparsable created_at ({e}), using now");
            Utc::now()
        }
        None => Utc::now(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
