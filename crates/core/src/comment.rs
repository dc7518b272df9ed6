use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Server-assigned identity of a confirmed comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for CommentId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Client-generated identity, present on every node for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisionalId(String);

impl ProvisionalId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProvisionalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ProvisionalId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lookup key matching either a confirmed id or a provisional id.
///
/// Confirmed ids render as their decimal form, so `Identity::from(CommentId(42))`
/// and `Identity::from("42")` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The confirmed id this identity names, if it is one.
    pub fn as_comment_id(&self) -> Option<CommentId> {
        self.0.parse::<i64>().ok().map(CommentId)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CommentId> for Identity {
    fn from(id: CommentId) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for Identity {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&ProvisionalId> for Identity {
    fn from(id: &ProvisionalId) -> Self {
        Self(id.0.clone())
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Display data for a comment author, always populated after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl Author {
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: String::new(),
            homepage: None,
        }
    }
}

/// Server-owned fields of a comment. A confirmation or refresh overwrites
/// these wholesale; the provisional id and tree links are never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentFields {
    pub id: Option<CommentId>,
    pub author: Author,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<CommentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

/// A normalized comment with its normalized replies, ready for the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub fields: CommentFields,
    pub replies: Vec<CommentRecord>,
}

/// A comment node's own data. Links to parent and children live in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub provisional_id: ProvisionalId,
    #[serde(flatten)]
    pub fields: CommentFields,
}

impl Comment {
    pub fn new(provisional_id: ProvisionalId, fields: CommentFields) -> Self {
        Self {
            provisional_id,
            fields,
        }
    }

    pub fn id(&self) -> Option<CommentId> {
        self.fields.id
    }

    pub fn is_pending(&self) -> bool {
        self.fields.id.is_none()
    }

    /// Field-wise overwrite with server data. A record without an id never
    /// demotes an already confirmed node.
    pub fn apply(&mut self, mut fields: CommentFields) {
        if fields.id.is_none() {
            fields.id = self.fields.id;
        }
        self.fields = fields;
    }

    /// True when `identity` names this node by either key.
    pub fn matches(&self, identity: &Identity) -> bool {
        self.provisional_id.as_str() == identity.as_str()
            || self
                .fields
                .id
                .is_some_and(|id| Some(id) == identity.as_comment_id())
    }
}
