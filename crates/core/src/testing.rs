use crate::comment::{Author, CommentFields, CommentId, CommentRecord};
use crate::ident::IdGenerator;
use crate::tree::CommentTree;
use chrono::{TimeZone, Utc};
use commentsync_api_types::RawComment;
use std::collections::HashSet;

/// Generator with a fixed salt so ids are easy to spot in failures.
pub fn ids() -> IdGenerator {
    IdGenerator::with_salt("test")
}

/// Server-owned fields with a fixed timestamp and an anonymous author.
pub fn fields(id: Option<i64>, body: &str) -> CommentFields {
    CommentFields {
        id: id.map(CommentId),
        author: Author::named("Анонім"),
        body: body.to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        parent_id: None,
        parent_author: None,
        attachment: None,
    }
}

/// Normalized record with replies.
pub fn record(id: i64, body: &str, replies: Vec<CommentRecord>) -> CommentRecord {
    CommentRecord {
        fields: fields(Some(id), body),
        replies,
    }
}

/// Wire comment with replies and no author data.
pub fn raw(id: i64, text: &str, replies: Vec<RawComment>) -> RawComment {
    RawComment {
        id: Some(id),
        text: Some(text.to_string()),
        created_at: Some("2025-01-01T12:00:00Z".to_string()),
        replies: Some(replies),
        ..Default::default()
    }
}

/// Confirmed ids of the roots, in order.
pub fn root_ids(tree: &CommentTree) -> Vec<Option<i64>> {
    tree.roots()
        .iter()
        .map(|&key| tree.comment(key).and_then(|c| c.id()).map(|id| id.0))
        .collect()
}

/// Every node is reachable once and no two share an id or provisional id.
pub fn assert_unique_identities(tree: &CommentTree) {
    let mut keys = HashSet::new();
    let mut ids = HashSet::new();
    let mut provisional = HashSet::new();
    for key in tree.walk_depth_first() {
        assert!(keys.insert(key), "node {key} reachable twice");
        let comment = tree.comment(key).expect("reachable node exists");
        if let Some(id) = comment.id() {
            assert!(ids.insert(id), "duplicate confirmed id {id}");
        }
        assert!(
            provisional.insert(comment.provisional_id.clone()),
            "duplicate provisional id {}",
            comment.provisional_id
        );
    }
    assert_eq!(keys.len(), tree.len(), "unreachable nodes left in arena");
}
