//! Optimistic inserts and their reconciliation with server-confirmed records.
//!
//! A write first lands in the tree as a provisional node (no confirmed id).
//! When the server answers, [`CommentTree::confirm`] folds the record back in
//! by provisional id. The node never moves and keeps whatever replies it
//! gathered meanwhile. When the node cannot be found, or the confirmed id is
//! already present, the record is merged rather than duplicated.

use crate::comment::{Author, Comment, CommentFields, CommentId, CommentRecord, Identity, ProvisionalId};
use crate::error::TreeError;
use crate::ident::IdGenerator;
use crate::tree::{CommentTree, NodeKey};
use chrono::Utc;
use tracing::warn;

/// Content of a comment the local user is writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub body: String,
    pub author: Author,
    pub attachment: Option<String>,
}

impl CommentDraft {
    pub fn new(body: impl Into<String>, author: Author) -> Self {
        Self {
            body: body.into(),
            author,
            attachment: None,
        }
    }
}

/// Where a node ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Child { parent: NodeKey },
    Root,
    /// A parent was requested but could not be located.
    RootFallback,
}

impl Placement {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::RootFallback)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalInsert {
    pub key: NodeKey,
    pub provisional_id: ProvisionalId,
    pub placement: Placement,
    /// Confirmed id of the requested parent, when one is known.
    pub parent_id: Option<CommentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The provisional node received its confirmed id in place.
    Promoted(NodeKey),
    /// Another node already carried the confirmed id; the provisional node
    /// was folded into it.
    Folded { into: NodeKey },
    /// The provisional node was gone but the confirmed id was present.
    Merged { into: NodeKey },
    /// Neither was present; the record was inserted afresh.
    Recovered { key: NodeKey, placement: Placement },
}

impl Confirmation {
    pub fn key(&self) -> NodeKey {
        match *self {
            Self::Promoted(key) => key,
            Self::Folded { into } | Self::Merged { into } => into,
            Self::Recovered { key, .. } => key,
        }
    }

    /// True when the provisional node could not be found.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Merged { .. } | Self::Recovered { .. })
    }
}

impl CommentTree {
    /// Insert a provisional node for `draft`, under `parent` when given.
    ///
    /// A parent that cannot be located never drops the write: the node
    /// becomes a root and the placement reports [`Placement::RootFallback`].
    pub fn insert_provisional(
        &mut self,
        draft: CommentDraft,
        parent: Option<&Identity>,
        ids: &IdGenerator,
    ) -> ProvisionalInsert {
        let located = parent.and_then(|identity| self.find(identity));
        let parent_comment = located.and_then(|key| self.comment(key));
        let parent_id = parent_comment
            .and_then(Comment::id)
            .or_else(|| parent.and_then(Identity::as_comment_id));
        let parent_author = parent_comment.map(|c| c.fields.author.username.clone());

        let provisional_id = ids.next_id();
        let key = self.alloc(Comment::new(
            provisional_id.clone(),
            CommentFields {
                id: None,
                author: draft.author,
                body: draft.body,
                created_at: Utc::now(),
                parent_id,
                parent_author,
                attachment: draft.attachment,
            },
        ));

        let placement = match (parent, located) {
            (None, _) => {
                self.roots.insert(0, key);
                Placement::Root
            }
            (Some(_), Some(parent_key)) if self.append_child(parent_key, key).is_ok() => {
                Placement::Child { parent: parent_key }
            }
            (Some(identity), _) => {
                warn!("parent {identity} not found for {provisional_id}; inserting as root");
                self.roots.insert(0, key);
                Placement::RootFallback
            }
        };

        ProvisionalInsert {
            key,
            provisional_id,
            placement,
            parent_id,
        }
    }

    /// Fold a server-confirmed record into the node created for `provisional`.
    pub fn confirm(
        &mut self,
        provisional: &ProvisionalId,
        record: CommentRecord,
        ids: &IdGenerator,
    ) -> Result<Confirmation, TreeError> {
        let CommentRecord { fields, replies } = record;
        let id = fields.id.ok_or(TreeError::MissingConfirmedId)?;
        let pending = self.by_provisional.get(provisional).copied();
        let existing = self.by_id.get(&id).copied();

        let outcome = match (pending, existing) {
            (Some(pending), Some(existing)) if pending != existing => {
                self.apply_fields(existing, fields)?;
                self.fold(pending, existing)?;
                Confirmation::Folded { into: existing }
            }
            (Some(pending), _) => {
                self.apply_fields(pending, fields)?;
                Confirmation::Promoted(pending)
            }
            (None, Some(existing)) => {
                warn!("{provisional} vanished before confirmation; merging into comment {id}");
                self.apply_fields(existing, fields)?;
                self.by_provisional.insert(provisional.clone(), existing);
                Confirmation::Merged { into: existing }
            }
            (None, None) => {
                warn!("{provisional} vanished before confirmation; re-inserting comment {id}");
                let declared_parent = fields.parent_id;
                let key = self.alloc(Comment::new(provisional.clone(), fields));
                let placement = self.place_under(key, declared_parent);
                Confirmation::Recovered { key, placement }
            }
        };

        let key = outcome.key();
        for reply in replies {
            self.ingest_record(reply, Some(key), ids);
        }
        Ok(outcome)
    }

    /// Attach a detached node under the comment with `parent_id`, or make it a
    /// root when there is no such comment.
    fn place_under(&mut self, key: NodeKey, parent_id: Option<CommentId>) -> Placement {
        let Some(parent_id) = parent_id else {
            self.roots.insert(0, key);
            return Placement::Root;
        };
        match self.by_id.get(&parent_id).copied() {
            Some(parent) if self.append_child(parent, key).is_ok() => Placement::Child { parent },
            _ => {
                warn!("parent comment {parent_id} not in tree; inserting {key} as root");
                self.roots.insert(0, key);
                Placement::RootFallback
            }
        }
    }
}
