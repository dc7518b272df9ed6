//! Arena-backed comment tree.
//!
//! Nodes sit in a flat map keyed by [`NodeKey`]. Parent/child relations are
//! key references, and two indexes map confirmed ids and provisional ids to
//! keys. Every mutation that changes identity or reachability keeps the
//! indexes in step, so a node is reachable exactly once and each identity
//! resolves to at most one node.

use crate::comment::{Comment, CommentFields, CommentId, CommentRecord, ProvisionalId};
use crate::error::TreeError;
use crate::ident::IdGenerator;
use crate::normalize::{AuthorDefaults, normalize};
use commentsync_api_types::RawComment;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

/// Stable handle to a node inside one [`CommentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) comment: Comment,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
}

impl Node {
    pub fn comment(&self) -> &Comment {
        &self.comment
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }
}

/// Owned, nested view of a comment and its replies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub children: Vec<CommentView>,
}

#[derive(Debug, Default)]
pub struct CommentTree {
    pub(crate) nodes: HashMap<NodeKey, Node>,
    pub(crate) roots: Vec<NodeKey>,
    pub(crate) by_id: HashMap<CommentId, NodeKey>,
    pub(crate) by_provisional: HashMap<ProvisionalId, NodeKey>,
    next_key: u64,
}

impl CommentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    pub fn comment(&self, key: NodeKey) -> Option<&Comment> {
        self.nodes.get(&key).map(|node| &node.comment)
    }

    pub fn pending_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|node| node.comment.is_pending())
            .count()
    }

    // ── Ingestion ─────────────────────────────────────────────────────────

    /// Normalize a page of raw comments and place them in the arena.
    ///
    /// Returns the top-level keys in payload order, detached; the caller
    /// decides where they go ([`replace`](Self::replace),
    /// [`accumulate`](Self::accumulate), [`prepend`](Self::prepend)). Records
    /// whose confirmed id is already present update that node in place.
    pub fn ingest(
        &mut self,
        raw: Vec<RawComment>,
        defaults: &AuthorDefaults,
        ids: &IdGenerator,
    ) -> Vec<NodeKey> {
        let records = raw.into_iter().map(|r| normalize(r, defaults)).collect();
        self.ingest_records(records, ids)
    }

    pub fn ingest_records(&mut self, records: Vec<CommentRecord>, ids: &IdGenerator) -> Vec<NodeKey> {
        let mut seen = HashSet::new();
        let mut top = Vec::with_capacity(records.len());
        for record in records {
            let key = self.ingest_record(record, None, ids);
            if seen.insert(key) {
                top.push(key);
            }
        }
        top
    }

    /// Insert (or merge) one record and its replies, depth-first.
    pub(crate) fn ingest_record(
        &mut self,
        record: CommentRecord,
        parent: Option<NodeKey>,
        ids: &IdGenerator,
    ) -> NodeKey {
        let CommentRecord { fields, replies } = record;
        let existing = fields.id.and_then(|id| self.by_id.get(&id).copied());

        let key = match existing {
            Some(key) => {
                self.detach(key);
                if let Some(node) = self.nodes.get_mut(&key) {
                    node.comment.apply(fields);
                }
                key
            }
            None => self.alloc(Comment::new(ids.next_id(), fields)),
        };

        if let Some(parent) = parent {
            if let Err(e) = self.append_child(parent, key) {
                warn!("reply {key} cannot go under {parent} ({e}); keeping it as a root");
                self.roots.insert(0, key);
            }
        }

        if !replies.is_empty() {
            let previous = self.nodes.get(&key).map(|n| n.children.clone()).unwrap_or_default();
            let mut incoming = Vec::with_capacity(replies.len());
            for reply in replies {
                let child = self.ingest_record(reply, Some(key), ids);
                if self.nodes.get(&child).and_then(|n| n.parent) == Some(key) && !incoming.contains(&child) {
                    incoming.push(child);
                }
            }
            // Server order first, then whatever the node already had that the
            // payload did not mention (typically replies still pending).
            let rest = previous.into_iter().filter(|k| {
                !incoming.contains(k) && self.nodes.get(k).and_then(|n| n.parent) == Some(key)
            });
            let ordered: Vec<NodeKey> = incoming.iter().copied().chain(rest).collect();
            if let Some(node) = self.nodes.get_mut(&key) {
                node.children = ordered;
            }
        }

        key
    }

    // ── Root collection ───────────────────────────────────────────────────

    /// Make `keys` the root collection, in order, behind any provisional roots
    /// still awaiting confirmation. Anything no longer reachable is released.
    pub fn replace(&mut self, keys: Vec<NodeKey>) {
        let mut roots: Vec<NodeKey> = self
            .roots
            .iter()
            .copied()
            .filter(|key| {
                !keys.contains(key)
                    && self.nodes.get(key).is_some_and(|n| n.comment.is_pending())
            })
            .collect();
        let mut seen: HashSet<NodeKey> = roots.iter().copied().collect();
        for key in keys {
            if !self.nodes.contains_key(&key) || !seen.insert(key) {
                continue;
            }
            self.detach(key);
            roots.push(key);
        }
        self.roots = roots;
        self.prune_unreachable();
    }

    /// Append `keys` to the existing roots, skipping ones already there.
    pub fn accumulate(&mut self, keys: Vec<NodeKey>) {
        for key in keys {
            if !self.nodes.contains_key(&key) || self.roots.contains(&key) {
                continue;
            }
            self.detach(key);
            self.roots.push(key);
        }
        self.prune_unreachable();
    }

    /// Put a detached node at the front of the roots.
    pub fn prepend(&mut self, key: NodeKey) -> Result<(), TreeError> {
        self.ensure_detached(key)?;
        self.roots.insert(0, key);
        Ok(())
    }

    /// Append a detached node to `parent`'s children.
    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&parent) {
            return Err(TreeError::UnknownNode(parent));
        }
        self.ensure_detached(child)?;

        let mut cursor = Some(parent);
        while let Some(key) = cursor {
            if key == child {
                return Err(TreeError::Cycle {
                    node: child,
                    parent,
                });
            }
            cursor = self.nodes.get(&key).and_then(|n| n.parent);
        }

        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    /// Overwrite a node's server-owned fields, keeping the id index in step.
    pub fn apply_fields(&mut self, key: NodeKey, fields: CommentFields) -> Result<(), TreeError> {
        if let Some(id) = fields.id {
            if let Some(&existing) = self.by_id.get(&id) {
                if existing != key {
                    return Err(TreeError::DuplicateId { id, existing });
                }
            }
        }
        let node = self.nodes.get_mut(&key).ok_or(TreeError::UnknownNode(key))?;
        let before = node.comment.id();
        node.comment.apply(fields);
        let after = node.comment.id();
        if before != after {
            if let Some(old) = before {
                self.by_id.remove(&old);
            }
            if let Some(new) = after {
                self.by_id.insert(new, key);
            }
        }
        Ok(())
    }

    // ── Snapshots ─────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Vec<CommentView> {
        self.roots.iter().filter_map(|&key| self.view(key)).collect()
    }

    pub fn view(&self, key: NodeKey) -> Option<CommentView> {
        let node = self.nodes.get(&key)?;
        Some(CommentView {
            comment: node.comment.clone(),
            children: node
                .children
                .iter()
                .filter_map(|&child| self.view(child))
                .collect(),
        })
    }

    // ── Arena internals ───────────────────────────────────────────────────

    /// Store a new, detached node and index both of its identities.
    pub(crate) fn alloc(&mut self, comment: Comment) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        if let Some(id) = comment.id() {
            self.by_id.insert(id, key);
        }
        self.by_provisional
            .insert(comment.provisional_id.clone(), key);
        self.nodes.insert(
            key,
            Node {
                comment,
                parent: None,
                children: Vec::new(),
            },
        );
        key
    }

    /// Unlink a node from its parent (or the roots). The subtree stays intact.
    pub(crate) fn detach(&mut self, key: NodeKey) {
        let parent = self.nodes.get_mut(&key).and_then(|n| n.parent.take());
        match parent {
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(&parent) {
                    node.children.retain(|&c| c != key);
                }
            }
            None => self.roots.retain(|&r| r != key),
        }
    }

    /// Merge node `from` into `into`: children move over (appended), `from`
    /// leaves the arena, and every provisional id that named `from` now names
    /// `into`.
    pub(crate) fn fold(&mut self, from: NodeKey, into: NodeKey) -> Result<(), TreeError> {
        if from == into {
            return Ok(());
        }
        if !self.nodes.contains_key(&into) {
            return Err(TreeError::UnknownNode(into));
        }
        if self.is_ancestor(from, into) {
            return Err(TreeError::Cycle {
                node: from,
                parent: into,
            });
        }
        let children = match self.nodes.get_mut(&from) {
            Some(node) => std::mem::take(&mut node.children),
            None => return Err(TreeError::UnknownNode(from)),
        };
        for child in children {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parent = None;
            }
            self.append_child(into, child)?;
        }

        self.detach(from);
        if let Some(node) = self.nodes.remove(&from) {
            if let Some(id) = node.comment.id() {
                if self.by_id.get(&id) == Some(&from) {
                    self.by_id.remove(&id);
                }
            }
        }
        for target in self.by_provisional.values_mut() {
            if *target == from {
                *target = into;
            }
        }
        Ok(())
    }

    /// True when `ancestor` is `key` or lies on `key`'s parent chain.
    pub(crate) fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            if k == ancestor {
                return true;
            }
            cursor = self.nodes.get(&k).and_then(|n| n.parent);
        }
        false
    }

    fn ensure_detached(&self, key: NodeKey) -> Result<(), TreeError> {
        let node = self.nodes.get(&key).ok_or(TreeError::UnknownNode(key))?;
        if node.parent.is_some() || self.roots.contains(&key) {
            return Err(TreeError::AlreadyAttached(key));
        }
        Ok(())
    }

    fn prune_unreachable(&mut self) {
        let reachable: HashSet<NodeKey> = self.walk_depth_first().collect();
        if reachable.len() == self.nodes.len() {
            return;
        }
        self.nodes.retain(|key, _| reachable.contains(key));
        self.by_id.retain(|_, key| reachable.contains(key));
        self.by_provisional.retain(|_, key| reachable.contains(key));
    }
}
