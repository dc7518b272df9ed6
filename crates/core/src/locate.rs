//! Finding nodes by identity.
//!
//! An identity names a node by confirmed id or provisional id. The indexes
//! answer in constant time; [`CommentTree::walk_depth_first`] supplies the
//! pre-order used to break ties and by [`CommentTree::find_by_scan`].

use crate::comment::{Author, Comment, CommentFields, Identity};
use crate::error::TreeError;
use crate::tree::{CommentTree, Node, NodeKey};

/// Pre-order traversal: a node, then each child's subtree in order.
pub struct DepthFirst<'a> {
    tree: &'a CommentTree,
    stack: Vec<NodeKey>,
}

impl Iterator for DepthFirst<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        let key = self.stack.pop()?;
        if let Some(node) = self.tree.nodes.get(&key) {
            self.stack.extend(node.children.iter().rev());
        }
        Some(key)
    }
}

/// Mutable handle to one node. Edits to server-owned identity go through
/// [`NodeMut::apply`] so the indexes stay consistent.
pub struct NodeMut<'a> {
    tree: &'a mut CommentTree,
    key: NodeKey,
}

impl NodeMut<'_> {
    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn comment(&self) -> Option<&Comment> {
        self.tree.comment(self.key)
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        if let Some(node) = self.tree.nodes.get_mut(&self.key) {
            node.comment.fields.body = body.into();
        }
    }

    pub fn set_author(&mut self, author: Author) {
        if let Some(node) = self.tree.nodes.get_mut(&self.key) {
            node.comment.fields.author = author;
        }
    }

    pub fn apply(&mut self, fields: CommentFields) -> Result<(), TreeError> {
        self.tree.apply_fields(self.key, fields)
    }
}

impl CommentTree {
    pub fn walk_depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Locate the node named by `identity`, as confirmed id or provisional id.
    ///
    /// Should the two indexes ever disagree, the node met first in depth-first
    /// pre-order wins.
    pub fn find(&self, identity: &Identity) -> Option<NodeKey> {
        let by_id = identity
            .as_comment_id()
            .and_then(|id| self.by_id.get(&id).copied());
        let by_provisional = self.by_provisional.get(identity.as_str()).copied();

        match (by_id, by_provisional) {
            (Some(a), Some(b)) if a != b => Some(self.first_in_walk(a, b)),
            (a, b) => a.or(b),
        }
    }

    pub fn find_node(&self, identity: &Identity) -> Option<&Node> {
        self.find(identity).and_then(|key| self.nodes.get(&key))
    }

    pub fn find_mut(&mut self, identity: &Identity) -> Option<NodeMut<'_>> {
        let key = self.find(identity)?;
        Some(NodeMut { tree: self, key })
    }

    /// Index-free lookup: walks the tree and returns the first node whose own
    /// ids match. Provisional aliases of folded nodes are not visible here.
    pub fn find_by_scan(&self, identity: &Identity) -> Option<NodeKey> {
        self.walk_depth_first().find(|key| {
            self.nodes
                .get(key)
                .is_some_and(|node| node.comment.matches(identity))
        })
    }

    fn first_in_walk(&self, a: NodeKey, b: NodeKey) -> NodeKey {
        self.walk_depth_first()
            .find(|&key| key == a || key == b)
            .unwrap_or(a)
    }
}
