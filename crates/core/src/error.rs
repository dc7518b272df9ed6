use crate::comment::CommentId;
use crate::tree::NodeKey;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeKey),
    #[error("node {0} is already attached")]
    AlreadyAttached(NodeKey),
    #[error("attaching {node} under {parent} would create a cycle")]
    Cycle { node: NodeKey, parent: NodeKey },
    #[error("comment {id} already lives at node {existing}")]
    DuplicateId { id: CommentId, existing: NodeKey },
    #[error("server record has no confirmed id")]
    MissingConfirmedId,
}
