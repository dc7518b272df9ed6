use commentsync_api_client::ApiError;
use commentsync_core::{ProvisionalId, TreeError};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedError {
    #[error("failed to load page {page}: {source}")]
    Fetch { page: u32, source: ApiError },

    /// The provisional node stays in the tree; retrying or removing it is
    /// up to the caller.
    #[error("write {provisional_id} failed: {source}")]
    Write {
        provisional_id: ProvisionalId,
        source: ApiError,
    },

    /// A reply was held for a pending parent whose write failed. The reply
    /// stays in the tree unsent.
    #[error("write {provisional_id} not sent: parent {parent} was never confirmed")]
    ParentUnconfirmed {
        provisional_id: ProvisionalId,
        parent: ProvisionalId,
    },

    #[error("page {page} was superseded by a newer load")]
    Superseded { page: u32 },

    #[error("could not reconcile {provisional_id}: {source}")]
    Reconcile {
        provisional_id: ProvisionalId,
        source: TreeError,
    },
}

impl FeedError {
    /// Network-level failures that a later attempt may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Write { .. })
    }
}
