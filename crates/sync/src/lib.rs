//! Client-side synchronization engine for a threaded comment feed.
//!
//! [`Feed`] owns the comment tree and the pagination state, performs
//! optimistic writes and folds server confirmations back in.
//! [`ChannelSupervisor`] keeps a realtime channel open and asks the feed to
//! resynchronize whenever another client writes.

pub mod channel;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod pagination;
pub mod source;
pub mod ws;

pub use channel::{
    ChannelConnector, ChannelError, ChannelFrame, ChannelState, ChannelStatus, ChannelSupervisor,
    FrameStream, ResyncTrigger, RetryPolicy,
};
pub use error::FeedError;
pub use feed::{CaptchaAnswer, CreatedComment, Feed, FeedOptions};
pub use metrics::{MetricsSnapshot, SyncMetrics};
pub use pagination::PageState;
pub use source::CommentSource;
pub use ws::WsConnector;

#[cfg(test)]
pub(crate) mod testing;
