use commentsync_core::CommentTree;
use commentsync_sync::{ChannelStatus, CommentSource, Feed, PageState};
use tokio::sync::watch;
use tracing::{debug, info};

/// One-line view of the feed for the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSummary {
    pub roots: usize,
    pub nodes: usize,
    pub pending: usize,
    pub page: u32,
    pub ordering: String,
    pub has_next: bool,
}

impl FeedSummary {
    pub fn new(tree: &CommentTree, pages: &PageState) -> Self {
        Self {
            roots: tree.roots().len(),
            nodes: tree.len(),
            pending: tree.pending_count(),
            page: pages.page,
            ordering: pages.ordering.clone(),
            has_next: pages.has_next(),
        }
    }
}

impl std::fmt::Display for FeedSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "page {} ({}): {} threads, {} comments, {} pending",
            self.page, self.ordering, self.roots, self.nodes, self.pending
        )?;
        if self.has_next {
            write!(f, ", more pages")?;
        }
        Ok(())
    }
}

/// Log feed changes and channel transitions until shutdown.
pub async fn run_feed_report<S: CommentSource>(
    feed: Feed<S>,
    channel: Option<watch::Receiver<ChannelStatus>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut revisions = feed.subscribe();
    let (mut channel, mut channel_open) = match channel {
        Some(rx) => (rx, true),
        None => (watch::channel(initial_status()).1, false),
    };

    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let pages = feed.page_state();
                let summary = feed.read(|tree| FeedSummary::new(tree, &pages));
                info!("Feed updated: {summary}");
            }
            changed = channel.changed(), if channel_open => {
                if changed.is_err() {
                    channel_open = false;
                    continue;
                }
                let status = channel.borrow_and_update().clone();
                debug!(
                    "Realtime channel {:?} (connected={}, attempts={}, retry in {:?})",
                    status.state, status.connected, status.attempts, status.retry_delay
                );
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("Feed report shutting down");
                    break;
                }
            }
        }
    }
}

fn initial_status() -> ChannelStatus {
    ChannelStatus {
        state: commentsync_sync::ChannelState::Disconnected,
        connected: false,
        retry_delay: std::time::Duration::ZERO,
        attempts: 0,
    }
}
