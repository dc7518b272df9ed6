use commentsync_runtime_config::PageMode;
use serde::Serialize;

/// Pagination cursor and ordering owned by the feed.
///
/// `page` and `ordering` describe the last load that was applied. Every load
/// takes a generation number when it starts; a completion older than the
/// newest applied one is stale and must not touch the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageState {
    pub page: u32,
    pub ordering: String,
    pub previous: Option<String>,
    pub next: Option<String>,
    pub count: Option<u64>,
    pub mode: PageMode,
    #[serde(skip)]
    issued: u64,
    #[serde(skip)]
    applied: u64,
}

impl PageState {
    pub fn new(ordering: impl Into<String>, mode: PageMode) -> Self {
        Self {
            page: 1,
            ordering: ordering.into(),
            previous: None,
            next: None,
            count: None,
            mode,
            issued: 0,
            applied: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    /// Take a generation number for a load about to be issued.
    pub(crate) fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Claim the right to apply a completed load. Returns false when a newer
    /// load has already been applied.
    pub(crate) fn accept(&mut self, generation: u64) -> bool {
        if generation < self.applied {
            return false;
        }
        self.applied = generation;
        true
    }
}
