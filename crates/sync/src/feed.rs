use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use commentsync_api_types::{CreateCommentRequest, PageQuery, RawUser};
use commentsync_core::{
    AuthorDefaults, Comment, CommentDraft, CommentId, CommentTree, CommentView, Confirmation, IdGenerator,
    Identity, NodeKey, Placement, ProvisionalId, normalize,
};
use commentsync_runtime_config::{PageMode, SyncConfig};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channel::ResyncTrigger;
use crate::error::FeedError;
use crate::metrics::{MetricsSnapshot, SyncMetrics};
use crate::pagination::PageState;
use crate::source::CommentSource;

#[derive(Debug, Clone)]
pub struct FeedOptions {
    pub ordering: String,
    pub page_mode: PageMode,
    pub author_defaults: AuthorDefaults,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            ordering: "-created_at".to_string(),
            page_mode: PageMode::Replace,
            author_defaults: AuthorDefaults::default(),
        }
    }
}

impl FeedOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            ordering: config.feed.ordering.clone(),
            page_mode: config.feed.page_mode,
            author_defaults: AuthorDefaults {
                anonymous_name: config.feed.anonymous_name.clone(),
            },
        }
    }
}

/// CAPTCHA key and answer forwarded verbatim with a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaAnswer {
    pub key: String,
    pub answer: String,
}

/// Result of a write that the server accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedComment {
    pub provisional_id: ProvisionalId,
    pub id: CommentId,
    /// Node now holding the comment. Differs from the provisional node only
    /// when the confirmation was folded or merged.
    pub key: NodeKey,
    /// Where the provisional node was put before the server answered.
    pub placement: Placement,
    pub confirmation: Confirmation,
}

/// Handle to the synchronized comment feed. Clones share state.
pub struct Feed<S> {
    inner: Arc<FeedInner<S>>,
}

impl<S> Clone for Feed<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct FeedInner<S> {
    source: S,
    // Lock order: pages before tree. Neither is held across an await.
    pages: Mutex<PageState>,
    tree: Mutex<CommentTree>,
    ids: IdGenerator,
    /// Writes that will never be confirmed. Replies held for them give up.
    failed: Mutex<HashSet<ProvisionalId>>,
    defaults: AuthorDefaults,
    metrics: Arc<SyncMetrics>,
    revision: watch::Sender<u64>,
}

impl<S: CommentSource> Feed<S> {
    pub fn new(source: S, options: FeedOptions) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(FeedInner {
                source,
                pages: Mutex::new(PageState::new(options.ordering, options.page_mode)),
                tree: Mutex::new(CommentTree::new()),
                ids: IdGenerator::new(),
                failed: Mutex::new(HashSet::new()),
                defaults: options.author_defaults,
                metrics: Arc::new(SyncMetrics::default()),
                revision,
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    // ── Pagination & ordering ─────────────────────────────────────────────

    /// Fetch `page` under `ordering` and make it the feed's content.
    ///
    /// In replace mode the page's comments become the whole root collection;
    /// in accumulate mode they are appended to it. Returns the page's
    /// comments. A load overtaken by a newer one that already landed returns
    /// [`FeedError::Superseded`] and leaves the tree alone.
    pub async fn load_page(&self, page: u32, ordering: &str) -> Result<Vec<CommentView>, FeedError> {
        let generation = self.pages().begin();
        let query = PageQuery {
            page,
            ordering: ordering.to_string(),
        };

        let envelope = match self.inner.source.fetch_page(&query).await {
            Ok(envelope) => envelope,
            Err(source) => {
                warn!("failed to load page {page} ({ordering}): {source}");
                return Err(FeedError::Fetch { page, source });
            }
        };

        let comments = {
            let mut pages = self.pages();
            if !pages.accept(generation) {
                self.inner.metrics.record_stale_page();
                info!("discarding stale page {page} ({ordering}), generation {generation}");
                return Err(FeedError::Superseded { page });
            }
            pages.page = page;
            pages.ordering = query.ordering;
            pages.previous = envelope.previous;
            pages.next = envelope.next;
            pages.count = envelope.count;

            let mut tree = self.tree();
            let top = tree.ingest(envelope.results, &self.inner.defaults, &self.inner.ids);
            let comments: Vec<CommentView> = top.iter().filter_map(|&key| tree.view(key)).collect();
            match pages.mode {
                PageMode::Accumulate => tree.accumulate(top),
                PageMode::Replace | PageMode::Unknown => tree.replace(top),
            }
            debug!(
                "applied page {page}: {} comments, {} roots, {} nodes",
                comments.len(),
                tree.roots().len(),
                tree.len()
            );
            comments
        };

        self.bump_revision();
        Ok(comments)
    }

    /// Load `page` under the current ordering.
    pub async fn change_page(&self, page: u32) -> Result<Vec<CommentView>, FeedError> {
        let ordering = self.pages().ordering.clone();
        self.load_page(page, &ordering).await
    }

    /// Load the current page under `ordering`. The key is forwarded as-is.
    pub async fn change_ordering(&self, ordering: &str) -> Result<Vec<CommentView>, FeedError> {
        let page = self.pages().page;
        self.load_page(page, ordering).await
    }

    /// Reload the first page under the current ordering.
    pub async fn refresh(&self) -> Result<Vec<CommentView>, FeedError> {
        let ordering = self.pages().ordering.clone();
        self.load_page(1, &ordering).await
    }

    // ── Optimistic writes ─────────────────────────────────────────────────

    pub async fn create_comment(
        &self,
        draft: CommentDraft,
        parent: Option<Identity>,
    ) -> Result<CreatedComment, FeedError> {
        self.create_comment_with_captcha(draft, parent, None).await
    }

    /// Insert a provisional comment, send the write, and reconcile the reply.
    ///
    /// The provisional node is in the tree before the request goes out. When
    /// the requested parent is missing the node becomes a root
    /// ([`Placement::RootFallback`]) and the write still proceeds. A reply to
    /// a parent that is itself still pending is held until the parent gets its
    /// confirmed id; if the parent's write fails the reply is not sent and
    /// [`FeedError::ParentUnconfirmed`] is returned. A failed write leaves the
    /// provisional node in place.
    pub async fn create_comment_with_captcha(
        &self,
        draft: CommentDraft,
        parent: Option<Identity>,
        captcha: Option<CaptchaAnswer>,
    ) -> Result<CreatedComment, FeedError> {
        let request = CreateCommentRequest {
            text: draft.body.clone(),
            parent: None,
            user: Some(RawUser {
                username: Some(draft.author.username.clone()),
                email: Some(draft.author.email.clone()).filter(|e| !e.is_empty()),
                homepage: draft.author.homepage.clone(),
            }),
            captcha_0: captcha.as_ref().map(|c| c.key.clone()),
            captcha_1: captcha.map(|c| c.answer),
        };

        let inserted = self
            .tree()
            .insert_provisional(draft, parent.as_ref(), &self.inner.ids);
        self.bump_revision();

        if inserted.placement.is_fallback() {
            self.inner.metrics.record_parent_fallback();
        }
        let pending_parent = match (inserted.placement, inserted.parent_id) {
            (Placement::Child { parent }, None) => {
                self.tree().comment(parent).map(|c| c.provisional_id.clone())
            }
            _ => None,
        };
        let parent_id = match pending_parent {
            Some(parent) => {
                info!(
                    "holding write {} until parent {parent} is confirmed",
                    inserted.provisional_id
                );
                match self.await_confirmation(&parent).await {
                    Some(id) => Some(id),
                    None => {
                        warn!(
                            "parent {parent} of {} will not be confirmed; write not sent",
                            inserted.provisional_id
                        );
                        self.mark_failed(&inserted.provisional_id);
                        return Err(FeedError::ParentUnconfirmed {
                            provisional_id: inserted.provisional_id,
                            parent,
                        });
                    }
                }
            }
            None => inserted.parent_id,
        };
        let request = CreateCommentRequest {
            parent: parent_id.map(|id| id.0),
            ..request
        };

        let raw = match self.inner.source.create_comment(&request).await {
            Ok(raw) => raw,
            Err(source) => {
                warn!("write {} failed: {source}", inserted.provisional_id);
                self.mark_failed(&inserted.provisional_id);
                return Err(FeedError::Write {
                    provisional_id: inserted.provisional_id,
                    source,
                });
            }
        };

        let record = normalize(raw, &self.inner.defaults);
        let confirmed = self
            .tree()
            .confirm(&inserted.provisional_id, record, &self.inner.ids);
        let confirmation = match confirmed {
            Ok(confirmation) => confirmation,
            Err(source) => {
                self.mark_failed(&inserted.provisional_id);
                return Err(FeedError::Reconcile {
                    provisional_id: inserted.provisional_id,
                    source,
                });
            }
        };
        self.bump_revision();

        match confirmation {
            Confirmation::Folded { .. } => self.inner.metrics.record_folded_duplicate(),
            Confirmation::Merged { .. } | Confirmation::Recovered { .. } => {
                self.inner.metrics.record_reconciliation_miss()
            }
            Confirmation::Promoted(_) => {}
        }

        let key = confirmation.key();
        let id = self
            .tree()
            .comment(key)
            .and_then(|c| c.id())
            .ok_or_else(|| FeedError::Reconcile {
                provisional_id: inserted.provisional_id.clone(),
                source: commentsync_core::TreeError::UnknownNode(key),
            })?;
        info!("comment {id} confirmed for {}", inserted.provisional_id);

        Ok(CreatedComment {
            provisional_id: inserted.provisional_id,
            id,
            key,
            placement: inserted.placement,
            confirmation,
        })
    }

    /// Wait until the pending comment `parent` has a confirmed id. `None` once
    /// its write is known to have failed.
    async fn await_confirmation(&self, parent: &ProvisionalId) -> Option<CommentId> {
        let identity = Identity::from(parent);
        let mut revisions = self.inner.revision.subscribe();
        loop {
            let failed = self.failed().contains(parent);
            if failed {
                return None;
            }
            let id = {
                let tree = self.tree();
                tree.find(&identity)
                    .and_then(|key| tree.comment(key))
                    .and_then(Comment::id)
            };
            if id.is_some() {
                return id;
            }
            if revisions.changed().await.is_err() {
                return None;
            }
        }
    }

    fn mark_failed(&self, provisional_id: &ProvisionalId) {
        self.failed().insert(provisional_id.clone());
        self.bump_revision();
    }

    // ── Observation ───────────────────────────────────────────────────────

    pub fn page_state(&self) -> PageState {
        self.pages().clone()
    }

    /// Nested copy of the whole feed, roots in display order.
    pub fn snapshot(&self) -> Vec<CommentView> {
        self.tree().snapshot()
    }

    pub fn find(&self, identity: &Identity) -> Option<CommentView> {
        let tree = self.tree();
        tree.find(identity).and_then(|key| tree.view(key))
    }

    /// Run `f` with read access to the tree.
    pub fn read<T>(&self, f: impl FnOnce(&CommentTree) -> T) -> T {
        f(&self.tree())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn metrics_handle(&self) -> Arc<SyncMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Receiver that changes every time the tree does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn bump_revision(&self) {
        self.inner.revision.send_modify(|rev| *rev += 1);
    }

    fn pages(&self) -> MutexGuard<'_, PageState> {
        self.inner.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failed(&self) -> MutexGuard<'_, HashSet<ProvisionalId>> {
        self.inner.failed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tree(&self) -> MutexGuard<'_, CommentTree> {
        self.inner.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: CommentSource> ResyncTrigger for Feed<S> {
    /// Spawn a first-page reload; the caller does not wait for it.
    fn resync(&self) {
        let feed = self.clone();
        tokio::spawn(async move {
            match feed.refresh().await {
                Ok(comments) => debug!("resynced page 1: {} comments", comments.len()),
                Err(FeedError::Superseded { .. }) => debug!("resync superseded by a newer load"),
                Err(e) => warn!("resync failed: {e}"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSource, page, unavailable};
    use commentsync_core::Author;
    use commentsync_core::testing::{assert_unique_identities, raw, root_ids};
    use std::time::Duration;

    fn feed(source: FakeSource) -> Feed<FakeSource> {
        Feed::new(source, FeedOptions::default())
    }

    fn draft(body: &str) -> CommentDraft {
        CommentDraft::new(body, Author::named("olena"))
    }

    #[tokio::test]
    async fn load_page_replaces_roots_and_updates_cursor() {
        let source = FakeSource::new();
        source.push_page(page(vec![raw(1, "a", vec![raw(2, "b", vec![])])], Some("p3"), Some("p1")));
        source.push_page(page(vec![raw(3, "c", vec![])], None, Some("p2")));
        let feed = feed(source);

        let first = feed.load_page(2, "-created_at").await.expect("page 2");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].children.len(), 1);
        let state = feed.page_state();
        assert_eq!(state.page, 2);
        assert_eq!(state.next.as_deref(), Some("p3"));
        assert_eq!(state.previous.as_deref(), Some("p1"));
        assert_eq!(state.count, Some(1));

        feed.load_page(3, "-created_at").await.expect("page 3");
        assert_eq!(feed.read(root_ids), vec![Some(3)]);
        assert_eq!(feed.read(|t| t.len()), 1);
        assert!(!feed.page_state().has_next());

        let queries = feed.source().queries();
        assert_eq!(queries[0].page, 2);
        assert_eq!(queries[1].page, 3);
        assert_eq!(queries[1].ordering, "-created_at");
    }

    #[tokio::test]
    async fn identical_payloads_give_identical_ordering() {
        let source = FakeSource::new();
        let payload = vec![raw(5, "e", vec![]), raw(4, "d", vec![]), raw(3, "c", vec![])];
        source.push_page(page(payload.clone(), None, None));
        source.push_page(page(payload, None, None));
        let feed = feed(source);

        let first = feed.load_page(1, "-created_at").await.expect("first");
        let second = feed.load_page(1, "-created_at").await.expect("second");

        assert_eq!(first, second);
        assert_eq!(feed.read(root_ids), vec![Some(5), Some(4), Some(3)]);
    }

    #[tokio::test]
    async fn accumulate_mode_appends_pages() {
        let source = FakeSource::new();
        source.push_page(page(vec![raw(1, "a", vec![]), raw(2, "b", vec![])], Some("p2"), None));
        source.push_page(page(vec![raw(3, "c", vec![])], None, Some("p1")));
        let feed = Feed::new(
            source,
            FeedOptions {
                page_mode: PageMode::Accumulate,
                ..FeedOptions::default()
            },
        );

        feed.load_page(1, "created_at").await.expect("page 1");
        let second = feed.change_page(2).await.expect("page 2");

        assert_eq!(second.len(), 1);
        assert_eq!(feed.read(root_ids), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(feed.page_state().page, 2);
        assert_eq!(feed.page_state().ordering, "created_at");
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_untouched() {
        let source = FakeSource::new();
        source.push_page(page(vec![raw(1, "a", vec![])], None, None));
        source.push_page_error(unavailable());
        let feed = feed(source);

        feed.load_page(1, "-created_at").await.expect("page 1");
        let err = feed.load_page(2, "created_at").await.expect_err("unavailable");

        assert!(matches!(err, FeedError::Fetch { page: 2, .. }));
        assert!(err.is_transient());
        let state = feed.page_state();
        assert_eq!(state.page, 1);
        assert_eq!(state.ordering, "-created_at");
        assert_eq!(feed.read(root_ids), vec![Some(1)]);
    }

    #[tokio::test]
    async fn change_ordering_forwards_key_and_keeps_page() {
        let source = FakeSource::new();
        source.push_page(page(vec![raw(1, "a", vec![])], None, None));
        source.push_page(page(vec![raw(1, "a", vec![])], None, None));
        let feed = feed(source);

        feed.load_page(3, "-created_at").await.expect("load");
        feed.change_ordering("user_name").await.expect("reorder");

        let last = feed.source().queries().pop().expect("query");
        assert_eq!(last.page, 3);
        assert_eq!(last.ordering, "user_name");
        assert_eq!(feed.page_state().ordering, "user_name");
    }

    #[tokio::test]
    async fn stale_page_completion_is_discarded() {
        let source = FakeSource::new();
        let gate = source.push_gated_page(page(vec![raw(1, "old", vec![])], None, None));
        source.push_page(page(vec![raw(2, "new", vec![])], None, None));
        let feed = feed(source);

        let slow = tokio::spawn({
            let feed = feed.clone();
            async move { feed.load_page(1, "-created_at").await }
        });
        feed.source().wait_for_queries(1).await;
        feed.load_page(2, "-created_at").await.expect("fast load");
        gate.notify_one();

        let err = slow.await.expect("join").expect_err("stale");
        assert!(matches!(err, FeedError::Superseded { page: 1 }));
        assert_eq!(feed.read(root_ids), vec![Some(2)]);
        assert_eq!(feed.page_state().page, 2);
        assert_eq!(feed.metrics().stale_pages_discarded, 1);
    }

    #[tokio::test]
    async fn reply_is_visible_before_the_server_answers() {
        let source = FakeSource::new();
        source.push_page(page(vec![raw(1, "root", vec![])], None, None));
        let gate = source.gate_writes();
        source.push_created(99);
        let feed = feed(source);
        feed.load_page(1, "-created_at").await.expect("load");

        let mut revisions = feed.subscribe();
        revisions.borrow_and_update();
        let pending = tokio::spawn({
            let feed = feed.clone();
            async move { feed.create_comment(draft("hi"), Some(Identity::from(1))).await }
        });
        revisions.changed().await.expect("provisional insert");

        let root = feed.find(&Identity::from(1)).expect("root");
        assert_eq!(root.children.len(), 1);
        let provisional = root.children[0].comment.clone();
        assert!(provisional.is_pending());
        assert_eq!(provisional.fields.body, "hi");

        gate.notify_one();
        let created = pending.await.expect("join").expect("created");

        assert_eq!(created.id, CommentId(99));
        assert_eq!(created.provisional_id, provisional.provisional_id);
        assert_eq!(created.confirmation, Confirmation::Promoted(created.key));
        let root = feed.find(&Identity::from(1)).expect("root");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].comment.id(), Some(CommentId(99)));
        assert_eq!(root.children[0].comment.provisional_id, provisional.provisional_id);

        let request = feed.source().created_requests().pop().expect("request");
        assert_eq!(request.parent, Some(1));
        assert_eq!(request.text, "hi");
        assert_eq!(
            request.user.and_then(|u| u.username).as_deref(),
            Some("olena")
        );
    }

    #[tokio::test]
    async fn reply_to_missing_parent_becomes_one_root() {
        let source = FakeSource::new();
        source.push_page(page(vec![raw(1, "root", vec![])], None, None));
        source.push_created(100);
        let feed = feed(source);
        feed.load_page(1, "-created_at").await.expect("load");

        let created = feed
            .create_comment(draft("orphan"), Some(Identity::from(404)))
            .await
            .expect("created");

        assert_eq!(created.placement, Placement::RootFallback);
        assert_eq!(feed.read(root_ids), vec![Some(100), Some(1)]);
        assert_eq!(feed.metrics().parent_fallbacks, 1);
        let request = feed.source().created_requests().pop().expect("request");
        assert_eq!(request.parent, Some(404));
        feed.read(assert_unique_identities);
    }

    #[tokio::test]
    async fn failed_write_keeps_provisional_node() {
        let source = FakeSource::new();
        source.push_create_error(unavailable());
        let feed = feed(source);

        let err = feed
            .create_comment(draft("lost?"), None)
            .await
            .expect_err("write fails");

        let provisional_id = match err {
            FeedError::Write { provisional_id, .. } => provisional_id,
            other => panic!("expected write error, got {other:?}"),
        };
        let node = feed.find(&Identity::from(&provisional_id)).expect("still there");
        assert!(node.comment.is_pending());
        assert_eq!(feed.read(|t| t.pending_count()), 1);
    }

    #[tokio::test]
    async fn refresh_during_write_does_not_duplicate() {
        let source = FakeSource::new();
        source.push_page(page(vec![raw(1, "root", vec![])], None, None));
        // The refresh already contains the comment the write creates.
        source.push_page(page(vec![raw(42, "mine", vec![]), raw(1, "root", vec![])], None, None));
        let gate = source.gate_writes();
        source.push_created(42);
        let feed = feed(source);
        feed.load_page(1, "-created_at").await.expect("load");

        let mut revisions = feed.subscribe();
        revisions.borrow_and_update();
        let write = tokio::spawn({
            let feed = feed.clone();
            async move { feed.create_comment(draft("mine"), None).await }
        });
        revisions.changed().await.expect("provisional insert");
        feed.refresh().await.expect("refresh");
        gate.notify_one();

        // The unconfirmed root survives the refresh next to its server copy.
        assert_eq!(feed.read(root_ids), vec![None, Some(42), Some(1)]);

        let created = write.await.expect("join").expect("created");
        assert!(matches!(created.confirmation, Confirmation::Folded { .. }));
        assert_eq!(feed.read(root_ids), vec![Some(42), Some(1)]);
        assert_eq!(feed.metrics().folded_duplicates, 1);
        assert_eq!(feed.metrics().reconciliation_misses, 0);
        feed.read(assert_unique_identities);
    }

    #[tokio::test]
    async fn reply_to_pending_parent_waits_for_its_id() {
        let source = FakeSource::new();
        let gate = source.gate_writes();
        source.push_created(10);
        source.push_created(11);
        let feed = feed(source);

        let mut revisions = feed.subscribe();
        revisions.borrow_and_update();
        let parent_write = tokio::spawn({
            let feed = feed.clone();
            async move { feed.create_comment(draft("parent"), None).await }
        });
        revisions.changed().await.expect("parent inserted");
        let parent_pid = feed.snapshot()[0].comment.provisional_id.clone();

        revisions.borrow_and_update();
        let reply_write = tokio::spawn({
            let feed = feed.clone();
            let parent = Identity::from(&parent_pid);
            async move { feed.create_comment(draft("reply"), Some(parent)).await }
        });
        revisions.changed().await.expect("reply inserted");

        let parent_view = feed.find(&Identity::from(&parent_pid)).expect("parent");
        assert_eq!(parent_view.children.len(), 1);
        assert_eq!(feed.source().created_requests().len(), 1);

        gate.notify_one();
        let parent = parent_write.await.expect("join").expect("parent created");
        let reply = reply_write.await.expect("join").expect("reply created");

        assert_eq!(parent.id, CommentId(10));
        assert_eq!(reply.id, CommentId(11));
        let requests = feed.source().created_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].parent, Some(10));
        let parent_view = feed.find(&Identity::from(10)).expect("parent");
        assert_eq!(parent_view.children[0].comment.id(), Some(CommentId(11)));
        feed.read(assert_unique_identities);
    }

    #[tokio::test]
    async fn reply_is_not_sent_when_parent_write_fails() {
        let source = FakeSource::new();
        let gate = source.gate_writes();
        source.push_create_error(unavailable());
        let feed = feed(source);

        let mut revisions = feed.subscribe();
        revisions.borrow_and_update();
        let parent_write = tokio::spawn({
            let feed = feed.clone();
            async move { feed.create_comment(draft("parent"), None).await }
        });
        revisions.changed().await.expect("parent inserted");
        let parent_pid = feed.snapshot()[0].comment.provisional_id.clone();

        revisions.borrow_and_update();
        let reply_write = tokio::spawn({
            let feed = feed.clone();
            let parent = Identity::from(&parent_pid);
            async move { feed.create_comment(draft("reply"), Some(parent)).await }
        });
        revisions.changed().await.expect("reply inserted");
        gate.notify_one();

        let err = parent_write.await.expect("join").expect_err("parent fails");
        assert!(matches!(err, FeedError::Write { .. }));
        let err = reply_write.await.expect("join").expect_err("reply held back");
        match err {
            FeedError::ParentUnconfirmed { parent, .. } => assert_eq!(parent, parent_pid),
            other => panic!("expected unconfirmed parent, got {other:?}"),
        }
        assert_eq!(feed.source().created_requests().len(), 1);
        assert_eq!(feed.read(|t| t.pending_count()), 2);
    }

    #[tokio::test]
    async fn captcha_answer_is_forwarded() {
        let source = FakeSource::new();
        source.push_created(7);
        let feed = feed(source);

        feed.create_comment_with_captcha(
            draft("x"),
            None,
            Some(CaptchaAnswer {
                key: "abc".to_string(),
                answer: "w0rd".to_string(),
            }),
        )
        .await
        .expect("created");

        let request = feed.source().created_requests().pop().expect("request");
        assert_eq!(request.captcha_0.as_deref(), Some("abc"));
        assert_eq!(request.captcha_1.as_deref(), Some("w0rd"));
        assert_eq!(request.parent, None);
    }

    #[tokio::test]
    async fn resync_reloads_first_page_with_current_ordering() {
        let source = FakeSource::new();
        source.push_page(page(vec![raw(1, "a", vec![])], None, None));
        source.push_page(page(vec![raw(2, "b", vec![]), raw(1, "a", vec![])], None, None));
        let feed = feed(source);
        feed.load_page(4, "user_name").await.expect("load");

        let mut revisions = feed.subscribe();
        revisions.borrow_and_update();
        feed.resync();
        tokio::time::timeout(Duration::from_secs(5), revisions.changed())
            .await
            .expect("resync in time")
            .expect("revision");

        let last = feed.source().queries().pop().expect("query");
        assert_eq!(last.page, 1);
        assert_eq!(last.ordering, "user_name");
        assert_eq!(feed.read(root_ids), vec![Some(2), Some(1)]);
    }
}
