//! In-memory [`CommentSource`] for feed and channel tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use commentsync_api_client::ApiError;
use commentsync_api_types::{CommentPage, CreateCommentRequest, PageQuery, RawComment};
use tokio::sync::Notify;

use crate::source::CommentSource;

type Gate = Option<Arc<Notify>>;

#[derive(Default)]
pub(crate) struct FakeSource {
    pages: Mutex<VecDeque<(Gate, Result<CommentPage, ApiError>)>>,
    created: Mutex<VecDeque<Result<i64, ApiError>>>,
    write_gate: Mutex<Gate>,
    queries: Mutex<Vec<PageQuery>>,
    requests: Mutex<Vec<CreateCommentRequest>>,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_page(&self, page: CommentPage) {
        self.pages.lock().unwrap().push_back((None, Ok(page)));
    }

    /// Queue a page whose response is held until the returned gate is notified.
    pub(crate) fn push_gated_page(&self, page: CommentPage) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.pages
            .lock()
            .unwrap()
            .push_back((Some(Arc::clone(&gate)), Ok(page)));
        gate
    }

    pub(crate) fn push_page_error(&self, error: ApiError) {
        self.pages.lock().unwrap().push_back((None, Err(error)));
    }

    /// Queue a successful write that the server assigns `id`.
    pub(crate) fn push_created(&self, id: i64) {
        self.created.lock().unwrap().push_back(Ok(id));
    }

    pub(crate) fn push_create_error(&self, error: ApiError) {
        self.created.lock().unwrap().push_back(Err(error));
    }

    /// Hold the next write until the returned gate is notified.
    pub(crate) fn gate_writes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.write_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn created_requests(&self) -> Vec<CreateCommentRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) async fn wait_for_queries(&self, count: usize) {
        while self.queries.lock().unwrap().len() < count {
            tokio::task::yield_now().await;
        }
    }
}

impl CommentSource for FakeSource {
    async fn fetch_page(&self, query: &PageQuery) -> Result<CommentPage, ApiError> {
        self.queries.lock().unwrap().push(query.clone());
        let (gate, result) = self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| (None, Ok(CommentPage::default())));
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result
    }

    async fn create_comment(&self, request: &CreateCommentRequest) -> Result<RawComment, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let gate = self.write_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let id = self
            .created
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unavailable()))?;
        Ok(RawComment {
            id: Some(id),
            text: Some(request.text.clone()),
            created_at: Some("2025-01-01T12:00:00Z".to_string()),
            parent: request.parent,
            user: request.user.clone(),
            ..Default::default()
        })
    }
}

pub(crate) fn page(results: Vec<RawComment>, next: Option<&str>, previous: Option<&str>) -> CommentPage {
    CommentPage {
        count: Some(results.len() as u64),
        results,
        next: next.map(str::to_string),
        previous: previous.map(str::to_string),
    }
}

pub(crate) fn unavailable() -> ApiError {
    ApiError::Status {
        status: 503,
        body: "service unavailable".to_string(),
    }
}
