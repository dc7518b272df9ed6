use std::future::Future;

use commentsync_api_client::{ApiClient, ApiError};
use commentsync_api_types::{CommentPage, CreateCommentRequest, PageQuery, RawComment};

/// The request capability the feed issues reads and writes through.
pub trait CommentSource: Send + Sync + 'static {
    fn fetch_page(
        &self,
        query: &PageQuery,
    ) -> impl Future<Output = Result<CommentPage, ApiError>> + Send;

    fn create_comment(
        &self,
        request: &CreateCommentRequest,
    ) -> impl Future<Output = Result<RawComment, ApiError>> + Send;
}

impl CommentSource for ApiClient {
    async fn fetch_page(&self, query: &PageQuery) -> Result<CommentPage, ApiError> {
        self.list_comments(query).await
    }

    async fn create_comment(&self, request: &CreateCommentRequest) -> Result<RawComment, ApiError> {
        ApiClient::create_comment(self, request).await
    }
}
