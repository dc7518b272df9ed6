pub mod client;
pub mod error;

pub use client::ApiClient;
pub use commentsync_api_types;
pub use error::ApiError;
