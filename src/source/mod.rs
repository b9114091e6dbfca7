pub mod fake;
pub mod http;

use crate::model::election::{ElectionPage, PageSize};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Malformed response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Remote listing of concluded elections.
#[async_trait]
pub trait ElectionSource: Send + Sync + 'static {
    async fn fetch_page(&self, page: u32, size: PageSize) -> Result<ElectionPage>;
}

/// Remote lookup of a display name for an opaque identifier.
#[async_trait]
pub trait NameLookup: Send + Sync + 'static {
    async fn lookup_name(&self, identifier: &str) -> Result<String>;
}
