use crate::cache::NameCache;
use crate::config::EngineConfig;
use crate::model::election::{ElectionId, PageSize};
use crate::pagination::{PageOutcome, PaginationController, PaginationError};
use crate::reveal::{RevealError, RevealHandle, RevealSequencer, RevealView, SessionToken};
use crate::source::{ElectionSource, NameLookup};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Reveal(#[from] RevealError),
    #[error("Election {0} is not on the current page")]
    UnknownElection(ElectionId),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// The results screen: concluded elections paged from the platform, one shared
/// name cache, and the reveal engine.
pub struct ResultsEngine {
    pub pages: PaginationController,
    pub names: Arc<NameCache>,
    pub reveal: RevealHandle,
}

impl ResultsEngine {
    /// Must be called inside a tokio runtime; the reveal engine is spawned here.
    pub fn new<S>(config: &EngineConfig, source: Arc<S>) -> Self
    where
        S: ElectionSource + NameLookup,
    {
        let names = Arc::new(NameCache::new(
            source.clone(),
            config.fallback_name.clone(),
            config.name_cache_capacity,
        ));
        let pages = PaginationController::new(source, config.default_page_size)
            .with_name_cache(Arc::clone(&names));
        let reveal = RevealSequencer::spawn(config, Arc::clone(&names));
        Self {
            pages,
            names,
            reveal,
        }
    }

    pub async fn load(&self, page: u32, size: PageSize) -> Result<PageOutcome> {
        Ok(self.pages.load(page, size).await?)
    }

    /// Start revealing an election from the current page.
    pub async fn select(&self, id: &ElectionId) -> Result<SessionToken> {
        let election = self
            .pages
            .election(id)
            .ok_or_else(|| EngineError::UnknownElection(id.clone()))?;
        Ok(self.reveal.select(election).await?)
    }

    /// Reveal an election from the current page and wait for its session to settle.
    pub async fn reveal(&self, id: &ElectionId) -> Result<RevealView> {
        let token = self.select(id).await?;
        Ok(self.reveal.wait_settled(token).await?)
    }
}
