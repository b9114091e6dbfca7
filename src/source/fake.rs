use super::{ElectionSource, FetchError, NameLookup, Result};
use crate::model::election::{Election, ElectionPage, PageSize, PaginationState};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// In-memory platform used by tests and the `--demo` CLI mode.
#[derive(Default)]
pub struct FakeSource {
    pub elections: Mutex<Vec<Election>>,
    pub names: Mutex<HashMap<String, String>>,
    pub failing_names: Mutex<HashSet<String>>,
    pub name_delays: Mutex<HashMap<String, Duration>>,
    pub failing_pages: Mutex<HashSet<u32>>,
    pub page_delays: Mutex<HashMap<u32, Duration>>,
    pub lookup_calls: Mutex<HashMap<String, u64>>,
    pub page_calls: AtomicU64,
}

impl FakeSource {
    pub fn new(elections: Vec<Election>) -> Self {
        Self {
            elections: Mutex::new(elections),
            ..Self::default()
        }
    }

    pub async fn set_name(&self, identifier: &str, name: &str) {
        self.names
            .lock()
            .await
            .insert(identifier.to_string(), name.to_string());
    }

    pub async fn fail_name(&self, identifier: &str) {
        self.failing_names
            .lock()
            .await
            .insert(identifier.to_string());
    }

    pub async fn heal_name(&self, identifier: &str) {
        self.failing_names.lock().await.remove(identifier);
    }

    pub async fn delay_name(&self, identifier: &str, delay: Duration) {
        self.name_delays
            .lock()
            .await
            .insert(identifier.to_string(), delay);
    }

    pub async fn fail_page(&self, page: u32) {
        self.failing_pages.lock().await.insert(page);
    }

    pub async fn delay_page(&self, page: u32, delay: Duration) {
        self.page_delays.lock().await.insert(page, delay);
    }

    pub async fn lookups_for(&self, identifier: &str) -> u64 {
        self.lookup_calls
            .lock()
            .await
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }

    pub async fn total_lookups(&self) -> u64 {
        self.lookup_calls.lock().await.values().sum()
    }
}

#[async_trait]
impl ElectionSource for FakeSource {
    async fn fetch_page(&self, page: u32, size: PageSize) -> Result<ElectionPage> {
        self.page_calls.fetch_add(1, Ordering::Relaxed);
        let delay = self.page_delays.lock().await.get(&page).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_pages.lock().await.contains(&page) {
            return Err(FetchError::Network(format!("page {} unavailable", page)));
        }

        let elections = self.elections.lock().await;
        let per_page = size.get() as usize;
        let total_items = elections.len();
        let total_pages = ((total_items + per_page - 1) / per_page) as u32;
        let start = (page.saturating_sub(1) as usize) * per_page;
        let items: Vec<Election> = elections.iter().skip(start).take(per_page).cloned().collect();

        Ok(ElectionPage {
            elections: items,
            pagination: PaginationState {
                current_page: page,
                items_per_page: size,
                total_pages,
                total_items: total_items as u64,
                has_next: page < total_pages,
                has_prev: page > 1,
            },
        })
    }
}

#[async_trait]
impl NameLookup for FakeSource {
    async fn lookup_name(&self, identifier: &str) -> Result<String> {
        *self
            .lookup_calls
            .lock()
            .await
            .entry(identifier.to_string())
            .or_insert(0) += 1;

        let delay = self.name_delays.lock().await.get(identifier).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_names.lock().await.contains(identifier) {
            return Err(FetchError::Network(format!("lookup of {} failed", identifier)));
        }
        self.names
            .lock()
            .await
            .get(identifier)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(identifier.to_string()))
    }
}
