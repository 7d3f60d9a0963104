//! Business logic. Handlers stay thin and call into these services.

pub mod addresses;
pub mod dashboard;
pub mod deliveries;
pub mod drivers;
pub mod orders;
pub mod products;
pub mod suppliers;
pub mod users;

use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Select};
use serde::Deserialize;

use crate::errors::ServiceError;

/// One page of a list query
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl<T> Paged<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// 1-based page request; `per_page` is already clamped by the caller
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl PageRequest {
    /// Page numbers past the last representable SQL offset are clamped to it
    pub fn new(page: u64, per_page: u64) -> Self {
        let per_page = per_page.max(1);
        let last_page = i64::MAX as u64 / per_page;
        Self {
            page: page.clamp(1, last_page),
            per_page,
        }
    }
}

/// Runs `query` through sea-orm's paginator
pub(crate) async fn fetch_page<C, E>(
    db: &C,
    query: Select<E>,
    page: PageRequest,
) -> Result<Paged<E::Model>, ServiceError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Send + Sync + 'static,
{
    let page = PageRequest::new(page.page, page.per_page);
    let paginator = query.paginate(db, page.per_page);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.page.saturating_sub(1)).await?;
    Ok(Paged {
        items,
        total,
        page: page.page,
        per_page: page.per_page,
    })
}
