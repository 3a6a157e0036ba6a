// src/common/pagination.rs

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

// Query string comum das listagens: ?page=1&limit=20&search=abc
#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    #[validate(range(min = 1, message = "A página começa em 1."))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "O limite deve estar entre 1 e 100."))]
    pub limit: Option<i64>,

    pub search: Option<String>,
}

impl PaginationQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }

    /// Padrão para ILIKE, ou None quando não há busca.
    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s))
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, query: &PaginationQuery) -> Self {
        let limit = query.limit();
        Self {
            data,
            meta: PageMeta {
                total,
                page: query.page(),
                limit,
                total_pages: (total + limit - 1) / limit,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_offsets() {
        let q = PaginationQuery::default();
        assert_eq!((q.page(), q.limit(), q.offset()), (1, 20, 0));

        let q = PaginationQuery { page: Some(3), limit: Some(10), search: None };
        assert_eq!(q.offset(), 20);
    }

    #[test]
    fn total_pages_rounds_up() {
        let q = PaginationQuery { page: Some(1), limit: Some(10), search: None };
        let page = Paginated::new(vec![1, 2, 3], 21, &q);
        assert_eq!(page.meta.total_pages, 3);

        let empty: Paginated<i32> = Paginated::new(vec![], 0, &q);
        assert_eq!(empty.meta.total_pages, 0);
    }

    #[test]
    fn blank_search_is_ignored() {
        let q = PaginationQuery { search: Some("  ".into()), ..Default::default() };
        assert_eq!(q.search_pattern(), None);
        let q = PaginationQuery { search: Some("adm".into()), ..Default::default() };
        assert_eq!(q.search_pattern().as_deref(), Some("%adm%"));
    }
}
