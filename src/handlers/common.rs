use crate::{config::AppConfig, PaginatedResponse};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Items per page, capped by the configured maximum
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// Resolves `(page, per_page)` against the configured defaults.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size.max(1));
        (page, per_page)
    }
}

/// Wraps one page of results with its position in the full set.
pub fn paginate<T>(items: Vec<T>, total: u64, page: u64, per_page: u64) -> PaginatedResponse<T> {
    PaginatedResponse {
        items,
        total,
        page,
        limit: per_page,
        total_pages: total.div_ceil(per_page.max(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "pagination_test_secret_value_0123456789abcdef".into(),
            "127.0.0.1".into(),
            8080,
            "development".into(),
        )
    }

    #[test]
    fn defaults_to_first_page_of_fifteen() {
        let cfg = config();
        assert_eq!(PaginationParams::default().resolve(&cfg), (1, 15));
    }

    #[test]
    fn clamps_out_of_range_values() {
        let cfg = config();
        let params = PaginationParams {
            page: Some(0),
            per_page: Some(10_000),
        };
        assert_eq!(params.resolve(&cfg), (1, cfg.max_page_size));

        let params = PaginationParams {
            page: Some(3),
            per_page: Some(0),
        };
        assert_eq!(params.resolve(&cfg), (3, 1));
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = paginate(vec![1, 2], 31, 1, 15);
        assert_eq!(page.total_pages, 3);
        let empty = paginate(Vec::<u8>::new(), 0, 1, 15);
        assert_eq!(empty.total_pages, 0);
    }
}
