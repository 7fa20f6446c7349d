use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;

/// Raw pagination query parameters.
///
/// Values are kept as strings so that garbage input falls back to the
/// defaults instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<String>,

    #[serde(default)]
    pub per_page: Option<String>,
}

impl PageParams {
    /// 1-based page number, at least 1.
    pub fn page(&self) -> u64 {
        parse_positive(self.page.as_deref()).unwrap_or(1)
    }

    /// Page size in `1..=MAX_PER_PAGE`.
    pub fn per_page(&self) -> u64 {
        parse_positive(self.per_page.as_deref())
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE)
    }

    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    let n: i64 = raw?.trim().parse().ok()?;
    Some(n.max(1) as u64)
}

/// Pagination block returned alongside a page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        Self {
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page.max(1)),
        }
    }
}
