//! Page bounds, offsets and page counts.

use serde::Serialize;

use jobboard_query::PageHints;

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// A resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub current: u64,
    pub page_size: u64,
    pub skip: u64,
}

fn positive(value: Option<i64>) -> Option<u64> {
    value.filter(|v| *v > 0).and_then(|v| u64::try_from(v).ok())
}

impl PageRequest {
    /// Resolve the hints from a query string.
    ///
    /// `pageSize` wins over `limit`; both fall back to the default when
    /// absent or not positive. An explicit `current` wins over a `skip` hint.
    pub fn from_hints(hints: &PageHints, default_page_size: u64) -> Self {
        let page_size = positive(hints.page_size)
            .or_else(|| positive(hints.limit))
            .unwrap_or(default_page_size.max(1));

        match (hints.current, hints.skip.and_then(|s| u64::try_from(s).ok())) {
            (Some(current), _) => {
                let current = u64::try_from(current.max(1)).unwrap_or(1);
                Self {
                    current,
                    page_size,
                    skip: (current - 1).saturating_mul(page_size),
                }
            }
            (None, Some(skip)) => Self {
                current: skip / page_size + 1,
                page_size,
                skip,
            },
            (None, None) => Self {
                current: 1,
                page_size,
                skip: 0,
            },
        }
    }
}

/// The `meta` block of a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current: u64,
    pub page_size: u64,
    pub pages: u64,
    pub total: u64,
}

impl PageMeta {
    pub fn new(request: &PageRequest, total: u64) -> Self {
        Self {
            current: request.current,
            page_size: request.page_size,
            pages: total.div_ceil(request.page_size),
            total,
        }
    }
}
