use rocket::FromForm;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 500;

/// Raw pagination query parameters, e.g. `?page_num=2&page_size=20`.
#[derive(Debug, Default, FromForm)]
pub struct PaginationRequest {
    page_num: Option<u32>,
    page_size: Option<u32>,
}

impl PaginationRequest {
    /// Validate the request, applying defaults.
    pub fn page(&self) -> Result<Page> {
        let page_num = self.page_num.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_num == 0 {
            return Err(Error::InvalidInput("page_num starts at 1".to_string()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(Error::InvalidInput(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Page {
            page_num,
            page_size,
        })
    }
}

/// A validated page of results to fetch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Page {
    page_num: u32,
    page_size: u32,
}

impl Page {
    pub fn new(page_num: u32, page_size: u32) -> Self {
        Self {
            page_num,
            page_size,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// How many items precede this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page_num - 1) * u64::from(self.page_size)
    }

    /// Wrap up a fetched page of items.
    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub page_num: u32,
    pub page_size: u32,
    pub total: u64,
}

/// A page of items together with where it sits in the whole result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}

impl<T> Paginated<T> {
    /// Convert every item, keeping the pagination info.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let page = PaginationRequest::default().page().unwrap();
        assert_eq!(page, Page::new(1, 50));
        assert_eq!(page.skip(), 0);
    }

    #[test]
    fn skip_counts_earlier_pages() {
        assert_eq!(Page::new(3, 20).skip(), 40);
    }

    #[test]
    fn reject_out_of_range() {
        let zero_page = PaginationRequest {
            page_num: Some(0),
            page_size: None,
        };
        assert!(matches!(zero_page.page(), Err(Error::InvalidInput(_))));

        let huge_page = PaginationRequest {
            page_num: None,
            page_size: Some(501),
        };
        assert!(matches!(huge_page.page(), Err(Error::InvalidInput(_))));
    }
}
