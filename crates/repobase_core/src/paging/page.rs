//! Paging result values.
//!
//! One `Page<T>` value serves typed entity pages and dynamic projected pages
//! (`DynamicPage`); `GridPage` is a relabelled view for grid widgets.

use crate::model::row::DynamicRow;
use crate::paging::page_math::PageBounds;
use serde::Serialize;

/// One page of query results with its computed boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Effective 1-based page index.
    pub index: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub first_row: i64,
    pub last_row: i64,
    pub items: Vec<T>,
}

/// Page of untyped rows from projected, joined or raw SQL queries.
pub type DynamicPage = Page<DynamicRow>;

impl<T> Page<T> {
    pub fn new(bounds: PageBounds, items: Vec<T>) -> Self {
        Self {
            index: bounds.index,
            page_size: bounds.page_size,
            total_count: bounds.total_count,
            first_row: bounds.first_row,
            last_row: bounds.last_row,
            items,
        }
    }

    /// Empty page for a query that matched nothing.
    pub fn empty(page_size: i64) -> Self {
        Self::new(PageBounds::compute(1, page_size, 0), Vec::new())
    }

    pub fn page_count(&self) -> i64 {
        crate::paging::page_math::page_count(self.total_count, self.page_size)
    }

    pub fn has_next(&self) -> bool {
        self.index < self.page_count()
    }

    pub fn has_previous(&self) -> bool {
        self.index > 1
    }

    /// Converts items while keeping boundaries.
    pub fn map_items<U, F>(self, selector: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            index: self.index,
            page_size: self.page_size,
            total_count: self.total_count,
            first_row: self.first_row,
            last_row: self.last_row,
            items: self.items.into_iter().map(selector).collect(),
        }
    }

    pub fn as_grid(&self) -> GridPage<'_, T> {
        GridPage {
            page: self.index,
            page_size: self.page_size,
            total: self.total_count,
            rows: &self.items,
        }
    }
}

/// Grid-widget view of a [`Page`]: `page`, `pageSize`, `total`, `rows`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPage<'a, T> {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub rows: &'a [T],
}
