//! Page boundary arithmetic.
//!
//! # Invariants
//! - Inputs are sanitized, never rejected: `index < 1` and `page_size < 1`
//!   are treated as `1`.
//! - Out-of-range pages clamp to the last page.
//! - `total_count == 0` always yields `(0, 0)`.

/// Rows to fetch for one page: skip `offset`, take `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWindow {
    pub offset: i64,
    pub limit: i64,
}

/// Boundaries of one page plus the effective index it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    /// Effective 1-based page index after sanitizing and clamping.
    pub index: i64,
    pub page_size: i64,
    pub total_count: i64,
    /// 1-based first row on the page, `0` for an empty result.
    pub first_row: i64,
    /// 1-based last row on the page, `0` for an empty result.
    pub last_row: i64,
}

impl PageBounds {
    pub fn compute(index: i64, page_size: i64, total_count: i64) -> Self {
        let page_size = page_size.max(1);
        let total_count = total_count.max(0);
        let requested = index.max(1);

        if total_count == 0 {
            return Self {
                index: 1,
                page_size,
                total_count,
                first_row: 0,
                last_row: 0,
            };
        }

        let max_page = page_count(total_count, page_size);
        let (index, last_row) = if requested >= max_page {
            (max_page, total_count)
        } else {
            (requested, page_size * requested)
        };

        Self {
            index,
            page_size,
            total_count,
            first_row: page_size * index - page_size + 1,
            last_row,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first_row == 0
    }

    /// Window of rows covered by this page; `None` when there is nothing to
    /// fetch.
    pub fn window(&self) -> Option<RowWindow> {
        if self.is_empty() {
            return None;
        }
        Some(RowWindow {
            offset: self.first_row - 1,
            limit: self.last_row - self.first_row + 1,
        })
    }
}

/// Returns `(first_row, last_row)` for a 1-based page request.
pub fn compute_boundaries(index: i64, page_size: i64, total_count: i64) -> (i64, i64) {
    let bounds = PageBounds::compute(index, page_size, total_count);
    (bounds.first_row, bounds.last_row)
}

/// Number of pages needed for `total_count` rows; `0` when there are none.
pub fn page_count(total_count: i64, page_size: i64) -> i64 {
    let page_size = page_size.max(1);
    let total_count = total_count.max(0);
    let full = total_count / page_size;
    if total_count % page_size > 0 {
        full + 1
    } else {
        full
    }
}

#[cfg(test)]
mod tests {
    use super::{compute_boundaries, page_count, PageBounds, RowWindow};

    #[test]
    fn empty_result_has_zero_boundaries() {
        assert_eq!(compute_boundaries(1, 15, 0), (0, 0));
        assert_eq!(compute_boundaries(7, 15, 0), (0, 0));
        assert_eq!(PageBounds::compute(3, 15, 0).window(), None);
    }

    #[test]
    fn middle_page_covers_full_page() {
        assert_eq!(compute_boundaries(3, 15, 100), (31, 45));
    }

    #[test]
    fn page_beyond_last_clamps_to_final_partial_page() {
        let bounds = PageBounds::compute(10, 15, 100);
        assert_eq!(bounds.index, 7);
        assert_eq!((bounds.first_row, bounds.last_row), (91, 100));
        assert_eq!(
            bounds.window(),
            Some(RowWindow {
                offset: 90,
                limit: 10
            })
        );
    }

    #[test]
    fn exact_last_page_ends_at_total() {
        assert_eq!(compute_boundaries(2, 10, 20), (11, 20));
        assert_eq!(compute_boundaries(3, 10, 20), (11, 20));
    }

    #[test]
    fn non_positive_inputs_are_sanitized() {
        assert_eq!(compute_boundaries(0, 15, 100), (1, 15));
        assert_eq!(compute_boundaries(-4, 15, 100), (1, 15));
        assert_eq!(compute_boundaries(2, 0, 5), (2, 2));
        assert_eq!(PageBounds::compute(1, -3, 5).page_size, 1);
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 15), 0);
        assert_eq!(page_count(15, 15), 1);
        assert_eq!(page_count(16, 15), 2);
        assert_eq!(page_count(100, 15), 7);
    }

    #[test]
    fn boundaries_stay_ordered_and_within_total() {
        for total in 0..=60_i64 {
            for size in 1..=12_i64 {
                for index in 1..=10_i64 {
                    let (first, last) = compute_boundaries(index, size, total);
                    if total == 0 {
                        assert_eq!((first, last), (0, 0));
                        continue;
                    }
                    assert!(first >= 1, "total={total} size={size} index={index}");
                    assert!(first <= last, "total={total} size={size} index={index}");
                    assert!(last <= total, "total={total} size={size} index={index}");
                    assert!(last - first < size, "total={total} size={size} index={index}");
                }
            }
        }
    }
}
