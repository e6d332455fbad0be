//! Page slicing over a fully fetched collection.
//!
//! These are pure functions: they never clamp an out-of-range page. Callers
//! validate with [`is_valid_page`] first so invalid navigation stays observable.

use std::ops::Range;

/// Number of pages needed for `len` items, never less than 1.
pub fn total_pages(len: usize, page_size: usize) -> usize {
  if page_size == 0 {
    return 1;
  }
  len.div_ceil(page_size).max(1)
}

pub fn is_valid_page(page: usize, total_pages: usize) -> bool {
  page >= 1 && page <= total_pages
}

/// Index range of `page` (1-based) clipped to `0..len`.
pub fn page_bounds(len: usize, page: usize, page_size: usize) -> Range<usize> {
  let start = page.saturating_sub(1).saturating_mul(page_size).min(len);
  let end = start.saturating_add(page_size).min(len);
  start..end
}

/// Visible slice for `page` together with the total page count.
pub fn paginate<T>(all: &[T], page: usize, page_size: usize) -> (&[T], usize) {
  let bounds = page_bounds(all.len(), page, page_size);
  (&all[bounds], total_pages(all.len(), page_size))
}
