use crate::models::PageResponse;

/// Slices `items` into 1-indexed pages of `page_size` (clamped to `1..=max_page_size`).
/// Out-of-range page numbers clamp to the nearest valid page; the effective page is
/// reported back in the response so the caller can adopt it.
pub fn paginate<T>(items: Vec<T>, page_size: u32, page: u32, max_page_size: u32) -> PageResponse<T> {
    let page_size = page_size.clamp(1, max_page_size.max(1));
    let size = page_size as usize;
    let total_items = items.len();
    let total_pages = total_items.div_ceil(size).max(1);
    let page = (page.max(1) as usize).min(total_pages);

    let offset = (page - 1) * size;
    let page_items: Vec<T> = items.into_iter().skip(offset).take(size).collect();
    let (range_start, range_end) = if page_items.is_empty() {
        (0, 0)
    } else {
        (offset + 1, offset + page_items.len())
    };

    PageResponse {
        items: page_items,
        page: u32::try_from(page).unwrap_or(u32::MAX),
        page_size,
        total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        total_items,
        range_start,
        range_end,
        has_previous: page > 1,
        has_next: page < total_pages,
    }
}
