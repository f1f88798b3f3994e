// src/api/pagination.rs
//! Offset pagination over `start`/`limit` listings.

use super::parser::OffsetPage;
use crate::error::AppError;

/// Fetches every page of a listing, calling `fetch_fn(start, limit)` until
/// the wiki stops announcing a next page.
pub async fn fetch_all_offsets<T, F, Fut>(
    mut fetch_fn: F,
    page_size: usize,
) -> Result<Vec<T>, AppError>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: std::future::Future<Output = Result<OffsetPage<T>, AppError>>,
{
    let mut all_items = Vec::new();
    let mut start = 0;

    loop {
        let page = fetch_fn(start, page_size).await?;
        let received = page.results.len();
        all_items.extend(page.results);

        if !page.has_more || received == 0 {
            break;
        }
        start += received;
    }

    log::debug!("Paginated listing returned {} items", all_items.len());
    Ok(all_items)
}
