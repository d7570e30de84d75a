// src/publish/pagination.rs
use std::future::Future;

use crate::error::Result;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub pages: u32,
    /// Next page number; `None` once the listing is exhausted.
    pub next: Option<u32>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>, page: u32) -> Self {
        Self {
            items,
            page,
            pages: page,
            next: None,
        }
    }
}

/// Walks a listing from page 1 until exhaustion, keeping the items `keep` accepts.
///
/// Stops on the first error, or when `next` fails to advance.
pub async fn collect_matching<T, F, Fut, K>(mut fetch_page: F, mut keep: K) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
    K: FnMut(&T) -> bool,
{
    let mut out = Vec::new();
    let mut page_no = 1;
    loop {
        let page = fetch_page(page_no).await?;
        out.extend(page.items.into_iter().filter(|item| keep(item)));
        match page.next {
            Some(next) if next > page_no => page_no = next,
            _ => break,
        }
    }
    Ok(out)
}
