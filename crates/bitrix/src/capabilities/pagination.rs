use std::future::Future;

use serde_json::Value;

use super::{report_failure, DEFAULT_PAGE_SIZE};
use crate::errors::RepositoryError;

/// Outcome of a page walk. `error` is set when the walk was cut short;
/// `items` then holds everything accumulated before the failure.
#[derive(Debug)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub pages: usize,
    pub error: Option<RepositoryError>,
}

/// Sequential offset-based page walker. Each page's offset depends on the
/// previous page, so pages are never fetched concurrently.
#[derive(Clone, Copy, Debug)]
pub struct Paginator {
    page_size: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self { page_size: page_size.max(1) }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Walks pages from `start`, handing each raw page to `process_page`.
    ///
    /// Stops when a page is empty, when a page holds fewer raw records than
    /// the page size, when `fetch` fails, or once `max_items` results have
    /// been collected (the result is then cut to exactly `max_items`). A
    /// result count that is an exact multiple of the page size costs one
    /// extra empty round trip.
    pub async fn try_paginate<T, F, Fut, P>(
        &self,
        start: usize,
        max_items: Option<usize>,
        mut fetch: F,
        mut process_page: P,
    ) -> Paged<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<Vec<Value>, RepositoryError>>,
        P: FnMut(Vec<Value>) -> Vec<T>,
    {
        let ceiling = max_items.unwrap_or(usize::MAX);
        let mut paged = Paged { items: Vec::new(), pages: 0, error: None };
        let mut offset = start;

        while paged.items.len() < ceiling {
            let page = match fetch(offset).await {
                Ok(page) => page,
                Err(error) => {
                    paged.error = Some(error);
                    break;
                }
            };
            paged.pages += 1;

            if page.is_empty() {
                break;
            }
            let raw_len = page.len();
            paged.items.extend(process_page(page));

            if raw_len < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        paged.items.truncate(ceiling);
        paged
    }

    /// Like [`Self::try_paginate`], but logs a cut-short walk and returns the
    /// partial results.
    pub async fn paginate<T, F, Fut, P>(
        &self,
        entity: &'static str,
        start: usize,
        max_items: Option<usize>,
        fetch: F,
        process_page: P,
    ) -> Vec<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<Vec<Value>, RepositoryError>>,
        P: FnMut(Vec<Value>) -> Vec<T>,
    {
        let paged = self.try_paginate(start, max_items, fetch, process_page).await;
        if let Some(error) = &paged.error {
            let subject = format!("page {} ({} items so far)", paged.pages + 1, paged.items.len());
            report_failure("bitrix.pagination.walk.failed", entity, &subject, error);
        }
        paged.items
    }

    /// Per-record variant: `processor` may reject a record by returning
    /// `None`. Rejected records still count towards the page size.
    pub async fn collect_all<T, F, Fut, P>(
        &self,
        entity: &'static str,
        max_items: Option<usize>,
        fetch: F,
        mut processor: P,
    ) -> Vec<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<Vec<Value>, RepositoryError>>,
        P: FnMut(Value) -> Option<T>,
    {
        self.paginate(entity, 0, max_items, fetch, |page| {
            page.into_iter().filter_map(&mut processor).collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::Paginator;
    use crate::client::ClientError;
    use crate::errors::RepositoryError;

    /// Serves pages of the given sizes; any request past the last page gets
    /// an empty page.
    struct PagedSource {
        sizes: Vec<usize>,
        calls: AtomicUsize,
        offsets: Mutex<Vec<usize>>,
    }

    impl PagedSource {
        fn new(sizes: &[usize]) -> Self {
            Self {
                sizes: sizes.to_vec(),
                calls: AtomicUsize::new(0),
                offsets: Mutex::new(Vec::new()),
            }
        }

        async fn fetch(&self, offset: usize) -> Result<Vec<Value>, RepositoryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.offsets.lock().expect("offsets lock").push(offset);
            let size = self.sizes.get(call).copied().unwrap_or(0);
            Ok((0..size).map(|index| json!({"ID": (offset + index).to_string()})).collect())
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn short_page_ends_the_walk() {
        let source = PagedSource::new(&[50, 50, 30]);

        let paged = Paginator::new(50)
            .try_paginate(0, None, |offset| source.fetch(offset), |page| page)
            .await;

        assert_eq!(paged.items.len(), 130);
        assert_eq!(source.calls(), 3);
        assert_eq!(*source.offsets.lock().expect("offsets lock"), vec![0, 50, 100]);
        assert!(paged.error.is_none());
    }

    #[tokio::test]
    async fn empty_page_ends_the_walk() {
        let source = PagedSource::new(&[50, 0]);

        let paged = Paginator::new(50)
            .try_paginate(0, None, |offset| source.fetch(offset), |page| page)
            .await;

        assert_eq!(paged.items.len(), 50);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn max_items_truncates_exactly() {
        let source = PagedSource::new(&[50, 50, 50]);

        let items = Paginator::new(50)
            .paginate("Deal", 0, Some(70), |offset| source.fetch(offset), |page| page)
            .await;

        assert_eq!(items.len(), 70);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn failure_mid_walk_keeps_partial_results() {
        let calls = AtomicUsize::new(0);
        let fetch = |_offset: usize| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Ok(vec![json!({}); 10])
                } else {
                    Err(RepositoryError::from(ClientError::Timeout("slow".to_string())))
                }
            }
        };

        let paged = Paginator::new(10).try_paginate(0, None, fetch, |page| page).await;

        assert_eq!(paged.items.len(), 10);
        assert_eq!(paged.pages, 1);
        assert_eq!(paged.error.map(|error| error.kind()), Some("timeout"));
    }

    #[tokio::test]
    async fn walk_starts_at_requested_offset() {
        let source = PagedSource::new(&[5]);

        let paged = Paginator::new(50)
            .try_paginate(200, None, |offset| source.fetch(offset), |page| page)
            .await;

        assert_eq!(paged.items.len(), 5);
        assert_eq!(*source.offsets.lock().expect("offsets lock"), vec![200]);
    }

    #[tokio::test]
    async fn rejected_records_still_count_towards_page_size() {
        let source = PagedSource::new(&[4, 4, 1]);

        let ids = Paginator::new(4)
            .collect_all(
                "Deal",
                None,
                |offset| source.fetch(offset),
                |record| record["ID"].as_str().filter(|id| id.ends_with('0')).map(str::to_string),
            )
            .await;

        assert_eq!(ids, vec!["0".to_string()]);
        assert_eq!(source.calls(), 3);
    }
}
