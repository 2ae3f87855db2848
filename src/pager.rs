//! Incremental page loader shared by the task and submission lists.

use std::future::Future;
use std::sync::Mutex;

use crate::api::ApiResult;

/// Position in a paged collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: u32,
    pub size: u32,
    pub has_more: bool,
}

impl PageCursor {
    pub fn first(size: u32) -> Self {
        Self {
            page: 1,
            size,
            has_more: true,
        }
    }
}

/// Cloned view of a pager's accumulated items and cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot<T> {
    pub items: Vec<T>,
    pub cursor: PageCursor,
}

struct PagerState<T> {
    items: Vec<T>,
    cursor: PageCursor,
}

/// Accumulates pages of a remote list.
///
/// The state mutex is only held for synchronous bookkeeping; the tokio mutex
/// acts as the loading flag that serializes fetches.
pub struct Pager<T> {
    state: Mutex<PagerState<T>>,
    busy: tokio::sync::Mutex<()>,
}

impl<T: Clone> Pager<T> {
    pub fn new(size: u32) -> Self {
        Self {
            state: Mutex::new(PagerState {
                items: Vec::new(),
                cursor: PageCursor::first(size),
            }),
            busy: tokio::sync::Mutex::new(()),
        }
    }

    /// Rewind the cursor to the first page. Accumulated items stay visible
    /// until the next successful first-page fetch replaces them.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("pager lock");
        let size = state.cursor.size;
        state.cursor = PageCursor::first(size);
    }

    pub fn snapshot(&self) -> PageSnapshot<T> {
        let state = self.state.lock().expect("pager lock");
        PageSnapshot {
            items: state.items.clone(),
            cursor: state.cursor,
        }
    }

    /// Fetch and fold in the next page.
    ///
    /// While a fetch is in flight any further call is a no-op returning the
    /// current snapshot, as is any call once the list is exhausted (until
    /// `reset`). A failed fetch leaves the state untouched so the same page
    /// is refetched on the next call.
    pub async fn load_next<F, Fut>(&self, fetch: F) -> ApiResult<PageSnapshot<T>>
    where
        F: FnOnce(u32, u32) -> Fut,
        Fut: Future<Output = ApiResult<Vec<T>>>,
    {
        let _busy = match self.busy.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Ok(self.snapshot()),
        };

        let cursor = {
            let state = self.state.lock().expect("pager lock");
            state.cursor
        };
        if !cursor.has_more {
            return Ok(self.snapshot());
        }

        let fetched = fetch(cursor.page, cursor.size).await?;

        let mut state = self.state.lock().expect("pager lock");
        if state.cursor != cursor {
            // A reset landed while the fetch was in flight; the result is stale.
            drop(state);
            return Ok(self.snapshot());
        }
        let count = fetched.len();
        if cursor.page == 1 {
            state.items = fetched;
        } else {
            state.items.extend(fetched);
        }
        state.cursor.has_more = count == cursor.size as usize;
        if count > 0 {
            state.cursor.page += 1;
        }
        drop(state);
        Ok(self.snapshot())
    }
}
