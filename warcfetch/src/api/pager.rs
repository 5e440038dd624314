//! Lazy cursor-driven page walking.

use tracing::debug;

use super::client::InventoryClient;
use super::error::FetchError;
use super::filter::QueryFilter;
use super::types::FileDescriptor;

/// Pulls descriptor pages one at a time.
///
/// Forward-only and non-restartable: each call to [`next_page`] performs
/// network I/O, and dropping the pager early fetches nothing further.
/// Enumeration ends when a page omits its `next` URL or lists no files.
///
/// [`next_page`]: DescriptorPager::next_page
#[derive(Debug)]
pub struct DescriptorPager {
    client: InventoryClient,
    filter: QueryFilter,
    cursor: Option<String>,
    started: bool,
    done: bool,
    pages_seen: u64,
}

impl DescriptorPager {
    /// Create a pager over the files matching `filter`.
    pub fn new(client: InventoryClient, filter: QueryFilter) -> Self {
        Self {
            client,
            filter,
            cursor: None,
            started: false,
            done: false,
            pages_seen: 0,
        }
    }

    /// Number of pages fetched so far.
    pub fn pages_seen(&self) -> u64 {
        self.pages_seen
    }

    /// Fetch the next page of descriptors.
    ///
    /// Returns `Ok(None)` once the sequence is exhausted. A fetch error is
    /// terminal for the pager: enumeration must not skip past a bad page.
    pub async fn next_page(&mut self) -> Result<Option<Vec<FileDescriptor>>, FetchError> {
        if self.done {
            return Ok(None);
        }

        let cursor = if self.started {
            // A started pager with no cursor has already yielded its
            // final page.
            match self.cursor.take() {
                Some(next) => Some(next),
                None => {
                    self.done = true;
                    return Ok(None);
                }
            }
        } else {
            None
        };

        let page = match self.client.fetch_page(&self.filter, cursor.as_deref()).await {
            Ok(page) => page,
            Err(err) => {
                self.done = true;
                return Err(err);
            }
        };

        self.started = true;
        self.pages_seen += 1;
        self.cursor = page.next;

        if page.files.is_empty() {
            self.done = true;
            return Ok(None);
        }
        if self.cursor.is_none() {
            self.done = true;
        }

        debug!(
            page = self.pages_seen,
            files = page.files.len(),
            has_next = !self.done,
            "inventory page decoded"
        );
        Ok(Some(page.files))
    }
}
