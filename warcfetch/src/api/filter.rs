//! Query filters for inventory requests.

/// Search constraints sent to the inventory endpoint.
///
/// Immutable value object, constructed once per run with the builder-style
/// `with_*` methods and encoded into HTTP query parameters.
///
/// # Example
///
/// ```
/// use warcfetch::QueryFilter;
///
/// let filter = QueryFilter::new()
///     .with_collection("5425")
///     .with_crawl_start_after("2017-01-01");
///
/// assert_eq!(
///     filter.to_query(),
///     vec![
///         ("collection".to_string(), "5425".to_string()),
///         ("crawl-start-after".to_string(), "2017-01-01".to_string()),
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    /// Collection identifiers; repeatable.
    collections: Vec<String>,
    /// Crawl job identifier.
    crawl: Option<String>,
    /// Exact webdata filename.
    filename: Option<String>,
    /// Capture time lower bound.
    crawl_time_after: Option<String>,
    /// Capture time upper bound.
    crawl_time_before: Option<String>,
    /// Crawl job start lower bound.
    crawl_start_after: Option<String>,
    /// Crawl job start upper bound.
    crawl_start_before: Option<String>,
    /// Requested page size.
    page_size: Option<u32>,
}

impl QueryFilter {
    /// Create an empty filter matching every file the account can see.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a collection. May be called repeatedly.
    pub fn with_collection(mut self, id: impl Into<String>) -> Self {
        self.collections.push(id.into());
        self
    }

    /// Restrict to a single crawl job.
    pub fn with_crawl(mut self, id: impl Into<String>) -> Self {
        self.crawl = Some(id.into());
        self
    }

    /// Restrict to an exact filename.
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    /// Files captured after this date.
    pub fn with_crawl_time_after(mut self, date: impl Into<String>) -> Self {
        self.crawl_time_after = Some(date.into());
        self
    }

    /// Files captured before this date.
    pub fn with_crawl_time_before(mut self, date: impl Into<String>) -> Self {
        self.crawl_time_before = Some(date.into());
        self
    }

    /// Files from crawls started after this date.
    pub fn with_crawl_start_after(mut self, date: impl Into<String>) -> Self {
        self.crawl_start_after = Some(date.into());
        self
    }

    /// Files from crawls started before this date.
    pub fn with_crawl_start_before(mut self, date: impl Into<String>) -> Self {
        self.crawl_start_before = Some(date.into());
        self
    }

    /// Ask the access point for pages of this size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Encode the filter as HTTP query pairs.
    ///
    /// Only set on the first page request; the `next` URL returned by the
    /// access point already embeds the query.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for collection in &self.collections {
            pairs.push(("collection".to_string(), collection.clone()));
        }
        if let Some(v) = &self.crawl {
            pairs.push(("crawl".to_string(), v.clone()));
        }
        if let Some(v) = &self.filename {
            pairs.push(("filename".to_string(), v.clone()));
        }
        if let Some(v) = &self.crawl_time_after {
            pairs.push(("crawl-time-after".to_string(), v.clone()));
        }
        if let Some(v) = &self.crawl_time_before {
            pairs.push(("crawl-time-before".to_string(), v.clone()));
        }
        if let Some(v) = &self.crawl_start_after {
            pairs.push(("crawl-start-after".to_string(), v.clone()));
        }
        if let Some(v) = &self.crawl_start_before {
            pairs.push(("crawl-start-before".to_string(), v.clone()));
        }
        if let Some(v) = self.page_size {
            pairs.push(("page_size".to_string(), v.to_string()));
        }
        pairs
    }
}
