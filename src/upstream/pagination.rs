//! Pagination scheme detection and page walking.
//!
//! Upstreams disagree on how pages are requested. Rather than hardcoding
//! one dialect per service, the walker tries a list of parameter schemes
//! in order; an upstream that rejects unknown parameters with a 4xx/5xx
//! fails that scheme and the next one is tried. If no scheme yields any
//! item, one unpaginated GET is issued as a last resort.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;
use crate::upstream::envelope::{extract_items, PageMeta};
use crate::upstream::transport::{HttpGet, Pairs};

/// How pages are parameterized: `?{page_param}=N&{size_param}=S`, with
/// the first page numbered `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationScheme {
    pub page_param: &'static str,
    pub size_param: &'static str,
    pub start: u32,
}

impl PaginationScheme {
    pub const fn new(page_param: &'static str, size_param: &'static str, start: u32) -> Self {
        Self {
            page_param,
            size_param,
            start,
        }
    }
}

/// Schemes tried in priority order.
pub const DEFAULT_SCHEMES: &[PaginationScheme] = &[
    PaginationScheme::new("page", "size", 0),
    PaginationScheme::new("page", "pageSize", 0),
    PaginationScheme::new("pageNumber", "pageSize", 1),
    PaginationScheme::new("skip", "take", 0),
];

/// One paged GET target: URL, headers and caller filters.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub url: String,
    pub headers: Pairs,
    /// Merged into every request, paged or not (e.g. `teamId`, `from`, `to`).
    pub extra_query: Pairs,
}

impl PageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_headers(mut self, headers: Pairs) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.extra_query.push((name.to_string(), value.into()));
        self
    }
}

/// Result of walking one scheme.
#[derive(Debug)]
enum SchemeOutcome {
    /// The scheme produced items and reached a termination condition.
    Complete(Vec<Value>),
    /// The scheme is not usable against this upstream.
    Rejected { status: Option<u16> },
    /// The upstream answered 404 to a paged request and flat fetch was requested.
    NotFound,
}

pub struct PageWalker {
    http: Arc<dyn HttpGet>,
    schemes: Vec<PaginationScheme>,
    page_size: u32,
    max_pages: u32,
    flat_fetch_on_not_found: bool,
}

impl PageWalker {
    pub fn new(http: Arc<dyn HttpGet>, config: &UpstreamConfig) -> Self {
        Self {
            http,
            schemes: DEFAULT_SCHEMES.to_vec(),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
            flat_fetch_on_not_found: config.flat_fetch_on_not_found,
        }
    }

    pub fn with_schemes(mut self, schemes: Vec<PaginationScheme>) -> Self {
        self.schemes = schemes;
        self
    }

    /// Fetch every item behind `request`, concatenating pages in response order.
    ///
    /// Transport failures propagate. HTTP error statuses only fail the
    /// walk when the final unpaginated fetch also returns one.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn fetch_all(&self, request: &PageRequest) -> Result<Vec<Value>, UpstreamError> {
        for scheme in &self.schemes {
            match self.walk_scheme(request, scheme).await? {
                SchemeOutcome::Complete(items) => {
                    info!(
                        page_param = scheme.page_param,
                        size_param = scheme.size_param,
                        count = items.len(),
                        "Pagination complete"
                    );
                    return Ok(items);
                }
                SchemeOutcome::Rejected { status } => {
                    debug!(
                        page_param = scheme.page_param,
                        size_param = scheme.size_param,
                        ?status,
                        "Pagination scheme rejected"
                    );
                }
                SchemeOutcome::NotFound => {
                    info!("Paged request returned 404, retrying without pagination");
                    break;
                }
            }
        }

        self.fetch_flat(request).await
    }

    /// [`fetch_all`](Self::fetch_all) bounded by a deadline. On expiry the
    /// walk is dropped and any pages gathered so far are discarded.
    pub async fn fetch_all_within(
        &self,
        request: &PageRequest,
        deadline: Duration,
    ) -> Result<Vec<Value>, UpstreamError> {
        match tokio::time::timeout(deadline, self.fetch_all(request)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Cancelled {
                url: request.url.clone(),
                after: deadline,
            }),
        }
    }

    async fn walk_scheme(
        &self,
        request: &PageRequest,
        scheme: &PaginationScheme,
    ) -> Result<SchemeOutcome, UpstreamError> {
        let mut acc: Vec<Value> = Vec::new();
        let mut page = scheme.start;
        let mut pages_fetched = 0u32;

        loop {
            let mut query: Pairs = vec![
                (scheme.page_param.to_string(), page.to_string()),
                (scheme.size_param.to_string(), self.page_size.to_string()),
            ];
            query.extend(request.extra_query.iter().cloned());

            let response = self.http.get(&request.url, &request.headers, &query).await?;
            if response.is_error() {
                if response.status == 404 && self.flat_fetch_on_not_found {
                    return Ok(SchemeOutcome::NotFound);
                }
                if pages_fetched > 0 {
                    warn!(
                        page,
                        status = response.status,
                        discarded = acc.len(),
                        "Upstream rejected a later page, abandoning scheme"
                    );
                }
                return Ok(SchemeOutcome::Rejected {
                    status: Some(response.status),
                });
            }

            let body = response.json();
            let items = extract_items(&body);
            pages_fetched += 1;

            if items.is_empty() {
                if acc.is_empty() {
                    return Ok(SchemeOutcome::Rejected { status: None });
                }
                return Ok(SchemeOutcome::Complete(acc));
            }

            let page_len = items.len();
            acc.extend(items);

            let meta = PageMeta::from_envelope(&body);
            if meta.is_final_page()
                || meta
                    .total_count
                    .is_some_and(|total| acc.len() as i64 >= total)
                || (page_len as u64) < u64::from(self.page_size)
            {
                return Ok(SchemeOutcome::Complete(acc));
            }

            if pages_fetched >= self.max_pages {
                warn!(
                    pages_fetched,
                    count = acc.len(),
                    "Page ceiling reached, stopping pagination"
                );
                return Ok(SchemeOutcome::Complete(acc));
            }

            page += 1;
        }
    }

    async fn fetch_flat(&self, request: &PageRequest) -> Result<Vec<Value>, UpstreamError> {
        let response = self
            .http
            .get(&request.url, &request.headers, &request.extra_query)
            .await?;

        if response.is_error() {
            return Err(response.into_error());
        }

        let items = extract_items(&response.json());
        info!(count = items.len(), "Unpaginated fallback fetch");
        Ok(items)
    }
}
