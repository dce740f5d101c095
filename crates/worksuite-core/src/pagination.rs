//! Offset-based pagination over upstream list endpoints.
//!
//! The driver calls a page-fetching operation at increasing offsets until
//! the upstream is exhausted, accumulating every record before any
//! client-side filtering happens.  Page boundaries are never visible to
//! callers; they see one ordered sequence plus the pre-filter total.
//!
//! A fetch is all-or-nothing: if any page fails the whole fetch fails, so
//! callers never act on a silently truncated collection.

use std::future::Future;

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::fields;

/// One page of records as reported by the upstream.
pub struct Page {
    pub records: Vec<Value>,
    /// Whether the upstream advertised a further page (a `next` link or
    /// equivalent marker).
    pub has_next_link: bool,
}

/// The accumulated result of a full pagination run.
pub struct FetchOutcome {
    pub records: Vec<Value>,
    pub pages_fetched: usize,
}

impl FetchOutcome {
    /// Record count before any client-side filtering.
    pub fn total_retrieved(&self) -> usize {
        self.records.len()
    }

    /// Whether more than one request was needed.
    pub fn pagination_used(&self) -> bool {
        self.pages_fetched > 1
    }
}

/// Fetches every page of a list endpoint, starting at offset 0 and stepping
/// by `page_size`.
///
/// A page is the last when the upstream advertises no next link, when it is
/// shorter than `page_size`, or when it is empty (a guard against upstreams
/// that keep advertising a next link on an exhausted collection).  Requests
/// are sequential; the next offset depends on the previous page.
pub async fn fetch_all<F, Fut>(page_size: usize, mut fetch_page: F) -> Result<FetchOutcome>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Page>>,
{
    let mut records = Vec::new();
    let mut pages_fetched = 0;
    let mut offset = 0;

    loop {
        let page = fetch_page(offset).await?;
        pages_fetched += 1;
        let page_len = page.records.len();
        records.extend(page.records);
        debug!(offset, page_len, total = records.len(), "fetched page");

        if page_len == 0 || page_len < page_size || !page.has_next_link {
            break;
        }
        offset += page_size;
    }

    Ok(FetchOutcome {
        records,
        pages_fetched,
    })
}

/// Client-side filter: keeps records where the search term appears as a
/// case-insensitive substring in ANY of the given dotted-path text fields.
/// An empty term keeps everything.
pub fn filter_records(records: Vec<Value>, search_term: &str, text_fields: &[&str]) -> Vec<Value> {
    if search_term.is_empty() {
        return records;
    }
    let needle = search_term.to_lowercase();
    records
        .into_iter()
        .filter(|record| {
            text_fields.iter().any(|field| {
                fields::str_or_empty(record, field)
                    .to_lowercase()
                    .contains(&needle)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn records(count: usize, start: usize) -> Vec<Value> {
        (0..count).map(|i| json!({"id": start + i})).collect()
    }

    #[tokio::test]
    async fn full_pages_then_partial_stops_after_partial() {
        // 2 full pages of 250 then 30 records: exactly 3 requests, 530 rows.
        let calls = Rc::new(Cell::new(0));
        let calls_ref = calls.clone();
        let outcome = fetch_all(250, move |offset| {
            let calls = calls_ref.clone();
            async move {
                calls.set(calls.get() + 1);
                let len = if offset < 500 { 250 } else { 30 };
                Ok(Page {
                    records: records(len, offset),
                    has_next_link: len == 250,
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.get(), 3);
        assert_eq!(outcome.total_retrieved(), 530);
        assert_eq!(outcome.pages_fetched, 3);
        assert!(outcome.pagination_used());
    }

    #[tokio::test]
    async fn empty_first_page_makes_exactly_one_request() {
        let calls = Rc::new(Cell::new(0));
        let calls_ref = calls.clone();
        let outcome = fetch_all(250, move |_offset| {
            let calls = calls_ref.clone();
            async move {
                calls.set(calls.get() + 1);
                // Upstream lies about a next page on an empty collection.
                Ok(Page {
                    records: Vec::new(),
                    has_next_link: true,
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(outcome.total_retrieved(), 0);
        assert!(!outcome.pagination_used());
    }

    #[tokio::test]
    async fn missing_next_link_stops_even_on_full_page() {
        let outcome = fetch_all(50, |offset| async move {
            Ok(Page {
                records: records(50, offset),
                has_next_link: false,
            })
        })
        .await
        .unwrap();

        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(outcome.total_retrieved(), 50);
    }

    #[tokio::test]
    async fn mid_fetch_failure_aborts_whole_fetch() {
        let result = fetch_all(250, |offset| async move {
            if offset >= 250 {
                Err(AdapterError::UpstreamHttp {
                    status: 500,
                    message: "internal error".into(),
                })
            } else {
                Ok(Page {
                    records: records(250, offset),
                    has_next_link: true,
                })
            }
        })
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn offsets_step_by_page_size() {
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_ref = seen.clone();
        fetch_all(100, move |offset| {
            let seen = seen_ref.clone();
            async move {
                seen.borrow_mut().push(offset);
                let len = if offset < 200 { 100 } else { 1 };
                Ok(Page {
                    records: records(len, offset),
                    has_next_link: true,
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(*seen.borrow(), vec![0, 100, 200]);
    }

    #[test]
    fn empty_search_term_keeps_everything() {
        let rows = vec![json!({"name": "Alpha"}), json!({"name": "Beta"})];
        let out = filter_records(rows.clone(), "", &["name"]);
        assert_eq!(out.len(), rows.len());
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let rows = vec![
            json!({"name": "Payment Gateway", "description": ""}),
            json!({"name": "Internal", "description": "gateway maintenance"}),
            json!({"name": "Unrelated", "description": "nothing"}),
        ];
        let out = filter_records(rows, "GATEWAY", &["name", "description"]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn filter_matches_any_configured_field() {
        let rows = vec![json!({"title": "Login check", "custom_description": "smoke"})];
        let out = filter_records(rows, "smoke", &["title", "custom_description"]);
        assert_eq!(out.len(), 1);
    }
}
