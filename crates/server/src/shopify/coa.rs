//! Certificate-of-analysis collection.
//!
//! Walks the `metaobjects` connection for the `coa` type page by page,
//! projects each node into a [`CoaRecord`], and returns the qualifying
//! records newest first.
//!
//! Pages are fetched strictly in sequence: each request needs the previous
//! page's end cursor. The result is all-or-nothing; any failure discards
//! everything collected so far.

use std::future::Future;

use async_stream::try_stream;
use coa_bridge_core::{CoaFields, CoaRecord, ShopCredential, sort_newest_first};
use futures::{Stream, TryStreamExt};
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::queries::{GetCoaMetaobjects, get_coa_metaobjects};
use super::{AdminClient, ShopifyError};

/// Metaobject type holding COA entries.
pub const COA_METAOBJECT_TYPE: &str = "coa";

/// Records requested per page.
pub const PAGE_SIZE: i64 = 50;

/// Upstream sort key; combined with `reverse: true` for last-updated first.
pub const SORT_KEY: &str = "updated_at";

/// Default ceiling on pages fetched per collection.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// Errors returned by the collector.
#[derive(Debug, Error)]
pub enum CoaError {
    /// Credential missing or blank; raised before any request is made.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Network failure or a response that could not be read as GraphQL.
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream reported query-level errors.
    #[error("query error: {0}")]
    Query(String),

    /// Upstream kept reporting more pages past the configured ceiling.
    #[error("pagination limit exceeded after {max_pages} pages")]
    PaginationLimitExceeded {
        /// Configured page ceiling.
        max_pages: usize,
    },
}

impl From<ShopifyError> for CoaError {
    fn from(err: ShopifyError) -> Self {
        match err {
            ShopifyError::GraphQL(errors) => Self::Query(
                errors
                    .into_iter()
                    .next()
                    .map_or_else(|| "unknown GraphQL error".to_string(), |e| e.message),
            ),
            // A token rejected upstream is a non-2xx response like any other
            other @ (ShopifyError::Http(_)
            | ShopifyError::Status { .. }
            | ShopifyError::Parse(_)
            | ShopifyError::RateLimited(_)
            | ShopifyError::Unauthorized(_)
            | ShopifyError::OAuth(_)) => Self::Transport(other.to_string()),
        }
    }
}

/// One fetched page: projected nodes in upstream order plus continuation.
#[derive(Debug, Clone, Default)]
pub struct CoaPage {
    pub records: Vec<CoaFields>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Something that can fetch one page of COA metaobjects.
///
/// Implemented by [`AdminClient`]; tests substitute a scripted source.
pub trait CoaPageSource {
    /// Fetch the page after `after` (`None` for the first page).
    fn fetch_page(
        &self,
        credential: &ShopCredential,
        after: Option<&str>,
    ) -> impl Future<Output = Result<CoaPage, CoaError>> + Send;
}

impl CoaPageSource for AdminClient {
    #[instrument(skip(self, credential), fields(shop = %credential.shop))]
    async fn fetch_page(
        &self,
        credential: &ShopCredential,
        after: Option<&str>,
    ) -> Result<CoaPage, CoaError> {
        let variables = get_coa_metaobjects::Variables {
            type_: COA_METAOBJECT_TYPE.to_string(),
            first: PAGE_SIZE,
            after: after.map(String::from),
            sort_key: Some(SORT_KEY.to_string()),
            reverse: Some(true),
        };

        let data = self
            .execute::<GetCoaMetaobjects>(credential, variables)
            .await?;

        let connection = data.metaobjects;
        Ok(CoaPage {
            records: connection
                .edges
                .into_iter()
                .map(|edge| project(edge.node))
                .collect(),
            has_next_page: connection.page_info.has_next_page,
            end_cursor: connection.page_info.end_cursor,
        })
    }
}

/// Flatten a node's field wrappers into plain optional values.
fn project(node: get_coa_metaobjects::CoaNode) -> CoaFields {
    use get_coa_metaobjects::{Reference, ReferenceField, ValueField};

    let value = |field: Option<ValueField>| field.and_then(|f| f.value);

    let product = node.product.and_then(|f| match f.reference {
        Some(Reference::Product { title }) => Some(title),
        _ => None,
    });

    let pdf_link = node.pdf_link.and_then(|f: ReferenceField| match f.reference {
        Some(Reference::GenericFile { url }) => url,
        // url-typed fields carry the link directly
        _ => f.value.filter(|v| is_web_url(v)),
    });

    CoaFields {
        id: node.id,
        date: value(node.date),
        product,
        batch_number: value(node.batch_number),
        pdf_link,
        best_by_date: value(node.best_by_date),
    }
}

fn is_web_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Pagination state between fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageState {
    First,
    After(String),
    Done,
}

impl PageState {
    fn after(page: &CoaPage) -> Result<Self, CoaError> {
        if !page.has_next_page {
            return Ok(Self::Done);
        }

        page.end_cursor
            .clone()
            .map(Self::After)
            .ok_or_else(|| CoaError::Query("hasNextPage is true but endCursor is null".to_string()))
    }
}

/// Collects COA records for a shop.
pub struct CoaCollector<'a, S> {
    source: &'a S,
    max_pages: usize,
}

impl<'a, S: CoaPageSource> CoaCollector<'a, S> {
    /// Create a collector with the default page ceiling.
    #[must_use]
    pub const fn new(source: &'a S) -> Self {
        Self {
            source,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Override the page ceiling (at least one page is always allowed).
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Lazily fetch pages until upstream reports no next page.
    ///
    /// Nothing is requested until the stream is polled. The stream ends with
    /// an error (and fetches nothing further) on the first failure.
    pub fn pages<'s>(
        &'s self,
        credential: &'s ShopCredential,
    ) -> impl Stream<Item = Result<CoaPage, CoaError>> + 's {
        try_stream! {
            ensure_token(credential)?;

            let mut state = PageState::First;
            let mut fetched = 0usize;

            loop {
                let cursor = match state {
                    PageState::First => None,
                    PageState::After(cursor) => Some(cursor),
                    PageState::Done => break,
                };

                ensure_within_limit(fetched, self.max_pages)?;

                let page = self
                    .source
                    .fetch_page(credential, cursor.as_deref())
                    .await?;
                fetched += 1;

                debug!(
                    page = fetched,
                    records = page.records.len(),
                    has_next_page = page.has_next_page,
                    "Fetched COA page"
                );

                state = PageState::after(&page)?;
                yield page;
            }
        }
    }

    /// Collect every qualifying record, newest first.
    ///
    /// Records without a date or product, or with an unparseable date, are
    /// dropped silently.
    ///
    /// # Errors
    ///
    /// - `Authentication` for a blank token (no request is made)
    /// - `Transport` / `Query` as reported by the page source, including a
    ///   token the shop has revoked (`Transport`)
    /// - `PaginationLimitExceeded` when the ceiling is reached
    #[instrument(skip(self, credential), fields(shop = %credential.shop))]
    pub async fn collect(&self, credential: &ShopCredential) -> Result<Vec<CoaRecord>, CoaError> {
        let mut records = Vec::new();
        let mut dropped = 0usize;

        let mut pages = std::pin::pin!(self.pages(credential));
        while let Some(page) = pages.try_next().await? {
            for fields in page.records {
                match fields.into_dated_record() {
                    Some(record) => records.push(record),
                    None => dropped += 1,
                }
            }
        }

        if dropped > 0 {
            debug!(dropped, "Skipped COA entries missing date or product");
        }
        info!(count = records.len(), "Collected COA records");

        Ok(sort_newest_first(records))
    }
}

fn ensure_token(credential: &ShopCredential) -> Result<(), CoaError> {
    if credential.access_token.is_blank() {
        return Err(CoaError::Authentication(format!(
            "missing access token for {}",
            credential.shop
        )));
    }
    Ok(())
}

fn ensure_within_limit(fetched: usize, max_pages: usize) -> Result<(), CoaError> {
    if fetched >= max_pages {
        return Err(CoaError::PaginationLimitExceeded { max_pages });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use coa_bridge_core::{AccessToken, ShopDomain};
    use futures::StreamExt;

    use super::*;

    /// Page source that replays a fixed script and records each cursor.
    #[derive(Default)]
    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<CoaPage, CoaError>>>,
        requests: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<CoaPage, CoaError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Option<String>> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl CoaPageSource for ScriptedSource {
        async fn fetch_page(
            &self,
            _credential: &ShopCredential,
            after: Option<&str>,
        ) -> Result<CoaPage, CoaError> {
            self.requests.lock().unwrap().push(after.map(String::from));
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CoaError::Transport("script exhausted".to_string())))
        }
    }

    /// Source whose upstream always claims another page exists.
    #[derive(Default)]
    struct EndlessSource {
        calls: AtomicUsize,
    }

    impl CoaPageSource for EndlessSource {
        async fn fetch_page(
            &self,
            _credential: &ShopCredential,
            after: Option<&str>,
        ) -> Result<CoaPage, CoaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = after.map_or(0, |c| c.parse::<usize>().unwrap());
            Ok(page(vec![], Some(&(n + 1).to_string())))
        }
    }

    fn credential(token: &str) -> ShopCredential {
        ShopCredential::new(
            ShopDomain::parse("oil-co.myshopify.com").unwrap(),
            AccessToken::new(token),
        )
    }

    fn coa(id: &str, date: Option<&str>, product: Option<&str>) -> CoaFields {
        CoaFields {
            id: id.to_string(),
            date: date.map(String::from),
            product: product.map(String::from),
            ..CoaFields::default()
        }
    }

    /// A page; `next` is the end cursor when another page follows.
    fn page(records: Vec<CoaFields>, next: Option<&str>) -> CoaPage {
        CoaPage {
            records,
            has_next_page: next.is_some(),
            end_cursor: next.map(String::from),
        }
    }

    fn ids(records: &[CoaRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_single_page_sorted_newest_first() {
        let source = ScriptedSource::new(vec![Ok(page(
            vec![
                coa("a", Some("2024-06-01"), Some("Oil A")),
                coa("b", Some("2024-06-03"), Some("Oil B")),
            ],
            None,
        ))]);

        let records = CoaCollector::new(&source)
            .collect(&credential("shpat_x"))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].product, "Oil B");
        assert_eq!(records[0].date, "2024-06-03");
        assert_eq!(records[1].product, "Oil A");
    }

    #[tokio::test]
    async fn test_records_missing_required_fields_are_dropped() {
        let source = ScriptedSource::new(vec![Ok(page(
            vec![
                coa("keep", Some("2024-01-02"), Some("Oil A")),
                coa("no-product", Some("2024-01-01"), None),
                coa("no-date", None, Some("Oil B")),
                coa("bad-date", Some("someday"), Some("Oil C")),
            ],
            None,
        ))]);

        let records = CoaCollector::new(&source)
            .collect(&credential("shpat_x"))
            .await
            .unwrap();

        assert_eq!(ids(&records), ["keep"]);
    }

    #[tokio::test]
    async fn test_issues_one_request_per_page_following_cursors() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![coa("a", Some("2024-01-01"), Some("A"))], Some("c1"))),
            Ok(page(vec![coa("b", Some("2024-02-01"), Some("B"))], Some("c2"))),
            Ok(page(vec![coa("c", Some("2024-03-01"), Some("C"))], None)),
        ]);

        let records = CoaCollector::new(&source)
            .collect(&credential("shpat_x"))
            .await
            .unwrap();

        assert_eq!(
            source.requests(),
            [None, Some("c1".to_string()), Some("c2".to_string())]
        );
        assert_eq!(ids(&records), ["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_empty_page_with_next_page_continues() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![], Some("c1"))),
            Ok(page(vec![coa("a", Some("2024-01-01"), Some("A"))], None)),
        ]);

        let records = CoaCollector::new(&source)
            .collect(&credential("shpat_x"))
            .await
            .unwrap();

        assert_eq!(source.requests().len(), 2);
        assert_eq!(ids(&records), ["a"]);
    }

    #[tokio::test]
    async fn test_no_records_is_empty_not_error() {
        let source = ScriptedSource::new(vec![Ok(page(vec![], None))]);

        let records = CoaCollector::new(&source)
            .collect(&credential("shpat_x"))
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_token_fails_without_requests() {
        let source = ScriptedSource::new(vec![Ok(page(vec![], None))]);

        for token in ["", "   "] {
            let err = CoaCollector::new(&source)
                .collect(&credential(token))
                .await
                .unwrap_err();
            assert!(matches!(err, CoaError::Authentication(_)));
        }

        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn test_query_error_on_middle_page_aborts() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![coa("a", Some("2024-01-01"), Some("A"))], Some("c1"))),
            Err(CoaError::Query("Throttled".to_string())),
            Ok(page(vec![coa("c", Some("2024-03-01"), Some("C"))], None)),
        ]);

        let err = CoaCollector::new(&source)
            .collect(&credential("shpat_x"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoaError::Query(ref msg) if msg == "Throttled"));
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_propagates_without_retry() {
        let source = ScriptedSource::new(vec![Err(CoaError::Transport("reset".to_string()))]);

        let err = CoaCollector::new(&source)
            .collect(&credential("shpat_x"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoaError::Transport(_)));
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_equal_dates_keep_traversal_order_across_pages() {
        let source = ScriptedSource::new(vec![
            Ok(page(
                vec![
                    coa("p1-a", Some("2024-05-01"), Some("A")),
                    coa("p1-b", Some("2024-04-01"), Some("B")),
                ],
                Some("c1"),
            )),
            Ok(page(
                vec![
                    coa("p2-a", Some("2024-05-01"), Some("C")),
                    coa("p2-b", Some("2024-06-01"), Some("D")),
                ],
                None,
            )),
        ]);

        let records = CoaCollector::new(&source)
            .collect(&credential("shpat_x"))
            .await
            .unwrap();

        assert_eq!(ids(&records), ["p2-b", "p1-a", "p2-a", "p1-b"]);
    }

    #[tokio::test]
    async fn test_page_ceiling_stops_endless_upstream() {
        let source = EndlessSource::default();

        let err = CoaCollector::new(&source)
            .with_max_pages(3)
            .collect(&credential("shpat_x"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoaError::PaginationLimitExceeded { max_pages: 3 }
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_page_ceiling_not_hit_when_upstream_finishes_exactly() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![], Some("c1"))),
            Ok(page(vec![coa("a", Some("2024-01-01"), Some("A"))], None)),
        ]);

        let records = CoaCollector::new(&source)
            .with_max_pages(2)
            .collect(&credential("shpat_x"))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_next_page_without_cursor_is_query_error() {
        let source = ScriptedSource::new(vec![Ok(CoaPage {
            records: vec![],
            has_next_page: true,
            end_cursor: None,
        })]);

        let err = CoaCollector::new(&source)
            .collect(&credential("shpat_x"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoaError::Query(_)));
    }

    #[tokio::test]
    async fn test_pages_stream_is_lazy() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![], Some("c1"))),
            Ok(page(vec![], None)),
        ]);
        let collector = CoaCollector::new(&source);
        let credential = credential("shpat_x");

        let mut pages = std::pin::pin!(collector.pages(&credential));
        assert!(source.requests().is_empty());

        let first = pages.next().await.unwrap().unwrap();
        assert!(first.has_next_page);
        assert_eq!(source.requests().len(), 1);

        assert!(pages.next().await.unwrap().is_ok());
        assert!(pages.next().await.is_none());
        assert_eq!(source.requests().len(), 2);
    }

    #[test]
    fn test_project_flattens_field_wrappers() {
        let node: get_coa_metaobjects::CoaNode = serde_json::from_str(
            r#"{
                "id": "gid://shopify/Metaobject/7",
                "date": { "value": "2024-06-03" },
                "product": { "reference": { "__typename": "Product", "title": "Oil B" } },
                "batchNumber": { "value": "LOT-42" },
                "pdfLink": { "value": "gid://shopify/GenericFile/1", "reference": { "__typename": "GenericFile", "url": "https://cdn.shopify.com/b.pdf" } },
                "bestByDate": null
            }"#,
        )
        .unwrap();

        let fields = project(node);
        assert_eq!(fields.id, "gid://shopify/Metaobject/7");
        assert_eq!(fields.date.as_deref(), Some("2024-06-03"));
        assert_eq!(fields.product.as_deref(), Some("Oil B"));
        assert_eq!(fields.batch_number.as_deref(), Some("LOT-42"));
        assert_eq!(fields.pdf_link.as_deref(), Some("https://cdn.shopify.com/b.pdf"));
        assert_eq!(fields.best_by_date, None);
    }

    #[test]
    fn test_project_missing_wrappers_yield_none() {
        let node: get_coa_metaobjects::CoaNode =
            serde_json::from_str(r#"{ "id": "gid://shopify/Metaobject/8" }"#).unwrap();

        let fields = project(node);
        assert_eq!(fields.date, None);
        assert_eq!(fields.product, None);
        assert_eq!(fields.pdf_link, None);
    }

    #[test]
    fn test_project_url_field_fallback() {
        let node: get_coa_metaobjects::CoaNode = serde_json::from_str(
            r#"{
                "id": "gid://shopify/Metaobject/9",
                "pdfLink": { "value": "https://lab.example/coa.pdf", "reference": null }
            }"#,
        )
        .unwrap();

        assert_eq!(
            project(node).pdf_link.as_deref(),
            Some("https://lab.example/coa.pdf")
        );
    }

    #[test]
    fn test_project_url_field_accepts_plain_http() {
        let node: get_coa_metaobjects::CoaNode = serde_json::from_str(
            r#"{
                "id": "gid://shopify/Metaobject/10",
                "pdfLink": { "value": "http://lab.example/legacy/coa.pdf" }
            }"#,
        )
        .unwrap();

        assert_eq!(
            project(node).pdf_link.as_deref(),
            Some("http://lab.example/legacy/coa.pdf")
        );
    }

    #[test]
    fn test_project_url_field_ignores_non_links() {
        for value in ["gid://shopify/GenericFile/1", "coa.pdf", "ftp://lab.example/coa.pdf"] {
            let json = format!(
                r#"{{ "id": "gid://shopify/Metaobject/11", "pdfLink": {{ "value": "{value}" }} }}"#
            );
            let node: get_coa_metaobjects::CoaNode = serde_json::from_str(&json).unwrap();

            assert_eq!(project(node).pdf_link, None, "{value}");
        }
    }

    #[test]
    fn test_shopify_error_classification() {
        assert!(matches!(
            CoaError::from(ShopifyError::Unauthorized("bad token".to_string())),
            CoaError::Transport(_)
        ));
        assert!(matches!(
            CoaError::from(ShopifyError::RateLimited(2)),
            CoaError::Transport(_)
        ));
        assert!(matches!(
            CoaError::from(ShopifyError::Status {
                status: 502,
                body: String::new()
            }),
            CoaError::Transport(_)
        ));

        let err = CoaError::from(ShopifyError::GraphQL(vec![
            crate::shopify::GraphQLError {
                message: "first".to_string(),
                locations: vec![],
                path: vec![],
            },
            crate::shopify::GraphQLError {
                message: "second".to_string(),
                locations: vec![],
                path: vec![],
            },
        ]));
        assert!(matches!(err, CoaError::Query(ref msg) if msg == "first"));
    }
}
