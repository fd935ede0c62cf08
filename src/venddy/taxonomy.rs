use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::venddy::client::VenddyClient;
use crate::venddy::types::{Envelope, TaxonomyEntry};

/// Upper bound on pages fetched for a single table.
const MAX_PAGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxonomyKind {
    Category,
    Class,
    Subcategory,
    Type,
}

impl TaxonomyKind {
    pub const ALL: [TaxonomyKind; 4] = [
        TaxonomyKind::Category,
        TaxonomyKind::Class,
        TaxonomyKind::Subcategory,
        TaxonomyKind::Type,
    ];

    pub fn path(self) -> &'static str {
        match self {
            TaxonomyKind::Category => "category",
            TaxonomyKind::Class => "class",
            TaxonomyKind::Subcategory => "subcategory",
            TaxonomyKind::Type => "solutionType",
        }
    }

    /// Pages always requested, `None` being the server's default cursor.
    /// The subcategory table is known to span more than one page.
    pub fn fixed_pages(self) -> &'static [Option<u64>] {
        match self {
            TaxonomyKind::Subcategory => &[None, Some(100)],
            _ => &[None],
        }
    }
}

/// id -> display name for one taxonomy table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxonomyTable {
    names: HashMap<String, String>,
}

impl TaxonomyTable {
    pub fn merge(&mut self, entries: impl IntoIterator<Item = TaxonomyEntry>) {
        for entry in entries {
            if entry.id.is_empty() {
                debug!(name = %entry.name, "taxonomy row without id skipped");
                continue;
            }
            // Duplicate ids are not expected; last one wins.
            self.names.insert(entry.id, entry.name);
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<TaxonomyEntry> for TaxonomyTable {
    fn from_iter<I: IntoIterator<Item = TaxonomyEntry>>(iter: I) -> Self {
        let mut table = TaxonomyTable::default();
        table.merge(iter);
        table
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxonomyIndex {
    pub categories: TaxonomyTable,
    pub classes: TaxonomyTable,
    pub subcategories: TaxonomyTable,
    pub types: TaxonomyTable,
    /// Tables that lost at least one page to a fetch or parse failure.
    pub degraded: Vec<TaxonomyKind>,
}

impl TaxonomyIndex {
    pub fn table(&self, kind: TaxonomyKind) -> &TaxonomyTable {
        match kind {
            TaxonomyKind::Category => &self.categories,
            TaxonomyKind::Class => &self.classes,
            TaxonomyKind::Subcategory => &self.subcategories,
            TaxonomyKind::Type => &self.types,
        }
    }

    fn table_mut(&mut self, kind: TaxonomyKind) -> &mut TaxonomyTable {
        match kind {
            TaxonomyKind::Category => &mut self.categories,
            TaxonomyKind::Class => &mut self.classes,
            TaxonomyKind::Subcategory => &mut self.subcategories,
            TaxonomyKind::Type => &mut self.types,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }
}

/// Result of walking every page of one table.
#[derive(Debug)]
struct FetchedTable {
    kind: TaxonomyKind,
    table: TaxonomyTable,
    failed: bool,
}

impl VenddyClient {
    /// Fetch all four taxonomy tables concurrently.
    ///
    /// A table whose fetch or parse fails is logged and left empty (or
    /// partial); the index is always returned.
    pub async fn resolve_taxonomy(&self, cancel: &CancellationToken) -> TaxonomyIndex {
        let (categories, classes, subcategories, types) = tokio::join!(
            self.fetch_taxonomy_table(TaxonomyKind::Category, cancel),
            self.fetch_taxonomy_table(TaxonomyKind::Class, cancel),
            self.fetch_taxonomy_table(TaxonomyKind::Subcategory, cancel),
            self.fetch_taxonomy_table(TaxonomyKind::Type, cancel),
        );

        let mut index = TaxonomyIndex::default();
        for fetched in [categories, classes, subcategories, types] {
            if fetched.failed {
                index.degraded.push(fetched.kind);
            }
            *index.table_mut(fetched.kind) = fetched.table;
        }
        info!(
            categories = index.categories.len(),
            classes = index.classes.len(),
            subcategories = index.subcategories.len(),
            types = index.types.len(),
            degraded = ?index.degraded,
            "taxonomy resolved"
        );
        index
    }

    async fn fetch_taxonomy_table(
        &self,
        kind: TaxonomyKind,
        cancel: &CancellationToken,
    ) -> FetchedTable {
        let url = self.taxonomy_endpoint(kind.path());
        let mut table = TaxonomyTable::default();
        let mut failed = false;
        let mut seen: HashSet<Option<u64>> = HashSet::new();
        let mut queue: Vec<Option<u64>> = kind.fixed_pages().to_vec();
        queue.reverse();

        while let Some(cursor) = queue.pop() {
            if seen.len() >= MAX_PAGES {
                warn!(table = kind.path(), "taxonomy page cap reached");
                break;
            }
            if !seen.insert(cursor) {
                continue;
            }

            let params: Vec<(&str, String)> = cursor
                .map(|c| vec![("cursor", c.to_string())])
                .unwrap_or_default();
            match self
                .get_json::<Envelope<TaxonomyEntry>, _>(&url, &params, cancel)
                .await
            {
                Ok(env) => {
                    let body = env.response;
                    let fetched = body.results.len() as u64;
                    debug!(table = kind.path(), ?cursor, fetched, remaining = body.remaining, "taxonomy page");
                    table.merge(body.results);

                    // Keep walking while the server reports more rows, unless
                    // a fixed page is still pending.
                    if queue.is_empty() && body.remaining > 0 && fetched > 0 {
                        let start = cursor.unwrap_or(body.cursor.max(0) as u64);
                        queue.push(Some(start + fetched));
                    }
                }
                Err(e) => {
                    warn!(table = kind.path(), ?cursor, error = %e, "taxonomy fetch failed; continuing without it");
                    failed = true;
                }
            }
        }

        FetchedTable {
            kind,
            table,
            failed,
        }
    }
}

/// Reuses a resolved index for `ttl`. A zero ttl disables reuse.
#[derive(Debug)]
pub struct TaxonomyCache {
    ttl: Duration,
    slot: Mutex<Option<(Instant, Arc<TaxonomyIndex>)>>,
}

impl TaxonomyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub async fn get_or_resolve(
        &self,
        client: &VenddyClient,
        cancel: &CancellationToken,
    ) -> Arc<TaxonomyIndex> {
        if self.ttl.is_zero() {
            return Arc::new(client.resolve_taxonomy(cancel).await);
        }

        let mut slot = self.slot.lock().await;
        if let Some((at, index)) = slot.as_ref()
            && at.elapsed() < self.ttl
        {
            debug!("taxonomy cache hit");
            return index.clone();
        }

        let index = Arc::new(client.resolve_taxonomy(cancel).await);
        // Partial tables are served once but not kept.
        if index.is_complete() {
            *slot = Some((Instant::now(), index.clone()));
        } else {
            *slot = None;
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    fn entries(pairs: &[(&str, &str)]) -> serde_json::Value {
        let results: Vec<_> = pairs
            .iter()
            .map(|(id, name)| serde_json::json!({"_id": id, "Name": name}))
            .collect();
        let count = results.len();
        serde_json::json!({"response": {"results": results, "Cursor": 0, "Remaining": 0, "Count": count}})
    }

    fn client_for(server: &Server) -> VenddyClient {
        let base = server.url_str("/obj");
        VenddyClient::new(
            base.clone(),
            base,
            HttpConfig {
                max_retries: 0,
                ..HttpConfig::default()
            },
        )
        .unwrap()
    }

    fn expect_table(server: &Server, path: &'static str, body: serde_json::Value) {
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", path),
                request::query(url_decoded(not(contains(key("cursor"))))),
            ])
            .respond_with(json_encoded(body)),
        );
    }

    #[test]
    fn table_merge_last_duplicate_wins() {
        let mut table: TaxonomyTable = vec![TaxonomyEntry {
            id: "a".into(),
            name: "Alpha".into(),
        }]
        .into_iter()
        .collect();
        table.merge(vec![
            TaxonomyEntry {
                id: "b".into(),
                name: "Beta".into(),
            },
            TaxonomyEntry {
                id: "a".into(),
                name: "Alpha 2".into(),
            },
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("a"), Some("Alpha 2"));
        assert_eq!(table.get("zzz"), None);
    }

    #[tokio::test]
    async fn resolve_merges_subcategory_pages() {
        let server = Server::run();
        expect_table(&server, "/obj/category", entries(&[("c1", "Cat One")]));
        expect_table(&server, "/obj/class", entries(&[("k1", "Class One")]));
        expect_table(&server, "/obj/solutionType", entries(&[("t1", "SaaS")]));
        expect_table(&server, "/obj/subcategory", entries(&[("s1", "Sub One")]));
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/obj/subcategory"),
                request::query(url_decoded(contains(("cursor", "100")))),
            ])
            .respond_with(json_encoded(entries(&[("s101", "Sub 101")]))),
        );

        let index = client_for(&server)
            .resolve_taxonomy(&CancellationToken::new())
            .await;
        assert!(index.is_complete());
        assert_eq!(index.categories.get("c1"), Some("Cat One"));
        assert_eq!(index.classes.get("k1"), Some("Class One"));
        assert_eq!(index.types.get("t1"), Some("SaaS"));
        assert_eq!(index.subcategories.len(), 2);
        assert_eq!(index.subcategories.get("s101"), Some("Sub 101"));
    }

    #[tokio::test]
    async fn failed_table_is_empty_and_others_survive() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/obj/category"))
                .respond_with(status_code(500)),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/obj/class"))
                .respond_with(status_code(200).body("not json")),
        );
        expect_table(&server, "/obj/solutionType", entries(&[("t1", "SaaS")]));
        server.expect(
            Expectation::matching(request::method_path("GET", "/obj/subcategory"))
                .times(2)
                .respond_with(json_encoded(entries(&[("s1", "Sub One")]))),
        );

        let index = client_for(&server)
            .resolve_taxonomy(&CancellationToken::new())
            .await;
        assert!(index.categories.is_empty());
        assert!(index.classes.is_empty());
        assert_eq!(index.types.get("t1"), Some("SaaS"));
        assert_eq!(index.subcategories.get("s1"), Some("Sub One"));
        assert!(index.degraded.contains(&TaxonomyKind::Category));
        assert!(index.degraded.contains(&TaxonomyKind::Class));
        assert!(!index.is_complete());
    }

    #[tokio::test]
    async fn row_without_id_is_skipped_not_fatal() {
        let server = Server::run();
        expect_table(
            &server,
            "/obj/class",
            serde_json::json!({"response": {
                "results": [{"Name": "Orphan"}, {"_id": "k1", "Name": "Class One"}],
                "Cursor": 0, "Remaining": 0, "Count": 2
            }}),
        );

        let fetched = client_for(&server)
            .fetch_taxonomy_table(TaxonomyKind::Class, &CancellationToken::new())
            .await;
        assert!(!fetched.failed);
        assert_eq!(fetched.table.len(), 1);
        assert_eq!(fetched.table.get("k1"), Some("Class One"));
        assert_eq!(fetched.table.get(""), None);
    }

    #[tokio::test]
    async fn table_follows_remaining_past_first_page() {
        let server = Server::run();
        expect_table(
            &server,
            "/obj/category",
            serde_json::json!({"response": {
                "results": [{"_id": "c1", "Name": "One"}, {"_id": "c2", "Name": "Two"}],
                "Cursor": 0, "Remaining": 1, "Count": 2
            }}),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/obj/category"),
                request::query(url_decoded(contains(("cursor", "2")))),
            ])
            .respond_with(json_encoded(serde_json::json!({"response": {
                "results": [{"_id": "c3", "Name": "Three"}],
                "Cursor": 2, "Remaining": 0, "Count": 1
            }}))),
        );

        let fetched = client_for(&server)
            .fetch_taxonomy_table(TaxonomyKind::Category, &CancellationToken::new())
            .await;
        assert!(!fetched.failed);
        assert_eq!(fetched.table.len(), 3);
        assert_eq!(fetched.table.get("c3"), Some("Three"));
    }

    #[tokio::test]
    async fn cache_reuses_complete_index_within_ttl() {
        let server = Server::run();
        for path in ["/obj/category", "/obj/class", "/obj/solutionType"] {
            server.expect(
                Expectation::matching(request::method_path("GET", path))
                    .times(1)
                    .respond_with(json_encoded(entries(&[("x", "X")]))),
            );
        }
        server.expect(
            Expectation::matching(request::method_path("GET", "/obj/subcategory"))
                .times(2)
                .respond_with(json_encoded(entries(&[("s", "S")]))),
        );

        let client = client_for(&server);
        let cache = TaxonomyCache::new(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let first = cache.get_or_resolve(&client, &cancel).await;
        let second = cache.get_or_resolve(&client, &cancel).await;
        assert!(Arc::ptr_eq(&first, &second));
    }
}
