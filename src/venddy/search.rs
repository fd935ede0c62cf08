use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::venddy::client::VenddyClient;
use crate::venddy::error::FetchError;
use crate::venddy::types::{Envelope, SearchResultPage, VendorRecord};

const SEARCH_OBJECT: &str = "vendor";
const SEARCH_FIELD: &str = "searchfield";
const SORT_FIELD: &str = "Score";

#[derive(Debug, Serialize)]
struct Constraint<'a> {
    key: &'a str,
    constraint_type: &'a str,
    value: &'a str,
}

/// Encode the "searchfield contains <text>" constraint as JSON.
///
/// The text goes through `serde_json`, so quotes, braces and backslashes
/// cannot break out of the string literal. URL encoding happens later when
/// reqwest serializes the query string.
pub fn constraints_json(query: &str) -> String {
    let constraints = [Constraint {
        key: SEARCH_FIELD,
        constraint_type: "text contains",
        value: query,
    }];
    // Serializing plain &str fields cannot fail.
    serde_json::to_string(&constraints).unwrap_or_else(|_| "[]".to_string())
}

pub fn search_params(query: &str, page_size: u64, cursor: u64) -> Vec<(&'static str, String)> {
    vec![
        ("constraints", constraints_json(query)),
        ("sort_field", SORT_FIELD.to_string()),
        ("descending", "true".to_string()),
        ("limit", page_size.to_string()),
        ("cursor", cursor.to_string()),
    ]
}

impl VenddyClient {
    pub async fn search(
        &self,
        query: &str,
        page_size: u64,
        cursor: u64,
        cancel: &CancellationToken,
    ) -> Result<SearchResultPage, FetchError> {
        let url = self.endpoint(SEARCH_OBJECT);
        let params = search_params(query, page_size, cursor);
        debug!(%url, query, page_size, cursor, "vendor search");

        let env: Envelope<VendorRecord> = self.get_json(&url, &params, cancel).await?;
        let page = SearchResultPage::from_body(query, cursor, env.response);
        info!(
            query,
            cursor,
            results = page.records.len(),
            count = page.count,
            remaining = page.remaining,
            "vendor search done"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::venddy::error::FetchErrorKind;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    fn client_for(server: &Server) -> VenddyClient {
        let base = server.url_str("/api/1.1/obj");
        VenddyClient::new(
            base.clone(),
            base,
            HttpConfig {
                max_retries: 0,
                request_timeout_ms: 2_000,
                ..HttpConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn constraints_escape_json_significant_characters() {
        let json = constraints_json(r#"ac"me} \ [x]"#);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["key"], "searchfield");
        assert_eq!(parsed[0]["constraint_type"], "text contains");
        assert_eq!(parsed[0]["value"], r#"ac"me} \ [x]"#);
    }

    #[test]
    fn params_carry_sort_and_paging() {
        let params = search_params("acme", 10, 20);
        let get = |k: &str| {
            params
                .iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("sort_field"), "Score");
        assert_eq!(get("descending"), "true");
        assert_eq!(get("limit"), "10");
        assert_eq!(get("cursor"), "20");
    }

    #[tokio::test]
    async fn search_sends_encoded_query_and_parses_page() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/api/1.1/obj/vendor"),
                request::query(url_decoded(contains((
                    "constraints",
                    r#"[{"key":"searchfield","constraint_type":"text contains","value":"a \"b\" & c"}]"#
                )))),
                request::query(url_decoded(contains(("limit", "10")))),
                request::query(url_decoded(contains(("cursor", "0")))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "response": {
                    "results": [
                        {"_id": "1", "Name": "One", "Score": 4.4},
                        {"_id": "2", "Name": "Two", "Score": 3.0}
                    ],
                    "Cursor": 0,
                    "Remaining": 5,
                    "Count": 2
                }
            }))),
        );

        let client = client_for(&server);
        let page = client
            .search(r#"a "b" & c"#, 10, 0, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(page.query, r#"a "b" & c"#);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].name, "One");
        assert_eq!(page.remaining, 5);
        assert_eq!(page.cursor, 0);
    }

    #[tokio::test]
    async fn search_surfaces_server_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/1.1/obj/vendor"))
                .respond_with(status_code(503)),
        );
        let client = client_for(&server);
        let err = client
            .search("acme", 10, 0, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Server);
        assert!(err.is_retryable());
    }
}
