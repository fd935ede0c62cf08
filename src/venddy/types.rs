use serde::{Deserialize, Serialize};

/// Envelope shared by every Venddy data API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub response: ResponseBody<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBody<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(rename = "Cursor", default)]
    pub cursor: i64,
    #[serde(rename = "Remaining", default)]
    pub remaining: i64,
    #[serde(rename = "Count", default)]
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorRecord {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Website", default)]
    pub website: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Logo", default)]
    pub logo: String,
    #[serde(rename = "Search field", default)]
    pub search_keywords: String,
    #[serde(rename = "Score", default)]
    pub score: f64,
    #[serde(rename = "Number of Reviews", default)]
    pub review_count: f64,
    #[serde(rename = "Categories", default)]
    pub categories: Vec<String>,
    #[serde(rename = "Classes", default)]
    pub classes: Vec<String>,
    #[serde(rename = "Subcategories", default)]
    pub subcategories: Vec<String>,
    #[serde(rename = "Types", default)]
    pub types: Vec<String>,

    // Filled in by enrichment; never part of the wire format.
    #[serde(skip)]
    pub category_names: String,
    #[serde(skip)]
    pub class_names: String,
    #[serde(skip)]
    pub subcategory_names: String,
    #[serde(skip)]
    pub type_names: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
}

/// One page of vendor search results, tagged with the query and cursor that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResultPage {
    pub query: String,
    pub records: Vec<VendorRecord>,
    /// Results beyond this page. Never negative.
    pub remaining: u64,
    pub count: u64,
    pub cursor: u64,
}

impl SearchResultPage {
    pub fn from_body(query: &str, cursor: u64, body: ResponseBody<VendorRecord>) -> Self {
        Self {
            query: query.to_string(),
            records: body.results,
            remaining: body.remaining.max(0) as u64,
            count: body.count.max(0) as u64,
            cursor,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_envelope_parses_wire_names() {
        let raw = serde_json::json!({
            "response": {
                "results": [{
                    "_id": "v1",
                    "Name": "Acme",
                    "Website": "https://acme.test",
                    "Description": "Widgets",
                    "Logo": "//cdn.example.com/x.png",
                    "Search field": "acme widgets",
                    "Categories": ["c1", "c2"],
                    "Classes": ["k1"],
                    "Subcategories": [],
                    "Types": ["t1"],
                    "Score": 4.6,
                    "Number of Reviews": 12.0
                }],
                "Cursor": 0,
                "Remaining": 5,
                "Count": 1
            }
        });
        let env: Envelope<VendorRecord> = serde_json::from_value(raw).unwrap();
        let page = SearchResultPage::from_body("acme", 0, env.response);
        assert_eq!(page.remaining, 5);
        let rec = &page.records[0];
        assert_eq!(rec.id, "v1");
        assert_eq!(rec.search_keywords, "acme widgets");
        assert_eq!(rec.categories, vec!["c1", "c2"]);
        assert_eq!(rec.review_count, 12.0);
        assert!(rec.category_names.is_empty());
    }

    #[test]
    fn missing_fields_default_and_negative_remaining_clamps() {
        let raw = r#"{"response":{"results":[{"_id":"v2"}],"Remaining":-3}}"#;
        let env: Envelope<VendorRecord> = serde_json::from_str(raw).unwrap();
        let page = SearchResultPage::from_body("x", 10, env.response);
        assert_eq!(page.remaining, 0);
        assert!(!page.has_more());
        assert_eq!(page.records[0].name, "");
        assert!(page.records[0].types.is_empty());
    }

    #[test]
    fn taxonomy_row_without_id_does_not_fail_the_page() {
        let raw = r#"{"response":{"results":[{"Name":"Orphan"},{"_id":"c1","Name":"Software"}]}}"#;
        let env: Envelope<TaxonomyEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(env.response.results.len(), 2);
        assert_eq!(env.response.results[0].id, "");
        assert_eq!(env.response.results[1].name, "Software");
    }
}
