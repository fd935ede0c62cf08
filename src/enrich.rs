//! Joins vendor taxonomy id-lists against a [`TaxonomyIndex`] and
//! normalizes logo URLs for display.

use crate::venddy::taxonomy::{TaxonomyIndex, TaxonomyKind, TaxonomyTable};
use crate::venddy::types::{SearchResultPage, VendorRecord};

pub const PLACEHOLDER_LOGO: &str = "https://d1muf25xaso8hp.cloudfront.net/https%3A%2F%2Fs3.amazonaws.com%2Fappforest_uf%2Ff1531944633470x300479865865781900%2FDefault%2520Logo.png?w=256&h=256&auto=compress&dpr=1&fit=max";
pub const LOGO_PROXY_BASE: &str = "https://d1muf25xaso8hp.cloudfront.net/http:";

/// One `- name` line per id found in `table`, in id order. Unknown ids are skipped.
pub fn join_names(table: &TaxonomyTable, ids: &[String]) -> String {
    ids.iter()
        .filter_map(|id| table.get(id))
        .map(|name| format!("- {name}\n"))
        .collect()
}

pub fn enrich_record(record: &mut VendorRecord, index: &TaxonomyIndex) {
    for kind in TaxonomyKind::ALL {
        let (ids, names) = match kind {
            TaxonomyKind::Category => (&record.categories, &mut record.category_names),
            TaxonomyKind::Class => (&record.classes, &mut record.class_names),
            TaxonomyKind::Subcategory => (&record.subcategories, &mut record.subcategory_names),
            TaxonomyKind::Type => (&record.types, &mut record.type_names),
        };
        names.push_str(&join_names(index.table(kind), ids));
    }
    record.logo = normalize_logo(&record.logo);
}

pub fn enrich(mut page: SearchResultPage, index: &TaxonomyIndex) -> SearchResultPage {
    for record in &mut page.records {
        enrich_record(record, index);
    }
    page
}

/// Empty logos get the placeholder; anything that is not already an
/// absolute http(s) URL is routed through the image proxy.
pub fn normalize_logo(logo: &str) -> String {
    let logo = logo.trim();
    if logo.is_empty() {
        return PLACEHOLDER_LOGO.to_string();
    }
    if logo.starts_with("http://") || logo.starts_with("https://") {
        return logo.to_string();
    }
    format!("{LOGO_PROXY_BASE}{logo}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venddy::types::TaxonomyEntry;

    fn table(pairs: &[(&str, &str)]) -> TaxonomyTable {
        pairs
            .iter()
            .map(|(id, name)| TaxonomyEntry {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect()
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn index() -> TaxonomyIndex {
        TaxonomyIndex {
            categories: table(&[("1", "Software"), ("2", "Hardware")]),
            classes: table(&[("1", "Enterprise")]),
            subcategories: table(&[("s1", "CRM"), ("s2", "ERP")]),
            types: table(&[("t1", "SaaS")]),
            degraded: vec![],
        }
    }

    #[test]
    fn join_follows_id_order_and_repeats() {
        let t = table(&[("a", "Alpha"), ("b", "Beta")]);
        assert_eq!(
            join_names(&t, &ids(&["b", "a", "b"])),
            "- Beta\n- Alpha\n- Beta\n"
        );
    }

    #[test]
    fn join_skips_unknown_ids() {
        let t = table(&[("a", "Alpha")]);
        assert_eq!(join_names(&t, &ids(&["x", "a", "y"])), "- Alpha\n");
        assert_eq!(join_names(&t, &ids(&["x"])), "");
        assert_eq!(join_names(&TaxonomyTable::default(), &ids(&["a"])), "");
    }

    #[test]
    fn tables_are_independent_namespaces() {
        let mut rec = VendorRecord {
            categories: ids(&["1"]),
            classes: ids(&["1"]),
            subcategories: ids(&["s2", "s1", "nope"]),
            types: ids(&["1"]),
            ..VendorRecord::default()
        };
        enrich_record(&mut rec, &index());
        assert_eq!(rec.category_names, "- Software\n");
        assert_eq!(rec.class_names, "- Enterprise\n");
        assert_eq!(rec.subcategory_names, "- ERP\n- CRM\n");
        // "1" is a category/class id, not a type id.
        assert_eq!(rec.type_names, "");
    }

    #[test]
    fn enrich_page_is_deterministic() {
        let page = SearchResultPage {
            query: "acme".into(),
            records: vec![
                VendorRecord {
                    id: "v1".into(),
                    categories: ids(&["2", "1"]),
                    types: ids(&["t1"]),
                    ..VendorRecord::default()
                },
                VendorRecord {
                    id: "v2".into(),
                    ..VendorRecord::default()
                },
            ],
            remaining: 0,
            count: 2,
            cursor: 0,
        };
        let a = enrich(page.clone(), &index());
        let b = enrich(page, &index());
        assert_eq!(a, b);
        assert_eq!(a.records[0].category_names, "- Hardware\n- Software\n");
        assert_eq!(a.records[0].type_names, "- SaaS\n");
        assert_eq!(a.records[1].category_names, "");
    }

    #[test]
    fn empty_taxonomy_leaves_names_blank() {
        let mut rec = VendorRecord {
            categories: ids(&["1"]),
            ..VendorRecord::default()
        };
        enrich_record(&mut rec, &TaxonomyIndex::default());
        assert!(rec.category_names.is_empty());
    }

    #[test]
    fn enrichment_normalizes_logo() {
        let mut blank = VendorRecord::default();
        enrich_record(&mut blank, &index());
        assert_eq!(blank.logo, PLACEHOLDER_LOGO);

        let mut relative = VendorRecord {
            logo: "//cdn.example.com/x.png".into(),
            ..VendorRecord::default()
        };
        enrich_record(&mut relative, &index());
        assert_eq!(relative.logo, format!("{LOGO_PROXY_BASE}//cdn.example.com/x.png"));
    }

    #[test]
    fn logo_normalization() {
        assert_eq!(normalize_logo(""), PLACEHOLDER_LOGO);
        assert_eq!(
            normalize_logo("https://img.test/a.png"),
            "https://img.test/a.png"
        );
        assert_eq!(normalize_logo("http://img.test/a.png"), "http://img.test/a.png");
        let proxied = normalize_logo("//cdn.example.com/x.png");
        assert_eq!(
            proxied,
            "https://d1muf25xaso8hp.cloudfront.net/http://cdn.example.com/x.png"
        );
        assert!(proxied.starts_with("https://"));
    }
}
