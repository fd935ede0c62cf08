use std::collections::BTreeMap;
use tracing::warn;

use crate::pagination::PaginationState;
use crate::venddy::types::{SearchResultPage, VendorRecord};

pub const MENU_LABEL: &str = "Venddy Search";

/// What selecting a menu option does. Each option owns its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuAction {
    ShowDetail(Box<VendorRecord>),
    Navigate(PaginationState),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuElement {
    Text {
        body: String,
        order: u32,
    },
    Option {
        label: String,
        order: u32,
        action: MenuAction,
    },
}

impl MenuElement {
    pub fn order(&self) -> u32 {
        match self {
            MenuElement::Text { order, .. } | MenuElement::Option { order, .. } => *order,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            MenuElement::Text { body, .. } => body,
            MenuElement::Option { label, .. } => label,
        }
    }

    pub fn action(&self) -> Option<&MenuAction> {
        match self {
            MenuElement::Option { action, .. } => Some(action),
            MenuElement::Text { .. } => None,
        }
    }
}

/// Named elements laid out top-to-bottom by their `order` key.
#[derive(Debug, Clone, PartialEq)]
pub struct Menu {
    pub label: String,
    /// Query session that produced this menu; selections are dispatched under it.
    session: u64,
    elements: BTreeMap<String, MenuElement>,
}

impl Menu {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            session: 0,
            elements: BTreeMap::new(),
        }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn stamped(mut self, session: u64) -> Self {
        self.session = session;
        self
    }

    fn insert(&mut self, key: impl Into<String>, element: MenuElement) {
        self.elements.insert(key.into(), element);
    }

    pub fn get(&self, key: &str) -> Option<&MenuElement> {
        self.elements.get(key)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Elements sorted by their order key.
    pub fn ordered(&self) -> Vec<(&str, &MenuElement)> {
        let mut v: Vec<_> = self
            .elements
            .iter()
            .map(|(k, e)| (k.as_str(), e))
            .collect();
        v.sort_by_key(|(_, e)| e.order());
        v
    }

    /// Selectable options in display order.
    pub fn options(&self) -> Vec<(&str, &MenuElement)> {
        self.ordered()
            .into_iter()
            .filter(|(_, e)| e.action().is_some())
            .collect()
    }

    pub fn action_for(&self, key: &str) -> Option<&MenuAction> {
        self.get(key).and_then(MenuElement::action)
    }
}

pub fn entry_label(record: &VendorRecord) -> String {
    format!(
        "{} ~ Rating:{:.0} ~ Reviews:{:.0}",
        record.name, record.score, record.review_count
    )
}

pub fn no_results_menu(query: &str) -> Menu {
    let mut menu = Menu::new(MENU_LABEL);
    menu.insert(
        "header1",
        MenuElement::Text {
            body: format!("# No results for {query}, please try another search"),
            order: 0,
        },
    );
    menu
}

/// Link to the full search on the public site; the keyword is form encoded.
pub fn web_search_url(web_base_url: &str, query: &str) -> String {
    let base = format!("{}/searchvendor", web_base_url.trim_end_matches('/'));
    match reqwest::Url::parse_with_params(&base, &[("keyword", query)]) {
        Ok(url) => url.to_string(),
        Err(e) => {
            warn!(base=%base, error=%e, "invalid web base url");
            format!("{base}?keyword={}", query.replace(' ', "+"))
        }
    }
}

/// Build the disambiguation menu for one enriched page.
pub fn build(page: &SearchResultPage, state: &PaginationState, web_base_url: &str) -> Menu {
    if page.is_empty() {
        return no_results_menu(state.query());
    }

    let mut menu = Menu::new(MENU_LABEL);
    let n = page.records.len() as u32;

    menu.insert(
        "header1",
        MenuElement::Text {
            body: format!("# Results for {}:", state.query()),
            order: 0,
        },
    );

    for (i, record) in page.records.iter().enumerate() {
        menu.insert(
            i.to_string(),
            MenuElement::Option {
                label: entry_label(record),
                order: i as u32 + 1,
                action: MenuAction::ShowDetail(Box::new(record.clone())),
            },
        );
    }

    menu.insert(
        "header2",
        MenuElement::Text {
            body: format!("# Remaining Results: {}", page.remaining),
            order: n + 2,
        },
    );

    if let Some(next) = state.advance(page) {
        menu.insert(
            "next",
            MenuElement::Option {
                label: format!("next {} results", state.page_size()),
                order: n + 3,
                action: MenuAction::Navigate(next),
            },
        );
    }

    if let Some(prev) = state.retreat() {
        menu.insert(
            "prev",
            MenuElement::Option {
                label: format!("prev {} results", state.page_size()),
                order: n + 4,
                action: MenuAction::Navigate(prev),
            },
        );
    }

    menu.insert(
        "viewOnVenddy",
        MenuElement::Text {
            body: web_search_url(web_base_url, state.query()),
            order: n + 5,
        },
    );

    menu
}

/// Markdown detail document for one enriched vendor.
pub fn detail_markdown(record: &VendorRecord, web_base_url: &str) -> String {
    let web = web_base_url.trim_end_matches('/');
    format!(
        "[![Logo not found]({logo})]({website}) \n_{description}_\n\
         \n# Classes:\n{classes}\
         \n# Types:\n{types}\
         \n# Categories:\n{categories}\
         \n# Subcategories:\n{subcategories}\
         \n\n [View on Venddy]({web}/vendorprofile/{id})",
        logo = record.logo,
        website = record.website,
        description = record.description,
        classes = record.class_names,
        types = record.type_names,
        categories = record.category_names,
        subcategories = record.subcategory_names,
        id = record.id,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListElement {
    Link {
        href: String,
        text: String,
        order: u32,
    },
    Pair {
        label: String,
        value: String,
        order: u32,
    },
    Message {
        header: String,
        body: String,
        order: u32,
    },
}

impl ListElement {
    pub fn order(&self) -> u32 {
        match self {
            ListElement::Link { order, .. }
            | ListElement::Pair { order, .. }
            | ListElement::Message { order, .. } => *order,
        }
    }
}

/// Compact key/value view of one vendor: website, rating, reviews, description.
pub fn summary_list(record: &VendorRecord) -> BTreeMap<String, ListElement> {
    let mut elements = BTreeMap::new();
    elements.insert(
        format!("{}_website", record.id),
        ListElement::Link {
            href: record.website.clone(),
            text: record.website.clone(),
            order: 0,
        },
    );
    elements.insert(
        format!("{}_rating", record.id),
        ListElement::Pair {
            label: "Rating".to_string(),
            value: record.score.to_string(),
            order: 1,
        },
    );
    elements.insert(
        format!("{}_reviews", record.id),
        ListElement::Pair {
            label: "Reviews".to_string(),
            value: record.review_count.to_string(),
            order: 2,
        },
    );
    elements.insert(
        format!("{}_description", record.id),
        ListElement::Message {
            header: record.description.clone(),
            body: record.search_keywords.clone(),
            order: 3,
        },
    );
    elements
}
