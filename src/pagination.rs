use crate::venddy::types::SearchResultPage;

/// Cursor state for one query session.
///
/// `cursor` is always a multiple of `page_size`. A state is a plain value:
/// each menu carries the states its navigation options lead to, so no
/// cursor is ever shared between sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    query: String,
    page_size: u64,
    cursor: u64,
}

impl PaginationState {
    /// Start a session at cursor 0. A zero page size is bumped to 1.
    pub fn initial(query: impl Into<String>, page_size: u64) -> Self {
        Self {
            query: query.into(),
            page_size: page_size.max(1),
            cursor: 0,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn has_previous(&self) -> bool {
        self.cursor > 0
    }

    /// The following page, if `page` (fetched with this state) reported more results.
    pub fn advance(&self, page: &SearchResultPage) -> Option<Self> {
        if !page.has_more() {
            return None;
        }
        Some(Self {
            cursor: self.cursor.saturating_add(self.page_size),
            ..self.clone()
        })
    }

    /// The preceding page, clamped at 0. `None` on the first page.
    pub fn retreat(&self) -> Option<Self> {
        if !self.has_previous() {
            return None;
        }
        Some(Self {
            cursor: self.cursor.saturating_sub(self.page_size),
            ..self.clone()
        })
    }
}
