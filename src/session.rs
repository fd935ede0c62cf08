use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::enrich::enrich;
use crate::pagination::PaginationState;
use crate::presentation::{
    ListElement, Menu, MenuAction, build, detail_markdown, no_results_menu, summary_list,
};
use crate::venddy::client::VenddyClient;
use crate::venddy::error::{FetchError, FetchErrorKind};
use crate::venddy::taxonomy::TaxonomyCache;
use crate::venddy::types::{SearchResultPage, VendorRecord};

/// A vendor detail document ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub label: String,
    pub markdown: String,
    pub summary: BTreeMap<String, ListElement>,
}

/// Host capability: show a menu or a document. Selections come back
/// through [`Dispatcher::on_select`].
#[async_trait]
pub trait Presenter: Send + Sync {
    async fn show_menu(&self, menu: Menu) -> Result<()>;
    async fn show_detail(&self, detail: Detail) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiMessage {
    Menu(Menu),
    Detail(Detail),
}

/// Presenter that forwards everything to a host event loop.
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: UnboundedSender<UiMessage>,
}

impl ChannelPresenter {
    pub fn new(tx: UnboundedSender<UiMessage>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Presenter for ChannelPresenter {
    async fn show_menu(&self, menu: Menu) -> Result<()> {
        self.tx
            .send(UiMessage::Menu(menu))
            .map_err(|_| anyhow::anyhow!("ui channel closed"))
    }

    async fn show_detail(&self, detail: Detail) -> Result<()> {
        self.tx
            .send(UiMessage::Detail(detail))
            .map_err(|_| anyhow::anyhow!("ui channel closed"))
    }
}

/// Raw input from the search box.
#[derive(Debug, Clone, Default)]
pub struct QueryEvent {
    pub text: String,
    pub error: Option<String>,
}

impl QueryEvent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }
}

/// One query session. Its id is stamped on every menu it produces; its
/// token is cancelled when a newer query starts.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: u64,
    pub token: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOrigin {
    Query,
    Navigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Shown,
    NoResults,
    Failed,
    Cancelled,
}

/// Fetch -> enrich -> present for one pagination state.
pub struct SearchPipeline {
    client: VenddyClient,
    taxonomy: TaxonomyCache,
    presenter: Arc<dyn Presenter>,
    web_base_url: String,
    page_size: u64,
}

impl SearchPipeline {
    pub fn new(
        client: VenddyClient,
        presenter: Arc<dyn Presenter>,
        web_base_url: impl Into<String>,
        page_size: u64,
        taxonomy_ttl: Duration,
    ) -> Self {
        Self {
            client,
            taxonomy: TaxonomyCache::new(taxonomy_ttl),
            presenter,
            web_base_url: web_base_url.into(),
            page_size,
        }
    }

    pub fn from_config(cfg: &AppConfig, presenter: Arc<dyn Presenter>) -> Result<Self> {
        let client = VenddyClient::new(
            cfg.base_url.clone(),
            cfg.taxonomy_base_url.clone(),
            cfg.http.clone(),
        )?;
        Ok(Self::new(
            client,
            presenter,
            cfg.web_base_url.clone(),
            cfg.page_size,
            Duration::from_secs(cfg.taxonomy_ttl_secs),
        ))
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Search and taxonomy fetches run concurrently; enrichment waits for
    /// both. A failed search returns at once without waiting on taxonomy.
    pub async fn fetch_page(
        &self,
        state: &PaginationState,
        cancel: &CancellationToken,
    ) -> Result<SearchResultPage, FetchError> {
        let taxonomy = async {
            Ok::<_, FetchError>(self.taxonomy.get_or_resolve(&self.client, cancel).await)
        };
        let (page, index) = tokio::try_join!(
            self.client
                .search(state.query(), state.page_size(), state.cursor(), cancel),
            taxonomy,
        )?;
        Ok(enrich(page, &index))
    }

    pub async fn render(
        &self,
        state: PaginationState,
        origin: RenderOrigin,
        session: &Session,
    ) -> RenderOutcome {
        let cancel = &session.token;
        let page = match self.fetch_page(&state, cancel).await {
            Ok(page) => page,
            Err(e) if e.kind() == FetchErrorKind::Cancelled => {
                debug!(query = state.query(), "render superseded");
                return RenderOutcome::Cancelled;
            }
            Err(e) => {
                error!(query = state.query(), cursor = state.cursor(), error = %e, retryable = e.is_retryable(), "vendor search failed");
                return match origin {
                    // A fresh query must answer with something.
                    RenderOrigin::Query => {
                        self.present_menu(no_results_menu(state.query()), session)
                            .await;
                        RenderOutcome::Failed
                    }
                    // Keep the menu that is already on screen.
                    RenderOrigin::Navigation => RenderOutcome::Failed,
                };
            }
        };

        if cancel.is_cancelled() {
            debug!(query = state.query(), "render superseded after fetch");
            return RenderOutcome::Cancelled;
        }

        let outcome = if page.is_empty() {
            RenderOutcome::NoResults
        } else {
            RenderOutcome::Shown
        };
        self.present_menu(build(&page, &state, &self.web_base_url), session)
            .await;
        outcome
    }

    pub async fn handle_action(&self, action: MenuAction, session: &Session) -> RenderOutcome {
        if session.token.is_cancelled() {
            debug!(session = session.id, "selection from superseded menu dropped");
            return RenderOutcome::Cancelled;
        }
        match action {
            MenuAction::ShowDetail(record) => {
                self.present_detail(&record).await;
                RenderOutcome::Shown
            }
            MenuAction::Navigate(state) => {
                info!(query = state.query(), cursor = state.cursor(), "navigate");
                self.render(state, RenderOrigin::Navigation, session).await
            }
        }
    }

    async fn present_menu(&self, menu: Menu, session: &Session) {
        debug!(session = session.id, elements = menu.len(), "present menu");
        if let Err(e) = self.presenter.show_menu(menu.stamped(session.id)).await {
            warn!(error = %e, "failed to show menu");
        }
    }

    async fn present_detail(&self, record: &VendorRecord) {
        let detail = Detail {
            label: record.name.clone(),
            markdown: detail_markdown(record, &self.web_base_url),
            summary: summary_list(record),
        };
        if let Err(e) = self.presenter.show_detail(detail).await {
            warn!(error = %e, "failed to show detail");
        }
    }
}

/// Turns host events into pipeline tasks. Each query opens a new session;
/// a newer query cancels the previous one, and selections from a menu run
/// under the session that built it.
pub struct Dispatcher {
    pipeline: Arc<SearchPipeline>,
    root: CancellationToken,
    current: Mutex<Session>,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<SearchPipeline>) -> Self {
        let root = CancellationToken::new();
        let current = Session {
            id: 0,
            token: root.child_token(),
        };
        Self {
            pipeline,
            root,
            current: Mutex::new(current),
        }
    }

    fn current_session(&self) -> Session {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn start_session(&self) -> Session {
        let mut guard = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let fresh = Session {
            id: guard.id + 1,
            token: self.root.child_token(),
        };
        let previous = std::mem::replace(&mut *guard, fresh.clone());
        previous.token.cancel();
        fresh
    }

    /// The live session if `id` is current, otherwise an already cancelled one.
    fn session_for(&self, id: u64) -> Session {
        let current = self.current_session();
        if current.id == id {
            return current;
        }
        let token = CancellationToken::new();
        token.cancel();
        Session { id, token }
    }

    pub fn on_query(&self, event: QueryEvent) -> Option<JoinHandle<RenderOutcome>> {
        if let Some(err) = event.error {
            error!(error = %err, "received error from search input");
            return None;
        }
        if event.text.trim().is_empty() {
            return None;
        }

        let session = self.start_session();
        let state = PaginationState::initial(event.text, self.pipeline.page_size());
        let pipeline = self.pipeline.clone();
        info!(query = state.query(), session = session.id, "search submitted");
        Some(tokio::spawn(async move {
            pipeline.render(state, RenderOrigin::Query, &session).await
        }))
    }

    /// `session` is the id of the menu the action was taken from.
    pub fn on_select(&self, session: u64, action: MenuAction) -> JoinHandle<RenderOutcome> {
        let session = self.session_for(session);
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move { pipeline.handle_action(action, &session).await })
    }

    pub fn shutdown(&self) {
        info!("dispatcher shutdown");
        self.root.cancel();
    }
}
