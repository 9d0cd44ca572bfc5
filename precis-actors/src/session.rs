//! Session-scoped state owned by the orchestrator.
use precis_common::{Article, TabRef, WindowId};
use precis_extract::ExtractionReason;

/// Current article plus the bookkeeping that ties API results to it.
///
/// `generation` increases on every new extraction and on session end; API
/// calls carry the generation they were issued under so late results from
/// an abandoned cycle can be recognised and dropped.
#[derive(Debug, Default)]
pub struct SessionState {
    article: Option<Article>,
    tab: Option<TabRef>,
    reason: Option<ExtractionReason>,
    generation: u64,
    chat_in_flight: bool,
}

impl SessionState {
    /// Start a new extraction cycle. The previous article is gone before
    /// any extractor of the new cycle can report.
    pub fn begin(&mut self, tab: TabRef) -> u64 {
        self.article = None;
        self.reason = None;
        self.chat_in_flight = false;
        self.tab = Some(tab);
        self.generation += 1;
        self.generation
    }

    pub fn end(&mut self) -> u64 {
        self.article = None;
        self.tab = None;
        self.reason = None;
        self.chat_in_flight = false;
        self.generation += 1;
        self.generation
    }

    pub fn store(&mut self, article: Article) {
        self.article = Some(article);
    }

    pub fn article(&self) -> Option<&Article> {
        self.article.as_ref()
    }

    pub fn tab(&self) -> Option<&TabRef> {
        self.tab.as_ref()
    }

    pub fn set_reason(&mut self, reason: ExtractionReason) {
        self.reason = Some(reason);
    }

    /// Plan chosen for the current cycle; `Article` when none was injected.
    pub fn reason(&self) -> ExtractionReason {
        self.reason.unwrap_or(ExtractionReason::Article)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn chat_in_flight(&self) -> bool {
        self.chat_in_flight
    }

    pub fn set_chat_in_flight(&mut self, in_flight: bool) {
        self.chat_in_flight = in_flight;
    }
}

/// The single popup window we opened, if any.
#[derive(Debug, Default)]
pub struct PopupTracker {
    window: Option<WindowId>,
}

impl PopupTracker {
    pub fn track(&mut self, window: WindowId) {
        if let Some(old) = self.window.replace(window) {
            if old != window {
                tracing::debug!(%old, new = %window, "popup.replaced");
            }
        }
    }

    pub fn current(&self) -> Option<WindowId> {
        self.window
    }

    /// Forget `window` if it is the tracked one.
    pub fn clear_if(&mut self, window: WindowId) -> bool {
        if self.window == Some(window) {
            self.window = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.window = None;
    }
}
