//! Browser operations the orchestrator needs, implemented by the host bridge.
use anyhow::Result;
use async_trait::async_trait;
use precis_common::{PrecisError, TabId, TabRef, WindowId};

pub const INJECTION_FAILED_MESSAGE: &str =
    "Could not access page content. Please try reloading the page.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionFailure {
    /// The user closed the tab before the scripts ran.
    TabClosed(String),
    Other(String),
}

impl InjectionFailure {
    pub fn into_error(self) -> PrecisError {
        match self {
            InjectionFailure::TabClosed(detail) => PrecisError::Injection {
                tab_closed: true,
                message: detail,
            },
            InjectionFailure::Other(detail) => {
                tracing::debug!(%detail, "injection.detail");
                PrecisError::Injection {
                    tab_closed: false,
                    message: INJECTION_FAILED_MESSAGE.to_string(),
                }
            }
        }
    }
}

#[async_trait]
pub trait BrowserPort: Send + Sync {
    /// An already open UI surface (popup window) the host did not track.
    async fn find_surface(&self) -> Result<Option<WindowId>>;

    /// Open a UI surface for `tab`. Returns the window id when the surface
    /// is a separate window, `None` for a docked panel.
    async fn open_surface(&self, tab: &TabRef) -> Result<Option<WindowId>>;

    /// Bring `window` to the front. `false` when it no longer exists.
    async fn focus_surface(&self, window: WindowId) -> Result<bool>;

    /// Run extractor scripts in `tab`, in order.
    async fn inject(&self, tab: TabId, files: &[String]) -> std::result::Result<(), InjectionFailure>;

    /// Text the user currently has selected in `tab`, if any.
    async fn read_selection(&self, tab: TabId) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_tab_is_benign_and_others_get_reload_hint() {
        let closed = InjectionFailure::TabClosed("No tab with id: 5.".into()).into_error();
        assert!(closed.is_benign());

        let other = InjectionFailure::Other("Cannot access contents of url".into()).into_error();
        assert!(!other.is_benign());
        assert_eq!(other.title(), "Injection Failed");
        assert_eq!(other.to_string(), INJECTION_FAILED_MESSAGE);
    }
}
