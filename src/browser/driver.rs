use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::FetchError;
use crate::identity::Identity;
use crate::session::Cookie;

/// Outcome of a navigation as reported by the page itself.
///
/// `status` is `None` when the page predates the navigation-timing API or
/// the browser withheld the response status.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationStatus {
    pub status: Option<u16>,
    pub redirect_count: u32,
}

impl NavigationStatus {
    /// Map a final HTTP status to the fetch failure it represents, if any.
    pub fn failure(&self) -> Option<FetchError> {
        self.status.and_then(FetchError::from_status)
    }
}

/// Capabilities a fetch needs from a live browser page. The production
/// implementation drives a remote browser over WebDriver; tests substitute
/// canned fakes.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), FetchError>;

    async fn navigation_status(&self) -> Result<NavigationStatus, FetchError>;

    async fn title(&self) -> Result<String, FetchError>;

    async fn page_source(&self) -> Result<String, FetchError>;

    /// Raw candidate links found in the page: anchors, inline navigation
    /// handlers, and form actions. Unresolved and unfiltered.
    async fn harvest_links(&self) -> Result<Vec<String>, FetchError>;

    /// Register a script that runs in every new document before any page
    /// script does.
    async fn install_init_script(&self, script: &str) -> Result<(), FetchError>;

    async fn move_pointer(&self, x: i64, y: i64) -> Result<(), FetchError>;

    async fn scroll_by(&self, pixels: i64, smooth: bool) -> Result<(), FetchError>;

    async fn refresh(&self) -> Result<(), FetchError>;

    async fn cookies(&self) -> Result<Vec<Cookie>, FetchError>;

    async fn restore_cookies(&self, cookies: &[Cookie]) -> Result<(), FetchError>;

    async fn local_storage(&self) -> Result<HashMap<String, String>, FetchError>;

    async fn restore_local_storage(
        &self,
        entries: &HashMap<String, String>,
    ) -> Result<(), FetchError>;

    async fn close(self: Box<Self>) -> Result<(), FetchError>;
}

/// Launches one browser session bound to one identity.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self, identity: &Identity) -> Result<Box<dyn PageDriver>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_status_classifies_failures() {
        let ok = NavigationStatus {
            status: Some(200),
            redirect_count: 0,
        };
        assert!(ok.failure().is_none());

        let redirected_then_ok = NavigationStatus {
            status: Some(200),
            redirect_count: 2,
        };
        assert!(redirected_then_ok.failure().is_none());

        let forbidden = NavigationStatus {
            status: Some(403),
            redirect_count: 0,
        };
        assert!(matches!(
            forbidden.failure(),
            Some(FetchError::AccessDenied)
        ));

        let unknown = NavigationStatus::default();
        assert!(unknown.failure().is_none());
    }
}
