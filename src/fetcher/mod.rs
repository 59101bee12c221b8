//! Single-page fetching: one identity, one browser session, one URL, with
//! masking, pacing, session continuity, and link harvesting around the
//! navigation itself.

pub mod links;
pub mod rate_limit;

pub use links::LinkFilter;
pub use rate_limit::RateLimiter;

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::browser::driver::{DriverFactory, PageDriver};
use crate::browser::{behavior, stealth};
use crate::config::FetchSettings;
use crate::error::FetchError;
use crate::identity::validate::contains_debug_markers;
use crate::identity::IdentityManager;
use crate::session::{SessionRecord, SessionStore};
use crate::utils::random_wait;

/// One successfully fetched page, links already resolved and filtered.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub title: String,
    pub description: Option<String>,
    /// Raw page source; sanitized downstream
    pub content: String,
    pub links: Vec<Url>,
}

/// Seam between orchestration and the page pipeline; tests substitute
/// scripted fakes for the browser-backed implementation.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

pub struct PageFetcher {
    identities: Arc<IdentityManager>,
    drivers: Arc<dyn DriverFactory>,
    sessions: SessionStore,
    limiter: Arc<RateLimiter>,
    filter: LinkFilter,
    settings: FetchSettings,
}

impl PageFetcher {
    pub fn new(
        identities: Arc<IdentityManager>,
        drivers: Arc<dyn DriverFactory>,
        sessions: SessionStore,
        limiter: Arc<RateLimiter>,
        filter: LinkFilter,
        settings: FetchSettings,
    ) -> Self {
        Self {
            identities,
            drivers,
            sessions,
            limiter,
            filter,
            settings,
        }
    }

    async fn fetch_on(
        &self,
        driver: &dyn PageDriver,
        url: &Url,
    ) -> Result<FetchedPage, FetchError> {
        stealth::apply(driver).await;

        if let Err(e) = behavior::pointer_drift(driver).await {
            debug!("Pointer drift failed for {}: {}", url, e);
        }

        self.limiter.acquire().await;
        driver.navigate(url.as_str()).await?;

        match driver.navigation_status().await {
            Ok(status) => {
                if let Some(failure) = status.failure() {
                    return Err(failure);
                }
                if status.redirect_count > 0 {
                    debug!("{} reached after {} redirects", url, status.redirect_count);
                }
            }
            Err(e) => debug!("Navigation status probe failed for {}: {}", url, e),
        }

        self.restore_session(driver, url).await;

        if let Err(e) = behavior::natural_scroll(driver).await {
            debug!("Scroll simulation failed for {}: {}", url, e);
        }

        random_wait(self.settings.settle_min_ms, self.settings.settle_max_ms).await;

        let title = driver.title().await?;
        let source = driver.page_source().await?;

        if title.trim().is_empty() {
            return Err(FetchError::InvalidPage("blank title".to_string()));
        }
        if contains_debug_markers(&source) {
            return Err(FetchError::InvalidPage(
                "proxy debug response".to_string(),
            ));
        }

        let (description, body_blank) = inspect_document(&source);
        if body_blank {
            return Err(FetchError::InvalidPage("empty body".to_string()));
        }

        let raw_links = driver.harvest_links().await?;
        let links = self.filter.filter(url, raw_links);
        debug!("{}: kept {} links", url, links.len());

        self.persist_session(driver, url).await;

        Ok(FetchedPage {
            url: url.clone(),
            title,
            description,
            content: source,
            links,
        })
    }

    /// Re-apply saved cookies and local storage, then reload so the page
    /// renders with them. A stale or unreadable session only costs the
    /// continuity, never the fetch.
    async fn restore_session(&self, driver: &dyn PageDriver, url: &Url) {
        let record = match self.sessions.load(url.as_str()) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to read saved session for {}: {}", url, e);
                return;
            }
        };

        if let Err(e) = driver.restore_cookies(&record.cookies).await {
            warn!("Failed to restore cookies for {}: {}", url, e);
            return;
        }
        if let Err(e) = driver.restore_local_storage(&record.local_storage).await {
            warn!("Failed to restore local storage for {}: {}", url, e);
            return;
        }
        if let Err(e) = driver.refresh().await {
            warn!("Failed to reload {} with restored session: {}", url, e);
        } else {
            debug!("Restored saved session state for {}", url);
        }
    }

    async fn persist_session(&self, driver: &dyn PageDriver, url: &Url) {
        let cookies = driver.cookies().await.unwrap_or_else(|e| {
            debug!("Failed to read cookies for {}: {}", url, e);
            Vec::new()
        });
        let local_storage = driver.local_storage().await.unwrap_or_default();

        if cookies.is_empty() && local_storage.is_empty() {
            return;
        }

        let record = SessionRecord {
            cookies,
            local_storage,
        };
        if let Err(e) = self.sessions.save(url.as_str(), &record) {
            warn!("Failed to save session for {}: {}", url, e);
        }
    }
}

#[async_trait]
impl Fetcher for PageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let identity = self.identities.acquire().await?;
        let driver = self.drivers.launch(&identity).await?;

        // The session must die on every exit path, success or not.
        let result = self.fetch_on(driver.as_ref(), url).await;
        if let Err(e) = driver.close().await {
            warn!("Failed to close browser session for {}: {}", url, e);
        }

        result
    }
}

/// Pull the meta description and decide whether the body carries any text.
fn inspect_document(source: &str) -> (Option<String>, bool) {
    let document = Html::parse_document(source);

    let description = Selector::parse(r#"meta[name="description"]"#)
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("content"))
                .map(|content| content.trim().to_string())
        })
        .filter(|content| !content.is_empty());

    let body_blank = Selector::parse("body")
        .ok()
        .map(|selector| {
            document
                .select(&selector)
                .next()
                .map(|body| body.text().all(|text| text.trim().is_empty()))
                .unwrap_or(true)
        })
        .unwrap_or(true);

    (description, body_blank)
}
