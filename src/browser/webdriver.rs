//! Production `PageDriver` over a remote Chrome session. Capabilities carry
//! the identity's fingerprint; CDP handles init scripts, request blocking,
//! header and geolocation overrides that the WebDriver protocol itself
//! cannot express.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use thirtyfour::error::WebDriverError;
use thirtyfour::extensions::cdp::ChromeDevTools;
use thirtyfour::prelude::*;
use thirtyfour::ChromeCapabilities;
use tracing::{debug, warn};

use crate::browser::driver::{DriverFactory, NavigationStatus, PageDriver};
use crate::config::BrowserSettings;
use crate::error::FetchError;
use crate::identity::Identity;
use crate::session::Cookie;

/// Chrome arguments applied to every session, identity aside.
const HARDENING_ARGS: [&str; 9] = [
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-pings",
    "--mute-audio",
    "--hide-scrollbars",
    "--ignore-certificate-errors",
];

const NAVIGATION_PROBE: &str = r#"
const entry = performance.getEntriesByType('navigation')[0];
if (!entry) {
    return null;
}
return {
    status: entry.responseStatus || null,
    redirectCount: entry.redirectCount || 0,
};
"#;

const HARVEST_LINKS: &str = r#"
const links = [];
for (const anchor of document.querySelectorAll('a[href]')) {
    links.push(anchor.getAttribute('href'));
}
const clickPattern = /(?:window\.location(?:\.href)?|location\.href|location)\s*=\s*['"]([^'"]+)['"]|window\.open\(\s*['"]([^'"]+)['"]/;
for (const element of document.querySelectorAll('[onclick]')) {
    const match = element.getAttribute('onclick').match(clickPattern);
    if (match) {
        links.push(match[1] || match[2]);
    }
}
for (const form of document.querySelectorAll('form[action]')) {
    links.push(form.getAttribute('action'));
}
return links;
"#;

const READ_LOCAL_STORAGE: &str = "return Object.assign({}, window.localStorage);";

const WRITE_LOCAL_STORAGE: &str = r#"
for (const [key, value] of Object.entries(arguments[0])) {
    window.localStorage.setItem(key, value);
}
"#;

/// Launches Chrome sessions against a chromedriver endpoint.
pub struct ChromeDriverFactory {
    settings: BrowserSettings,
    page_load_timeout: Duration,
}

impl ChromeDriverFactory {
    pub fn new(settings: BrowserSettings, page_load_timeout: Duration) -> Self {
        Self {
            settings,
            page_load_timeout,
        }
    }

    fn build_capabilities(&self, identity: &Identity) -> Result<ChromeCapabilities, FetchError> {
        let mut caps = DesiredCapabilities::chrome();

        let caps_err = |e: WebDriverError| FetchError::Protocol(e.to_string());

        caps.add_chrome_arg(&format!("--user-agent={}", identity.user_agent))
            .map_err(caps_err)?;

        let lang = identity
            .headers
            .get("Accept-Language")
            .and_then(|value| value.split(',').next())
            .unwrap_or("en-US");
        caps.add_chrome_arg(&format!("--lang={lang}")).map_err(caps_err)?;

        caps.add_chrome_arg(&format!(
            "--window-size={},{}",
            identity.viewport.width, identity.viewport.height
        ))
        .map_err(caps_err)?;
        caps.add_chrome_arg(&format!(
            "--force-device-scale-factor={}",
            identity.viewport.device_scale_factor
        ))
        .map_err(caps_err)?;

        caps.add_chrome_arg(&format!("--proxy-server={}", identity.proxy.proxy_url()))
            .map_err(caps_err)?;

        for arg in HARDENING_ARGS {
            caps.add_chrome_arg(arg).map_err(caps_err)?;
        }

        if self.settings.headless {
            caps.set_headless().map_err(caps_err)?;
        }

        caps.add_chrome_option("excludeSwitches", json!(["enable-automation"]))
            .map_err(caps_err)?;
        caps.add_chrome_option("useAutomationExtension", json!(false))
            .map_err(caps_err)?;

        Ok(caps)
    }
}

#[async_trait]
impl DriverFactory for ChromeDriverFactory {
    async fn launch(&self, identity: &Identity) -> Result<Box<dyn PageDriver>, FetchError> {
        let caps = self.build_capabilities(identity)?;

        let driver = WebDriver::new(&self.settings.webdriver_url, caps)
            .await
            .map_err(|e| FetchError::Network(format!("webdriver session: {e}")))?;

        let page = WebDriverPage {
            dev_tools: ChromeDevTools::new(driver.handle.clone()),
            driver,
            page_load_timeout: self.page_load_timeout,
        };

        page.driver
            .set_page_load_timeout(self.page_load_timeout)
            .await
            .map_err(|e| page.classify(e))?;

        page.dev_tools
            .execute_cdp("Network.enable")
            .await
            .map_err(|e| page.classify(e))?;

        if !self.settings.blocked_resource_patterns.is_empty() {
            page.dev_tools
                .execute_cdp_with_params(
                    "Network.setBlockedURLs",
                    json!({ "urls": self.settings.blocked_resource_patterns }),
                )
                .await
                .map_err(|e| page.classify(e))?;
        }

        page.dev_tools
            .execute_cdp_with_params(
                "Network.setExtraHTTPHeaders",
                json!({ "headers": identity.headers }),
            )
            .await
            .map_err(|e| page.classify(e))?;

        page.dev_tools
            .execute_cdp_with_params(
                "Emulation.setGeolocationOverride",
                json!({
                    "latitude": identity.geolocation.latitude,
                    "longitude": identity.geolocation.longitude,
                    "accuracy": 100,
                }),
            )
            .await
            .map_err(|e| page.classify(e))?;

        debug!(
            "Launched browser session via proxy {}",
            identity.proxy.key()
        );

        Ok(Box::new(page))
    }
}

pub struct WebDriverPage {
    driver: WebDriver,
    dev_tools: ChromeDevTools,
    page_load_timeout: Duration,
}

impl WebDriverPage {
    /// Sort a raw WebDriver failure into the fetch taxonomy by its message;
    /// the protocol does not carry a structured cause.
    fn classify(&self, e: WebDriverError) -> FetchError {
        let message = e.to_string();
        let lower = message.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            FetchError::Timeout(self.page_load_timeout)
        } else if lower.contains("net::")
            || lower.contains("dns")
            || lower.contains("connection")
        {
            FetchError::Network(message)
        } else {
            FetchError::Protocol(message)
        }
    }

    async fn execute(&self, script: &str, args: Vec<serde_json::Value>) -> Result<serde_json::Value, FetchError> {
        let ret = self
            .driver
            .execute(script, args)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(ret.json().clone())
    }
}

#[async_trait]
impl PageDriver for WebDriverPage {
    async fn navigate(&self, url: &str) -> Result<(), FetchError> {
        debug!("Navigating to {}", url);
        self.driver.goto(url).await.map_err(|e| self.classify(e))
    }

    async fn navigation_status(&self) -> Result<NavigationStatus, FetchError> {
        let value = self.execute(NAVIGATION_PROBE, Vec::new()).await?;

        let status = value
            .get("status")
            .and_then(|v| v.as_u64())
            .map(|v| v as u16);
        let redirect_count = value
            .get("redirectCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        Ok(NavigationStatus {
            status,
            redirect_count,
        })
    }

    async fn title(&self) -> Result<String, FetchError> {
        self.driver.title().await.map_err(|e| self.classify(e))
    }

    async fn page_source(&self) -> Result<String, FetchError> {
        self.driver.source().await.map_err(|e| self.classify(e))
    }

    async fn harvest_links(&self) -> Result<Vec<String>, FetchError> {
        let value = self.execute(HARVEST_LINKS, Vec::new()).await?;

        let links = value
            .as_array()
            .map(|array| {
                array
                    .iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(links)
    }

    async fn install_init_script(&self, script: &str) -> Result<(), FetchError> {
        self.dev_tools
            .execute_cdp_with_params(
                "Page.addScriptToEvaluateOnNewDocument",
                json!({ "source": script }),
            )
            .await
            .map_err(|e| self.classify(e))?;
        Ok(())
    }

    async fn move_pointer(&self, x: i64, y: i64) -> Result<(), FetchError> {
        self.driver
            .action_chain()
            .move_by_offset(x, y)
            .perform()
            .await
            .map_err(|e| self.classify(e))
    }

    async fn scroll_by(&self, pixels: i64, smooth: bool) -> Result<(), FetchError> {
        let behavior = if smooth { "smooth" } else { "auto" };
        let script = format!(
            "window.scrollBy({{ top: {pixels}, left: 0, behavior: '{behavior}' }});"
        );
        self.execute(&script, Vec::new()).await?;
        Ok(())
    }

    async fn refresh(&self) -> Result<(), FetchError> {
        self.driver.refresh().await.map_err(|e| self.classify(e))
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, FetchError> {
        let value = self
            .dev_tools
            .execute_cdp("Network.getAllCookies")
            .await
            .map_err(|e| self.classify(e))?;

        let mut cookies = Vec::new();
        if let Some(entries) = value.get("cookies").and_then(|v| v.as_array()) {
            for entry in entries {
                let name = entry.get("name").and_then(|v| v.as_str());
                let value = entry.get("value").and_then(|v| v.as_str());
                let (Some(name), Some(value)) = (name, value) else {
                    continue;
                };

                // -1 marks a session cookie in the devtools protocol
                let expiry = entry
                    .get("expires")
                    .and_then(|v| v.as_f64())
                    .filter(|secs| *secs > 0.0)
                    .map(|secs| secs as i64);

                cookies.push(Cookie {
                    name: name.to_string(),
                    value: value.to_string(),
                    domain: entry
                        .get("domain")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    path: entry
                        .get("path")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    secure: entry
                        .get("secure")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                    http_only: entry
                        .get("httpOnly")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                    expiry,
                });
            }
        }

        Ok(cookies)
    }

    async fn restore_cookies(&self, cookies: &[Cookie]) -> Result<(), FetchError> {
        for cookie in cookies {
            let Some(domain) = &cookie.domain else {
                warn!("Skipping restored cookie {} without a domain", cookie.name);
                continue;
            };

            let mut params = json!({
                "name": cookie.name,
                "value": cookie.value,
                "domain": domain,
                "path": cookie.path.as_deref().unwrap_or("/"),
                "secure": cookie.secure,
                "httpOnly": cookie.http_only,
            });
            if let Some(expiry) = cookie.expiry {
                params["expires"] = json!(expiry);
            }

            self.dev_tools
                .execute_cdp_with_params("Network.setCookie", params)
                .await
                .map_err(|e| self.classify(e))?;
        }

        Ok(())
    }

    async fn local_storage(&self) -> Result<HashMap<String, String>, FetchError> {
        let value = self.execute(READ_LOCAL_STORAGE, Vec::new()).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn restore_local_storage(
        &self,
        entries: &HashMap<String, String>,
    ) -> Result<(), FetchError> {
        if entries.is_empty() {
            return Ok(());
        }

        let args = serde_json::to_value(entries)
            .map_err(|e| FetchError::Protocol(e.to_string()))?;
        self.execute(WRITE_LOCAL_STORAGE, vec![args]).await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), FetchError> {
        let timeout = self.page_load_timeout;
        self.driver.quit().await.map_err(|e| {
            let message = e.to_string();
            if message.to_lowercase().contains("timeout") {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Protocol(message)
            }
        })
    }
}
