//! Command implementations: production wiring of the library components.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::auth::StaticTokenVerifier;
use crate::browser::ChromeDriverFactory;
use crate::config::AppConfig;
use crate::crawler::CrawlOrchestrator;
use crate::error::CrawlError;
use crate::fetcher::{LinkFilter, PageFetcher, RateLimiter};
use crate::identity::{
    GeoResolver, IdentityManager, ProviderApiSource, ProxyLedger, ProxySource, ScrapedListSource,
    WhatIsMyIpValidator,
};
use crate::session::SessionStore;
use crate::storage::{HtmlStripper, PostgresStore};

/// Run one crawl with the full production stack.
pub async fn crawl(
    mut config: AppConfig,
    url: String,
    token: String,
    depth: Option<u32>,
    limit: Option<u32>,
) -> Result<()> {
    if let Some(depth) = depth {
        config.crawler.max_depth = depth;
    }
    if let Some(limit) = limit {
        config.crawler.page_limit = limit;
    }

    let base = Url::parse(&url).context("invalid root URL")?;

    let identity = &config.identity;
    let sources: Vec<Box<dyn ProxySource>> = vec![
        Box::new(ProviderApiSource::new(
            &identity.provider_api_url,
            &identity.provider_api_token,
            identity.provider_page_size,
            identity.source_retries,
            Duration::from_millis(identity.source_retry_delay_ms),
        )),
        Box::new(ScrapedListSource::new(&identity.scrape_url)),
    ];

    let identities = Arc::new(IdentityManager::new(
        sources,
        Box::new(WhatIsMyIpValidator::new(
            Duration::from_secs(identity.validation_timeout_secs),
            Duration::from_millis(identity.validation_latency_cap_ms),
        )),
        GeoResolver::new(),
        ProxyLedger::new(&identity.data_dir),
        identity.candidate_attempts,
        identity.pool_rebuilds,
    ));

    let fetcher = Arc::new(PageFetcher::new(
        identities,
        Arc::new(ChromeDriverFactory::new(
            config.browser.clone(),
            Duration::from_secs(config.fetcher.page_load_timeout_secs),
        )),
        SessionStore::new(&config.identity.data_dir),
        Arc::new(RateLimiter::new(
            config.fetcher.rate_limit_quota,
            Duration::from_millis(config.fetcher.rate_limit_window_ms),
        )),
        LinkFilter::new(base, config.links.clone()),
        config.fetcher.clone(),
    ));

    let store = Arc::new(
        PostgresStore::connect(&config.storage)
            .await
            .context("connecting to the page store")?,
    );

    let orchestrator = CrawlOrchestrator::new(
        fetcher,
        store,
        Arc::new(HtmlStripper::new()),
        Arc::new(StaticTokenVerifier::new(config.auth.authorized_tokens)),
        config.crawler,
    );

    let response = orchestrator.crawl(&url, &token).await;
    if response.success {
        info!("{}", response.message);
        Ok(())
    } else {
        Err(CrawlError::Run(response.message).into())
    }
}

/// Print the active configuration as YAML.
pub fn show_config(config: AppConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(&config).context("serializing configuration")?;
    println!("{yaml}");
    Ok(())
}

/// Write the default configuration file.
pub fn init_config() -> Result<()> {
    let config = AppConfig::default();
    config.save_as_default()?;
    Ok(())
}
