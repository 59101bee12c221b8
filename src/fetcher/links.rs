//! Resolves and filters links harvested from a page before they are offered
//! back to the crawl queue.

use regex::Regex;
use std::collections::HashSet;
use tracing::trace;
use url::Url;

use crate::config::LinkSettings;

pub struct LinkFilter {
    base: Url,
    settings: LinkSettings,
    extension_suffix: Regex,
}

impl LinkFilter {
    pub fn new(base: Url, settings: LinkSettings) -> Self {
        Self {
            base,
            settings,
            // last path segment ends in something extension-like
            extension_suffix: Regex::new(r"\.[A-Za-z0-9]+$").expect("valid literal pattern"),
        }
    }

    /// Resolve raw candidates against the page URL, drop what the settings
    /// exclude, dedup preserving first-seen order.
    pub fn filter(&self, page_url: &Url, raw: Vec<String>) -> Vec<Url> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut kept = Vec::new();

        for candidate in raw {
            let Ok(resolved) = page_url.join(candidate.trim()) else {
                trace!("Dropping unparsable link {candidate}");
                continue;
            };

            if self.keep(&resolved) && seen.insert(resolved.as_str().to_string()) {
                kept.push(resolved);
            }
        }

        kept
    }

    fn keep(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        if !self.settings.include_external_links && url.host_str() != self.base.host_str() {
            return false;
        }

        if self.settings.base_url_only && !url.as_str().starts_with(self.base.as_str()) {
            return false;
        }

        let absolute = url.as_str();
        if self
            .settings
            .exclude_patterns
            .iter()
            .any(|pattern| absolute.contains(pattern.as_str()))
        {
            return false;
        }

        if self.extension_suffix.is_match(url.path()) {
            return false;
        }

        true
    }
}
