//! Breadth-first crawl orchestration: a fixed worker pool racing one shared
//! queue, bounded by depth and a page limit, with per-URL retry and
//! store-integrated success handling.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::{AuthVerifier, Caller};
use crate::config::CrawlSettings;
use crate::crawler::state::CrawlState;
use crate::crawler::task::{CrawlReport, CrawlResult, CrawlTask};
use crate::error::CrawlError;
use crate::fetcher::Fetcher;
use crate::storage::{PageStore, SiteRecord, TextSanitizer};
use crate::utils::with_retry;

/// Poll interval for workers waiting on in-flight peers to enqueue more work.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// What the caller gets back.
#[derive(Debug, Clone)]
pub struct CrawlResponse {
    pub success: bool,
    pub message: String,
}

pub struct CrawlOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn PageStore>,
    sanitizer: Arc<dyn TextSanitizer>,
    verifier: Arc<dyn AuthVerifier>,
    settings: CrawlSettings,
}

impl CrawlOrchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn PageStore>,
        sanitizer: Arc<dyn TextSanitizer>,
        verifier: Arc<dyn AuthVerifier>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            fetcher,
            store,
            sanitizer,
            verifier,
            settings,
        }
    }

    /// Outer boundary: authorize, validate the root, run, summarize.
    pub async fn crawl(&self, root_url: &str, token: &str) -> CrawlResponse {
        let caller = match self.verifier.verify(token).await {
            Some(caller) => caller,
            None => {
                warn!("Rejected crawl request with an unknown token");
                return CrawlResponse {
                    success: false,
                    message: CrawlError::Unauthorized.to_string(),
                };
            }
        };

        let root = match parse_root(root_url) {
            Ok(root) => root,
            Err(e) => {
                return CrawlResponse {
                    success: false,
                    message: e.to_string(),
                }
            }
        };

        let report = self.run(root, &caller).await;
        CrawlResponse {
            success: true,
            message: format!(
                "crawl {}: stored {} pages ({} fetched, {} failed)",
                report.run_id,
                report.pages_stored,
                report.successes(),
                report.failures()
            ),
        }
    }

    /// Run one crawl to completion and report on it.
    pub async fn run(&self, root: Url, caller: &Caller) -> CrawlReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            "Crawl {} starting at {} (depth {}, limit {}, {} workers)",
            run_id,
            root,
            self.settings.max_depth,
            self.settings.page_limit,
            self.settings.concurrency
        );

        let state = CrawlState::new(
            CrawlTask {
                url: root.clone(),
                remaining_depth: self.settings.max_depth,
            },
            self.settings.page_limit,
        );

        let workers = (0..self.settings.concurrency.max(1)).map(|_| self.worker(&state, caller));
        join_all(workers).await;

        let results = state.take_results().await;
        let report = CrawlReport {
            run_id,
            root: root.to_string(),
            pages_stored: state.pages_stored().await,
            results,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            "Crawl {} finished: {} pages stored, {} URLs failed",
            report.run_id,
            report.pages_stored,
            report.failures()
        );
        for result in &report.results {
            debug!(
                "  {} depth={} success={} links={}",
                result.url,
                result.depth,
                result.success,
                result.links.len()
            );
        }

        report
    }

    /// One worker: drain the queue, and keep polling while peers still have
    /// tasks in flight that may enqueue more.
    async fn worker(&self, state: &CrawlState, caller: &Caller) {
        loop {
            match state.pop().await {
                Some(task) => {
                    self.process(state, task, caller).await;
                    state.task_done();
                }
                None => {
                    if state.idle() {
                        break;
                    }
                    sleep(IDLE_POLL).await;
                }
            }
        }
    }

    async fn process(&self, state: &CrawlState, task: CrawlTask, caller: &Caller) {
        if task.remaining_depth == 0 {
            return;
        }
        if !state.claim_visit(&task.url).await {
            return;
        }
        if state.limit_reached().await {
            return;
        }

        let fetched = with_retry(
            || self.fetcher.fetch(&task.url),
            self.settings.retry_attempts,
            Duration::from_millis(self.settings.retry_base_delay_ms),
            task.url.as_str(),
        )
        .await;

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                warn!("Giving up on {}: {}", task.url, e);
                state
                    .record(CrawlResult::failure(&task.url, task.remaining_depth))
                    .await;
                return;
            }
        };

        // The limit may have been spent while this fetch was running. The
        // page is dropped, but the attempt still gets a non-success entry so
        // every attempted URL shows up in the run summary.
        if !state.try_commit_page().await {
            debug!("Discarding {}: page limit reached mid-fetch", task.url);
            state
                .record(CrawlResult::failure(&task.url, task.remaining_depth))
                .await;
            return;
        }

        let record = SiteRecord {
            client_id: caller.client_id.clone(),
            path: task.url.to_string(),
            title: page.title.clone(),
            description: page.description.clone(),
            content: self.sanitizer.sanitize(&page.content),
            links_csv: page
                .links
                .iter()
                .map(|link| link.to_string())
                .collect::<Vec<_>>()
                .join(","),
            level: task.remaining_depth,
        };

        if let Err(e) = self.store.upsert(&record).await {
            warn!("Failed to store {}: {}", task.url, e);
            state
                .record(CrawlResult::failure(&task.url, task.remaining_depth))
                .await;
            return;
        }

        state
            .record(CrawlResult::success(
                &task.url,
                task.remaining_depth,
                &page.links,
            ))
            .await;

        if task.remaining_depth > 1 {
            let children = page
                .links
                .iter()
                .map(|link| CrawlTask {
                    url: link.clone(),
                    remaining_depth: task.remaining_depth - 1,
                })
                .collect();
            state.push_children(children).await;
        }
    }
}

fn parse_root(raw: &str) -> Result<Url, CrawlError> {
    let url = Url::parse(raw).map_err(|_| CrawlError::InvalidUrl(raw.to_string()))?;

    if url.host_str().is_none() || (url.scheme() != "http" && url.scheme() != "https") {
        return Err(CrawlError::InvalidUrl(raw.to_string()));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use crate::auth::StaticTokenVerifier;
    use crate::error::FetchError;
    use crate::fetcher::FetchedPage;
    use crate::storage::{HtmlStripper, MemoryStore};

    /// Serves a canned link graph and records every fetch.
    struct GraphFetcher {
        graph: HashMap<String, Vec<String>>,
        fail: HashSet<String>,
        fetched: Mutex<Vec<String>>,
    }

    impl GraphFetcher {
        fn new(edges: &[(&str, &[&str])]) -> Self {
            let graph = edges
                .iter()
                .map(|(from, to)| {
                    (
                        from.to_string(),
                        to.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect();
            Self {
                graph,
                fail: HashSet::new(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, url: &str) -> Self {
            self.fail.insert(url.to_string());
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for GraphFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
            self.fetched.lock().unwrap().push(url.to_string());

            if self.fail.contains(url.as_str()) {
                return Err(FetchError::Network("connection reset".to_string()));
            }

            let links = self
                .graph
                .get(url.as_str())
                .cloned()
                .unwrap_or_default()
                .iter()
                .filter_map(|link| Url::parse(link).ok())
                .collect();

            Ok(FetchedPage {
                url: url.clone(),
                title: "Title".to_string(),
                description: None,
                content: "<p>body</p>".to_string(),
                links,
            })
        }
    }

    fn settings(page_limit: u32) -> CrawlSettings {
        CrawlSettings {
            max_depth: 2,
            concurrency: 5,
            page_limit,
            retry_attempts: 2,
            retry_base_delay_ms: 10,
        }
    }

    fn verifier() -> Arc<StaticTokenVerifier> {
        let mut tokens = HashMap::new();
        tokens.insert("tok-1".to_string(), "client-a".to_string());
        Arc::new(StaticTokenVerifier::new(tokens))
    }

    fn orchestrator(
        fetcher: Arc<GraphFetcher>,
        store: Arc<MemoryStore>,
        settings: CrawlSettings,
    ) -> CrawlOrchestrator {
        CrawlOrchestrator::new(
            fetcher,
            store,
            Arc::new(HtmlStripper::new()),
            verifier(),
            settings,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn cyclic_graph_is_visited_once_per_url() {
        let fetcher = Arc::new(GraphFetcher::new(&[
            ("https://site.test/", &["https://site.test/a"]),
            ("https://site.test/a", &["https://site.test/", "https://site.test/a"]),
        ]));
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(fetcher.clone(), store, settings(10));

        let response = orchestrator.crawl("https://site.test/", "tok-1").await;
        assert!(response.success);

        let mut fetched = fetcher.fetched();
        fetched.sort();
        assert_eq!(fetched, vec!["https://site.test/", "https://site.test/a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn depth_counts_down_and_zero_is_never_dispatched() {
        // root -> a -> b: with depth 2 the chain stops before b.
        let fetcher = Arc::new(GraphFetcher::new(&[
            ("https://site.test/", &["https://site.test/a"]),
            ("https://site.test/a", &["https://site.test/b"]),
        ]));
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(fetcher.clone(), store, settings(10));

        let caller = Caller {
            client_id: "client-a".to_string(),
        };
        let report = orchestrator
            .run(Url::parse("https://site.test/").unwrap(), &caller)
            .await;

        assert!(!fetcher.fetched().contains(&"https://site.test/b".to_string()));

        let depth_of = |url: &str| {
            report
                .results
                .iter()
                .find(|r| r.url == url)
                .map(|r| r.depth)
        };
        assert_eq!(depth_of("https://site.test/"), Some(2));
        assert_eq!(depth_of("https://site.test/a"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn page_limit_holds_under_concurrency() {
        // A root fanning out to 19 children, all fetchable.
        let children: Vec<String> = (1..20)
            .map(|n| format!("https://site.test/page/{n}"))
            .collect();
        let child_refs: Vec<&str> = children.iter().map(|s| s.as_str()).collect();

        let fetcher = Arc::new(GraphFetcher::new(&[(
            "https://site.test/",
            child_refs.as_slice(),
        )]));
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(fetcher.clone(), store.clone(), settings(3));

        let caller = Caller {
            client_id: "client-a".to_string(),
        };
        let report = orchestrator
            .run(Url::parse("https://site.test/").unwrap(), &caller)
            .await;

        assert_eq!(report.pages_stored, 3);
        assert_eq!(report.successes(), 3);
        assert_eq!(store.records().await.len(), 3);

        // Every fetched URL leaves exactly one result entry, including any
        // fetch that lost the limit race and was discarded.
        assert_eq!(report.results.len(), fetcher.fetched().len());
    }

    #[tokio::test(start_paused = true)]
    async fn leaf_page_with_no_links_is_a_success() {
        let fetcher = Arc::new(GraphFetcher::new(&[("https://site.test/", &[])]));
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(fetcher, store, settings(10));

        let caller = Caller {
            client_id: "client-a".to_string(),
        };
        let report = orchestrator
            .run(Url::parse("https://site.test/").unwrap(), &caller)
            .await;

        assert_eq!(report.successes(), 1);
        assert_eq!(report.failures(), 0);
        assert!(report.results[0].links.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_log_a_failure_and_the_run_continues() {
        let fetcher = Arc::new(
            GraphFetcher::new(&[
                ("https://site.test/", &["https://site.test/bad", "https://site.test/ok"]),
                ("https://site.test/ok", &[]),
            ])
            .failing("https://site.test/bad"),
        );
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(fetcher.clone(), store, settings(10));

        let caller = Caller {
            client_id: "client-a".to_string(),
        };
        let report = orchestrator
            .run(Url::parse("https://site.test/").unwrap(), &caller)
            .await;

        assert_eq!(report.successes(), 2);
        assert_eq!(report.failures(), 1);

        // Two attempts against the failing URL, per the retry policy.
        let bad_attempts = fetcher
            .fetched()
            .iter()
            .filter(|u| u.as_str() == "https://site.test/bad")
            .count();
        assert_eq!(bad_attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_root_fails_without_fetching() {
        let fetcher = Arc::new(GraphFetcher::new(&[]));
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(fetcher.clone(), store, settings(10));

        for bad in ["not a url", "ftp://site.test/", "data:text/plain,hi"] {
            let response = orchestrator.crawl(bad, "tok-1").await;
            assert!(!response.success, "{bad} was accepted");
        }
        assert!(fetcher.fetched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_token_is_rejected() {
        let fetcher = Arc::new(GraphFetcher::new(&[]));
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(fetcher.clone(), store, settings(10));

        let response = orchestrator.crawl("https://site.test/", "tok-2").await;
        assert!(!response.success);
        assert!(fetcher.fetched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stored_record_carries_sanitized_content_and_caller() {
        let fetcher = Arc::new(GraphFetcher::new(&[("https://site.test/", &[])]));
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(fetcher, store.clone(), settings(10));

        let response = orchestrator.crawl("https://site.test/", "tok-1").await;
        assert!(response.success);

        let record = store.get("https://site.test/").await.unwrap();
        assert_eq!(record.client_id, "client-a");
        assert_eq!(record.content, "body");
        assert_eq!(record.level, 2);
    }
}
