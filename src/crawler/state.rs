//! Shared state for one crawl run. Each concern sits behind its own lock so
//! the critical sections stay short; nothing here is global to the process.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use url::Url;

use crate::crawler::task::{CrawlResult, CrawlTask};

/// Canonical form of a URL for visited-set membership: no fragment, no
/// bare-root trailing slash, query parameters in stable order. The url
/// crate already lowercases hosts and drops default ports at parse time.
pub fn normalize(url: &Url) -> String {
    let mut normalized = url.clone();

    normalized.set_fragment(None);

    if let Some(query) = normalized.query() {
        if !query.is_empty() {
            let mut params: Vec<&str> = query.split('&').collect();
            params.sort_unstable();
            let sorted = params.join("&");
            normalized.set_query(Some(&sorted));
        }
    }

    // The serializer always writes the bare-root slash; strip it here so
    // "https://x.com" and "https://x.com/" collapse to one key.
    let mut rendered = normalized.to_string();
    if normalized.path() == "/" {
        if let Some(pos) = rendered.find("/?") {
            rendered.remove(pos);
        } else if rendered.ends_with('/') {
            rendered.pop();
        }
    }

    rendered
}

pub struct CrawlState {
    queue: Mutex<VecDeque<CrawlTask>>,
    visited: Mutex<HashSet<String>>,
    pages_stored: Mutex<u32>,
    in_flight: AtomicUsize,
    results: Mutex<Vec<CrawlResult>>,
    page_limit: u32,
}

impl CrawlState {
    pub fn new(root: CrawlTask, page_limit: u32) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(root);

        Self {
            queue: Mutex::new(queue),
            visited: Mutex::new(HashSet::new()),
            pages_stored: Mutex::new(0),
            in_flight: AtomicUsize::new(0),
            results: Mutex::new(Vec::new()),
            page_limit,
        }
    }

    /// Take the next task and mark it in flight, atomically with respect to
    /// the queue, so an empty queue plus zero in-flight reliably means done.
    pub async fn pop(&self) -> Option<CrawlTask> {
        let mut queue = self.queue.lock().await;
        let task = queue.pop_front()?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(task)
    }

    /// The paired release for `pop`, called after the task's links have been
    /// enqueued.
    pub fn task_done(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn idle(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// First claim wins: membership test and insert are one critical section.
    pub async fn claim_visit(&self, url: &Url) -> bool {
        self.visited.lock().await.insert(normalize(url))
    }

    /// Pre-fetch gate. Racing successes are still re-checked at commit time.
    pub async fn limit_reached(&self) -> bool {
        *self.pages_stored.lock().await >= self.page_limit
    }

    /// Count a fetched page against the limit. `false` means the budget was
    /// spent while this fetch was running and the page must be discarded.
    pub async fn try_commit_page(&self) -> bool {
        let mut stored = self.pages_stored.lock().await;
        if *stored < self.page_limit {
            *stored += 1;
            true
        } else {
            false
        }
    }

    /// Enqueue follow-up tasks, skipping URLs already visited. Visited
    /// membership is claimed again at pop time, so a URL queued twice by
    /// racing workers is still fetched once.
    pub async fn push_children(&self, tasks: Vec<CrawlTask>) {
        let visited = self.visited.lock().await;
        let mut queue = self.queue.lock().await;
        for task in tasks {
            if !visited.contains(&normalize(&task.url)) {
                queue.push_back(task);
            }
        }
    }

    pub async fn record(&self, result: CrawlResult) {
        self.results.lock().await.push(result);
    }

    pub async fn pages_stored(&self) -> u32 {
        *self.pages_stored.lock().await
    }

    pub async fn take_results(&self) -> Vec<CrawlResult> {
        std::mem::take(&mut *self.results.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(url: &str, depth: u32) -> CrawlTask {
        CrawlTask {
            url: Url::parse(url).unwrap(),
            remaining_depth: depth,
        }
    }

    #[test]
    fn normalize_strips_fragment_root_slash_and_orders_query() {
        let url = Url::parse("https://Example.com:443/?b=2&a=1#top").unwrap();
        assert_eq!(normalize(&url), "https://example.com?a=1&b=2");

        let plain = Url::parse("https://example.com/articles/42").unwrap();
        assert_eq!(normalize(&plain), "https://example.com/articles/42");
    }

    #[test]
    fn normalize_equates_fragment_variants() {
        let a = Url::parse("https://example.com/page#intro").unwrap();
        let b = Url::parse("https://example.com/page").unwrap();
        assert_eq!(normalize(&a), normalize(&b));
    }

    #[tokio::test]
    async fn visit_claim_is_exclusive() {
        let state = CrawlState::new(task("https://example.com/", 2), 10);
        let url = Url::parse("https://example.com/a").unwrap();
        let variant = Url::parse("https://example.com/a#section").unwrap();

        assert!(state.claim_visit(&url).await);
        assert!(!state.claim_visit(&url).await);
        assert!(!state.claim_visit(&variant).await);
    }

    #[tokio::test]
    async fn commit_stops_at_the_page_limit() {
        let state = CrawlState::new(task("https://example.com/", 2), 2);

        assert!(state.try_commit_page().await);
        assert!(state.try_commit_page().await);
        assert!(!state.try_commit_page().await);
        assert_eq!(state.pages_stored().await, 2);
        assert!(state.limit_reached().await);
    }

    #[tokio::test]
    async fn pop_tracks_in_flight_until_done() {
        let state = CrawlState::new(task("https://example.com/", 2), 10);

        let popped = state.pop().await.unwrap();
        assert_eq!(popped.url.as_str(), "https://example.com/");
        assert!(!state.idle());

        state.task_done();
        assert!(state.idle());
        assert!(state.pop().await.is_none());
    }

    #[tokio::test]
    async fn visited_children_are_not_requeued() {
        let state = CrawlState::new(task("https://example.com/", 2), 10);
        let seen = Url::parse("https://example.com/seen").unwrap();
        state.claim_visit(&seen).await;

        state
            .push_children(vec![
                task("https://example.com/seen", 1),
                task("https://example.com/new", 1),
            ])
            .await;

        // Root plus the one unseen child.
        assert!(state.pop().await.is_some());
        let next = state.pop().await.unwrap();
        assert_eq!(next.url.as_str(), "https://example.com/new");
        assert!(state.pop().await.is_none());
    }
}
