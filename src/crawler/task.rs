use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

/// One unit of crawl work. `remaining_depth` counts down toward zero; a task
/// is only ever created with a positive budget.
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub url: Url,
    pub remaining_depth: u32,
}

/// The logged outcome of one attempted URL.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub url: String,
    pub depth: u32,
    pub success: bool,
    pub links: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlResult {
    pub fn success(url: &Url, depth: u32, links: &[Url]) -> Self {
        Self {
            url: url.to_string(),
            depth,
            success: true,
            links: links.iter().map(|link| link.to_string()).collect(),
            finished_at: Utc::now(),
        }
    }

    pub fn failure(url: &Url, depth: u32) -> Self {
        Self {
            url: url.to_string(),
            depth,
            success: false,
            links: Vec::new(),
            finished_at: Utc::now(),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug)]
pub struct CrawlReport {
    pub run_id: Uuid,
    pub root: String,
    pub pages_stored: u32,
    pub results: Vec<CrawlResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlReport {
    pub fn successes(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failures(&self) -> usize {
        self.results.len() - self.successes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_split_by_outcome() {
        let url = Url::parse("https://example.com/").unwrap();
        let report = CrawlReport {
            run_id: Uuid::new_v4(),
            root: url.to_string(),
            pages_stored: 1,
            results: vec![
                CrawlResult::success(&url, 2, &[]),
                CrawlResult::failure(&url, 2),
                CrawlResult::failure(&url, 1),
            ],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        assert_eq!(report.successes(), 1);
        assert_eq!(report.failures(), 2);
    }
}
