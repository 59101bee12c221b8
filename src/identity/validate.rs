use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::identity::sources::ProxyCandidate;

/// Markers that show up when a broken proxy echoes the request environment
/// back instead of forwarding it.
pub const DEBUG_MARKERS: [&str; 3] = ["REMOTE_ADDR", "REQUEST_METHOD", "HTTP_HOST"];

/// How a test endpoint reports the caller's IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpSchema {
    /// JSON body with an `origin` field (httpbin style)
    JsonOrigin,
    /// JSON body with an `ip` field (ipify/myip style)
    JsonIp,
    /// Bare dotted-quad text body
    PlainText,
}

#[derive(Debug, Clone)]
pub struct TestEndpoint {
    pub url: String,
    pub schema: IpSchema,
}

fn default_endpoints() -> Vec<TestEndpoint> {
    vec![
        TestEndpoint {
            url: "https://httpbin.org/ip".to_string(),
            schema: IpSchema::JsonOrigin,
        },
        TestEndpoint {
            url: "http://api.ipify.org?format=json".to_string(),
            schema: IpSchema::JsonIp,
        },
        TestEndpoint {
            url: "https://ifconfig.me/ip".to_string(),
            schema: IpSchema::PlainText,
        },
        TestEndpoint {
            url: "https://api.myip.com".to_string(),
            schema: IpSchema::JsonIp,
        },
    ]
}

/// Extract the reported IP from a response body, or `None` when the body
/// does not match the endpoint's schema.
pub fn parse_ip_response(schema: IpSchema, body: &str) -> Option<String> {
    match schema {
        IpSchema::JsonOrigin => {
            let value: serde_json::Value = serde_json::from_str(body).ok()?;
            value.get("origin")?.as_str().map(|s| s.to_string())
        }
        IpSchema::JsonIp => {
            let value: serde_json::Value = serde_json::from_str(body).ok()?;
            value.get("ip")?.as_str().map(|s| s.to_string())
        }
        IpSchema::PlainText => {
            let trimmed = body.trim();
            let looks_like_ip = trimmed.split('.').count() == 4
                && trimmed.split('.').all(|octet| octet.parse::<u8>().is_ok());
            looks_like_ip.then(|| trimmed.to_string())
        }
    }
}

pub fn contains_debug_markers(body: &str) -> bool {
    DEBUG_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Decides whether a candidate proxy actually forwards traffic.
#[async_trait]
pub trait ProxyValidator: Send + Sync {
    async fn validate(&self, candidate: &ProxyCandidate) -> bool;
}

/// Validates candidates against shuffled "what is my IP" endpoints, routed
/// through the candidate itself.
pub struct WhatIsMyIpValidator {
    endpoints: Vec<TestEndpoint>,
    request_timeout: Duration,
    latency_cap: Duration,
}

impl WhatIsMyIpValidator {
    pub fn new(request_timeout: Duration, latency_cap: Duration) -> Self {
        Self {
            endpoints: default_endpoints(),
            request_timeout,
            latency_cap,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<TestEndpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn build_client(&self, candidate: &ProxyCandidate) -> Option<Client> {
        let proxy = match Proxy::all(candidate.proxy_url()) {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!("Invalid proxy URL for {}: {}", candidate.key(), e);
                return None;
            }
        };

        Client::builder()
            .proxy(proxy)
            .timeout(self.request_timeout)
            .redirect(Policy::limited(5))
            .danger_accept_invalid_certs(true)
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
            )
            .build()
            .ok()
    }

    /// One endpoint attempt. Fails fast on non-200, debug markers, excess
    /// latency, malformed bodies, and on the proxy echoing its own address
    /// back (it never forwarded the request).
    async fn try_endpoint(
        &self,
        client: &Client,
        endpoint: &TestEndpoint,
        candidate: &ProxyCandidate,
    ) -> bool {
        let started = Instant::now();
        let response = match client.get(&endpoint.url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Proxy {} failed {}: {}", candidate.key(), endpoint.url, e);
                return false;
            }
        };

        if response.status().as_u16() != 200 {
            debug!(
                "Proxy {} got status {} from {}",
                candidate.key(),
                response.status(),
                endpoint.url
            );
            return false;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(_) => return false,
        };

        if started.elapsed() > self.latency_cap {
            warn!(
                "Proxy {} is too slow: {:?}",
                candidate.key(),
                started.elapsed()
            );
            return false;
        }

        if contains_debug_markers(&body) {
            warn!(
                "Proxy {} returned debug headers instead of content",
                candidate.key()
            );
            return false;
        }

        match parse_ip_response(endpoint.schema, &body) {
            Some(reported_ip) if reported_ip == candidate.address => {
                warn!(
                    "Proxy {} echoed its own address; it did not forward",
                    candidate.key()
                );
                false
            }
            Some(reported_ip) => {
                debug!(
                    "Proxy {} validated via {} (exit IP {})",
                    candidate.key(),
                    endpoint.url,
                    reported_ip
                );
                true
            }
            None => {
                debug!(
                    "Proxy {} returned an invalid response format from {}",
                    candidate.key(),
                    endpoint.url
                );
                false
            }
        }
    }
}

#[async_trait]
impl ProxyValidator for WhatIsMyIpValidator {
    async fn validate(&self, candidate: &ProxyCandidate) -> bool {
        if candidate.address.is_empty() || candidate.port == 0 {
            return false;
        }

        let client = match self.build_client(candidate) {
            Some(client) => client,
            None => return false,
        };

        let mut endpoints = self.endpoints.clone();
        {
            let mut rng = rand::thread_rng();
            endpoints.shuffle(&mut rng);
        }

        for endpoint in &endpoints {
            if self.try_endpoint(&client, endpoint, candidate).await {
                return true;
            }
        }

        debug!("All validation endpoints failed for {}", candidate.key());
        false
    }
}
