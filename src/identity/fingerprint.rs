use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

use crate::identity::geo::GeoPoint;
use crate::identity::sources::ProxyCandidate;

/// A complete outbound identity: one validated proxy plus the browser
/// fingerprint presented through it. Assigned to exactly one fetch attempt.
#[derive(Debug, Clone)]
pub struct Identity {
    pub proxy: ProxyCandidate,
    pub user_agent: String,
    pub viewport: Viewport,
    pub geolocation: GeoPoint,
    pub headers: HashMap<String, String>,
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: u32,
}

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:131.0) Gecko/20100101 Firefox/131.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:132.0) Gecko/20100101 Firefox/132.0",
];

const VIEWPORT_WIDTHS: [u32; 5] = [1366, 1440, 1536, 1920, 2560];
const VIEWPORT_HEIGHTS: [u32; 5] = [768, 900, 1024, 1080, 1440];

const ACCEPT_LANGUAGES: [&str; 4] = [
    "en-US,en;q=0.9",
    "fr-FR,fr;q=0.9",
    "de-DE,de;q=0.9",
    "es-ES,es;q=0.9",
];
const ACCEPT_ENCODINGS: [&str; 2] = ["gzip, deflate, br", "identity, *"];
const ACCEPT_TYPES: [&str; 2] = [
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    "application/json, text/plain, */*",
];
const CONNECTIONS: [&str; 2] = ["keep-alive", "close"];
const SEC_FETCH_SITES: [&str; 3] = ["none", "same-origin", "cross-site"];
const SEC_FETCH_MODES: [&str; 3] = ["navigate", "cors", "no-cors"];
const SEC_FETCH_USERS: [&str; 2] = ["?1", "?0"];
const SEC_FETCH_DESTS: [&str; 4] = ["document", "empty", "image", "script"];

/// Synthesize a user agent for one session.
pub fn random_user_agent() -> String {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .expect("user agent pool is non-empty")
        .to_string()
}

/// Pick a plausible desktop viewport.
pub fn random_viewport() -> Viewport {
    let mut rng = rand::thread_rng();
    Viewport {
        width: *VIEWPORT_WIDTHS.choose(&mut rng).expect("non-empty"),
        height: *VIEWPORT_HEIGHTS.choose(&mut rng).expect("non-empty"),
        device_scale_factor: if rng.gen_bool(0.5) { 1 } else { 2 },
    }
}

/// Randomize the ambient HTTP header set presented by the session.
pub fn random_headers() -> HashMap<String, String> {
    let mut rng = rand::thread_rng();
    let mut headers = HashMap::new();

    let mut pick = |pool: &[&str]| pool.choose(&mut rng).expect("non-empty").to_string();

    headers.insert("Accept-Language".to_string(), pick(&ACCEPT_LANGUAGES));
    headers.insert("Accept-Encoding".to_string(), pick(&ACCEPT_ENCODINGS));
    headers.insert("Accept".to_string(), pick(&ACCEPT_TYPES));
    headers.insert("Connection".to_string(), pick(&CONNECTIONS));
    headers.insert("Upgrade-Insecure-Requests".to_string(), "1".to_string());
    headers.insert("Cache-Control".to_string(), "max-age=0".to_string());
    headers.insert("Sec-Fetch-Site".to_string(), pick(&SEC_FETCH_SITES));
    headers.insert("Sec-Fetch-Mode".to_string(), pick(&SEC_FETCH_MODES));
    headers.insert("Sec-Fetch-User".to_string(), pick(&SEC_FETCH_USERS));
    headers.insert("Sec-Fetch-Dest".to_string(), pick(&SEC_FETCH_DESTS));

    headers
}

/// Decorate a validated proxy with a synthesized browser fingerprint.
pub fn decorate(proxy: ProxyCandidate, geolocation: GeoPoint) -> Identity {
    Identity {
        proxy,
        user_agent: random_user_agent(),
        viewport: random_viewport(),
        geolocation,
        headers: random_headers(),
    }
}
