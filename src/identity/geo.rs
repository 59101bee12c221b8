use rand::Rng;
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// A latitude/longitude pair, printed the way browser geolocation flags
/// expect it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// How a lookup service encodes a successful answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoSchema {
    /// `{"status": "success", "lat": .., "lon": ..}` (ip-api style)
    StatusLatLon,
    /// `{"latitude": .., "longitude": ..}` (freegeoip style)
    LatitudeLongitude,
    /// `{"loc": "lat,lon"}` (ipinfo style)
    LocPair,
}

#[derive(Debug, Clone)]
pub struct GeoService {
    /// `{ip}` is replaced with the address being located
    pub url_template: String,
    pub schema: GeoSchema,
}

fn default_services() -> Vec<GeoService> {
    vec![
        GeoService {
            url_template: "http://ip-api.com/json/{ip}".to_string(),
            schema: GeoSchema::StatusLatLon,
        },
        GeoService {
            url_template: "https://freegeoip.app/json/{ip}".to_string(),
            schema: GeoSchema::LatitudeLongitude,
        },
        GeoService {
            url_template: "https://ipinfo.io/{ip}/json".to_string(),
            schema: GeoSchema::LocPair,
        },
    ]
}

/// Major-city coordinates used when every lookup service fails.
const FALLBACK_CITIES: [(&str, f64, f64); 10] = [
    ("New York", 40.7128, -74.0060),
    ("London", 51.5074, -0.1278),
    ("Paris", 48.8566, 2.3522),
    ("Tokyo", 35.6762, 139.6503),
    ("Sydney", -33.8688, 151.2093),
    ("Berlin", 52.5200, 13.4050),
    ("Toronto", 43.6532, -79.3832),
    ("Singapore", 1.3521, 103.8198),
    ("Los Angeles", 34.0522, -118.2437),
    ("Chicago", 41.8781, -87.6298),
];

/// Jitter applied to fallback coordinates, roughly one kilometre.
const FALLBACK_JITTER_DEGREES: f64 = 0.01;

/// Parse a lookup service body per its schema. `None` means the service
/// answered but did not locate the address.
pub fn parse_geo_response(schema: GeoSchema, body: &str) -> Option<GeoPoint> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    match schema {
        GeoSchema::StatusLatLon => {
            if value.get("status")?.as_str()? != "success" {
                return None;
            }
            Some(GeoPoint {
                latitude: value.get("lat")?.as_f64()?,
                longitude: value.get("lon")?.as_f64()?,
            })
        }
        GeoSchema::LatitudeLongitude => {
            if value.get("error").is_some() {
                return None;
            }
            Some(GeoPoint {
                latitude: value.get("latitude")?.as_f64()?,
                longitude: value.get("longitude")?.as_f64()?,
            })
        }
        GeoSchema::LocPair => {
            let (lat, lon) = value.get("loc")?.as_str()?.split_once(',')?;
            Some(GeoPoint {
                latitude: lat.trim().parse().ok()?,
                longitude: lon.trim().parse().ok()?,
            })
        }
    }
}

/// Pick a random fallback city and jitter it so repeated fallbacks do not
/// all land on the exact same point.
pub fn fallback_geolocation() -> GeoPoint {
    let mut rng = rand::thread_rng();
    let (_, lat, lon) = FALLBACK_CITIES[rng.gen_range(0..FALLBACK_CITIES.len())];
    GeoPoint {
        latitude: lat + rng.gen_range(-FALLBACK_JITTER_DEGREES..=FALLBACK_JITTER_DEGREES),
        longitude: lon + rng.gen_range(-FALLBACK_JITTER_DEGREES..=FALLBACK_JITTER_DEGREES),
    }
}

/// Resolves an IP to coordinates via a chain of lookup services; the first
/// successful parse wins and total failure degrades to a fallback city.
pub struct GeoResolver {
    client: Client,
    services: Vec<GeoService>,
}

impl GeoResolver {
    pub fn new() -> Self {
        Self::with_services(default_services())
    }

    pub fn with_services(services: Vec<GeoService>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, services }
    }

    pub async fn resolve(&self, ip: &str) -> GeoPoint {
        for service in &self.services {
            let url = service.url_template.replace("{ip}", ip);

            let body = match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        debug!("Geolocation body read failed for {url}: {e}");
                        continue;
                    }
                },
                Ok(response) => {
                    debug!("Geolocation service {url} returned {}", response.status());
                    continue;
                }
                Err(e) => {
                    debug!("Geolocation request to {url} failed: {e}");
                    continue;
                }
            };

            if let Some(point) = parse_geo_response(service.schema, &body) {
                debug!("Resolved {ip} to {point} via {url}");
                return point;
            }
        }

        warn!("Failed to geolocate {ip} from all services, using fallback city");
        fallback_geolocation()
    }
}

impl Default for GeoResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_each_service_schema() {
        let ip_api = r#"{"status": "success", "lat": 51.5, "lon": -0.12}"#;
        let point = parse_geo_response(GeoSchema::StatusLatLon, ip_api).unwrap();
        assert_eq!(point.latitude, 51.5);

        let freegeoip = r#"{"latitude": 40.71, "longitude": -74.0}"#;
        let point = parse_geo_response(GeoSchema::LatitudeLongitude, freegeoip).unwrap();
        assert_eq!(point.longitude, -74.0);

        let ipinfo = r#"{"loc": "35.6762,139.6503"}"#;
        let point = parse_geo_response(GeoSchema::LocPair, ipinfo).unwrap();
        assert_eq!(point.latitude, 35.6762);
    }

    #[test]
    fn rejects_failed_lookups() {
        assert!(parse_geo_response(
            GeoSchema::StatusLatLon,
            r#"{"status": "fail", "message": "private range"}"#
        )
        .is_none());
        assert!(parse_geo_response(
            GeoSchema::LatitudeLongitude,
            r#"{"error": true}"#
        )
        .is_none());
        assert!(parse_geo_response(GeoSchema::LocPair, r#"{"bogon": true}"#).is_none());
    }

    #[test]
    fn fallback_stays_near_a_known_city() {
        let point = fallback_geolocation();
        let near_city = FALLBACK_CITIES.iter().any(|(_, lat, lon)| {
            (point.latitude - lat).abs() <= FALLBACK_JITTER_DEGREES + 1e-9
                && (point.longitude - lon).abs() <= FALLBACK_JITTER_DEGREES + 1e-9
        });
        assert!(near_city, "fallback point {point} not near any city");
    }

    #[test]
    fn display_uses_six_decimals() {
        let point = GeoPoint {
            latitude: 1.5,
            longitude: -2.25,
        };
        assert_eq!(point.to_string(), "1.500000,-2.250000");
    }

    #[tokio::test]
    async fn first_successful_service_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/1.2.3.4"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b/1.2.3.4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "latitude": 48.8566, "longitude": 2.3522
            })))
            .mount(&server)
            .await;

        let resolver = GeoResolver::with_services(vec![
            GeoService {
                url_template: format!("{}/a/{{ip}}", server.uri()),
                schema: GeoSchema::StatusLatLon,
            },
            GeoService {
                url_template: format!("{}/b/{{ip}}", server.uri()),
                schema: GeoSchema::LatitudeLongitude,
            },
        ]);

        let point = resolver.resolve("1.2.3.4").await;
        assert_eq!(point.latitude, 48.8566);
    }

    #[tokio::test]
    async fn all_services_failing_degrades_to_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = GeoResolver::with_services(vec![GeoService {
            url_template: format!("{}/geo/{{ip}}", server.uri()),
            schema: GeoSchema::StatusLatLon,
        }]);

        let point = resolver.resolve("1.2.3.4").await;
        assert!(point.latitude.abs() <= 90.0 && point.longitude.abs() <= 180.0);
    }
}
