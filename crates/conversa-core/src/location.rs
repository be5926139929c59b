//! Where the user is, as far as a reverse geocoder can tell, and the
//! time-of-day greeting built from it.

use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{Local, Timelike};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

pub const CITY_UNSUPPORTED: &str = "Geolocalização não suportada";
pub const CITY_UNAVAILABLE: &str = "Localização indisponível";
pub const CITY_UNKNOWN: &str = "Localização desconhecida";
pub const COUNTRY_UNKNOWN: &str = "País não identificado";

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub coordinates: Option<(f64, f64)>,
    pub city: String,
    pub country: String,
    pub timezone: String,
}

impl Location {
    pub fn fallback(coordinates: Option<(f64, f64)>, city: &str) -> Self {
        Self {
            coordinates,
            city: city.to_string(),
            country: COUNTRY_UNKNOWN.to_string(),
            timezone: local_timezone(),
        }
    }

    /// False for every fallback city label.
    pub fn city_known(&self) -> bool {
        ![CITY_UNSUPPORTED, CITY_UNAVAILABLE, CITY_UNKNOWN].contains(&self.city.as_str())
    }
}

fn local_timezone() -> String {
    Local::now().offset().to_string()
}

/// Source of the user's location. Never fails; errors become fallbacks.
pub trait LocationProvider: Send + Sync {
    fn locate(&self) -> BoxFuture<'_, Location>;
}

#[derive(Deserialize, Default)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    country: Option<String>,
}

#[derive(Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    address: NominatimAddress,
}

/// Reverse geocoding of fixed coordinates through OpenStreetMap Nominatim.
#[derive(Clone)]
pub struct NominatimLocator {
    client: Client,
    base_url: String,
    coordinates: Option<(f64, f64)>,
    timeout: Duration,
}

impl NominatimLocator {
    pub fn new(coordinates: Option<(f64, f64)>, timeout: Duration) -> Self {
        Self::with_base_url("https://nominatim.openstreetmap.org", coordinates, timeout)
    }

    pub fn with_base_url(base_url: &str, coordinates: Option<(f64, f64)>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            coordinates,
            timeout,
        }
    }

    async fn reverse(&self, lat: f64, lon: f64) -> Result<NominatimAddress> {
        let url = format!(
            "{}/reverse?format=json&lat={}&lon={}&zoom=10",
            self.base_url, lat, lon
        );
        let response = self
            .client
            .get(&url)
            .header("User-Agent", concat!("conversa/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Nominatim request failed: {}", response.status()));
        }

        let body: NominatimResponse = response.json().await?;
        Ok(body.address)
    }

    pub async fn lookup(&self) -> Location {
        let Some((lat, lon)) = self.coordinates else {
            return Location::fallback(None, CITY_UNSUPPORTED);
        };

        match tokio::time::timeout(self.timeout, self.reverse(lat, lon)).await {
            Ok(Ok(address)) => {
                let city = address
                    .city
                    .or(address.town)
                    .or(address.village)
                    .unwrap_or_else(|| CITY_UNKNOWN.to_string());
                debug!(%city, "location resolved");
                Location {
                    coordinates: self.coordinates,
                    city,
                    country: address.country.unwrap_or_else(|| COUNTRY_UNKNOWN.to_string()),
                    timezone: local_timezone(),
                }
            }
            Ok(Err(e)) => {
                warn!("reverse geocoding failed: {}", e);
                Location::fallback(self.coordinates, CITY_UNKNOWN)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "reverse geocoding timed out");
                Location::fallback(None, CITY_UNAVAILABLE)
            }
        }
    }
}

impl LocationProvider for NominatimLocator {
    fn locate(&self) -> BoxFuture<'_, Location> {
        self.lookup().boxed()
    }
}

pub fn greeting(hour: u32, location: &Location) -> String {
    let mut greeting = match hour {
        5..=11 => "Bom dia".to_string(),
        12..=17 => "Boa tarde".to_string(),
        _ => "Boa noite".to_string(),
    };
    if location.city_known() {
        greeting.push_str(" em ");
        greeting.push_str(&location.city);
    }
    format!("{}! Como posso ajudar você hoje?", greeting)
}

pub async fn greet(provider: &dyn LocationProvider) -> String {
    let location = provider.locate().await;
    greeting(Local::now().hour(), &location)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(city: &str) -> Location {
        Location {
            coordinates: Some((-22.9, -43.2)),
            city: city.to_string(),
            country: "Brasil".to_string(),
            timezone: "-03:00".to_string(),
        }
    }

    #[test]
    fn test_greeting_by_hour() {
        let somewhere = Location::fallback(None, CITY_UNKNOWN);
        assert_eq!(greeting(4, &somewhere), "Boa noite! Como posso ajudar você hoje?");
        assert_eq!(greeting(5, &somewhere), "Bom dia! Como posso ajudar você hoje?");
        assert_eq!(greeting(11, &somewhere), "Bom dia! Como posso ajudar você hoje?");
        assert_eq!(greeting(12, &somewhere), "Boa tarde! Como posso ajudar você hoje?");
        assert_eq!(greeting(17, &somewhere), "Boa tarde! Como posso ajudar você hoje?");
        assert_eq!(greeting(18, &somewhere), "Boa noite! Como posso ajudar você hoje?");
    }

    #[test]
    fn test_greeting_names_known_city() {
        assert_eq!(
            greeting(9, &at("Rio de Janeiro")),
            "Bom dia em Rio de Janeiro! Como posso ajudar você hoje?"
        );
    }

    #[test]
    fn test_fallback_cities_are_unknown() {
        for city in [CITY_UNSUPPORTED, CITY_UNAVAILABLE, CITY_UNKNOWN] {
            assert!(!Location::fallback(None, city).city_known());
        }
        assert!(at("Recife").city_known());
    }

    #[tokio::test]
    async fn test_no_coordinates_is_unsupported() {
        let locator = NominatimLocator::new(None, Duration::from_secs(5));
        let location = locator.locate().await;
        assert_eq!(location.city, CITY_UNSUPPORTED);
        assert_eq!(location.country, COUNTRY_UNKNOWN);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unknown() {
        let locator = NominatimLocator::with_base_url(
            "http://127.0.0.1:9",
            Some((0.0, 0.0)),
            Duration::from_secs(5),
        );
        let location = locator.locate().await;
        assert!(!location.city_known());
        assert_eq!(location.country, COUNTRY_UNKNOWN);
    }

    #[tokio::test]
    async fn test_silent_service_times_out_as_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever answering.
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeout = Duration::from_millis(200);
        let locator =
            NominatimLocator::with_base_url(&format!("http://{}", addr), Some((0.0, 0.0)), timeout);
        let started = std::time::Instant::now();
        let location = locator.locate().await;
        let elapsed = started.elapsed();

        assert_eq!(location.city, CITY_UNAVAILABLE);
        assert_eq!(location.country, COUNTRY_UNKNOWN);
        assert!(elapsed >= timeout);
        assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
        server.abort();
    }

    #[test]
    fn test_address_prefers_city_then_town() {
        let body: NominatimResponse =
            serde_json::from_str(r#"{"address":{"town":"Paraty","country":"Brasil"}}"#).unwrap();
        assert_eq!(body.address.city.or(body.address.town).as_deref(), Some("Paraty"));
        let empty: NominatimResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.address.country.is_none());
    }
}
