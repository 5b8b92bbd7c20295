//! Address geocoding.
//!
//! The [`Geocoder`] trait is the seam between the service and whatever
//! resolves free-text addresses. [`HereGeocoder`] (feature `remote`) talks
//! to the HERE geocoding API.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Coordinate;

/// Public HERE geocode endpoint.
pub const HERE_GEOCODE_URL: &str = "https://geocode.search.hereapi.com/v1/geocode";

/// Resolves a free-text address to a coordinate.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the address matched nothing.
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>>;
}

#[cfg(feature = "remote")]
pub use here::HereGeocoder;

#[cfg(feature = "remote")]
mod here {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::Deserialize;

    use super::{Geocoder, HERE_GEOCODE_URL};
    use crate::error::{AccessError, Result};
    use crate::model::Coordinate;

    #[derive(Debug, Deserialize)]
    struct GeocodeResponse {
        #[serde(default)]
        items: Vec<GeocodeItem>,
    }

    #[derive(Debug, Deserialize)]
    struct GeocodeItem {
        position: Position,
    }

    #[derive(Debug, Deserialize)]
    struct Position {
        lat: f64,
        lng: f64,
    }

    /// HERE geocoding client.
    ///
    /// The API key travels as a query parameter, so transport errors are
    /// reported without their URL.
    pub struct HereGeocoder {
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
    }

    impl HereGeocoder {
        pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
            Self::with_endpoint(HERE_GEOCODE_URL, api_key, timeout)
        }

        /// Client for a non-default endpoint (e.g. a regional mirror).
        pub fn with_endpoint(
            endpoint: impl Into<String>,
            api_key: impl Into<String>,
            timeout: Duration,
        ) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| AccessError::Geocoder(e.without_url().to_string()))?;
            Ok(Self {
                client,
                endpoint: endpoint.into(),
                api_key: api_key.into(),
            })
        }
    }

    #[async_trait]
    impl Geocoder for HereGeocoder {
        async fn geocode(&self, address: &str) -> Result<Option<Coordinate>> {
            let response = self
                .client
                .get(&self.endpoint)
                .query(&[("q", address), ("apiKey", self.api_key.as_str())])
                .send()
                .await
                .map_err(|e| AccessError::Geocoder(e.without_url().to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AccessError::Geocoder(format!(
                    "geocoder returned HTTP {status}"
                )));
            }

            let body: GeocodeResponse = response
                .json()
                .await
                .map_err(|e| AccessError::Geocoder(e.without_url().to_string()))?;

            let Some(item) = body.items.into_iter().next() else {
                tracing::debug!(address, "geocoder returned no match");
                return Ok(None);
            };
            let coordinate = Coordinate::new(item.position.lat, item.position.lng)
                .map_err(|_| AccessError::Geocoder("geocoder returned invalid coordinates".into()))?;
            tracing::debug!(address, lat = coordinate.lat, lon = coordinate.lon, "geocoded address");
            Ok(Some(coordinate))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn geocoder(server: &MockServer) -> HereGeocoder {
            HereGeocoder::with_endpoint(
                format!("{}/v1/geocode", server.uri()),
                "secret-key",
                Duration::from_secs(5),
            )
            .unwrap()
        }

        #[tokio::test]
        async fn test_first_item_wins() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/geocode"))
                .and(query_param("q", "Bệnh viện Bạch Mai"))
                .and(query_param("apiKey", "secret-key"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "items": [
                        {"position": {"lat": 21.0010, "lng": 105.8412}},
                        {"position": {"lat": 10.0, "lng": 106.0}}
                    ]
                })))
                .mount(&server)
                .await;

            let coordinate = geocoder(&server)
                .geocode("Bệnh viện Bạch Mai")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(coordinate, Coordinate { lat: 21.0010, lon: 105.8412 });
        }

        #[tokio::test]
        async fn test_no_items_is_none() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})),
                )
                .mount(&server)
                .await;

            assert_eq!(geocoder(&server).geocode("nowhere").await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_http_error_does_not_leak_key() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(401))
                .mount(&server)
                .await;

            let err = geocoder(&server).geocode("Hà Nội").await.unwrap_err();
            assert!(matches!(err, AccessError::Geocoder(_)));
            assert!(!err.to_string().contains("secret-key"));
        }

        #[tokio::test]
        async fn test_transport_error_does_not_leak_key() {
            let geocoder = HereGeocoder::with_endpoint(
                "http://127.0.0.1:9/v1/geocode",
                "secret-key",
                Duration::from_secs(2),
            )
            .unwrap();
            let err = geocoder.geocode("Hà Nội").await.unwrap_err();
            assert!(!err.to_string().contains("secret-key"));
        }
    }
}
