//! WMS/WFS pass-through to the map server.
//!
//! Requests are validated here, forwarded once, and the upstream status,
//! content type and body are handed back untouched. There is no retry and
//! no caching.

use std::time::Duration;

use bytes::Bytes;

use crate::error::{AccessError, Result};

const DEFAULT_WMS_FORMAT: &str = "image/png";
const DEFAULT_WFS_FORMAT: &str = "application/json";
const DEFAULT_TILE_SIZE: u32 = 256;

fn provided(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_size(value: Option<&str>, name: &'static str) -> Result<u32> {
    match provided(value) {
        None => Ok(DEFAULT_TILE_SIZE),
        Some(v) => match v.parse::<u32>() {
            Ok(size) if size > 0 => Ok(size),
            _ => Err(AccessError::invalid(
                name,
                format!("'{v}' is not a positive integer"),
            )),
        },
    }
}

/// A validated GetMap request.
#[derive(Debug, Clone, PartialEq)]
pub struct WmsRequest {
    pub bbox: String,
    pub layer: Option<String>,
    pub format: String,
    pub width: u32,
    pub height: u32,
}

impl WmsRequest {
    pub fn from_params(
        bbox: Option<&str>,
        layer: Option<&str>,
        format: Option<&str>,
        width: Option<&str>,
        height: Option<&str>,
    ) -> Result<Self> {
        let bbox = provided(bbox).ok_or(AccessError::MissingParameter { name: "bbox" })?;
        Ok(Self {
            bbox: bbox.to_string(),
            layer: provided(layer).map(str::to_string),
            format: provided(format).unwrap_or(DEFAULT_WMS_FORMAT).to_string(),
            width: parse_size(width, "width")?,
            height: parse_size(height, "height")?,
        })
    }

    /// Query parameters sent upstream.
    pub fn upstream_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("service", "WMS".to_string()),
            ("version", "1.1.1".to_string()),
            ("request", "GetMap".to_string()),
            ("layers", self.layer.clone().unwrap_or_default()),
            ("bbox", self.bbox.clone()),
            ("width", self.width.to_string()),
            ("height", self.height.to_string()),
            ("srs", "EPSG:3857".to_string()),
            ("format", self.format.clone()),
            ("transparent", "true".to_string()),
        ]
    }
}

/// A validated GetFeature request.
#[derive(Debug, Clone, PartialEq)]
pub struct WfsRequest {
    pub layer: String,
    pub format: String,
}

impl WfsRequest {
    pub fn from_params(layer: Option<&str>, format: Option<&str>) -> Result<Self> {
        let layer = provided(layer).ok_or(AccessError::MissingParameter { name: "layer" })?;
        Ok(Self {
            layer: layer.to_string(),
            format: provided(format).unwrap_or(DEFAULT_WFS_FORMAT).to_string(),
        })
    }

    pub fn upstream_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("service", "WFS".to_string()),
            ("version", "1.0.0".to_string()),
            ("request", "GetFeature".to_string()),
            ("typeName", self.layer.clone()),
            ("outputFormat", self.format.clone()),
        ]
    }
}

/// An upstream response, relayed as-is.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Client for one map server.
#[derive(Clone)]
pub struct MapProxy {
    client: reqwest::Client,
    wms_url: String,
    wfs_url: String,
}

impl MapProxy {
    /// Proxy for a GeoServer at `base_url`.
    ///
    /// WMS goes to `<base>/nawapi/wms`, WFS to `<base>/wfs`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AccessError::Gateway(e.to_string()))?;
        Ok(Self {
            client,
            wms_url: format!("{base}/nawapi/wms"),
            wfs_url: format!("{base}/wfs"),
        })
    }

    pub async fn get_map(&self, request: &WmsRequest) -> Result<ProxyResponse> {
        self.forward(&self.wms_url, &request.upstream_params()).await
    }

    pub async fn get_features(&self, request: &WfsRequest) -> Result<ProxyResponse> {
        self.forward(&self.wfs_url, &request.upstream_params()).await
    }

    async fn forward(&self, url: &str, params: &[(&'static str, String)]) -> Result<ProxyResponse> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| AccessError::Gateway(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| AccessError::Gateway(e.to_string()))?;

        tracing::debug!(url, status, bytes = body.len(), "map server responded");
        Ok(ProxyResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_wms_defaults_and_validation() {
        let request = WmsRequest::from_params(Some("0,0,1,1"), Some("roads"), None, None, None).unwrap();
        assert_eq!(request.format, "image/png");
        assert_eq!((request.width, request.height), (256, 256));

        assert!(matches!(
            WmsRequest::from_params(None, Some("roads"), None, None, None),
            Err(AccessError::MissingParameter { name: "bbox" })
        ));
        assert!(matches!(
            WmsRequest::from_params(Some("0,0,1,1"), None, None, Some("wide"), None),
            Err(AccessError::InvalidParameter { name: "width", .. })
        ));
        assert!(WmsRequest::from_params(Some("0,0,1,1"), None, None, None, Some("0")).is_err());
    }

    #[test]
    fn test_wfs_requires_layer() {
        assert!(matches!(
            WfsRequest::from_params(None, None),
            Err(AccessError::MissingParameter { name: "layer" })
        ));
        let request = WfsRequest::from_params(Some("nawapi:health"), None).unwrap();
        assert_eq!(request.format, "application/json");
    }

    #[tokio::test]
    async fn test_get_map_relays_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geoserver/nawapi/wms"))
            .and(query_param("service", "WMS"))
            .and(query_param("version", "1.1.1"))
            .and(query_param("request", "GetMap"))
            .and(query_param("srs", "EPSG:3857"))
            .and(query_param("transparent", "true"))
            .and(query_param("layers", "nawapi:roads"))
            .and(query_param("width", "512"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
            )
            .mount(&server)
            .await;

        let proxy = MapProxy::new(&format!("{}/geoserver/", server.uri()), Duration::from_secs(5)).unwrap();
        let request = WmsRequest::from_params(
            Some("11760000,2420000,11790000,2450000"),
            Some("nawapi:roads"),
            None,
            Some("512"),
            None,
        )
        .unwrap();
        let response = proxy.get_map(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("image/png"));
        assert_eq!(&response.body[..], &[0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_relayed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wfs"))
            .and(query_param("typeName", "nawapi:missing"))
            .and(query_param("outputFormat", "application/json"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such layer"))
            .mount(&server)
            .await;

        let proxy = MapProxy::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let request = WfsRequest::from_params(Some("nawapi:missing"), None).unwrap();
        let response = proxy.get_features(&request).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(&response.body[..], b"no such layer");
    }

    #[tokio::test]
    async fn test_transport_failure_is_gateway_error() {
        let proxy = MapProxy::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let request = WfsRequest::from_params(Some("nawapi:health"), None).unwrap();
        let err = proxy.get_features(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }
}
