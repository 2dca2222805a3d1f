//! HTTP request manager backed by `reqwest`.
//!
//! Calls to the API host carry the full signed header set; calls to the
//! web-facing host are rewritten under `/api/f` and sent without headers,
//! since that host authenticates by cookie.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use clover_core::{ApiError, CloverError, HeaderSigner, Headers};

use crate::body::RequestBody;

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Configuration for `RequestManager`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Authenticated API host.
    pub api_base: String,
    /// Web-facing host (cookie auth, `/api/f` prefix).
    pub web_base: String,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.clover.space".into(),
            web_base: "https://www.clover.space".into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One outbound HTTP call.
#[derive(Debug, Clone)]
pub struct ApiRequest<'a> {
    pub method: Method,
    pub endpoint: &'a str,
    pub params: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
    pub web: bool,
    pub extra_headers: Headers,
}

impl<'a> ApiRequest<'a> {
    pub fn new(method: Method, endpoint: &'a str) -> Self {
        Self {
            method,
            endpoint,
            params: Vec::new(),
            body: None,
            content_type: None,
            web: false,
            extra_headers: Headers::new(),
        }
    }

    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn web(mut self, web: bool) -> Self {
        self.web = web;
        self
    }

    pub fn extra_headers(mut self, headers: Headers) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}

/// Ensure a leading slash, append the query string, and apply the web prefix.
pub fn normalize_endpoint(endpoint: &str, params: &[(String, String)], web: bool) -> String {
    let mut path = if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    };
    if !params.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        path.push('?');
        path.push_str(&query);
    }
    if web {
        path = format!("/api/f{path}");
    }
    path
}

/// Decode a response body as JSON, surfacing any `apiCode` as an error.
///
/// The HTTP status is not consulted; the server reports failures in the body.
pub fn decode_response(bytes: &[u8]) -> Result<Value, CloverError> {
    let unreadable = || CloverError::BadResponse("can't read response from Clover.Space API".into());
    let text = std::str::from_utf8(bytes).map_err(|_| unreadable())?;
    let value: Value = serde_json::from_str(text).map_err(|_| unreadable())?;
    if let Some(object) = value.as_object() {
        if object.contains_key("apiCode") {
            return Err(CloverError::Api(ApiError::from_object(object)));
        }
    }
    Ok(value)
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap, CloverError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| CloverError::Http(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| CloverError::Http(format!("invalid value for header {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Signed HTTP client for the Clover.Space API.
pub struct RequestManager {
    signer: Arc<HeaderSigner>,
    http: reqwest::Client,
    config: HttpClientConfig,
}

impl RequestManager {
    pub fn new(signer: Arc<HeaderSigner>, config: HttpClientConfig) -> Result<Self, CloverError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CloverError::Http(e.to_string()))?;

        Ok(Self {
            signer,
            http,
            config,
        })
    }

    /// Create with default hosts and timeout.
    pub fn with_defaults(signer: Arc<HeaderSigner>) -> Result<Self, CloverError> {
        Self::new(signer, HttpClientConfig::default())
    }

    /// The signer shared with any websocket session built from this manager.
    pub fn signer(&self) -> &Arc<HeaderSigner> {
        &self.signer
    }

    pub async fn ensure_device_id(&self) -> Result<&str, CloverError> {
        self.signer.ensure_device_id().await
    }

    pub async fn build_headers(
        &self,
        endpoint: &str,
        body: &[u8],
        extra: &Headers,
    ) -> Result<Headers, CloverError> {
        self.signer.build_headers(endpoint, body, extra).await
    }

    pub async fn request(&self, req: ApiRequest<'_>) -> Result<Value, CloverError> {
        let endpoint = normalize_endpoint(req.endpoint, &req.params, req.web);
        let base = if req.web {
            &self.config.web_base
        } else {
            &self.config.api_base
        };

        tracing::debug!(
            method = %req.method,
            endpoint = %endpoint,
            bytes = req.body.as_ref().map(Vec::len),
            "HTTP request"
        );

        let mut builder = self.http.request(req.method, format!("{base}{endpoint}"));
        if !req.web {
            let mut extra = req.extra_headers;
            if let Some(ct) = req.content_type {
                extra.insert("Content-Type".into(), ct);
            }
            let body = req.body.as_deref().unwrap_or_default();
            let headers = self.signer.build_headers(&endpoint, body, &extra).await?;
            builder = builder.headers(to_header_map(&headers)?);
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| CloverError::Http(e.to_string()))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CloverError::Http(e.to_string()))?;

        decode_response(&bytes)
    }

    pub async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        web: bool,
        extra_headers: Headers,
    ) -> Result<Value, CloverError> {
        self.request(
            ApiRequest::new(Method::GET, endpoint)
                .params(params.iter().copied())
                .web(web)
                .extra_headers(extra_headers),
        )
        .await
    }

    pub async fn delete(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        web: bool,
    ) -> Result<Value, CloverError> {
        self.request(
            ApiRequest::new(Method::DELETE, endpoint)
                .params(params.iter().copied())
                .web(web),
        )
        .await
    }

    /// POST `body`. When `content_type` is `None` a multipart body supplies
    /// its own; other bodies are sent without one.
    pub async fn post(
        &self,
        endpoint: &str,
        body: RequestBody,
        content_type: Option<&str>,
        web: bool,
    ) -> Result<Value, CloverError> {
        let content_type = content_type
            .map(str::to_owned)
            .or_else(|| body.implied_content_type());
        let mut req = ApiRequest::new(Method::POST, endpoint)
            .body(body.into_bytes()?)
            .web(web);
        req.content_type = content_type;
        self.request(req).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
        web: bool,
    ) -> Result<Value, CloverError> {
        self.post(endpoint, RequestBody::json(body)?, Some(JSON_CONTENT_TYPE), web)
            .await
    }

    pub async fn post_empty(&self, endpoint: &str, web: bool) -> Result<Value, CloverError> {
        self.post(endpoint, RequestBody::Text(String::new()), None, web)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn endpoint_gets_leading_slash() {
        assert_eq!(normalize_endpoint("v1/users", &[], false), "/v1/users");
        assert_eq!(normalize_endpoint("/v1/users", &[], false), "/v1/users");
    }

    #[test]
    fn endpoint_query_is_form_encoded() {
        let p = params(&[("q", "hello world"), ("tag", "a&b")]);
        assert_eq!(
            normalize_endpoint("/v1/search", &p, false),
            "/v1/search?q=hello+world&tag=a%26b"
        );
    }

    #[test]
    fn web_endpoint_is_prefixed_after_query() {
        let p = params(&[("limit", "10")]);
        assert_eq!(
            normalize_endpoint("v1/feed", &p, true),
            "/api/f/v1/feed?limit=10"
        );
    }

    #[test]
    fn decode_plain_json() {
        let v = decode_response(br#"{"user":{"uid":1}}"#).unwrap();
        assert_eq!(v["user"]["uid"], 1);
    }

    #[test]
    fn decode_api_code_is_error_even_when_zero() {
        let err = decode_response(br#"{"apiCode":0,"apiMsg":"odd"}"#).unwrap_err();
        assert_eq!(err.api_code(), Some(0));

        let err = decode_response(br#"{"apiCode":2001,"apiMsg":"not found"}"#).unwrap_err();
        match err {
            CloverError::Api(e) => {
                assert_eq!(e.code, 2001);
                assert_eq!(e.context, json!({"apiCode": 2001, "apiMsg": "not found"}));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_garbage_is_bad_response() {
        assert!(matches!(decode_response(b"<html>"), Err(CloverError::BadResponse(_))));
        assert!(matches!(decode_response(&[0xff, 0xfe]), Err(CloverError::BadResponse(_))));
    }

    #[test]
    fn header_map_rejects_invalid_names() {
        let bad = Headers::from([("bad header".to_string(), "v".to_string())]);
        assert!(to_header_map(&bad).is_err());
        let good = Headers::from([("deviceId".to_string(), "abc".to_string())]);
        assert_eq!(to_header_map(&good).unwrap()["deviceid"], "abc");
    }
}
