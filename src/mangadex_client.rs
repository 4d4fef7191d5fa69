use async_trait::async_trait;
use log::{debug, error};
use reqwest::{header::ACCEPT, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::{form_urlencoded, Url};

use crate::configuration::Settings;
use crate::error::{CatalogError, Result};

/// One GET against the catalog API: a path plus query parameters. Keys may
/// repeat (`includes[]=author&includes[]=artist`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl SourceRequest {
    pub fn new(path: impl Into<String>) -> Self {
        SourceRequest {
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn params<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        for value in values {
            self.params.push((key.to_string(), value.to_string()));
        }
        self
    }

    /// Identifier attached to errors: the path with its encoded query string.
    pub fn resource(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.params)
            .finish();
        format!("{}?{}", self.path, query)
    }

    /// Parameters as the JSON object the relay expects. Repeated keys become
    /// arrays.
    pub fn relay_params(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.params {
            match map.get_mut(key) {
                Some(Value::Array(values)) => values.push(Value::from(value.as_str())),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::from(value.as_str())]);
                }
                None => {
                    map.insert(key.clone(), Value::from(value.as_str()));
                }
            }
        }
        Value::Object(map)
    }
}

/// Where catalog JSON comes from. Production code talks HTTP; tests hand in a
/// canned source.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self, request: &SourceRequest) -> Result<Value>;
}

pub struct HttpCatalogSource {
    client: ClientWithMiddleware,
    api_base_url: Url,
    relay_url: Option<Url>,
}

impl HttpCatalogSource {
    pub fn new(settings: &Settings) -> std::result::Result<Self, reqwest::Error> {
        // Transient failures are retried with increasing intervals between attempts
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(settings.max_retries);
        let http_client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .build()?;
        let client = ClientBuilder::new(http_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(HttpCatalogSource {
            client,
            api_base_url: settings.api_base_url.clone(),
            relay_url: settings.relay_url.clone(),
        })
    }

    fn endpoint(&self, request: &SourceRequest) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}{}",
            self.api_base_url.as_str().trim_end_matches('/'),
            request.path
        ))
        .map_err(|e| CatalogError::malformed(request.resource(), e))?;
        if !request.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.params);
        }
        Ok(url)
    }

    /// `{relay}?path=/manga&params={"title":"..."}`; the relay rebuilds the
    /// upstream query from the JSON object.
    fn relay_endpoint(relay: &Url, request: &SourceRequest) -> Url {
        let mut url = relay.clone();
        url.query_pairs_mut()
            .append_pair("path", &request.path)
            .append_pair("params", &request.relay_params().to_string());
        url
    }

    fn request_url(&self, request: &SourceRequest) -> Result<Url> {
        match &self.relay_url {
            Some(relay) => Ok(Self::relay_endpoint(relay, request)),
            None => self.endpoint(request),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self, request: &SourceRequest) -> Result<Value> {
        let resource = request.resource();

        let url = self.request_url(request)?;
        match &self.relay_url {
            Some(relay) => debug!("Fetching {} through {}", resource, relay),
            None => debug!("Fetching {}", url),
        }

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                error!("Request for {} failed: {}", resource, e);
                CatalogError::UpstreamFailure {
                    resource: resource.clone(),
                    status: None,
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| CatalogError::UpstreamFailure {
                resource: resource.clone(),
                status: Some(status.as_u16()),
                reason: e.to_string(),
            })?;

        if !status.is_success() {
            error!("{} answered {}", resource, status);
            return Err(status_error(resource, status, &body));
        }

        serde_json::from_slice(&body).map_err(|e| CatalogError::malformed(resource, e))
    }
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    // Relay failures
    error: Option<String>,
    // Catalog API failures
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    title: Option<String>,
    detail: Option<String>,
}

fn status_error(resource: String, status: StatusCode, body: &[u8]) -> CatalogError {
    if status == StatusCode::NOT_FOUND {
        return CatalogError::NotFound { resource };
    }

    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let detail = parsed.error.or_else(|| {
        parsed
            .errors
            .into_iter()
            .find_map(|e| e.detail.or(e.title))
    });
    let reason = match detail {
        Some(detail) => format!("HTTP {}: {}", status.as_u16(), detail),
        None => format!("HTTP {}", status),
    };

    CatalogError::UpstreamFailure {
        resource,
        status: Some(status.as_u16()),
        reason,
    }
}
