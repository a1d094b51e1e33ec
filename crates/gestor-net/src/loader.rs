//! reqwest-backed [`Fetcher`].

use std::time::Duration;

use async_trait::async_trait;
use mime::Mime;
use reqwest::Client;
use tracing::{debug, info, trace};
use url::Url;

use crate::{Fetcher, NetError, Request, Response, ResponseType};

/// Resource loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string.
    pub user_agent: String,
    /// Accept-Language header.
    pub accept_language: String,
    /// Default timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
    /// Enable cookies.
    pub cookies_enabled: bool,
    /// Origin the worker runs on. Responses from it are `basic`; when unset,
    /// each request's own origin is used.
    pub origin: Option<Url>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: "GestorOffline/1.0".to_string(),
            accept_language: "es-ES,es;q=0.9,en;q=0.8".to_string(),
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
            cookies_enabled: true,
            origin: None,
        }
    }
}

impl LoaderConfig {
    /// Default configuration bound to a worker origin.
    pub fn for_origin(origin: Url) -> Self {
        Self {
            origin: Some(origin),
            ..Default::default()
        }
    }
}

/// Resource loader for fetching URLs over HTTP.
pub struct ResourceLoader {
    client: Client,
    config: LoaderConfig,
}

impl ResourceLoader {
    /// Create a new resource loader.
    pub fn new(config: LoaderConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .cookie_store(config.cookies_enabled)
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        info!(origin = ?config.origin.as_ref().map(Url::as_str), "ResourceLoader initialized");

        Ok(Self { client, config })
    }

    /// Loader configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for ResourceLoader {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, mode = ?request.mode, "Fetching resource");

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in request.headers.iter() {
            req_builder = req_builder.header(name, value);
        }

        req_builder = req_builder.header("Accept-Language", &self.config.accept_language);

        if let Some(ref body) = request.body {
            req_builder = req_builder.body(body.clone());
        }

        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        req_builder = req_builder.timeout(timeout);

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetError::Timeout(timeout)
            } else {
                NetError::HttpError(e)
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();

        let home = self.config.origin.as_ref().unwrap_or(&request.url);
        let response_type = ResponseType::classify(home, &url, request.mode);

        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<Mime>().ok());

        let body = response.bytes().await?;

        trace!(
            url = %url,
            status = %status,
            response_type = response_type.as_str(),
            content_type = ?content_type,
            body_len = body.len(),
            "Response received"
        );

        let mut out = Response::new(url, status, body).with_type(response_type);
        out.request_id = request.id;
        out.headers = headers;
        out.content_type = content_type;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_config_default() {
        let config = LoaderConfig::default();
        assert_eq!(config.user_agent, "GestorOffline/1.0");
        assert!(config.cookies_enabled);
        assert!(config.origin.is_none());
    }

    #[test]
    fn test_loader_config_for_origin() {
        let origin = Url::parse("http://localhost:5000/").unwrap();
        let config = LoaderConfig::for_origin(origin.clone());
        assert_eq!(config.origin, Some(origin));
        assert_eq!(config.max_redirects, 10);
    }
}
