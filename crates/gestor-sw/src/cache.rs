//! Versioned cache buckets.
//!
//! A bucket maps request keys to stored responses. Only `GET` requests can
//! be stored or matched; the key is the request URL without its fragment.

use async_trait::async_trait;
use bytes::Bytes;
use gestor_net::{Request, Response, ResponseType};
use hashbrown::HashMap;
use http::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, trace};
use url::Url;

use crate::{now_millis, ServiceWorkerError};

/// Cache key for a URL.
pub fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// A cached request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    pub status_text: String,

    pub response_type: ResponseType,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Copy a response into a storable entry. The response itself is left
    /// untouched for the caller.
    pub fn from_response(request: &Request, response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            url: cache_key(&request.url),
            method: request.method.to_string(),
            status: response.status.as_u16(),
            status_text: response.status_text().to_string(),
            response_type: response.response_type,
            headers,
            body: response.body().to_vec(),
            cached_at: now_millis(),
        }
    }

    /// Body as shared bytes.
    pub fn body_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.body)
    }
}

fn ensure_get(request: &Request) -> Result<(), ServiceWorkerError> {
    if request.method != Method::GET {
        return Err(ServiceWorkerError::CacheError(format!(
            "Request method '{}' is unsupported",
            request.method
        )));
    }
    Ok(())
}

/// A cache bucket.
#[derive(Debug, Default, Clone)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    /// Cached entries.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request. Non-GET requests never match.
    pub fn match_request(&self, request: &Request) -> Option<&CacheEntry> {
        if request.method != Method::GET {
            return None;
        }
        self.entries.get(&cache_key(&request.url))
    }

    /// Store an entry, replacing any previous one for the same key.
    pub fn put(&mut self, request: &Request, entry: CacheEntry) -> Result<(), ServiceWorkerError> {
        ensure_get(request)?;
        self.entries.insert(cache_key(&request.url), entry);
        Ok(())
    }

    /// Delete entry.
    pub fn delete(&mut self, request: &Request) -> bool {
        self.entries.remove(&cache_key(&request.url)).is_some()
    }

    /// Get all keys (URLs), sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Host seam for named cache buckets.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a bucket, creating it if it does not exist.
    async fn open(&self, name: &str) -> Result<(), ServiceWorkerError>;

    /// Whether a bucket exists.
    async fn has(&self, name: &str) -> bool;

    /// Look a request up in every bucket.
    async fn match_request(&self, request: &Request) -> Result<Option<CacheEntry>, ServiceWorkerError>;

    /// Look a request up in one bucket.
    async fn match_in(
        &self,
        name: &str,
        request: &Request,
    ) -> Result<Option<CacheEntry>, ServiceWorkerError>;

    /// Store one response, opening the bucket if needed.
    async fn put(
        &self,
        name: &str,
        request: &Request,
        response: &Response,
    ) -> Result<(), ServiceWorkerError>;

    /// Store a batch of responses. Either every pair is stored or none is.
    async fn put_all(
        &self,
        name: &str,
        pairs: &[(Request, Response)],
    ) -> Result<(), ServiceWorkerError>;

    /// Delete a bucket. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, ServiceWorkerError>;

    /// Names of all buckets.
    async fn keys(&self) -> Result<Vec<String>, ServiceWorkerError>;

    /// Number of entries in a bucket, if it exists.
    async fn len(&self, name: &str) -> Option<usize>;
}

/// In-memory cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<HashMap<String, Cache>>,
}

impl MemoryCacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a bucket.
    pub async fn snapshot(&self, name: &str) -> Option<Cache> {
        self.caches.read().await.get(name).cloned()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), ServiceWorkerError> {
        let mut caches = self.caches.write().await;
        if !caches.contains_key(name) {
            info!(cache = name, "Cache opened");
            caches.insert(name.to_string(), Cache::new(name));
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> bool {
        self.caches.read().await.contains_key(name)
    }

    async fn match_request(&self, request: &Request) -> Result<Option<CacheEntry>, ServiceWorkerError> {
        let caches = self.caches.read().await;
        let mut names: Vec<&String> = caches.keys().collect();
        names.sort_unstable();

        for name in names {
            if let Some(entry) = caches.get(name).and_then(|c| c.match_request(request)) {
                trace!(cache = %name, url = %request.url, "Cache match");
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }

    async fn match_in(
        &self,
        name: &str,
        request: &Request,
    ) -> Result<Option<CacheEntry>, ServiceWorkerError> {
        let caches = self.caches.read().await;
        Ok(caches
            .get(name)
            .and_then(|c| c.match_request(request))
            .cloned())
    }

    async fn put(
        &self,
        name: &str,
        request: &Request,
        response: &Response,
    ) -> Result<(), ServiceWorkerError> {
        ensure_get(request)?;
        let entry = CacheEntry::from_response(request, response);

        let mut caches = self.caches.write().await;
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name));
        debug!(cache = name, url = %entry.url, bytes = entry.body.len(), "Cache put");
        cache.put(request, entry)
    }

    async fn put_all(
        &self,
        name: &str,
        pairs: &[(Request, Response)],
    ) -> Result<(), ServiceWorkerError> {
        for (request, _) in pairs {
            ensure_get(request)?;
        }
        let entries: Vec<(&Request, CacheEntry)> = pairs
            .iter()
            .map(|(request, response)| (request, CacheEntry::from_response(request, response)))
            .collect();

        let mut caches = self.caches.write().await;
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name));
        for (request, entry) in entries {
            cache.put(request, entry)?;
        }
        debug!(cache = name, count = pairs.len(), "Cache put_all");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, ServiceWorkerError> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, ServiceWorkerError> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }

    async fn len(&self, name: &str) -> Option<usize> {
        self.caches.read().await.get(name).map(Cache::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    fn ok(url: &str, body: &'static str) -> Response {
        Response::new(Url::parse(url).unwrap(), StatusCode::OK, body)
    }

    #[test]
    fn test_cache_key_drops_fragment() {
        let url = Url::parse("https://gestor.example/templates/index.html#cuentas").unwrap();
        assert_eq!(cache_key(&url), "https://gestor.example/templates/index.html");
    }

    #[test]
    fn test_cache() {
        let mut cache = Cache::new("v1");
        let request = get("https://gestor.example/style.css");
        let entry = CacheEntry::from_response(&request, &ok("https://gestor.example/style.css", "body{}"));

        cache.put(&request, entry).unwrap();

        assert!(cache.match_request(&request).is_some());
        assert!(cache.match_request(&get("https://gestor.example/other.css")).is_none());
        assert_eq!(cache.keys(), vec!["https://gestor.example/style.css"]);
    }

    #[test]
    fn test_cache_delete() {
        let mut cache = Cache::new("v1");
        let request = get("https://gestor.example/style.css");
        let entry = CacheEntry::from_response(&request, &ok("https://gestor.example/style.css", ""));

        cache.put(&request, entry).unwrap();
        assert!(cache.delete(&request));
        assert!(cache.match_request(&request).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_post_is_never_stored_or_matched() {
        let mut cache = Cache::new("v1");
        let url = Url::parse("https://gestor.example/login").unwrap();
        let post = Request::post(url.clone(), Bytes::from_static(b"user=a"));
        let entry = CacheEntry::from_response(&post, &Response::new(url, StatusCode::OK, "ok"));

        assert!(matches!(
            cache.put(&post, entry),
            Err(ServiceWorkerError::CacheError(_))
        ));
        assert!(cache.match_request(&post).is_none());
    }

    #[test]
    fn test_entry_copies_response() {
        let request = get("https://gestor.example/static/manifest.json");
        let response = ok("https://gestor.example/static/manifest.json", "{}")
            .with_header(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));

        let entry = CacheEntry::from_response(&request, &response);
        assert_eq!(entry.status, 200);
        assert_eq!(entry.status_text, "OK");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.headers.get("content-type").map(String::as_str), Some("application/json"));
        assert_eq!(entry.body_bytes(), *response.body());
    }

    #[tokio::test]
    async fn test_storage_open_and_delete() {
        let storage = MemoryCacheStorage::new();
        assert!(!storage.has("v1").await);

        storage.open("v1").await.unwrap();
        assert!(storage.has("v1").await);
        assert_eq!(storage.len("v1").await, Some(0));

        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.delete("v1").await.unwrap());
        assert!(!storage.has("v1").await);
    }

    #[tokio::test]
    async fn test_storage_match_across_buckets() {
        let storage = MemoryCacheStorage::new();
        let request = get("https://gestor.example/static/js/chart.min.js");
        storage
            .put("v0", &request, &ok("https://gestor.example/static/js/chart.min.js", "old"))
            .await
            .unwrap();

        let found = storage.match_request(&request).await.unwrap().unwrap();
        assert_eq!(found.body, b"old");
        assert!(storage.match_in("v1", &request).await.unwrap().is_none());
        assert_eq!(storage.keys().await.unwrap(), vec!["v0".to_string()]);
    }

    #[tokio::test]
    async fn test_put_all_is_all_or_nothing() {
        let storage = MemoryCacheStorage::new();
        let url = Url::parse("https://gestor.example/api").unwrap();
        let pairs = vec![
            (get("https://gestor.example/"), ok("https://gestor.example/", "index")),
            (
                Request::post(url.clone(), Bytes::new()),
                Response::new(url, StatusCode::OK, "x"),
            ),
        ];

        assert!(storage.put_all("v1", &pairs).await.is_err());
        assert_eq!(storage.len("v1").await, None);

        storage.put_all("v1", &pairs[..1]).await.unwrap();
        assert_eq!(storage.len("v1").await, Some(1));
        assert_eq!(storage.snapshot("v1").await.unwrap().keys(), vec!["https://gestor.example/"]);
    }
}
