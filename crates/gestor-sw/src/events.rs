//! Lifecycle and functional events delivered to the worker, and what
//! handling them yields.

use bytes::Bytes;
use gestor_net::{Request, Response, ResponseType};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::CacheEntry;
use crate::clients::Client;
use crate::notifications::{Notification, NotificationId};

/// Kind of event, the key of the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Push,
    NotificationClick,
}

impl EventKind {
    /// Lifecycle events run while the worker is being brought up; the others
    /// only reach an activated worker.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, EventKind::Install | EventKind::Activate)
    }
}

/// An event delivered to the worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(FetchEvent),
    Push(PushEvent),
    NotificationClick(NotificationClickEvent),
}

impl WorkerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkerEvent::Install => EventKind::Install,
            WorkerEvent::Activate => EventKind::Activate,
            WorkerEvent::Fetch(_) => EventKind::Fetch,
            WorkerEvent::Push(_) => EventKind::Push,
            WorkerEvent::NotificationClick(_) => EventKind::NotificationClick,
        }
    }
}

// ==================== Fetch ====================

/// A fetch event.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    /// Intercepted request.
    pub request: Request,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self { request }
    }
}

/// Response handed back for an intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub url: Url,

    /// Status code.
    pub status: u16,

    /// Status text.
    pub status_text: String,

    pub response_type: ResponseType,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Bytes,

    /// Whether from cache.
    pub from_cache: bool,
}

impl FetchResponse {
    /// Create a response from cache entry.
    pub fn from_cache(entry: &CacheEntry) -> Option<Self> {
        Some(Self {
            url: Url::parse(&entry.url).ok()?,
            status: entry.status,
            status_text: entry.status_text.clone(),
            response_type: entry.response_type,
            headers: entry.headers.clone(),
            body: entry.body_bytes(),
            from_cache: true,
        })
    }

    /// Create a response from a live network response.
    pub fn from_network(response: Response) -> Self {
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
            url: response.url.clone(),
            status: response.status.as_u16(),
            status_text: response.status_text().to_string(),
            response_type: response.response_type,
            headers,
            body: response.bytes(),
            from_cache: false,
        }
    }

    /// Body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ==================== Push ====================

/// Payload of a push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessageData(Bytes);

impl PushMessageData {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Payload as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Payload parsed as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }

    pub fn bytes(&self) -> &Bytes {
        &self.0
    }
}

/// A push event.
#[derive(Debug, Clone, Default)]
pub struct PushEvent {
    pub data: Option<PushMessageData>,
}

impl PushEvent {
    /// Push carrying a text payload.
    pub fn with_text(text: &str) -> Self {
        Self {
            data: Some(PushMessageData::new(text.to_string())),
        }
    }

    /// Push without payload.
    pub fn empty() -> Self {
        Self::default()
    }
}

// ==================== Notification Click ====================

/// A click on a notification or one of its actions.
#[derive(Debug, Clone)]
pub struct NotificationClickEvent {
    pub notification: Notification,

    /// Action identifier; empty for a click on the notification body.
    pub action: String,
}

impl NotificationClickEvent {
    pub fn new(notification: Notification, action: impl Into<String>) -> Self {
        Self {
            notification,
            action: action.into(),
        }
    }
}

// ==================== Outcomes ====================

/// Result of the install phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub cache_name: String,

    /// Whether every asset was stored.
    pub precached: bool,

    /// Number of entries written.
    pub entries: usize,

    /// Why precaching failed.
    pub error: Option<String>,
}

/// Result of the activate phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    /// The live bucket.
    pub kept: String,

    /// Stale buckets that were removed.
    pub deleted: Vec<String>,
}

/// Result of a notification click.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickReport {
    pub closed: NotificationId,

    /// Window opened in response, if any.
    pub opened: Option<Client>,
}

/// What a handler produced.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Response(FetchResponse),
    NotificationShown(Notification),
    NotificationClicked(ClickReport),
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_event_kind() {
        assert_eq!(WorkerEvent::Install.kind(), EventKind::Install);
        assert_eq!(WorkerEvent::Push(PushEvent::empty()).kind(), EventKind::Push);
        assert!(EventKind::Activate.is_lifecycle());
        assert!(!EventKind::Fetch.is_lifecycle());
    }

    #[test]
    fn test_fetch_response_from_cache() {
        let entry = CacheEntry {
            url: "https://gestor.example/data.json".to_string(),
            method: "GET".to_string(),
            status: 200,
            status_text: "OK".to_string(),
            response_type: ResponseType::Basic,
            headers: HashMap::new(),
            body: b"{}".to_vec(),
            cached_at: 0,
        };

        let response = FetchResponse::from_cache(&entry).unwrap();
        assert_eq!(response.status, 200);
        assert!(response.from_cache);
        assert_eq!(response.text(), "{}");
    }

    #[test]
    fn test_fetch_response_from_network() {
        let url = Url::parse("https://gestor.example/").unwrap();
        let response = FetchResponse::from_network(Response::new(url, StatusCode::CREATED, "x"));
        assert_eq!(response.status, 201);
        assert_eq!(response.status_text, "Created");
        assert!(!response.from_cache);
    }

    #[test]
    fn test_push_data() {
        let push = PushEvent::with_text(r#"{"cuenta":"Netflix"}"#);
        let data = push.data.unwrap();
        assert_eq!(data.json().unwrap()["cuenta"], "Netflix");
        assert!(PushEvent::empty().data.is_none());
    }
}
