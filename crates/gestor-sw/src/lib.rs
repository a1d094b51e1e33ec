//! # Gestor Offline Cache Proxy
//!
//! Service worker for the Gestor de Streaming web app: pre-caches the static
//! assets, serves requests cache-first, falls back to an offline page for
//! navigations, and turns push messages into notifications.
//!
//! ## Features
//!
//! - **Lifecycle**: install (precache), activate (drop stale buckets)
//! - **Fetch Interception**: cache-first with network fallback, opportunistic
//!   caching of same-origin 200 responses
//! - **Push**: notifications with "explore" and "close" actions
//! - **Notification clicks**: dismiss, and open the app on "explore"
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorker (lifecycle state)
//!     │
//!     └── Dispatcher (EventKind → EventHandler)
//!             ├── Installer ─────────────┐
//!             ├── Activator ─────────────┤
//!             ├── FetchInterceptor ──────┼── CacheStore, Fetcher
//!             ├── PushHandler ───────────┼── NotificationHost
//!             └── NotificationClickHandler ── WindowClients
//!
//! CacheStore (caches)
//!     └── Cache "gestor-streaming-v1.0.0"
//!             └── Request → CacheEntry
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use gestor_common::GestorError;
use gestor_net::NetError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod clients;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod notifications;
pub mod worker;

pub use cache::{cache_key, Cache, CacheEntry, CacheStore, MemoryCacheStorage};
pub use clients::{Client, Clients, WindowClients};
pub use config::{NotificationConfig, WorkerConfig};
pub use dispatch::{Dispatcher, EventHandler};
pub use events::{
    ActivateReport, ClickReport, EventKind, EventOutcome, FetchEvent, FetchResponse,
    InstallReport, NotificationClickEvent, PushEvent, PushMessageData, WorkerEvent,
};
pub use handlers::{Activator, FetchInterceptor, Installer, NotificationClickHandler, PushHandler};
pub use notifications::{
    Notification, NotificationAction, NotificationCenter, NotificationHost, NotificationId,
    NotificationOptions,
};
pub use worker::{ServiceWorker, ServiceWorkerEvent, WorkerContext};

// ==================== Errors ====================

/// Errors that can occur in service worker operations.
#[derive(Error, Debug, Clone)]
pub enum ServiceWorkerError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No handler registered for {0:?} events")]
    NoHandler(EventKind),
}

impl From<NetError> for ServiceWorkerError {
    fn from(err: NetError) -> Self {
        ServiceWorkerError::NetworkError(err.to_string())
    }
}

impl From<ServiceWorkerError> for GestorError {
    fn from(err: ServiceWorkerError) -> Self {
        match err {
            ServiceWorkerError::NetworkError(msg) => GestorError::network(msg),
            ServiceWorkerError::CacheError(msg) => GestorError::cache(msg),
            ServiceWorkerError::ConfigError(msg) => GestorError::config(msg),
            ServiceWorkerError::NotFound(msg) => GestorError::NotFound(msg),
            other => GestorError::worker_with_source("service worker", other),
        }
    }
}

// ==================== Types ====================

/// Unique identifier for a service worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceWorkerState {
    /// Created, no phase run yet.
    #[default]
    Parsed,
    /// Installing (install event).
    Installing,
    /// Installed but waiting for activation.
    Installed,
    /// Activating (activate event).
    Activating,
    /// Active and intercepting requests.
    Activated,
    /// A lifecycle phase failed.
    Redundant,
}

impl std::fmt::Display for ServiceWorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceWorkerState::Parsed => "parsed",
            ServiceWorkerState::Installing => "installing",
            ServiceWorkerState::Installed => "installed",
            ServiceWorkerState::Activating => "activating",
            ServiceWorkerState::Activated => "activated",
            ServiceWorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

// ==================== Helpers ====================

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_ids_are_unique() {
        assert_ne!(ServiceWorkerId::new(), ServiceWorkerId::new());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ServiceWorkerState::default().to_string(), "parsed");
        assert_eq!(ServiceWorkerState::Activated.to_string(), "activated");
    }

    #[test]
    fn test_net_error_converts() {
        let err: ServiceWorkerError = NetError::RequestFailed("offline".into()).into();
        assert!(matches!(err, ServiceWorkerError::NetworkError(m) if m.contains("offline")));
    }

    #[test]
    fn test_into_gestor_error() {
        let err: GestorError = ServiceWorkerError::CacheError("full".into()).into();
        assert_eq!(err.category(), "cache");

        let err: GestorError = ServiceWorkerError::StateError("early".into()).into();
        assert_eq!(err.category(), "worker");
    }
}
