//! Worker configuration
//!
//! Fixed once when the worker is built and shared read-only afterwards.
//! Changing the precache list requires bumping `cache_name` so the next
//! activation replaces the old bucket.

use std::path::Path;

use gestor_net::Request;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::notifications::NotificationAction;
use crate::ServiceWorkerError;

/// Offline cache proxy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin the worker is registered on; relative paths resolve against it
    pub origin: Url,

    /// Name of the live cache bucket (the version tag)
    pub cache_name: String,

    /// Paths pre-cached on install, in order
    pub precache_urls: Vec<String>,

    /// Page served to navigations when the network is unreachable
    pub offline_fallback: String,

    /// Push notification settings
    pub notification: NotificationConfig,
}

/// Push notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Notification title
    pub title: String,

    /// Body used when a push carries no data
    pub default_body: String,

    pub icon: String,

    pub badge: String,

    /// Vibration pattern in milliseconds
    pub vibrate: Vec<u32>,

    /// Value of `primaryKey` in the notification data bag
    pub primary_key: u64,

    /// Actions offered on every notification
    pub actions: Vec<NotificationAction>,

    /// Action that opens the application window
    pub explore_action: String,

    /// Path opened by the explore action
    pub open_url: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: Url::parse("http://localhost:5000/").expect("static origin is valid"),
            cache_name: "gestor-streaming-v1.0.0".to_string(),
            precache_urls: [
                "/",
                "/static/manifest.json",
                "/static/css/bootstrap.min.css",
                "/static/css/fontawesome.min.css",
                "/static/js/bootstrap.bundle.min.js",
                "/static/js/chart.min.js",
                "/templates/base.html",
                "/templates/login.html",
                "/templates/index.html",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            offline_fallback: "/templates/login.html".to_string(),
            notification: NotificationConfig::default(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        let action_icon = "/static/icons/icon-72x72.png";
        Self {
            title: "Gestor de Streaming".to_string(),
            default_body: "Nueva notificación del Gestor de Streaming".to_string(),
            icon: "/static/icons/icon-192x192.png".to_string(),
            badge: action_icon.to_string(),
            vibrate: vec![100, 50, 100],
            primary_key: 1,
            actions: vec![
                NotificationAction::new("explore", "Ver más", action_icon),
                NotificationAction::new("close", "Cerrar", action_icon),
            ],
            explore_action: "explore".to_string(),
            open_url: "/".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Default configuration for another origin.
    pub fn for_origin(origin: Url) -> Self {
        Self {
            origin,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ServiceWorkerError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ServiceWorkerError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServiceWorkerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ServiceWorkerError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Check the invariants the handlers rely on.
    pub fn validate(&self) -> Result<(), ServiceWorkerError> {
        if self.cache_name.trim().is_empty() {
            return Err(ServiceWorkerError::ConfigError(
                "cache_name must not be empty".to_string(),
            ));
        }
        if !self.precache_urls.contains(&self.offline_fallback) {
            return Err(ServiceWorkerError::ConfigError(format!(
                "offline fallback {} is not in the precache list",
                self.offline_fallback
            )));
        }
        for path in &self.precache_urls {
            self.resolve(path)?;
        }
        self.resolve(&self.notification.open_url)?;
        Ok(())
    }

    /// Resolve a path against the worker origin.
    pub fn resolve(&self, path: &str) -> Result<Url, ServiceWorkerError> {
        self.origin
            .join(path)
            .map_err(|e| ServiceWorkerError::ConfigError(format!("{path}: {e}")))
    }

    /// GET requests for every precached path.
    pub fn precache_requests(&self) -> Result<Vec<Request>, ServiceWorkerError> {
        self.precache_urls
            .iter()
            .map(|path| self.resolve(path).map(Request::get))
            .collect()
    }

    /// Absolute URL of the offline fallback page.
    pub fn fallback_url(&self) -> Result<Url, ServiceWorkerError> {
        self.resolve(&self.offline_fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_name, "gestor-streaming-v1.0.0");
        assert_eq!(config.precache_urls.len(), 9);
        assert_eq!(config.precache_urls[0], "/");
    }

    #[test]
    fn test_precache_requests_resolve_against_origin() {
        let config = WorkerConfig::for_origin(Url::parse("https://gestor.example/app/").unwrap());
        let requests = config.precache_requests().unwrap();
        assert_eq!(requests[0].url.as_str(), "https://gestor.example/");
        assert_eq!(
            requests[1].url.as_str(),
            "https://gestor.example/static/manifest.json"
        );
    }

    #[test]
    fn test_fallback_must_be_precached() {
        let config = WorkerConfig {
            offline_fallback: "/offline.html".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ServiceWorkerError::ConfigError(_))
        ));
    }

    #[test]
    fn test_empty_cache_name_rejected() {
        let config = WorkerConfig {
            cache_name: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = WorkerConfig::from_json(
            r#"{ "cache_name": "v1", "precache_urls": ["/", "/templates/login.html"] }"#,
        )
        .unwrap();
        assert_eq!(config.cache_name, "v1");
        assert_eq!(config.precache_urls.len(), 2);
        assert_eq!(config.notification.title, "Gestor de Streaming");
        assert_eq!(config.notification.vibrate, vec![100, 50, 100]);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sw.json");
        let config = WorkerConfig {
            cache_name: "gestor-streaming-v2".to_string(),
            ..Default::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = WorkerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = WorkerConfig::from_file("/nonexistent/sw.json").unwrap_err();
        assert!(matches!(err, ServiceWorkerError::ConfigError(_)));
    }
}
