//! System notifications shown by the push handler.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{now_millis, ServiceWorkerError};

/// Unique identifier for a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(u64);

impl NotificationId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A button offered on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

impl NotificationAction {
    pub fn new(action: &str, title: &str, icon: &str) -> Self {
        Self {
            action: action.to_string(),
            title: title.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Display options for a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Vibration pattern in milliseconds.
    pub vibrate: Vec<u32>,
    /// Opaque data bag handed back on click.
    pub data: JsonValue,
    pub actions: Vec<NotificationAction>,
}

/// A notification the host has displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub options: NotificationOptions,
    /// Display time (ms since epoch).
    pub shown_at: u64,
}

/// Host seam for displaying and dismissing notifications.
#[async_trait]
pub trait NotificationHost: Send + Sync {
    /// Display a notification.
    async fn show_notification(
        &self,
        title: &str,
        options: NotificationOptions,
    ) -> Result<Notification, ServiceWorkerError>;

    /// Dismiss a notification. Returns whether it was still displayed.
    async fn close(&self, id: NotificationId) -> bool;
}

/// In-process notification host that keeps what is on screen.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    displayed: RwLock<HashMap<NotificationId, Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications currently displayed, oldest first.
    pub async fn displayed(&self) -> Vec<Notification> {
        let mut list: Vec<Notification> = self.displayed.read().await.values().cloned().collect();
        list.sort_by_key(|n| (n.shown_at, n.id.0));
        list
    }

    pub async fn get(&self, id: NotificationId) -> Option<Notification> {
        self.displayed.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl NotificationHost for NotificationCenter {
    async fn show_notification(
        &self,
        title: &str,
        options: NotificationOptions,
    ) -> Result<Notification, ServiceWorkerError> {
        if title.is_empty() {
            return Err(ServiceWorkerError::NotificationError(
                "notification title is empty".to_string(),
            ));
        }

        let notification = Notification {
            id: NotificationId::new(),
            title: title.to_string(),
            options,
            shown_at: now_millis(),
        };
        debug!(id = ?notification.id, title, "Showing notification");
        self.displayed
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn close(&self, id: NotificationId) -> bool {
        self.displayed.write().await.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(body: &str) -> NotificationOptions {
        NotificationOptions {
            body: body.to_string(),
            icon: String::new(),
            badge: String::new(),
            vibrate: vec![100],
            data: JsonValue::Null,
            actions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_show_and_close() {
        let center = NotificationCenter::new();
        let shown = center.show_notification("Gestor", options("hola")).await.unwrap();

        assert_eq!(center.displayed().await.len(), 1);
        assert_eq!(center.get(shown.id).await.unwrap().options.body, "hola");

        assert!(center.close(shown.id).await);
        assert!(!center.close(shown.id).await);
        assert!(center.displayed().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_title_rejected() {
        let center = NotificationCenter::new();
        let err = center.show_notification("", options("x")).await.unwrap_err();
        assert!(matches!(err, ServiceWorkerError::NotificationError(_)));
    }

    #[tokio::test]
    async fn test_notification_serializes_camel_case() {
        let center = NotificationCenter::new();
        let shown = center.show_notification("Gestor", options("x")).await.unwrap();

        let json = serde_json::to_value(&shown).unwrap();
        assert!(json["shownAt"].as_u64().is_some());
        assert!(json.get("shown_at").is_none());
        assert_eq!(json["options"]["body"], "x");
    }
}
