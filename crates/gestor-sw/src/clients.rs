//! Window clients the worker can open.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use hashbrown::HashMap;
use tokio::sync::RwLock;
use tracing::info;
use url::Url;

use crate::ServiceWorkerError;

/// A top-level window client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Whether focused.
    pub focused: bool,
}

/// Host seam for opening application windows.
#[async_trait]
pub trait WindowClients: Send + Sync {
    /// Open a new top-level window at `url`.
    async fn open_window(&self, url: &Url) -> Result<Client, ServiceWorkerError>;
}

/// In-process registry of open windows.
#[derive(Debug, Default)]
pub struct Clients {
    clients: RwLock<HashMap<String, Client>>,
}

impl Clients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a client by ID.
    pub async fn get(&self, id: &str) -> Option<Client> {
        self.clients.read().await.get(id).cloned()
    }

    /// All open windows.
    pub async fn windows(&self) -> Vec<Client> {
        self.clients.read().await.values().cloned().collect()
    }

    /// Remove a client.
    pub async fn remove(&self, id: &str) -> Option<Client> {
        self.clients.write().await.remove(id)
    }
}

#[async_trait]
impl WindowClients for Clients {
    async fn open_window(&self, url: &Url) -> Result<Client, ServiceWorkerError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ServiceWorkerError::SecurityError(format!(
                "cannot open window for {url}"
            )));
        }

        let mut clients = self.clients.write().await;
        for client in clients.values_mut() {
            client.focused = false;
        }

        let client = Client {
            id: format!("client-{}", uuid_simple()),
            url: url.clone(),
            focused: true,
        };
        info!(client = %client.id, url = %url, "Opened window");

        clients.insert(client.id.clone(), client.clone());
        Ok(client)
    }
}

/// Generate a simple UUID-like string.
fn uuid_simple() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!(
        "{:016x}-{:04x}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_window() {
        let clients = Clients::new();
        let url = Url::parse("https://gestor.example/").unwrap();

        let client = clients.open_window(&url).await.unwrap();
        assert_eq!(client.url, url);
        assert!(client.focused);
        assert!(clients.get(&client.id).await.is_some());
    }

    #[tokio::test]
    async fn test_new_window_takes_focus() {
        let clients = Clients::new();
        let url = Url::parse("https://gestor.example/").unwrap();

        let first = clients.open_window(&url).await.unwrap();
        let second = clients.open_window(&url).await.unwrap();

        assert!(!clients.get(&first.id).await.unwrap().focused);
        assert!(clients.get(&second.id).await.unwrap().focused);
        assert_eq!(clients.windows().await.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_non_http_url() {
        let clients = Clients::new();
        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(matches!(
            clients.open_window(&url).await,
            Err(ServiceWorkerError::SecurityError(_))
        ));
    }

    #[tokio::test]
    async fn test_remove() {
        let clients = Clients::new();
        let url = Url::parse("https://gestor.example/").unwrap();
        let client = clients.open_window(&url).await.unwrap();

        assert!(clients.remove(&client.id).await.is_some());
        assert!(clients.windows().await.is_empty());
    }
}
