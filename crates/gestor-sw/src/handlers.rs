//! The five event handlers of the offline cache proxy.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use gestor_net::{Fetcher, Request, ResponseType};
use http::StatusCode;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheEntry, CacheStore};
use crate::clients::WindowClients;
use crate::config::WorkerConfig;
use crate::dispatch::EventHandler;
use crate::events::{
    ActivateReport, ClickReport, EventKind, EventOutcome, FetchEvent, FetchResponse,
    InstallReport, NotificationClickEvent, PushEvent, WorkerEvent,
};
use crate::notifications::{Notification, NotificationHost, NotificationOptions};
use crate::{now_millis, ServiceWorkerError};

fn unexpected(expected: EventKind, got: &WorkerEvent) -> ServiceWorkerError {
    ServiceWorkerError::StateError(format!(
        "{:?} handler received {:?} event",
        expected,
        got.kind()
    ))
}

fn cached_response(entry: &CacheEntry) -> Result<FetchResponse, ServiceWorkerError> {
    FetchResponse::from_cache(entry).ok_or_else(|| {
        ServiceWorkerError::CacheError(format!("stored entry has invalid URL {}", entry.url))
    })
}

// ==================== Installer ====================

/// Pre-populates the live bucket with the configured assets.
pub struct Installer {
    config: Arc<WorkerConfig>,
    caches: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
}

impl Installer {
    pub fn new(
        config: Arc<WorkerConfig>,
        caches: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            caches,
            fetcher,
        }
    }

    /// Open the live bucket and store every precache URL.
    ///
    /// Precaching is all-or-nothing. A failure is logged and reported, and
    /// the install phase still completes.
    pub async fn install(&self) -> InstallReport {
        let cache_name = self.config.cache_name.clone();

        let result = match self.caches.open(&cache_name).await {
            Ok(()) => self.precache().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(entries) => {
                info!(cache = %cache_name, entries, "Precached static assets");
                InstallReport {
                    cache_name,
                    precached: true,
                    entries,
                    error: None,
                }
            }
            Err(e) => {
                error!(cache = %cache_name, error = %e, "Failed to precache static assets");
                InstallReport {
                    cache_name,
                    precached: false,
                    entries: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn precache(&self) -> Result<usize, ServiceWorkerError> {
        let requests = self.config.precache_requests()?;
        let responses = try_join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await?;

        if let Some(bad) = responses.iter().find(|r| !r.ok()) {
            return Err(ServiceWorkerError::NetworkError(format!(
                "{} answered {}",
                bad.url, bad.status
            )));
        }

        let pairs: Vec<_> = requests.into_iter().zip(responses).collect();
        self.caches.put_all(&self.config.cache_name, &pairs).await?;
        Ok(pairs.len())
    }
}

#[async_trait]
impl EventHandler for Installer {
    async fn handle(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
        match event {
            WorkerEvent::Install => Ok(EventOutcome::Installed(self.install().await)),
            other => Err(unexpected(EventKind::Install, &other)),
        }
    }
}

// ==================== Activator ====================

/// Deletes every bucket other than the live one.
pub struct Activator {
    config: Arc<WorkerConfig>,
    caches: Arc<dyn CacheStore>,
}

impl Activator {
    pub fn new(config: Arc<WorkerConfig>, caches: Arc<dyn CacheStore>) -> Self {
        Self { config, caches }
    }

    /// Remove stale buckets. Deletions run concurrently and independently;
    /// one failing does not stop the others.
    pub async fn activate(&self) -> Result<ActivateReport, ServiceWorkerError> {
        let current = &self.config.cache_name;
        let stale: Vec<String> = self
            .caches
            .keys()
            .await?
            .into_iter()
            .filter(|name| name != current)
            .collect();

        let results = join_all(stale.iter().map(|name| async move {
            info!(cache = %name, "Deleting stale cache");
            (name, self.caches.delete(name).await)
        }))
        .await;

        let mut deleted = Vec::new();
        for (name, result) in results {
            match result {
                Ok(true) => deleted.push(name.clone()),
                Ok(false) => debug!(cache = %name, "Stale cache already gone"),
                Err(e) => warn!(cache = %name, error = %e, "Failed to delete stale cache"),
            }
        }

        Ok(ActivateReport {
            kept: current.clone(),
            deleted,
        })
    }
}

#[async_trait]
impl EventHandler for Activator {
    async fn handle(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
        match event {
            WorkerEvent::Activate => Ok(EventOutcome::Activated(self.activate().await?)),
            other => Err(unexpected(EventKind::Activate, &other)),
        }
    }
}

// ==================== Fetch Interceptor ====================

/// Cache-first request handling with network fallback.
pub struct FetchInterceptor {
    config: Arc<WorkerConfig>,
    caches: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
}

impl FetchInterceptor {
    pub fn new(
        config: Arc<WorkerConfig>,
        caches: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            caches,
            fetcher,
        }
    }

    /// Answer an intercepted request.
    ///
    /// A failed navigation gets the offline fallback page when it is cached;
    /// every other failure is returned to the caller.
    pub async fn respond(&self, event: &FetchEvent) -> Result<FetchResponse, ServiceWorkerError> {
        let request = &event.request;
        match self.cache_or_network(request).await {
            Ok(response) => Ok(response),
            Err(e) if request.is_navigation() => {
                warn!(url = %request.url, error = %e, "Navigation failed, trying offline page");
                match self.offline_fallback().await {
                    Some(page) => Ok(page),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Look a request up in the live bucket first, then in any other.
    async fn lookup(&self, request: &Request) -> Result<Option<CacheEntry>, ServiceWorkerError> {
        if let Some(entry) = self.caches.match_in(&self.config.cache_name, request).await? {
            return Ok(Some(entry));
        }
        self.caches.match_request(request).await
    }

    async fn cache_or_network(&self, request: &Request) -> Result<FetchResponse, ServiceWorkerError> {
        if let Some(entry) = self.lookup(request).await? {
            debug!(url = %request.url, "Serving from cache");
            return cached_response(&entry);
        }

        debug!(url = %request.url, "Cache miss, fetching");
        let response = self.fetcher.fetch(request).await?;

        if response.status != StatusCode::OK || response.response_type != ResponseType::Basic {
            debug!(
                url = %request.url,
                status = %response.status,
                response_type = response.response_type.as_str(),
                "Not caching response"
            );
            return Ok(FetchResponse::from_network(response));
        }

        // Best effort: a failed write still hands the response back.
        if let Err(e) = self
            .caches
            .put(&self.config.cache_name, request, &response)
            .await
        {
            warn!(url = %request.url, error = %e, "Failed to cache response");
        }

        Ok(FetchResponse::from_network(response))
    }

    async fn offline_fallback(&self) -> Option<FetchResponse> {
        let url = self.config.fallback_url().ok()?;
        match self.lookup(&Request::get(url)).await {
            Ok(Some(entry)) => cached_response(&entry).ok(),
            Ok(None) => {
                warn!(page = %self.config.offline_fallback, "Offline page is not cached");
                None
            }
            Err(e) => {
                warn!(error = %e, "Offline page lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl EventHandler for FetchInterceptor {
    async fn handle(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
        match event {
            WorkerEvent::Fetch(fetch) => Ok(EventOutcome::Response(self.respond(&fetch).await?)),
            other => Err(unexpected(EventKind::Fetch, &other)),
        }
    }
}

// ==================== Push Handler ====================

/// Shows a notification for each push message.
pub struct PushHandler {
    config: Arc<WorkerConfig>,
    notifications: Arc<dyn NotificationHost>,
}

impl PushHandler {
    pub fn new(config: Arc<WorkerConfig>, notifications: Arc<dyn NotificationHost>) -> Self {
        Self {
            config,
            notifications,
        }
    }

    /// Notification options for a push, before display.
    pub fn options_for(&self, event: &PushEvent) -> NotificationOptions {
        let settings = &self.config.notification;
        let body = match event.data {
            Some(ref data) => data.text(),
            None => settings.default_body.clone(),
        };

        NotificationOptions {
            body,
            icon: settings.icon.clone(),
            badge: settings.badge.clone(),
            vibrate: settings.vibrate.clone(),
            data: json!({
                "dateOfArrival": now_millis(),
                "primaryKey": settings.primary_key,
            }),
            actions: settings.actions.clone(),
        }
    }

    pub async fn show(&self, event: &PushEvent) -> Result<Notification, ServiceWorkerError> {
        let options = self.options_for(event);
        self.notifications
            .show_notification(&self.config.notification.title, options)
            .await
    }
}

#[async_trait]
impl EventHandler for PushHandler {
    async fn handle(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
        match event {
            WorkerEvent::Push(push) => Ok(EventOutcome::NotificationShown(self.show(&push).await?)),
            other => Err(unexpected(EventKind::Push, &other)),
        }
    }
}

// ==================== Notification Click Handler ====================

/// Dismisses clicked notifications and opens the app for the explore action.
pub struct NotificationClickHandler {
    config: Arc<WorkerConfig>,
    notifications: Arc<dyn NotificationHost>,
    clients: Arc<dyn WindowClients>,
}

impl NotificationClickHandler {
    pub fn new(
        config: Arc<WorkerConfig>,
        notifications: Arc<dyn NotificationHost>,
        clients: Arc<dyn WindowClients>,
    ) -> Self {
        Self {
            config,
            notifications,
            clients,
        }
    }

    pub async fn click(&self, event: &NotificationClickEvent) -> Result<ClickReport, ServiceWorkerError> {
        let id = event.notification.id;
        if !self.notifications.close(id).await {
            debug!(?id, "Clicked notification was already closed");
        }

        let opened = if event.action == self.config.notification.explore_action {
            let url = self.config.resolve(&self.config.notification.open_url)?;
            Some(self.clients.open_window(&url).await?)
        } else {
            None
        };

        Ok(ClickReport { closed: id, opened })
    }
}

#[async_trait]
impl EventHandler for NotificationClickHandler {
    async fn handle(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
        match event {
            WorkerEvent::NotificationClick(click) => {
                Ok(EventOutcome::NotificationClicked(self.click(&click).await?))
            }
            other => Err(unexpected(EventKind::NotificationClick, &other)),
        }
    }
}
