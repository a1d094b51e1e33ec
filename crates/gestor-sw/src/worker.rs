//! The worker runtime: configuration, collaborators, dispatch table and
//! lifecycle state.

use std::sync::Arc;
use std::time::Instant;

use gestor_net::Fetcher;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use crate::cache::{CacheStore, MemoryCacheStorage};
use crate::clients::{Clients, WindowClients};
use crate::config::WorkerConfig;
use crate::dispatch::Dispatcher;
use crate::events::{
    ActivateReport, ClickReport, EventKind, EventOutcome, FetchEvent, FetchResponse,
    InstallReport, NotificationClickEvent, PushEvent, WorkerEvent,
};
use crate::handlers::{Activator, FetchInterceptor, Installer, NotificationClickHandler, PushHandler};
use crate::notifications::{Notification, NotificationCenter, NotificationHost};
use crate::{ServiceWorkerError, ServiceWorkerId, ServiceWorkerState};

/// Host collaborators the handlers work against.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<WorkerConfig>,
    pub caches: Arc<dyn CacheStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub notifications: Arc<dyn NotificationHost>,
    pub clients: Arc<dyn WindowClients>,
}

impl WorkerContext {
    /// Context with in-memory cache, notification and client hosts.
    pub fn in_memory(config: WorkerConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config: Arc::new(config),
            caches: Arc::new(MemoryCacheStorage::new()),
            fetcher,
            notifications: Arc::new(NotificationCenter::new()),
            clients: Arc::new(Clients::new()),
        }
    }

    /// Dispatch table with the standard handler for every event kind.
    pub fn dispatcher(&self) -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(
            EventKind::Install,
            Arc::new(Installer::new(
                self.config.clone(),
                self.caches.clone(),
                self.fetcher.clone(),
            )),
        );
        dispatcher.register(
            EventKind::Activate,
            Arc::new(Activator::new(self.config.clone(), self.caches.clone())),
        );
        dispatcher.register(
            EventKind::Fetch,
            Arc::new(FetchInterceptor::new(
                self.config.clone(),
                self.caches.clone(),
                self.fetcher.clone(),
            )),
        );
        dispatcher.register(
            EventKind::Push,
            Arc::new(PushHandler::new(
                self.config.clone(),
                self.notifications.clone(),
            )),
        );
        dispatcher.register(
            EventKind::NotificationClick,
            Arc::new(NotificationClickHandler::new(
                self.config.clone(),
                self.notifications.clone(),
                self.clients.clone(),
            )),
        );
        dispatcher
    }
}

/// Lifecycle notifications emitted by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceWorkerEvent {
    StateChange {
        worker_id: ServiceWorkerId,
        new_state: ServiceWorkerState,
    },
}

/// A running offline cache proxy.
pub struct ServiceWorker {
    id: ServiceWorkerId,
    context: WorkerContext,
    dispatcher: Dispatcher,
    state: RwLock<ServiceWorkerState>,
    state_changed_at: RwLock<Instant>,
    event_tx: mpsc::UnboundedSender<ServiceWorkerEvent>,
}

impl ServiceWorker {
    /// Create a worker with the standard handlers.
    pub fn new(context: WorkerContext) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        let dispatcher = context.dispatcher();
        Self::with_dispatcher(context, dispatcher)
    }

    /// Create a worker with a custom dispatch table.
    pub fn with_dispatcher(
        context: WorkerContext,
        dispatcher: Dispatcher,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                id: ServiceWorkerId::new(),
                context,
                dispatcher,
                state: RwLock::new(ServiceWorkerState::Parsed),
                state_changed_at: RwLock::new(Instant::now()),
                event_tx,
            },
            event_rx,
        )
    }

    pub fn id(&self) -> ServiceWorkerId {
        self.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.context.config
    }

    pub fn context(&self) -> &WorkerContext {
        &self.context
    }

    pub async fn state(&self) -> ServiceWorkerState {
        *self.state.read().await
    }

    /// Time of the last state change.
    pub async fn state_changed_at(&self) -> Instant {
        *self.state_changed_at.read().await
    }

    pub async fn is_active(&self) -> bool {
        self.state().await == ServiceWorkerState::Activated
    }

    async fn set_state(&self, state: ServiceWorkerState) {
        *self.state.write().await = state;
        *self.state_changed_at.write().await = Instant::now();
        info!(worker = ?self.id, ?state, "Worker state changed");
        let _ = self.event_tx.send(ServiceWorkerEvent::StateChange {
            worker_id: self.id,
            new_state: state,
        });
    }

    async fn expect_state(&self, expected: ServiceWorkerState, action: &str) -> Result<(), ServiceWorkerError> {
        let state = self.state().await;
        if state != expected {
            return Err(ServiceWorkerError::StateError(format!(
                "cannot {action} a worker in state {state}"
            )));
        }
        Ok(())
    }

    /// Run the install phase.
    pub async fn install(&self) -> Result<InstallReport, ServiceWorkerError> {
        self.expect_state(ServiceWorkerState::Parsed, "install").await?;
        self.set_state(ServiceWorkerState::Installing).await;

        match self.dispatcher.dispatch(WorkerEvent::Install).await {
            Ok(EventOutcome::Installed(report)) => {
                self.set_state(ServiceWorkerState::Installed).await;
                Ok(report)
            }
            Ok(other) => {
                self.set_state(ServiceWorkerState::Redundant).await;
                Err(mismatched(EventKind::Install, &other))
            }
            Err(e) => {
                warn!(worker = ?self.id, error = %e, "Install failed");
                self.set_state(ServiceWorkerState::Redundant).await;
                Err(e)
            }
        }
    }

    /// Run the activate phase.
    pub async fn activate(&self) -> Result<ActivateReport, ServiceWorkerError> {
        self.expect_state(ServiceWorkerState::Installed, "activate").await?;
        self.set_state(ServiceWorkerState::Activating).await;

        match self.dispatcher.dispatch(WorkerEvent::Activate).await {
            Ok(EventOutcome::Activated(report)) => {
                self.set_state(ServiceWorkerState::Activated).await;
                Ok(report)
            }
            Ok(other) => {
                self.set_state(ServiceWorkerState::Redundant).await;
                Err(mismatched(EventKind::Activate, &other))
            }
            Err(e) => {
                warn!(worker = ?self.id, error = %e, "Activate failed");
                self.set_state(ServiceWorkerState::Redundant).await;
                Err(e)
            }
        }
    }

    /// Deliver any event. Lifecycle events drive the state machine; the
    /// others require an activated worker.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
        let kind = event.kind();
        if kind.is_lifecycle() {
            return match kind {
                EventKind::Install => self.install().await.map(EventOutcome::Installed),
                _ => self.activate().await.map(EventOutcome::Activated),
            };
        }

        self.expect_state(ServiceWorkerState::Activated, &format!("deliver {kind:?} to"))
            .await?;
        self.dispatcher.dispatch(event).await
    }

    /// Intercept a request.
    pub async fn handle_fetch(&self, event: FetchEvent) -> Result<FetchResponse, ServiceWorkerError> {
        match self.dispatch(WorkerEvent::Fetch(event)).await? {
            EventOutcome::Response(response) => Ok(response),
            other => Err(mismatched(EventKind::Fetch, &other)),
        }
    }

    /// Deliver a push message.
    pub async fn handle_push(&self, event: PushEvent) -> Result<Notification, ServiceWorkerError> {
        match self.dispatch(WorkerEvent::Push(event)).await? {
            EventOutcome::NotificationShown(notification) => Ok(notification),
            other => Err(mismatched(EventKind::Push, &other)),
        }
    }

    /// Deliver a notification click.
    pub async fn handle_notification_click(
        &self,
        event: NotificationClickEvent,
    ) -> Result<ClickReport, ServiceWorkerError> {
        match self.dispatch(WorkerEvent::NotificationClick(event)).await? {
            EventOutcome::NotificationClicked(report) => Ok(report),
            other => Err(mismatched(EventKind::NotificationClick, &other)),
        }
    }
}

fn mismatched(kind: EventKind, outcome: &EventOutcome) -> ServiceWorkerError {
    ServiceWorkerError::StateError(format!("{kind:?} handler produced {outcome:?}"))
}

impl std::fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("id", &self.id)
            .field("cache_name", &self.context.config.cache_name)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
