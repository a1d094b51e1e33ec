//! Dispatch table mapping event kinds to handlers.

use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::events::{EventKind, EventOutcome, WorkerEvent};
use crate::ServiceWorkerError;

/// A handler for one kind of worker event.
///
/// The returned future is the deferral: the phase is not complete until it
/// resolves.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError>;
}

/// Handlers registered by event kind.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `kind`.
    pub fn register(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        debug!(?kind, "Registering event handler");
        self.handlers.insert(kind, handler);
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Run the handler for `event` to completion.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
        let kind = event.kind();
        let handler = self
            .handlers
            .get(&kind)
            .cloned()
            .ok_or(ServiceWorkerError::NoHandler(kind))?;
        trace!(?kind, "Dispatching event");
        handler.handle(event).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ActivateReport, PushEvent};

    struct Fixed;

    #[async_trait]
    impl EventHandler for Fixed {
        async fn handle(&self, _event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
            Ok(EventOutcome::Activated(ActivateReport {
                kept: "v1".to_string(),
                deleted: Vec::new(),
            }))
        }
    }

    #[tokio::test]
    async fn test_dispatch_to_registered_handler() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(EventKind::Activate, Arc::new(Fixed));

        assert!(dispatcher.handles(EventKind::Activate));
        let outcome = dispatcher.dispatch(WorkerEvent::Activate).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Activated(r) if r.kept == "v1"));
    }

    #[tokio::test]
    async fn test_missing_handler() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .dispatch(WorkerEvent::Push(PushEvent::empty()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceWorkerError::NoHandler(EventKind::Push)));
    }
}
