//! Builds an activated worker wired to a live origin.

use std::path::Path;
use std::sync::Arc;

use gestor_common::GestorError;
use gestor_net::{LoaderConfig, ResourceLoader};
use gestor_sw::{
    ActivateReport, Clients, InstallReport, MemoryCacheStorage, NotificationCenter, ServiceWorker,
    WorkerConfig, WorkerContext,
};
use tracing::info;
use url::Url;

/// Read the configuration file (or defaults) and apply an origin override.
pub fn load_config(path: Option<&Path>, origin: Option<Url>) -> Result<WorkerConfig, GestorError> {
    let mut config = match path {
        Some(path) => WorkerConfig::from_file(path)?,
        None => WorkerConfig::default(),
    };
    if let Some(origin) = origin {
        config.origin = origin;
        config.validate()?;
    }
    Ok(config)
}

/// An installed and activated worker plus the in-memory hosts it uses.
pub struct Session {
    pub worker: ServiceWorker,
    pub notifications: Arc<NotificationCenter>,
    pub install: InstallReport,
    pub activate: ActivateReport,
}

impl Session {
    pub async fn start(config: WorkerConfig) -> Result<Self, GestorError> {
        let loader = ResourceLoader::new(LoaderConfig::for_origin(config.origin.clone()))
            .map_err(|e| GestorError::network_with_source("cannot build HTTP client", e))?;

        let notifications = Arc::new(NotificationCenter::new());
        let context = WorkerContext {
            config: Arc::new(config),
            caches: Arc::new(MemoryCacheStorage::new()),
            fetcher: Arc::new(loader),
            notifications: notifications.clone(),
            clients: Arc::new(Clients::new()),
        };

        let (worker, _events) = ServiceWorker::new(context);
        info!(origin = %worker.config().origin, cache = %worker.config().cache_name, "Starting worker");

        let install = worker.install().await?;
        let activate = worker.activate().await?;

        Ok(Self {
            worker,
            notifications,
            install,
            activate,
        })
    }

    pub fn print_lifecycle(&self) {
        println!("Cache {}:", self.install.cache_name);
        match self.install.error {
            Some(ref error) => println!("  Precache failed: {error}"),
            None => println!("  Precached {} assets", self.install.entries),
        }
        if self.activate.deleted.is_empty() {
            println!("  No stale caches");
        } else {
            println!("  Deleted stale caches: {}", self.activate.deleted.join(", "));
        }
    }
}
