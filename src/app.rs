//! Application assembly: build the shared services once and hand them to the
//! modules.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use readshelf_authz::{AccessGuard, PasswordHasher, TokenService};
use readshelf_db::{BookRepository, MemoryStore, UserRepository};
use readshelf_kernel::{settings::Settings, Clock, InitCtx, ModuleRegistry, SystemClock};

use crate::modules::{self, books::images::LocalImageHost};

/// Shared collaborators every module is built from.
#[derive(Clone)]
pub struct Services {
    pub users: Arc<dyn UserRepository>,
    pub books: Arc<dyn BookRepository>,
    pub tokens: Arc<TokenService>,
    pub guard: Arc<AccessGuard>,
    pub hasher: PasswordHasher,
    pub images: Arc<LocalImageHost>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Build services over an explicit store and clock.
    pub fn new(settings: &Settings, store: Arc<MemoryStore>, clock: Arc<dyn Clock>) -> Self {
        let users: Arc<dyn UserRepository> = store.clone();
        let books: Arc<dyn BookRepository> = store;
        let tokens = Arc::new(TokenService::from_settings(&settings.auth, clock.clone()));
        let guard = Arc::new(AccessGuard::new(
            tokens.clone(),
            users.clone(),
            settings.auth.cron_secret.clone(),
        ));

        Self {
            users,
            books,
            tokens,
            guard,
            hasher: PasswordHasher::new(settings.auth.bcrypt_cost),
            images: Arc::new(image_host(settings)),
            clock,
        }
    }

    /// Open the configured store and build services on the system clock.
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let store = match &settings.database.snapshot_path {
            Some(path) => MemoryStore::open(path)
                .await
                .with_context(|| format!("failed to open store at {}", path.display()))?,
            None => {
                tracing::warn!("database.snapshot_path not set; data lives in memory only");
                MemoryStore::new()
            }
        };

        Ok(Self::new(settings, Arc::new(store), Arc::new(SystemClock)))
    }
}

/// Images go to `images.dir`, else next to the database snapshot, else memory.
fn image_host(settings: &Settings) -> LocalImageHost {
    let base_url = &settings.images.public_base_url;
    let dir = settings.images.dir.clone().or_else(|| {
        let snapshot = settings.database.snapshot_path.as_ref()?;
        Some(snapshot.parent().unwrap_or(Path::new("")).join("images"))
    });

    match dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "storing images on disk");
            LocalImageHost::with_dir(base_url, dir)
        }
        None => LocalImageHost::new(base_url),
    }
}

/// Registry with every application module registered.
pub fn build_registry(services: &Services) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, services)?;
    Ok(registry)
}

/// Run the server until Ctrl-C.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let services = Services::from_settings(&settings).await?;
    let registry = build_registry(&services)?;
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    readshelf_http::start_server(&registry, &settings, shutdown_signal()).await?;

    registry.stop_all().await?;
    tracing::info!("readshelf-app stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
