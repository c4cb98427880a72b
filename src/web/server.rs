//! Web server and service wiring.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::services::{ServeDir, ServeFile};

use super::middleware::RateLimitState;
use super::router::create_router;
use super::AppState;
use crate::auth::SessionManager;
use crate::config::{Config, ContentBackend, RegistryBackend};
use crate::db::Database;
use crate::file::{
    BlobStore, ContentChain, ContentTarget, FileRegistry, FileService, FileStorage,
    MemoryRegistry, SqlFileRegistry, UploadLimits,
};
use crate::remote::{FtpStore, RemoteContent, RemoteMirror};
use crate::{FiledockError, Result};

/// Assemble the file service described by `config`.
///
/// The retrieval chain is database blobs (when a database is in use), then
/// local disk, then the remote mirror (when enabled).
pub async fn build_file_service(config: &Config, storage: FileStorage) -> Result<FileService> {
    let database = match config.storage.registry {
        RegistryBackend::Database => Some(Database::connect(&config.database.url).await?),
        RegistryBackend::Memory => None,
    };

    let registry: Arc<dyn FileRegistry> = match &database {
        Some(db) => {
            let registry = SqlFileRegistry::new(db.pool().clone());
            registry.backfill_search_names().await?;
            Arc::new(registry)
        }
        None => Arc::new(MemoryRegistry::new()),
    };

    let target = match (config.storage.content, &database) {
        (ContentBackend::Local, _) => ContentTarget::Local(storage.clone()),
        (ContentBackend::Database, Some(db)) => {
            ContentTarget::Database(BlobStore::new(db.pool().clone()))
        }
        (ContentBackend::Database, None) => {
            return Err(FiledockError::Config(
                "storage.content = \"database\" requires a database registry".to_string(),
            ))
        }
    };

    let mut chain = ContentChain::new();
    if let Some(db) = &database {
        chain = chain.with(Arc::new(BlobStore::new(db.pool().clone())));
    }
    chain = chain.with(Arc::new(storage));

    let mirror = if config.ftp.enabled {
        let store = Arc::new(FtpStore::new(&config.ftp));
        Some(RemoteMirror::new(store, config.ftp.uploads_dir.clone()))
    } else {
        None
    };
    if let Some(mirror) = &mirror {
        chain = chain.with(Arc::new(RemoteContent::new(mirror.clone())));
    }

    let limits = UploadLimits {
        max_file_size: config.storage.max_upload_bytes(),
        max_files: config.storage.max_files_per_upload,
    };

    tracing::info!(
        registry = ?config.storage.registry,
        content = ?config.storage.content,
        stores = ?chain.store_names(),
        mirror = mirror.is_some(),
        "File service ready"
    );

    Ok(FileService::new(registry, target, chain, mirror, limits))
}

/// Web server for the API.
pub struct WebServer {
    addr: SocketAddr,
    config: Config,
    storage: FileStorage,
    state: Arc<AppState>,
}

impl WebServer {
    /// Build the server and all stores from configuration.
    pub async fn new(config: Config) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| FiledockError::Config(format!("invalid server address: {e}")))?;

        let storage = FileStorage::new(&config.storage.path)?;
        tracing::info!("File storage initialized at: {}", config.storage.path);

        let files = build_file_service(&config, storage.clone()).await?;

        let sessions = SessionManager::from_config(&config.auth);
        if config.auth.users.is_empty() {
            tracing::warn!("No users configured in [[auth.users]]; nobody can log in");
        }

        let state = Arc::new(AppState::new(
            files,
            sessions,
            RateLimitState::new(config.server.login_rate_limit),
        ));

        Ok(Self {
            addr,
            config,
            storage,
            state,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Full router: API, optional static UI bundle, gzip.
    pub fn router(&self) -> Router {
        let mut router = create_router(self.state.clone(), &self.config.server.cors_origins);

        if self.config.server.serve_static {
            let root = std::path::Path::new(&self.config.server.static_path);
            if root.is_dir() {
                let index = root.join("index.html");
                router = router.fallback_service(ServeDir::new(root).fallback(ServeFile::new(index)));
                tracing::info!("Serving static files from {}", root.display());
            } else {
                tracing::warn!(
                    "Static path {} does not exist, static serving disabled",
                    root.display()
                );
            }
        }

        router.layer(CompressionLayer::new())
    }

    /// Sweep expired sessions, stale rate-limit keys and empty shard
    /// directories.
    fn start_cleanup_task(state: Arc<AppState>, storage: FileStorage, interval_secs: u64) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;

                let removed = state.sessions.lock().await.cleanup();
                if removed > 0 {
                    tracing::info!(removed, "Cleaned up expired sessions");
                }
                state.rate_limit.cleanup();

                match storage.cleanup_empty_dirs().await {
                    Ok(count) if count > 0 => {
                        tracing::debug!(count, "Removed empty storage directories")
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Failed to clean storage directories"),
                }
            }
        });
    }

    /// Reconcile the remote mirror once in the background.
    fn start_initial_sync(state: Arc<AppState>) {
        if state.files.mirror().is_none() {
            return;
        }
        tokio::spawn(async move {
            let report = state.files.sync().await;
            tracing::debug!(?report, "Startup mirror sync finished");
        });
    }

    /// Bind the configured address and serve until the process ends.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = self.router();
        let local_addr = listener.local_addr()?;

        Self::start_cleanup_task(
            self.state.clone(),
            self.storage.clone(),
            self.config.auth.cleanup_interval_secs,
        );
        Self::start_initial_sync(self.state.clone());

        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }
}
