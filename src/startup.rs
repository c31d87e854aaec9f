//! Application Startup
//!
//! Wires storage, services and the socket gateway together and serves them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::application::services::{
    AttachmentService, Authenticator, ConversationService, ConversationServiceImpl,
    JwtAuthenticator, MessageService, MessageServiceImpl,
};
use crate::config::Settings;
use crate::domain::ConversationRepository;
use crate::infrastructure::blob::FsBlobStore;
use crate::infrastructure::cache::{
    self, enable_expiry_notifications, ExpiryWatcher, RedisClaimStore, WatchState,
};
use crate::infrastructure::database;
use crate::infrastructure::repositories::{
    PgConversationRepository, PgMessageRepository, PgUserRepository,
};
use crate::presentation::http::create_router;
use crate::presentation::websocket::{ConnectionRegistry, MessagePipeline};
use crate::shared::background::BackgroundTasks;
use crate::shared::rate_limiter::RateLimiter;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: ConnectionManager,
    pub settings: Arc<Settings>,
    pub registry: Arc<ConnectionRegistry>,
    pub pipeline: Arc<MessagePipeline>,
    pub http_limiter: Arc<RateLimiter>,
    pub authenticator: Arc<dyn Authenticator>,
    pub conversations: Arc<dyn ConversationService>,
    pub conversation_repo: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageService>,
    pub attachments: Arc<AttachmentService>,
    pub background: BackgroundTasks,
    pub expiry: WatchState,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    registry: Arc<ConnectionRegistry>,
    workers: Vec<JoinHandle<()>>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let db = database::create_pool(&settings.database).await?;
        database::run_migrations(&db).await?;
        tracing::info!("Database ready");

        let mut redis = cache::create_redis_client(&settings.redis).await?;
        if settings.redis.keyspace_notifications {
            enable_expiry_notifications(&mut redis).await;
        }

        let id_generator = Arc::new(SnowflakeGenerator::new(settings.snowflake.machine_id));
        let background = BackgroundTasks::new(settings.background.max_in_flight);

        let user_repo = Arc::new(PgUserRepository::new(db.clone()));
        let conversation_repo = Arc::new(PgConversationRepository::new(db.clone()));
        let message_repo = Arc::new(PgMessageRepository::new(db.clone()));

        let attachments = Arc::new(AttachmentService::new(
            Arc::new(RedisClaimStore::new(
                redis.clone(),
                settings.attachments.active_ttl_secs,
                settings.attachments.data_ttl_secs,
            )),
            Arc::new(FsBlobStore::new(
                settings.blob.root.clone(),
                settings.blob.key_prefix.clone(),
            )),
            background.clone(),
        ));
        let messages: Arc<dyn MessageService> = Arc::new(MessageServiceImpl::new(
            message_repo,
            conversation_repo.clone(),
            id_generator.clone(),
            background.clone(),
        ));
        let conversations: Arc<dyn ConversationService> = Arc::new(ConversationServiceImpl::new(
            conversation_repo.clone(),
            user_repo.clone(),
            id_generator,
        ));
        let authenticator: Arc<dyn Authenticator> =
            Arc::new(JwtAuthenticator::new(user_repo, &settings.jwt));

        let limits = &settings.rate_limit;
        let http_limiter = Arc::new(RateLimiter::new(limits.http_refill_per_sec, limits.http_burst));
        let socket_limiter = Arc::new(RateLimiter::new(
            limits.socket_refill_per_sec,
            limits.socket_burst,
        ));

        let registry = Arc::new(ConnectionRegistry::new(settings.websocket.write_timeout()));
        let pipeline = Arc::new(MessagePipeline::new(
            socket_limiter.clone(),
            attachments.clone(),
            messages.clone(),
            registry.clone(),
        ));

        let sweep = Duration::from_secs(limits.idle_bucket_secs);
        let mut workers = vec![
            http_limiter.spawn_sweeper(sweep),
            socket_limiter.spawn_sweeper(sweep),
        ];

        let watcher_attachments = attachments.clone();
        let watcher = ExpiryWatcher::new(
            redis::Client::open(settings.redis.url.as_str())?,
            move |owner| {
                watcher_attachments.spawn_reclaim(owner);
            },
        );
        let expiry = watcher.state();
        workers.push(tokio::spawn(watcher.run()));

        let settings = Arc::new(settings);
        let state = AppState {
            db,
            redis,
            settings: settings.clone(),
            registry: registry.clone(),
            pipeline,
            http_limiter,
            authenticator,
            conversations,
            conversation_repo,
            messages,
            attachments,
            background,
            expiry,
        };

        let router = create_router(state);

        let listener = TcpListener::bind(settings.server_addr()).await?;
        tracing::info!(addr = %listener.local_addr()?, "Listening");

        Ok(Self {
            listener,
            router,
            registry,
            workers,
        })
    }

    /// Serve until Ctrl+C or SIGTERM, then close every socket session.
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!(sessions = self.registry.len(), "Shutting down");
        self.registry.shutdown().await;
        for worker in self.workers {
            worker.abort();
        }
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
