use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::api::cache::CachePolicy;
use crate::api::router::AppState;
use crate::application::{
    blob_store::{BlobStore, RetryPolicy},
    ports::{ContentValidator, SessionFactory},
    use_cases::{AvatarUseCase, DefaultContent, FetchContentUseCase, PostContentUseCase},
};
use crate::domain::value_objects::MediaType;
use crate::config::{Config, StoreBackend};
use crate::infrastructure::{
    persistence::{MemoryStore, PostgresStore},
    validation::AllowListValidator,
};

/// Application builder for clean dependency injection and setup
pub struct ApplicationBuilder {
    config: Config,
    sessions: Option<Arc<dyn SessionFactory>>,
    validator: Option<Arc<dyn ContentValidator>>,
    default_avatar: Option<DefaultContent>,
}

impl ApplicationBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sessions: None,
            validator: None,
            default_avatar: None,
        }
    }

    /// Initialize the backend named by `STORE_BACKEND`
    pub async fn with_backend(self) -> Result<Self, Box<dyn std::error::Error>> {
        match self.config.store_backend {
            StoreBackend::Postgres => self.with_database().await,
            StoreBackend::Memory => Ok(self.with_memory_store()),
        }
    }

    /// Initialize database connection pool with retry logic, then migrate
    pub async fn with_database(mut self) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to database");

        let mut retries = 3;
        let mut delay = Duration::from_secs(1);
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(self.config.db_max_connections)
                .min_connections(self.config.db_min_connections)
                .acquire_timeout(Duration::from_secs(self.config.db_acquire_timeout_secs))
                .idle_timeout(Some(Duration::from_secs(self.config.db_idle_timeout_secs)))
                .max_lifetime(Some(Duration::from_secs(self.config.db_max_lifetime_secs)))
                .connect(&self.config.database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) if retries > 0 => {
                    retries -= 1;
                    tracing::warn!(
                        "Database connection failed, retrying in {:?} ({} retries left): {}",
                        delay,
                        retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!("Failed to connect to database after retries: {}", e);
                    return Err(Box::new(e));
                }
            }
        };

        info!(
            max = self.config.db_max_connections,
            min = self.config.db_min_connections,
            acquire_timeout_secs = self.config.db_acquire_timeout_secs,
            "Database pool configured"
        );

        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;

        self.sessions = Some(Arc::new(PostgresStore::new(pool)));
        Ok(self)
    }

    pub fn with_memory_store(mut self) -> Self {
        tracing::warn!("Using in-memory store; contents are lost on shutdown");
        self.sessions = Some(Arc::new(MemoryStore::new()));
        self
    }

    /// Use an already constructed backend
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionFactory>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Read the image named by `DEFAULT_AVATAR_PATH`, if set. Its tag is
    /// computed here once and `Last-Modified` is the file's mtime.
    pub async fn load_default_avatar(mut self) -> Result<Self, Box<dyn std::error::Error>> {
        let Some(path) = self.config.default_avatar_path.clone() else {
            return Ok(self);
        };

        let data = tokio::fs::read(&path).await.map_err(|e| {
            tracing::error!("Failed to read default avatar {}: {}", path, e);
            e
        })?;
        let modified = tokio::fs::metadata(&path).await?.modified()?;
        let media_type = MediaType::parse(&self.config.default_avatar_content_type)?;

        let content =
            DefaultContent::new(Bytes::from(data), media_type, DateTime::<Utc>::from(modified));
        info!(path = %path, tag = %content.digest().tag, "Default avatar loaded");
        self.default_avatar = Some(content);
        Ok(self)
    }

    pub fn with_default_avatar(mut self, content: DefaultContent) -> Self {
        self.default_avatar = Some(content);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn ContentValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Blob store over the configured backend, with the configured retry policy
    pub fn build_store(&self) -> Result<Arc<BlobStore>, Box<dyn std::error::Error>> {
        let sessions = self
            .sessions
            .as_ref()
            .ok_or("Store backend not initialized")?;

        let retry = RetryPolicy::new(
            self.config.retry_max_attempts,
            Duration::from_millis(self.config.retry_base_delay_ms),
        );

        Ok(Arc::new(BlobStore::with_retry_policy(
            Arc::clone(sessions),
            retry,
        )))
    }

    /// Build application state with all use cases
    pub fn build(self) -> Result<AppState, Box<dyn std::error::Error>> {
        let store = self.build_store()?;
        let sessions = self.sessions.ok_or("Store backend not initialized")?;
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(AllowListValidator::default()));

        let avatar_use_case = Arc::new(AvatarUseCase::new(
            Arc::clone(&store),
            Arc::clone(&validator),
        ));
        let post_content_use_case = Arc::new(PostContentUseCase::new(
            Arc::clone(&store),
            Arc::clone(&validator),
        ));
        let mut fetch_use_case = FetchContentUseCase::new(Arc::clone(&store));
        if let Some(content) = self.default_avatar {
            fetch_use_case = fetch_use_case.with_default_avatar(content);
        }
        let fetch_use_case = Arc::new(fetch_use_case);

        info!("Application layer initialized");

        Ok(AppState {
            sessions,
            store,
            avatar_use_case,
            post_content_use_case,
            fetch_use_case,
            cache_policy: CachePolicy::new(self.config.cache_max_age_secs),
            max_content_bytes: self.config.max_content_bytes,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
