use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::config::{AppConfig, CodeFormat, JwtConfig, RotationPolicy, StoreConfig};
use crate::kuris::repo::{KuriStore, MemoryKuriStore, PgKuriStore};
use crate::spin::hub::SpinHub;
use crate::users::repo::{MemoryUserStore, PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub kuris: Arc<dyn KuriStore>,
    pub spins: Arc<SpinHub>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        Self::with_config(config).await
    }

    pub async fn with_config(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let (users, kuris): (Arc<dyn UserStore>, Arc<dyn KuriStore>) = match &config.store {
            StoreConfig::Postgres { url } => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                // Run migrations if present
                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
                }

                (
                    Arc::new(PgUserStore::new(db.clone())),
                    Arc::new(PgKuriStore::new(db)),
                )
            }
            StoreConfig::Memory => (
                Arc::new(MemoryUserStore::default()),
                Arc::new(MemoryKuriStore::default()),
            ),
        };

        Ok(Self {
            users,
            kuris,
            spins: Arc::new(SpinHub::default()),
            config,
        })
    }

    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store: StoreConfig::Memory,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            rotation: RotationPolicy::Nominate,
            code_format: CodeFormat::Alnum,
        });

        Self {
            users: Arc::new(MemoryUserStore::default()),
            kuris: Arc::new(MemoryKuriStore::default()),
            spins: Arc::new(SpinHub::default()),
            config,
        }
    }
}
