use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use catalog_infra::{db, AppConfig, InMemoryProductStore, PostgresProductStore};
use catalog_products::{ProductService, ProductStore};

pub type DynProductStore = Arc<dyn ProductStore>;

/// Which store backs the service, plus the resources it owns.
#[derive(Debug, Clone)]
enum Backend {
    InMemory,
    Postgres(PgPool),
}

pub struct AppServices {
    products: ProductService<DynProductStore>,
    backend: Backend,
}

impl AppServices {
    /// Wire services from configuration: Postgres when a database is
    /// configured, in-memory otherwise.
    pub async fn build(config: &AppConfig) -> anyhow::Result<Self> {
        match &config.database {
            Some(db_config) => {
                let pool = db::connect(db_config)
                    .await
                    .context("failed to connect to Postgres")?;
                Ok(Self::postgres(pool))
            }
            None => {
                tracing::warn!("USE_PERSISTENT_STORES not enabled; using in-memory product store");
                Ok(Self::in_memory())
            }
        }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory() -> Self {
        let store: DynProductStore = Arc::new(InMemoryProductStore::new());
        Self {
            products: ProductService::new(store),
            backend: Backend::InMemory,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let store: DynProductStore = Arc::new(PostgresProductStore::new(pool.clone()));
        Self {
            products: ProductService::new(store),
            backend: Backend::Postgres(pool),
        }
    }

    pub fn products(&self) -> &ProductService<DynProductStore> {
        &self.products
    }

    /// Readiness of the underlying store.
    pub async fn check_health(&self) -> Result<(), sqlx::Error> {
        match &self.backend {
            Backend::InMemory => Ok(()),
            Backend::Postgres(pool) => db::check_health(pool).await,
        }
    }

    /// Release the connection pool. Called once after the server stops.
    pub async fn shutdown(&self) {
        if let Backend::Postgres(pool) = &self.backend {
            pool.close().await;
            tracing::info!("database connection closed");
        }
    }
}
