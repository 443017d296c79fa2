//! Postgres-backed product store.
//!
//! ## Table
//!
//! The store expects a `product` table managed by external migration tooling:
//!
//! ```sql
//! CREATE TABLE product (
//!     id          SERIAL PRIMARY KEY,
//!     name        TEXT NOT NULL,
//!     price       DOUBLE PRECISION NOT NULL,
//!     available   BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE INDEX product_available_idx ON product (available);
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError | Scenario |
//! |------------|------------|----------|
//! | `UPDATE ... RETURNING` yields no row | `RecordNotFound` | update / soft delete of an unknown id |
//! | Database (any code) | `Backend` | constraint violations, SQL errors (code kept in the message) |
//! | PoolClosed | `Backend` | pool was closed during shutdown |
//! | Column decode failure | `Decode` | schema drift |
//! | Other | `Backend` | network errors, connection failures, etc. |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use catalog_core::ProductId;
use catalog_products::{NewProduct, Product, ProductChanges, ProductStore, StoreError};

const PRODUCT_COLUMNS: &str = "id, name, price, available, created_at, updated_at";

/// Product store over a shared SQLx connection pool.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    #[instrument(skip(self, input), fields(operation = "insert_product"))]
    async fn insert(&self, input: NewProduct) -> Result<Product, StoreError> {
        let sql = format!(
            "INSERT INTO product (name, price) VALUES ($1, $2) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&input.name)
            .bind(input.price)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_product", e))?;

        ProductRow::decode(&row)
    }

    #[instrument(skip(self), fields(operation = "count_available_products"))]
    async fn count_available(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM product WHERE available = TRUE")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_available_products", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    #[instrument(skip(self), fields(operation = "list_available_products"))]
    async fn list_available(&self, offset: u64, limit: u32) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM product
            WHERE available = TRUE
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_available_products", e))?;

        rows.iter().map(ProductRow::decode).collect()
    }

    #[instrument(skip(self), fields(operation = "find_available_product", product_id = %id))]
    async fn find_available(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = $1 AND available = TRUE"
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_available_product", e))?;

        row.as_ref().map(ProductRow::decode).transpose()
    }

    #[instrument(skip(self, changes), fields(operation = "update_product", product_id = %id))]
    async fn update(&self, id: ProductId, changes: ProductChanges) -> Result<Product, StoreError> {
        let sql = format!(
            r#"
            UPDATE product
            SET name = COALESCE($2, name),
                price = COALESCE($3, price),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .bind(changes.name)
            .bind(changes.price)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_product", e))?;

        match row {
            Some(row) => ProductRow::decode(&row),
            None => Err(StoreError::RecordNotFound),
        }
    }

    #[instrument(skip(self), fields(operation = "set_product_available", product_id = %id))]
    async fn set_available(&self, id: ProductId, available: bool) -> Result<Product, StoreError> {
        let sql = format!(
            r#"
            UPDATE product
            SET available = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .bind(available)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_product_available", e))?;

        match row {
            Some(row) => ProductRow::decode(&row),
            None => Err(StoreError::RecordNotFound),
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            StoreError::Backend(format!(
                "database error in {operation} [{code}]: {}",
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Decode(format!("{operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: i32,
    name: String,
    price: f64,
    available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            available: row.try_get("available")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl ProductRow {
    fn decode(row: &PgRow) -> Result<Product, StoreError> {
        use sqlx::FromRow;

        ProductRow::from_row(row)
            .map(Into::into)
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// These tests run against a real database, so they are `#[ignore]`d by
/// default. Each run works in its own throwaway schema.
#[cfg(test)]
mod tests {
    use sqlx::Executor;
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    const TEST_TABLE_DDL: &str = r#"
        CREATE TABLE product (
            id          SERIAL PRIMARY KEY,
            name        TEXT NOT NULL,
            price       DOUBLE PRECISION NOT NULL,
            available   BOOLEAN NOT NULL DEFAULT TRUE,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
    "#;

    async fn isolated_store(database_url: &str) -> (PostgresProductStore, PgPool, String) {
        let schema = format!(
            "catalog_test_{}_{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );

        let admin = PgPool::connect(database_url).await.unwrap();
        admin
            .execute(format!("CREATE SCHEMA {schema}").as_str())
            .await
            .unwrap();

        let search_path = format!("SET search_path TO {schema}");
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    conn.execute(search_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await
            .unwrap();
        pool.execute(TEST_TABLE_DDL).await.unwrap();

        (PostgresProductStore::new(pool), admin, schema)
    }

    async fn drop_schema(store: PostgresProductStore, admin: PgPool, schema: String) {
        store.pool().close().await;
        admin
            .execute(format!("DROP SCHEMA {schema} CASCADE").as_str())
            .await
            .unwrap();
        admin.close().await;
    }

    fn lamp(name: &str, price: f64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            price,
        }
    }

    // Run with `DATABASE_URL=... cargo test -p catalog-infra -- --ignored`.
    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a Postgres instance"]
    async fn postgres_store_round_trips_the_product_lifecycle() {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
        let (store, admin, schema) = isolated_store(&database_url).await;

        let created = store.insert(lamp("Lamp", 20.0)).await.unwrap();
        assert_eq!(created.id, ProductId::new(1));
        assert!(created.available);

        for i in 0..4 {
            store.insert(lamp(&format!("Chair {i}"), 10.0 + f64::from(i))).await.unwrap();
        }
        assert_eq!(store.count_available().await.unwrap(), 5);

        let page = store.list_available(2, 2).await.unwrap();
        let ids: Vec<i32> = page.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![3, 4]);

        let updated = store
            .update(
                created.id,
                ProductChanges {
                    name: None,
                    price: Some(22.5),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Lamp");
        assert_eq!(updated.price, 22.5);
        assert!(updated.updated_at >= created.updated_at);

        let removed = store.set_available(created.id, false).await.unwrap();
        assert!(!removed.available);
        assert!(store.find_available(created.id).await.unwrap().is_none());
        assert_eq!(store.count_available().await.unwrap(), 4);

        // Removing again still hits the row.
        assert!(!store.set_available(created.id, false).await.unwrap().available);

        let missing = ProductId::new(999);
        assert_eq!(
            store.update(missing, ProductChanges { name: Some("x".into()), price: None }).await,
            Err(StoreError::RecordNotFound)
        );
        assert_eq!(
            store.set_available(missing, false).await,
            Err(StoreError::RecordNotFound)
        );

        drop_schema(store, admin, schema).await;
    }
}
