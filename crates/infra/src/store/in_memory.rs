use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use catalog_core::ProductId;
use catalog_products::{NewProduct, Product, ProductChanges, ProductStore, StoreError};

/// In-memory product store for tests/dev.
///
/// Mirrors the Postgres store: ids are assigned sequentially from 1 and rows are
/// iterated in id order.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    inner: RwLock<Table>,
}

#[derive(Debug, Default)]
struct Table {
    last_id: i32,
    rows: BTreeMap<ProductId, Product>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("in-memory product table lock poisoned".to_string())
    }

    fn modify<F>(&self, id: ProductId, f: F) -> Result<Product, StoreError>
    where
        F: FnOnce(&mut Product),
    {
        let mut table = self.inner.write().map_err(|_| Self::poisoned())?;
        let product = table.rows.get_mut(&id).ok_or(StoreError::RecordNotFound)?;
        f(product);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn insert(&self, input: NewProduct) -> Result<Product, StoreError> {
        let mut table = self.inner.write().map_err(|_| Self::poisoned())?;
        table.last_id += 1;

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(table.last_id),
            name: input.name,
            price: input.price,
            available: true,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(product.id, product.clone());
        Ok(product)
    }

    async fn count_available(&self) -> Result<u64, StoreError> {
        let table = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(table.rows.values().filter(|p| p.available).count() as u64)
    }

    async fn list_available(&self, offset: u64, limit: u32) -> Result<Vec<Product>, StoreError> {
        let table = self.inner.read().map_err(|_| Self::poisoned())?;
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);

        Ok(table
            .rows
            .values()
            .filter(|p| p.available)
            .skip(skip)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_available(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let table = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(table.rows.get(&id).filter(|p| p.available).cloned())
    }

    async fn update(&self, id: ProductId, changes: ProductChanges) -> Result<Product, StoreError> {
        self.modify(id, |product| changes.apply_to(product))
    }

    async fn set_available(&self, id: ProductId, available: bool) -> Result<Product, StoreError> {
        self.modify(id, |product| product.available = available)
    }
}
