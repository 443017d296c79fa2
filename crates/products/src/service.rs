//! Product service: create, list, get, update and soft-delete.
//!
//! Every operation is one round trip to the [`ProductStore`]. The service keeps
//! no state of its own besides the store handle it was constructed with.

use thiserror::Error;
use tracing::instrument;

use catalog_core::ProductId;

use crate::pagination::{Page, PageMeta, Pagination};
use crate::product::{NewProduct, Product, ProductPatch};
use crate::store::{ProductStore, StoreError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProductServiceError {
    /// The id does not reference an available product (reads) or any row (writes).
    #[error("{message}")]
    NotFound { id: ProductId, message: String },

    /// The caller supplied nothing to change.
    #[error("{0}")]
    BadRequest(String),

    /// Unclassified storage failure, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProductServiceError {
    fn not_found(id: ProductId, suffix: Option<&str>) -> Self {
        let message = match suffix {
            Some(suffix) => format!("Product with id #{id} not found, {suffix}"),
            None => format!("Product with id #{id} not found"),
        };
        Self::NotFound { id, message }
    }

    /// Translate the store's "record to update not found" into `NotFound`.
    fn from_write(id: ProductId, err: StoreError, suffix: &str) -> Self {
        match err {
            StoreError::RecordNotFound => Self::not_found(id, Some(suffix)),
            other => Self::Store(other),
        }
    }
}

pub struct ProductService<S> {
    store: S,
}

impl<S> ProductService<S>
where
    S: ProductStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: NewProduct) -> Result<Product, ProductServiceError> {
        Ok(self.store.insert(input).await?)
    }

    #[instrument(skip(self), fields(page = pagination.page(), limit = pagination.limit()))]
    pub async fn find_all(&self, pagination: Pagination) -> Result<Page<Product>, ProductServiceError> {
        let total = self.store.count_available().await?;
        let meta = PageMeta::compute(total, pagination);
        let data = self
            .store
            .list_available(pagination.offset(), pagination.limit())
            .await?;

        Ok(Page { data, meta })
    }

    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn find_one(&self, id: ProductId) -> Result<Product, ProductServiceError> {
        self.store
            .find_available(id)
            .await?
            .ok_or_else(|| ProductServiceError::not_found(id, None))
    }

    /// Apply a partial update. Any `id` in the patch is ignored.
    #[instrument(skip(self, patch), fields(product_id = %id))]
    pub async fn update(&self, id: ProductId, patch: ProductPatch) -> Result<Product, ProductServiceError> {
        let changes = patch.strip_id();
        if changes.is_empty() {
            return Err(ProductServiceError::BadRequest("No data to update".to_string()));
        }

        self.store
            .update(id, changes)
            .await
            .map_err(|e| ProductServiceError::from_write(id, e, "update failed"))
    }

    /// Soft delete: flips `available` to false and returns the row.
    ///
    /// The current availability is not checked, so removing an already removed
    /// product succeeds again.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn remove(&self, id: ProductId) -> Result<Product, ProductServiceError> {
        self.store
            .set_available(id, false)
            .await
            .map_err(|e| ProductServiceError::from_write(id, e, "delete failed"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::product::ProductChanges;

    /// Store double that records calls and answers writes with a canned result.
    #[derive(Default)]
    struct ScriptedStore {
        calls: Mutex<Vec<&'static str>>,
        write_error: Option<StoreError>,
        rows: Vec<Product>,
    }

    impl ScriptedStore {
        fn failing_writes(err: StoreError) -> Self {
            Self {
                write_error: Some(err),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn row(id: ProductId) -> Product {
            Product {
                id,
                name: "Lamp".to_string(),
                price: 20.0,
                available: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }
        }

        fn write_result(&self, id: ProductId) -> Result<Product, StoreError> {
            match &self.write_error {
                Some(err) => Err(err.clone()),
                None => Ok(Self::row(id)),
            }
        }
    }

    #[async_trait]
    impl ProductStore for ScriptedStore {
        async fn insert(&self, _input: NewProduct) -> Result<Product, StoreError> {
            self.record("insert");
            self.write_result(ProductId::new(1))
        }

        async fn count_available(&self) -> Result<u64, StoreError> {
            self.record("count_available");
            Ok(self.rows.len() as u64)
        }

        async fn list_available(&self, offset: u64, limit: u32) -> Result<Vec<Product>, StoreError> {
            self.record("list_available");
            Ok(self
                .rows
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn find_available(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.record("find_available");
            Ok(self.rows.iter().find(|p| p.id == id).cloned())
        }

        async fn update(&self, id: ProductId, _changes: ProductChanges) -> Result<Product, StoreError> {
            self.record("update");
            self.write_result(id)
        }

        async fn set_available(&self, id: ProductId, _available: bool) -> Result<Product, StoreError> {
            self.record("set_available");
            self.write_result(id)
        }
    }

    #[tokio::test]
    async fn update_with_empty_patch_is_rejected_before_touching_the_store() {
        let service = ProductService::new(ScriptedStore::default());

        let err = service
            .update(ProductId::new(1), ProductPatch::default())
            .await
            .unwrap_err();

        assert_eq!(err, ProductServiceError::BadRequest("No data to update".to_string()));
        assert!(service.store().calls().is_empty());
    }

    #[tokio::test]
    async fn update_with_only_an_id_is_rejected() {
        let service = ProductService::new(ScriptedStore::default());
        let patch = ProductPatch {
            id: Some(ProductId::new(5)),
            ..Default::default()
        };

        let err = service.update(ProductId::new(5), patch).await.unwrap_err();

        assert!(matches!(err, ProductServiceError::BadRequest(_)));
        assert!(service.store().calls().is_empty());
    }

    #[tokio::test]
    async fn update_translates_record_not_found() {
        let service = ProductService::new(ScriptedStore::failing_writes(StoreError::RecordNotFound));
        let patch = ProductPatch {
            name: Some("Desk lamp".to_string()),
            ..Default::default()
        };

        let err = service.update(ProductId::new(7), patch).await.unwrap_err();

        match err {
            ProductServiceError::NotFound { id, message } => {
                assert_eq!(id, ProductId::new(7));
                assert_eq!(message, "Product with id #7 not found, update failed");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn remove_translates_record_not_found() {
        let service = ProductService::new(ScriptedStore::failing_writes(StoreError::RecordNotFound));

        let err = service.remove(ProductId::new(3)).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Product with id #3 not found, delete failed"
        );
        assert_eq!(service.store().calls(), vec!["set_available"]);
    }

    #[tokio::test]
    async fn other_store_errors_pass_through_unchanged() {
        let backend = StoreError::Backend("connection reset".to_string());
        let service = ProductService::new(ScriptedStore::failing_writes(backend.clone()));
        let patch = ProductPatch {
            price: Some(1.0),
            ..Default::default()
        };

        let update_err = service.update(ProductId::new(1), patch).await.unwrap_err();
        let remove_err = service.remove(ProductId::new(1)).await.unwrap_err();
        let create_err = service
            .create(NewProduct {
                name: "Lamp".to_string(),
                price: 20.0,
            })
            .await
            .unwrap_err();

        for err in [update_err, remove_err, create_err] {
            assert_eq!(err, ProductServiceError::Store(backend.clone()));
            assert_eq!(err.to_string(), "storage error: connection reset");
        }
    }

    #[tokio::test]
    async fn find_one_reports_missing_id() {
        let service = ProductService::new(ScriptedStore::default());

        let err = service.find_one(ProductId::new(42)).await.unwrap_err();

        assert_eq!(
            err,
            ProductServiceError::NotFound {
                id: ProductId::new(42),
                message: "Product with id #42 not found".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn find_all_counts_then_lists() {
        let store = ScriptedStore {
            rows: (1..=3).map(|i| ScriptedStore::row(ProductId::new(i))).collect(),
            ..Default::default()
        };
        let service = ProductService::new(store);

        let page = service
            .find_all(Pagination::new(2, 2).unwrap())
            .await
            .unwrap();

        assert_eq!(page.meta, PageMeta { total: 3, page: 2, last_page: 2 });
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, ProductId::new(3));
        assert_eq!(service.store().calls(), vec!["count_available", "list_available"]);
    }
}
