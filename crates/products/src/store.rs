//! Storage boundary for product rows.
//!
//! Adapters (Postgres, in-memory) implement [`ProductStore`]. The one failure
//! the service reacts to, "record to update not found", is a typed variant
//! here so callers never inspect driver error codes.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use catalog_core::ProductId;

use crate::product::{NewProduct, Product, ProductChanges};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// An update targeted an id with no matching row.
    #[error("record to update not found")]
    RecordNotFound,

    /// A row could not be decoded into a `Product`.
    #[error("failed to decode product row: {0}")]
    Decode(String),

    /// Any other backend failure (connection, constraint, SQL error, ...).
    #[error("storage error: {0}")]
    Backend(String),
}

/// Product persistence operations. Each call is a single statement.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Insert a new, available row and return it with its assigned id.
    async fn insert(&self, input: NewProduct) -> Result<Product, StoreError>;

    /// Count rows with `available = true`.
    async fn count_available(&self) -> Result<u64, StoreError>;

    /// Available rows ordered by id ascending, skipping `offset`, at most `limit`.
    async fn list_available(&self, offset: u64, limit: u32) -> Result<Vec<Product>, StoreError>;

    /// The row with `id`, only if it is available.
    async fn find_available(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Apply `changes` to the row with `id` regardless of availability.
    ///
    /// Returns [`StoreError::RecordNotFound`] when no row has that id.
    async fn update(&self, id: ProductId, changes: ProductChanges) -> Result<Product, StoreError>;

    /// Set the `available` flag on the row with `id`.
    ///
    /// Returns [`StoreError::RecordNotFound`] when no row has that id.
    async fn set_available(&self, id: ProductId, available: bool) -> Result<Product, StoreError>;
}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn insert(&self, input: NewProduct) -> Result<Product, StoreError> {
        (**self).insert(input).await
    }

    async fn count_available(&self) -> Result<u64, StoreError> {
        (**self).count_available().await
    }

    async fn list_available(&self, offset: u64, limit: u32) -> Result<Vec<Product>, StoreError> {
        (**self).list_available(offset, limit).await
    }

    async fn find_available(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).find_available(id).await
    }

    async fn update(&self, id: ProductId, changes: ProductChanges) -> Result<Product, StoreError> {
        (**self).update(id, changes).await
    }

    async fn set_available(&self, id: ProductId, available: bool) -> Result<Product, StoreError> {
        (**self).set_available(id, available).await
    }
}
