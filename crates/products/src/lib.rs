//! Products domain module.
//!
//! This crate holds the product record types, the pagination model, the
//! storage boundary (`ProductStore`) and the `ProductService` that drives it.
//! Nothing here performs IO directly; storage adapters live in `catalog-infra`.

pub mod pagination;
pub mod product;
pub mod service;
pub mod store;

pub use pagination::{Page, PageMeta, Pagination};
pub use product::{NewProduct, Product, ProductChanges, ProductPatch};
pub use service::{ProductService, ProductServiceError};
pub use store::{ProductStore, StoreError};
