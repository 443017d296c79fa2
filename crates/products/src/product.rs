use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::ProductId;

/// A row of the `product` table.
///
/// `available = false` marks the product as deleted; rows are never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: f64,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product. The store assigns `id` and timestamps and
/// sets `available = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
}

/// Partial update payload as received from a caller.
///
/// Callers may echo the identifier back; it is never applied (see
/// [`ProductPatch::strip_id`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl ProductPatch {
    /// Drop the identifier and keep only the mutable fields.
    pub fn strip_id(self) -> ProductChanges {
        let ProductPatch { id: _, name, price } = self;
        ProductChanges { name, price }
    }
}

/// Mutable product fields to apply in an update. `None` leaves a column as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub price: Option<f64>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none()
    }

    /// Apply the changes to an in-memory record (used by non-SQL stores).
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
    }
}
