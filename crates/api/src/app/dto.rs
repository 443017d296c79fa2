use serde::Deserialize;

use catalog_core::{DomainError, DomainResult, ProductId};
use catalog_products::{NewProduct, Pagination, ProductPatch};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: f64,
}

/// Unknown fields are dropped; `id` is accepted but never applied.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProductRequest {
    pub id: Option<i32>,
    pub name: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -------------------------
// Validation + mapping
// -------------------------

const MAX_PRICE_DECIMALS: usize = 4;

fn validate_name(name: &str, problems: &mut Vec<String>) {
    if name.trim().is_empty() {
        problems.push("name should not be empty".to_string());
    }
}

fn validate_price(price: f64, problems: &mut Vec<String>) {
    if !price.is_finite() {
        problems.push("price must be a number".to_string());
        return;
    }
    if price < 0.0 {
        problems.push("price must not be less than 0".to_string());
    }
    if decimal_places(price).is_none_or(|places| places > MAX_PRICE_DECIMALS) {
        problems.push(format!(
            "price must have at most {MAX_PRICE_DECIMALS} decimal places"
        ));
    }
}

/// Digits after the point in the shortest text form of `value`.
/// `None` for exponent notation.
fn decimal_places(value: f64) -> Option<usize> {
    let text = value.to_string();
    if text.contains(['e', 'E']) {
        return None;
    }
    Some(text.split_once('.').map_or(0, |(_, fraction)| fraction.len()))
}

fn into_result<T>(value: T, problems: Vec<String>) -> DomainResult<T> {
    if problems.is_empty() {
        Ok(value)
    } else {
        Err(DomainError::validation(problems.join("; ")))
    }
}

impl CreateProductRequest {
    pub fn validate(self) -> DomainResult<NewProduct> {
        let mut problems = Vec::new();
        validate_name(&self.name, &mut problems);
        validate_price(self.price, &mut problems);

        into_result(
            NewProduct {
                name: self.name,
                price: self.price,
            },
            problems,
        )
    }
}

impl UpdateProductRequest {
    pub fn validate(self) -> DomainResult<ProductPatch> {
        let mut problems = Vec::new();
        if let Some(name) = &self.name {
            validate_name(name, &mut problems);
        }
        if let Some(price) = self.price {
            validate_price(price, &mut problems);
        }

        into_result(
            ProductPatch {
                id: self.id.map(ProductId::new),
                name: self.name,
                price: self.price,
            },
            problems,
        )
    }
}

impl PaginationQuery {
    pub fn validate(self) -> DomainResult<Pagination> {
        let defaults = Pagination::default();
        Pagination::new(
            self.page.unwrap_or(defaults.page()),
            self.limit.unwrap_or(defaults.limit()),
        )
    }
}
