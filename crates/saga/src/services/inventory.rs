//! Inventory adapter trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Money, ProductId};
use thiserror::Error;

/// Current price and stock of a product, as reported by the catalog.
#[derive(Debug, Clone)]
pub struct ProductInfo {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
}

/// Errors from the inventory collaborator.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The product id is unknown.
    #[error("product not found: {0}")]
    NotFound(ProductId),

    /// The adjustment would drive stock below zero.
    #[error("insufficient stock for product {0}")]
    InsufficientStock(ProductId),

    /// The inventory service could not be reached. Retryable.
    #[error("inventory service unavailable: {0}")]
    Unavailable(String),
}

/// Trait for the inventory collaborator.
#[async_trait]
pub trait InventoryAdapter: Send + Sync {
    /// Fetches the current price and stock of a product.
    ///
    /// Returns `None` for an unknown product id.
    async fn get_product(&self, product_id: &ProductId)
    -> Result<Option<ProductInfo>, InventoryError>;

    /// Adjusts the stock of a product. A negative delta reserves stock, a
    /// positive delta restores it.
    async fn adjust_stock(&self, product_id: &ProductId, delta: i64)
    -> Result<(), InventoryError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    products: HashMap<ProductId, ProductInfo>,
    fail_on_adjust: bool,
}

/// In-memory inventory for testing and the demo binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventory {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventory {
    /// Creates a new empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a product, returning self for chaining.
    pub fn with_product(
        self,
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Self {
        let product_id = product_id.into();
        self.state.write().unwrap().products.insert(
            product_id.clone(),
            ProductInfo {
                product_id,
                name: name.into(),
                price,
                stock,
            },
        );
        self
    }

    /// Returns the current stock of a product.
    pub fn stock_of(&self, product_id: &ProductId) -> Option<u32> {
        self.state
            .read()
            .unwrap()
            .products
            .get(product_id)
            .map(|p| p.stock)
    }

    /// Configures the adapter to fail the next adjust calls.
    pub fn set_fail_on_adjust(&self, fail: bool) {
        self.state.write().unwrap().fail_on_adjust = fail;
    }
}

#[async_trait]
impl InventoryAdapter for InMemoryInventory {
    async fn get_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ProductInfo>, InventoryError> {
        let state = self.state.read().unwrap();
        Ok(state.products.get(product_id).cloned())
    }

    async fn adjust_stock(
        &self,
        product_id: &ProductId,
        delta: i64,
    ) -> Result<(), InventoryError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_adjust {
            return Err(InventoryError::Unavailable("injected failure".to_string()));
        }

        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::NotFound(product_id.clone()))?;

        let new_stock = product.stock as i64 + delta;
        if new_stock < 0 {
            return Err(InventoryError::InsufficientStock(product_id.clone()));
        }
        product.stock = new_stock as u32;
        Ok(())
    }
}
