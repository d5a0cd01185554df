//! Order line items.

use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::value_objects::{Money, ProductId};

/// A line in an order, owned exclusively by that order.
///
/// The subtotal is always recomputed from quantity and unit price; it is
/// never trusted from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Human-readable product name.
    pub product_name: String,

    /// Quantity ordered (at least 1).
    pub quantity: u32,

    /// Price per unit at submission time.
    pub unit_price: Money,

    /// quantity × unit_price.
    pub subtotal: Money,
}

impl LineItem {
    /// Creates a new line item, validating quantity and price and computing
    /// the subtotal.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, OrderError> {
        let product_id = product_id.into();

        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { product_id });
        }
        if unit_price.is_negative() {
            return Err(OrderError::NegativePrice { product_id });
        }

        Ok(Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            subtotal: unit_price.multiply(quantity),
        })
    }
}
