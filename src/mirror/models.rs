//! Flat relational records produced by the normalizer and written to the mirror.
//!
//! Identifiers are already stripped to their local component.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShopRecord {
    pub shop_id: String,
    pub name: Option<String>,
    pub currency: Option<String>,
    pub timezone: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductRecord {
    pub product_id: String,
    pub title: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub created_at: Option<String>,
}

/// A variant always carries the inventory item it is stocked under.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantRecord {
    pub variant_id: String,
    pub product_id: String,
    pub sku: Option<String>,
    pub price: f64,
    pub inventory_item_id: String,
}

/// Stock of one inventory item at one location.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InventoryRecord {
    pub inventory_item_id: String,
    pub location_id: String,
    pub available: i64,
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub created_at: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderItemRecord {
    /// Upstream line-item id, or a digest of (order id, line position) when absent.
    pub line_item_id: String,
    pub order_id: String,
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub price: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedOrders {
    pub orders: Vec<OrderRecord>,
    pub order_items: Vec<OrderItemRecord>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedProducts {
    pub products: Vec<ProductRecord>,
    pub variants: Vec<VariantRecord>,
    pub inventory: Vec<InventoryRecord>,
}
