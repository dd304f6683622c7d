//! SQLite schema of the commerce mirror.
//!
//! One mirror per deployment: rows from every store share these tables.
//! The same definitions are rendered into the text-generation prompt, so the
//! model only ever sees columns that actually exist.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, SqlType, Table, VersionedSchema, View};

const SHOP_TABLE: Table = Table {
    name: "shop",
    columns: &[
        sqlite_column!("shop_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text),
        sqlite_column!("currency", &SqlType::Text),
        sqlite_column!("timezone", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

const PRODUCTS_TABLE: Table = Table {
    name: "products",
    columns: &[
        sqlite_column!("product_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("vendor", &SqlType::Text),
        sqlite_column!("product_type", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text),
    ],
    indices: &[("idx_products_title", "title")],
    unique_constraints: &[],
};

const VARIANTS_TABLE: Table = Table {
    name: "variants",
    columns: &[
        sqlite_column!("variant_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "product_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "products",
                foreign_column: "product_id",
            })
        ),
        sqlite_column!("sku", &SqlType::Text),
        sqlite_column!("price", &SqlType::Real),
        sqlite_column!("inventory_item_id", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_variants_product_id", "product_id"),
        ("idx_variants_inventory_item_id", "inventory_item_id"),
    ],
    unique_constraints: &[],
};

/// Stock per (inventory item, location); the pair is the upsert key.
const INVENTORY_TABLE: Table = Table {
    name: "inventory",
    columns: &[
        sqlite_column!("inventory_item_id", &SqlType::Text, non_null = true),
        sqlite_column!("location_id", &SqlType::Text, non_null = true),
        sqlite_column!("available", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[&["inventory_item_id", "location_id"]],
};

const ORDERS_TABLE: Table = Table {
    name: "orders",
    columns: &[
        sqlite_column!("order_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("created_at", &SqlType::Text),
        sqlite_column!("customer_id", &SqlType::Text),
    ],
    indices: &[("idx_orders_created_at", "created_at")],
    unique_constraints: &[],
};

const ORDER_ITEMS_TABLE: Table = Table {
    name: "order_items",
    columns: &[
        sqlite_column!("line_item_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "order_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "orders",
                foreign_column: "order_id",
            })
        ),
        sqlite_column!("product_id", &SqlType::Text),
        sqlite_column!("variant_id", &SqlType::Text),
        sqlite_column!("quantity", &SqlType::Integer, non_null = true),
        sqlite_column!("price", &SqlType::Real),
    ],
    indices: &[
        ("idx_order_items_order_id", "order_id"),
        ("idx_order_items_product_id", "product_id"),
    ],
    unique_constraints: &[],
};

pub const INVENTORY_TOTALS_VIEW: View = View {
    name: "inventory_totals",
    select_sql: "SELECT v.product_id, v.variant_id, SUM(i.available) AS total_available \
                 FROM inventory i \
                 JOIN variants v ON i.inventory_item_id = v.inventory_item_id \
                 GROUP BY v.product_id, v.variant_id",
    description: "    product_id TEXT,\n    variant_id TEXT,\n    total_available INTEGER",
};

pub const MIRROR_SCHEMA: VersionedSchema = VersionedSchema {
    version: 0,
    tables: &[
        SHOP_TABLE,
        PRODUCTS_TABLE,
        VARIANTS_TABLE,
        INVENTORY_TABLE,
        ORDERS_TABLE,
        ORDER_ITEMS_TABLE,
    ],
    views: &[INVENTORY_TOTALS_VIEW],
};

/// Tables and the totals view, rendered for the SQL generation prompt.
pub fn schema_description() -> String {
    MIRROR_SCHEMA.describe()
}
