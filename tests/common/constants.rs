//! Shared constants for end-to-end tests
//!
//! When the fixture shop changes, update only this file.

// ============================================================================
// Store
// ============================================================================

/// Store domain used in every request
pub const STORE_ID: &str = "demo.myshopify.com";

/// Access token forwarded to the stub commerce API
pub const STORE_TOKEN: &str = "shpat_test_token";

// ============================================================================
// Fixture Shop Data
// ============================================================================

pub const PRODUCT_TITLE: &str = "Cotton Shirt";

pub const VARIANT_SKU: &str = "SH-1";

/// Available units at the two fixture locations
pub const AVAILABLE_LOC1: i64 = 12;
pub const AVAILABLE_LOC2: i64 = 3;

/// Orders are served over two pages
pub const ORDER_IDS: [&str; 3] = ["500", "501", "502"];

// ============================================================================
// Generated SQL
// ============================================================================

pub const SHIRTS_SQL: &str = "SELECT p.title, v.sku, i.available FROM products p \
    JOIN variants v ON v.product_id = p.product_id \
    JOIN inventory i ON i.inventory_item_id = v.inventory_item_id \
    WHERE p.title LIKE '%shirt%' AND i.location_id = 'loc1'";

pub const NO_ROWS_SQL: &str = "SELECT * FROM orders WHERE created_at < '1990-01-01'";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Default HTTP request timeout (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
