//! SQLite-backed mirror of the commerce data.
//!
//! Writes go through a single connection and run one transaction per batch,
//! so a failing batch leaves every other batch untouched. Reads are served
//! from a small round-robin pool of read-only connections.

use super::models::{
    InventoryRecord, OrderItemRecord, OrderRecord, ProductRecord, ShopRecord, VariantRecord,
};
use super::schema::MIRROR_SCHEMA;
use anyhow::{Context, Result};
use base64::Engine;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, Statement};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// One result row: column name to JSON value, in select-list order.
pub type Row = Map<String, Value>;

/// Durable keyed storage for mirrored commerce records.
///
/// Every `upsert_*` call is insert-or-overwrite on the entity key and returns
/// the number of records written.
pub trait MirrorStore: Send + Sync {
    fn upsert_shop(&self, shop: &ShopRecord) -> Result<()>;
    fn upsert_orders(&self, orders: &[OrderRecord]) -> Result<usize>;
    fn upsert_order_items(&self, items: &[OrderItemRecord]) -> Result<usize>;
    fn upsert_products(&self, products: &[ProductRecord]) -> Result<usize>;
    fn upsert_variants(&self, variants: &[VariantRecord]) -> Result<usize>;
    fn upsert_inventory(&self, inventory: &[InventoryRecord]) -> Result<usize>;

    /// Run an already-validated read-only query.
    fn query_rows(&self, sql: &str) -> Result<Vec<Row>>;

    /// Row count of every mirror table.
    fn table_counts(&self) -> Result<BTreeMap<String, i64>>;
}

#[derive(Clone)]
pub struct SqliteMirrorStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn create_or_validate(conn: &Connection) -> Result<()> {
    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;

    if table_count == 0 {
        info!("Creating mirror db schema at version {}", MIRROR_SCHEMA.version);
        MIRROR_SCHEMA.create(conn)?;
    } else {
        MIRROR_SCHEMA
            .validate(conn)
            .context("Existing mirror database does not match the expected schema")?;
    }
    Ok(())
}

fn upsert_sql(table: &str, columns: &[&str], conflict: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !conflict.contains(c))
        .map(|c| format!("{} = excluded.{}", c, c))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        conflict.join(", "),
        updates.join(", ")
    )
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}

impl SqliteMirrorStore {
    /// Open (or create) the mirror database at `db_path`.
    ///
    /// A fresh file gets the schema created; an existing one must match it.
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();

        let write_conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open mirror database {:?}", db_path))?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        write_conn.pragma_update(None, "foreign_keys", "ON")?;
        write_conn.busy_timeout(BUSY_TIMEOUT)?;
        create_or_validate(&write_conn)?;

        let mut read_pool = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let read_conn = Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_conn.busy_timeout(BUSY_TIMEOUT)?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        let store = SqliteMirrorStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        };

        let counts = store.table_counts()?;
        info!(
            "Opened mirror: {} products, {} variants, {} orders, {} order items",
            counts.get("products").copied().unwrap_or(0),
            counts.get("variants").copied().unwrap_or(0),
            counts.get("orders").copied().unwrap_or(0),
            counts.get("order_items").copied().unwrap_or(0),
        );

        Ok(store)
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    /// Upsert `records` into `table` in a single transaction.
    fn upsert_batch<T>(
        &self,
        table: &str,
        columns: &[&str],
        conflict: &[&str],
        records: &[T],
        bind: impl Fn(&mut Statement<'_>, &T) -> rusqlite::Result<usize>,
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&upsert_sql(table, columns, conflict))?;
            for record in records {
                bind(&mut stmt, record)
                    .with_context(|| format!("Failed to upsert into {}", table))?;
            }
        }
        tx.commit()?;

        debug!(table, rows = records.len(), "Upserted batch");
        Ok(records.len())
    }
}

impl MirrorStore for SqliteMirrorStore {
    fn upsert_shop(&self, shop: &ShopRecord) -> Result<()> {
        self.upsert_batch(
            "shop",
            &["shop_id", "name", "currency", "timezone", "created_at"],
            &["shop_id"],
            std::slice::from_ref(shop),
            |stmt, s| {
                stmt.execute(params![s.shop_id, s.name, s.currency, s.timezone, s.created_at])
            },
        )?;
        Ok(())
    }

    fn upsert_orders(&self, orders: &[OrderRecord]) -> Result<usize> {
        self.upsert_batch(
            "orders",
            &["order_id", "created_at", "customer_id"],
            &["order_id"],
            orders,
            |stmt, o| stmt.execute(params![o.order_id, o.created_at, o.customer_id]),
        )
    }

    fn upsert_order_items(&self, items: &[OrderItemRecord]) -> Result<usize> {
        self.upsert_batch(
            "order_items",
            &[
                "line_item_id",
                "order_id",
                "product_id",
                "variant_id",
                "quantity",
                "price",
            ],
            &["line_item_id"],
            items,
            |stmt, i| {
                stmt.execute(params![
                    i.line_item_id,
                    i.order_id,
                    i.product_id,
                    i.variant_id,
                    i.quantity,
                    i.price
                ])
            },
        )
    }

    fn upsert_products(&self, products: &[ProductRecord]) -> Result<usize> {
        self.upsert_batch(
            "products",
            &["product_id", "title", "vendor", "product_type", "created_at"],
            &["product_id"],
            products,
            |stmt, p| {
                stmt.execute(params![
                    p.product_id,
                    p.title,
                    p.vendor,
                    p.product_type,
                    p.created_at
                ])
            },
        )
    }

    fn upsert_variants(&self, variants: &[VariantRecord]) -> Result<usize> {
        self.upsert_batch(
            "variants",
            &["variant_id", "product_id", "sku", "price", "inventory_item_id"],
            &["variant_id"],
            variants,
            |stmt, v| {
                stmt.execute(params![
                    v.variant_id,
                    v.product_id,
                    v.sku,
                    v.price,
                    v.inventory_item_id
                ])
            },
        )
    }

    fn upsert_inventory(&self, inventory: &[InventoryRecord]) -> Result<usize> {
        self.upsert_batch(
            "inventory",
            &["inventory_item_id", "location_id", "available", "updated_at"],
            &["inventory_item_id", "location_id"],
            inventory,
            |stmt, i| {
                stmt.execute(params![
                    i.inventory_item_id,
                    i.location_id,
                    i.available,
                    i.updated_at
                ])
            },
        )
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<Row>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let mut stmt = conn.prepare(sql).context("Failed to prepare query")?;
        let column_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut mapped = Row::new();
            for (i, name) in column_names.iter().enumerate() {
                mapped.insert(name.clone(), json_value(row.get_ref(i)?));
            }
            result.push(mapped);
        }
        Ok(result)
    }

    fn table_counts(&self) -> Result<BTreeMap<String, i64>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let mut counts = BTreeMap::new();
        for table in MIRROR_SCHEMA.tables {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name), [], |r| {
                    r.get(0)
                })?;
            counts.insert(table.name.to_string(), count);
        }
        Ok(counts)
    }
}
