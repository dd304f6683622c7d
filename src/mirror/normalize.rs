//! Raw API nodes → flat mirror records.
//!
//! All three normalizers are pure. Missing references become `None` rather
//! than errors; nodes that cannot be keyed at all are skipped with a warning.

use super::models::{
    InventoryRecord, NormalizedOrders, NormalizedProducts, OrderItemRecord, OrderRecord,
    ProductRecord, ShopRecord, VariantRecord,
};
use crate::commerce_api::models::{
    NodeRef, NumberOrString, RawInventoryLevel, RawLineItem, RawOrder, RawProduct, RawShop,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Name of the inventory quantity that counts as sellable stock.
const AVAILABLE_QUANTITY_NAME: &str = "available";

/// Reduce an opaque global id (`gid://shopify/Product/123`) to its last `/` segment.
///
/// Absent or empty ids, and ids ending in `/`, yield `None`.
pub fn strip_gid(gid: Option<&str>) -> Option<String> {
    let gid = gid?;
    match gid.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => Some(segment.to_string()),
        _ => None,
    }
}

fn ref_id(node: &Option<NodeRef>) -> Option<String> {
    strip_gid(node.as_ref().and_then(|n| n.id.as_deref()))
}

fn number(value: &Option<NumberOrString>) -> Option<f64> {
    value.as_ref().and_then(NumberOrString::as_f64)
}

fn parse_nodes<'a, T: DeserializeOwned>(
    nodes: &'a [Value],
    kind: &'static str,
) -> impl Iterator<Item = T> + 'a {
    nodes
        .iter()
        .filter_map(move |node| match serde_json::from_value::<T>(node.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(kind, error = %e, "Skipping malformed node");
                None
            }
        })
}

/// Normalize the shop object. `None` when the object is absent or carries no id.
pub fn normalize_shop(raw: Option<&Value>) -> Option<ShopRecord> {
    let raw = raw.filter(|v| !v.is_null())?;
    let shop: RawShop = match serde_json::from_value(raw.clone()) {
        Ok(shop) => shop,
        Err(e) => {
            warn!(error = %e, "Skipping malformed shop object");
            return None;
        }
    };
    let Some(shop_id) = strip_gid(shop.id.as_deref()) else {
        warn!("Shop object has no id, skipping");
        return None;
    };
    Some(ShopRecord {
        shop_id,
        name: shop.name,
        currency: shop.currency_code,
        timezone: shop.timezone,
        created_at: shop.created_at,
    })
}

/// Surrogate key for a line item the upstream did not identify.
fn synthetic_line_item_id(order_id: &str, position: usize) -> String {
    let digest = Sha256::digest(format!("{}:{}", order_id, position).as_bytes());
    format!("{:x}", digest)
}

fn normalize_line_item(order_id: &str, position: usize, item: &RawLineItem) -> OrderItemRecord {
    let price = item
        .original_unit_price_set
        .as_ref()
        .and_then(|set| set.shop_money.as_ref())
        .and_then(|money| number(&money.amount))
        .unwrap_or(0.0);

    OrderItemRecord {
        line_item_id: strip_gid(item.id.as_deref())
            .unwrap_or_else(|| synthetic_line_item_id(order_id, position)),
        order_id: order_id.to_string(),
        product_id: ref_id(&item.product),
        variant_id: ref_id(&item.variant),
        quantity: number(&item.quantity).map(|q| q as i64).unwrap_or(0),
        price,
    }
}

/// One order record per node plus one item record per nested line item.
pub fn normalize_orders(nodes: &[Value]) -> NormalizedOrders {
    let mut normalized = NormalizedOrders::default();

    for order in parse_nodes::<RawOrder>(nodes, "order") {
        let Some(order_id) = strip_gid(order.id.as_deref()) else {
            warn!("Order node has no id, skipping");
            continue;
        };

        if let Some(line_items) = &order.line_items {
            normalized.order_items.extend(
                line_items
                    .nodes()
                    .enumerate()
                    .map(|(position, item)| normalize_line_item(&order_id, position, item)),
            );
        }

        normalized.orders.push(OrderRecord {
            order_id,
            created_at: order.created_at,
            customer_id: ref_id(&order.customer),
        });
    }

    normalized
}

fn available_quantity(level: &RawInventoryLevel) -> i64 {
    level
        .quantities
        .iter()
        .flatten()
        .filter(|q| q.name.as_deref() == Some(AVAILABLE_QUANTITY_NAME))
        .filter_map(|q| number(&q.quantity))
        .last()
        .map(|q| q as i64)
        .unwrap_or(0)
}

/// Products, their stocked variants, and per-location inventory.
///
/// Variants without an inventory item are dropped entirely, as are inventory
/// levels without a location.
pub fn normalize_products(nodes: &[Value]) -> NormalizedProducts {
    let mut normalized = NormalizedProducts::default();

    for product in parse_nodes::<RawProduct>(nodes, "product") {
        let Some(product_id) = strip_gid(product.id.as_deref()) else {
            warn!("Product node has no id, skipping");
            continue;
        };

        for variant in product.variants.iter().flat_map(|c| c.nodes()) {
            let Some(inventory_item) = &variant.inventory_item else {
                continue;
            };
            let Some(inventory_item_id) = strip_gid(inventory_item.id.as_deref()) else {
                continue;
            };
            let Some(variant_id) = strip_gid(variant.id.as_deref()) else {
                warn!(%product_id, "Variant node has no id, skipping");
                continue;
            };

            normalized.variants.push(VariantRecord {
                variant_id,
                product_id: product_id.clone(),
                sku: variant.sku.clone(),
                price: number(&variant.price).unwrap_or(0.0),
                inventory_item_id: inventory_item_id.clone(),
            });

            for level in inventory_item.inventory_levels.iter().flat_map(|c| c.nodes()) {
                let location_id =
                    strip_gid(level.location.as_ref().and_then(|l| l.id.as_deref()));
                let Some(location_id) = location_id else {
                    warn!(%inventory_item_id, "Inventory level has no location, skipping");
                    continue;
                };
                normalized.inventory.push(InventoryRecord {
                    inventory_item_id: inventory_item_id.clone(),
                    location_id,
                    available: available_quantity(level),
                    updated_at: level.updated_at.clone(),
                });
            }
        }

        normalized.products.push(ProductRecord {
            product_id,
            title: product.title,
            vendor: product.vendor,
            product_type: product.product_type,
            created_at: product.created_at,
        });
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strip_gid_keeps_last_segment() {
        assert_eq!(
            strip_gid(Some("gid://shopify/Product/123")),
            Some("123".to_string())
        );
        assert_eq!(strip_gid(Some("plain")), Some("plain".to_string()));
        assert_eq!(strip_gid(None), None);
        assert_eq!(strip_gid(Some("")), None);
        assert_eq!(strip_gid(Some("gid://shopify/Product/")), None);
    }

    #[test]
    fn shop_is_none_when_absent() {
        assert_eq!(normalize_shop(None), None);
        assert_eq!(normalize_shop(Some(&Value::Null)), None);
        assert_eq!(normalize_shop(Some(&json!({"name": "No id"}))), None);
    }

    #[test]
    fn shop_maps_fields() {
        let shop = normalize_shop(Some(&json!({
            "id": "gid://shopify/Shop/77",
            "name": "Demo",
            "currencyCode": "EUR",
            "timezone": "(GMT+01:00) Europe/Rome",
            "createdAt": "2023-01-01T00:00:00Z"
        })))
        .unwrap();
        assert_eq!(shop.shop_id, "77");
        assert_eq!(shop.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn orders_emit_items_with_null_references() {
        let nodes = vec![json!({
            "id": "gid://shopify/Order/500",
            "createdAt": "2024-03-01T10:00:00Z",
            "customer": { "id": "gid://shopify/Customer/9" },
            "lineItems": { "edges": [
                { "node": {
                    "id": "gid://shopify/LineItem/1",
                    "quantity": 3,
                    "originalUnitPriceSet": { "shopMoney": { "amount": "19.99" } },
                    "product": { "id": "gid://shopify/Product/10" },
                    "variant": { "id": "gid://shopify/ProductVariant/11" }
                }},
                { "node": {
                    "originalUnitPriceSet": { "shopMoney": { "amount": "5.00" } },
                    "product": null,
                    "variant": null
                }}
            ]}
        })];

        let normalized = normalize_orders(&nodes);
        assert_eq!(
            normalized.orders,
            vec![OrderRecord {
                order_id: "500".to_string(),
                created_at: Some("2024-03-01T10:00:00Z".to_string()),
                customer_id: Some("9".to_string()),
            }]
        );
        assert_eq!(normalized.order_items.len(), 2);

        let first = &normalized.order_items[0];
        assert_eq!(first.line_item_id, "1");
        assert_eq!(first.quantity, 3);
        assert_eq!(first.price, 19.99);
        assert_eq!(first.product_id.as_deref(), Some("10"));

        let second = &normalized.order_items[1];
        assert_eq!(second.quantity, 0);
        assert_eq!(second.product_id, None);
        assert_eq!(second.variant_id, None);
        assert_eq!(second.line_item_id, synthetic_line_item_id("500", 1));
    }

    #[test]
    fn order_without_customer_has_null_customer_id() {
        let nodes = vec![json!({"id": "gid://shopify/Order/1", "customer": null})];
        let normalized = normalize_orders(&nodes);
        assert_eq!(normalized.orders[0].customer_id, None);
        assert!(normalized.order_items.is_empty());
    }

    #[test]
    fn synthetic_line_item_ids_are_stable() {
        assert_eq!(
            synthetic_line_item_id("500", 1),
            synthetic_line_item_id("500", 1)
        );
        assert_ne!(
            synthetic_line_item_id("500", 1),
            synthetic_line_item_id("500", 2)
        );
    }

    #[test]
    fn products_skip_variants_without_inventory_item() {
        let nodes = vec![json!({
            "id": "gid://shopify/Product/1",
            "title": "Cotton Shirt",
            "vendor": "Acme",
            "productType": "Apparel",
            "createdAt": "2024-01-01T00:00:00Z",
            "variants": { "edges": [
                { "node": {
                    "id": "gid://shopify/ProductVariant/2",
                    "sku": "SH-1",
                    "price": "25.00",
                    "inventoryItem": {
                        "id": "gid://shopify/InventoryItem/100",
                        "inventoryLevels": { "edges": [
                            { "node": {
                                "updatedAt": "2024-02-01T00:00:00Z",
                                "location": { "id": "gid://shopify/Location/loc1", "name": "Main" },
                                "quantities": [
                                    { "name": "on_hand", "quantity": 20 },
                                    { "name": "available", "quantity": 12 }
                                ]
                            }},
                            { "node": {
                                "location": null,
                                "quantities": [{ "name": "available", "quantity": 4 }]
                            }}
                        ]}
                    }
                }},
                { "node": {
                    "id": "gid://shopify/ProductVariant/3",
                    "sku": null,
                    "price": "30.00",
                    "inventoryItem": null
                }}
            ]}
        })];

        let normalized = normalize_products(&nodes);
        assert_eq!(normalized.products.len(), 1);
        assert_eq!(normalized.products[0].title.as_deref(), Some("Cotton Shirt"));

        assert_eq!(
            normalized.variants,
            vec![VariantRecord {
                variant_id: "2".to_string(),
                product_id: "1".to_string(),
                sku: Some("SH-1".to_string()),
                price: 25.0,
                inventory_item_id: "100".to_string(),
            }]
        );

        assert_eq!(
            normalized.inventory,
            vec![InventoryRecord {
                inventory_item_id: "100".to_string(),
                location_id: "loc1".to_string(),
                available: 12,
                updated_at: Some("2024-02-01T00:00:00Z".to_string()),
            }]
        );
    }

    #[test]
    fn available_defaults_to_zero() {
        let level: RawInventoryLevel = serde_json::from_value(json!({
            "quantities": [{ "name": "committed", "quantity": 3 }]
        }))
        .unwrap();
        assert_eq!(available_quantity(&level), 0);

        let level: RawInventoryLevel = serde_json::from_value(json!({})).unwrap();
        assert_eq!(available_quantity(&level), 0);
    }

    #[test]
    fn malformed_nodes_are_skipped() {
        let nodes = vec![
            json!({"id": 42}),
            json!({"id": "gid://shopify/Product/7", "title": "Hat"}),
        ];
        let normalized = normalize_products(&nodes);
        assert_eq!(normalized.products.len(), 1);
        assert_eq!(normalized.products[0].product_id, "7");
    }
}
