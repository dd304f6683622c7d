//! Raw node shapes returned by the commerce Admin API.
//!
//! Every field is optional: upstream nodes are routinely partial (deleted
//! products on old orders, variants without inventory tracking, ...) and the
//! normalizer decides what a missing field means.

use serde::Deserialize;

/// A GraphQL connection, reduced to its edges.
#[derive(Clone, Debug, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

impl<T> Connection<T> {
    /// Iterate over the non-null nodes, in edge order.
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().filter_map(|e| e.node.as_ref())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Edge<T> {
    pub node: Option<T>,
}

/// Any object referenced only through its id.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NodeRef {
    pub id: Option<String>,
}

/// Money and counts arrive as JSON strings (`"12.50"`) or numbers depending on the field.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawShop {
    pub id: Option<String>,
    pub name: Option<String>,
    pub currency_code: Option<String>,
    pub timezone: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrder {
    pub id: Option<String>,
    pub created_at: Option<String>,
    pub customer: Option<NodeRef>,
    pub line_items: Option<Connection<RawLineItem>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLineItem {
    pub id: Option<String>,
    pub quantity: Option<NumberOrString>,
    pub original_unit_price_set: Option<RawMoneyBag>,
    pub product: Option<NodeRef>,
    pub variant: Option<NodeRef>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMoneyBag {
    pub shop_money: Option<RawMoney>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawMoney {
    pub amount: Option<NumberOrString>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    pub id: Option<String>,
    pub title: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub created_at: Option<String>,
    pub variants: Option<Connection<RawVariant>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVariant {
    pub id: Option<String>,
    pub sku: Option<String>,
    pub price: Option<NumberOrString>,
    pub inventory_item: Option<RawInventoryItem>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInventoryItem {
    pub id: Option<String>,
    pub inventory_levels: Option<Connection<RawInventoryLevel>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInventoryLevel {
    pub updated_at: Option<String>,
    pub location: Option<RawLocation>,
    pub quantities: Option<Vec<RawQuantity>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawLocation {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawQuantity {
    pub name: Option<String>,
    pub quantity: Option<NumberOrString>,
}
