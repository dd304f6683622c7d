//! GraphQL documents sent to the commerce Admin API.
//!
//! Each paginated document takes `$first` and `$after`; the orders document
//! additionally takes a `$query` search filter (e.g. `created_at:>=2024-01-01T00:00:00Z`).

/// Orders with customer and up to 50 line items each.
pub const ORDERS_QUERY: &str = r#"
query Orders($first: Int!, $after: String, $query: String) {
  orders(first: $first, after: $after, query: $query) {
    pageInfo {
      hasNextPage
      endCursor
    }
    edges {
      node {
        id
        createdAt
        customer {
          id
        }
        lineItems(first: 50) {
          edges {
            node {
              id
              quantity
              originalUnitPriceSet {
                shopMoney {
                  amount
                }
              }
              product {
                id
              }
              variant {
                id
              }
            }
          }
        }
      }
    }
  }
}
"#;

/// Products with their variants, inventory items and per-location levels.
pub const PRODUCTS_QUERY: &str = r#"
query Products($first: Int!, $after: String) {
  products(first: $first, after: $after) {
    pageInfo {
      hasNextPage
      endCursor
    }
    edges {
      node {
        id
        title
        vendor
        productType
        createdAt
        variants(first: 50) {
          edges {
            node {
              id
              sku
              price
              inventoryItem {
                id
                inventoryLevels(first: 10) {
                  edges {
                    node {
                      updatedAt
                      location {
                        id
                        name
                      }
                      quantities(names: ["available"]) {
                        name
                        quantity
                      }
                    }
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

/// The shop itself. Not paginated.
pub const SHOP_QUERY: &str = r#"
query Shop {
  shop {
    id
    name
    currencyCode
    timezone
    createdAt
  }
}
"#;

/// Response path to the paginated orders connection.
pub const ORDERS_PATH: &[&str] = &["orders"];

/// Response path to the paginated products connection.
pub const PRODUCTS_PATH: &[&str] = &["products"];

/// Build the server-side search filter restricting orders to those created at or after `since`.
pub fn orders_since_filter(since: &str) -> String {
    format!("created_at:>={}", since)
}
