//! Hand-written fakes for the two network collaborators.

use super::constants::*;
use async_trait::async_trait;
use commerce_analytics_server::commerce_api::{CommerceApi, CommerceApiError};
use commerce_analytics_server::llm::{
    CompletionOptions, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Serves a small fixture shop; records every call it receives.
pub struct StubCommerceApi {
    calls: Mutex<Vec<(String, Value)>>,
    /// When set, product pages come back with a top-level `errors` payload.
    pub products_error: Option<String>,
    /// When set, every call fails at the transport level.
    pub unreachable: bool,
}

impl StubCommerceApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(vec![]),
            products_error: None,
            unreachable: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::new()
        }
    }

    pub fn with_products_error(message: &str) -> Self {
        Self {
            products_error: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Variables of every call whose query contains `marker`.
    pub fn calls_for(&self, marker: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(query, _)| query.contains(marker))
            .map(|(_, variables)| variables.clone())
            .collect()
    }

    /// Number of shop queries, one per full sync.
    pub fn sync_count(&self) -> usize {
        self.calls_for("shop {").len()
    }

    fn orders_page(after: Option<&str>) -> Value {
        let order = |id: &str, line: &str| {
            json!({"node": {
                "id": format!("gid://shopify/Order/{}", id),
                "createdAt": "2024-03-01T10:00:00Z",
                "customer": {"id": "gid://shopify/Customer/42"},
                "lineItems": {"edges": [{"node": {
                    "id": format!("gid://shopify/LineItem/{}", line),
                    "quantity": 2,
                    "originalUnitPriceSet": {"shopMoney": {"amount": "25.00"}},
                    "product": {"id": "gid://shopify/Product/1"},
                    "variant": {"id": "gid://shopify/ProductVariant/2"}
                }}]}
            }})
        };
        match after {
            None => json!({"data": {"orders": {
                "edges": [order(ORDER_IDS[0], "9000"), order(ORDER_IDS[1], "9001")],
                "pageInfo": {"hasNextPage": true, "endCursor": "orders-c1"}
            }}}),
            Some(_) => json!({"data": {"orders": {
                "edges": [order(ORDER_IDS[2], "9002")],
                "pageInfo": {"hasNextPage": false, "endCursor": "orders-c2"}
            }}}),
        }
    }

    fn products_page() -> Value {
        json!({"data": {"products": {
            "edges": [{"node": {
                "id": "gid://shopify/Product/1",
                "title": PRODUCT_TITLE,
                "vendor": "Acme",
                "productType": "Apparel",
                "createdAt": "2023-11-01T08:00:00Z",
                "variants": {"edges": [{"node": {
                    "id": "gid://shopify/ProductVariant/2",
                    "sku": VARIANT_SKU,
                    "price": "25.00",
                    "inventoryItem": {
                        "id": "gid://shopify/InventoryItem/100",
                        "inventoryLevels": {"edges": [
                            {"node": {
                                "updatedAt": "2024-03-02T09:00:00Z",
                                "location": {"id": "gid://shopify/Location/loc1", "name": "Main"},
                                "quantities": [{"name": "available", "quantity": AVAILABLE_LOC1}]
                            }},
                            {"node": {
                                "updatedAt": "2024-03-02T09:00:00Z",
                                "location": {"id": "gid://shopify/Location/loc2", "name": "Annex"},
                                "quantities": [{"name": "available", "quantity": AVAILABLE_LOC2}]
                            }}
                        ]}
                    }
                }}]}
            }}],
            "pageInfo": {"hasNextPage": false, "endCursor": "products-c1"}
        }}})
    }
}

#[async_trait]
impl CommerceApi for StubCommerceApi {
    async fn execute(
        &self,
        _store_id: &str,
        _token: &str,
        query: &str,
        variables: &Value,
    ) -> Result<Value, CommerceApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), variables.clone()));

        if self.unreachable {
            return Err(CommerceApiError::Connection("connection refused".to_string()));
        }

        if query.contains("orders(") {
            Ok(Self::orders_page(variables.get("after").and_then(Value::as_str)))
        } else if query.contains("products(") {
            match &self.products_error {
                Some(message) => Ok(json!({"errors": [{"message": message}]})),
                None => Ok(Self::products_page()),
            }
        } else {
            Ok(json!({"data": {"shop": {
                "id": "gid://shopify/Shop/77",
                "name": "Demo Store",
                "currencyCode": "EUR",
                "timezone": "(GMT+01:00) Europe/Rome",
                "createdAt": "2023-01-01T00:00:00Z"
            }}}))
        }
    }
}

/// Replies with queued texts in order; fails the test on an unexpected call.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        if let Some(message) = messages.last() {
            self.prompts.lock().unwrap().push(message.content.clone());
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected generation call")?;
        Ok(CompletionResponse {
            message: Message::assistant(reply),
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}
