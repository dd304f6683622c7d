//! Cursor-paginated collection fetcher.
//!
//! Pages are fetched strictly in sequence: each request carries the
//! `endCursor` of the previous page as `after`.

use crate::commerce_api::CommerceApi;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// What to do when a page does not contain the paginated object at `path`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum PaginationPolicy {
    /// Log, record the truncation and return what was collected so far.
    #[default]
    FailOpen,
    /// Abort the collection with [`FetchError::MalformedPage`].
    Strict,
}

/// Why pagination stopped before the collection reported its last page.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Truncation {
    /// The response carried a top-level `errors` payload.
    UpstreamErrors(String),
    /// The transport failed (non-success status, timeout, unparseable body).
    Transport(String),
    /// A path segment was absent from the response `data`.
    MissingPath(String),
    /// `hasNextPage` was true but no new cursor was supplied.
    StalledCursor,
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Truncation::UpstreamErrors(e) => write!(f, "upstream errors: {}", e),
            Truncation::Transport(e) => write!(f, "transport failure: {}", e),
            Truncation::MissingPath(key) => write!(f, "missing response key '{}'", key),
            Truncation::StalledCursor => write!(f, "next page announced without a new cursor"),
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Raw nodes in page order.
    pub nodes: Vec<Value>,
    pub pages: usize,
    pub truncation: Option<Truncation>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.truncation.is_none()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Malformed page {page}: missing response key '{key}'")]
    MalformedPage { page: usize, key: String },
}

/// Where one page's paginated object could not be found.
enum PageLookup<'a> {
    Found(&'a Value),
    Missing(String),
}

fn descend<'a>(data: Option<&'a Value>, path: &[&str]) -> PageLookup<'a> {
    let mut current = data.filter(|v| !v.is_null());
    for key in path {
        current = current.and_then(|v| v.get(*key)).filter(|v| !v.is_null());
        if current.is_none() {
            return PageLookup::Missing((*key).to_string());
        }
    }
    match current {
        Some(connection) => PageLookup::Found(connection),
        None => PageLookup::Missing("data".to_string()),
    }
}

fn page_variables(base: &Value, after: Option<&str>) -> Value {
    let mut vars = match base {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if let Some(cursor) = after {
        vars.insert("after".to_string(), Value::String(cursor.to_string()));
    }
    Value::Object(vars)
}

fn describe_errors(errors: &Value) -> String {
    errors
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .filter(|joined| !joined.is_empty())
        .unwrap_or_else(|| errors.to_string())
}

/// Walk a paginated collection until `hasNextPage` is false.
///
/// `path` locates the connection object inside `data` (e.g. `["orders"]`).
/// A top-level `errors` payload or a transport failure stops pagination and
/// keeps the nodes collected so far. A page missing `path` is handled per
/// `policy`.
pub async fn fetch_all(
    api: &dyn CommerceApi,
    store_id: &str,
    token: &str,
    query: &str,
    base_variables: &Value,
    path: &[&str],
    policy: PaginationPolicy,
) -> Result<FetchOutcome, FetchError> {
    let mut outcome = FetchOutcome::default();
    let mut after: Option<String> = None;

    loop {
        let page = outcome.pages + 1;
        let variables = page_variables(base_variables, after.as_deref());

        let response = match api.execute(store_id, token, query, &variables).await {
            Ok(response) => response,
            Err(e) => {
                warn!(store_id, page, error = %e, "Commerce API request failed, keeping collected pages");
                outcome.truncation = Some(Truncation::Transport(e.to_string()));
                break;
            }
        };
        outcome.pages = page;

        if let Some(errors) = response.get("errors").filter(|e| !e.is_null()) {
            let detail = describe_errors(errors);
            warn!(store_id, page, errors = %detail, "Commerce API returned errors, stopping pagination");
            outcome.truncation = Some(Truncation::UpstreamErrors(detail));
            break;
        }

        let connection = match descend(response.get("data"), path) {
            PageLookup::Found(connection) => connection,
            PageLookup::Missing(key) => match policy {
                PaginationPolicy::Strict => {
                    return Err(FetchError::MalformedPage { page, key });
                }
                PaginationPolicy::FailOpen => {
                    warn!(store_id, page, key = %key, "Response is missing the paginated object, page dropped");
                    outcome.truncation = Some(Truncation::MissingPath(key));
                    break;
                }
            },
        };

        let before = outcome.nodes.len();
        if let Some(edges) = connection.get("edges").and_then(Value::as_array) {
            outcome.nodes.extend(
                edges
                    .iter()
                    .filter_map(|edge| edge.get("node"))
                    .filter(|node| !node.is_null())
                    .cloned(),
            );
        }
        debug!(store_id, page, nodes = outcome.nodes.len() - before, "Fetched page");

        let page_info = connection.get("pageInfo");
        let has_next = page_info
            .and_then(|info| info.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !has_next {
            break;
        }

        let next_cursor = page_info
            .and_then(|info| info.get("endCursor"))
            .and_then(Value::as_str)
            .map(str::to_string);
        match next_cursor {
            Some(cursor) if after.as_deref() != Some(cursor.as_str()) => after = Some(cursor),
            _ => {
                warn!(store_id, page, "Next page announced without a new cursor, stopping");
                outcome.truncation = Some(Truncation::StalledCursor);
                break;
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commerce_api::CommerceApiError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted responses and records the variables of every call.
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<Value, CommerceApiError>>>,
        calls: Mutex<Vec<Value>>,
    }

    impl ScriptedApi {
        fn new(responses: Vec<Result<Value, CommerceApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Value> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommerceApi for ScriptedApi {
        async fn execute(
            &self,
            _store_id: &str,
            _token: &str,
            _query: &str,
            variables: &Value,
        ) -> Result<Value, CommerceApiError> {
            self.calls.lock().unwrap().push(variables.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra request")
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> Value {
        let edges: Vec<Value> = ids.iter().map(|id| json!({"node": {"id": id}})).collect();
        json!({
            "data": {
                "orders": {
                    "edges": edges,
                    "pageInfo": {
                        "hasNextPage": next.is_some(),
                        "endCursor": next,
                    }
                }
            }
        })
    }

    fn ids(outcome: &FetchOutcome) -> Vec<&str> {
        outcome
            .nodes
            .iter()
            .map(|n| n["id"].as_str().unwrap())
            .collect()
    }

    async fn fetch(api: &ScriptedApi, policy: PaginationPolicy) -> Result<FetchOutcome, FetchError> {
        fetch_all(
            api,
            "demo.myshopify.com",
            "token",
            "query",
            &json!({"first": 2}),
            &["orders"],
            policy,
        )
        .await
    }

    #[tokio::test]
    async fn walks_all_pages_in_order() {
        let api = ScriptedApi::new(vec![
            Ok(page(&["1", "2"], Some("c1"))),
            Ok(page(&["3", "4"], Some("c2"))),
            Ok(page(&["5"], None)),
        ]);

        let outcome = fetch(&api, PaginationPolicy::FailOpen).await.unwrap();

        assert_eq!(ids(&outcome), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(outcome.pages, 3);
        assert!(outcome.is_complete());

        let calls = api.calls();
        assert_eq!(calls[0], json!({"first": 2}));
        assert_eq!(calls[1], json!({"first": 2, "after": "c1"}));
        assert_eq!(calls[2], json!({"first": 2, "after": "c2"}));
    }

    #[tokio::test]
    async fn errors_payload_keeps_collected_nodes() {
        let api = ScriptedApi::new(vec![
            Ok(page(&["1", "2"], Some("c1"))),
            Ok(json!({"errors": [{"message": "Throttled"}]})),
        ]);

        let outcome = fetch(&api, PaginationPolicy::Strict).await.unwrap();

        assert_eq!(ids(&outcome), vec!["1", "2"]);
        assert_eq!(
            outcome.truncation,
            Some(Truncation::UpstreamErrors("Throttled".to_string()))
        );
    }

    #[tokio::test]
    async fn transport_failure_keeps_collected_nodes() {
        let api = ScriptedApi::new(vec![
            Ok(page(&["1"], Some("c1"))),
            Err(CommerceApiError::Status {
                status: 401,
                body: "Invalid API key".to_string(),
            }),
        ]);

        let outcome = fetch(&api, PaginationPolicy::FailOpen).await.unwrap();

        assert_eq!(ids(&outcome), vec!["1"]);
        assert_eq!(outcome.pages, 1);
        assert!(matches!(outcome.truncation, Some(Truncation::Transport(_))));
    }

    #[tokio::test]
    async fn missing_path_fail_open_records_truncation() {
        let api = ScriptedApi::new(vec![
            Ok(page(&["1"], Some("c1"))),
            Ok(json!({"data": {"somethingElse": {}}})),
        ]);

        let outcome = fetch(&api, PaginationPolicy::FailOpen).await.unwrap();

        assert_eq!(ids(&outcome), vec!["1"]);
        assert_eq!(
            outcome.truncation,
            Some(Truncation::MissingPath("orders".to_string()))
        );
    }

    #[tokio::test]
    async fn missing_path_strict_is_an_error() {
        let api = ScriptedApi::new(vec![
            Ok(page(&["1"], Some("c1"))),
            Ok(json!({"data": null})),
        ]);

        let err = fetch(&api, PaginationPolicy::Strict).await.unwrap_err();

        assert!(matches!(err, FetchError::MalformedPage { page: 2, ref key } if key == "orders"));
    }

    #[tokio::test]
    async fn repeated_cursor_stops_pagination() {
        let api = ScriptedApi::new(vec![
            Ok(page(&["1"], Some("c1"))),
            Ok(page(&["2"], Some("c1"))),
        ]);

        let outcome = fetch(&api, PaginationPolicy::FailOpen).await.unwrap();

        assert_eq!(ids(&outcome), vec!["1", "2"]);
        assert_eq!(outcome.truncation, Some(Truncation::StalledCursor));
    }
}
