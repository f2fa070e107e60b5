//! `httpRequest` node: one outbound request per invocation.

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::{json, Map, Value};

use super::{param_object, param_string, plain_text};
use crate::{Item, Items, NodeContext, NodeError, NodeHandler, NodeOutput, Params};

/// Issues the request described by its params and returns one item
/// `{status, data, headers}`, however many items arrived.
///
/// Params: `method` (default GET), `url` (required), `headers`, `query`,
/// `body`, and `authType` = `basic` (`authUsername`, `authPassword`) or
/// `bearer` (`authToken`).
#[derive(Debug, Clone)]
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

fn build_headers(params: &Params) -> Result<HeaderMap, NodeError> {
    let mut headers = HeaderMap::new();
    for (key, value) in param_object(params, "headers") {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| NodeError::InvalidParams(format!("invalid header name '{key}'")))?;
        let value = HeaderValue::from_str(&plain_text(&value))
            .map_err(|_| NodeError::InvalidParams(format!("invalid value for header '{key}'")))?;
        headers.insert(name, value);
    }

    let credentials = match params.get("authType").and_then(Value::as_str) {
        Some("basic") => {
            let username = param_string(params, "authUsername").unwrap_or_default();
            let password = param_string(params, "authPassword").unwrap_or_default();
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{username}:{password}"));
            Some(format!("Basic {token}"))
        }
        Some("bearer") => {
            let token = param_string(params, "authToken").unwrap_or_default();
            Some(format!("Bearer {token}"))
        }
        _ => None,
    };
    if let Some(credentials) = credentials {
        let value = HeaderValue::from_str(&credentials)
            .map_err(|_| NodeError::InvalidParams("invalid authorization credentials".into()))?;
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

#[async_trait]
impl NodeHandler for HttpRequestNode {
    async fn execute(
        &self,
        params: &Params,
        _items: Items,
        ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let url = param_string(params, "url")
            .filter(|url| !url.is_empty())
            .ok_or_else(|| NodeError::InvalidParams("HTTP request node requires url".into()))?;

        let method_name = param_string(params, "method")
            .unwrap_or_else(|| "GET".into())
            .to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| NodeError::InvalidParams(format!("invalid HTTP method '{method_name}'")))?;

        let headers = build_headers(params)?;
        let query: Vec<(String, String)> = param_object(params, "query")
            .into_iter()
            .map(|(key, value)| (key, plain_text(&value)))
            .collect();

        let mut request = self.client.request(method.clone(), &url).headers(headers);
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(body) = params.get("body").filter(|body| !body.is_null()) {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let response_headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
                )
            })
            .collect();
        let bytes = response.bytes().await?;

        let data = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        ctx.log(
            "http request completed",
            json!({ "method": method.as_str(), "url": url, "status": status }),
        );

        let mut item = Item::new();
        item.insert("status".into(), json!(status));
        item.insert("data".into(), data);
        item.insert("headers".into(), Value::Object(response_headers));
        Ok(NodeOutput::from_default(vec![item]))
    }
}
