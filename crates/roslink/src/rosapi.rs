//! Typed wrappers for the bridge-side `rosapi` introspection node.
//!
//! Everything here is plain `call_service` traffic; the facade only fixes
//! the service names, argument keys, and response shapes. A `result: false`
//! reply surfaces as [`ClientError::ServiceFailure`] with the bridge's
//! values attached.

use roslink_core::{ClientError, Result};
use serde_json::{Value, json};

use crate::client::Client;

/// What a node is connected to, from `/rosapi/node_details`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeDetails {
    /// Topics the node subscribes to.
    pub subscribing: Vec<String>,
    /// Topics the node publishes.
    pub publishing: Vec<String>,
    /// Services the node provides.
    pub services: Vec<String>,
}

/// Introspection facade over the `rosapi` services.
#[derive(Clone)]
pub struct RosApi {
    client: Client,
}

impl RosApi {
    /// Wrap `client`. Cheap; nothing crosses the wire until a call.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// All known topic names.
    pub async fn topics(&self) -> Result<Vec<String>> {
        let values = self.call("/rosapi/topics", json!({})).await?;
        Ok(string_list(&values["topics"]))
    }

    /// Message type of `topic`.
    pub async fn topic_type(&self, topic: &str) -> Result<String> {
        let values = self
            .call("/rosapi/topic_type", json!({ "topic": topic }))
            .await?;
        Ok(string_field(&values["type"]))
    }

    /// Topics carrying messages of `msg_type`.
    pub async fn topics_for_type(&self, msg_type: &str) -> Result<Vec<String>> {
        let values = self
            .call("/rosapi/topics_for_type", json!({ "type": msg_type }))
            .await?;
        Ok(string_list(&values["topics"]))
    }

    /// All known service names.
    pub async fn services(&self) -> Result<Vec<String>> {
        let values = self.call("/rosapi/services", json!({})).await?;
        Ok(string_list(&values["services"]))
    }

    /// Request/response type of `service`.
    pub async fn service_type(&self, service: &str) -> Result<String> {
        let values = self
            .call("/rosapi/service_type", json!({ "service": service }))
            .await?;
        Ok(string_field(&values["type"]))
    }

    /// All known node names.
    pub async fn nodes(&self) -> Result<Vec<String>> {
        let values = self.call("/rosapi/nodes", json!({})).await?;
        Ok(string_list(&values["nodes"]))
    }

    /// What `node` subscribes to, publishes, and serves.
    pub async fn node_details(&self, node: &str) -> Result<NodeDetails> {
        let values = self
            .call("/rosapi/node_details", json!({ "node": node }))
            .await?;
        Ok(NodeDetails {
            subscribing: string_list(&values["subscribing"]),
            publishing: string_list(&values["publishing"]),
            services: string_list(&values["services"]),
        })
    }

    /// Nodes publishing `topic`.
    pub async fn publishers(&self, topic: &str) -> Result<Vec<String>> {
        let values = self
            .call("/rosapi/publishers", json!({ "topic": topic }))
            .await?;
        Ok(string_list(&values["publishers"]))
    }

    /// Nodes subscribed to `topic`.
    pub async fn subscribers(&self, topic: &str) -> Result<Vec<String>> {
        let values = self
            .call("/rosapi/subscribers", json!({ "topic": topic }))
            .await?;
        Ok(string_list(&values["subscribers"]))
    }

    /// All running action servers.
    pub async fn action_servers(&self) -> Result<Vec<String>> {
        let values = self.call("/rosapi/action_servers", json!({})).await?;
        Ok(string_list(&values["action_servers"]))
    }

    /// Fetch a parameter. rosapi carries values as JSON-encoded strings;
    /// the payload is decoded when it parses, otherwise returned as a
    /// plain string.
    pub async fn get_param(&self, name: &str) -> Result<Value> {
        let values = self
            .call("/rosapi/get_param", json!({ "name": name }))
            .await?;
        let raw = string_field(&values["value"]);
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(raw)),
        }
    }

    /// Set a parameter, JSON-encoding `value` per the rosapi convention.
    pub async fn set_param(&self, name: &str, value: &Value) -> Result<()> {
        let encoded = value.to_string();
        let _ = self
            .call("/rosapi/set_param", json!({ "name": name, "value": encoded }))
            .await?;
        Ok(())
    }

    /// Whether a parameter named `name` exists.
    pub async fn has_param(&self, name: &str) -> Result<bool> {
        let values = self
            .call("/rosapi/has_param", json!({ "name": name }))
            .await?;
        Ok(values["exists"].as_bool().unwrap_or(false))
    }

    /// Delete the parameter named `name`.
    pub async fn delete_param(&self, name: &str) -> Result<()> {
        let _ = self
            .call("/rosapi/delete_param", json!({ "name": name }))
            .await?;
        Ok(())
    }

    async fn call(&self, service: &str, args: Value) -> Result<Value> {
        let reply = self.client.call_service(service, args).await?;
        if !reply.result {
            return Err(ClientError::ServiceFailure {
                service: service.to_string(),
                values: reply.values,
            });
        }
        Ok(reply.values)
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn string_field(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}
