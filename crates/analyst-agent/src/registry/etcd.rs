//! etcd v3 registry over the JSON gateway.
//!
//! Keys and values travel base64-encoded. The gateway renders int64 fields
//! as JSON strings, so numeric fields are read leniently.

use std::time::Duration;

use analyst_core::LeaseId;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tracing::debug;

use super::{Registry, RegistryError};

/// etcd client speaking the v3 JSON gateway.
pub struct EtcdRegistry {
    endpoint: String,
    client: reqwest::Client,
}

impl EtcdRegistry {
    /// Create a client for `endpoint` (e.g. `http://127.0.0.1:2379`).
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, path: &str, body: Value) -> Result<Value, RegistryError> {
        let url = format!("{}{}", self.endpoint, path);
        debug!(url = %url, "Registry request");

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl Registry for EtcdRegistry {
    async fn status(&self) -> Result<(), RegistryError> {
        self.call("/v3/maintenance/status", json!({})).await?;
        Ok(())
    }

    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId, RegistryError> {
        let response = self
            .call("/v3/lease/grant", json!({ "TTL": ttl_secs }))
            .await?;

        if let Some(error) = response.get("error").and_then(Value::as_str) {
            if !error.is_empty() {
                return Err(RegistryError::Malformed(error.to_string()));
            }
        }

        int_field(&response, "ID")
            .map(LeaseId::new)
            .ok_or_else(|| RegistryError::Malformed("lease grant without ID".to_string()))
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<(), RegistryError> {
        let response = self
            .call("/v3/lease/keepalive", json!({ "ID": lease.get() }))
            .await?;

        // streaming endpoint: the answer is wrapped in "result"
        let answer = response.get("result").unwrap_or(&response);
        match int_field(answer, "TTL") {
            Some(ttl) if ttl > 0 => Ok(()),
            _ => Err(RegistryError::LeaseExpired(lease)),
        }
    }

    async fn put(&self, key: &str, value: &str, lease: LeaseId) -> Result<(), RegistryError> {
        self.call(
            "/v3/kv/put",
            json!({
                "key": STANDARD.encode(key),
                "value": STANDARD.encode(value),
                "lease": lease.get(),
            }),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RegistryError> {
        self.call("/v3/kv/deleterange", json!({ "key": STANDARD.encode(key) }))
            .await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>, RegistryError> {
        let response = self
            .call(
                "/v3/kv/range",
                json!({
                    "key": STANDARD.encode(prefix),
                    "range_end": STANDARD.encode(prefix_end(prefix.as_bytes())),
                }),
            )
            .await?;

        let Some(kvs) = response.get("kvs").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        let mut entries = kvs
            .iter()
            .map(|kv| Ok((decode_field(kv, "key")?, decode_field(kv, "value")?)))
            .collect::<Result<Vec<_>, RegistryError>>()?;
        entries.sort();
        Ok(entries)
    }
}

/// Smallest key greater than every key starting with `prefix`.
fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    // all 0xff: range to the end of the keyspace
    vec![0]
}

/// Read an int64 field rendered either as a JSON number or a string.
fn int_field(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn decode_field(kv: &Value, key: &str) -> Result<String, RegistryError> {
    let encoded = kv.get(key).and_then(Value::as_str).unwrap_or_default();
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| RegistryError::Malformed(format!("{key} is not base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| RegistryError::Malformed(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(b"/svc/"), b"/svc0".to_vec());
        assert_eq!(prefix_end(&[b'a', 0xff]), b"b".to_vec());
        assert_eq!(prefix_end(&[0xff]), vec![0]);
    }

    #[test]
    fn test_int_field_accepts_strings() {
        let value = json!({"ID": "7587862072141634564", "TTL": 10});
        assert_eq!(int_field(&value, "ID"), Some(7587862072141634564));
        assert_eq!(int_field(&value, "TTL"), Some(10));
        assert_eq!(int_field(&value, "missing"), None);
    }

    #[test]
    fn test_decode_field() {
        let kv = json!({"key": STANDARD.encode("/svc/a:1"), "value": STANDARD.encode("a:1")});
        assert_eq!(decode_field(&kv, "key").unwrap(), "/svc/a:1");
        assert_eq!(decode_field(&kv, "value").unwrap(), "a:1");
        assert!(decode_field(&json!({"key": "%%%"}), "key").is_err());
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let registry =
            EtcdRegistry::new("http://127.0.0.1:2379/", Duration::from_secs(1)).unwrap();
        assert_eq!(registry.endpoint(), "http://127.0.0.1:2379");
    }
}
