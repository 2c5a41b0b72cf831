use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};

use adsync_types::models::{RemoteConfig, RemoteId};
use adsync_types::RemoteError;

use super::{build_http_client, extract_id, id_from_value, unwrap_envelope, AdServerApi, RemoteRecord, RemoteRoute};
use crate::metrics::record_remote_request;

/// `reqwest`-backed client for the remote ad server REST API.
pub struct HttpAdServerClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl HttpAdServerClient {
    /// Accepts a pre-built client so TLS setup happens outside request paths.
    pub fn new(http: Client, base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url, access_token: access_token.into() }
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let http = build_http_client(config).map_err(|message| RemoteError::Transport { message })?;
        Ok(Self::new(http, config.base_url.clone(), config.access_token.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        resource: &'static str,
        op: &'static str,
        fields: Option<Value>,
    ) -> Result<Value, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request =
            self.http.request(method, &url).query(&[("access_token", self.access_token.as_str())]);
        if let Some(fields) = fields {
            request = request.json(&json!({ resource: fields }));
        }

        let response = request.send().await.map_err(|e| {
            record_remote_request(resource, op, "transport");
            tracing::warn!(%url, "Remote {} {} failed: {}", op, resource, e);
            RemoteError::Transport { message: e.to_string() }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            record_remote_request(resource, op, "transport");
            RemoteError::Transport { message: format!("Failed to read response body: {}", e) }
        })?;
        record_remote_request(resource, op, status_class(status.as_u16()));

        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "Remote {} {} rejected", op, resource);
            return Err(RemoteError::status(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| RemoteError::MalformedResponse { message: format!("{resource} {op}: {e}") })
    }

    fn into_record(resource: &str, op: &str, body: Value) -> Result<RemoteRecord, RemoteError> {
        let id = extract_id(resource, &body).ok_or_else(|| RemoteError::MalformedResponse {
            message: format!("{resource} {op} response carries no id"),
        })?;
        Ok(RemoteRecord { id, body: unwrap_envelope(resource, body) })
    }
}

const fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

#[async_trait]
impl AdServerApi for HttpAdServerClient {
    async fn create(&self, route: &RemoteRoute, fields: Value) -> Result<RemoteRecord, RemoteError> {
        let resource = route.resource();
        let body = self.send(Method::POST, &route.path(), resource, "create", Some(fields)).await?;
        Self::into_record(resource, "create", body)
    }

    async fn update(
        &self,
        route: &RemoteRoute,
        id: RemoteId,
        fields: Value,
    ) -> Result<RemoteRecord, RemoteError> {
        let resource = route.resource();
        let path = format!("{}/{}", route.path(), id);
        let body = self.send(Method::PUT, &path, resource, "update", Some(fields)).await?;
        // Some endpoints answer an update with an empty body; the id is already known.
        if extract_id(resource, &body).is_none() {
            return Ok(RemoteRecord { id, body: unwrap_envelope(resource, body) });
        }
        Self::into_record(resource, "update", body)
    }

    async fn fetch_campaign(&self, id: RemoteId) -> Result<RemoteRecord, RemoteError> {
        let path = format!("/campaigns/{id}");
        match self.send(Method::GET, &path, "campaign", "fetch", None).await {
            Ok(body) => Self::into_record("campaign", "fetch", body),
            Err(RemoteError::Status { status: 404, .. }) => {
                Err(RemoteError::NotFound { kind: "campaign".to_string(), id })
            },
            Err(e) => Err(e),
        }
    }

    async fn list(&self, route: &RemoteRoute) -> Result<Vec<RemoteRecord>, RemoteError> {
        let resource = route.resource();
        let body = self.send(Method::GET, &route.path(), resource, "list", None).await?;
        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove(route.collection()) {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(RemoteError::MalformedResponse {
                        message: format!("list response has no '{}' array", route.collection()),
                    })
                },
            },
            Value::Null => Vec::new(),
            _ => {
                return Err(RemoteError::MalformedResponse {
                    message: format!("unexpected {} list payload", resource),
                })
            },
        };

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let item = unwrap_envelope(resource, item);
                let id = item.get("id").and_then(id_from_value)?;
                Some(RemoteRecord { id, body: item })
            })
            .collect())
    }
}
