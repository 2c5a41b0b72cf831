//! Remote ad server API: route table, record shape and the client trait.

mod client;
mod client_builder;

pub use client::HttpAdServerClient;
pub use client_builder::build_http_client;

use async_trait::async_trait;
use serde_json::Value;

use adsync_types::models::RemoteId;
use adsync_types::RemoteError;

/// Collection endpoint a create/update/list call targets.
///
/// Parent ids are remote ids; a route cannot be built before its parents exist remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteRoute {
    Networks,
    Advertisers { network: RemoteId },
    Zones { network: RemoteId },
    Campaigns { network: RemoteId, advertiser: RemoteId },
    Advertisements { network: RemoteId, advertiser: RemoteId },
    Placements { network: RemoteId, advertiser: RemoteId, campaign: RemoteId },
}

impl RemoteRoute {
    pub fn path(&self) -> String {
        match self {
            Self::Networks => "/networks".to_string(),
            Self::Advertisers { network } => format!("/networks/{network}/advertisers"),
            Self::Zones { network } => format!("/networks/{network}/zones"),
            Self::Campaigns { network, advertiser } => {
                format!("/networks/{network}/advertisers/{advertiser}/campaigns")
            },
            Self::Advertisements { network, advertiser } => {
                format!("/networks/{network}/advertisers/{advertiser}/advertisements")
            },
            Self::Placements { network, advertiser, campaign } => {
                format!("/networks/{network}/advertisers/{advertiser}/campaigns/{campaign}/placements")
            },
        }
    }

    /// Singular resource name; also the request/response envelope key.
    pub const fn resource(&self) -> &'static str {
        match self {
            Self::Networks => "network",
            Self::Advertisers { .. } => "advertiser",
            Self::Zones { .. } => "zone",
            Self::Campaigns { .. } => "campaign",
            Self::Advertisements { .. } => "advertisement",
            Self::Placements { .. } => "placement",
        }
    }

    pub const fn collection(&self) -> &'static str {
        match self {
            Self::Networks => "networks",
            Self::Advertisers { .. } => "advertisers",
            Self::Zones { .. } => "zones",
            Self::Campaigns { .. } => "campaigns",
            Self::Advertisements { .. } => "advertisements",
            Self::Placements { .. } => "placements",
        }
    }
}

/// A record as the remote system returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub id: RemoteId,
    /// Unwrapped resource object (without the `{<kind>: ...}` envelope).
    pub body: Value,
}

/// Everything the engine needs from the remote system of record.
///
/// Implementations talk to the network directly; callers reach them only
/// through a `RequestGate` ticket.
#[async_trait]
pub trait AdServerApi: Send + Sync {
    /// POST `fields` to the route's collection.
    async fn create(&self, route: &RemoteRoute, fields: Value) -> Result<RemoteRecord, RemoteError>;

    /// PUT `fields` to `{collection}/{id}`.
    async fn update(
        &self,
        route: &RemoteRoute,
        id: RemoteId,
        fields: Value,
    ) -> Result<RemoteRecord, RemoteError>;

    /// Look up a campaign by remote id, for building mirrors.
    async fn fetch_campaign(&self, id: RemoteId) -> Result<RemoteRecord, RemoteError>;

    async fn list(&self, route: &RemoteRoute) -> Result<Vec<RemoteRecord>, RemoteError>;
}

/// Pull the remote id out of a response: `body.<resource>.id`, then `body.id`.
pub fn extract_id(resource: &str, body: &Value) -> Option<RemoteId> {
    body.get(resource)
        .and_then(|inner| inner.get("id"))
        .or_else(|| body.get("id"))
        .and_then(id_from_value)
}

/// Remote ids arrive as numbers or numeric strings.
pub fn id_from_value(value: &Value) -> Option<RemoteId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Strip the `{<resource>: {...}}` envelope when present.
pub fn unwrap_envelope(resource: &str, body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get(resource).is_some_and(Value::is_object) => {
            map.remove(resource).unwrap_or(Value::Null)
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_paths() {
        let route = RemoteRoute::Placements { network: 9001, advertiser: 12, campaign: 77 };
        assert_eq!(route.path(), "/networks/9001/advertisers/12/campaigns/77/placements");
        assert_eq!(route.resource(), "placement");
        assert_eq!(RemoteRoute::Zones { network: 1 }.path(), "/networks/1/zones");
    }

    #[test]
    fn test_extract_id_prefers_envelope() {
        let body = json!({"zone": {"id": 182864}, "id": 1});
        assert_eq!(extract_id("zone", &body), Some(182864));
        assert_eq!(extract_id("zone", &json!({"id": "175302"})), Some(175302));
        assert_eq!(extract_id("zone", &json!({"zone": {"name": "x"}})), None);
    }

    #[test]
    fn test_unwrap_envelope() {
        let body = json!({"campaign": {"id": 5, "name": "Spring"}});
        assert_eq!(unwrap_envelope("campaign", body)["name"], "Spring");
        let flat = json!({"id": 5});
        assert_eq!(unwrap_envelope("campaign", flat.clone()), flat);
    }
}
