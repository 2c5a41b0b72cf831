//! Kind descriptors: parent resolution and remote payload per entity kind.

use serde_json::{json, Map, Value};

use adsync_types::models::{Entity, EntityKind, EntityRef, Placement, RemoteId};

use super::index::IdIndex;
use crate::remote::RemoteRoute;

/// Where and what to send for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTarget {
    pub route: RemoteRoute,
    pub fields: Value,
}

/// The parent that has no remote identifier yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingParent {
    pub kind: EntityKind,
    pub reference: EntityRef,
}

impl MissingParent {
    pub fn describe(&self) -> String {
        format!("{} {}", self.kind, self.reference)
    }
}

fn require(index: &IdIndex, kind: EntityKind, reference: EntityRef) -> Result<RemoteId, MissingParent> {
    index.remote_id(kind, reference).ok_or(MissingParent { kind, reference })
}

/// Drop null members so optional fields are omitted rather than cleared remotely.
fn compact(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect::<Map<_, _>>())
        },
        other => other,
    }
}

/// Resolve parents and build the create/update payload for `entity`.
pub fn remote_target(entity: &Entity, index: &IdIndex) -> Result<RemoteTarget, MissingParent> {
    let (route, fields) = match entity {
        Entity::Network(n) => (
            RemoteRoute::Networks,
            json!({"name": n.name, "web_home_url": n.web_home_url, "notes": n.notes}),
        ),
        Entity::Advertiser(a) => {
            let network = require(index, EntityKind::Network, a.network)?;
            (
                RemoteRoute::Advertisers { network },
                json!({
                    "network_id": network,
                    "name": a.name,
                    "web_home_url": a.web_home_url,
                    "notes": a.notes,
                }),
            )
        },
        Entity::Zone(z) => {
            let network = require(index, EntityKind::Network, z.network)?;
            (
                RemoteRoute::Zones { network },
                json!({
                    "network_id": network,
                    "name": z.name,
                    "alias": z.alias,
                    "width": z.width,
                    "height": z.height,
                }),
            )
        },
        Entity::Campaign(c) => {
            let network = require(index, EntityKind::Network, c.network)?;
            let advertiser = require(index, EntityKind::Advertiser, c.advertiser)?;
            (
                RemoteRoute::Campaigns { network, advertiser },
                json!({
                    "network_id": network,
                    "advertiser_id": advertiser,
                    "name": c.name,
                    "start_date": c.start_date,
                    "end_date": c.end_date,
                    "max_impression_count": c.max_impression_count,
                    "weight": c.weight,
                    "active": c.active,
                    "notes": c.notes,
                }),
            )
        },
        Entity::Advertisement(ad) => {
            let network = require(index, EntityKind::Network, ad.network)?;
            let advertiser = require(index, EntityKind::Advertiser, ad.advertiser)?;
            (
                RemoteRoute::Advertisements { network, advertiser },
                json!({
                    "network_id": network,
                    "advertiser_id": advertiser,
                    "name": ad.name,
                    "ad_type": ad.ad_type,
                    "destination_url": ad.destination_url,
                    "html": ad.html,
                    "active": ad.active,
                }),
            )
        },
    };
    Ok(RemoteTarget { route, fields: compact(fields) })
}

/// Placements need remote ad, zone and campaign, plus the campaign's network and advertiser.
pub fn placement_target(placement: &Placement, index: &IdIndex) -> Result<RemoteTarget, MissingParent> {
    let advertisement = require(index, EntityKind::Advertisement, placement.advertisement)?;
    let zone = require(index, EntityKind::Zone, placement.zone)?;
    let campaign = require(index, EntityKind::Campaign, placement.campaign)?;

    let campaign_parent = |kind: EntityKind, parent: Option<EntityRef>| -> Result<RemoteId, MissingParent> {
        let reference = parent.ok_or(MissingParent { kind, reference: placement.campaign })?;
        require(index, kind, reference)
    };
    let network = campaign_parent(
        EntityKind::Network,
        index.network_of(EntityKind::Campaign, placement.campaign),
    )?;
    let advertiser = campaign_parent(
        EntityKind::Advertiser,
        index.advertiser_of(EntityKind::Campaign, placement.campaign),
    )?;

    Ok(RemoteTarget {
        route: RemoteRoute::Placements { network, advertiser, campaign },
        fields: json!({
            "advertisement_id": advertisement,
            "zone_id": zone,
            "campaign_id": campaign,
        }),
    })
}
