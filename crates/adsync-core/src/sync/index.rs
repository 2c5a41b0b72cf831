//! Identifier snapshot used for dependency resolution, scoping and dedup.
//!
//! Rebuilt at the start of every step so identifiers assigned by earlier steps
//! are visible to later ones.

use std::collections::HashMap;

use adsync_types::models::{
    Entity, EntityKind, EntityRef, LocalId, Placement, PlacementKey, RemoteId,
};

use crate::modules::{EntityFilter, RepoResult, SyncRepository};

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    remote_id: Option<RemoteId>,
    synced: bool,
    network: Option<EntityRef>,
    advertiser: Option<EntityRef>,
    mirror: bool,
}

#[derive(Debug, Default)]
pub struct IdIndex {
    entries: HashMap<(EntityKind, LocalId), IndexEntry>,
    by_remote: HashMap<(EntityKind, RemoteId), LocalId>,
}

impl IdIndex {
    pub async fn load(store: &dyn SyncRepository) -> RepoResult<Self> {
        let mut entities = Vec::new();
        for kind in EntityKind::ALL {
            entities.extend(store.list(kind, EntityFilter::all()).await?);
        }
        Ok(Self::from_entities(&entities))
    }

    pub fn from_entities<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Self {
        let mut index = Self::default();
        for entity in entities {
            let meta = entity.meta();
            let kind = entity.kind();
            let mirror = matches!(entity, Entity::Campaign(c) if c.is_mirror());
            index.entries.insert(
                (kind, meta.local_id),
                IndexEntry {
                    remote_id: meta.remote_id,
                    synced: meta.synced,
                    network: entity.network(),
                    advertiser: entity.advertiser(),
                    mirror,
                },
            );
            if let Some(remote_id) = meta.remote_id {
                index.by_remote.insert((kind, remote_id), meta.local_id);
            }
        }
        index
    }

    fn entry(&self, kind: EntityKind, id: LocalId) -> Option<&IndexEntry> {
        self.entries.get(&(kind, id))
    }

    fn resolve_entry(&self, kind: EntityKind, reference: EntityRef) -> Option<&IndexEntry> {
        let id = self.local_id(kind, reference)?;
        self.entry(kind, id)
    }

    /// Whether a reference points at something that exists. Remote ids are taken on trust.
    pub fn exists(&self, kind: EntityKind, reference: EntityRef) -> bool {
        match reference {
            EntityRef::Remote(_) => true,
            EntityRef::Local(id) => self.entries.contains_key(&(kind, id)),
        }
    }

    /// Local record behind a reference, following remote ids to their local twin.
    pub fn local_id(&self, kind: EntityKind, reference: EntityRef) -> Option<LocalId> {
        match reference {
            EntityRef::Local(id) => self.entries.contains_key(&(kind, id)).then_some(id),
            EntityRef::Remote(remote_id) => self.by_remote.get(&(kind, remote_id)).copied(),
        }
    }

    pub fn remote_id(&self, kind: EntityKind, reference: EntityRef) -> Option<RemoteId> {
        match reference {
            EntityRef::Remote(id) => Some(id),
            EntityRef::Local(id) => self.entry(kind, id).and_then(|e| e.remote_id),
        }
    }

    /// Local references with a remote twin collapse to `Remote`; everything else is unchanged.
    pub fn canonical(&self, kind: EntityKind, reference: EntityRef) -> EntityRef {
        self.remote_id(kind, reference).map_or(reference, EntityRef::Remote)
    }

    /// A local record that will be pushed during this run.
    pub fn is_pending(&self, kind: EntityKind, reference: EntityRef) -> bool {
        self.resolve_entry(kind, reference).is_some_and(|e| !e.synced)
    }

    pub fn is_mirror(&self, id: LocalId) -> bool {
        self.entry(EntityKind::Campaign, id).is_some_and(|e| e.mirror)
    }

    pub fn network_of(&self, kind: EntityKind, reference: EntityRef) -> Option<EntityRef> {
        self.resolve_entry(kind, reference).and_then(|e| e.network)
    }

    pub fn advertiser_of(&self, kind: EntityKind, reference: EntityRef) -> Option<EntityRef> {
        self.resolve_entry(kind, reference).and_then(|e| e.advertiser)
    }

    /// Network membership; `None` scope means every network.
    pub fn in_scope(&self, entity: &Entity, scope: Option<EntityRef>) -> bool {
        let Some(scope) = scope else {
            return true;
        };
        let own_network = match entity {
            Entity::Network(n) => EntityRef::Local(n.meta.local_id),
            other => match other.network() {
                Some(network) => network,
                None => return false,
            },
        };
        self.same_network(own_network, scope)
    }

    /// Placements belong to their campaign's network, falling back to the advertisement's.
    pub fn placement_in_scope(&self, placement: &Placement, scope: Option<EntityRef>) -> bool {
        let Some(scope) = scope else {
            return true;
        };
        self.network_of(EntityKind::Campaign, placement.campaign)
            .or_else(|| self.network_of(EntityKind::Advertisement, placement.advertisement))
            .is_some_and(|network| self.same_network(network, scope))
    }

    pub fn same_network(&self, a: EntityRef, b: EntityRef) -> bool {
        self.canonical(EntityKind::Network, a) == self.canonical(EntityKind::Network, b)
    }

    pub fn placement_key(&self, placement: &Placement) -> PlacementKey {
        PlacementKey {
            advertisement: self.canonical(EntityKind::Advertisement, placement.advertisement),
            zone: self.canonical(EntityKind::Zone, placement.zone),
            campaign: self.canonical(EntityKind::Campaign, placement.campaign),
        }
    }

    /// Local references that no longer resolve.
    pub fn dangling_reference(&self, placement: &Placement) -> Option<EntityKind> {
        [
            (EntityKind::Advertisement, placement.advertisement),
            (EntityKind::Zone, placement.zone),
            (EntityKind::Campaign, placement.campaign),
        ]
        .into_iter()
        .find(|(kind, reference)| !self.exists(*kind, *reference))
        .map(|(kind, _)| kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{campaign, local, network, remote_network, zone};

    #[test]
    fn test_canonical_prefers_remote_id() {
        let synced = remote_network("Main", 9001);
        let pending = network("Draft");
        let index = IdIndex::from_entities([&synced, &pending]);

        assert_eq!(index.canonical(EntityKind::Network, local(&synced)), EntityRef::Remote(9001));
        assert_eq!(index.canonical(EntityKind::Network, local(&pending)), local(&pending));
        assert_eq!(index.local_id(EntityKind::Network, EntityRef::Remote(9001)), Some(synced.local_id()));
    }

    #[test]
    fn test_scope_matches_either_identifier_space() {
        let net = remote_network("Main", 9001);
        let sidebar = zone(local(&net), "Sidebar", None);
        let footer = zone(EntityRef::Remote(9001), "Footer", None);
        let other = zone(EntityRef::Remote(42), "Elsewhere", None);
        let index = IdIndex::from_entities([&net, &sidebar, &footer, &other]);

        let scope = Some(EntityRef::Remote(9001));
        assert!(index.in_scope(&sidebar, scope));
        assert!(index.in_scope(&footer, scope));
        assert!(!index.in_scope(&other, scope));
        assert!(index.in_scope(&net, Some(local(&net))));
        assert!(index.in_scope(&other, None));
    }

    #[test]
    fn test_missing_local_reference_is_dangling() {
        let net = network("Main");
        let camp = campaign(local(&net), EntityRef::Remote(7), "Spring");
        let index = IdIndex::from_entities([&net, &camp]);

        let placement = Placement::new_local(
            EntityRef::Local(uuid::Uuid::new_v4()),
            EntityRef::Remote(182864),
            local(&camp),
        );
        assert_eq!(index.dangling_reference(&placement), Some(EntityKind::Advertisement));
        assert!(index.is_pending(EntityKind::Campaign, local(&camp)));
    }
}
