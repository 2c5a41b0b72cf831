//! Identifier spaces: store-assigned local ids and remote-assigned numeric ids.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Store-assigned identifier, stable for the record's lifetime and never reused.
pub type LocalId = Uuid;

/// Identifier assigned by the remote ad server after a successful create.
pub type RemoteId = i64;

/// The five entity kinds pushed by the generic syncer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Network,
    Advertiser,
    Zone,
    Campaign,
    Advertisement,
}

impl EntityKind {
    pub const ALL: [Self; 5] =
        [Self::Network, Self::Advertiser, Self::Zone, Self::Campaign, Self::Advertisement];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Advertiser => "advertiser",
            Self::Zone => "zone",
            Self::Campaign => "campaign",
            Self::Advertisement => "advertisement",
        }
    }

    pub const fn plural(self) -> &'static str {
        match self {
            Self::Network => "networks",
            Self::Advertiser => "advertisers",
            Self::Zone => "zones",
            Self::Campaign => "campaigns",
            Self::Advertisement => "advertisements",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to another entity by either identifier space.
///
/// On the wire a JSON number (or a numeric string) is a remote id and a UUID
/// string is a local id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Remote(RemoteId),
    Local(LocalId),
}

impl EntityRef {
    pub const fn remote_id(&self) -> Option<RemoteId> {
        match self {
            Self::Remote(id) => Some(*id),
            Self::Local(_) => None,
        }
    }

    pub const fn local_id(&self) -> Option<LocalId> {
        match self {
            Self::Local(id) => Some(*id),
            Self::Remote(_) => None,
        }
    }
}

impl From<RemoteId> for EntityRef {
    fn from(id: RemoteId) -> Self {
        Self::Remote(id)
    }
}

impl From<LocalId> for EntityRef {
    fn from(id: LocalId) -> Self {
        Self::Local(id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Local(id) => write!(f, "{id}"),
        }
    }
}

/// Parse failure for [`EntityRef`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is neither a numeric remote id nor a UUID local id")]
pub struct ParseEntityRefError(pub String);

impl FromStr for EntityRef {
    type Err = ParseEntityRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<RemoteId>() {
            return Ok(Self::Remote(id));
        }
        Uuid::parse_str(s).map(Self::Local).map_err(|_| ParseEntityRefError(s.to_string()))
    }
}

impl Serialize for EntityRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Remote(id) => serializer.serialize_i64(*id),
            Self::Local(id) => serializer.collect_str(id),
        }
    }
}

impl<'de> Deserialize<'de> for EntityRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RefVisitor;

        impl de::Visitor<'_> for RefVisitor {
            type Value = EntityRef;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a numeric remote id or a UUID string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<EntityRef, E> {
                Ok(EntityRef::Remote(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<EntityRef, E> {
                RemoteId::try_from(v)
                    .map(EntityRef::Remote)
                    .map_err(|_| E::custom(format!("remote id {v} out of range")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<EntityRef, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(RefVisitor)
    }
}
