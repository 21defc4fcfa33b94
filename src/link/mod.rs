//! Point-in-time snapshots of the host's network interfaces.
//!
//! A snapshot is rebuilt from a full rtnetlink link dump for every incoming
//! notification, owned by the dispatch that built it, and dropped when that
//! dispatch finishes. Nothing here is cached or shared across events.

mod error;

use std::collections::HashMap;

pub use error::LinkError;
use futures::TryStreamExt;
use rtnetlink::{Handle, packet_route::link::LinkAttribute};

/// Identity of one network interface at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIdentity {
    pub index: u32,
    pub name: String,
}

/// Immutable mapping of interface index and name to interface identity.
#[derive(Debug, Default)]
pub struct LinkSnapshot {
    by_index: HashMap<u32, LinkIdentity>,
    by_name: HashMap<String, LinkIdentity>,
}

impl LinkSnapshot {
    /// Builds a snapshot from already-known identities.
    pub fn from_identities(identities: impl IntoIterator<Item = LinkIdentity>) -> Self {
        let mut snapshot = Self::default();
        for identity in identities {
            snapshot
                .by_name
                .insert(identity.name.clone(), identity.clone());
            snapshot.by_index.insert(identity.index, identity);
        }
        snapshot
    }

    /// Enumerates every interface currently visible to the host.
    pub async fn acquire(handle: &Handle) -> Result<Self, LinkError> {
        let mut links = handle.link().get().execute();
        let mut identities = Vec::new();

        while let Some(msg) = links.try_next().await.map_err(LinkError::Enumerate)? {
            let index = msg.header.index;
            let name = msg.attributes.iter().find_map(|attr| match attr {
                LinkAttribute::IfName(name) => Some(name.clone()),
                _ => None,
            });

            // A link without a name cannot be handed to hook scripts.
            if let Some(name) = name {
                identities.push(LinkIdentity { index, name });
            }
        }

        Ok(Self::from_identities(identities))
    }

    pub fn by_index(&self, index: u32) -> Option<&LinkIdentity> {
        self.by_index.get(&index)
    }

    pub fn by_name(&self, name: &str) -> Option<&LinkIdentity> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{LinkIdentity, LinkSnapshot};

    fn identity(index: u32, name: &str) -> LinkIdentity {
        LinkIdentity {
            index,
            name: name.to_string(),
        }
    }

    #[test]
    fn both_maps_describe_the_same_interfaces() {
        let snapshot =
            LinkSnapshot::from_identities([identity(1, "lo"), identity(2, "eth0")]);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.by_index(2), snapshot.by_name("eth0"));
        assert_eq!(snapshot.by_index(1).unwrap().name, "lo");
        assert_eq!(snapshot.by_name("lo").unwrap().index, 1);
    }

    #[test]
    fn unknown_index_is_absent() {
        let snapshot = LinkSnapshot::from_identities([identity(1, "lo")]);

        assert!(snapshot.by_index(99).is_none());
        assert!(snapshot.by_name("eth7").is_none());
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = LinkSnapshot::from_identities([]);
        assert!(snapshot.is_empty());
    }
}
