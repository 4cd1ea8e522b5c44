//! The persisted community document.
//!
//! A JSON object with nine top-level sections, each a mapping from the
//! canonical integer id to its fields. Saving and loading is a lossless
//! round trip over every id, name, numeric and timestamp field and every
//! relation set.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::api::{CityId, GroupId, UniversityId, UserId};
use crate::error::{Result, SociographError};
use crate::store::{City, Community, GroupRecord, University, UserRecord};

/// Serialized form of a [`Community`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunityDocument {
    pub users: BTreeMap<UserId, UserRecord>,
    pub groups: BTreeMap<GroupId, GroupRecord>,
    pub cities: BTreeMap<CityId, City>,
    pub universities: BTreeMap<UniversityId, University>,
    /// Directed adjacency: both u -> v and v -> u are present for each
    /// undirected friendship.
    pub friends: BTreeMap<UserId, Vec<UserId>>,
    pub members: BTreeMap<GroupId, Vec<UserId>>,
    pub subscriptions: BTreeMap<UserId, Vec<GroupId>>,
    pub user_attributes: BTreeMap<UserId, BTreeMap<String, Value>>,
    pub group_attributes: BTreeMap<GroupId, BTreeMap<String, Value>>,
}

impl Community {
    /// Encode this store as a document.
    pub fn to_document(&self) -> CommunityDocument {
        fn adjacency<K: Ord + Copy, V: Ord + Copy>(
            map: &BTreeMap<K, BTreeSet<V>>,
        ) -> BTreeMap<K, Vec<V>> {
            map.iter()
                .map(|(&k, vs)| (k, vs.iter().copied().collect()))
                .collect()
        }

        CommunityDocument {
            users: self.users.clone(),
            groups: self.groups.clone(),
            cities: self.cities.clone(),
            universities: self.universities.clone(),
            friends: adjacency(&self.friends),
            members: adjacency(&self.members),
            subscriptions: adjacency(&self.subscriptions),
            user_attributes: self.user_attributes.clone(),
            group_attributes: self.group_attributes.clone(),
        }
    }

    /// Build a store from a document.
    ///
    /// If exactly one of the membership/subscription sections is empty it
    /// is derived by inverting the other. When both are populated they are
    /// trusted as-is and not cross-validated against each other beyond the
    /// integrity sweep below; a document whose two sides disagree is
    /// rejected rather than silently repaired.
    ///
    /// Fails with [`SociographError::Document`] when any relation entry or
    /// side-table reference points at a missing entity.
    pub fn from_document(document: CommunityDocument) -> Result<Self> {
        fn sets<K: Ord + Copy, V: Ord + Copy>(
            map: BTreeMap<K, Vec<V>>,
        ) -> BTreeMap<K, BTreeSet<V>> {
            map.into_iter()
                .map(|(k, vs)| (k, vs.into_iter().collect()))
                .collect()
        }

        fn invert<K: Ord + Copy, V: Ord + Copy>(
            map: &BTreeMap<K, BTreeSet<V>>,
        ) -> BTreeMap<V, BTreeSet<K>> {
            let mut inverted: BTreeMap<V, BTreeSet<K>> = BTreeMap::new();
            for (&k, vs) in map {
                for &v in vs {
                    inverted.entry(v).or_default().insert(k);
                }
            }
            inverted
        }

        let mut community = Community {
            users: document.users,
            groups: document.groups,
            cities: document.cities,
            universities: document.universities,
            friends: sets(document.friends),
            subscriptions: sets(document.subscriptions),
            members: sets(document.members),
            user_attributes: document.user_attributes,
            group_attributes: document.group_attributes,
        };

        if community.subscriptions.is_empty() && !community.members.is_empty() {
            community.subscriptions = invert(&community.members);
        } else if community.members.is_empty() && !community.subscriptions.is_empty() {
            community.members = invert(&community.subscriptions);
        }

        community
            .validate()
            .map_err(SociographError::Document)?;

        Ok(community)
    }

    /// Save this store to `path` as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_document())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a store from a document previously written by
    /// [`save`](Self::save). Missing files, malformed JSON and integrity
    /// violations are all fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let document: CommunityDocument = serde_json::from_str(&json)?;
        Self::from_document(document)
    }
}
