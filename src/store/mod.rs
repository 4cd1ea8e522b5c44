//! The community store: canonical, queryable representation of all
//! discovered users, groups and relations.
//!
//! The store owns every entity in id-keyed tables; [`User`] and [`Group`]
//! are non-owning handles into it. Two relational invariants hold after
//! every mutation:
//!
//! - friendship is symmetric: each undirected pair {u, v} is stored as
//!   the two directed entries u→v and v→u;
//! - membership and subscriptions agree: `g ∈ subscriptions(u)` exactly
//!   when `u ∈ members(g)`.

mod document;
mod filter;
mod view;

pub use document::CommunityDocument;
pub use view::{Group, User};

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::api::{CityId, GroupId, UniversityId, UserId};

/// Attribute name under which the BFS engine records hop distance.
pub const LAYER_ATTRIBUTE: &str = "layer";

/// Fixed-schema fields of a user entity. Ad hoc data (such as the BFS
/// layer) lives in the store's attribute table instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub age: Option<i32>,
    pub city_id: Option<CityId>,
    pub university_id: Option<UniversityId>,
    /// Last activity; `DateTime::<Utc>::MIN_UTC` is the "unknown" sentinel.
    #[serde(with = "ts_seconds")]
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    /// Absent until geocoded.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct University {
    pub name: String,
}

/// In-memory social graph: entity tables, relation sets and open
/// attribute tables, all keyed by the remote service's numeric ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Community {
    pub(crate) users: BTreeMap<UserId, UserRecord>,
    pub(crate) groups: BTreeMap<GroupId, GroupRecord>,
    pub(crate) cities: BTreeMap<CityId, City>,
    pub(crate) universities: BTreeMap<UniversityId, University>,
    pub(crate) friends: BTreeMap<UserId, BTreeSet<UserId>>,
    pub(crate) subscriptions: BTreeMap<UserId, BTreeSet<GroupId>>,
    pub(crate) members: BTreeMap<GroupId, BTreeSet<UserId>>,
    pub(crate) user_attributes: BTreeMap<UserId, BTreeMap<String, Value>>,
    pub(crate) group_attributes: BTreeMap<GroupId, BTreeMap<String, Value>>,
}

impl Community {
    pub fn new() -> Self {
        Self::default()
    }

    // --- entity tables ---------------------------------------------------

    /// Insert or replace a user record.
    pub fn insert_user(&mut self, id: UserId, record: UserRecord) {
        self.users.insert(id, record);
    }

    /// Insert or replace a group record.
    pub fn insert_group(&mut self, id: GroupId, record: GroupRecord) {
        self.groups.insert(id, record);
    }

    /// Register a city name for an id.
    ///
    /// Re-registration under a different name overwrites (last write wins)
    /// and is logged as a potential upstream inconsistency. Previously
    /// geocoded coordinates survive a rename.
    pub fn register_city(&mut self, id: CityId, name: String) {
        match self.cities.get_mut(&id) {
            Some(city) if city.name != name => {
                log::warn!(
                    "city {} renamed from {:?} to {:?}; keeping the newer name",
                    id,
                    city.name,
                    name
                );
                city.name = name;
            }
            Some(_) => {}
            None => {
                self.cities.insert(
                    id,
                    City {
                        name,
                        latitude: None,
                        longitude: None,
                    },
                );
            }
        }
    }

    /// Register a university name for an id. Same last-write-wins policy
    /// as [`register_city`](Self::register_city).
    pub fn register_university(&mut self, id: UniversityId, name: String) {
        if let Some(existing) = self.universities.get(&id) {
            if existing.name != name {
                log::warn!(
                    "university {} renamed from {:?} to {:?}; keeping the newer name",
                    id,
                    existing.name,
                    name
                );
            }
        }
        self.universities.insert(id, University { name });
    }

    /// Attach geocoded coordinates to a city.
    pub fn set_city_location(&mut self, id: CityId, latitude: f64, longitude: f64) {
        if let Some(city) = self.cities.get_mut(&id) {
            city.latitude = Some(latitude);
            city.longitude = Some(longitude);
        }
    }

    // --- relations -------------------------------------------------------

    /// Record the friendship {u, v} as both directed entries.
    pub fn add_friendship(&mut self, u: UserId, v: UserId) {
        self.friends.entry(u).or_default().insert(v);
        self.friends.entry(v).or_default().insert(u);
        debug_assert!(self.friends[&v].contains(&u) && self.friends[&u].contains(&v));
    }

    /// Record that `user` belongs to `group`, updating the membership and
    /// subscription sides together so they can never drift apart.
    pub fn add_membership(&mut self, group: GroupId, user: UserId) {
        self.members.entry(group).or_default().insert(user);
        self.subscriptions.entry(user).or_default().insert(group);
        debug_assert!(
            self.members[&group].contains(&user) && self.subscriptions[&user].contains(&group)
        );
    }

    // --- attribute tables ------------------------------------------------

    /// Write-through for ad hoc user data; the views read from here when a
    /// name is not a fixed schema field.
    pub fn set_user_attribute(&mut self, id: UserId, name: &str, value: Value) {
        self.user_attributes
            .entry(id)
            .or_default()
            .insert(name.to_string(), value);
    }

    pub fn set_group_attribute(&mut self, id: GroupId, name: &str, value: Value) {
        self.group_attributes
            .entry(id)
            .or_default()
            .insert(name.to_string(), value);
    }

    // --- access ----------------------------------------------------------

    /// Non-owning handle to a user, if present.
    pub fn get_user(&self, id: UserId) -> Option<User<'_>> {
        self.users.contains_key(&id).then(|| User::new(self, id))
    }

    /// Non-owning handle to a group, if present.
    pub fn get_group(&self, id: GroupId) -> Option<Group<'_>> {
        self.groups.contains_key(&id).then(|| Group::new(self, id))
    }

    /// All users, in id order.
    pub fn users(&self) -> impl Iterator<Item = User<'_>> {
        self.users.keys().map(move |&id| User::new(self, id))
    }

    /// All groups, in id order.
    pub fn groups(&self) -> impl Iterator<Item = Group<'_>> {
        self.groups.keys().map(move |&id| Group::new(self, id))
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    pub fn university_count(&self) -> usize {
        self.universities.len()
    }

    /// City ids with their records, in id order.
    pub fn cities(&self) -> impl Iterator<Item = (CityId, &City)> {
        self.cities.iter().map(|(&id, city)| (id, city))
    }

    pub fn universities(&self) -> impl Iterator<Item = (UniversityId, &University)> {
        self.universities.iter().map(|(&id, u)| (id, u))
    }

    /// Every directed friend entry, lazily. Each undirected friendship
    /// {u, v} yields both (u, v) and (v, u).
    pub fn edges(&self) -> impl Iterator<Item = (User<'_>, User<'_>)> {
        self.friends.iter().flat_map(move |(&u, vs)| {
            vs.iter().map(move |&v| (User::new(self, u), User::new(self, v)))
        })
    }

    /// Number of directed friend entries (twice the undirected edge count).
    pub fn edge_count(&self) -> usize {
        self.friends.values().map(BTreeSet::len).sum()
    }

    // --- invariants -------------------------------------------------------

    /// Full consistency sweep: friend symmetry, membership/subscription
    /// agreement, and referential integrity of every relation entry and
    /// side-table reference.
    ///
    /// Mutators maintain these locally; this is the global check run after
    /// deserializing a document and in tests.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (&u, vs) in &self.friends {
            if !self.users.contains_key(&u) {
                return Err(format!("friend entry references unknown user {u}"));
            }
            for &v in vs {
                if !self.users.contains_key(&v) {
                    return Err(format!("friend entry {u} -> {v} references unknown user {v}"));
                }
                if !self.friends.get(&v).is_some_and(|back| back.contains(&u)) {
                    return Err(format!("friend entry {u} -> {v} has no reverse entry"));
                }
            }
        }

        for (&user, groups) in &self.subscriptions {
            if !self.users.contains_key(&user) {
                return Err(format!("subscription references unknown user {user}"));
            }
            for &group in groups {
                if !self.groups.contains_key(&group) {
                    return Err(format!(
                        "subscription {user} -> {group} references unknown group {group}"
                    ));
                }
                if !self.members.get(&group).is_some_and(|m| m.contains(&user)) {
                    return Err(format!(
                        "user {user} subscribes to group {group} but is not in its member set"
                    ));
                }
            }
        }

        for (&group, users) in &self.members {
            if !self.groups.contains_key(&group) {
                return Err(format!("member set references unknown group {group}"));
            }
            for &user in users {
                if !self.users.contains_key(&user) {
                    return Err(format!(
                        "member entry {group} -> {user} references unknown user {user}"
                    ));
                }
                if !self
                    .subscriptions
                    .get(&user)
                    .is_some_and(|s| s.contains(&group))
                {
                    return Err(format!(
                        "group {group} lists member {user} who has no matching subscription"
                    ));
                }
            }
        }

        for (&id, record) in &self.users {
            if let Some(city) = record.city_id {
                if !self.cities.contains_key(&city) {
                    return Err(format!("user {id} references unknown city {city}"));
                }
            }
            if let Some(university) = record.university_id {
                if !self.universities.contains_key(&university) {
                    return Err(format!(
                        "user {id} references unknown university {university}"
                    ));
                }
            }
        }

        for &id in self.user_attributes.keys() {
            if !self.users.contains_key(&id) {
                return Err(format!("attribute table references unknown user {id}"));
            }
        }
        for &id in self.group_attributes.keys() {
            if !self.groups.contains_key(&id) {
                return Err(format!("attribute table references unknown group {id}"));
            }
        }

        Ok(())
    }
}
