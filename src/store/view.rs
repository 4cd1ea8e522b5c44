//! Non-owning entity handles.
//!
//! A [`User`] or [`Group`] is `{id, &Community}`: it borrows the store
//! and cannot outlive it, is never serialized, and holds no data of its
//! own. Reads check the fixed schema fields first and fall back to the
//! store's open attribute table; writes go through
//! [`Community::set_user_attribute`](super::Community::set_user_attribute)
//! on the owning store.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::api::{GroupId, UserId};
use crate::store::{City, Community, University, LAYER_ATTRIBUTE};

/// Handle to one user row in a [`Community`].
#[derive(Clone, Copy)]
pub struct User<'a> {
    store: &'a Community,
    id: UserId,
}

impl<'a> User<'a> {
    pub(crate) fn new(store: &'a Community, id: UserId) -> Self {
        debug_assert!(store.users.contains_key(&id));
        Self { store, id }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    fn record(&self) -> &'a super::UserRecord {
        &self.store.users[&self.id]
    }

    pub fn name(&self) -> &'a str {
        &self.record().name
    }

    pub fn age(&self) -> Option<i32> {
        self.record().age
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.record().last_seen
    }

    pub fn city(&self) -> Option<&'a City> {
        self.record()
            .city_id
            .and_then(|id| self.store.cities.get(&id))
    }

    pub fn university(&self) -> Option<&'a University> {
        self.record()
            .university_id
            .and_then(|id| self.store.universities.get(&id))
    }

    /// BFS hop distance from the nearest root, when recorded.
    pub fn layer(&self) -> Option<u32> {
        match self.attr(LAYER_ATTRIBUTE)? {
            Value::Number(n) => n.as_u64().map(|n| n as u32),
            _ => None,
        }
    }

    /// Dynamic attribute lookup: fixed schema fields first, then the
    /// store's open attribute table.
    pub fn attr(&self, name: &str) -> Option<Value> {
        let record = self.record();
        match name {
            "name" => Some(Value::from(record.name.as_str())),
            "age" => record.age.map(Value::from),
            "city_id" => record.city_id.map(Value::from),
            "university_id" => record.university_id.map(Value::from),
            "last_seen" => Some(Value::from(record.last_seen.to_rfc3339())),
            _ => self
                .store
                .user_attributes
                .get(&self.id)
                .and_then(|attrs| attrs.get(name))
                .cloned(),
        }
    }

    /// This user's friends (empty iterator when none were recorded).
    pub fn friends(&self) -> impl Iterator<Item = User<'a>> + 'a {
        let store = self.store;
        store
            .friends
            .get(&self.id)
            .into_iter()
            .flatten()
            .map(move |&id| User::new(store, id))
    }

    /// Groups this user belongs to.
    pub fn groups(&self) -> impl Iterator<Item = Group<'a>> + 'a {
        let store = self.store;
        store
            .subscriptions
            .get(&self.id)
            .into_iter()
            .flatten()
            .map(move |&id| Group::new(store, id))
    }
}

impl std::fmt::Debug for User<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<User id: {}, name: {}>", self.id, self.name())
    }
}

impl PartialEq for User<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.store, other.store) && self.id == other.id
    }
}

/// Handle to one group row in a [`Community`].
#[derive(Clone, Copy)]
pub struct Group<'a> {
    store: &'a Community,
    id: GroupId,
}

impl<'a> Group<'a> {
    pub(crate) fn new(store: &'a Community, id: GroupId) -> Self {
        debug_assert!(store.groups.contains_key(&id));
        Self { store, id }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        &self.store.groups[&self.id].name
    }

    pub fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name())),
            _ => self
                .store
                .group_attributes
                .get(&self.id)
                .and_then(|attrs| attrs.get(name))
                .cloned(),
        }
    }

    pub fn members(&self) -> impl Iterator<Item = User<'a>> + 'a {
        let store = self.store;
        store
            .members
            .get(&self.id)
            .into_iter()
            .flatten()
            .map(move |&id| User::new(store, id))
    }
}

impl std::fmt::Debug for Group<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Group id: {}, name: {}>", self.id, self.name())
    }
}

impl PartialEq for Group<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.store, other.store) && self.id == other.id
    }
}
