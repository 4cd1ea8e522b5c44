//! Referentially-closed user filtering.

use std::collections::BTreeSet;

use crate::api::{GroupId, UserId};
use crate::store::{Community, User};

impl Community {
    /// Build a new store containing only the users accepted by `predicate`
    /// and the referenced closure around them.
    ///
    /// The original store is untouched. In the result:
    /// - friend entries keep only pairs with both endpoints retained;
    /// - a group survives only while it still has at least one retained
    ///   member, and its member set shrinks accordingly;
    /// - city and university tables shrink to the ids still referenced by
    ///   a retained user, never leaving orphans;
    /// - both attribute tables shrink to the retained ids.
    pub fn filter_users<P>(&self, predicate: P) -> Community
    where
        P: Fn(&User<'_>) -> bool,
    {
        let retained: BTreeSet<UserId> = self
            .users()
            .filter(|user| predicate(user))
            .map(|user| user.id())
            .collect();

        let mut result = Community::new();

        result.users = self
            .users
            .iter()
            .filter(|(id, _)| retained.contains(id))
            .map(|(&id, record)| (id, record.clone()))
            .collect();

        result.friends = self
            .friends
            .iter()
            .filter(|(u, _)| retained.contains(u))
            .map(|(&u, vs)| (u, vs.iter().copied().filter(|v| retained.contains(v)).collect::<BTreeSet<_>>()))
            .filter(|(_, vs): &(UserId, BTreeSet<UserId>)| !vs.is_empty())
            .collect();

        // Groups survive only with at least one retained member; the
        // subscription side is rebuilt from the surviving pairs so the
        // agreement invariant holds by construction.
        for (&group, users) in &self.members {
            let kept: BTreeSet<UserId> = users
                .iter()
                .copied()
                .filter(|u| retained.contains(u))
                .collect();
            if kept.is_empty() {
                continue;
            }
            result
                .groups
                .insert(group, self.groups[&group].clone());
            for &user in &kept {
                result.subscriptions.entry(user).or_default().insert(group);
            }
            result.members.insert(group, kept);
        }

        let kept_groups: BTreeSet<GroupId> = result.groups.keys().copied().collect();

        result.user_attributes = self
            .user_attributes
            .iter()
            .filter(|(id, _)| retained.contains(id))
            .map(|(&id, attrs)| (id, attrs.clone()))
            .collect();

        result.group_attributes = self
            .group_attributes
            .iter()
            .filter(|(id, _)| kept_groups.contains(id))
            .map(|(&id, attrs)| (id, attrs.clone()))
            .collect();

        // Side tables restrict to the referenced closure unconditionally.
        let referenced_cities: BTreeSet<_> = result
            .users
            .values()
            .filter_map(|record| record.city_id)
            .collect();
        result.cities = self
            .cities
            .iter()
            .filter(|(id, _)| referenced_cities.contains(id))
            .map(|(&id, city)| (id, city.clone()))
            .collect();

        let referenced_universities: BTreeSet<_> = result
            .users
            .values()
            .filter_map(|record| record.university_id)
            .collect();
        result.universities = self
            .universities
            .iter()
            .filter(|(id, _)| referenced_universities.contains(id))
            .map(|(&id, u)| (id, u.clone()))
            .collect();

        debug_assert!(result.validate().is_ok());
        result
    }
}
