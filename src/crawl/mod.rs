//! Frontier scheduler: breadth-first crawling of the friend graph.
//!
//! Traversal is strictly sequential across layers: layer `i + 1` starts
//! only after every fetch of layer `i` has completed, because the next
//! frontier is computed from the complete results of the current one.
//! Within a layer all per-node fetches run concurrently through the
//! [`BatchFetcher`]; the fetch tasks only return data, and this driver is
//! the single writer of the store.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::api::{GroupId, GroupMembers, RawProfile, RemoteApi, UserId};
use crate::fetch::BatchFetcher;
use crate::normalize::{parse_group, parse_user, ParsedUser};
use crate::store::{Community, LAYER_ATTRIBUTE};

/// Remote batch limit for bulk profile lookups.
pub const MAX_USERS_PER_QUERY: usize = 1000;

/// Profile fields requested with every user record.
const USER_FIELDS: &str = "universities, schools, city, bdate, last_seen";

/// Tunables for one crawl session.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Year the age computation is anchored to.
    pub reference_year: i32,
    /// Ids per bulk profile request, capped by the remote API at 1000.
    pub bulk_chunk_size: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        use chrono::Datelike;
        Self {
            reference_year: chrono::Utc::now().year(),
            bulk_chunk_size: MAX_USERS_PER_QUERY,
        }
    }
}

/// BFS crawl driver over a [`RemoteApi`].
pub struct Crawler<A> {
    api: A,
    fetcher: BatchFetcher,
    options: CrawlOptions,
}

impl<A: RemoteApi> Crawler<A> {
    pub fn new(api: A, fetcher: BatchFetcher, options: CrawlOptions) -> Self {
        Self {
            api,
            fetcher,
            options,
        }
    }

    /// Crawl outward from `roots`, visiting users up to `depth` hops away.
    ///
    /// Roots are resolved with one chunked bulk lookup and enter at layer
    /// 0; each hop fetches the friend list and group subscriptions of the
    /// current frontier concurrently. A node's layer is the hop at which
    /// it was first discovered. Per-node fetch failures degrade to "no
    /// friends, no subscriptions" for that node, so a layer always
    /// completes. Subscriptions of the final frontier are not collected:
    /// nodes at `layer == depth` are discovered but never expanded.
    pub async fn crawl(&self, roots: &[UserId], depth: u32) -> Community {
        let mut community = Community::new();

        log::info!("resolving {} roots", roots.len());
        let root_profiles = self.load_profiles(roots.to_vec()).await;

        let mut visited: BTreeSet<UserId> = BTreeSet::new();
        let mut frontier: BTreeSet<UserId> = BTreeSet::new();

        for profile in &root_profiles {
            if profile.is_deactivated() {
                log::debug!("root {} is deactivated, skipping", profile.id);
                continue;
            }
            let id = self.apply_user(&mut community, profile);
            community.set_user_attribute(id, LAYER_ATTRIBUTE, Value::from(0u32));
            frontier.insert(id);
        }

        for hop in 1..=depth {
            if frontier.is_empty() {
                log::info!("frontier exhausted before layer {hop}, stopping early");
                break;
            }

            log::info!("layer {hop} of {depth}: fetching {} nodes", frontier.len());

            let queue: Vec<UserId> = frontier.iter().copied().collect();
            let nodes = self
                .fetcher
                .fetch_all(queue.clone(), |id| self.api.get_enriched_node(id))
                .await;

            let mut discovered: BTreeSet<UserId> = BTreeSet::new();
            for (uid, node) in queue.iter().copied().zip(nodes) {
                for raw_friend in node.friends() {
                    if raw_friend.is_deactivated() {
                        continue;
                    }
                    let fid = self.apply_user(&mut community, raw_friend);
                    community.add_friendship(uid, fid);
                    discovered.insert(fid);
                }

                for raw_group in node.groups() {
                    let (gid, record) = parse_group(raw_group);
                    community.insert_group(gid, record);
                    community.add_membership(gid, uid);
                }
            }

            visited.append(&mut frontier);

            // First discovery wins: anyone already visited keeps the layer
            // they were found at and is never re-expanded.
            frontier = discovered.difference(&visited).copied().collect();
            for &id in &frontier {
                community.set_user_attribute(id, LAYER_ATTRIBUTE, Value::from(hop));
            }
        }

        log::info!(
            "crawl done: {} users, {} groups, {} directed friend entries",
            community.user_count(),
            community.group_count(),
            community.edge_count()
        );

        community
    }

    /// Crawl the members of one group: fetch the member list, run a
    /// depth-1 crawl over it, and keep only the members themselves (their
    /// mutual friendships and subscriptions survive the filter).
    pub async fn crawl_group(&self, group_id: GroupId) -> Community {
        log::info!("loading member list of group {group_id}");

        let members = match self.api.get_group_members(group_id).await {
            Ok(members) => members,
            Err(e) => {
                log::warn!("member list of group {group_id} failed: {e}");
                GroupMembers::default()
            }
        };

        let ids: Vec<UserId> = members
            .items
            .iter()
            .filter(|profile| !profile.is_deactivated())
            .map(|profile| profile.id)
            .collect();

        let community = self.crawl(&ids, 1).await;
        community.filter_users(|user| user.layer().is_some_and(|layer| layer < 1))
    }

    /// Bulk-fetch profiles, chunked to the remote batch limit. A failed
    /// chunk contributes no profiles.
    async fn load_profiles(&self, ids: Vec<UserId>) -> Vec<RawProfile> {
        self.fetcher
            .fetch_chunked(ids, self.options.bulk_chunk_size, |chunk| async move {
                self.api.bulk_get_users(&chunk, USER_FIELDS).await
            })
            .await
    }

    /// Normalize a profile into the store, registering any city or
    /// university it references.
    fn apply_user(&self, community: &mut Community, entry: &RawProfile) -> UserId {
        let ParsedUser {
            id,
            record,
            city,
            university,
        } = parse_user(entry, self.options.reference_year);

        if let Some((city_id, name)) = city {
            community.register_city(city_id, name);
        }
        if let Some((university_id, name)) = university {
            community.register_university(university_id, name);
        }
        community.insert_user(id, record);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, EnrichedNode, RawGroup};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory remote API with scripted friend lists and failures.
    #[derive(Default)]
    struct MockApi {
        profiles: HashMap<UserId, RawProfile>,
        friends: HashMap<UserId, Vec<UserId>>,
        groups: HashMap<UserId, Vec<RawGroup>>,
        group_members: HashMap<GroupId, Vec<UserId>>,
        failing_nodes: Vec<UserId>,
        bulk_calls: Mutex<usize>,
        enriched_calls: Mutex<Vec<UserId>>,
    }

    impl MockApi {
        fn with_user(mut self, id: UserId, name: &str) -> Self {
            self.profiles.insert(
                id,
                RawProfile {
                    id,
                    first_name: name.to_string(),
                    last_name: "Test".to_string(),
                    ..Default::default()
                },
            );
            self
        }

        fn with_deactivated_user(mut self, id: UserId) -> Self {
            self.profiles.insert(
                id,
                RawProfile {
                    id,
                    deactivated: Some("deleted".to_string()),
                    ..Default::default()
                },
            );
            self
        }

        fn with_friends(mut self, id: UserId, friends: &[UserId]) -> Self {
            self.friends.insert(id, friends.to_vec());
            self
        }

        fn with_groups(mut self, id: UserId, groups: &[(GroupId, &str)]) -> Self {
            self.groups.insert(
                id,
                groups
                    .iter()
                    .map(|&(gid, name)| RawGroup {
                        id: gid,
                        name: name.to_string(),
                    })
                    .collect(),
            );
            self
        }

        fn with_failing_node(mut self, id: UserId) -> Self {
            self.failing_nodes.push(id);
            self
        }

        fn enriched_calls(&self) -> Vec<UserId> {
            self.enriched_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteApi for MockApi {
        async fn bulk_get_users(
            &self,
            ids: &[UserId],
            _fields: &str,
        ) -> Result<Vec<RawProfile>, ApiError> {
            *self.bulk_calls.lock().unwrap() += 1;
            Ok(ids
                .iter()
                .filter_map(|id| self.profiles.get(id).cloned())
                .collect())
        }

        async fn get_enriched_node(&self, id: UserId) -> Result<EnrichedNode, ApiError> {
            self.enriched_calls.lock().unwrap().push(id);
            if self.failing_nodes.contains(&id) {
                return Err(ApiError::Api {
                    code: 500,
                    message: "scripted failure".to_string(),
                });
            }
            Ok(EnrichedNode {
                friends: Some(
                    self.friends
                        .get(&id)
                        .map(|ids| {
                            ids.iter()
                                .filter_map(|fid| self.profiles.get(fid).cloned())
                                .collect()
                        })
                        .unwrap_or_default(),
                ),
                groups: Some(self.groups.get(&id).cloned().unwrap_or_default()),
            })
        }

        async fn get_group_members(&self, id: GroupId) -> Result<GroupMembers, ApiError> {
            let items = self
                .group_members
                .get(&id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|uid| self.profiles.get(uid).cloned())
                        .collect()
                })
                .unwrap_or_default();
            Ok(GroupMembers { items })
        }
    }

    fn crawler(api: MockApi) -> Crawler<MockApi> {
        Crawler::new(
            api,
            BatchFetcher::new(4, Duration::from_secs(5)),
            CrawlOptions {
                reference_year: 2015,
                bulk_chunk_size: MAX_USERS_PER_QUERY,
            },
        )
    }

    /// Roots {A}, depth 2, A-{B, C}, B-{D}: layers A:0 B:1 C:1 D:2, six
    /// directed entries, and D itself is never expanded.
    #[tokio::test]
    async fn test_bfs_layers_and_edges() {
        let api = MockApi::default()
            .with_user(1, "A")
            .with_user(2, "B")
            .with_user(3, "C")
            .with_user(4, "D")
            .with_friends(1, &[2, 3])
            .with_friends(2, &[1, 4])
            .with_friends(3, &[1])
            .with_friends(4, &[2]);

        let crawler = crawler(api);
        let community = crawler.crawl(&[1], 2).await;

        let layers: BTreeMap<UserId, u32> = community
            .users()
            .map(|u| (u.id(), u.layer().unwrap()))
            .collect();
        assert_eq!(layers, BTreeMap::from([(1, 0), (2, 1), (3, 1), (4, 2)]));

        let mut edges: Vec<(UserId, UserId)> =
            community.edges().map(|(u, v)| (u.id(), v.id())).collect();
        edges.sort_unstable();
        assert_eq!(
            edges,
            vec![(1, 2), (1, 3), (2, 1), (2, 4), (3, 1), (4, 2)]
        );

        // The final frontier was discovered but not expanded.
        let calls = crawler.api.enriched_calls();
        assert!(calls.contains(&1) && calls.contains(&2) && calls.contains(&3));
        assert!(!calls.contains(&4));

        assert!(community.validate().is_ok());
    }

    #[tokio::test]
    async fn test_layer_is_first_discovery() {
        // C is a friend of both A (hop 1) and B (hop 2 path); first wins.
        let api = MockApi::default()
            .with_user(1, "A")
            .with_user(2, "B")
            .with_user(3, "C")
            .with_friends(1, &[2, 3])
            .with_friends(2, &[3])
            .with_friends(3, &[]);

        let community = crawler(api).crawl(&[1], 3).await;
        assert_eq!(community.get_user(3).unwrap().layer(), Some(1));
    }

    #[tokio::test]
    async fn test_deactivated_users_never_appear() {
        let api = MockApi::default()
            .with_user(1, "A")
            .with_deactivated_user(2)
            .with_user(3, "C")
            .with_deactivated_user(4)
            .with_friends(1, &[2, 3]);

        // Root 4 is deactivated; friend 2 is deactivated.
        let community = crawler(api).crawl(&[1, 4], 2).await;

        assert!(community.get_user(2).is_none());
        assert!(community.get_user(4).is_none());
        assert!(community
            .edges()
            .all(|(u, v)| u.id() != 2 && v.id() != 2 && u.id() != 4 && v.id() != 4));
    }

    #[tokio::test]
    async fn test_failed_node_fetch_degrades_to_empty() {
        let api = MockApi::default()
            .with_user(1, "A")
            .with_user(2, "B")
            .with_user(3, "C")
            .with_user(4, "D")
            .with_friends(1, &[2, 3])
            .with_friends(2, &[4])
            .with_friends(3, &[])
            .with_failing_node(2);

        let community = crawler(api).crawl(&[1], 2).await;

        // B stays a node at layer 1, but its friends were never seen.
        assert_eq!(community.get_user(2).unwrap().layer(), Some(1));
        assert!(community.get_user(4).is_none());
        // The layer still completed: C was expanded normally.
        assert_eq!(community.get_user(3).unwrap().layer(), Some(1));
    }

    #[tokio::test]
    async fn test_final_frontier_subscriptions_not_collected() {
        let api = MockApi::default()
            .with_user(1, "A")
            .with_user(2, "B")
            .with_friends(1, &[2])
            .with_friends(2, &[1])
            .with_groups(1, &[(100, "chess")])
            .with_groups(2, &[(200, "hiking")]);

        let community = crawler(api).crawl(&[1], 1).await;

        // A (expanded) has its subscription; B sits on the final frontier.
        assert!(community.get_user(1).unwrap().groups().any(|g| g.id() == 100));
        assert_eq!(community.get_user(2).unwrap().groups().count(), 0);
        assert!(community.get_group(200).is_none());
    }

    #[tokio::test]
    async fn test_root_with_no_friends() {
        let api = MockApi::default().with_user(1, "Loner");
        let community = crawler(api).crawl(&[1], 2).await;

        assert_eq!(community.user_count(), 1);
        assert_eq!(community.edge_count(), 0);
        assert_eq!(community.get_user(1).unwrap().layer(), Some(0));
    }

    #[tokio::test]
    async fn test_depth_zero_resolves_roots_only() {
        let api = MockApi::default()
            .with_user(1, "A")
            .with_user(2, "B")
            .with_friends(1, &[2]);

        let crawler = crawler(api);
        let community = crawler.crawl(&[1], 0).await;

        assert_eq!(community.user_count(), 1);
        assert!(crawler.api.enriched_calls().is_empty());
    }

    #[tokio::test]
    async fn test_roots_are_chunked_for_bulk_lookup() {
        let mut api = MockApi::default();
        for id in 1..=5 {
            api = api.with_user(id, "U");
        }
        let crawler = Crawler::new(
            api,
            BatchFetcher::new(4, Duration::from_secs(5)),
            CrawlOptions {
                reference_year: 2015,
                bulk_chunk_size: 2,
            },
        );

        let community = crawler.crawl(&[1, 2, 3, 4, 5], 0).await;
        assert_eq!(community.user_count(), 5);
        assert_eq!(*crawler.api.bulk_calls.lock().unwrap(), 3); // 2 + 2 + 1
    }

    #[tokio::test]
    async fn test_crawl_group_keeps_members_only() {
        let api = MockApi::default()
            .with_user(1, "A")
            .with_user(2, "B")
            .with_user(9, "Outsider")
            .with_friends(1, &[2, 9])
            .with_friends(2, &[1])
            .with_groups(1, &[(55, "the group")]);
        let api = {
            let mut api = api;
            api.group_members.insert(55, vec![1, 2]);
            api
        };

        let community = crawler(api).crawl_group(55).await;

        assert_eq!(community.user_count(), 2);
        assert!(community.get_user(9).is_none());
        let mut edges: Vec<_> = community.edges().map(|(u, v)| (u.id(), v.id())).collect();
        edges.sort_unstable();
        assert_eq!(edges, vec![(1, 2), (2, 1)]);
        assert!(community.get_group(55).is_some());
    }
}
