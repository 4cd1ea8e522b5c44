//! Remote social-network API surface.
//!
//! The crawler only depends on the [`RemoteApi`] trait; the bundled
//! [`HttpApi`] speaks the REST envelope of a VK-compatible service.
//! Authentication, session and rate-limit handling are out of scope;
//! callers supply a ready-to-use access token.

mod http;

pub use http::HttpApi;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Numeric entity ids as assigned by the remote service.
pub type UserId = u64;
pub type GroupId = u64;
pub type CityId = u64;
pub type UniversityId = u64;

/// Per-call remote API failure.
///
/// These are caught and absorbed by the batch fetcher during crawling;
/// they only surface to callers that talk to the API directly.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Raw profile record as returned by the remote service.
///
/// Parsed permissively: any field beyond the id may be missing or empty,
/// and the normalizer degrades those to defaults instead of failing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProfile {
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Present (e.g. "deleted", "banned") when the account is deactivated.
    #[serde(default)]
    pub deactivated: Option<String>,
    /// Birth date as "day.month.year"; year may be withheld by privacy settings.
    #[serde(default)]
    pub bdate: Option<String>,
    #[serde(default)]
    pub city: Option<RawCity>,
    #[serde(default)]
    pub universities: Option<Vec<RawUniversity>>,
    #[serde(default)]
    pub last_seen: Option<RawLastSeen>,
}

impl RawProfile {
    /// Accounts flagged deactivated never become graph nodes.
    pub fn is_deactivated(&self) -> bool {
        self.deactivated.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCity {
    pub id: CityId,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUniversity {
    pub id: UniversityId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLastSeen {
    /// Epoch seconds of the last activity.
    #[serde(default)]
    pub time: i64,
}

/// Raw group record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGroup {
    pub id: GroupId,
    #[serde(default)]
    pub name: String,
}

/// Combined friends + subscriptions payload for one user.
///
/// `Default` is the defined empty value substituted when the per-node
/// fetch fails: no friends, no subscriptions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrichedNode {
    #[serde(default)]
    pub friends: Option<Vec<RawProfile>>,
    #[serde(default)]
    pub groups: Option<Vec<RawGroup>>,
}

impl EnrichedNode {
    pub fn friends(&self) -> &[RawProfile] {
        self.friends.as_deref().unwrap_or(&[])
    }

    pub fn groups(&self) -> &[RawGroup] {
        self.groups.as_deref().unwrap_or(&[])
    }
}

/// Member-id list of a group, used by group-seeded crawls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupMembers {
    #[serde(default)]
    pub items: Vec<RawProfile>,
}

/// Remote API operations the crawler depends on.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch full profiles for a batch of user ids.
    ///
    /// Callers chunk the id list to the service's batch limit before
    /// invoking this; one call maps to one remote request.
    async fn bulk_get_users(
        &self,
        ids: &[UserId],
        fields: &str,
    ) -> std::result::Result<Vec<RawProfile>, ApiError>;

    /// Fetch one user's friend list and group subscriptions.
    async fn get_enriched_node(&self, id: UserId)
        -> std::result::Result<EnrichedNode, ApiError>;

    /// Fetch the member profiles of a group.
    async fn get_group_members(
        &self,
        id: GroupId,
    ) -> std::result::Result<GroupMembers, ApiError>;
}
