use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::api::{
    ApiError, EnrichedNode, GroupId, GroupMembers, RawProfile, RemoteApi, UserId,
};

/// Response envelope used by VK-compatible services: exactly one of
/// `response` or `error` is present.
#[derive(Deserialize)]
struct Envelope<T> {
    response: Option<T>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error_code: i64,
    error_msg: String,
}

/// Thin HTTP client for a VK-compatible REST API.
///
/// Speaks `GET {base}/method/{name}` with the access token and API version
/// as query parameters. No session or rate-limit handling; transport
/// failures surface as [`ApiError`] and are absorbed per item by the
/// batch fetcher during crawls.
pub struct HttpApi {
    client: Client,
    base_url: Url,
    access_token: String,
    version: String,
}

impl HttpApi {
    /// Create a new API client.
    ///
    /// Fails if `base_url` is not a valid absolute URL or the HTTP client
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        access_token: String,
        version: String,
        timeout: Duration,
    ) -> std::result::Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Malformed(format!("invalid base URL {base_url}: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            access_token,
            version,
        })
    }

    /// Issue one API method call and unwrap the response envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, ApiError> {
        let url = self
            .base_url
            .join(&format!("method/{method}"))
            .map_err(|e| ApiError::Malformed(format!("invalid method path {method}: {e}")))?;

        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("v", self.version.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error response".to_string());
            return Err(ApiError::Transport(format!("{method}: HTTP {status}: {body}")));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Malformed(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(ApiError::Api {
                code: err.error_code,
                message: err.error_msg,
            });
        }

        envelope
            .response
            .ok_or_else(|| ApiError::Malformed(format!("{method}: envelope has neither response nor error")))
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn bulk_get_users(
        &self,
        ids: &[UserId],
        fields: &str,
    ) -> std::result::Result<Vec<RawProfile>, ApiError> {
        let user_ids = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        self.call(
            "users.get",
            &[("user_ids", user_ids), ("fields", fields.to_string())],
        )
        .await
    }

    async fn get_enriched_node(
        &self,
        id: UserId,
    ) -> std::result::Result<EnrichedNode, ApiError> {
        self.call("execute.getUserData", &[("user_id", id.to_string())])
            .await
    }

    async fn get_group_members(
        &self,
        id: GroupId,
    ) -> std::result::Result<GroupMembers, ApiError> {
        self.call("execute.getCommunityMembers", &[("group_id", id.to_string())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let api = HttpApi::new(
            "not a url",
            "token".to_string(),
            "5.131".to_string(),
            Duration::from_secs(30),
        );
        assert!(matches!(api, Err(ApiError::Malformed(_))));
    }

    #[test]
    fn test_envelope_error_parse() {
        let envelope: Envelope<Vec<RawProfile>> = serde_json::from_str(
            r#"{"error": {"error_code": 6, "error_msg": "Too many requests per second"}}"#,
        )
        .unwrap();
        assert!(envelope.response.is_none());
        let err = envelope.error.unwrap();
        assert_eq!(err.error_code, 6);
    }

    #[test]
    fn test_envelope_response_parse() {
        let envelope: Envelope<Vec<RawProfile>> =
            serde_json::from_str(r#"{"response": [{"id": 1}]}"#).unwrap();
        assert_eq!(envelope.response.unwrap().len(), 1);
        assert!(envelope.error.is_none());
    }
}
