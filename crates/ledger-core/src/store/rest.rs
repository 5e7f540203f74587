//! PostgREST-style HTTP document store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteConfig;
use crate::models::RemoteDocument;
use crate::util::compact_text;

/// Remote record collection exposed over a PostgREST-compatible HTTP API.
///
/// Documents are addressed by the composite key `(owner_id, id)`; upserts use
/// `on_conflict` with merge-duplicates so repeated pushes never create a
/// second document for the same id.
#[derive(Clone)]
pub struct RestRemoteStore {
    config: RemoteConfig,
    timeout: Duration,
    client: Client,
}

impl RestRemoteStore {
    /// Build a client for the configured collection.
    pub fn new(config: RemoteConfig, timeout: Duration) -> RemoteResult<Self> {
        config
            .validate()
            .map_err(|error| RemoteError::Api(format!("invalid remote configuration: {error}")))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            config,
            timeout,
            client,
        })
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.collection
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|error| self.classify_transport_error(error))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(classify_api_error(status, &body))
    }

    fn classify_transport_error(&self, error: reqwest::Error) -> RemoteError {
        if error.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else if error.is_connect() {
            RemoteError::Unreachable(error.to_string())
        } else {
            RemoteError::Http(error)
        }
    }

    async fn fetch(&self, request: RequestBuilder) -> RemoteResult<Vec<RemoteDocument>> {
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|error| self.classify_transport_error(error))?;
        serde_json::from_str(&body).map_err(|error| RemoteError::Decode(error.to_string()))
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn query_all(&self, owner_id: i64) -> RemoteResult<Vec<RemoteDocument>> {
        let request = self.client.get(self.collection_url()).query(&[
            ("owner_id", format!("eq.{owner_id}")),
            ("select", "*".to_string()),
        ]);
        self.fetch(request).await
    }

    async fn query_modified_since(
        &self,
        owner_id: i64,
        since: i64,
    ) -> RemoteResult<Vec<RemoteDocument>> {
        let request = self.client.get(self.collection_url()).query(&[
            ("owner_id", format!("eq.{owner_id}")),
            ("modified_at", format!("gte.{since}")),
            ("order", "modified_at.asc".to_string()),
            ("select", "*".to_string()),
        ]);
        self.fetch(request).await
    }

    async fn upsert(&self, owner_id: i64, id: i64, document: &RemoteDocument) -> RemoteResult<()> {
        let mut body = document.clone();
        body.owner_id = Some(owner_id);
        body.id = Some(id);

        let request = self
            .client
            .post(self.collection_url())
            .query(&[("on_conflict", "owner_id,id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, owner_id: i64, id: i64) -> RemoteResult<()> {
        let request = self.client.delete(self.collection_url()).query(&[
            ("owner_id", format!("eq.{owner_id}")),
            ("id", format!("eq.{id}")),
        ]);
        self.send(request).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    code: Option<String>,
    message: Option<String>,
    hint: Option<String>,
}

fn classify_api_error(status: StatusCode, body: &str) -> RemoteError {
    let parsed = serde_json::from_str::<RemoteErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|payload| payload.message.clone())
        .map_or_else(|| compact_text(body), |message| message.trim().to_string());

    let mentions_index = [
        Some(message.as_str()),
        parsed.as_ref().and_then(|payload| payload.hint.as_deref()),
        parsed.as_ref().and_then(|payload| payload.code.as_deref()),
    ]
    .into_iter()
    .flatten()
    .any(|text| {
        let text = text.to_ascii_lowercase();
        text.contains("requires an index") || text.contains("failed_precondition")
    });

    if status == StatusCode::PRECONDITION_FAILED || mentions_index {
        return RemoteError::IndexUnavailable(format!("{message} ({})", status.as_u16()));
    }

    if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
        return RemoteError::Unreachable(format!("HTTP {}", status.as_u16()));
    }

    if message.is_empty() {
        RemoteError::Api(format!("HTTP {}", status.as_u16()))
    } else {
        RemoteError::Api(format!("{message} ({})", status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RemoteConfig {
        RemoteConfig {
            base_url: "https://project.example.com/rest/v1/".to_string(),
            api_key: "anon".to_string(),
            collection: "records".to_string(),
        }
    }

    #[test]
    fn collection_url_trims_trailing_slash() {
        let store = RestRemoteStore::new(config(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            store.collection_url(),
            "https://project.example.com/rest/v1/records"
        );
    }

    #[test]
    fn new_rejects_invalid_configuration() {
        let mut invalid = config();
        invalid.base_url = "project.example.com".to_string();
        assert!(RestRemoteStore::new(invalid, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn precondition_failed_maps_to_index_unavailable() {
        let error = classify_api_error(StatusCode::PRECONDITION_FAILED, "");
        assert!(matches!(error, RemoteError::IndexUnavailable(_)));
    }

    #[test]
    fn index_message_maps_to_index_unavailable() {
        let body = r#"{"code":"FAILED_PRECONDITION","message":"The query requires an index"}"#;
        let error = classify_api_error(StatusCode::BAD_REQUEST, body);
        assert!(matches!(error, RemoteError::IndexUnavailable(_)));
    }

    #[test]
    fn api_error_prefers_message_field() {
        let body = r#"{"message":"permission denied for table records"}"#;
        let error = classify_api_error(StatusCode::FORBIDDEN, body);
        assert_eq!(
            error.to_string(),
            "Remote API error: permission denied for table records (403)"
        );
    }

    #[test]
    fn empty_body_reports_status() {
        let error = classify_api_error(StatusCode::INTERNAL_SERVER_ERROR, "  ");
        assert_eq!(error.to_string(), "Remote API error: HTTP 500");
    }

    #[test]
    fn gateway_errors_count_as_connectivity() {
        let error = classify_api_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(error.is_connectivity());
    }
}
