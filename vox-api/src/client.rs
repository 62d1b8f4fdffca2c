//! Thin async client for the agent-configuration REST API.
//!
//! Listings are cursored: every page request carries `limit`, and the
//! cursor (`pagination_key`, `pagination_key_version`) is derived from the
//! last item of the previous page. Fetching stops when a page comes back
//! shorter than the requested size. Updates are PATCH calls with a partial
//! mutable-field payload and no response body; publishes are bare POSTs.

use serde::de::DeserializeOwned;
use serde_json::Value;

use vox_core::raw::{
    RawChatAgent, RawComponent, RawConversationFlow, RawLlm, RawPhoneNumber, RawVoiceAgent,
    Versioned,
};
use vox_core::ResourceKind;

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One connection to the remote API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: usize,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    pub async fn list_voice_agents(&self) -> Result<Vec<RawVoiceAgent>, ApiError> {
        self.list_paginated("list-agents", ResourceKind::VoiceAgent)
            .await
    }

    pub async fn list_chat_agents(&self) -> Result<Vec<RawChatAgent>, ApiError> {
        self.list_paginated("list-chat-agents", ResourceKind::ChatAgent)
            .await
    }

    pub async fn list_llms(&self) -> Result<Vec<RawLlm>, ApiError> {
        self.list_paginated("list-retell-llms", ResourceKind::Llm)
            .await
    }

    pub async fn list_conversation_flows(&self) -> Result<Vec<RawConversationFlow>, ApiError> {
        self.list_paginated("list-conversation-flows", ResourceKind::ConversationFlow)
            .await
    }

    pub async fn list_components(&self) -> Result<Vec<RawComponent>, ApiError> {
        self.list_paginated("list-components", ResourceKind::Component)
            .await
    }

    /// Phone numbers are unversioned and few; one unpaginated fetch.
    pub async fn list_phone_numbers(&self) -> Result<Vec<RawPhoneNumber>, ApiError> {
        let value = self.get_json("list-phone-numbers", &[]).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode {
            kind: ResourceKind::PhoneNumber,
            source: e,
        })
    }

    /// One agent's test cases, as raw values so the canonicalizer can skip
    /// malformed entries individually instead of failing the batch.
    pub async fn list_agent_test_cases(&self, agent_id: &str) -> Result<Vec<Value>, ApiError> {
        let endpoint = format!("list-agent-test-cases/{agent_id}");
        let value = self.get_json(&endpoint, &[]).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode {
            kind: ResourceKind::TestCase,
            source: e,
        })
    }

    async fn list_paginated<T>(&self, endpoint: &str, kind: ResourceKind) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned + Versioned,
    {
        let mut items: Vec<T> = Vec::new();
        let mut cursor: Option<(String, u64)> = None;
        loop {
            let mut query = vec![("limit".to_string(), self.page_size.to_string())];
            if let Some((key, version)) = &cursor {
                query.push(("pagination_key".to_string(), key.clone()));
                query.push(("pagination_key_version".to_string(), version.to_string()));
            }

            let value = self.get_json(endpoint, &query).await?;
            let page: Vec<T> = serde_json::from_value(value)
                .map_err(|e| ApiError::Decode { kind, source: e })?;

            let full_page = page.len() >= self.page_size;
            if let Some(last) = page.last() {
                cursor = Some((last.id().to_string(), last.version()));
            }
            items.extend(page);
            if !full_page {
                break;
            }
        }
        tracing::debug!("listed {} {kind} entries via {endpoint}", items.len());
        Ok(items)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub async fn update_voice_agent(&self, id: &str, payload: &Value) -> Result<(), ApiError> {
        self.patch(&format!("update-agent/{id}"), payload).await
    }

    pub async fn update_chat_agent(&self, id: &str, payload: &Value) -> Result<(), ApiError> {
        self.patch(&format!("update-chat-agent/{id}"), payload).await
    }

    pub async fn update_llm(&self, id: &str, payload: &Value) -> Result<(), ApiError> {
        self.patch(&format!("update-retell-llm/{id}"), payload).await
    }

    pub async fn update_conversation_flow(&self, id: &str, payload: &Value) -> Result<(), ApiError> {
        self.patch(&format!("update-conversation-flow/{id}"), payload)
            .await
    }

    pub async fn update_component(&self, id: &str, payload: &Value) -> Result<(), ApiError> {
        self.patch(&format!("update-component/{id}"), payload).await
    }

    pub async fn update_test_case(&self, id: &str, payload: &Value) -> Result<(), ApiError> {
        self.patch(&format!("update-test-case/{id}"), payload).await
    }

    pub async fn update_phone_number(&self, number: &str, payload: &Value) -> Result<(), ApiError> {
        self.patch(&format!("update-phone-number/{number}"), payload)
            .await
    }

    pub async fn publish_voice_agent(&self, id: &str) -> Result<(), ApiError> {
        self.post_empty(&format!("publish-agent/{id}")).await
    }

    pub async fn publish_chat_agent(&self, id: &str) -> Result<(), ApiError> {
        self.post_empty(&format!("publish-chat-agent/{id}")).await
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn get_json(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let response = self
            .http
            .get(self.url(endpoint))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| http_err(endpoint, e))?;
        let response = check_status(endpoint, response)?;
        response.json().await.map_err(|e| http_err(endpoint, e))
    }

    async fn patch(&self, endpoint: &str, payload: &Value) -> Result<(), ApiError> {
        let response = self
            .http
            .patch(self.url(endpoint))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| http_err(endpoint, e))?;
        check_status(endpoint, response)?;
        Ok(())
    }

    async fn post_empty(&self, endpoint: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url(endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| http_err(endpoint, e))?;
        check_status(endpoint, response)?;
        Ok(())
    }
}

fn http_err(endpoint: &str, source: reqwest::Error) -> ApiError {
    ApiError::Http {
        endpoint: endpoint.to_string(),
        source,
    }
}

fn check_status(endpoint: &str, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}
