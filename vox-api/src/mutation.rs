//! Remote mutation calls and their settle-all batch dispatch.
//!
//! The change-set planner emits [`Mutation`] values; [`dispatch_all`] runs a
//! batch concurrently and records every call's outcome independently. One
//! failure never cancels or rolls back siblings, and no ordering holds
//! between independent mutations — callers needing causality (the publish →
//! phone-rebind sequence) dispatch two batches.

use std::fmt;

use serde_json::Value;

use crate::client::ApiClient;
use crate::error::ApiError;

/// One remote mutation call.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    UpdateVoiceAgent { id: String, payload: Value },
    UpdateChatAgent { id: String, payload: Value },
    UpdateLlm { id: String, payload: Value },
    UpdateConversationFlow { id: String, payload: Value },
    UpdateComponent { id: String, payload: Value },
    UpdateTestCase { id: String, payload: Value },
    PublishVoiceAgent { id: String },
    PublishChatAgent { id: String },
    RebindPhoneNumber { phone_number: String, payload: Value },
}

impl Mutation {
    /// The id or number the call targets.
    pub fn target(&self) -> &str {
        match self {
            Mutation::UpdateVoiceAgent { id, .. }
            | Mutation::UpdateChatAgent { id, .. }
            | Mutation::UpdateLlm { id, .. }
            | Mutation::UpdateConversationFlow { id, .. }
            | Mutation::UpdateComponent { id, .. }
            | Mutation::UpdateTestCase { id, .. }
            | Mutation::PublishVoiceAgent { id }
            | Mutation::PublishChatAgent { id } => id,
            Mutation::RebindPhoneNumber { phone_number, .. } => phone_number,
        }
    }

    async fn dispatch(&self, client: &ApiClient) -> Result<(), ApiError> {
        match self {
            Mutation::UpdateVoiceAgent { id, payload } => {
                client.update_voice_agent(id, payload).await
            }
            Mutation::UpdateChatAgent { id, payload } => {
                client.update_chat_agent(id, payload).await
            }
            Mutation::UpdateLlm { id, payload } => client.update_llm(id, payload).await,
            Mutation::UpdateConversationFlow { id, payload } => {
                client.update_conversation_flow(id, payload).await
            }
            Mutation::UpdateComponent { id, payload } => {
                client.update_component(id, payload).await
            }
            Mutation::UpdateTestCase { id, payload } => client.update_test_case(id, payload).await,
            Mutation::PublishVoiceAgent { id } => client.publish_voice_agent(id).await,
            Mutation::PublishChatAgent { id } => client.publish_chat_agent(id).await,
            Mutation::RebindPhoneNumber {
                phone_number,
                payload,
            } => client.update_phone_number(phone_number, payload).await,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Mutation::UpdateVoiceAgent { .. } => "update voice agent",
            Mutation::UpdateChatAgent { .. } => "update chat agent",
            Mutation::UpdateLlm { .. } => "update llm",
            Mutation::UpdateConversationFlow { .. } => "update conversation flow",
            Mutation::UpdateComponent { .. } => "update component",
            Mutation::UpdateTestCase { .. } => "update test case",
            Mutation::PublishVoiceAgent { .. } => "publish voice agent",
            Mutation::PublishChatAgent { .. } => "publish chat agent",
            Mutation::RebindPhoneNumber { .. } => "rebind phone number",
        };
        write!(f, "{verb} {}", self.target())
    }
}

/// One mutation's settled outcome.
#[derive(Debug)]
pub struct MutationOutcome {
    pub mutation: Mutation,
    pub result: Result<(), ApiError>,
}

impl MutationOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Dispatch a batch concurrently and wait for every call to settle.
/// Outcomes come back in input order.
pub async fn dispatch_all(client: &ApiClient, mutations: Vec<Mutation>) -> Vec<MutationOutcome> {
    let calls = mutations.into_iter().map(|mutation| async move {
        let result = mutation.dispatch(client).await;
        if let Err(err) = &result {
            tracing::warn!("{mutation} failed: {err}");
        }
        MutationOutcome { mutation, result }
    });
    futures::future::join_all(calls).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_names_the_call_and_target() {
        let m = Mutation::UpdateLlm {
            id: "llm_1".into(),
            payload: json!({}),
        };
        assert_eq!(m.to_string(), "update llm llm_1");
        let p = Mutation::PublishVoiceAgent { id: "agent_9".into() };
        assert_eq!(p.to_string(), "publish voice agent agent_9");
    }
}
