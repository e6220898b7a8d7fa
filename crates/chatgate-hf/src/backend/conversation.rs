//! Stateful conversational backend.
//!
//! Every request negotiates a fresh session, then posts the decomposed
//! prompt to it. The system preamble travels with conversation creation; the
//! remaining turns are flattened into the message input.

use std::sync::Arc;

use async_trait::async_trait;
use chatgate_core::{
    ByteStream, ChatBackend, ChunkStream, ComposedPrompt, GatewayResult, GenerationParams,
    Message, ModelSpec, PromptComposer,
};

use crate::config::GatewayConfig;
use crate::http::HttpTransport;
use crate::normalize::{ConversationDecoder, normalize};
use crate::session::SessionNegotiator;

/// Serves one model over the conversational chat API.
pub struct ConversationBackend {
    spec: ModelSpec,
    composer: PromptComposer,
    negotiator: SessionNegotiator,
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for ConversationBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationBackend")
            .field("model", &self.spec.id)
            .field("negotiator", &self.negotiator)
            .finish_non_exhaustive()
    }
}

impl ConversationBackend {
    pub fn new(
        spec: ModelSpec,
        config: &GatewayConfig,
        transport: Arc<dyn HttpTransport>,
        composer: PromptComposer,
    ) -> Self {
        Self {
            spec,
            composer,
            negotiator: SessionNegotiator::new(transport.clone(), config),
            transport,
        }
    }
}

#[async_trait]
impl ChatBackend for ConversationBackend {
    fn model(&self) -> &ModelSpec {
        &self.spec
    }

    fn compose_prompt(&self, messages: &[Message]) -> GatewayResult<ComposedPrompt> {
        self.composer.decompose(messages)
    }

    async fn dispatch(
        &self,
        prompt: &ComposedPrompt,
        _params: &GenerationParams,
        credential: Option<&str>,
    ) -> GatewayResult<ByteStream> {
        if credential.is_some() {
            tracing::debug!(
                model = %self.spec.id,
                "Conversational backend ignores upstream credentials"
            );
        }

        let preamble = prompt.preamble.as_deref().unwrap_or_default();
        let session = self.negotiator.negotiate(&self.spec, preamble).await?;
        let request = self.negotiator.completion_request(&session, &prompt.text);

        tracing::info!(
            model = %self.spec.id,
            conversation_id = %session.conversation_id,
            "Dispatching conversation message"
        );
        Ok(self.transport.open_stream(request).await?)
    }

    fn normalize_response(&self, body: ByteStream) -> ChunkStream {
        normalize(body, ConversationDecoder::new())
    }

    /// Increments are relayed verbatim; the stop marker is never stripped.
    fn stop_sequence(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{FakeReply, FakeTransport};
    use crate::normalize::aggregate;
    use crate::session::SESSION_COOKIE;
    use chatgate_core::{GatewayError, HandshakeStep, builtin_models};
    use serde_json::json;

    const MESSAGE_ID: &str = "6f1c2b7e-1a2b-4c3d-8e9f-0123456789ab";

    fn llama3() -> ModelSpec {
        builtin_models()
            .into_iter()
            .find(|m| m.id == "llama3-70b")
            .unwrap()
    }

    fn handshake() -> FakeTransport {
        FakeTransport::new()
            .with_reply(
                "/settings",
                FakeReply::json_with_cookie(json!({}), SESSION_COOKIE, "tok"),
            )
            .with_reply("/conversation", FakeReply::json(json!({"conversationId": "conv-7"})))
            .with_reply(
                "/__data.json",
                FakeReply::json(json!({"nodes": [{}, {"data": [MESSAGE_ID]}]})),
            )
    }

    fn backend(transport: Arc<FakeTransport>) -> ConversationBackend {
        let config = GatewayConfig::new().with_chat_base_url("https://chat.test/chat");
        ConversationBackend::new(llama3(), &config, transport, PromptComposer::default())
    }

    #[test]
    fn test_answer_text_is_never_stripped() {
        let spec = builtin_models()
            .into_iter()
            .find(|m| m.id == "command-r-plus")
            .unwrap();
        assert!(spec.stop_sequence.is_some());
        let config = GatewayConfig::new();
        let backend = ConversationBackend::new(
            spec,
            &config,
            Arc::new(FakeTransport::new()),
            PromptComposer::default(),
        );
        assert_eq!(backend.stop_sequence(), None);
    }

    #[test]
    fn test_compose_prompt_splits_preamble() {
        let backend = backend(Arc::new(FakeTransport::new()));
        let prompt = backend
            .compose_prompt(&[Message::system("Be brief."), Message::user("Hi")])
            .unwrap();
        assert_eq!(prompt.preamble.as_deref(), Some("Be brief."));
        assert_eq!(prompt.text, "user: Hi\n\nassistant: ");
    }

    #[tokio::test]
    async fn test_dispatch_negotiates_then_posts_message() {
        let transport = Arc::new(handshake().with_reply(
            "/conversation/conv-7",
            FakeReply::lines(&[
                r#"{"type":"status","status":"started"}"#,
                r#"{"type":"stream","token":"Hi"}"#,
                r#"{"type":"stream","token":" there"}"#,
                r#"{"type":"finalAnswer","text":"Hi there"}"#,
            ]),
        ));
        let backend = backend(transport.clone());
        let prompt = backend
            .compose_prompt(&[Message::system("Be brief."), Message::user("Hi")])
            .unwrap();

        let body = backend
            .dispatch(&prompt, &GenerationParams::default(), Some("hf_ignored"))
            .await
            .unwrap();
        let answer = aggregate(backend.normalize_response(body), None).await;
        assert_eq!(answer, "Hi there");

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[1].json.as_ref().unwrap()["preprompt"], "Be brief.");
        let completion = &requests[3];
        assert_eq!(completion.url, "https://chat.test/chat/conversation/conv-7");
        assert_eq!(completion.json.as_ref().unwrap()["id"], MESSAGE_ID);
        assert_eq!(
            completion.json.as_ref().unwrap()["inputs"],
            "user: Hi\n\nassistant: "
        );
        assert!(completion.header_value("authorization").is_none());
    }

    #[tokio::test]
    async fn test_handshake_failure_skips_completion() {
        let transport = Arc::new(
            FakeTransport::new()
                .with_reply("/settings", FakeReply::Status(429, "slow down".into())),
        );
        let backend = backend(transport.clone());
        let prompt = backend.compose_prompt(&[Message::user("Hi")]).unwrap();
        let err = backend
            .dispatch(&prompt, &GenerationParams::default(), None)
            .await
            .err().unwrap();
        assert!(matches!(
            err,
            GatewayError::Session { step: HandshakeStep::Settings, .. }
        ));
        assert_eq!(transport.requests().len(), 1);
    }
}
