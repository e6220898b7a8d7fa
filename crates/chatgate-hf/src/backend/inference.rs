//! Stateless text-generation-inference backend.

use std::sync::Arc;

use async_trait::async_trait;
use chatgate_core::{
    ByteStream, ChatBackend, ChunkStream, ComposedPrompt, GatewayError, GatewayResult,
    GenerationParams, Message, ModelSpec, PromptComposer,
};
use serde_json::{Map, Value, json};
use url::Url;

use crate::config::{GatewayConfig, mask_secret};
use crate::http::{HttpTransport, UpstreamRequest};
use crate::normalize::{InferenceDecoder, normalize};

/// Endpoint of one model: the base URL with the upstream id appended.
pub fn inference_url(base: &Url, upstream_id: &str) -> Url {
    let mut url = base.clone();
    let base_path = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base_path}/{upstream_id}"));
    url
}

/// Serves one model over the inference API.
pub struct InferenceBackend {
    spec: ModelSpec,
    composer: PromptComposer,
    transport: Arc<dyn HttpTransport>,
    endpoint: Url,
    default_token: Option<String>,
}

impl std::fmt::Debug for InferenceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceBackend")
            .field("model", &self.spec.id)
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl InferenceBackend {
    pub fn new(
        spec: ModelSpec,
        config: &GatewayConfig,
        transport: Arc<dyn HttpTransport>,
        composer: PromptComposer,
    ) -> GatewayResult<Self> {
        let base = Url::parse(&config.inference_base_url).map_err(|e| {
            GatewayError::Config(format!(
                "invalid inference base URL '{}': {e}",
                config.inference_base_url
            ))
        })?;
        let endpoint = inference_url(&base, &spec.upstream_id);
        Ok(Self {
            spec,
            composer,
            transport,
            endpoint,
            default_token: config.token.clone(),
        })
    }

    fn request_body(prompt: &ComposedPrompt, params: &GenerationParams) -> Value {
        let mut parameters = Map::new();
        parameters.insert("temperature".into(), json!(params.temperature));
        parameters.insert("top_p".into(), json!(params.top_p));
        if let Some(max_new_tokens) = params.max_new_tokens {
            parameters.insert("max_new_tokens".into(), json!(max_new_tokens));
        }
        parameters.insert("return_full_text".into(), json!(false));

        json!({
            "inputs": prompt.text,
            "parameters": parameters,
            "options": { "use_cache": params.use_cache },
            "stream": true,
        })
    }
}

#[async_trait]
impl ChatBackend for InferenceBackend {
    fn model(&self) -> &ModelSpec {
        &self.spec
    }

    fn compose_prompt(&self, messages: &[Message]) -> GatewayResult<ComposedPrompt> {
        Ok(ComposedPrompt::new(self.composer.merge(messages, &self.spec)?))
    }

    async fn dispatch(
        &self,
        prompt: &ComposedPrompt,
        params: &GenerationParams,
        credential: Option<&str>,
    ) -> GatewayResult<ByteStream> {
        let mut request = UpstreamRequest::post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .json(Self::request_body(prompt, params));

        match credential.or(self.default_token.as_deref()) {
            Some(token) => {
                tracing::debug!(
                    model = %self.spec.id,
                    token = %mask_secret(token),
                    "Using upstream credential"
                );
                request = request.header("Authorization", format!("Bearer {token}"));
            }
            None => tracing::debug!(model = %self.spec.id, "Calling inference API anonymously"),
        }

        tracing::info!(
            model = %self.spec.id,
            upstream = %self.spec.upstream_id,
            max_new_tokens = ?params.max_new_tokens,
            "Dispatching inference request"
        );
        Ok(self.transport.open_stream(request).await?)
    }

    fn normalize_response(&self, body: ByteStream) -> ChunkStream {
        normalize(body, InferenceDecoder::new(self.spec.stop_sequence.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{FakeReply, FakeTransport};
    use chatgate_core::{CanonicalChunk, builtin_models};
    use futures_util::StreamExt;

    fn mixtral() -> ModelSpec {
        builtin_models()
            .into_iter()
            .find(|m| m.id == "mixtral-8x7b")
            .unwrap()
    }

    fn backend(transport: Arc<FakeTransport>, config: &GatewayConfig) -> InferenceBackend {
        InferenceBackend::new(mixtral(), config, transport, PromptComposer::default()).unwrap()
    }

    fn params() -> GenerationParams {
        GenerationParams {
            max_new_tokens: Some(512),
            ..GenerationParams::from_request(Some(0.5), None, None, false)
        }
    }

    #[test]
    fn test_inference_url_appends_upstream_id() {
        let base = Url::parse("https://api-inference.huggingface.co/models/").unwrap();
        assert_eq!(
            inference_url(&base, "mistralai/Mixtral-8x7B-Instruct-v0.1").as_str(),
            "https://api-inference.huggingface.co/models/mistralai/Mixtral-8x7B-Instruct-v0.1"
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let config = GatewayConfig::new().with_inference_base_url("not a url");
        let result = InferenceBackend::new(
            mixtral(),
            &config,
            Arc::new(FakeTransport::new()),
            PromptComposer::default(),
        );
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_compose_prompt_uses_model_family() {
        let backend = backend(Arc::new(FakeTransport::new()), &GatewayConfig::new());
        let prompt = backend.compose_prompt(&[Message::user("Hi")]).unwrap();
        assert_eq!(prompt.text, "[INST] Hi [/INST]");
        assert!(prompt.preamble.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_request_shape_and_credential() {
        let transport = Arc::new(FakeTransport::new().with_reply(
            "/Mixtral-8x7B-Instruct-v0.1",
            FakeReply::lines(&["data: {\"token\":{\"text\":\"ok\"}}"]),
        ));
        let config = GatewayConfig::new()
            .with_inference_base_url("http://tgi.test/models")
            .with_token("hf_default_token");
        let backend = backend(transport.clone(), &config);

        let prompt = ComposedPrompt::new("[INST] Hi [/INST]");
        backend.dispatch(&prompt, &params(), Some("hf_caller_token")).await.unwrap();
        backend.dispatch(&prompt, &params(), None).await.unwrap();

        let requests = transport.requests();
        assert_eq!(
            requests[0].url,
            "http://tgi.test/models/mistralai/Mixtral-8x7B-Instruct-v0.1"
        );
        assert_eq!(
            requests[0].header_value("authorization"),
            Some("Bearer hf_caller_token")
        );
        assert_eq!(
            requests[1].header_value("authorization"),
            Some("Bearer hf_default_token")
        );

        let body = requests[0].json.as_ref().unwrap();
        assert_eq!(body["inputs"], "[INST] Hi [/INST]");
        assert_eq!(body["stream"], true);
        assert_eq!(body["options"]["use_cache"], false);
        assert_eq!(body["parameters"]["max_new_tokens"], 512);
        assert_eq!(body["parameters"]["return_full_text"], false);
        assert!((body["parameters"]["temperature"].as_f64().unwrap() - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_anonymous_dispatch_has_no_authorization() {
        let transport = Arc::new(FakeTransport::new().with_reply(
            "/Mixtral-8x7B-Instruct-v0.1",
            FakeReply::lines(&[]),
        ));
        let backend = backend(transport.clone(), &GatewayConfig::new());
        backend
            .dispatch(&ComposedPrompt::new("x"), &params(), None)
            .await
            .unwrap();
        assert!(transport.requests()[0].header_value("authorization").is_none());
    }

    #[tokio::test]
    async fn test_upstream_status_becomes_upstream_error() {
        let transport = Arc::new(FakeTransport::new().with_reply(
            "/Mixtral-8x7B-Instruct-v0.1",
            FakeReply::Status(503, "Model is currently loading".into()),
        ));
        let backend = backend(transport, &GatewayConfig::new());
        let err = backend
            .dispatch(&ComposedPrompt::new("x"), &params(), None)
            .await
            .err().unwrap();
        match err {
            GatewayError::Upstream { status, message } => {
                assert_eq!(status, Some(503));
                assert!(message.contains("loading"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_normalize_response_stops_at_stop_sequence() {
        let transport = Arc::new(FakeTransport::new().with_reply(
            "/Mixtral-8x7B-Instruct-v0.1",
            FakeReply::lines(&[
                "data: {\"token\":{\"text\":\" Hello\"}}",
                "data: {\"token\":{\"text\":\"</s>\"}}",
            ]),
        ));
        let backend = backend(transport, &GatewayConfig::new());
        let body = backend
            .dispatch(&ComposedPrompt::new("x"), &params(), None)
            .await
            .unwrap();
        let chunks: Vec<_> = backend.normalize_response(body).collect().await;
        assert_eq!(
            chunks,
            vec![CanonicalChunk::completion("Hello"), CanonicalChunk::finished()]
        );
    }
}
