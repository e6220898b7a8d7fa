//! Conversation session handshake.
//!
//! The conversational backend needs three dependent calls before it accepts a
//! completion: settings (session cookie), conversation creation, and
//! discovery of the last message id to anchor the new message on. They run
//! strictly in order, each with its own timeout and no retries. A session is
//! request-scoped and never reused.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chatgate_core::{GatewayError, GatewayResult, HandshakeStep, ModelSpec};
use regex::Regex;
use serde_json::{Value, json};

use crate::config::GatewayConfig;
use crate::http::{HttpTransport, UpstreamRequest, UpstreamResponse};
use crate::proof::{ProofChallenge, ProofSolver, ProofToken};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "hf-chat";
/// Header carrying the proof-of-work token.
pub const PROOF_HEADER: &str = "sentinel-proof-token";

static MESSAGE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\da-f]{8}-[\da-f]{4}-[\da-f]{4}-[\da-f]{4}-[\da-f]{12}$")
        .expect("message id pattern is valid")
});

/// State established by a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_token: String,
    pub conversation_id: String,
    pub last_message_id: String,
    pub proof: Option<ProofToken>,
}

impl Session {
    /// Headers every post-settings call carries.
    fn headers(&self) -> Vec<(String, String)> {
        session_headers(&self.session_token, self.proof.as_ref())
    }
}

fn session_headers(token: &str, proof: Option<&ProofToken>) -> Vec<(String, String)> {
    let mut headers = vec![("Cookie".to_string(), format!("{SESSION_COOKIE}={token}"))];
    if let Some(proof) = proof {
        headers.push((PROOF_HEADER.to_string(), proof.as_str().to_string()));
    }
    headers
}

/// Pick the anchor message id out of a conversation data payload.
///
/// Scans the string elements of `nodes[1].data` in order; the last one
/// shaped like a UUID wins.
pub fn find_last_message_id(payload: &Value) -> Option<String> {
    payload
        .pointer("/nodes/1/data")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .rev()
        .find(|item| MESSAGE_ID.is_match(item))
        .map(str::to_string)
}

/// Runs the handshake against one chat API.
#[derive(Clone)]
pub struct SessionNegotiator {
    transport: Arc<dyn HttpTransport>,
    chat_base_url: String,
    timeout: Duration,
    user_agent: String,
    solver: ProofSolver,
}

impl std::fmt::Debug for SessionNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionNegotiator")
            .field("chat_base_url", &self.chat_base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SessionNegotiator {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &GatewayConfig) -> Self {
        Self {
            transport,
            chat_base_url: config.chat_base_url.trim_end_matches('/').to_string(),
            timeout: config.handshake_timeout,
            user_agent: config.user_agent.clone(),
            solver: ProofSolver::from_config(config),
        }
    }

    fn request(&self, url: String) -> UpstreamRequest {
        UpstreamRequest::post(url)
            .header("User-Agent", self.user_agent.as_str())
            .header("Referer", format!("{}/", self.chat_base_url))
            .timeout(self.timeout)
    }

    /// Run the three handshake steps in order.
    pub async fn negotiate(&self, spec: &ModelSpec, preamble: &str) -> GatewayResult<Session> {
        let (session_token, proof) = self.settings(spec).await?;
        let headers = session_headers(&session_token, proof.as_ref());
        let conversation_id = self.create_conversation(spec, preamble, &headers).await?;
        let last_message_id = self.last_message_id(&conversation_id, &headers).await?;

        Ok(Session {
            session_token,
            conversation_id,
            last_message_id,
            proof,
        })
    }

    async fn send(
        &self,
        step: HandshakeStep,
        request: UpstreamRequest,
    ) -> GatewayResult<UpstreamResponse> {
        self.transport.send(request).await.map_err(|e| {
            tracing::error!(step = %step, error = %e, "Handshake call failed");
            e.into_session(step)
        })
    }

    async fn settings(&self, spec: &ModelSpec) -> GatewayResult<(String, Option<ProofToken>)> {
        let step = HandshakeStep::Settings;
        let body = json!({
            "assistants": [],
            "customPrompts": {},
            "ethicsModalAccepted": true,
            "ethicsModalAcceptedAt": null,
            "hideEmojiOnSidebar": false,
            "shareConversationsWithModelAuthors": false,
            "activeModel": spec.upstream_id,
        });
        let url = format!("{}/settings", self.chat_base_url);
        let response = self.send(step, self.request(url).json(body)).await?;

        let Some(token) = response.cookie(SESSION_COOKIE).map(str::to_string) else {
            return Err(GatewayError::session(
                step,
                format!("no {SESSION_COOKIE} cookie in response (status {})", response.status),
            ));
        };
        tracing::info!(model = %spec.id, "Session token acquired");

        let challenge = response
            .json::<Value>()
            .ok()
            .and_then(|body| ProofChallenge::from_requirements(&body));
        let proof = match challenge {
            Some(challenge) => {
                let proof = self.solver.solve_blocking(&challenge).await;
                tracing::info!(
                    model = %spec.id,
                    solved = proof.is_solved(),
                    attempts = proof.attempts(),
                    "Proof-of-work computed"
                );
                Some(proof)
            }
            None => None,
        };
        Ok((token, proof))
    }

    async fn create_conversation(
        &self,
        spec: &ModelSpec,
        preamble: &str,
        headers: &[(String, String)],
    ) -> GatewayResult<String> {
        let step = HandshakeStep::Conversation;
        let url = format!("{}/conversation", self.chat_base_url);
        let mut request = self
            .request(url.clone())
            .json(json!({ "model": spec.upstream_id, "preprompt": preamble }));
        request.headers.extend_from_slice(headers);

        let response = self
            .send(step, request)
            .await?
            .error_for_status(&url)
            .map_err(|e| e.into_session(step))?;
        let body: Value = response.json().map_err(|e| e.into_session(step))?;
        let id = body
            .get("conversationId")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::session(step, "response has no conversationId"))?;

        tracing::info!(model = %spec.id, conversation_id = id, "Conversation created");
        Ok(id.to_string())
    }

    async fn last_message_id(
        &self,
        conversation_id: &str,
        headers: &[(String, String)],
    ) -> GatewayResult<String> {
        let step = HandshakeStep::LastMessageId;
        let url = format!(
            "{}/conversation/{conversation_id}/__data.json?x-sveltekit-invalidated=11",
            self.chat_base_url
        );
        let mut request = self.request(url.clone());
        request.headers.extend_from_slice(headers);

        let response = self
            .send(step, request)
            .await?
            .error_for_status(&url)
            .map_err(|e| e.into_session(step))?;
        let body: Value = response.json().map_err(|e| e.into_session(step))?;
        let id = find_last_message_id(&body)
            .ok_or_else(|| GatewayError::session(step, "no message id in conversation data"))?;

        tracing::info!(conversation_id, message_id = %id, "Anchor message found");
        Ok(id)
    }

    /// The completion call that follows a successful handshake.
    pub fn completion_request(&self, session: &Session, inputs: &str) -> UpstreamRequest {
        let url = format!("{}/conversation/{}", self.chat_base_url, session.conversation_id);
        let mut request = UpstreamRequest::post(url.clone())
            .header("User-Agent", self.user_agent.as_str())
            .header("Referer", url)
            .json(json!({
                "files": [],
                "id": session.last_message_id,
                "inputs": inputs,
                "is_continue": false,
                "is_retry": false,
                "web_search": false,
            }));
        request.headers.extend(session.headers());
        request
    }
}
