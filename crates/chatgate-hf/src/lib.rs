//! # chatgate-hf
//!
//! Upstream adapters of the chat gateway: the HuggingFace text-generation
//! inference API (stateless, one streamed POST per request) and the
//! HuggingChat conversation API (session handshake, optional proof-of-work,
//! then a streamed POST).
//!
//! [`ChatOrchestrator`] ties them together behind one `chat` call. All
//! upstream I/O goes through the [`HttpTransport`] port so the whole request
//! path can run against `http::testing::FakeTransport` (feature
//! `test-utils`).

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

mod backend;
mod config;
mod error;
pub mod http;
pub mod normalize;
mod orchestrator;
pub mod proof;
pub mod session;
pub mod template;

// ============================================================================
// Public API
// ============================================================================

// Configuration
pub use config::{BROWSER_USER_AGENT, GatewayConfig, mask_secret};

// Errors
pub use error::{TransportError, TransportResult};

// Transport
pub use http::{HttpTransport, ReqwestTransport, UpstreamRequest, UpstreamResponse};

// Backends
pub use backend::{ConversationBackend, InferenceBackend, build_backend, inference_url};

// Handshake and proof-of-work
pub use proof::{ProofChallenge, ProofSolver, ProofToken};
pub use session::{Session, SessionNegotiator, find_last_message_id};

// Templates
pub use template::{JinjaTemplateRenderer, PinnedTemplate};

// Orchestration
pub use orchestrator::{BackendRegistry, ChatOrchestrator, ChatOutcome, ChatRequest};
