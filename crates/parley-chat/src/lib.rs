//! Conversation engine for Parley.
//!
//! Holds per-session threaded message histories, routes each prompt to one of
//! two completion services by trigger phrase, and renders transcripts.

pub mod attachment;
pub mod error;
pub mod orchestrator;
pub mod render;
pub mod responder;
pub mod router;
pub mod store;
pub mod thread;
pub mod types;

pub use attachment::{AttachmentProcessor, Upload};
pub use error::{ChatError, ResponderError};
pub use orchestrator::ChatOrchestrator;
pub use render::render_transcript;
pub use responder::{
    AnthropicResponder, ChatCompletionsResponder, Responder, ResponderRequest,
};
pub use router::{Destination, RouteDecision, TriggerRouter};
pub use store::SessionStore;
pub use thread::{ThreadBook, ThreadSummary};
pub use types::{
    ChatSession, Notice, NoticeKind, SessionSummary, TurnOutcome, TurnRequest,
};
