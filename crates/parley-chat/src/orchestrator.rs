//! Chat orchestrator: owns the sessions and runs one turn end to end.
//!
//! A turn validates the input, appends the user message, routes the prompt,
//! calls one responder and appends its reply. The session lock is released
//! for the duration of the outbound call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use parley_core::config::{ChatConfig, ParleyConfig};
use parley_core::types::{Attachment, Message, Role};

use crate::attachment::AttachmentProcessor;
use crate::error::ChatError;
use crate::render::render_transcript;
use crate::responder::{Responder, ResponderRequest};
use crate::router::{Destination, RouteDecision, TriggerRouter};
use crate::thread::ThreadSummary;
use crate::types::{ChatSession, Notice, SessionSummary, TurnOutcome, TurnRequest};

/// Central coordinator shared by every input surface.
pub struct ChatOrchestrator {
    router: TriggerRouter,
    attachments: AttachmentProcessor,
    general: Arc<dyn Responder>,
    current: Arc<dyn Responder>,
    sessions: Mutex<HashMap<Uuid, ChatSession>>,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(
        config: &ParleyConfig,
        general: Arc<dyn Responder>,
        current: Arc<dyn Responder>,
    ) -> Self {
        Self {
            router: TriggerRouter::from_config(&config.router),
            attachments: AttachmentProcessor::from_config(&config.attachments),
            general,
            current,
            sessions: Mutex::new(HashMap::new()),
            config: config.chat.clone(),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Run one turn.
    ///
    /// Responder failures do not make this return `Err`: the user message
    /// stays in the thread and the outcome carries one error notice.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnOutcome, ChatError> {
        if request.text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if request.text.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }

        let mut notices = Vec::new();
        let mut accepted: Vec<Attachment> = Vec::with_capacity(request.uploads.len());
        for upload in request.uploads {
            match self.attachments.process(upload) {
                Ok(attachment) => accepted.push(attachment),
                Err(e) => {
                    tracing::info!(error = %e, "Upload rejected");
                    notices.push(Notice::rejected(e.to_string()));
                }
            }
        }

        let user_message = Message::new(Role::User, request.text, accepted);
        let (session_id, thread, history) = {
            let mut sessions = self.lock()?;
            self.drop_expired(&mut sessions);

            // A replacement session is only registered once the turn is accepted.
            let mut fresh = match request.session_id {
                Some(sid) if sessions.contains_key(&sid) => None,
                requested => {
                    if let Some(sid) = requested {
                        tracing::debug!(session_id = %sid, "Unknown session, starting a new one");
                    }
                    Some(ChatSession::new(&self.config.default_thread))
                }
            };
            let session = match fresh.as_mut() {
                Some(session) => session,
                None => request
                    .session_id
                    .and_then(|sid| sessions.get_mut(&sid))
                    .ok_or(ChatError::Storage("session vanished under lock".to_string()))?,
            };
            let session_id = session.id;
            let thread = session.threads.resolve(request.thread.as_deref())?;
            let store = session
                .threads
                .get_mut(&thread)
                .ok_or_else(|| ChatError::ThreadNotFound(thread.clone()))?;

            let history = store.recent(self.config.history_window).to_vec();
            store.append(user_message.clone());
            session.turn_count += 1;
            session.last_message_at = Utc::now();

            if let Some(session) = fresh {
                tracing::info!(session_id = %session_id, "Session created");
                sessions.insert(session_id, session);
            }
            (session_id, thread, history)
        };

        let route = self.router.route(&user_message.content);
        let responder = match route.destination {
            Destination::General => &self.general,
            Destination::CurrentInfo => &self.current,
        };
        tracing::debug!(
            session_id = %session_id,
            thread = %thread,
            destination = %route.destination,
            matched = ?route.matched,
            history = history.len(),
            "Routing turn"
        );

        let call = ResponderRequest {
            prompt: &user_message.content,
            history: &history,
            attachments: &user_message.attachments,
        };
        let reply = match responder.respond(&call).await {
            Ok(text) => {
                let reply = Message::assistant(text);
                self.append_reply(session_id, &thread, reply.clone())?;
                Some(reply)
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    thread = %thread,
                    responder = responder.name(),
                    error = %e,
                    "Responder call failed"
                );
                notices.push(Notice::error(format!(
                    "The {} responder failed: {}",
                    responder.name(),
                    e
                )));
                None
            }
        };

        Ok(TurnOutcome {
            session_id,
            thread,
            route,
            reply,
            notices,
        })
    }

    /// Route without calling anything.
    pub fn route(&self, text: &str) -> RouteDecision {
        self.router.route(text)
    }

    // -- Sessions --

    pub fn create_session(&self) -> Result<SessionSummary, ChatError> {
        let session = ChatSession::new(&self.config.default_thread);
        let summary = session.summary();
        let mut sessions = self.lock()?;
        self.drop_expired(&mut sessions);
        sessions.insert(session.id, session);
        tracing::info!(session_id = %summary.id, "Session created");
        Ok(summary)
    }

    pub fn get_session(&self, session_id: Uuid) -> Option<ChatSession> {
        self.sessions
            .lock()
            .ok()
            .and_then(|s| s.get(&session_id).cloned())
    }

    /// All sessions, oldest first.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        let mut summaries: Vec<SessionSummary> =
            sessions.values().map(ChatSession::summary).collect();
        summaries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        summaries
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn delete_session(&self, session_id: Uuid) -> Result<(), ChatError> {
        let mut sessions = self.lock()?;
        if sessions.remove(&session_id).is_some() {
            tracing::info!(session_id = %session_id, "Session deleted");
            Ok(())
        } else {
            Err(ChatError::SessionNotFound(session_id))
        }
    }

    // -- History --

    /// Messages of a thread (the active one when `thread` is `None`).
    pub fn history(&self, session_id: Uuid, thread: Option<&str>) -> Result<Vec<Message>, ChatError> {
        self.with_session(session_id, |session| {
            let name = session.threads.resolve(thread)?;
            Ok(session
                .threads
                .get(&name)
                .map(|store| store.all().to_vec())
                .unwrap_or_default())
        })
    }

    /// Rendered transcript of a thread.
    pub fn transcript(&self, session_id: Uuid, thread: Option<&str>) -> Result<String, ChatError> {
        self.history(session_id, thread)
            .map(|messages| render_transcript(&messages))
    }

    /// Empty a thread. Clearing an empty thread is fine.
    pub fn clear(&self, session_id: Uuid, thread: Option<&str>) -> Result<(), ChatError> {
        self.with_session(session_id, |session| {
            let name = session.threads.resolve(thread)?;
            if let Some(store) = session.threads.get_mut(&name) {
                store.clear();
            }
            tracing::info!(session_id = %session_id, thread = %name, "Thread cleared");
            Ok(())
        })
    }

    // -- Threads --

    pub fn list_threads(&self, session_id: Uuid) -> Result<Vec<ThreadSummary>, ChatError> {
        self.with_session(session_id, |session| Ok(session.threads.list()))
    }

    pub fn create_thread(&self, session_id: Uuid, name: &str) -> Result<(), ChatError> {
        self.with_session(session_id, |session| session.threads.create(name))
    }

    pub fn switch_thread(&self, session_id: Uuid, name: &str) -> Result<(), ChatError> {
        self.with_session(session_id, |session| session.threads.switch(name))
    }

    pub fn delete_thread(&self, session_id: Uuid, name: &str) -> Result<(), ChatError> {
        self.with_session(session_id, |session| session.threads.delete(name))
    }

    // -- Private helpers --

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, ChatSession>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::Storage(format!("session lock poisoned: {}", e)))
    }

    fn with_session<T>(
        &self,
        session_id: Uuid,
        f: impl FnOnce(&mut ChatSession) -> Result<T, ChatError>,
    ) -> Result<T, ChatError> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(ChatError::SessionNotFound(session_id))?;
        f(session)
    }

    /// Forget every session idle past the timeout.
    fn drop_expired(&self, sessions: &mut HashMap<Uuid, ChatSession>) {
        let timeout = self.config.session_timeout_minutes;
        let now = Utc::now();
        sessions.retain(|id, session| {
            let expired = session.is_expired(timeout, now);
            if expired {
                tracing::info!(session_id = %id, "Session expired");
            }
            !expired
        });
    }

    fn append_reply(&self, session_id: Uuid, thread: &str, reply: Message) -> Result<(), ChatError> {
        let mut sessions = self.lock()?;
        // The session or thread may have been deleted while the call was in flight.
        match sessions
            .get_mut(&session_id)
            .and_then(|s| {
                s.last_message_at = Utc::now();
                s.threads.get_mut(thread)
            }) {
            Some(store) => store.append(reply),
            None => tracing::warn!(
                session_id = %session_id,
                thread = %thread,
                "Thread disappeared before the reply arrived, reply not stored"
            ),
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
