//! Core chat session management.
//!
//! This module provides the `ChatSession` struct, which sequences UI state around the one network
//! call a turn makes: the optimistic append, the loading flag, the reply or the rollback, and the
//! error banner.
//!
//! A turn is split into three steps so that a caller can keep handling input while the request
//! is outstanding:
//!
//! 1. [`ChatSession::begin_submit`] (or [`ChatSession::begin_regenerate`]) appends the user
//!    message, sets the loading flag and returns a [`PendingTurn`] that captures the target
//!    thread.
//! 2. [`ChatSession::dispatch`] returns a `'static` future performing the request.
//! 3. [`ChatSession::finish_turn`] applies the result to the captured thread.
//!
//! [`ChatSession::submit`] runs all three in sequence.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::client::Completer;
use crate::error::{Error, Result};
use crate::observability::{SESSION_DISCARDED_REPLIES, SESSION_ROLLBACKS, SESSION_SUBMISSIONS};
use crate::store::ConversationStore;
use crate::types::{KnownModel, Message, Model, Settings, Thread};

/// System prompt seeded into threads created with [`ChatSession::new_writer_thread`].
pub const WRITER_PROMPT: &str =
    "I am a writing assistant ready to help you create high-quality content.";

/// The user action an error banner's retry re-invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAction {
    /// Submit this text as a new user message.
    Submit(String),
    /// Regenerate the latest reply.
    Regenerate,
}

/// A submission whose request has not completed yet.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    thread_id: String,
    prior_messages: Vec<Message>,
    user_message: Message,
    settings: Settings,
}

impl PendingTurn {
    /// The thread the reply will be applied to, captured when the turn began.
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// The user message being answered.
    pub fn user_message(&self) -> &Message {
        &self.user_message
    }

    /// The settings captured when the turn began.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// How a turn ended.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The reply was appended to the thread.
    Replied(Message),
    /// The request failed; the thread was rolled back and the banner set.
    Failed(Error),
    /// The thread was deleted while the request was outstanding; the result was dropped.
    Discarded,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The number of threads.
    pub thread_count: usize,
    /// The number of messages across all threads.
    pub message_count: usize,
    /// The number of messages in the active thread.
    pub active_message_count: usize,
    /// The selected model.
    pub model: Model,
    /// The selected temperature.
    pub temperature: f32,
    /// Requests completed during this session.
    pub total_requests: u64,
    /// Requests that failed during this session.
    pub failed_requests: u64,
}

/// A chat session that manages conversation state and API interactions.
pub struct ChatSession<C: Completer + 'static> {
    completer: Arc<C>,
    store: ConversationStore,
    loading: bool,
    error: Option<String>,
    last_action: Option<TurnAction>,
    request_count: u64,
    failure_count: u64,
}

impl<C: Completer + 'static> ChatSession<C> {
    /// Creates a new chat session over a loaded store.
    pub fn new(completer: C, store: ConversationStore) -> Self {
        Self::with_shared(Arc::new(completer), store)
    }

    /// Creates a new chat session sharing an existing completer.
    pub fn with_shared(completer: Arc<C>, store: ConversationStore) -> Self {
        Self {
            completer,
            store,
            loading: false,
            error: None,
            last_action: None,
            request_count: 0,
            failure_count: 0,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Returns true while a request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The current error banner text, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Dismisses the error banner.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// The action a retry would re-invoke.
    pub fn last_action(&self) -> Option<&TurnAction> {
        self.last_action.as_ref()
    }

    /// The active thread.
    pub fn active_thread(&self) -> Option<&Thread> {
        self.store.active_thread()
    }

    /// The messages of the active thread.
    pub fn active_messages(&self) -> &[Message] {
        self.store.active_messages()
    }

    /// The global settings.
    pub fn settings(&self) -> &Settings {
        self.store.settings()
    }

    /// Starts a new, empty thread and clears the error banner.
    pub fn new_thread(&mut self) -> Result<Thread> {
        self.error = None;
        self.store.create_thread()
    }

    /// Starts a new thread seeded with the writing-assistant system prompt.
    pub fn new_writer_thread(&mut self) -> Result<Thread> {
        self.error = None;
        self.store.create_seeded_thread(WRITER_PROMPT)
    }

    /// Makes another thread active.  An outstanding request still lands in its own thread.
    pub fn select_thread(&mut self, id: &str) -> Result<()> {
        self.store.select_thread(id)
    }

    /// Deletes a thread and its messages.
    pub fn delete_thread(&mut self, id: &str) -> Result<()> {
        self.store.delete_thread(id)
    }

    /// Toggles whether a thread's messages are shown; returns the new collapsed state.
    pub fn toggle_collapsed(&mut self, id: &str) -> Result<bool> {
        self.store.toggle_collapsed(id)
    }

    /// Selects one of the known models.
    pub fn set_model(&mut self, model: KnownModel) -> Result<()> {
        self.store.set_model(Model::Known(model))
    }

    /// Sets the temperature; it must lie in `[0, 1]` and is snapped to the nearest 0.1.
    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        self.store.set_temperature(temperature)
    }

    /// Starts a submission of `input` to the active thread.
    ///
    /// Returns `Ok(None)` without touching any state if the input is blank or a request is
    /// already outstanding.
    pub fn begin_submit(&mut self, input: &str) -> Result<Option<PendingTurn>> {
        let content = input.trim();
        if content.is_empty() || self.loading {
            return Ok(None);
        }
        let thread_id = self.store.active_id().to_string();
        let prior_messages = self.store.messages(&thread_id).to_vec();
        let user_message = Message::user(content);
        self.store
            .append_message(&thread_id, user_message.clone())?;

        self.error = None;
        self.last_action = Some(TurnAction::Submit(content.to_string()));
        Ok(Some(self.start(thread_id, prior_messages, user_message)))
    }

    /// Starts a regeneration of the active thread's latest reply.
    ///
    /// The trailing assistant message, if any, is removed and the most recent user message is
    /// asked again.  Returns `Ok(None)` if a request is outstanding or the thread has no user
    /// message to ask.  If the request fails the thread is left ending with the user message.
    pub fn begin_regenerate(&mut self) -> Result<Option<PendingTurn>> {
        if self.loading {
            return Ok(None);
        }
        let thread_id = self.store.active_id().to_string();
        let mut kept = self.store.messages(&thread_id).to_vec();
        if kept.last().is_some_and(Message::is_assistant) {
            kept.pop();
        }
        let Some(position) = kept.iter().rposition(Message::is_user) else {
            return Ok(None);
        };
        let mut reissued = kept.clone();
        let user_message = reissued.remove(position);
        reissued.push(user_message.clone());
        self.store.rollback(&thread_id, reissued)?;

        self.error = None;
        self.last_action = Some(TurnAction::Regenerate);
        Ok(Some(self.start(thread_id, kept, user_message)))
    }

    /// Starts whatever action the error banner's retry offers.
    pub fn begin_retry(&mut self) -> Result<Option<PendingTurn>> {
        match self.last_action.clone() {
            Some(TurnAction::Submit(content)) => self.begin_submit(&content),
            Some(TurnAction::Regenerate) => self.begin_regenerate(),
            None => Ok(None),
        }
    }

    /// Returns the request for a pending turn as an owned future.
    pub fn dispatch(&self, pending: &PendingTurn) -> BoxFuture<'static, Result<Message>> {
        let completer = Arc::clone(&self.completer);
        let message = pending.user_message.clone();
        let settings = pending.settings.clone();
        Box::pin(async move { completer.complete(&message, &settings).await })
    }

    /// Applies the result of a pending turn to the thread it was started in.
    ///
    /// On success the reply is appended and, while the thread still has the default title, the
    /// title is derived from the user message.  On failure the thread is restored to its
    /// pre-submission messages and the banner shows the error.  Either way the loading flag is
    /// cleared.  Only persistence failures are returned as `Err`.
    pub fn finish_turn(
        &mut self,
        pending: PendingTurn,
        result: Result<Message>,
    ) -> Result<TurnOutcome> {
        self.loading = false;
        self.request_count += 1;
        if result.is_err() {
            self.failure_count += 1;
        }
        if !self.store.contains(&pending.thread_id) {
            SESSION_DISCARDED_REPLIES.click();
            return Ok(TurnOutcome::Discarded);
        }
        match result {
            Ok(reply) => {
                if let Err(err) = self.store.append_message(&pending.thread_id, reply.clone()) {
                    SESSION_ROLLBACKS.click();
                    self.error = Some(err.message().to_string());
                    let _ = self
                        .store
                        .rollback(&pending.thread_id, pending.prior_messages);
                    return Err(err);
                }
                self.store
                    .set_title_if_default(&pending.thread_id, &pending.user_message)?;
                Ok(TurnOutcome::Replied(reply))
            }
            Err(err) => {
                SESSION_ROLLBACKS.click();
                self.error = Some(err.message().to_string());
                self.store
                    .rollback(&pending.thread_id, pending.prior_messages)?;
                Ok(TurnOutcome::Failed(err))
            }
        }
    }

    /// Submits `input` and waits for the reply.  `Ok(None)` means the submission was ignored.
    pub async fn submit(&mut self, input: &str) -> Result<Option<TurnOutcome>> {
        let pending = self.begin_submit(input)?;
        self.run(pending).await
    }

    /// Regenerates the latest reply and waits for it.  `Ok(None)` means there was nothing to do.
    pub async fn regenerate(&mut self) -> Result<Option<TurnOutcome>> {
        let pending = self.begin_regenerate()?;
        self.run(pending).await
    }

    /// Re-invokes the last action and waits for it.
    pub async fn retry(&mut self) -> Result<Option<TurnOutcome>> {
        let pending = self.begin_retry()?;
        self.run(pending).await
    }

    /// The message `/copy` targets: the 1-based `index` into the active thread, or the latest.
    pub fn copy_target(&self, index: Option<usize>) -> Option<&Message> {
        let messages = self.store.active_messages();
        match index {
            Some(0) => None,
            Some(n) => messages.get(n - 1),
            None => messages.last(),
        }
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        let settings = self.store.settings();
        SessionStats {
            thread_count: self.store.threads().len(),
            message_count: self.store.message_count(),
            active_message_count: self.store.active_messages().len(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            total_requests: self.request_count,
            failed_requests: self.failure_count,
        }
    }

    fn start(
        &mut self,
        thread_id: String,
        prior_messages: Vec<Message>,
        user_message: Message,
    ) -> PendingTurn {
        SESSION_SUBMISSIONS.click();
        self.loading = true;
        PendingTurn {
            thread_id,
            prior_messages,
            user_message,
            settings: self.store.settings().clone(),
        }
    }

    async fn run(&mut self, pending: Option<PendingTurn>) -> Result<Option<TurnOutcome>> {
        let Some(pending) = pending else {
            return Ok(None);
        };
        let result = self.dispatch(&pending).await;
        self.finish_turn(pending, result).map(Some)
    }
}
