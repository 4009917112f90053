//! Core chat session management.
//!
//! This module provides [`ChatSession`], the controller that owns the
//! transcript, dispatches each submission to a [`CompletionClient`] on its
//! own task, and folds replies back into the transcript as they arrive.
//!
//! Replies are appended in completion order.  When a slow request is
//! overtaken by a later, faster one, the later reply lands first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::chat::config::ChatConfig;
use crate::client::{CompletionClient, OpenAi};
use crate::error::{Error, ErrorKind, Result};
use crate::observability::{
    SESSION_CANCELLED, SESSION_COMPLETION_FAILURES, SESSION_REPLIES, SESSION_REPLY_LATENCY,
    SESSION_SUBMISSIONS,
};
use crate::types::{CompletionResponse, Message};

/// Handle returned by the subscription methods, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A completion that produced no transcript entry.
#[derive(Debug, Clone)]
pub struct CompletionFailure {
    /// Id of the user message whose reply failed.
    pub prompt_id: String,
    /// Why the request failed.
    pub error: Error,
}

impl CompletionFailure {
    /// Shorthand for `self.error.kind()`.
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Snapshot of a session's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Entries in the transcript.
    pub message_count: usize,
    /// Transcript entries typed by the user.
    pub user_messages: usize,
    /// Transcript entries produced by the backend.
    pub assistant_messages: usize,
    /// Completions still in flight.
    pub pending: usize,
    /// Completions that failed and were left out of the transcript.
    pub failures: u64,
}

type TranscriptListener = Box<dyn Fn(&[Message]) + Send + Sync>;
type FailureListener = Box<dyn Fn(&CompletionFailure) + Send + Sync>;

struct SessionState {
    transcript: Vec<Message>,
    draft: String,
    transcript_listeners: Vec<(ListenerId, TranscriptListener)>,
    failure_listeners: Vec<(ListenerId, FailureListener)>,
    next_listener: u64,
    failures: u64,
    cancel: CancellationToken,
}

impl SessionState {
    fn new() -> Self {
        Self {
            transcript: Vec::new(),
            draft: String::new(),
            transcript_listeners: Vec::new(),
            failure_listeners: Vec::new(),
            next_listener: 0,
            failures: 0,
            cancel: CancellationToken::new(),
        }
    }

    fn next_listener_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        id
    }

    // Append and notify happen under the same guard.
    fn append(&mut self, message: Message) {
        self.transcript.push(message);
        for (_, listener) in &self.transcript_listeners {
            listener(&self.transcript);
        }
    }

    // Cancel under the guard so a finished task waiting on the lock sees it.
    fn cancel_pending(&mut self) {
        std::mem::take(&mut self.cancel).cancel();
    }

    fn fail(&mut self, failure: CompletionFailure) {
        self.failures = self.failures.saturating_add(1);
        for (_, listener) in &self.failure_listeners {
            listener(&failure);
        }
    }
}

/// The chat session controller.
///
/// The session is the single writer of its transcript.  Presentation code
/// feeds it text through [`submit`](Self::submit) and renders whatever
/// [`on_transcript_changed`](Self::on_transcript_changed) hands it.
///
/// Listeners run while the session's lock is held, which makes every append
/// and its notification one atomic step.  A listener must therefore not call
/// back into the session; copy what it needs out of the slice instead.
pub struct ChatSession<C: CompletionClient + 'static> {
    client: Arc<C>,
    state: Arc<Mutex<SessionState>>,
    tasks: TaskTracker,
}

impl ChatSession<OpenAi> {
    /// Creates a session talking to the backend described by `config`.
    ///
    /// `api_key` falls back to the OPENAI_API_KEY environment variable.
    pub fn from_config(config: &ChatConfig, api_key: Option<String>) -> Result<Self> {
        Ok(Self::new(config.build_client(api_key)?))
    }
}

impl<C: CompletionClient + 'static> ChatSession<C> {
    /// Creates an empty session around `client`.
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            state: Arc::new(Mutex::new(SessionState::new())),
            tasks: TaskTracker::new(),
        }
    }

    /// The backend this session submits to.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Submits user text.
    ///
    /// The user message is appended, and listeners notified, before this
    /// returns.  The completion runs on a spawned task, so this must be
    /// called from within a Tokio runtime.  The text is not validated; an
    /// empty string is submitted like any other.
    ///
    /// Failed completions never reach the transcript.  They are logged and
    /// reported to [`on_completion_failed`](Self::on_completion_failed)
    /// listeners.
    pub fn submit(&self, text: impl Into<String>) {
        let text = text.into();
        let message = Message::user(text.clone());
        let prompt_id = message.id().to_string();
        let cancel = {
            let mut state = self.lock();
            state.append(message);
            state.cancel.clone()
        };
        SESSION_SUBMISSIONS.click();
        tracing::debug!(prompt_id = %prompt_id, "submitted user message");

        let client = Arc::clone(&self.client);
        let state = Arc::clone(&self.state);
        self.tasks.spawn(async move {
            let start = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    SESSION_CANCELLED.click();
                    tracing::debug!(prompt_id = %prompt_id, "completion cancelled");
                    return;
                }
                outcome = client.complete(&text) => outcome,
            };
            let mut state = lock_state(&state);
            if cancel.is_cancelled() {
                SESSION_CANCELLED.click();
                tracing::debug!(prompt_id = %prompt_id, "reply dropped after cancellation");
                return;
            }
            match accept_reply(outcome) {
                Ok(reply) => {
                    SESSION_REPLIES.click();
                    SESSION_REPLY_LATENCY.add(start.elapsed().as_secs_f64());
                    state.append(reply);
                }
                Err(error) => {
                    SESSION_COMPLETION_FAILURES.click();
                    tracing::warn!(
                        prompt_id = %prompt_id,
                        kind = %error.kind(),
                        error = %error,
                        "completion failed; no reply appended"
                    );
                    state.fail(CompletionFailure { prompt_id, error });
                }
            }
        });
    }

    /// Replaces the draft input text.
    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().draft = text.into();
    }

    /// The current draft input text.
    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    /// Submits the draft, leaving it empty.
    pub fn submit_draft(&self) {
        let draft = std::mem::take(&mut self.lock().draft);
        self.submit(draft);
    }

    /// Registers a listener called with the whole transcript after every append.
    pub fn on_transcript_changed<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&[Message]) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = state.next_listener_id();
        state.transcript_listeners.push((id, Box::new(listener)));
        id
    }

    /// Registers a listener called for every completion that failed.
    pub fn on_completion_failed<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CompletionFailure) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = state.next_listener_id();
        state.failure_listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener.  Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut state = self.lock();
        let before = state.transcript_listeners.len() + state.failure_listeners.len();
        state.transcript_listeners.retain(|(lid, _)| *lid != id);
        state.failure_listeners.retain(|(lid, _)| *lid != id);
        before != state.transcript_listeners.len() + state.failure_listeners.len()
    }

    /// A copy of the transcript.
    pub fn transcript(&self) -> Vec<Message> {
        self.lock().transcript.clone()
    }

    /// Returns the number of messages in the transcript.
    pub fn len(&self) -> usize {
        self.lock().transcript.len()
    }

    /// Returns true if nothing has been submitted yet.
    pub fn is_empty(&self) -> bool {
        self.lock().transcript.is_empty()
    }

    /// Completions that have not finished yet.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits until every in-flight completion has finished or been cancelled.
    ///
    /// Submissions made while waiting are waited for too.  Intended for one
    /// caller at a time, typically at shutdown.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Abandons every in-flight completion.
    ///
    /// Their replies will never be appended.  Later submissions are
    /// unaffected.
    pub fn cancel_pending(&self) {
        self.lock().cancel_pending();
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        let pending = self.pending();
        let state = self.lock();
        let user_messages = state.transcript.iter().filter(|m| m.is_user()).count();
        SessionStats {
            message_count: state.transcript.len(),
            user_messages,
            assistant_messages: state.transcript.len() - user_messages,
            pending,
            failures: state.failures,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }
}

// A panicking listener must not wedge the session.
fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn accept_reply(outcome: Result<CompletionResponse>) -> Result<Message> {
    let response = outcome?;
    match response.first_text() {
        Some(text) => Ok(Message::assistant(response.response_id(), text)),
        None => Err(Error::empty_completion(
            response.response_id().map(String::from),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::types::Sender;

    /// Replies to each prompt with a scripted outcome after a scripted delay.
    #[derive(Default)]
    struct ScriptedClient {
        script: Mutex<HashMap<String, (Duration, Result<CompletionResponse>)>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn reply(self, prompt: &str, delay_ms: u64, outcome: Result<CompletionResponse>) -> Self {
            self.script.lock().unwrap().insert(
                prompt.to_string(),
                (Duration::from_millis(delay_ms), outcome),
            );
            self
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, prompt: &str) -> Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.script.lock().unwrap().remove(prompt);
            let (delay, outcome) = scripted.unwrap_or_else(|| {
                (
                    Duration::ZERO,
                    Ok(CompletionResponse::new("", [format!("echo {prompt}")])),
                )
            });
            tokio::time::sleep(delay).await;
            outcome
        }
    }

    fn summary<C: CompletionClient + 'static>(session: &ChatSession<C>) -> Vec<(Sender, String)> {
        session
            .transcript()
            .iter()
            .map(|m| (m.sender(), m.content().to_string()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_hello() {
        let client = ScriptedClient::default().reply(
            "Hello",
            100,
            Ok(CompletionResponse::new("x1", ["\"Hi there\""])),
        );
        let session = ChatSession::new(client);

        session.submit("Hello");
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].sender(), Sender::User);
        assert_eq!(transcript[0].content(), "Hello");
        assert_eq!(session.pending(), 1);

        session.settle().await;
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].sender(), Sender::Assistant);
        assert_eq!(transcript[1].id(), "x1");
        assert_eq!(transcript[1].content(), "Hi there");
        assert_eq!(session.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn user_messages_keep_call_order() {
        let session = ChatSession::new(ScriptedClient::default());
        for i in 0..10 {
            session.submit(format!("m{i}"));
        }
        let users: Vec<String> = session
            .transcript()
            .iter()
            .filter(|m| m.is_user())
            .map(|m| m.content().to_string())
            .collect();
        assert_eq!(users, (0..10).map(|i| format!("m{i}")).collect::<Vec<_>>());
        session.settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn replies_land_in_completion_order() {
        let client = ScriptedClient::default()
            .reply("A", 300, Ok(CompletionResponse::new("a", ["slow"])))
            .reply("B", 50, Ok(CompletionResponse::new("b", ["fast"])));
        let session = ChatSession::new(client);

        session.submit("A");
        session.submit("B");
        session.settle().await;

        assert_eq!(
            summary(&session),
            vec![
                (Sender::User, "A".to_string()),
                (Sender::User, "B".to_string()),
                (Sender::Assistant, "fast".to_string()),
                (Sender::Assistant, "slow".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_choices_append_nothing() {
        let client = ScriptedClient::default().reply(
            "hi",
            10,
            Ok(CompletionResponse::new("e1", Vec::<String>::new())),
        );
        let session = ChatSession::new(client);
        let notifications = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&notifications);
        session.on_transcript_changed(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        session.on_completion_failed(move |f| sink.lock().unwrap().push(f.kind()));

        session.submit("hi");
        session.settle().await;

        assert_eq!(session.len(), 1);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
        assert_eq!(*failures.lock().unwrap(), vec![ErrorKind::EmptyCompletion]);
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_is_swallowed() {
        let client = ScriptedClient::default().reply(
            "hi",
            10,
            Err(Error::connection("connection refused", None)),
        );
        let session = ChatSession::new(client);
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        session.on_completion_failed(move |f| sink.lock().unwrap().push(f.clone()));

        session.submit("hi");
        let before = session.transcript();
        session.settle().await;

        assert_eq!(session.transcript(), before);
        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind(), ErrorKind::Network);
        assert_eq!(failures[0].prompt_id, before[0].id());
        assert_eq!(session.stats().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_distinct() {
        let mut client = ScriptedClient::default();
        for i in 0..20 {
            // Half the replies carry no id and must get a generated one.
            let id = if i % 2 == 0 { format!("r{i}") } else { String::new() };
            client = client.reply(
                &format!("p{i}"),
                i,
                Ok(CompletionResponse::new(id, ["ok"])),
            );
        }
        let session = ChatSession::new(client);
        for i in 0..20 {
            session.submit(format!("p{i}"));
        }
        session.settle().await;

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 40);
        let ids: HashSet<&str> = transcript.iter().map(|m| m.id()).collect();
        assert_eq!(ids.len(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_see_every_append() {
        let client =
            ScriptedClient::default().reply("q", 5, Ok(CompletionResponse::new("r", ["a"])));
        let session = ChatSession::new(client);
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lengths);
        let id = session.on_transcript_changed(move |t| sink.lock().unwrap().push(t.len()));

        session.submit("q");
        assert_eq!(*lengths.lock().unwrap(), vec![1]);
        session.settle().await;
        assert_eq!(*lengths.lock().unwrap(), vec![1, 2]);

        assert!(session.unsubscribe(id));
        assert!(!session.unsubscribe(id));
        session.submit("again");
        session.settle().await;
        assert_eq!(*lengths.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_prompt_is_submitted() {
        let session = ChatSession::new(ScriptedClient::default());
        session.submit("");
        session.settle().await;
        assert_eq!(session.client().calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            summary(&session),
            vec![
                (Sender::User, String::new()),
                (Sender::Assistant, "echo".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn draft_is_taken_on_submit() {
        let session = ChatSession::new(ScriptedClient::default());
        session.set_draft("from draft");
        assert_eq!(session.draft(), "from draft");

        session.submit_draft();
        assert_eq!(session.draft(), "");
        assert_eq!(session.transcript()[0].content(), "from draft");
        session.settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_late_replies() {
        let client = ScriptedClient::default()
            .reply("slow", 1_000, Ok(CompletionResponse::new("s", ["late"])))
            .reply("next", 10, Ok(CompletionResponse::new("n", ["on time"])));
        let session = ChatSession::new(client);

        session.submit("slow");
        tokio::task::yield_now().await;
        session.cancel_pending();
        session.settle().await;
        assert_eq!(summary(&session), vec![(Sender::User, "slow".to_string())]);

        session.submit("next");
        session.settle().await;
        assert_eq!(
            summary(&session),
            vec![
                (Sender::User, "slow".to_string()),
                (Sender::User, "next".to_string()),
                (Sender::Assistant, "on time".to_string()),
            ]
        );
    }

    /// Finishes a completion only once the test releases it.
    #[derive(Default)]
    struct GatedClient {
        release: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl CompletionClient for GatedClient {
        async fn complete(&self, prompt: &str) -> Result<CompletionResponse> {
            self.release.notified().await;
            Ok(CompletionResponse::new("g", [format!("re {prompt}")]))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_drops_reply_waiting_on_lock() {
        let session = ChatSession::new(GatedClient::default());
        session.submit("a");

        let mut state = session.lock();
        session.client().release.notify_one();
        // Give the finished task time to block on the session lock.
        std::thread::sleep(Duration::from_millis(100));
        state.cancel_pending();
        drop(state);

        session.settle().await;
        assert_eq!(summary(&session), vec![(Sender::User, "a".to_string())]);
        assert_eq!(session.stats().failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_count_by_sender() {
        let client = ScriptedClient::default().reply(
            "bad",
            1,
            Err(Error::internal_server("boom")),
        );
        let session = ChatSession::new(client);
        session.submit("good");
        session.submit("bad");
        assert_eq!(session.stats().pending, 2);
        session.settle().await;

        assert_eq!(
            session.stats(),
            SessionStats {
                message_count: 3,
                user_messages: 2,
                assistant_messages: 1,
                pending: 0,
                failures: 1,
            }
        );
    }
}
