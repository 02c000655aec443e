use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use threadchat::chat::{ChatSession, TurnAction, TurnOutcome};
use threadchat::{
    Completer, ConversationStore, DEFAULT_TITLE, Error, FileStore, KeyValueStore, KnownModel,
    MemoryStore, Message, Model, Result, Settings,
};

/// Replies from a queue and records what it was asked.
#[derive(Default)]
struct Scripted {
    replies: Mutex<VecDeque<Result<Message>>>,
    asked: Mutex<Vec<(String, Settings)>>,
}

impl Scripted {
    fn reply(&self, content: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(Message::assistant(content)));
    }

    fn fail(&self, error: Error) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .unwrap()
            .iter()
            .map(|(content, _)| content.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Completer for Scripted {
    async fn complete(&self, message: &Message, settings: &Settings) -> Result<Message> {
        self.asked
            .lock()
            .unwrap()
            .push((message.content.clone(), settings.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::format("script exhausted")))
    }
}

/// Shared memory storage whose writes fail while `failing` is set.
#[derive(Clone, Default)]
struct FullDisk {
    inner: Arc<Mutex<MemoryStore>>,
    failing: Arc<AtomicBool>,
}

impl FullDisk {
    fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl KeyValueStore for FullDisk {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.lock().unwrap().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::io("disk full", std::io::Error::other("disk full")));
        }
        self.inner.lock().unwrap().set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.inner.lock().unwrap().remove(key)
    }
}

fn session() -> (Arc<Scripted>, ChatSession<Scripted>) {
    let completer = Arc::new(Scripted::default());
    let store = ConversationStore::load(MemoryStore::new()).unwrap();
    let session = ChatSession::with_shared(Arc::clone(&completer), store);
    (completer, session)
}

#[tokio::test]
async fn successful_turn_appends_reply_and_titles_thread() {
    let (completer, mut session) = session();
    completer.reply("Hi there!");

    let outcome = session.submit("Hello").await.unwrap();
    assert!(matches!(outcome, Some(TurnOutcome::Replied(_))));
    assert_eq!(
        session.active_messages(),
        &[Message::user("Hello"), Message::assistant("Hi there!")]
    );
    assert_eq!(session.active_thread().unwrap().title, "Hello");
    assert_eq!(completer.asked(), vec!["Hello".to_string()]);
}

#[tokio::test]
async fn long_first_message_truncates_title() {
    let (completer, mut session) = session();
    completer.reply("ok");
    let long = "x".repeat(80);
    session.submit(&long).await.unwrap();
    assert_eq!(
        session.active_thread().unwrap().title,
        format!("{}...", "x".repeat(50))
    );
}

#[tokio::test]
async fn title_is_only_derived_once() {
    let (completer, mut session) = session();
    completer.reply("one");
    completer.reply("two");
    session.submit("First question").await.unwrap();
    session.submit("Second question").await.unwrap();
    assert_eq!(session.active_thread().unwrap().title, "First question");
    assert_eq!(session.active_messages().len(), 4);
}

#[tokio::test]
async fn failure_restores_thread_and_retry_resubmits() {
    let (completer, mut session) = session();
    completer.fail(Error::network(Some(500), "rate limited", None));

    let outcome = session.submit("Hello").await.unwrap();
    assert!(matches!(outcome, Some(TurnOutcome::Failed(_))));
    assert!(session.active_messages().is_empty());
    assert_eq!(session.error(), Some("rate limited"));
    assert_eq!(session.active_thread().unwrap().title, DEFAULT_TITLE);
    assert_eq!(
        session.last_action(),
        Some(&TurnAction::Submit("Hello".to_string()))
    );

    completer.reply("Hi!");
    let outcome = session.retry().await.unwrap();
    assert!(matches!(outcome, Some(TurnOutcome::Replied(_))));
    assert!(session.error().is_none());
    assert_eq!(
        session.active_messages(),
        &[Message::user("Hello"), Message::assistant("Hi!")]
    );
    assert_eq!(session.stats().total_requests, 2);
    assert_eq!(session.stats().failed_requests, 1);
}

#[tokio::test]
async fn failure_keeps_earlier_turns() {
    let (completer, mut session) = session();
    completer.reply("first answer");
    completer.fail(Error::format("Invalid API response format"));
    session.submit("first").await.unwrap();
    session.submit("second").await.unwrap();
    assert_eq!(
        session.active_messages(),
        &[Message::user("first"), Message::assistant("first answer")]
    );
    assert_eq!(session.error(), Some("Invalid API response format"));
}

#[tokio::test]
async fn regenerate_replaces_trailing_reply() {
    let (completer, mut session) = session();
    completer.reply("first draft");
    completer.reply("second draft");
    session.submit("Write a haiku").await.unwrap();

    let outcome = session.regenerate().await.unwrap();
    assert!(matches!(outcome, Some(TurnOutcome::Replied(_))));
    assert_eq!(
        session.active_messages(),
        &[
            Message::user("Write a haiku"),
            Message::assistant("second draft")
        ]
    );
    assert_eq!(
        completer.asked(),
        vec!["Write a haiku".to_string(), "Write a haiku".to_string()]
    );
}

#[tokio::test]
async fn failed_regenerate_leaves_prompt_for_retry() {
    let (completer, mut session) = session();
    completer.reply("first draft");
    completer.fail(Error::network(None, "Connection error", None));
    completer.reply("second draft");
    session.submit("Write a haiku").await.unwrap();

    session.regenerate().await.unwrap();
    assert_eq!(session.active_messages(), &[Message::user("Write a haiku")]);
    assert_eq!(session.last_action(), Some(&TurnAction::Regenerate));

    session.retry().await.unwrap();
    assert_eq!(
        session.active_messages(),
        &[
            Message::user("Write a haiku"),
            Message::assistant("second draft")
        ]
    );
}

#[tokio::test]
async fn regenerate_on_empty_thread_is_noop() {
    let (completer, mut session) = session();
    assert!(session.regenerate().await.unwrap().is_none());
    assert!(session.retry().await.unwrap().is_none());
    assert!(completer.asked().is_empty());
}

#[tokio::test]
async fn request_uses_settings_at_send_time() {
    let (completer, mut session) = session();
    completer.reply("ok");
    session.set_model(KnownModel::Llama31_405BInstructFp8).unwrap();
    session.set_temperature(0.2).unwrap();
    let pending = session.begin_submit("Hello").unwrap().unwrap();
    session.set_temperature(1.0).unwrap();
    let result = session.dispatch(&pending).await;
    session.finish_turn(pending, result).unwrap();

    let asked = completer.asked.lock().unwrap();
    assert_eq!(
        asked[0].1.model,
        Model::Known(KnownModel::Llama31_405BInstructFp8)
    );
    assert_eq!(asked[0].1.temperature, 0.2);
}

#[tokio::test]
async fn reply_follows_its_thread_across_switches() {
    let (completer, mut session) = session();
    completer.reply("answer");
    let first = session.store().active_id().to_string();
    let pending = session.begin_submit("question").unwrap().unwrap();
    let request = session.dispatch(&pending);

    let second = session.new_thread().unwrap().id;
    assert!(session.begin_submit("ignored while loading").unwrap().is_none());

    let result = request.await;
    session.finish_turn(pending, result).unwrap();
    assert_eq!(session.store().active_id(), second);
    assert!(session.active_messages().is_empty());
    assert_eq!(
        session.store().messages(&first),
        &[Message::user("question"), Message::assistant("answer")]
    );
    assert_eq!(session.store().thread(&first).unwrap().title, "question");
}

#[tokio::test]
async fn conversations_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let completer = Arc::new(Scripted::default());
    completer.reply("Hi there!");
    {
        let store = ConversationStore::load(FileStore::open(dir.path()).unwrap()).unwrap();
        let mut session = ChatSession::with_shared(Arc::clone(&completer), store);
        session.set_temperature(0.3).unwrap();
        session.submit("Hello").await.unwrap();
        session.new_thread().unwrap();
    }

    let store = ConversationStore::load(FileStore::open(dir.path()).unwrap()).unwrap();
    assert_eq!(store.threads().len(), 2);
    assert_eq!(store.settings().temperature, 0.3);
    let hello = store
        .threads()
        .iter()
        .find(|thread| thread.title == "Hello")
        .unwrap();
    assert_eq!(store.messages(&hello.id).len(), 2);
}

#[tokio::test]
async fn failed_save_does_not_leave_unanswered_message() {
    let disk = FullDisk::default();
    let completer = Arc::new(Scripted::default());
    let store = ConversationStore::load(disk.clone()).unwrap();
    let mut session = ChatSession::with_shared(Arc::clone(&completer), store);

    disk.fail_writes(true);
    assert!(session.begin_submit("Hello").is_err());
    assert!(!session.is_loading());
    assert!(session.active_messages().is_empty());
    assert!(session.last_action().is_none());
    assert!(completer.asked().is_empty());

    disk.fail_writes(false);
    completer.reply("echo Again");
    session.submit("Again").await.unwrap();
    let expected = [Message::user("Again"), Message::assistant("echo Again")];
    assert_eq!(session.active_messages(), &expected);

    let reloaded = ConversationStore::load(disk.clone()).unwrap();
    assert_eq!(reloaded.active_messages(), &expected);
    assert_eq!(reloaded.active_thread().unwrap().title, "Again");
}

#[tokio::test]
async fn failed_reply_save_clears_loading_and_sets_banner() {
    let disk = FullDisk::default();
    let completer = Arc::new(Scripted::default());
    let store = ConversationStore::load(disk.clone()).unwrap();
    let mut session = ChatSession::with_shared(Arc::clone(&completer), store);

    completer.reply("Hi!");
    let pending = session.begin_submit("Hello").unwrap().unwrap();
    let result = session.dispatch(&pending).await;
    disk.fail_writes(true);
    assert!(session.finish_turn(pending, result).is_err());
    assert!(!session.is_loading());
    assert_eq!(session.error(), Some("disk full"));
    assert_eq!(session.active_messages(), &[Message::user("Hello")]);

    let reloaded = ConversationStore::load(disk.clone()).unwrap();
    assert_eq!(reloaded.active_messages(), &[Message::user("Hello")]);
}
