//! The conversation store: threads, their messages, global settings and the collapsed set.
//!
//! The store is the single owner of conversation state.  Every mutation is applied to a copy of
//! the state, the copy is written to the backing [`KeyValueStore`], and only then does it replace
//! the in-memory state.  A failed write leaves the store exactly as it was before the call.
//!
//! Records are wrapped in a small versioned envelope, `{"version": 1, "data": ...}`.  Values
//! written before the envelope existed are read as version 0 and carried forward; values from a
//! newer version are refused rather than overwritten.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::observability::{STORE_WRITE_ERRORS, STORE_WRITES};
use crate::storage::KeyValueStore;
use crate::types::{Message, Model, Settings, Thread, derive_title};
use crate::utils::time::unix_millis;

/// Key of the thread list record.
pub const THREADS_KEY: &str = "threadchat-threads";
/// Key of the thread-id to messages record.
pub const MESSAGES_KEY: &str = "threadchat-messages";
/// Key of the settings record.
pub const SETTINGS_KEY: &str = "threadchat-settings";
/// Key of the collapsed thread-id set.
pub const COLLAPSED_KEY: &str = "threadchat-collapsed";

/// Envelope version written by this build.
pub const RECORD_VERSION: u64 = 1;

#[derive(Serialize)]
struct Record<'a, T: Serialize> {
    version: u64,
    data: &'a T,
}

#[derive(Debug, Clone)]
struct State {
    threads: Vec<Thread>,
    messages: BTreeMap<String, Vec<Message>>,
    settings: Settings,
    collapsed: BTreeSet<String>,
    active: String,
}

impl State {
    fn contains(&self, id: &str) -> bool {
        self.threads.iter().any(|thread| thread.id == id)
    }

    fn require(&self, id: &str) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(not_found(id))
        }
    }

    fn next_id(&self, now: OffsetDateTime) -> String {
        let mut millis = unix_millis(now);
        while self.contains(&millis.to_string()) {
            millis += 1;
        }
        millis.to_string()
    }

    fn push_thread(&mut self, seed: Option<Message>) -> Thread {
        let now = OffsetDateTime::now_utc();
        let thread = Thread::new(self.next_id(now), now);
        self.threads.insert(0, thread.clone());
        if let Some(message) = seed {
            self.messages.insert(thread.id.clone(), vec![message]);
        }
        self.active = thread.id.clone();
        thread
    }
}

/// Threads, messages and settings, mirrored into a key-value backend.
pub struct ConversationStore {
    storage: Box<dyn KeyValueStore>,
    state: State,
}

impl ConversationStore {
    /// Rehydrates state from `storage`, filling in defaults for absent records.
    ///
    /// Message entries and collapsed flags that name no thread are dropped.  If the thread list
    /// is empty a fresh thread is created so that there is always an active thread.
    ///
    /// # Errors
    ///
    /// Fails if a record cannot be read or parsed, or carries a newer version than this build
    /// understands.
    pub fn load(storage: impl KeyValueStore + 'static) -> Result<Self> {
        let storage: Box<dyn KeyValueStore> = Box::new(storage);
        let threads: Option<Vec<Thread>> = read_record(storage.as_ref(), THREADS_KEY)?;
        let mut messages: BTreeMap<String, Vec<Message>> =
            read_record(storage.as_ref(), MESSAGES_KEY)?.unwrap_or_default();
        let settings: Settings = read_record(storage.as_ref(), SETTINGS_KEY)?
            .map(Settings::sanitized)
            .unwrap_or_default();
        let mut collapsed: BTreeSet<String> =
            read_record(storage.as_ref(), COLLAPSED_KEY)?.unwrap_or_default();

        let fresh = threads.is_none();
        let threads = threads.unwrap_or_else(|| {
            let now = OffsetDateTime::now_utc();
            vec![Thread::new(unix_millis(now).to_string(), now)]
        });
        messages.retain(|id, _| threads.iter().any(|thread| &thread.id == id));
        collapsed.retain(|id| threads.iter().any(|thread| &thread.id == id));

        let mut store = Self {
            storage,
            state: State {
                active: threads.first().map(|t| t.id.clone()).unwrap_or_default(),
                threads,
                messages,
                settings,
                collapsed,
            },
        };
        if store.state.threads.is_empty() {
            store.create_thread()?;
        } else if fresh {
            store.persist()?;
        }
        Ok(store)
    }

    /// All threads, newest first.
    pub fn threads(&self) -> &[Thread] {
        &self.state.threads
    }

    /// Looks up a thread by id.
    pub fn thread(&self, id: &str) -> Option<&Thread> {
        self.state.threads.iter().find(|thread| thread.id == id)
    }

    /// Returns true if a thread with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.state.contains(id)
    }

    /// The messages of a thread, oldest first.  Unknown threads have no messages.
    pub fn messages(&self, id: &str) -> &[Message] {
        self.state
            .messages
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The id of the active thread.
    pub fn active_id(&self) -> &str {
        &self.state.active
    }

    /// The active thread.
    pub fn active_thread(&self) -> Option<&Thread> {
        self.thread(&self.state.active)
    }

    /// The messages of the active thread.
    pub fn active_messages(&self) -> &[Message] {
        self.messages(&self.state.active)
    }

    /// The global settings.
    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    /// Returns true if the thread's message list is collapsed.
    pub fn is_collapsed(&self, id: &str) -> bool {
        self.state.collapsed.contains(id)
    }

    /// Total number of messages across all threads.
    pub fn message_count(&self) -> usize {
        self.state.messages.values().map(Vec::len).sum()
    }

    /// Prepends a thread titled "New conversation" and makes it active.
    pub fn create_thread(&mut self) -> Result<Thread> {
        self.transact(|state| Ok(state.push_thread(None)))
    }

    /// Creates a thread as [`create_thread`](Self::create_thread) does and seeds it with a
    /// system message.
    pub fn create_seeded_thread(&mut self, system_prompt: &str) -> Result<Thread> {
        self.transact(|state| Ok(state.push_thread(Some(Message::system(system_prompt)))))
    }

    /// Makes an existing thread active.  The active thread is not persisted.
    pub fn select_thread(&mut self, id: &str) -> Result<()> {
        self.state.require(id)?;
        self.state.active = id.to_string();
        Ok(())
    }

    /// Deletes a thread together with its messages and collapsed flag.
    ///
    /// When the active thread is deleted the first remaining thread becomes active, or a new
    /// thread is created if none remain.  Deleting any other thread leaves the active thread
    /// alone.
    pub fn delete_thread(&mut self, id: &str) -> Result<()> {
        self.transact(|state| {
            state.require(id)?;
            state.threads.retain(|thread| thread.id != id);
            state.messages.remove(id);
            state.collapsed.remove(id);
            if state.active == id {
                match state.threads.first() {
                    Some(first) => state.active = first.id.clone(),
                    None => {
                        state.push_thread(None);
                    }
                }
            }
            Ok(())
        })
    }

    /// Appends a message to the end of a thread.
    pub fn append_message(&mut self, thread_id: &str, message: Message) -> Result<()> {
        self.transact(|state| {
            state.require(thread_id)?;
            state
                .messages
                .entry(thread_id.to_string())
                .or_default()
                .push(message);
            Ok(())
        })
    }

    /// Replaces a thread's message sequence wholesale.
    pub fn rollback(&mut self, thread_id: &str, prior_messages: Vec<Message>) -> Result<()> {
        self.transact(|state| {
            state.require(thread_id)?;
            if prior_messages.is_empty() {
                state.messages.remove(thread_id);
            } else {
                state.messages.insert(thread_id.to_string(), prior_messages);
            }
            Ok(())
        })
    }

    /// Titles the thread from `message` if it still has the default title.
    ///
    /// Returns true if the title changed.
    pub fn set_title_if_default(&mut self, thread_id: &str, message: &Message) -> Result<bool> {
        let Some(thread) = self.thread(thread_id) else {
            return Err(not_found(thread_id));
        };
        if !thread.has_default_title() {
            return Ok(false);
        }
        self.transact(|state| {
            if let Some(thread) = state.threads.iter_mut().find(|t| t.id == thread_id) {
                thread.title = derive_title(message);
            }
            Ok(true)
        })
    }

    /// Replaces the global settings.
    pub fn set_settings(&mut self, settings: Settings) -> Result<()> {
        self.transact(|state| {
            state.settings = settings;
            Ok(())
        })
    }

    /// Changes the model.
    pub fn set_model(&mut self, model: Model) -> Result<()> {
        let settings = self.state.settings.clone().with_model(model);
        self.set_settings(settings)
    }

    /// Changes the temperature, which must lie in `[0, 1]`.
    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        let settings = self.state.settings.clone().with_temperature(temperature)?;
        self.set_settings(settings)
    }

    /// Flips the collapsed flag of a thread and returns the new state.
    pub fn toggle_collapsed(&mut self, id: &str) -> Result<bool> {
        self.transact(|state| {
            state.require(id)?;
            if state.collapsed.remove(id) {
                Ok(false)
            } else {
                state.collapsed.insert(id.to_string());
                Ok(true)
            }
        })
    }

    /// Writes every record to the backend.
    pub fn persist(&mut self) -> Result<()> {
        let state = self.state.clone();
        self.write(&state)
    }

    /// Applies `mutate` to a copy of the state and commits the copy once it has been written.
    fn transact<T>(&mut self, mutate: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut next = self.state.clone();
        let output = mutate(&mut next)?;
        self.write(&next)?;
        self.state = next;
        Ok(output)
    }

    fn write(&mut self, state: &State) -> Result<()> {
        let result = self.write_all(state);
        match &result {
            Ok(()) => STORE_WRITES.click(),
            Err(_) => STORE_WRITE_ERRORS.click(),
        }
        result
    }

    fn write_all(&mut self, state: &State) -> Result<()> {
        let threads = encode_record(&state.threads)?;
        let messages = encode_record(&state.messages)?;
        let settings = encode_record(&state.settings)?;
        let collapsed = encode_record(&state.collapsed)?;
        self.storage.set(THREADS_KEY, &threads)?;
        self.storage.set(MESSAGES_KEY, &messages)?;
        self.storage.set(SETTINGS_KEY, &settings)?;
        self.storage.set(COLLAPSED_KEY, &collapsed)
    }
}

fn not_found(id: &str) -> Error {
    Error::not_found("no such thread", Some(id.to_string()))
}

fn encode_record<T: Serialize>(data: &T) -> Result<String> {
    Ok(serde_json::to_string(&Record {
        version: RECORD_VERSION,
        data,
    })?)
}

fn read_record<T: DeserializeOwned>(storage: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match storage.get(key)? {
        Some(raw) => decode_record(key, &raw).map(Some),
        None => Ok(None),
    }
}

/// Decodes an enveloped record, or a bare pre-envelope value.
fn decode_record<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    let value: Value = serde_json::from_str(raw).map_err(|err| {
        Error::serialization(format!("failed to parse {key}"), Some(Box::new(err)))
    })?;
    let data = match value {
        Value::Object(mut map) if map.len() == 2 && map.contains_key("version") => {
            let version = map.get("version").and_then(Value::as_u64).ok_or_else(|| {
                Error::serialization(format!("{key} has a malformed version"), None)
            })?;
            if version > RECORD_VERSION {
                return Err(Error::serialization(
                    format!("{key} was written by a newer version ({version})"),
                    None,
                ));
            }
            map.remove("data").ok_or_else(|| {
                Error::serialization(format!("{key} has a version but no data"), None)
            })?
        }
        bare => bare,
    };
    serde_json::from_value(data).map_err(|err| {
        Error::serialization(format!("failed to decode {key}"), Some(Box::new(err)))
    })
}
