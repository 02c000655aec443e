//! Interactive multi-thread chat against an OpenAI-compatible completion endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage; the key comes from THREADCHAT_API_KEY or the config file
//! threadchat
//!
//! # Use another endpoint and keep nothing on disk
//! threadchat --endpoint http://localhost:8080/v1/chat/completions --ephemeral
//!
//! # Record every request and response
//! threadchat --log-file threadchat.jsonl
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/new` - Start a new thread
//! - `/threads` - List threads
//! - `/switch <n>` - Switch threads
//! - `/retry` - Retry the last failed request
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread;

use arrrg::CommandLine;
use futures::future::BoxFuture;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use threadchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, CopyDestination, InputBuffer, PendingTurn,
    PlainTextRenderer, Renderer, TurnOutcome, copy_text, help_text, parse_command,
};
use threadchat::{
    CompletionClient, ConversationStore, FileStore, JsonLinesLogger, KnownModel, MemoryStore,
    Message, Model,
};

type Session = ChatSession<CompletionClient>;
type InFlight = Option<(PendingTurn, BoxFuture<'static, threadchat::Result<Message>>)>;

/// What the line-editor thread reports.
enum InputEvent {
    Line(String),
    Interrupted,
    Eof,
    Failed(String),
}

enum Step {
    Input(Option<InputEvent>),
    Reply(threadchat::Result<Message>),
}

enum Control {
    Continue,
    Quit,
}

/// Main entry point for the threadchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("threadchat [OPTIONS]");
    let config = ChatConfig::resolve(args)?;

    let mut client =
        CompletionClient::with_options(config.api_key.clone(), Some(config.endpoint.clone()))?;
    if let Some(path) = &config.log_file {
        client = client.with_logger(Arc::new(JsonLinesLogger::create(path)?));
    }
    let mut store = match &config.data_dir {
        Some(dir) => ConversationStore::load(FileStore::open(dir)?)?,
        None => ConversationStore::load(MemoryStore::new())?,
    };
    if let Some(model) = config.model {
        store.set_model(Model::Known(model))?;
    }

    let mut session = ChatSession::new(client, store);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    let settings = session.settings();
    println!(
        "threadchat (model: {}, temperature: {:.1})",
        settings.model.short_label(),
        settings.temperature
    );
    println!("Type /help for commands, /quit to exit\n");
    renderer.print_transcript(session.store());

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = std_mpsc::channel();
    spawn_reader(event_tx, ready_rx);

    let mut in_flight: InFlight = None;
    loop {
        let step = match in_flight.as_mut() {
            Some((_, request)) => tokio::select! {
                result = request => Step::Reply(result),
                event = events.recv() => Step::Input(event),
            },
            None => Step::Input(events.recv().await),
        };

        match step {
            Step::Reply(result) => {
                if let Some((pending, _)) = in_flight.take() {
                    finish(&mut session, &mut renderer, pending, result);
                }
            }
            Step::Input(None) | Step::Input(Some(InputEvent::Eof)) => {
                println!("\nGoodbye!");
                break;
            }
            Step::Input(Some(InputEvent::Failed(err))) => {
                eprintln!("Input error: {err}");
                break;
            }
            Step::Input(Some(InputEvent::Interrupted)) => {
                renderer.print_info("(use /quit to exit)");
                let _ = ready_tx.send(());
            }
            Step::Input(Some(InputEvent::Line(line))) => {
                let control = handle_line(&mut session, &mut renderer, &mut in_flight, &line);
                if let Control::Quit = control {
                    println!("Goodbye!");
                    break;
                }
                let _ = ready_tx.send(());
            }
        }
    }

    Ok(())
}

/// Runs the line editor on its own thread so input stays live while a request is outstanding.
///
/// After each event the thread waits on `ready` so command output prints before the next prompt.
fn spawn_reader(events: mpsc::UnboundedSender<InputEvent>, ready: std_mpsc::Receiver<()>) {
    thread::spawn(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(err) => {
                let _ = events.send(InputEvent::Failed(err.to_string()));
                return;
            }
        };
        let mut buffer = InputBuffer::new();
        loop {
            let event = match editor.readline(buffer.prompt()) {
                Ok(line) => match buffer.push(&line) {
                    Some(input) => {
                        if !input.trim().is_empty() {
                            let _ = editor.add_history_entry(input.as_str());
                        }
                        InputEvent::Line(input)
                    }
                    None => continue,
                },
                Err(ReadlineError::Interrupted) => {
                    buffer.clear();
                    InputEvent::Interrupted
                }
                Err(ReadlineError::Eof) => InputEvent::Eof,
                Err(err) => InputEvent::Failed(err.to_string()),
            };
            let last = matches!(event, InputEvent::Eof | InputEvent::Failed(_));
            if events.send(event).is_err() || last || ready.recv().is_err() {
                break;
            }
        }
    });
}

fn handle_line(
    session: &mut Session,
    renderer: &mut PlainTextRenderer,
    in_flight: &mut InFlight,
    line: &str,
) -> Control {
    let Some(command) = parse_command(line) else {
        if line.trim().is_empty() {
            return Control::Continue;
        }
        if session.is_loading() {
            renderer.print_info("A response is still generating; your message was not sent.");
            return Control::Continue;
        }
        let started = session.begin_submit(line);
        start(session, renderer, in_flight, started);
        return Control::Continue;
    };

    match command {
        ChatCommand::Quit => return Control::Quit,
        ChatCommand::New => {
            report(renderer, session.new_thread().map(|_| ()));
            renderer.print_transcript(session.store());
        }
        ChatCommand::Writer => {
            report(renderer, session.new_writer_thread().map(|_| ()));
            renderer.print_transcript(session.store());
        }
        ChatCommand::Threads => renderer.print_threads(session.store()),
        ChatCommand::Switch(index) => match thread_at(session, Some(index)) {
            Some(id) => {
                report(renderer, session.select_thread(&id));
                renderer.print_transcript(session.store());
            }
            None => renderer.print_info(&format!("No thread {index}; see /threads.")),
        },
        ChatCommand::Delete(index) => match thread_at(session, index) {
            Some(id) => {
                let title = session
                    .store()
                    .thread(&id)
                    .map(|thread| thread.title.clone())
                    .unwrap_or_default();
                match session.delete_thread(&id) {
                    Ok(()) => renderer.print_info(&format!("Deleted \"{title}\".")),
                    Err(err) => renderer.print_info(&format!("Error: {err}")),
                }
            }
            None => renderer.print_info("No such thread; see /threads."),
        },
        ChatCommand::Collapse(index) => match thread_at(session, index) {
            Some(id) => match session.toggle_collapsed(&id) {
                Ok(true) => renderer.print_info("Thread collapsed."),
                Ok(false) => renderer.print_info("Thread expanded."),
                Err(err) => renderer.print_info(&format!("Error: {err}")),
            },
            None => renderer.print_info("No such thread; see /threads."),
        },
        ChatCommand::Show => {
            renderer.print_transcript(session.store());
            if let Some(error) = session.error() {
                renderer.print_error(error);
            }
        }
        ChatCommand::Model(model) => match session.set_model(model) {
            Ok(()) => renderer.print_info(&format!(
                "Model set to {}.",
                Model::Known(model).menu_label()
            )),
            Err(err) => renderer.print_info(&format!("Error: {err}")),
        },
        ChatCommand::ListModels => {
            let current = &session.settings().model;
            for model in KnownModel::ALL {
                let marker = if *current == Model::Known(model) {
                    '*'
                } else {
                    ' '
                };
                renderer.print_info(&format!(
                    "{marker} {:<20} {}",
                    Model::Known(model).menu_label(),
                    model
                ));
            }
        }
        ChatCommand::Temperature(value) => match session.set_temperature(value) {
            Ok(()) => renderer.print_info(&format!(
                "Temperature set to {:.1}.",
                session.settings().temperature
            )),
            Err(err) => renderer.print_info(err.message()),
        },
        ChatCommand::Regenerate => {
            if session.is_loading() {
                renderer.print_info("A response is still generating.");
            } else {
                let started = session.begin_regenerate();
                start(session, renderer, in_flight, started);
            }
        }
        ChatCommand::Retry => {
            if session.is_loading() {
                renderer.print_info("A response is still generating.");
            } else {
                let started = session.begin_retry();
                start(session, renderer, in_flight, started);
            }
        }
        ChatCommand::Copy(index) => match session.copy_target(index) {
            Some(message) => match copy_text(&message.content) {
                Ok(CopyDestination::Clipboard) => renderer.print_info("Copied to clipboard."),
                Ok(CopyDestination::Printed) => {}
                Err(err) => renderer.print_info(&format!("Copy failed: {err}")),
            },
            None => renderer.print_info("No such message."),
        },
        ChatCommand::Settings => renderer.print_settings(session.settings()),
        ChatCommand::Stats => print_stats(session),
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
        }
        ChatCommand::Invalid(message) => renderer.print_info(&message),
    }
    Control::Continue
}

fn start(
    session: &Session,
    renderer: &mut PlainTextRenderer,
    in_flight: &mut InFlight,
    started: threadchat::Result<Option<PendingTurn>>,
) {
    match started {
        Ok(Some(pending)) => {
            renderer.print_generating();
            let request = session.dispatch(&pending);
            *in_flight = Some((pending, request));
        }
        Ok(None) => renderer.print_info("Nothing to send."),
        Err(err) => renderer.print_info(&format!("Error: {err}")),
    }
}

fn finish(
    session: &mut Session,
    renderer: &mut PlainTextRenderer,
    pending: PendingTurn,
    result: threadchat::Result<Message>,
) {
    let thread_id = pending.thread_id().to_string();
    match session.finish_turn(pending, result) {
        Ok(TurnOutcome::Replied(reply)) => {
            let store = session.store();
            if store.active_id() == thread_id && !store.is_collapsed(&thread_id) {
                println!();
                renderer.print_message(&reply);
            } else {
                let title = store
                    .thread(&thread_id)
                    .map(|thread| thread.title.as_str())
                    .unwrap_or_default();
                renderer.print_info(&format!("\nReply added to \"{title}\"."));
            }
        }
        Ok(TurnOutcome::Failed(_)) => {
            if let Some(error) = session.error() {
                renderer.print_error(error);
            }
        }
        Ok(TurnOutcome::Discarded) => {
            renderer.print_info("\nReply discarded; its thread was deleted.");
        }
        Err(err) => renderer.print_info(&format!("Error: {err}")),
    }
}

fn thread_at(session: &Session, index: Option<usize>) -> Option<String> {
    match index {
        Some(index) => session
            .store()
            .threads()
            .get(index.checked_sub(1)?)
            .map(|thread| thread.id.clone()),
        None => Some(session.store().active_id().to_string()),
    }
}

fn report(renderer: &mut PlainTextRenderer, result: threadchat::Result<()>) {
    if let Err(err) = result {
        renderer.print_info(&format!("Error: {err}"));
    }
}

fn print_stats(session: &Session) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!(
        "      Model: {} ({})",
        stats.model.short_label(),
        stats.model
    );
    println!("      Temperature: {:.1}", stats.temperature);
    println!("      Threads: {}", stats.thread_count);
    println!(
        "      Messages: {} ({} in this thread)",
        stats.message_count, stats.active_message_count
    );
    println!(
        "      Requests: {} ({} failed)",
        stats.total_requests, stats.failed_requests
    );
}
