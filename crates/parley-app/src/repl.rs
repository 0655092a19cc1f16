//! Terminal chat loop for `parley chat`.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::path::{Path, PathBuf};

use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use uuid::Uuid;

use parley_chat::{ChatError, ChatOrchestrator, NoticeKind, TurnOutcome, TurnRequest, Upload};

const COMMANDS: &[&str] = &[
    "/clear",
    "/threads",
    "/thread new ",
    "/thread switch ",
    "/thread delete ",
    "/attach ",
    "/history",
    "/help",
    "/quit",
];

const HELP: &str = "\
/clear                  clear the active thread
/threads                list threads
/thread new <name>      create a thread and switch to it
/thread switch <name>   switch the active thread
/thread delete <name>   delete a thread
/attach <path>          attach a file to the next message
/history                print the active thread
/quit                   exit";

/// One line of input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Say(String),
    Clear,
    Threads,
    NewThread(String),
    SwitchThread(String),
    DeleteThread(String),
    Attach(PathBuf),
    History,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ReplCommand::Empty;
        }
        if !trimmed.starts_with('/') {
            return ReplCommand::Say(line.to_string());
        }

        let (cmd, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (trimmed, ""),
        };
        match (cmd, rest) {
            ("/clear", "") => ReplCommand::Clear,
            ("/threads", "") => ReplCommand::Threads,
            ("/history", "") => ReplCommand::History,
            ("/help", _) => ReplCommand::Help,
            ("/quit" | "/exit", _) => ReplCommand::Quit,
            ("/attach", path) if !path.is_empty() => ReplCommand::Attach(PathBuf::from(path)),
            ("/thread", args) => match args.split_once(char::is_whitespace) {
                Some(("new", name)) => ReplCommand::NewThread(name.trim().to_string()),
                Some(("switch", name)) => ReplCommand::SwitchThread(name.trim().to_string()),
                Some(("delete", name)) => ReplCommand::DeleteThread(name.trim().to_string()),
                _ => ReplCommand::Invalid("usage: /thread new|switch|delete <name>".to_string()),
            },
            _ => ReplCommand::Invalid(format!("unknown command: {}", trimmed)),
        }
    }
}

/// Whether the loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Read a file from disk into an upload named after its file name.
pub fn load_upload(path: &Path) -> std::io::Result<Upload> {
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload::new(filename, None, bytes))
}

fn session_replaced_message(thread: &str) -> String {
    format!(
        "Session expired, started a new one. Earlier threads are gone; now in '{}'.",
        thread
    )
}

/// A terminal conversation bound to one session.
pub struct Repl {
    orchestrator: ChatOrchestrator,
    session_id: Uuid,
    pending: Vec<Upload>,
}

impl Repl {
    /// Start a session, optionally in a named thread (created when missing).
    pub fn new(orchestrator: ChatOrchestrator, thread: Option<&str>) -> Result<Self, ChatError> {
        let session = orchestrator.create_session()?;
        if let Some(name) = thread.map(str::trim).filter(|n| !n.is_empty()) {
            if name != session.active_thread {
                orchestrator.create_thread(session.id, name)?;
                orchestrator.switch_thread(session.id, name)?;
            }
        }
        Ok(Self {
            orchestrator,
            session_id: session.id,
            pending: Vec::new(),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn pending(&self) -> &[Upload] {
        &self.pending
    }

    pub fn orchestrator(&self) -> &ChatOrchestrator {
        &self.orchestrator
    }

    /// Run one command. Chat errors are returned for the caller to print.
    pub async fn execute(&mut self, command: ReplCommand) -> Result<Flow, ChatError> {
        let sid = self.session_id;
        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => return Ok(Flow::Quit),
            ReplCommand::Help => println!("{}", HELP.bright_black()),
            ReplCommand::Invalid(msg) => println!("{}", msg.yellow()),
            ReplCommand::Clear => {
                self.orchestrator.clear(sid, None)?;
                println!("{}", "Thread cleared.".bright_black());
            }
            ReplCommand::History => self.print_transcript(None)?,
            ReplCommand::Threads => {
                for thread in self.orchestrator.list_threads(sid)? {
                    let marker = if thread.active { "*" } else { " " };
                    println!("{} {} ({} messages)", marker, thread.name, thread.message_count);
                }
            }
            ReplCommand::NewThread(name) => {
                self.orchestrator.create_thread(sid, &name)?;
                self.orchestrator.switch_thread(sid, &name)?;
                println!("{}", format!("Switched to new thread '{}'.", name).bright_black());
            }
            ReplCommand::SwitchThread(name) => {
                self.orchestrator.switch_thread(sid, &name)?;
                println!("{}", format!("Switched to '{}'.", name).bright_black());
                self.print_transcript(None)?;
            }
            ReplCommand::DeleteThread(name) => {
                self.orchestrator.delete_thread(sid, &name)?;
                println!("{}", format!("Deleted thread '{}'.", name).bright_black());
            }
            ReplCommand::Attach(path) => match load_upload(&path) {
                Ok(upload) => {
                    println!(
                        "{}",
                        format!(
                            "Attached {} ({} bytes) to the next message.",
                            upload.filename,
                            upload.bytes.len()
                        )
                        .bright_black()
                    );
                    self.pending.push(upload);
                }
                Err(e) => println!("{}", format!("Cannot read {}: {}", path.display(), e).red()),
            },
            ReplCommand::Say(text) => {
                let request = TurnRequest {
                    session_id: Some(sid),
                    thread: None,
                    text,
                    uploads: std::mem::take(&mut self.pending),
                };
                let outcome = self.orchestrator.handle_turn(request).await?;
                self.show_outcome(&outcome)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn show_outcome(&mut self, outcome: &TurnOutcome) -> Result<(), ChatError> {
        if outcome.session_id != self.session_id {
            println!("{}", session_replaced_message(&outcome.thread).yellow());
            self.session_id = outcome.session_id;
        }
        for notice in &outcome.notices {
            match notice.kind {
                NoticeKind::Rejected => println!("{}", format!("! {}", notice.text).yellow()),
                NoticeKind::Error => println!("{}", format!("x {}", notice.text).red()),
            }
        }
        println!(
            "{}",
            format!("[{} / {}]", outcome.thread, outcome.route.destination).bright_black()
        );
        self.print_transcript(Some(outcome.thread.as_str()))
    }

    fn print_transcript(&self, thread: Option<&str>) -> Result<(), ChatError> {
        let transcript = self.orchestrator.transcript(self.session_id, thread)?;
        if transcript.is_empty() {
            println!("{}", "(empty)".bright_black());
        } else {
            println!("{}", transcript);
        }
        println!();
        Ok(())
    }
}

/// Slash-command completion and hints.
#[derive(Clone)]
struct ReplHelper;

impl Helper for ReplHelper {}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') {
            return Ok((0, vec![]));
        }
        let candidates = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.trim_end().to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.len() < 2 || !line.starts_with('/') {
            return None;
        }
        COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].trim_end().to_string())
    }
}

impl Validator for ReplHelper {}

/// Run the interactive loop until `/quit` or end of input.
pub async fn run(mut repl: Repl) -> Result<(), Box<dyn std::error::Error>> {
    let mut rl = Editor::<ReplHelper, DefaultHistory>::new()?;
    rl.set_helper(Some(ReplHelper));

    println!("{}", "=== Parley ===".bright_magenta().bold());
    println!(
        "{}",
        "Type a message, /help for commands, /quit to exit.".bright_black()
    );
    println!();

    loop {
        let readline = tokio::task::block_in_place(|| rl.readline(">> "));
        match readline {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                match repl.execute(ReplCommand::parse(&line)).await {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => println!("{}", e.to_string().red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type /quit to exit.".yellow());
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    tracing::info!(session_id = %repl.session_id(), "Chat session ended");
    Ok(())
}
