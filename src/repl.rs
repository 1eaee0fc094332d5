//! Line-oriented terminal front-end

use crate::session::{SessionController, SessionUpdate, SessionView};
use crate::state_machine::{Message, MessageId, Role, TurnOutcome, TurnState};
use crate::transport::Transport;
use crate::upload::UploadFile;
use chrono::{DateTime, Local, Utc};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;

pub const STARTER_PROMPTS: [&str; 4] = [
    "How do I write a for loop in C++ like in Python?",
    "What's the C++ equivalent of Python lists?",
    "Why do I need to declare variable types in C++?",
    "Can you explain C++ classes compared to Python?",
];

const HELP: &str = "\
Commands:
  <text>                  ask a question
  /1 .. /4                ask a starter prompt
  /upload <path> [prompt] upload a .py or .cpp file for analysis
  /stop                   stop the current response (or press Ctrl-C)
  /history                print the conversation as JSON
  /help                   show this help
  /quit                   exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    /// Zero-based index into [`STARTER_PROMPTS`]
    Starter(usize),
    Upload {
        path: PathBuf,
        prompt: Option<String>,
    },
    Stop,
    History,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    if !trimmed.starts_with('/') {
        return Command::Ask(line.trim_end_matches(['\r', '\n']).to_string());
    }

    let (name, rest) = trimmed
        .split_once(char::is_whitespace)
        .map_or((trimmed, ""), |(name, rest)| (name, rest.trim()));

    match name {
        "/1" | "/2" | "/3" | "/4" => name
            .trim_start_matches('/')
            .parse::<usize>()
            .map_or_else(|_| Command::Unknown(name.to_string()), |n| Command::Starter(n - 1)),
        "/upload" if !rest.is_empty() => {
            let (path, prompt) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, ""), |(path, prompt)| (path, prompt.trim()));
            Command::Upload {
                path: PathBuf::from(path),
                prompt: (!prompt.is_empty()).then(|| prompt.to_string()),
            }
        }
        "/stop" => Command::Stop,
        "/history" => Command::History,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Turns session updates into transcript text
#[derive(Debug, Default)]
pub struct Renderer {
    /// Streaming target and how many bytes of it are already on screen
    streaming: Option<(MessageId, usize)>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Banner and starter prompts for an empty conversation
    pub fn welcome(out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "AI Tutoring Assistant")?;
        writeln!(out, "Get help transitioning from Python to C++")?;
        writeln!(out)?;
        writeln!(
            out,
            "Ask questions about transitioning from Python to C++, or upload your"
        )?;
        writeln!(
            out,
            "Python (.py) or C++ (.cpp) files for analysis and feedback."
        )?;
        writeln!(out)?;
        writeln!(out, "Try one of these:")?;
        for (i, prompt) in STARTER_PROMPTS.iter().enumerate() {
            writeln!(out, "  /{} {prompt}", i + 1)?;
        }
        writeln!(out, "Type /help for all commands.")?;
        out.flush()
    }

    pub fn render(&mut self, update: &SessionUpdate, out: &mut impl Write) -> io::Result<()> {
        match update {
            // An empty bot message is the start of a reveal
            SessionUpdate::MessageAppended(message)
                if message.role == Role::Bot && !message.is_error && message.content.is_empty() =>
            {
                write!(out, "{}: ", speaker(message))?;
                self.streaming = Some((message.id, 0));
            }
            SessionUpdate::MessageAppended(message) => {
                self.finish_stream(out)?;
                writeln!(out, "{}", format_message(message))?;
            }
            SessionUpdate::ContentAppended {
                message_id,
                offset,
                chunk,
            } => self.write_chunk(*message_id, *offset, chunk, out)?,
            SessionUpdate::StateChanged(TurnState::AwaitingResponse { .. }) => {
                writeln!(out, "Thinking...")?;
            }
            SessionUpdate::StateChanged(TurnState::CancellingRequest { .. }) => {
                writeln!(out, "Stopping...")?;
            }
            SessionUpdate::StateChanged(_) => {}
            SessionUpdate::TurnFinished { outcome } => {
                if self.streaming.is_some() && *outcome == TurnOutcome::CancelledDuringReveal {
                    write!(out, " [stopped]")?;
                }
                self.finish_stream(out)?;
            }
            SessionUpdate::Rejected { reason } => {
                writeln!(out, "! {reason}")?;
            }
        }
        out.flush()
    }

    /// Catch the streaming target up after missed updates
    pub fn resync(&mut self, view: &SessionView, out: &mut impl Write) -> io::Result<()> {
        let Some((id, _)) = self.streaming else {
            return Ok(());
        };
        if let Some(message) = view.messages.iter().find(|m| m.id == id) {
            self.write_chunk(id, 0, &message.content, out)?;
        }
        out.flush()
    }

    /// Print the part of `chunk` (starting at byte `offset` of the target's
    /// content) not yet on screen
    fn write_chunk(
        &mut self,
        id: MessageId,
        offset: usize,
        chunk: &str,
        out: &mut impl Write,
    ) -> io::Result<()> {
        let Some((target, printed)) = self.streaming.as_mut() else {
            return Ok(());
        };
        if *target != id {
            return Ok(());
        }
        // Chunks replayed after a resync overlap what is already printed
        let fresh = printed
            .checked_sub(offset)
            .and_then(|seen| chunk.get(seen..));
        if let Some(fresh) = fresh {
            write!(out, "{fresh}")?;
            *printed = offset + chunk.len();
        }
        Ok(())
    }

    fn finish_stream(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.streaming.take().is_some() {
            writeln!(out)?;
        }
        Ok(())
    }
}

pub fn format_message(message: &Message) -> String {
    let mut line = match message.role {
        Role::System => format!("* {}", message.content),
        Role::User | Role::Bot => format!("{}: {}", speaker(message), message.content),
    };
    if let Some(file) = &message.attached_file {
        line.push_str(&format!("\n  [{} | {}]", file.name, file.kind.label()));
    }
    line
}

/// Local wall-clock time as HH:MM
pub fn clock(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

fn speaker(message: &Message) -> String {
    let name = match (message.role, message.is_error) {
        (Role::User, _) => "You",
        (Role::Bot, false) => "Tutor",
        (Role::Bot, true) => "Tutor [error]",
        (Role::System, _) => "*",
    };
    match message.timestamp {
        Some(at) => format!("[{}] {name}", clock(at)),
        None => name.to_string(),
    }
}

// ============================================================================
// Loop
// ============================================================================

/// Run the REPL until `/quit`, or until input ends and the last turn settles
pub async fn run<T, R, W>(
    mut session: SessionController<T>,
    input: R,
    out: &mut W,
) -> io::Result<()>
where
    T: Transport + 'static,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut updates = session.updates();
    let view = session.subscribe();
    let mut renderer = Renderer::new();
    let mut input_closed = false;

    Renderer::welcome(out)?;

    loop {
        if input_closed && session.state().is_idle() {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if !input_closed => {
                let Some(line) = line? else {
                    input_closed = true;
                    continue;
                };
                let command = parse_command(&line);
                if command == Command::Quit {
                    break;
                }
                handle_command(command, &mut session, out).await?;
            }

            update = updates.recv() => match update {
                Ok(update) => renderer.render(&update, out)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Renderer fell behind");
                    let snapshot = view.borrow().clone();
                    renderer.resync(&snapshot, out)?;
                }
                Err(RecvError::Closed) => break,
            },

            () = session.step() => {}

            signal = tokio::signal::ctrl_c() => {
                signal?;
                if session.can_stop() {
                    session.stop();
                } else if session.state().is_idle() {
                    break;
                }
            }
        }
    }

    while let Ok(update) = updates.try_recv() {
        renderer.render(&update, out)?;
    }
    Ok(())
}

async fn handle_command<T: Transport + 'static>(
    command: Command,
    session: &mut SessionController<T>,
    out: &mut impl Write,
) -> io::Result<()> {
    // Rejected submits are reported through the update stream
    match command {
        Command::Ask(prompt) => {
            let _ = session.submit_text(prompt);
        }
        Command::Starter(index) => {
            if let Some(prompt) = STARTER_PROMPTS.get(index) {
                let _ = session.submit_text(*prompt);
            }
        }
        Command::Upload { path, prompt } => match UploadFile::from_path(&path).await {
            Ok(file) => {
                let _ = session.submit_file(file, prompt);
            }
            Err(e) => writeln!(out, "! {e}")?,
        },
        Command::Stop => {
            if !session.stop() {
                writeln!(out, "(nothing to stop)")?;
            }
        }
        Command::History => {
            let json = serde_json::to_string_pretty(&session.messages()).map_err(io::Error::other)?;
            writeln!(out, "{json}")?;
        }
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Unknown(text) => {
            writeln!(out, "Unknown command {text}. Type /help for commands.")?;
        }
        Command::Quit | Command::Empty => {}
    }
    out.flush()
}
