//! Startup helpers for the console client.
//!
//! The conversation goes to stdout, logs go to stderr.

use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::chat::render::{TYPING_LINE, latest_choices, render_envelope};
use crate::chat::{ChatConfig, ChatResult, ChatSession, Choice, MessageEnvelope};

/// One line typed at the console.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `/yes`
    Yes,
    /// `/no`
    No,
    /// `/choice N`, 1-based.
    Choice(usize),
    /// `/quit`
    Quit,
    /// Blank line.
    Empty,
    /// Anything else, sent as is.
    Text(String),
    /// A command that could not be understood, with a hint for the user.
    Invalid(String),
}

impl ConsoleCommand {
    /// Parse a console line.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "" => Self::Empty,
            "/yes" => Self::Yes,
            "/no" => Self::No,
            "/quit" => Self::Quit,
            _ => trimmed.strip_prefix("/choice").map_or_else(
                || Self::Text(line.to_string()),
                |rest| match rest.trim().parse::<usize>() {
                    Ok(n) if n > 0 => Self::Choice(n),
                    _ => Self::Invalid("usage: /choice N, with N counted from 1".to_string()),
                },
            ),
        }
    }
}

/// Pick the `n`-th (1-based) choice of the most recent multiple choice prompt.
#[must_use]
pub fn nth_choice(log: &[MessageEnvelope], n: usize) -> Option<Choice> {
    latest_choices(log)?.get(n.checked_sub(1)?).cloned()
}

enum Reply {
    Binary(bool),
    Choice(Choice),
    Text(String),
}

impl Reply {
    async fn send(self, session: &ChatSession) -> ChatResult<MessageEnvelope> {
        match self {
            Self::Binary(is_yes) => session.send_binary_reply(is_yes).await,
            Self::Choice(choice) => session.send_choice(&choice).await,
            Self::Text(text) => session.send_free_text(&text).await,
        }
    }
}

/// Write log entries past `shown` and return the new count.
///
/// # Errors
/// Returns an error if writing fails.
pub fn show_new<W: Write>(
    log: &[MessageEnvelope],
    shown: usize,
    out: &mut W,
) -> io::Result<usize> {
    for envelope in log.iter().skip(shown) {
        for line in render_envelope(envelope, &Local) {
            writeln!(out, "{line}")?;
        }
    }
    Ok(log.len().max(shown))
}

/// Drive one console conversation until `/quit` or end of input.
///
/// Delivery failures are reported and the conversation goes on.
///
/// # Errors
/// Returns an error if the handshake fails or the console cannot be read or written.
pub async fn converse(session: &ChatSession) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut out = io::stdout();
    let thread = session.start().await?;
    info!(thread_id = %thread.id(), "conversation ready");
    let mut shown = show_new(&session.log(), 0, &mut out)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let reply = match ConsoleCommand::parse(&line) {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Empty => continue,
            ConsoleCommand::Invalid(hint) => {
                writeln!(out, "{hint}")?;
                continue;
            }
            ConsoleCommand::Choice(n) => match nth_choice(&session.log(), n) {
                Some(choice) => Reply::Choice(choice),
                None => {
                    writeln!(out, "no choice {n} on offer")?;
                    continue;
                }
            },
            ConsoleCommand::Yes => Reply::Binary(true),
            ConsoleCommand::No => Reply::Binary(false),
            ConsoleCommand::Text(text) => Reply::Text(text),
        };

        // The local message is logged before the send first suspends.
        let out_ref = &mut out;
        let (result, echoed) = tokio::join!(reply.send(session), async move {
            let count = show_new(&session.log(), shown, out_ref)?;
            if session.is_busy() {
                writeln!(out_ref, "{TYPING_LINE}")?;
            }
            Ok::<_, io::Error>(count)
        });
        shown = echoed?;

        if let Err(e) = result {
            warn!(error = %e, retryable = e.is_retryable(), "message not delivered");
            if e.is_retryable() {
                writeln!(out, "! {e}, send it again to retry")?;
            } else {
                writeln!(out, "! {e}")?;
            }
        }
        shown = show_new(&session.log(), shown, &mut out)?;
    }

    Ok(())
}

/// Run the console client.
///
/// # Returns
/// `ExitCode::SUCCESS` when the conversation ends, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting colloquy v{}", env!("CARGO_PKG_VERSION"));

    let config = match ChatConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    info!("Remote endpoint: {}", config.base_url);

    let session = match ChatSession::connect(config) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create session: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(converse(&session)) {
        error!("Conversation error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}
