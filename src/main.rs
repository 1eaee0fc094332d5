//! Tutor chat - terminal client for the AI tutoring assistant
//!
//! Sends questions and source files to the tutoring backend and reveals
//! each answer progressively, with a single Stop control that aborts the
//! request or freezes the reveal.

mod config;
mod repl;
mod reveal;
mod session;
mod state_machine;
mod transport;
mod upload;

use config::ClientConfig;
use reveal::RevealScheduler;
use session::SessionController;
use state_machine::SessionContext;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{HttpTransport, LoggingTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging on stderr so it never mixes with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutor_chat=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let config = ClientConfig::from_env()?;
    tracing::info!(
        backend = %config.backend_url,
        timeout_secs = config.request_timeout.as_secs(),
        reveal_tick_us = config.reveal_tick.as_micros(),
        "Starting tutor chat"
    );

    let http = HttpTransport::new(&config.transport())?;
    let transport = LoggingTransport::new(Arc::new(http));

    let session = SessionController::new(
        transport,
        RevealScheduler::new(config.reveal_tick),
        SessionContext {
            stop_grace: config.stop_grace,
        },
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    repl::run(session, stdin, &mut stdout).await?;

    Ok(())
}
