//! Query Chat - terminal client for a natural-language data query service
//!
//! Sends each prompt to the query backend (or a local simulator) and shows
//! the markdown answer together with the SQL that produced it.

mod chat;
mod config;
mod console;
mod ids;
mod session;

#[cfg(test)]
mod testing;

use chat::{ChatClient, HttpBackend, LoggingTransport, Simulator};
use config::{FileConfigStore, Settings};
use session::ConversationStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "query_chat=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let settings = Settings::from_env();

    let client = ChatClient::new(
        HttpBackend::new(settings.request_timeout)?,
        Simulator::new(settings.mock_latency_ms.clone()),
    );
    let transport = Arc::new(LoggingTransport::new(Arc::new(client)));
    let repository = Arc::new(FileConfigStore::new(&settings.config_path));
    tracing::info!(
        config_path = %repository.path().display(),
        timeout_secs = settings.request_timeout.as_secs(),
        "Starting query chat"
    );

    let store = Arc::new(ConversationStore::new(transport, repository));
    console::run(store).await?;

    Ok(())
}
