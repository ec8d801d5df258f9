//! Availability-aware streaming client for the JurisPeru answer service
//! (readiness probing, NDJSON answer stream, single wait-and-retry).
//! Used by the `juris` CLI.

pub mod client;
pub mod config;
pub mod error;
pub mod framing;
pub mod messages;
pub mod prober;
pub mod retry;
pub mod session;
pub mod waiter;

pub use client::{AnswerStream, Completion, HttpTransport, StreamingClient, Transport};
pub use config::{default_config_path, Settings};
pub use error::{ConfigError, StreamError};
pub use messages::{parse_line, Document, MalformedEvent, RetrievalContext, StreamEvent};
pub use prober::{HttpProber, Readiness};
pub use retry::{Notice, Orchestrator, Outcome, Presenter};
pub use session::{Session, SessionState};
pub use waiter::{wait_until_ready, WaitPolicy, WaitProgress};

/// Build the HTTP-backed orchestrator described by `settings`.
pub fn connect(
    settings: &Settings,
) -> Result<Orchestrator<HttpProber, HttpTransport>, reqwest::Error> {
    let http = reqwest::Client::builder()
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .build()?;
    let prober = HttpProber::new(http.clone(), settings.api_url(), settings.probe_timeout());
    let transport = HttpTransport::new(http, settings.api_url(), settings.stream_timeout());
    let client = StreamingClient::new(
        transport,
        settings.retrieve.k,
        settings.retrieve.temperature,
    );
    Ok(Orchestrator::new(prober, client, settings.wait_policy()))
}
