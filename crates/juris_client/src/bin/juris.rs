//! juris: ask the JurisPeru answer service a question from the terminal.
//! Waits for the service to wake up, streams the answer to stdout, then lists
//! the documents it was based on.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use juris_client::config;
use juris_client::{Notice, Outcome, Presenter, RetrievalContext, Session, Settings, WaitProgress};

#[derive(Parser)]
#[command(name = "juris")]
#[command(about = "Asistente legal para el Perú")]
#[command(version)]
struct Cli {
    /// Config file path (defaults to ~/.juris/config.yaml)
    #[arg(short, long, env = "JURIS_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds to wait for the service to become ready
    #[arg(long)]
    max_wait: Option<u64>,

    /// Seconds between readiness probes
    #[arg(long)]
    interval: Option<u64>,

    /// Question to ask; read from stdin when omitted
    question: Option<String>,
}

/// Writes answer fragments to stdout and everything else to stderr.
struct Terminal {
    out: io::Stdout,
}

impl Presenter for Terminal {
    fn fragment(&mut self, text: &str) {
        let mut out = self.out.lock();
        let _ = write!(out, "{text}");
        let _ = out.flush();
    }

    fn notice(&mut self, notice: &Notice) {
        match notice {
            Notice::Completed => {
                let _ = writeln!(self.out.lock());
            }
            Notice::Interrupted(_) => {
                let _ = writeln!(self.out.lock());
                eprintln!("{notice}");
            }
            _ => eprintln!("{notice}"),
        }
    }

    fn progress(&mut self, progress: WaitProgress) {
        eprintln!(
            "Esperando al servicio... {:.0}% ({}/{})",
            progress.fraction() * 100.0,
            progress.attempt,
            progress.attempts
        );
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => match config::default_config_path() {
            Some(path) => config::load_or_default(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => Settings::default(),
        },
    };
    settings.apply_env(|key| std::env::var(key).ok())?;
    if let Some(max_wait) = cli.max_wait {
        settings.readiness.max_wait_secs = max_wait;
    }
    if let Some(interval) = cli.interval {
        settings.readiness.interval_secs = interval;
    }
    settings.validate()?;
    Ok(settings)
}

fn init_tracing(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_question(cli: &Cli) -> Result<String> {
    let question = match &cli.question {
        Some(q) => q.trim().to_string(),
        None => {
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read question from stdin")?;
            line.trim().to_string()
        }
    };
    if question.is_empty() {
        bail!("no question provided");
    }
    Ok(question)
}

fn print_contexts(contexts: &[RetrievalContext]) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = writeln!(out, "\nDocumentos utilizados:");
    if contexts.is_empty() {
        let _ = writeln!(out, "No se encontraron documentos relacionados.");
        return;
    }
    for (i, ctx) in contexts.iter().enumerate() {
        let doc = &ctx.document;
        let source = if doc.source.is_empty() {
            "N/A"
        } else {
            doc.source.as_str()
        };
        let page = doc.page.map_or_else(|| "?".to_string(), |p| p.to_string());
        let total = doc
            .total_pages
            .map_or_else(|| "?".to_string(), |p| p.to_string());
        let _ = writeln!(out, "\nContexto {}", i + 1);
        let _ = writeln!(out, "  Archivo: {source}");
        let _ = writeln!(out, "  Página: {page} / {total}");
        if let Some(score) = ctx.score {
            let _ = writeln!(out, "  Relevancia: {score:.3}");
        }
        let _ = writeln!(out, "  {}", doc.text);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::from_filename(".env.dev");
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_tracing(&settings);
    tracing::info!(api_url = %settings.api_url(), "settings loaded");

    let question = read_question(&cli)?;
    let orchestrator = juris_client::connect(&settings).context("failed to build HTTP client")?;

    let mut session = Session::new();
    let teardown = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            teardown.cancel();
        }
    });

    let mut terminal = Terminal { out: io::stdout() };
    if !orchestrator.startup_check(&mut session, &mut terminal).await {
        return Ok(ExitCode::FAILURE);
    }

    match orchestrator
        .perform_with_retries(&mut session, &question, &mut terminal)
        .await
    {
        Outcome::Completed => {
            print_contexts(&session.state.contexts);
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Failed => Ok(ExitCode::FAILURE),
    }
}
