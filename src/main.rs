#![forbid(unsafe_code)]

//! `acp-adapter`: Agent Client Protocol adapter binary.
//!
//! Speaks ACP to the host editor on stdin/stdout and hosts conversations
//! either in a local engine process or in a cloud sandbox.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use acp_adapter::acp::connection::Client;
use acp_adapter::acp::server::serve;
use acp_adapter::acp::trace::ProtocolTrace;
use acp_adapter::acp::writer::run_writer;
use acp_adapter::config::GlobalConfig;
use acp_adapter::mode::AgentKind;
use acp_adapter::session::{
    AcpAgent, AgentSettings, CloudProvider, ConfirmationMode, LocalProvider, SessionProvider,
};
use acp_adapter::{AppError, Result};

/// Capacity of the host-bound message queue.
const OUTBOUND_CAPACITY: usize = 256;

/// How long the writer may take to flush after the host loop ends.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "acp-adapter", about = "Agent Client Protocol adapter", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where conversations are hosted.
    #[arg(long, value_enum, default_value_t = AgentKind::Local)]
    mode: AgentKind,

    /// Confirmation mode for new sessions.
    #[arg(long, value_enum)]
    confirmation_mode: Option<ConfirmationMode>,

    /// Conversation id reused by the first `session/new`.
    #[arg(long)]
    resume: Option<String>,

    /// Forward token-level deltas while the engine generates.
    #[arg(long)]
    streaming: bool,

    /// Override the cloud API base URL.
    #[arg(long)]
    cloud_api_url: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Record all protocol traffic to a JSONL trace file.
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format, args.log_file.as_deref())?;
    info!(mode = args.mode.as_str(), "acp-adapter starting");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(mode) = args.confirmation_mode {
        config.default_confirmation_mode = mode;
    }
    if args.streaming {
        config.streaming = true;
    }
    if let Some(url) = args.cloud_api_url {
        config.cloud.api_url = url;
    }
    config.validate()?;
    if args.mode == AgentKind::Cloud {
        config.load_credentials().await?;
    }
    info!(
        persistence_dir = %config.persistence_dir.display(),
        streaming = config.streaming,
        "configuration loaded"
    );

    let trace = if args.debug {
        let trace = ProtocolTrace::create(&config.debug_trace_dir())?;
        info!(path = %trace.path().display(), "protocol trace enabled");
        Some(Arc::new(trace))
    } else {
        None
    };

    // ── Host output ─────────────────────────────────────
    let writer_cancel = CancellationToken::new();
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let mut writer = tokio::spawn(run_writer(
        "host".to_owned(),
        tokio::io::stdout(),
        out_rx,
        writer_cancel.clone(),
        trace.clone(),
    ));
    let client = Client::new(out_tx);

    // ── Serve until EOF or signal ───────────────────────
    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    let settings = AgentSettings::from_config(&config, args.resume);
    let outcome = match args.mode {
        AgentKind::Local => {
            let provider = LocalProvider::new(&config);
            info!(conversations = %provider.conversations_dir().display(), "local mode");
            serve_with(provider, settings, client, ct, trace).await
        }
        AgentKind::Cloud => {
            let provider = CloudProvider::new(&config);
            info!(
                api_url = config.cloud.api_url.as_str(),
                authenticated = provider.has_api_key(),
                "cloud mode"
            );
            serve_with(provider, settings, client, ct, trace).await
        }
    };
    if let Err(err) = &outcome {
        error!(%err, "host connection failed");
    }

    // ── Drain host output ───────────────────────────────
    match tokio::time::timeout(WRITER_DRAIN, &mut writer).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => warn!(%err, "writer stopped with error"),
        Ok(Err(err)) => warn!(%err, "writer task failed"),
        Err(_) => {
            writer_cancel.cancel();
            let _ = writer.await;
        }
    }
    info!("acp-adapter shut down");
    outcome
}

async fn serve_with<P: SessionProvider>(
    provider: P,
    settings: AgentSettings,
    client: Client,
    ct: CancellationToken,
    trace: Option<Arc<ProtocolTrace>>,
) -> Result<()> {
    let agent = Arc::new(AcpAgent::new(provider, client.clone(), settings));
    serve(agent, client, tokio::io::stdin(), ct, trace).await
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

/// Logs never go to stdout: it carries the protocol.
fn init_tracing(log_format: LogFormat, log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| {
                    AppError::Config(format!("cannot open log file {}: {err}", path.display()))
                })?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none());

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
