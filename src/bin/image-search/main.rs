//! image-search - terminal client for the image search server.
//!
//! # Usage
//!
//! ```bash
//! image-search search "dogs on a beach" -n 16
//! image-search search "harbor at night" --hybrid --json
//! image-search generate --watch
//! image-search progress --watch
//! image-search model status
//! ```
//!
//! A search sent while the model is still loading waits for it and is
//! retried automatically; progress is printed to stderr meanwhile.

mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image_search_client::api::{normalize_max_results, ApiError, RequestOptions, SearchKind};
use image_search_client::config::{self, normalize_base_url};
use image_search_client::{HttpBackend, SearchSession, UiEvent};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

/// Image search client.
///
/// Talks to the search server's HTTP API. Configuration is read from
/// `image-search.json` (or `$IMAGE_SEARCH_CONFIG`) and created with defaults
/// on first run.
#[derive(Parser)]
#[command(name = "image-search", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Server URL (overrides config and IMAGE_SEARCH_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Search images by text, waiting for the model if it is still loading
    Search {
        query: String,

        /// Use hybrid image + document search
        #[arg(long)]
        hybrid: bool,

        /// Maximum number of results (4, 8, 16 or 32)
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
    /// Show server statistics
    Status,
    /// Show embedding generation progress
    Progress {
        /// Keep polling until the running job finishes
        #[arg(long)]
        watch: bool,
    },
    /// Start embedding generation on the server
    Generate {
        /// Follow the job until it finishes
        #[arg(long)]
        watch: bool,
    },
    /// Show an image and its linked documents
    Details { hash: String },
    /// Control the search model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    Load,
    Unload,
    Status,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(config::config_path);
    let mut config = config::load_or_create(&config_path).map_err(anyhow::Error::msg)?;
    config.apply_env_overrides();
    if let Some(url) = &cli.url {
        config.base_url = normalize_base_url(url);
    }
    if let Command::Search {
        limit: Some(limit), ..
    } = &cli.command
    {
        config.max_results = normalize_max_results(*limit);
    }

    let backend = HttpBackend::from_config(&config).context("Failed to create HTTP client")?;
    tracing::info!("Using server {}", backend.base_url());

    let session = SearchSession::new(Arc::new(backend), config);
    let mut events = session.subscribe();
    let json = cli.json;

    match cli.command {
        Command::Search { query, hybrid, .. } => {
            let kind = if hybrid {
                SearchKind::Hybrid
            } else {
                SearchKind::Image
            };
            let response = drive(session.search(&query, kind), &mut events, json).await?;
            println!(
                "{}",
                if json {
                    output::to_json(&response)
                } else {
                    output::format_search(&response)
                }
            );
        }
        Command::Status => {
            let status = drive(
                session.server_status(RequestOptions::quiet()),
                &mut events,
                json,
            )
            .await?;
            println!(
                "{}",
                if json {
                    output::to_json(&status)
                } else {
                    output::format_status(&status)
                }
            );
        }
        Command::Progress { watch } => {
            let snapshot = drive(
                session.embedding_progress(RequestOptions::quiet()),
                &mut events,
                json,
            )
            .await?;
            println!(
                "{}",
                if json {
                    output::to_json(&snapshot)
                } else {
                    output::format_progress_line(&snapshot)
                }
            );
            if watch && snapshot.active {
                session.track_job();
                wait_for_job(&session, &mut events, json).await;
            }
        }
        Command::Generate { watch } => {
            let response = drive(
                session.generate_embeddings(RequestOptions::quiet()),
                &mut events,
                json,
            )
            .await?;
            if json {
                println!("{}", output::to_json(&response));
            }
            if watch {
                wait_for_job(&session, &mut events, json).await;
            } else {
                session.stop_progress();
            }
        }
        Command::Details { hash } => {
            let details = drive(
                session.image_details(&hash, RequestOptions::quiet()),
                &mut events,
                json,
            )
            .await?;
            println!(
                "{}",
                if json {
                    output::to_json(&details)
                } else {
                    output::format_details(&details)
                }
            );
        }
        Command::Model { action } => {
            let options = RequestOptions::quiet();
            match action {
                ModelAction::Load => {
                    drive(session.load_model(options), &mut events, json).await?;
                }
                ModelAction::Unload => {
                    drive(session.unload_model(options), &mut events, json).await?;
                }
                ModelAction::Status => {
                    let info = drive(session.model_status(options), &mut events, json).await?;
                    println!(
                        "{}",
                        if json {
                            output::to_json(&info)
                        } else {
                            output::format_model(&info)
                        }
                    );
                }
            }
        }
    }

    session.shutdown();
    Ok(())
}

fn print_event(event: &UiEvent, json: bool) {
    if let Some(line) = output::format_event(event, json) {
        eprintln!("{}", line);
    }
}

/// Await a session call while echoing its events; Ctrl-C abandons it.
async fn drive<F, T>(call: F, events: &mut broadcast::Receiver<UiEvent>, json: bool) -> Result<T>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::pin!(call);
    let result = loop {
        tokio::select! {
            result = &mut call => break result,
            event = events.recv() => match event {
                Ok(event) => print_event(&event, json),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} events", skipped);
                }
                Err(RecvError::Closed) => {}
            },
            _ = tokio::signal::ctrl_c() => anyhow::bail!("Interrupted"),
        }
    };

    while let Ok(event) = events.try_recv() {
        print_event(&event, json);
    }
    Ok(result?)
}

/// Print progress until the tracked job completes or the user interrupts
async fn wait_for_job(
    session: &SearchSession,
    events: &mut broadcast::Receiver<UiEvent>,
    json: bool,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event, json);
                    if matches!(event, UiEvent::ProgressCompleted { .. }) {
                        // the success toast follows the completion event
                        while let Ok(event) = events.try_recv() {
                            print_event(&event, json);
                        }
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return,
            },
            _ = tokio::signal::ctrl_c() => {
                session.stop_progress();
                return;
            }
        }
    }
}
