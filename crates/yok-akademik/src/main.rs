//! YÖK Akademik scraper - Entry Point
//!
//! `profiles` and `collaborators` run one extraction and print progress
//! records on stdout; `search` runs a whole session and prints its events.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use yok_akademik::browser::ChromeSite;
use yok_akademik::dispatch::{Dispatcher, ProcessLauncher, ProfileSelector};
use yok_akademik::extract::{CollaboratorExtractor, CollaboratorRequest, ProfileExtractor, ProfileTarget};
use yok_akademik::feed::{self, FeedEnd};
use yok_akademik::models::{EventKind, SessionId, StdoutSink};
use yok_akademik::{Config, ScrapeError, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "yok-akademik")]
#[command(about = "Scraper for YÖK Akademik profiles and collaboration graphs")]
#[command(version)]
struct Cli {
    /// Root directory of session folders
    #[arg(long, global = true, env = "YOK_SESSIONS_DIR")]
    sessions_dir: Option<PathBuf>,

    /// Chromium binary (auto-detected if unset)
    #[arg(long, global = true, env = "CHROME_BIN")]
    chrome_bin: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search a name and collect the matching profiles
    Profiles {
        /// Name of the researcher
        name: String,
        /// Session to write into (generated if omitted)
        session_id: Option<String>,
    },
    /// Read the collaboration graph of one profile
    Collaborators {
        /// Name of the researcher
        name: String,
        /// Session to write into
        session_id: String,
        /// Profile page to open
        #[arg(long, group = "target")]
        profile_url: Option<String>,
        /// authorId of a profile in the session's results
        #[arg(long, group = "target")]
        profile_id: Option<String>,
        /// 1-based position in the session's results
        #[arg(long, group = "target")]
        profile_index: Option<usize>,
    },
    /// Run a full session and stream its events as JSON lines
    Search {
        /// Free-text query; the first three words are the name
        query: String,
        /// Profile to continue with when several match (index, authorId or URL)
        #[arg(long)]
        select: Option<ProfileSelector>,
    },
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // stdout carries progress records and events
    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

/// Exit code for a failed command: the extraction's own code, else 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<ScrapeError>().map_or(1, ScrapeError::exit_code)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            // stderr text becomes the dispatcher's error message
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?.with_chrome_bin(cli.chrome_bin);
    if let Some(dir) = cli.sessions_dir {
        config.sessions_dir = dir;
    }

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        sessions_dir = %config.sessions_dir.display(),
        "Starting yok-akademik"
    );

    match cli.command {
        Command::Profiles { name, session_id } => run_profiles(&config, &name, session_id).await,
        Command::Collaborators { name, session_id, profile_url, profile_id, profile_index } => {
            let target = match (profile_url, profile_id, profile_index) {
                (Some(url), _, _) => {
                    url::Url::parse(&url).with_context(|| format!("Invalid --profile-url {url}"))?;
                    ProfileTarget::Url(url)
                }
                (None, Some(id), _) => ProfileTarget::AuthorId(id),
                (None, None, Some(index)) => ProfileTarget::Index(index),
                (None, None, None) => ProfileTarget::Search,
            };
            run_collaborators(&config, CollaboratorRequest { name, target }, &session_id).await
        }
        Command::Search { query, select } => run_search(config, &query, select).await,
    }
}

async fn run_profiles(config: &Config, name: &str, session_id: Option<String>) -> anyhow::Result<()> {
    let id = match session_id {
        Some(raw) => SessionId::parse(raw)?,
        None => SessionId::generate(),
    };
    let dir = SessionStore::new(&config.sessions_dir).create(&id)?;

    let site = ChromeSite::launch(config).await?;
    let snapshot = ProfileExtractor::new(site, dir, Arc::new(StdoutSink)).run(name).await?;

    tracing::info!(session_id = %id, profiles = snapshot.len(), "Profile search done");
    Ok(())
}

async fn run_collaborators(
    config: &Config,
    request: CollaboratorRequest,
    session_id: &str,
) -> anyhow::Result<()> {
    let id = SessionId::parse(session_id)?;
    let dir = SessionStore::new(&config.sessions_dir).create(&id)?;

    let site = ChromeSite::launch(config).await?;
    let snapshot = CollaboratorExtractor::new(site, dir, Arc::new(StdoutSink), config.collaborator_pacing)
        .run(request)
        .await?;

    tracing::info!(session_id = %id, collaborators = snapshot.len(), "Collaborator scan done");
    Ok(())
}

async fn run_search(config: Config, query: &str, select: Option<ProfileSelector>) -> anyhow::Result<()> {
    let launcher = ProcessLauncher::current(&config)?;
    let handle = Dispatcher::new(config, launcher).spawn();

    let session_id = SessionId::generate();
    let mut events = handle.subscribe(session_id.as_str()).await?.into_stream();
    handle.start_session_with_id(query, Some(session_id.clone())).await?;

    let mut stdout = tokio::io::stdout();
    let mut end = feed::forward(&mut events, &mut stdout).await?;

    if end == FeedEnd::NeedsSelection {
        if let Some(selector) = select {
            feed::await_selection(&handle, session_id.as_str()).await?;
            handle.select_profile(session_id.as_str(), selector).await?;
            end = feed::forward(&mut events, &mut stdout).await?;
        } else {
            tracing::info!(session_id = %session_id, "Several profiles match; rerun with --select");
        }
    }

    handle.cleanup(session_id.as_str()).await?;
    match end {
        FeedEnd::Finished(EventKind::Error) => anyhow::bail!("Session {session_id} failed"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yok_akademik::error::BrowserError;

    #[test]
    fn test_exit_code_from_scrape_error() {
        let err = anyhow::Error::from(ScrapeError::ProfileNotFound("A9".into()));
        assert_eq!(exit_code(&err), 2);

        let err = anyhow::Error::from(ScrapeError::from(BrowserError::not_found("#aramaTerim")));
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn test_exit_code_for_other_errors() {
        assert_eq!(exit_code(&anyhow::anyhow!("Invalid --profile-url x")), 1);
    }
}
