pub mod config;
pub mod event;
pub mod login;
pub mod status;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use linktrack_core::config::Settings;
use linktrack_protocol::GraphqlStore;
use linktrack_sdk::{bootstrap, Authorized, FileTracker};

#[derive(Subcommand)]
pub enum Commands {
    /// Show or change the store connection settings
    Config(config::ConfigArgs),
    /// Authorize against the store and print the agent root
    Login,
    /// Mark a file as opened
    Open(event::EventArgs),
    /// Mark a file as closed
    Close(event::EventArgs),
    /// Report the marker state of files without changing anything
    Status(status::StatusArgs),
    /// Apply newline-delimited JSON events read from stdin
    Watch,
}

/// Connection options shared by every command. Each one overrides the
/// settings file.
#[derive(Args)]
pub struct Connection {
    /// Settings file (default: $LINKTRACK_CONFIG or the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store endpoint without scheme, e.g. localhost:3006/gql
    #[arg(long, global = true, env = "LINKTRACK_PATH")]
    pub path: Option<String>,

    /// Use TLS ("true" in any case enables it)
    #[arg(long, global = true, env = "LINKTRACK_SSL")]
    pub ssl: Option<String>,

    /// Project name (default: current directory name)
    #[arg(long, global = true, env = "LINKTRACK_PROJECT")]
    pub project: Option<String>,
}

impl Connection {
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Settings::default_location()
                .context("Cannot determine a config directory; pass --config"),
        }
    }

    /// Settings as stored on disk.
    pub fn stored_settings(&self) -> Result<Settings> {
        let path = self.config_path()?;
        Settings::load(&path).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Stored settings with command-line and environment overrides applied.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = self.stored_settings()?;
        if let Some(path) = &self.path {
            settings.path = path.clone();
        }
        if let Some(ssl) = &self.ssl {
            settings.ssl = Settings::parse_ssl(ssl);
        }
        if let Some(project) = &self.project {
            settings.project = Some(project.clone());
        }
        Ok(settings)
    }
}

/// The configured project, else the name of the working directory.
pub fn project_name(settings: &Settings) -> Result<String> {
    if let Some(project) = &settings.project {
        return Ok(project.clone());
    }
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    cwd.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("The working directory has no name; pass --project")
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

/// An anonymous handle on the configured endpoint.
pub fn store(settings: &Settings) -> Result<GraphqlStore> {
    GraphqlStore::new(settings.endpoint()).context("Failed to build HTTP client")
}

pub async fn authorize(settings: &Settings) -> Result<Authorized<GraphqlStore>> {
    let store = store(settings)?;
    bootstrap(&store)
        .await
        .with_context(|| format!("Failed to authorize against {}", store.endpoint()))
}

/// Authorize and resolve the project, ready to apply events.
pub async fn connect(settings: &Settings) -> Result<FileTracker<GraphqlStore>> {
    let project = project_name(settings)?;
    let authorized = authorize(settings).await?;
    FileTracker::start(
        authorized.store,
        authorized.session,
        &project,
        &settings.package,
    )
    .await
    .with_context(|| format!("Failed to start tracking project {project}"))
}
