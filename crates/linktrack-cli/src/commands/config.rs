use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use linktrack_core::config::Settings;

use super::Connection;
use crate::output::{format, OutputFormat};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Set the store endpoint (without scheme)
    SetPath {
        /// e.g. localhost:3006/gql
        path: String,
    },
    /// Enable or disable TLS ("true" in any case enables it)
    SetSsl {
        value: String,
    },
}

pub fn run(args: &ConfigArgs, conn: &Connection, fmt: OutputFormat) -> Result<()> {
    match &args.action {
        ConfigAction::Show => {
            let settings = conn.settings()?;
            println!("{}", format::format_settings(&settings, fmt));
        }
        ConfigAction::SetPath { path } => {
            let path = path.trim();
            if path.is_empty() {
                anyhow::bail!("Path must not be empty");
            }
            update(conn, |settings| settings.path = path.to_string())?;
            eprintln!("Path set to {path}");
        }
        ConfigAction::SetSsl { value } => {
            let ssl = Settings::parse_ssl(value);
            update(conn, |settings| settings.ssl = ssl)?;
            eprintln!("SSL set to {ssl}");
        }
    }
    Ok(())
}

// Overrides from flags and env are not persisted.
fn update(conn: &Connection, apply: impl FnOnce(&mut Settings)) -> Result<()> {
    let location = conn.config_path()?;
    let mut settings = conn.stored_settings()?;
    apply(&mut settings);
    settings
        .save(&location)
        .with_context(|| format!("Failed to write {}", location.display()))?;
    tracing::info!(file = %location.display(), "settings saved");
    Ok(())
}
