use anyhow::{Context, Result};
use clap::Args;

use linktrack_sdk::{FileTracker, MarkerCount};

use super::Connection;
use crate::output::format::{self, FileStatus};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct StatusArgs {
    /// Files to report on
    #[arg(required = true)]
    pub paths: Vec<String>,
}

pub fn run(args: &StatusArgs, conn: &Connection, fmt: OutputFormat) -> Result<()> {
    let settings = conn.settings()?;
    let project = super::project_name(&settings)?;

    let rt = super::runtime()?;
    let statuses = rt.block_on(async {
        let authorized = super::authorize(&settings).await?;
        let tracker = FileTracker::attach(
            authorized.store,
            authorized.session,
            &project,
            &settings.package,
        )
        .await
        .with_context(|| format!("Failed to look up project {project}"))?;

        let mut statuses = Vec::with_capacity(args.paths.len());
        for path in &args.paths {
            let markers = match &tracker {
                Some(tracker) => tracker.markers(path).await?,
                None => MarkerCount::default(),
            };
            statuses.push(FileStatus::new(path, markers));
        }
        anyhow::Ok(statuses)
    })?;

    println!("{}", format::format_status(&statuses, fmt));
    Ok(())
}
