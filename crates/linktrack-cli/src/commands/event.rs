use anyhow::Result;
use clap::Args;

use linktrack_sdk::{is_ignored, FileEvent, FileState, Outcome};

use super::Connection;
use crate::output::{format, OutputFormat};

#[derive(Args)]
pub struct EventArgs {
    /// Absolute path of the file
    pub path: String,
}

pub fn run(
    args: &EventArgs,
    state: FileState,
    conn: &Connection,
    fmt: OutputFormat,
) -> Result<()> {
    // Ignored paths never reach the store, so skip connecting too.
    if is_ignored(&args.path) {
        let outcome = Outcome::Ignored {
            path: args.path.clone(),
        };
        println!("{}", format::format_outcome(&outcome, fmt));
        return Ok(());
    }

    let event = match state {
        FileState::Opened => FileEvent::Opened {
            path: args.path.clone(),
        },
        FileState::Closed => FileEvent::Closed {
            path: args.path.clone(),
        },
    };

    let settings = conn.settings()?;
    let rt = super::runtime()?;
    let outcome = rt.block_on(async {
        let tracker = super::connect(&settings).await?;
        anyhow::Ok(tracker.apply(&event).await?)
    })?;

    println!("{}", format::format_outcome(&outcome, fmt));
    Ok(())
}
