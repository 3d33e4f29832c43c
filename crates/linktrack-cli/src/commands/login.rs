use anyhow::Result;

use super::Connection;
use crate::output::{format, OutputFormat};

pub fn run(conn: &Connection, fmt: OutputFormat) -> Result<()> {
    let settings = conn.settings()?;
    let endpoint = settings.endpoint();

    let rt = super::runtime()?;
    let authorized = rt.block_on(super::authorize(&settings))?;

    println!(
        "{}",
        format::format_agent(authorized.agent_root(), &endpoint, fmt)
    );
    Ok(())
}
