use anyhow::Result;
use clap::Parser;
use linktrack_sdk::FileState;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "linktrack",
    version,
    about = "Mirror opened and closed project files into a deep link store"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    #[command(flatten)]
    conn: commands::Connection,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        commands::Commands::Config(args) => commands::config::run(args, &cli.conn, cli.format),
        commands::Commands::Login => commands::login::run(&cli.conn, cli.format),
        commands::Commands::Open(args) => {
            commands::event::run(args, FileState::Opened, &cli.conn, cli.format)
        }
        commands::Commands::Close(args) => {
            commands::event::run(args, FileState::Closed, &cli.conn, cli.format)
        }
        commands::Commands::Status(args) => commands::status::run(args, &cli.conn, cli.format),
        commands::Commands::Watch => commands::watch::run(&cli.conn, cli.format),
    }
}
