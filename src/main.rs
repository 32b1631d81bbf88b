use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

mod aggregate;
mod chat;
mod config;
mod dispatch;
mod error;
mod feed;
mod fetch;
mod monitor;
mod output;
mod scrape;
mod telemetry;

#[derive(Parser)]
#[command(name = "mrq-monitor", about = "Merge request monitor for Gitorious-style project hosting")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a project's feed and relay merge request events to IRC
    Monitor(monitor::MonitorCmd),
    /// Scrape and print the open merge requests of a project
    List(aggregate::ListCmd),
    /// Read the activity feed once and print what would be announced
    Feed(feed::FeedCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // stderr logging; respects RUST_LOG and MRQ_LOG_FORMAT
    telemetry::config::init_tracing();

    match cli.command {
        Commands::Monitor(args) => monitor::run(args).await?,
        Commands::List(args) => aggregate::run(args).await?,
        Commands::Feed(args) => feed::run(args).await?,
    }

    Ok(())
}
