use anyhow::Result;
use clap::Parser;
use simplebank::cli::Cli;
use simplebank::observability;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    observability::init(cli.config.log_format);
    cli.run().await
}
