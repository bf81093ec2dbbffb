use anyhow::Context;
use clap::Parser;
use dronitor::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(cli).await.context("dronitor failed")?;
    Ok(())
}
