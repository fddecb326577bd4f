use crate::engine::workflow::launch;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cache;
mod catalog;
mod cli;
mod config;
mod engine;
mod error;
mod llm;
mod types;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    let (config, request) = args.into_config()?;

    // 日志写到 stderr，stdout 只输出结果 JSON
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let outcome = launch(&config, &request).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
