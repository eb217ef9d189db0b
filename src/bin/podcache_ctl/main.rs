//! podcache-ctl: command-line client for the podcache control channel.

mod args;
mod client;
mod print;


use clap::Parser;

use args::{Cli, Commands};
use client::{CtlError, Ctx};
use print::print_json;

#[tokio::main]
async fn main() -> Result<(), CtlError> {
    let cli = Cli::parse();
    let ctx = Ctx::new(&cli.gateway)?;

    match cli.command {
        Commands::SkipWaiting => print_json(&ctx.skip_waiting().await?)?,
        Commands::Cache { url } => {
            ctx.cache(&url).await?;
            println!("caching requested for {url}");
        }
        Commands::Status => print_json(&ctx.status().await?)?,
        Commands::Cached { url } => print_json(&ctx.cached(&url).await?)?,
        Commands::Watch { count } => {
            ctx.watch(count, |notification| print_json(notification))
                .await?;
        }
    }

    Ok(())
}
