//! Cache command - response cache utilities.

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};

use vantage_cache::{CacheKey, ttl};

use super::Context;

/// Arguments for the cache command.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Print the cache key a request would be stored under
    Key {
        /// Upstream endpoint name (e.g. maps/search)
        endpoint: String,

        /// Request parameters as name=value
        #[arg(value_name = "NAME=VALUE")]
        params: Vec<String>,
    },

    /// Show the TTL presets used for upstream data
    Ttl,
}

/// Run the cache command.
pub async fn run(args: CacheArgs, ctx: &Context) -> Result<()> {
    match args.command {
        CacheCommand::Key { endpoint, params } => cmd_key(&endpoint, &params, ctx),
        CacheCommand::Ttl => cmd_ttl(ctx),
    }
}

fn cmd_key(endpoint: &str, params: &[String], ctx: &Context) -> Result<()> {
    let mut key = CacheKey::new(endpoint);
    for param in params {
        let (name, value) = param
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid parameter '{}': expected NAME=VALUE", param))?;
        key = key.param(name, value);
    }

    if ctx.json_output {
        println!("{}", serde_json::json!({ "key": key.build() }));
    } else {
        println!("{}", key);
    }
    Ok(())
}

fn cmd_ttl(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({
                "volatile_secs": ttl::VOLATILE.as_secs(),
                "reference_secs": ttl::REFERENCE.as_secs(),
            })
        );
    } else {
        println!(
            "volatile   {}s  (page analysis, map search)",
            ttl::VOLATILE.as_secs()
        );
        println!(
            "reference  {}s  (geographic locations)",
            ttl::REFERENCE.as_secs()
        );
    }
    Ok(())
}
