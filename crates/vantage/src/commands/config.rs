//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};

use vantage_config::{self, LoadedConfig, Profile, VantageConfig};
use vantage_session::format_remaining;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration and which files it came from
    Show,

    /// Show configuration file path
    Path,

    /// Initialize a config file with profile defaults
    Init {
        /// Create project-local config (./vantage.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Profile whose defaults to write: development or production
        #[arg(long, default_value = "production")]
        profile: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx).await,
        ConfigCommand::Path => cmd_path().await,
        ConfigCommand::Init {
            local,
            profile,
            force,
        } => cmd_init(local, &profile, force).await,
    }
}

async fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = vantage_config::load_config(None)?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let config = &loaded.config;
    let cache = config.cache_config();
    let session = config.session_timeout_config()?;

    if ctx.json_output {
        let sources: Vec<String> = loaded
            .loaded_from()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let output = serde_json::json!({
            "profile": config.profile().as_str(),
            "sources": sources,
            "warnings": loaded.warnings,
            "cache": {
                "max_entries": cache.max_entries,
                "default_ttl_secs": cache.default_ttl.as_secs(),
                "single_flight": cache.single_flight,
            },
            "session": {
                "inactivity_timeout_secs": session.inactivity_timeout.as_secs(),
                "warning_before_logout_secs": session.warning_before_logout.as_secs(),
                "heartbeat_interval_secs": session.heartbeat_interval.as_secs(),
                "activity_debounce_ms": session.activity_debounce.as_millis() as u64,
                "public_entry_path": session.public_entry_path,
            },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# Vantage Configuration\n");
    print_sources(&loaded, ctx.verbose);

    println!("Profile: {}\n", config.profile());

    println!("Cache:");
    println!("  max_entries      {}", cache.max_entries);
    println!("  default_ttl      {}s", cache.default_ttl.as_secs());
    println!("  single_flight    {}", cache.single_flight);
    println!();

    println!("Session:");
    println!(
        "  inactivity       {}",
        format_remaining(session.inactivity_timeout)
    );
    println!(
        "  warning          {}",
        format_remaining(session.warning_before_logout)
    );
    println!(
        "  heartbeat        {}",
        format_remaining(session.heartbeat_interval)
    );
    println!(
        "  debounce         {}ms",
        session.activity_debounce.as_millis()
    );
    println!("  logout redirect  {}", session.public_entry_path);

    Ok(())
}

fn print_sources(loaded: &LoadedConfig, verbose: bool) {
    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
    }

    if verbose {
        for source in loaded.sources.iter().filter(|s| !s.loaded) {
            println!("  (not found) {}", source.path.display());
        }
    }
    println!();
}

async fn cmd_path() -> Result<()> {
    match vantage_config::xdg_config_path() {
        Some(path) => println!("{}", path.display()),
        None => bail!("Could not determine config directory"),
    }
    Ok(())
}

async fn cmd_init(local: bool, profile: &str, force: bool) -> Result<()> {
    let profile: Profile = profile.parse()?;

    let path = if local {
        PathBuf::from(vantage_config::discovery::PROJECT_CONFIG_FILE)
    } else {
        vantage_config::xdg_config_path().context("Could not determine config directory")?
    };

    if path.exists() && !force {
        bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    vantage_config::save_config(&VantageConfig::template(profile), &path)?;
    println!("Wrote {} defaults to {}", profile, path.display());
    Ok(())
}
