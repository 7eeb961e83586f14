//! Monitor command - drive the session lifetime monitor from the terminal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use tokio::time::{Instant, sleep_until};

use vantage_session::{
    ActivityKind, InMemorySessionProvider, LifetimeMonitor, Navigator, Phase, SessionView,
};

use super::Context;

/// Arguments for the monitor command.
#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(subcommand)]
    pub command: MonitorCommand,
}

#[derive(Subcommand, Debug)]
pub enum MonitorCommand {
    /// Run a scripted session against an in-memory provider and print each transition
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Profile to take timeouts from (defaults to the configured profile)
    #[arg(long)]
    pub profile: Option<String>,

    /// Override the inactivity timeout, in milliseconds
    #[arg(long)]
    pub inactivity_ms: Option<u64>,

    /// Override the warning window, in milliseconds
    #[arg(long)]
    pub warning_ms: Option<u64>,

    /// Countdown refresh interval while warning, in milliseconds
    #[arg(long, default_value = "1000")]
    pub refresh_ms: u64,

    /// Times (ms after start) at which to inject a key press
    #[arg(long, value_delimiter = ',')]
    pub activity_at: Vec<u64>,

    /// Times (ms after start) at which to press "stay signed in"
    #[arg(long, value_delimiter = ',')]
    pub keep_alive_at: Vec<u64>,

    /// Time (ms after start) at which to log out explicitly
    #[arg(long)]
    pub logout_at: Option<u64>,

    /// Start without an authenticated session
    #[arg(long)]
    pub anonymous: bool,

    /// Make the provider's sign-out call fail
    #[arg(long)]
    pub fail_sign_out: bool,
}

/// Run the monitor command.
pub async fn run(args: MonitorArgs, ctx: &Context) -> Result<()> {
    match args.command {
        MonitorCommand::Simulate(args) => cmd_simulate(args, ctx).await,
    }
}

#[derive(Debug, Clone, Copy)]
enum Input {
    Activity,
    KeepAlive,
    Logout,
}

impl Input {
    fn label(self) -> &'static str {
        match self {
            Input::Activity => "activity",
            Input::KeepAlive => "keep-alive",
            Input::Logout => "logout",
        }
    }
}

/// Navigator that prints where the user would have been sent.
#[derive(Debug)]
struct PrintNavigator {
    start: Instant,
    json: bool,
}

impl Navigator for PrintNavigator {
    fn redirect(&self, path: &str) {
        let elapsed = self.start.elapsed();
        if self.json {
            println!(
                "{}",
                serde_json::json!({ "elapsed_ms": elapsed.as_millis() as u64, "redirect": path })
            );
        } else {
            println!("{}  redirect   -> {}", stamp(elapsed), path);
        }
    }
}

async fn cmd_simulate(args: SimulateArgs, ctx: &Context) -> Result<()> {
    let loaded = vantage_config::load_config(None)?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let mut config = loaded.config;
    if let Some(ref profile) = args.profile {
        config.profile = Some(profile.parse()?);
    }

    let mut timeouts = config
        .session_timeout_config()?
        .with_countdown_refresh(Duration::from_millis(args.refresh_ms.max(1)));
    if let Some(ms) = args.inactivity_ms {
        timeouts = timeouts.with_inactivity_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = args.warning_ms {
        timeouts = timeouts.with_warning_before_logout(Duration::from_millis(ms));
    }

    let mut script: Vec<(u64, Input)> = args
        .activity_at
        .iter()
        .map(|&at| (at, Input::Activity))
        .chain(args.keep_alive_at.iter().map(|&at| (at, Input::KeepAlive)))
        .chain(args.logout_at.map(|at| (at, Input::Logout)))
        .collect();
    script.sort_by_key(|(at, _)| *at);
    let mut script = script.into_iter().peekable();

    let mut provider = if args.anonymous {
        InMemorySessionProvider::anonymous()
    } else {
        InMemorySessionProvider::authenticated()
    };
    if args.fail_sign_out {
        provider = provider.fail_sign_out();
    }
    let provider = Arc::new(provider);

    let start = Instant::now();
    let navigator = Arc::new(PrintNavigator {
        start,
        json: ctx.json_output,
    });

    tracing::info!(
        profile = %config.profile(),
        inactivity_ms = timeouts.inactivity_timeout.as_millis() as u64,
        warning_ms = timeouts.warning_before_logout.as_millis() as u64,
        "Starting session simulation"
    );

    let monitor = LifetimeMonitor::mount(timeouts, provider.clone(), navigator)?;
    let mut views = monitor.subscribe();
    let mut last: Option<String> = None;

    loop {
        let next_input = script.peek().map(|(at, _)| start + Duration::from_millis(*at));

        tokio::select! {
            changed = views.changed() => {
                let view = views.borrow_and_update().clone();
                let state = describe(&view);
                if last.as_ref() != Some(&state) {
                    print_view(&view, &state, start.elapsed(), ctx);
                    last = Some(state);
                }
                if changed.is_err() || is_final(&view) {
                    break;
                }
            }
            _ = wait_for(next_input) => {
                if let Some((_, input)) = script.next() {
                    print_input(input, start.elapsed(), ctx);
                    let sent = match input {
                        Input::Activity => monitor.record_activity(ActivityKind::KeyPress),
                        Input::KeepAlive => monitor.keep_session_active(),
                        Input::Logout => monitor.logout_now(),
                    };
                    if let Err(e) = sent {
                        tracing::warn!(error = %e, "Dropped scripted input");
                    }
                }
            }
        }
    }

    monitor.unmount().await;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({
                "elapsed_ms": start.elapsed().as_millis() as u64,
                "sign_out_calls": provider.sign_out_count(),
                "heartbeats": provider.heartbeat_count(),
            })
        );
    } else {
        println!(
            "\nsign-out calls: {}  heartbeats: {}",
            provider.sign_out_count(),
            provider.heartbeat_count()
        );
    }

    Ok(())
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn is_final(view: &SessionView) -> bool {
    view.phase == Some(Phase::Expired) || (!view.is_loading && !view.is_authenticated)
}

fn stamp(elapsed: Duration) -> String {
    format!("[{:>7.2}s]", elapsed.as_secs_f64())
}

fn print_input(input: Input, elapsed: Duration, ctx: &Context) {
    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({ "elapsed_ms": elapsed.as_millis() as u64, "input": input.label() })
        );
    } else {
        println!("{}  input      {}", stamp(elapsed), input.label());
    }
}

/// One-line summary; consecutive views with the same summary are printed once.
fn describe(view: &SessionView) -> String {
    match view.phase {
        Some(Phase::Warning) => format!("warning    signing out in {}", view.time_remaining),
        Some(phase) => phase.to_string(),
        None if view.is_loading => "loading".to_string(),
        None => "no session".to_string(),
    }
}

fn print_view(view: &SessionView, state: &str, elapsed: Duration, ctx: &Context) {
    if ctx.json_output {
        let mut value = serde_json::json!({ "elapsed_ms": elapsed.as_millis() as u64 });
        if let (Some(obj), Ok(serde_json::Value::Object(fields))) =
            (value.as_object_mut(), serde_json::to_value(view))
        {
            obj.extend(fields);
        }
        println!("{}", value);
    } else {
        println!("{}  {}", stamp(elapsed), state);
    }
}
