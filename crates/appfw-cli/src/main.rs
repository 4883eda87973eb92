//! AppFw CLI - send, receive and list IoT application framework events.
//!
//! Connects to the framework daemon over IPC, opens a context and drives
//! its event loop until the requested work is done or Ctrl-C is pressed.

mod commands;

use anyhow::{Context as _, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use appfw_core::{ContextLifecycle, DebugConfig, IpcConfig, IpcTransport};

#[derive(Parser, Debug)]
#[command(name = "appfw")]
#[command(about = "Send, receive and list IoT application framework events")]
struct Cli {
    /// Framework daemon address
    #[arg(long, global = true, env = IpcConfig::ADDR_ENV_VAR, default_value = IpcConfig::DEFAULT_ADDR)]
    addr: SocketAddr,

    /// Framework debug tracing
    #[arg(long, global = true, value_enum, default_value_t = DebugLevel::None)]
    debug: DebugLevel,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to events and print them until interrupted
    Listen {
        /// Comma-separated event names
        #[arg(long, required = true, value_delimiter = ',')]
        events: Vec<String>,
    },

    /// Send events to matching applications
    Send(SendArgs),

    /// Print installed applications
    List {
        /// Only list running applications
        #[arg(long)]
        running: bool,
    },
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("selector")
        .required(true)
        .multiple(true)
        .args(["label", "appid", "binary", "user", "process"])
))]
struct SendArgs {
    /// Comma-separated event names; one bundle sends each of them once
    #[arg(long, required = true, value_delimiter = ',')]
    events: Vec<String>,

    /// JSON object sent with every event
    #[arg(long, default_value = "{}")]
    payload: String,

    /// Target label (e.g. User::App)
    #[arg(long)]
    label: Option<String>,

    /// Target application id
    #[arg(long)]
    appid: Option<String>,

    /// Target binary path
    #[arg(long)]
    binary: Option<PathBuf>,

    /// Target user name
    #[arg(long)]
    user: Option<String>,

    /// Target process id
    #[arg(long)]
    process: Option<u32>,

    /// Number of bundles to send
    #[arg(long, default_value = "1")]
    count: u32,

    /// Delay between bundles in milliseconds
    #[arg(long, default_value = "1000")]
    interval: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DebugLevel {
    None,
    Limited,
    All,
}

impl DebugLevel {
    fn patterns(self) -> &'static [&'static str] {
        match self {
            DebugLevel::None => &[],
            DebugLevel::Limited => &[DebugConfig::LIMITED],
            DebugLevel::All => &[DebugConfig::ALL],
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let transport = IpcTransport::connect(cli.addr)
        .await
        .with_context(|| format!("Failed to reach application framework at {}", cli.addr))?;
    info!("Connected to application framework at {}", cli.addr);

    let mut lifecycle = ContextLifecycle::new(Arc::new(transport));
    if cli.debug != DebugLevel::None {
        lifecycle.enable_debug(cli.debug.patterns())?;
    }
    let handle = lifecycle.acquire()?;

    // Notify keeps the permit, so a Ctrl-C before the loop starts still
    // ends it; release below tears the context down
    let shutdown = Arc::new(Notify::new());
    let signalled = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signalled.notify_one();
        }
    });

    let outcome = match cli.command {
        Command::Listen { events } => commands::listen(&handle, events, &shutdown).await,
        Command::Send(args) => commands::send(&handle, args.into(), &shutdown).await,
        Command::List { running } => commands::list(&handle, running, &shutdown).await,
    };

    if let Some(dropped) = lifecycle.release()? {
        if dropped.sends > 0 || dropped.lists > 0 {
            info!(
                "Exited with {} sends and {} list queries unanswered",
                dropped.sends, dropped.lists
            );
        }
    }
    outcome
}

impl From<SendArgs> for commands::SendPlan {
    fn from(args: SendArgs) -> Self {
        commands::SendPlan {
            events: args.events,
            payload: args.payload,
            target: appfw_core::TargetSpec::from_parts(
                args.label,
                args.appid,
                args.binary,
                args.user,
                args.process,
            ),
            count: args.count,
            interval: std::time::Duration::from_millis(args.interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_send_requires_a_selector() {
        let result = Cli::try_parse_from(["appfw", "send", "--events", "ping"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_send_rejects_malformed_process_id() {
        let result = Cli::try_parse_from(["appfw", "send", "--events", "ping", "--process", "abc"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_send_builds_plan() {
        let cli = Cli::try_parse_from([
            "appfw", "--debug", "limited", "send", "--events", "a,b", "--appid", "cam1",
            "--process", "0", "--count", "3", "--interval", "10",
        ])
        .unwrap();
        assert_eq!(cli.debug, DebugLevel::Limited);

        let Command::Send(args) = cli.command else {
            panic!("Expected send command");
        };
        let plan: commands::SendPlan = args.into();
        assert_eq!(plan.events, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(plan.target.app_id.as_deref(), Some("cam1"));
        assert_eq!(plan.target.process, Some(0));
        assert_eq!(plan.count, 3);
        assert_eq!(plan.interval, std::time::Duration::from_millis(10));
    }

    #[test]
    fn test_debug_levels_map_to_patterns() {
        assert!(DebugLevel::None.patterns().is_empty());
        assert_eq!(DebugLevel::All.patterns(), &[DebugConfig::ALL]);
    }
}
