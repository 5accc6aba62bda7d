use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use lumi_remote::interaction::{GestureEncoding, WaitMode};
use lumi_remote::runner::{self, build_steps, RunOptions};
use lumi_remote::utils::config::Config;
use lumi_remote::AppiumClient;

#[derive(Parser)]
#[command(name = "lumi-remote")]
#[command(author = "NL Team")]
#[command(version = "0.1.0")]
#[command(about = "Resilient UI-automation scenarios over Appium", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenario file(s) or directory
    Run {
        /// Path to scenario file or directory
        path: PathBuf,

        /// Automation server URL (overrides config and LUMI_SERVER_URL)
        #[arg(long)]
        server: Option<String>,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Package namespace for qualified resource ids
        #[arg(short, long)]
        namespace: Option<String>,

        /// Output directory for failure snapshots
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Save a screenshot after each failed step
        #[arg(long, short = 's', default_value = "false")]
        snapshot: bool,

        /// Gesture encoding
        #[arg(long, value_enum)]
        gesture: Option<GestureEncoding>,

        /// Settle strategy after actions
        #[arg(long, value_enum)]
        wait: Option<WaitMode>,

        /// Debug logging
        #[arg(short, long, default_value = "false")]
        verbose: bool,
    },

    /// Parse scenarios and list their steps without a session
    Check {
        /// Path to scenario file or directory
        path: PathBuf,
    },

    /// Probe the automation server
    Status {
        /// Automation server URL
        #[arg(long)]
        server: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "lumi_remote=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            path,
            server,
            config,
            namespace,
            output,
            snapshot,
            gesture,
            wait,
            verbose,
        } => {
            init_logging(verbose);

            let mut settings = Config::load(config.as_deref())?;
            if let Some(server) = server {
                settings.server = server;
            }
            if let Some(namespace) = namespace {
                settings.namespace = Some(namespace);
            }
            if let Some(gesture) = gesture {
                settings.gesture = gesture;
            }
            if let Some(wait) = wait {
                settings.wait = wait;
            }

            println!(
                "{} Running scenarios from: {}",
                "▶".green().bold(),
                path.display()
            );
            println!("  Server: {}", settings.server.cyan());
            if let Some(ref ns) = settings.namespace {
                println!("  Namespace: {}", ns.cyan());
            }
            if snapshot {
                println!("  Snapshots: {}", "Enabled".green());
            }

            let options = RunOptions { output, snapshot };
            let summary = runner::run_scenarios(&path, &settings, &options).await?;
            if !summary.is_success() {
                std::process::exit(1);
            }
        }

        Commands::Check { path } => {
            init_logging(false);

            let scenarios = runner::load_scenarios(&path)?;
            for scenario in &scenarios {
                println!(
                    "\n{} {} ({} steps)",
                    "✓".green().bold(),
                    scenario.display_name().white().bold(),
                    scenario.steps.len()
                );
                if let Some(ref ns) = scenario.namespace {
                    println!("  Namespace: {}", ns.cyan());
                }
                for (i, step) in build_steps(scenario).iter().enumerate() {
                    println!("  {}. {}", i + 1, step.name());
                    for line in step.action().describe() {
                        println!("       {}", line.dimmed());
                    }
                }
            }
        }

        Commands::Status { server } => {
            init_logging(false);

            let mut settings = Config::load(None)?;
            if let Some(server) = server {
                settings.server = server;
            }

            println!(
                "{} Probing {}...",
                "🔍".to_string().blue(),
                settings.server.cyan()
            );
            match AppiumClient::status(&settings.server).await {
                Ok(status) => {
                    let ready = status.value.ready.unwrap_or(true);
                    let label = if ready {
                        "ready".green().bold()
                    } else {
                        "not ready".yellow().bold()
                    };
                    println!("  Server is {}", label);
                    if let Some(message) = status.value.message {
                        println!("  {}", message);
                    }
                    if let Some(build) = status.value.build {
                        println!("  Build: {}", build);
                    }
                }
                Err(e) => {
                    println!("{} {:#}", "✗".red().bold(), e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
