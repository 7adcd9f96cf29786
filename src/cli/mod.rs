pub mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{error, info, level_filters::LevelFilter};

use crate::{
    config::TrackerConfig,
    tracker::start_tracking,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, TRACKER_PREFIX},
        runtime::single_thread_runtime,
    },
};

#[derive(Parser, Debug)]
#[command(name = "focustally", version, long_about = None)]
#[command(about = "Tracks which applications and sites have your focus", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    /// Also print logs to the console. The tracker redraws the screen, so this is for debugging.
    #[arg(long = "log-console", global = true)]
    log_console: bool,
    #[arg(long = "log-filter", global = true)]
    log: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start tracking activities in this terminal")]
    Start {
        #[command(flatten)]
        options: StartOptions,
    },
    #[command(about = "Stop tracking activities")]
    Stop {},
}

#[derive(ClapArgs, Debug, Default)]
struct StartOptions {
    #[arg(
        long,
        help = "Application directory. By default $XDG_STATE_HOME/focustally or $HOME/.local/state/focustally"
    )]
    dir: Option<PathBuf>,
    #[arg(long, help = "Additional config file, applied over <dir>/config.toml")]
    config: Option<PathBuf>,
    #[arg(long = "db", help = "Path of the activity database")]
    database_path: Option<PathBuf>,
    #[arg(long = "interval-ms", help = "Time between two samples")]
    poll_interval_ms: Option<u64>,
    #[arg(long = "probe-timeout-ms", help = "Longest a focus query may take")]
    probe_timeout_ms: Option<u64>,
    #[arg(
        long = "browser",
        help = "Application whose active tab url is tracked. Repeat for several, replaces the configured list"
    )]
    browsers: Vec<String>,
    #[arg(long = "top", help = "Number of activities shown in the summary")]
    top_activities: Option<usize>,
}

impl StartOptions {
    /// Flags win over every configuration source.
    fn apply(self, config: &mut TrackerConfig) {
        if let Some(v) = self.database_path {
            config.database_path = v;
        }
        if let Some(v) = self.poll_interval_ms {
            config.poll_interval_ms = v;
        }
        if let Some(v) = self.probe_timeout_ms {
            config.probe_timeout_ms = v;
        }
        if !self.browsers.is_empty() {
            config.browsers = self.browsers;
        }
        if let Some(v) = self.top_activities {
            config.top_activities = v;
        }
    }
}

pub fn run_cli() -> Result<()> {
    run_cli_from(Args::parse())
}

pub fn run_cli_from(args: Args) -> Result<()> {
    match args.commands {
        Commands::Stop {} => {
            println!("Stopping tracking is not yet implemented.");
            Ok(())
        }
        Commands::Start { options } => {
            let app_dir = options
                .dir
                .clone()
                .map_or_else(create_application_default_path, Ok)?;
            enable_logging(TRACKER_PREFIX, &app_dir, args.log, args.log_console)?;

            let config = resolve_config(&app_dir, options)
                .inspect_err(|e| error!("Invalid configuration {e:?}"))?;
            info!("Starting tracker with {config:?}");

            let runtime = single_thread_runtime()?;
            let result = runtime.block_on(start_tracking(config));
            // A pending stdin read can't be cancelled, so the runtime isn't waited for.
            runtime.shutdown_background();
            result.map(|_| ())
        }
    }
}

fn resolve_config(app_dir: &std::path::Path, options: StartOptions) -> Result<TrackerConfig> {
    let mut config = TrackerConfig::load(app_dir, options.config.as_deref())
        .context("Failed to load configuration")?;
    options.apply(&mut config);
    config.validate()?;
    Ok(config)
}
