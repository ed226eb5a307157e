use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn, LevelFilter};
use media_organizer_core::progress::ProgressTracker;
use media_organizer_core::{
    logging, Comparators, Config, CopyMode, DuplicatePolicy, LogLevel, MediaOrganizer, Walker,
};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

#[derive(Parser)]
#[command(name = "media-organizer")]
#[command(about = "Organize media files into a dated tree using their metadata")]
#[command(version)]
struct Cli {
    /// Write logs to rotating files in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the metadata of every file under a path as JSON
    Scan {
        /// File or directory to scan
        path: PathBuf,

        /// Only scan the top directory
        #[arg(long)]
        no_recursive: bool,

        /// Paths to skip, with everything below them
        #[arg(long = "ignore")]
        ignore: Vec<PathBuf>,
    },

    /// Copy media from a source tree into an organized destination
    Organize {
        /// Directory to read from
        source: PathBuf,

        /// Root of the organized tree
        destination: PathBuf,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// What to do with duplicates
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// How existing destination files are treated
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Comma separated comparators: filename,size,md5,sha1,blake3
        #[arg(long)]
        compare: Option<String>,

        /// Run without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file (defaults to the user config directory)
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Unique,
    KeepAll,
}

impl From<PolicyArg> for DuplicatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Unique => DuplicatePolicy::Unique,
            PolicyArg::KeepAll => DuplicatePolicy::KeepAll,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    RequireEmpty,
    Delta,
    ForceOverwrite,
    WipeBefore,
}

impl From<ModeArg> for CopyMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::RequireEmpty => CopyMode::RequireEmpty,
            ModeArg::Delta => CopyMode::Delta,
            ModeArg::ForceOverwrite => CopyMode::ForceOverwrite,
            ModeArg::WipeBefore => CopyMode::WipeBefore,
        }
    }
}

fn init_logging(log_dir: Option<&PathBuf>, level: LevelFilter) -> anyhow::Result<()> {
    match log_dir {
        Some(dir) => logging::init_logger(dir, level)
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e)),
        None => {
            env_logger::Builder::new()
                .filter_level(level)
                .parse_env(logging::LOG_LEVEL_ENV)
                .init();
            Ok(())
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    // The config file may set the log level, so load it before logging starts
    let file_config = match &cli.command {
        Commands::Organize {
            config: Some(path), ..
        } => Some(Config::from_file(path)?),
        _ => None,
    };
    let level = file_config
        .as_ref()
        .map(|config| config.effective_log_level(cli.verbose))
        .unwrap_or_else(|| LogLevel::from_verbosity(cli.verbose).unwrap_or(LogLevel::Info));
    init_logging(cli.log_dir.as_ref(), level.into())?;

    match cli.command {
        Commands::Scan {
            path,
            no_recursive,
            ignore,
        } => {
            let records = Walker::new()
                .recursive(!no_recursive)
                .with_ignore_paths(ignore.as_slice())
                .walk(&path)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }

        Commands::Organize {
            source,
            destination,
            config: _,
            policy,
            mode,
            compare,
            dry_run,
        } => {
            // Set up configuration
            let mut config = file_config.unwrap_or_default();

            // Override config with command line arguments
            config.destination = destination;
            config.dry_run |= dry_run;
            if let Some(policy) = policy {
                config.duplicate_policy = policy.into();
            }
            if let Some(mode) = mode {
                config.copy_mode = mode.into();
            }
            if let Some(list) = compare {
                config.comparators = Comparators::from_list(&list)?;
            }
            config.validate()?;

            // Progress bar only when logs do not go to the terminal
            let tracker = match cli.log_dir {
                Some(_) => ProgressTracker::new(),
                None => ProgressTracker::hidden(),
            };
            let organizer = MediaOrganizer::new(config)?.with_progress(tracker.callback());

            let shutdown = organizer.shutdown_handle();
            ctrlc::set_handler(move || {
                shutdown.store(true, Ordering::SeqCst);
            })?;

            info!("Starting organize run...");
            let (plan, report) = organizer.run(&source)?;
            tracker.finish("Organize complete");

            for failure in &plan.failures {
                warn!("Skipped {}: {}", failure.source.display(), failure.error);
            }
            println!(
                "{} parsed, {} valid, {} duplicates, {} failed",
                plan.summary.parsed,
                plan.summary.valid,
                plan.summary.duplicates,
                plan.summary.failed
            );
            println!(
                "{} copied, {} skipped{}",
                report.copied,
                report.skipped,
                if organizer.config().dry_run {
                    " (dry run)"
                } else {
                    ""
                }
            );
            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let path = match path.or_else(Config::default_path) {
                Some(path) => path,
                None => {
                    error!("No configuration directory found on this platform");
                    anyhow::bail!("pass a path to generate-config");
                }
            };
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}
