use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use audiotriggers::audio::{self, RodioBackend};
use audiotriggers::pipeline::Pipeline;
use audiotriggers::{AppError, Definitions, Registry, Settings, logging};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = logging::init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %error_chain(&err), "fatal error");
            ExitCode::FAILURE
        }
    }
}

#[derive(Parser)]
#[command(version, about = "Play sounds when patterns appear in log files")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the log files and play sounds (default)
    Run,
    /// Validate definitions and sound files, then exit
    Check,
}

#[derive(Args)]
struct Overrides {
    /// Definitions file (sounds, triggers, log files)
    #[arg(short, long, global = true)]
    definitions: Option<PathBuf>,

    /// Event queue size, a power of two
    #[arg(long, global = true)]
    queue_capacity: Option<usize>,

    /// Number of sounds that may play at once
    #[arg(long, global = true)]
    channels: Option<usize>,

    /// Log file poll interval in milliseconds
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Leading bytes of each line skipped before matching
    #[arg(long, global = true)]
    prefix_len: Option<usize>,

    /// Keep other log files running when one fails
    #[arg(long, global = true)]
    isolate_failed_sources: bool,
}

impl Overrides {
    fn apply(self, settings: &mut Settings) {
        if let Some(path) = self.definitions {
            settings.definitions_file = path;
        }
        if let Some(capacity) = self.queue_capacity {
            settings.queue_capacity = capacity;
        }
        if let Some(channels) = self.channels {
            settings.channels = channels;
        }
        if let Some(ms) = self.poll_interval_ms {
            settings.poll_interval_ms = ms;
        }
        if let Some(len) = self.prefix_len {
            settings.timestamp_prefix_len = len;
        }
        if self.isolate_failed_sources {
            settings.isolate_failed_sources = true;
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let mut settings = Settings::load()?;
    cli.overrides.apply(&mut settings);
    settings.validate()?;

    let registry = load_registry(&settings.definitions_file)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => check(&registry),
        Commands::Run => watch(Arc::new(registry), &settings),
    }
}

fn load_registry(path: &Path) -> Result<Registry, AppError> {
    let definitions = Definitions::load(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    let registry = definitions.resolve(base_dir)?;
    tracing::info!(
        definitions = %path.display(),
        sounds = registry.sounds().len(),
        triggers = registry.triggers().len(),
        log_files = registry.sources().len(),
        "definitions loaded"
    );
    Ok(registry)
}

fn check(registry: &Registry) -> Result<(), AppError> {
    let sounds = audio::check_sounds(registry)?;
    println!(
        "ok: {} sounds, {} triggers, {} log files",
        sounds,
        registry.triggers().len(),
        registry.sources().len()
    );
    for source in registry.sources() {
        println!("  {} ({} triggers)", source.path.display(), source.attachments.len());
    }
    Ok(())
}

fn watch(registry: Arc<Registry>, settings: &Settings) -> Result<(), AppError> {
    let backend = RodioBackend::new(&registry)?;

    let pipeline = Pipeline::start(Arc::clone(&registry), settings)?;
    pipeline.run(backend, settings.channels)
}

fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
