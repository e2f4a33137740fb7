use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use taskwatch::{
    ConfigStore, ConsoleNotifier, QueryExecutor, SecretCipher, Settings, TaskMonitor,
    WebhookNotifier,
};

#[derive(Parser, Debug)]
#[command(name = "taskwatch", version)]
#[command(about = "Report Epicor task agent backlog and long-running tasks to a chat webhook")]
struct Args {
    /// Path to the INI configuration file
    #[arg(short, long, default_value = "config.ini")]
    config: PathBuf,

    /// Print notifications as JSON lines instead of posting them
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt a value for the configuration file using ENCRYPTION_KEY
    Encrypt {
        /// Value to encrypt, e.g. the ODBC connection string
        plaintext: String,
    },

    /// Print a new random encryption key
    GenerateKey,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "taskwatch=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Some(Command::Encrypt { plaintext }) => {
            let cipher = SecretCipher::from_env_or_dotenv(None)?
                .context("ENCRYPTION_KEY must be set (or present in .env) to encrypt values")?;
            println!("{}", cipher.encrypt(&plaintext));
            Ok(())
        }
        Some(Command::GenerateKey) => {
            println!("{}", SecretCipher::generate_key());
            Ok(())
        }
        None => run_pass(&args.config, args.dry_run),
    }
}

/// Load configuration, run exactly one monitoring pass, and return.
fn run_pass(config_path: &Path, dry_run: bool) -> Result<()> {
    let cipher = SecretCipher::from_env_or_dotenv(None)?;
    let store = ConfigStore::load(config_path, cipher.as_ref())
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let settings = Settings::from_store(&store).context("Invalid configuration")?;

    let executor = connect(&settings)?;
    let mut monitor = TaskMonitor::with_default_strategies(executor, &settings.monitoring);

    if dry_run {
        info!("Dry run: notifications are printed to stdout");
        monitor.add_observer(Arc::new(ConsoleNotifier::stdout()));
    } else {
        let webhook = WebhookNotifier::from_settings(&settings.webhook)
            .context("Failed to initialize webhook notifier")?;
        monitor.add_observer(Arc::new(webhook));
    }

    let report = monitor.run_monitoring();
    if !report.is_clean() {
        warn!(
            "Pass completed with {} failed categories and {} failed notifications",
            report.errors().count(),
            report.failed_observers()
        );
    }
    Ok(())
}

#[cfg(feature = "mssql")]
fn connect(settings: &Settings) -> Result<Box<dyn QueryExecutor>> {
    use taskwatch_adapters::mssql::OdbcExecutor;

    let mut builder =
        OdbcExecutor::builder().connection_string(settings.database.connection_string.expose());
    if let Some(timeout) = settings.database.login_timeout {
        builder = builder.login_timeout(timeout);
    }
    let executor = builder
        .build()
        .context("Failed to initialize ODBC environment")?;
    Ok(Box::new(executor))
}

#[cfg(not(feature = "mssql"))]
fn connect(_settings: &Settings) -> Result<Box<dyn QueryExecutor>> {
    anyhow::bail!("taskwatch was built without database support; rebuild with `--features mssql`")
}
