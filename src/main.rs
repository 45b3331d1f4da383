use anyhow::{Context, Result};
use azgov::arm::client::ArmClient;
use azgov::config::Config;
use azgov::manager::Manager;
use azgov::registry::catalog;
use azgov::report;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

/// Version injected at compile time via AZGOV_VERSION env var (set by
/// CI/CD), or "dev" for local builds.
pub const VERSION: &str = match option_env!("AZGOV_VERSION") {
    Some(v) => v,
    None => "dev",
};

/// Governance core for Azure - enumerate, enrich, and act on ARM resources
#[derive(Parser, Debug)]
#[command(name = "azgov", version, about, long_about = None)]
struct Args {
    /// Azure subscription to use
    #[arg(short, long)]
    subscription: Option<String>,

    /// Management endpoint override (sovereign clouds)
    #[arg(long)]
    endpoint: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered resource types
    Types,
    /// Show the capability set bound to a resource type
    Capabilities {
        /// Resource type key, e.g. "vm"
        resource_type: String,
    },
    /// Enumerate a resource type into a report
    List {
        /// Resource type key, e.g. "vm"
        resource_type: String,
        #[arg(long, value_enum, default_value = "table")]
        output: OutputFormat,
    },
    /// Fetch individual resources by id
    Get {
        /// Full ARM resource ids
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long, value_enum, default_value = "json")]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .expect("Failed to open log file");

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("azgov started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("azgov").join("azgov.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".azgov").join("azgov.log");
    }
    PathBuf::from("azgov.log")
}

fn build_client(args: &Args, config: &Config) -> Result<ArmClient> {
    let subscription = args
        .subscription
        .clone()
        .or_else(|| config.effective_subscription())
        .context("No subscription configured. Set AZURE_SUBSCRIPTION_ID or use --subscription")?;
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| config.effective_endpoint());

    tracing::info!(
        "Using subscription: {}, endpoint: {}",
        subscription,
        endpoint
    );
    ArmClient::new(&subscription, &endpoint).context("Failed to initialize ARM client")
}

fn print_records(
    records: &[serde_json::Value],
    fields: &[String],
    output: OutputFormat,
) -> Result<()> {
    match output {
        OutputFormat::Table => print!("{}", report::render_table(records, fields)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(records)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let mut config = Config::load();

    match &args.command {
        Command::Types => {
            let catalog = catalog();
            let mut rows = Vec::new();
            for key in catalog.keys() {
                let desc = catalog.descriptor(key)?;
                rows.push(serde_json::json!({
                    "type": key,
                    "display_name": desc.display_name,
                    "arm_type": desc.arm_type.as_deref().unwrap_or("-"),
                    "child": desc.is_child(),
                }));
            }
            let fields = ["type", "display_name", "arm_type", "child"]
                .map(str::to_string)
                .to_vec();
            print!("{}", report::render_table(&rows, &fields));
        }

        Command::Capabilities { resource_type } => {
            let catalog = catalog();
            catalog.descriptor(resource_type)?;
            let registry = catalog.capabilities();
            println!("actions:");
            for name in registry.action_names(resource_type) {
                println!("  {name}");
            }
            println!("filters:");
            for name in registry.filter_names(resource_type) {
                println!("  {name}");
            }
        }

        Command::List {
            resource_type,
            output,
        } => {
            let client = build_client(&args, &config)?;
            let manager = Manager::for_type(resource_type, client)?;
            let records = manager
                .resources()
                .await
                .with_context(|| format!("Failed to enumerate '{resource_type}'"))?;
            print_records(
                &records,
                &manager.descriptor().default_report_fields,
                *output,
            )?;

            config.last_resource = Some(resource_type.clone());
            if let Err(e) = config.save() {
                tracing::warn!("failed to persist config: {}", e);
            }
        }

        Command::Get { ids, output } => {
            let client = build_client(&args, &config)?;
            let manager = Manager::for_type("armresource", client)?;
            let records = manager.get_resources(ids).await?;
            print_records(
                &records,
                &manager.descriptor().default_report_fields,
                *output,
            )?;
        }
    }

    Ok(())
}
