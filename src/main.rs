mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use influence_tracker::core::config::AppConfig;

#[derive(Parser)]
#[command(name = "itr", about = "Quota-aware media influence tracking CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Shorthand for JSON output
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-provider quota usage
    Usage {
        /// Provider to show (default: all)
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Inspect provider caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Score subjects from a JSON file with the offline scorers
    Score {
        /// JSON array of {name, subject_type, url?}
        input: PathBuf,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Entry counts and file locations
    Stats {
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Print one cached record
    Get { provider: String, key: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
    /// Print the config file location
    Path,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        "debug".to_string()
    } else {
        AppConfig::load()
            .map(|c| c.settings.log_level)
            .unwrap_or_else(|_| "info".to_string())
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output_opts = cli::output::OutputOptions {
        format: if cli.json {
            cli::output::OutputFormat::Json
        } else {
            cli::output::OutputFormat::Text
        },
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color),
    };

    match cli.command {
        None => cli::usage_cmd::run(None, &output_opts)?,
        Some(Commands::Usage { provider }) => cli::usage_cmd::run(provider, &output_opts)?,
        Some(Commands::Cache { action }) => match action {
            CacheAction::Stats { provider } => cli::cache_cmd::stats(provider, &output_opts)?,
            CacheAction::Get { provider, key } => {
                cli::cache_cmd::get(&provider, &key, &output_opts)?
            }
        },
        Some(Commands::Score { input }) => cli::score_cmd::run(&input, &output_opts).await?,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init()?,
            ConfigAction::Check => cli::config_cmd::check()?,
            ConfigAction::Path => cli::config_cmd::path()?,
        },
    }

    Ok(())
}
