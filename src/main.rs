use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use nautobot_hec_exporter::cli::{self, ExportOptions};
use nautobot_hec_exporter::config::ExporterConfig;
use nautobot_hec_exporter::export::RunMode;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::Duration;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Nautobot HEC Exporter: --{nbhec}-> ships your source of truth to Splunk, one batch at a time
#[derive(Parser)]
#[command(name = "nbhec", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export inventory records to the HEC endpoint
    Export {
        /// YAML export manifest to use instead of the built-in one
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Comma-separated list of jobs to run (default: all)
        #[arg(short, long, value_delimiter = ',')]
        only: Vec<String>,

        /// Run all jobs concurrently, sharing the query API rate limit
        #[arg(short, long)]
        concurrent: bool,

        /// Also write each job's events to <DIR>/<job>.json
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Stop scheduling new pages and batches after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Test connectivity and credentials of both endpoints
    Auth,

    /// List the jobs of an export manifest
    Jobs {
        /// YAML export manifest to use instead of the built-in one
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // A missing dotenv file is fine, variables may come from the environment
    let env_loaded = dotenvy::from_filename(&cli.env);

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    if let Err(e) = env_loaded {
        log::debug!("Not sourcing {}: {}", cli.env.bright_black(), e);
    }

    match cli.command {
        Commands::Export {
            manifest,
            only,
            concurrent,
            output_dir,
            timeout,
        } => {
            let config = cli::load_config()?;
            let options = ExportOptions {
                manifest,
                only,
                mode: match concurrent {
                    true => RunMode::Concurrent,
                    false => RunMode::Sequential,
                },
                output_dir,
                timeout: timeout.map(Duration::from_secs),
            };
            log::info!(
                "Exporting from {} to {}",
                config.query.url.bright_black(),
                config.hec.url.bright_black()
            );

            let report = cli::run_export(&config, options).await?;
            println!("{}", report);

            let code = report.exit_code();
            if code != 0 {
                log::error!("Export finished with failures");
                std::process::exit(code);
            }
            log::info!("{}", "✓ Export complete".green());
        }
        Commands::Auth => {
            log::info!("Testing authorization");
            let config = cli::load_config()?;
            cli::test_auth(&config).await?;
        }
        Commands::Jobs { manifest } => {
            let config = ExporterConfig::from_env().ok();
            let manifest = cli::load_manifest(manifest.as_deref(), config.as_ref())?;
            for job in &manifest.jobs {
                let refs = job
                    .references
                    .iter()
                    .map(|(field, table)| format!("{}→{}", field, table))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "{:<16} {:<32} {} {}",
                    job.name.green(),
                    job.sourcetype.cyan(),
                    job.query,
                    refs.bright_black()
                );
            }
        }
    }

    Ok(())
}
