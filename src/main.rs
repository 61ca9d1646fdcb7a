use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tempstats::accel::{self, BackendChoice};
use tempstats::config::{LoggingConfig, StatsConfig};
use tempstats::dataset::Dataset;
use tempstats::stats::report::format_summary;

#[derive(Parser)]
#[command(
    name = "tempstats",
    about = "Parallel min/max/mean/histogram statistics over temperature datasets",
    version,
    long_about = None
)]
struct Cli {
    /// Select platform
    #[arg(short = 'p', long)]
    platform: Option<usize>,

    /// Select device
    #[arg(short = 'd', long)]
    device: Option<usize>,

    /// List all platforms and devices
    #[arg(short = 'l', long)]
    list: bool,

    /// Dataset file (station year month day time temperature)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Number of histogram bins
    #[arg(short = 'b', long)]
    bins: Option<usize>,

    /// Work-items per local group
    #[arg(short = 'g', long)]
    group_size: Option<usize>,

    /// Compute backend
    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,

    /// Configuration file (TOML); without it, TEMPSTATS_CONFIG then ./tempstats.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON output for machine parsing
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&logging.level))
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load the layered config. The final subscriber depends on it, so anything
/// logged while loading goes through a temporary stderr subscriber.
fn load_config(explicit: Option<&Path>) -> Result<StatsConfig> {
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&LoggingConfig::default().level))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::with_default(bootstrap, || match explicit {
        Some(path) => StatsConfig::load(path),
        None => Ok(StatsConfig::load_or_default()),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(p) = cli.platform {
        config.device.platform = p;
    }
    if let Some(d) = cli.device {
        config.device.device = d;
    }
    if let Some(backend) = cli.backend {
        config.device.backend = backend;
    }
    if let Some(data) = cli.data {
        config.analysis.data_path = data;
    }
    if let Some(bins) = cli.bins {
        config.analysis.bins = bins;
    }
    if let Some(group_size) = cli.group_size {
        config.analysis.group_size = group_size;
    }
    if cli.log_json {
        config.logging.json = true;
    }

    init_tracing(&config.logging);

    if cli.list {
        let listings = accel::list_devices();
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&listings)?);
        } else {
            for platform in &listings {
                println!(
                    "Platform {} ({}): {}",
                    platform.index, platform.backend, platform.name
                );
                for (i, dev) in platform.devices.iter().enumerate() {
                    println!(
                        "  Device {}: {} (max work-group {}, {} compute units)",
                        i, dev.name, dev.max_work_group_size, dev.compute_units
                    );
                }
            }
        }
        return Ok(());
    }

    tracing::info!(path = %config.analysis.data_path.display(), "Loading dataset");
    let dataset = Dataset::load(&config.analysis.data_path)?;

    let summary = tempstats::run_blocking(&config, dataset)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", format_summary(&summary));
    }

    Ok(())
}
