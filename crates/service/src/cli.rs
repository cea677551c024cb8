//! Command-line flags.

use std::path::PathBuf;

use clap::Parser;

use propagator_infra::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(
    name = "job-status-propagator",
    version,
    about = "Pushes job status changes to the downstream callbacks endpoint"
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, env = "PROPAGATOR_CONFIG")]
    pub config: PathBuf,

    /// Database URI (overrides `db.uri`)
    #[arg(long)]
    pub db: Option<String>,

    /// Retry ceiling: records with this many attempts are skipped
    #[arg(long)]
    pub retries: Option<u32>,

    /// Maximum concurrent dispatches per batch
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,

    /// Pause between propagation cycles, in milliseconds
    #[arg(long = "poll-interval-ms")]
    pub poll_interval_ms: Option<u64>,

    /// Diagnostics listener address
    #[arg(long = "diagnostics-addr")]
    pub diagnostics_addr: Option<String>,

    /// Log output format [json, pretty]
    #[arg(long = "log-format")]
    pub log_format: Option<String>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            db_uri: self.db.clone(),
            retries: self.retries,
            batch_size: self.batch_size,
            poll_interval_ms: self.poll_interval_ms,
            diagnostics_addr: self.diagnostics_addr.clone(),
            log_format: self.log_format.clone(),
        }
    }
}
