//! Command-line arguments

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

/// Reconcile a local directory with an S3 bucket, or two buckets
#[derive(Parser, Debug)]
#[command(name = "bucketsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: <config dir>/bucketsync/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Copy files that are missing or different from SOURCE to TARGET
    ///
    /// Either side may be an s3://bucket/prefix reference; at least one must be.
    ///
    /// Examples:
    ///   bucketsync sync ./site s3://my-bucket/www
    ///   bucketsync sync s3://my-bucket/backups /srv/restore -c 50
    ///   bucketsync sync s3://a/data s3://b/mirror -r eu-west-1
    Sync(SyncArgs),
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct SyncArgs {
    /// Where files are copied from
    pub source: String,

    /// Where files are copied to
    pub target: String,

    /// Maximum simultaneous transfers [default: 20]
    #[arg(short = 'c', long = "concurrent", value_name = "N")]
    pub concurrent: Option<usize>,

    /// Region probed first when locating buckets
    #[arg(short, long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// S3-compatible endpoint URL
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Skip source paths matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Keys requested per listing call [default: 1000]
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// Plan and report without transferring anything
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide = true, hide_env_values = true)]
    pub access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide = true, hide_env_values = true)]
    pub secret_access_key: Option<String>,

    /// Session token for temporary credentials
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,
}

impl SyncArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            concurrency: self.concurrent,
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            page_size: self.page_size,
            exclude: self.exclude.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
            dry_run: self.dry_run,
        }
    }
}

impl Cli {
    /// Filter directive for the log subscriber
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
