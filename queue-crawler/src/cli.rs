//! CLI argument definitions. Doc comments become `--help` text, matching
//! the `Args` struct in the reference resolver's `bin-resolved/src/main.rs`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "queue-crawler", about = "Iterative authoritative DNS crawler")]
pub struct Args {
    /// Path to a file with one hostname per line
    #[arg(long)]
    pub domain_list: PathBuf,

    /// Number of hostnames per crawl wave; -1 means one wave containing
    /// every input hostname
    #[arg(long, default_value_t = -1)]
    pub crawl_group_size: i64,

    /// Maximum number of resolutions actively querying at once
    #[arg(long, default_value_t = 100)]
    pub max_active_resolutions: usize,

    /// Per-attempt UDP query timeout, in seconds
    #[arg(long, default_value_t = 5)]
    pub query_timeout_secs: u64,

    /// Number of UDP query attempts before giving up on a nameserver
    #[arg(long, default_value_t = 3)]
    pub query_retries: u32,

    /// Cap outbound UDP queries per second; unset means unlimited
    #[arg(long)]
    pub rate_limit_per_second: Option<u32>,

    /// Also resolve each input hostname's own A records, not just its
    /// nameservers'
    #[arg(long)]
    pub resolve_target_a: bool,
}
